use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tax_core::db::RepositoryRegistry;
use tax_core::{RateQuery, TaxRateService};
use tax_data::{AppConfig, TaxRateLoader};
use tax_db_sqlite::SqliteRepositoryFactory;
use tracing_subscriber::EnvFilter;

/// Manage tax classes and tax rates, and resolve the rate that applies at
/// a location.
#[derive(Parser, Debug)]
#[command(name = "tax-rate-admin")]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "TAX_RATE_CONFIG")]
    config: Option<PathBuf>,

    /// Database connection string (overrides the config file)
    #[arg(short, long, env = "TAX_RATE_DATABASE")]
    database: Option<String>,

    /// Base URL of the location service (overrides the config file)
    #[arg(long, env = "TAX_RATE_LOCATION_URL")]
    location_url: Option<String>,

    /// Name recorded in audit columns (overrides the config file)
    #[arg(long, env = "TAX_RATE_ACTOR")]
    actor: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load tax rates from a CSV file
    ///
    /// Columns: tax_class, rate, zip_code, country_id, state_or_province_id.
    /// Empty zip or state cells apply to every zip code or state.
    Import {
        file: PathBuf,
    },

    /// List tax classes, or add one with --add
    Classes {
        #[arg(long)]
        add: Option<String>,
    },

    /// Rate of the most specific match for one tax class
    Percent {
        tax_class_id: i64,
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Most specific match for each of several tax classes
    Bulk {
        #[arg(long = "class", required = true, num_args = 1..)]
        tax_class_ids: Vec<i64>,
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Every tax rate in id order
    List,

    /// One page of tax rates with class and location names
    Page {
        #[arg(long, default_value_t = 0)]
        page_no: u32,
        #[arg(long, default_value_t = 10)]
        page_size: u32,
    },

    /// Delete a tax rate
    Delete {
        id: i64,
    },
}

#[derive(clap::Args, Debug)]
struct LocationArgs {
    #[arg(long)]
    country: i64,
    #[arg(long)]
    state: Option<i64>,
    #[arg(long)]
    zip: Option<String>,
}

impl LocationArgs {
    fn query(&self) -> RateQuery {
        RateQuery::new(self.country, self.state, self.zip.as_deref())
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::from("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .init();
}

fn resolve_config(args: &Args) -> Result<AppConfig> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(database) = &args.database {
        config.database.connection_string = database.clone();
    }
    if let Some(url) = &args.location_url {
        config.location.base_url = url.clone();
    }
    if let Some(actor) = &args.actor {
        config.actor = actor.clone();
    }
    Ok(config)
}

async fn build_service(config: &AppConfig) -> Result<TaxRateService> {
    let mut registry = RepositoryRegistry::new();
    registry.register(Box::new(SqliteRepositoryFactory));

    let repo = registry
        .create(&config.database)
        .await
        .with_context(|| {
            format!(
                "Failed to open {} database: {}",
                config.database.backend, config.database.connection_string
            )
        })?;
    let location =
        tax_location::build_lookup(&config.location).context("Failed to build location client")?;

    Ok(TaxRateService::new(Arc::from(repo), Arc::new(location)).with_actor(config.actor.clone()))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = resolve_config(&args)?;
    let service = build_service(&config).await?;

    match args.command {
        Command::Import { file } => {
            println!("Loading tax rates from: {}", file.display());

            let reader =
                File::open(&file).with_context(|| format!("Failed to open: {}", file.display()))?;
            let records = TaxRateLoader::parse(reader)
                .with_context(|| format!("Failed to parse CSV: {}", file.display()))?;

            println!("Parsed {} records from CSV", records.len());

            let summary = TaxRateLoader::load(&service, &records)
                .await
                .context("Failed to load tax rates into database")?;

            println!(
                "Successfully loaded {} tax rates ({} new tax classes).",
                summary.rates_inserted, summary.classes_created
            );
        }
        Command::Classes { add } => {
            if let Some(name) = add {
                let class = service.create_tax_class(&name).await?;
                println!("Created tax class {} ({})", class.id, class.name);
            }
            for class in service.list_tax_classes().await? {
                println!("{:>6}  {}", class.id, class.name);
            }
        }
        Command::Percent {
            tax_class_id,
            location,
        } => {
            let rate = service
                .get_tax_percent(tax_class_id, &location.query())
                .await?;
            println!("{rate}");
        }
        Command::Bulk {
            tax_class_ids,
            location,
        } => {
            let rates = service
                .get_bulk_tax_rate(&tax_class_ids, &location.query())
                .await?;
            for rate in rates {
                println!(
                    "class {:>4}  rate {:>8}  (tax rate {})",
                    rate.tax_class_id, rate.rate, rate.id
                );
            }
        }
        Command::List => {
            for rate in service.find_all().await? {
                println!(
                    "{:>6}  class {:>4}  rate {:>8}  country {:>4}  state {:>6}  zip {}",
                    rate.id,
                    rate.tax_class_id,
                    rate.rate,
                    rate.country_id,
                    display_or_any(rate.state_or_province_id),
                    display_or_any(rate.zip_code.as_deref()),
                );
            }
        }
        Command::Page { page_no, page_size } => {
            let page = service.get_pageable_tax_rates(page_no, page_size).await?;
            for detail in &page.items {
                println!(
                    "{:>6}  {:<20}  rate {:>8}  {}, {}  zip {}",
                    detail.id,
                    detail.tax_class_name,
                    detail.rate,
                    detail.state_or_province_name,
                    detail.country_name,
                    display_or_any(detail.zip_code.as_deref()),
                );
            }
            println!(
                "Page {} of {} ({} tax rates in total)",
                page.page_no + 1,
                page.total_pages.max(1),
                page.total_elements
            );
        }
        Command::Delete { id } => {
            service.delete(id).await?;
            println!("Deleted tax rate {id}");
        }
    }

    Ok(())
}

fn display_or_any<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "*".to_string(), |v| v.to_string())
}
