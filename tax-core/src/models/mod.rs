mod audit;
mod location;
mod page;
mod tax_class;
mod tax_rate;

pub use audit::{AuditInfo, SYSTEM_ACTOR};
pub use location::LocationName;
pub use page::Page;
pub use tax_class::{MAX_TAX_CLASS_NAME_LEN, TaxClass, TaxClassRef};
pub use tax_rate::{
    NewTaxRate, RateQuery, TaxRate, TaxRateDetail, TaxRateEntry, TaxRateInput, TaxRateVm,
    normalize_zip_code,
};
