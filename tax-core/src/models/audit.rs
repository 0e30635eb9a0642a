use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Actor recorded when no authenticated user is attached to a write.
pub const SYSTEM_ACTOR: &str = "system";

/// Audit columns carried by every persisted record.
///
/// Embedded by value in each model rather than shared through a common
/// base type. `created_*` are set once on insert; `last_modified_*` are
/// rewritten on every update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditInfo {
    pub created_on: DateTime<Utc>,
    pub created_by: String,
    pub last_modified_on: DateTime<Utc>,
    pub last_modified_by: String,
}

impl AuditInfo {
    /// Audit values for a record inserted by `actor` at `at`.
    pub fn created(
        actor: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            created_on: at,
            created_by: actor.to_string(),
            last_modified_on: at,
            last_modified_by: actor.to_string(),
        }
    }

    /// Returns a copy with the modification stamp moved to `actor` / `at`.
    pub fn touched(
        &self,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            created_on: self.created_on,
            created_by: self.created_by.clone(),
            last_modified_on: at,
            last_modified_by: actor.to_string(),
        }
    }
}
