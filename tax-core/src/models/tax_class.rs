use serde::{Deserialize, Serialize};

use super::AuditInfo;

/// Longest accepted tax class name.
pub const MAX_TAX_CLASS_NAME_LEN: usize = 450;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxClass {
    pub id: i64,
    pub name: String,
    pub audit: AuditInfo,
}

impl TaxClass {
    pub fn reference(&self) -> TaxClassRef {
        TaxClassRef(self.id)
    }
}

/// Foreign key to a tax class, handed out by the store without loading the
/// class itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxClassRef(pub i64);

impl TaxClassRef {
    pub fn id(self) -> i64 {
        self.0
    }
}
