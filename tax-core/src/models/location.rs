use serde::{Deserialize, Serialize};

/// Display names for one state or province, as returned by the location
/// service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationName {
    pub state_or_province_id: i64,
    pub state_or_province_name: String,
    pub country_name: String,
}
