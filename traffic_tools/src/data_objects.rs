use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The envelope every upstream endpoint responds with. A `code` of zero means success.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Value,
}

impl ApiResponse {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// Usage figures for a single sub-user, as reported by `querySubUser`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SubUserUsage {
    pub username: String,
    /// Traffic consumed so far.
    #[serde(default)]
    pub traffic: Value,
    /// Total traffic allowance.
    #[serde(default)]
    pub alltraffic: Value,
}
