use serde::{Deserialize, Serialize};

/// Monotonic usage counters. Updated additively on save/restore; reset only
/// by an explicit clear.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UsageStatistics {
    pub sessions_saved: u64,
    pub tabs_saved: u64,
    pub sessions_restored: u64,
    pub tabs_restored: u64,
    #[serde(default)]
    pub last_used_at: Option<i64>,
}
