use serde::{Deserialize, Serialize};

/// Process-wide configuration record.
///
/// Every field carries a serde default so that settings written by an older
/// build deserialize cleanly; on top of that the store merges the stored JSON
/// over `VaultSettings::default()` on every read, so newly introduced fields
/// backfill transparently and missing keys never surface to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VaultSettings {
    /// Minimum tab count at which a session body is stored compressed.
    /// Zero means "always compress", including empty sessions.
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: usize,
    #[serde(default = "default_true")]
    pub save_scroll_positions: bool,
    #[serde(default)]
    pub save_form_data: bool,
    #[serde(default = "default_true")]
    pub save_tab_groups: bool,
    #[serde(default = "default_true")]
    pub restore_pinned: bool,
    #[serde(default = "default_true")]
    pub lazy_restore: bool,
    /// When true, `restore_session` suppresses tabs whose URL is already
    /// open in the current window.
    #[serde(default = "default_true")]
    pub detect_duplicates: bool,
    /// Domain patterns excluded from capture. `*.example.com` matches the
    /// domain and all subdomains.
    #[serde(default)]
    pub excluded_domains: Vec<String>,
    /// Recurring emergency-backup interval. Zero disables the timer.
    #[serde(default = "default_backup_interval")]
    pub emergency_backup_interval_minutes: u64,
    #[serde(default = "default_max_emergency")]
    pub max_emergency_sessions: usize,
    #[serde(default = "default_max_versions")]
    pub max_versions_per_session: usize,
    #[serde(default = "default_max_tags")]
    pub max_tags_per_session: usize,
}

fn default_true() -> bool {
    true
}

fn default_compression_threshold() -> usize {
    20
}

fn default_backup_interval() -> u64 {
    5
}

fn default_max_emergency() -> usize {
    5
}

fn default_max_versions() -> usize {
    10
}

fn default_max_tags() -> usize {
    20
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            compression_threshold: default_compression_threshold(),
            save_scroll_positions: true,
            save_form_data: false,
            save_tab_groups: true,
            restore_pinned: true,
            lazy_restore: true,
            detect_duplicates: true,
            excluded_domains: Vec::new(),
            emergency_backup_interval_minutes: default_backup_interval(),
            max_emergency_sessions: default_max_emergency(),
            max_versions_per_session: default_max_versions(),
            max_tags_per_session: default_max_tags(),
        }
    }
}
