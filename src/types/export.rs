use serde::{Deserialize, Serialize};

use super::folder::Folder;
use super::session::Session;
use super::settings::VaultSettings;

/// Version tag written into every export envelope.
pub const EXPORT_FORMAT_VERSION: &str = "1.0";

/// The exchange format for whole session sets.
///
/// Serialized pretty-printed; `exported_at` is epoch milliseconds to match
/// the exchange format consumed by other frontends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportEnvelope {
    pub version: String,
    pub exported_at: i64,
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<VaultSettings>,
}

/// Options controlling `import_from_json`.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Overwrite existing sessions/folders on id collision instead of
    /// assigning fresh ids.
    pub overwrite: bool,
    /// Apply the envelope's settings record, if present.
    pub import_settings: bool,
}

/// Outcome of an import. Per-item failures accumulate into `errors` rather
/// than aborting the batch; `success` is true iff at least one session
/// imported.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ImportReport {
    pub success: bool,
    pub imported_sessions: usize,
    pub imported_folders: usize,
    pub errors: Vec<String>,
}
