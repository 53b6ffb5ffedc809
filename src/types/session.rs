use serde::{Deserialize, Serialize};

use super::tab::TabRecord;

/// How many favicon / domain entries the metadata previews carry.
pub const PREVIEW_LEN: usize = 5;

/// A named, timestamped collection of captured tabs.
///
/// Exactly one of `tabs` / `compressed_tabs` is the authoritative tab source,
/// selected by `is_compressed`. When `is_compressed` is true, `tabs` is empty
/// on disk and `compressed_tabs` holds the codec output; `get_session`
/// inflates `tabs` before handing the session to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub last_accessed_at: Option<i64>,
    #[serde(default)]
    pub is_emergency: bool,
    pub version: u32,
    #[serde(default)]
    pub tabs: Vec<TabRecord>,
    #[serde(default)]
    pub compressed_tabs: Option<String>,
    #[serde(default)]
    pub is_compressed: bool,
}

impl Session {
    /// Derives the lightweight metadata view from this session and the given
    /// tab list. Previews are computed here, once, at write time — callers
    /// pass the uncompressed tabs even when the session body is stored
    /// compressed.
    pub fn derive_metadata(&self, tabs: &[TabRecord]) -> SessionMetadata {
        SessionMetadata {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            folder_id: self.folder_id.clone(),
            tab_count: tabs.len(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_accessed_at: self.last_accessed_at,
            is_emergency: self.is_emergency,
            version: self.version,
            favicon_preview: favicon_preview(tabs),
            domain_preview: domain_preview(tabs),
        }
    }
}

/// Lightweight session summary kept alongside the full record so list views
/// and search never have to load (or decompress) whole sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
    pub tab_count: usize,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub last_accessed_at: Option<i64>,
    #[serde(default)]
    pub is_emergency: bool,
    pub version: u32,
    #[serde(default)]
    pub favicon_preview: Vec<String>,
    #[serde(default)]
    pub domain_preview: Vec<String>,
}

/// Immutable point-in-time snapshot of a session, stored compressed.
/// Per-session histories are newest-first and FIFO-bounded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionVersion {
    pub version_id: String,
    pub session_id: String,
    pub created_at: i64,
    pub compressed: String,
}

/// First `PREVIEW_LEN` favicons present in the tab list.
fn favicon_preview(tabs: &[TabRecord]) -> Vec<String> {
    tabs.iter()
        .filter_map(|t| t.favicon.clone())
        .take(PREVIEW_LEN)
        .collect()
}

/// First `PREVIEW_LEN` unique domains, preserving first-occurrence order.
fn domain_preview(tabs: &[TabRecord]) -> Vec<String> {
    let mut seen = Vec::new();
    for tab in tabs {
        let domain = crate::services::validation::extract_domain(&tab.url);
        if !seen.contains(&domain) {
            seen.push(domain);
            if seen.len() == PREVIEW_LEN {
                break;
            }
        }
    }
    seen
}
