//! Search/filter index for TabVault.
//!
//! Fuzzy matching over session metadata with a short-TTL cache, combinable
//! structural filters, and on-demand tab search. The cache has no
//! subscription mechanism: every mutating caller is responsible for calling
//! [`SearchIndex::invalidate`] after a write, and the RPC layer does exactly
//! that.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::database::{Database, SessionStore};
use crate::services::compression;
use crate::types::errors::StoreError;
use crate::types::session::{Session, SessionMetadata};
use crate::types::tab::TabRecord;

/// How long a cached metadata snapshot stays fresh.
pub const CACHE_TTL: Duration = Duration::from_secs(30);

/// Matches scoring below this are dropped from results.
const MIN_SCORE: f64 = 0.2;

// Field weights: name outranks tags/description, which outrank the domain
// preview; for tabs, title outranks URL.
const WEIGHT_NAME: f64 = 1.0;
const WEIGHT_TAGS: f64 = 0.7;
const WEIGHT_DOMAIN: f64 = 0.4;
const WEIGHT_TITLE: f64 = 1.0;
const WEIGHT_URL: f64 = 0.7;

/// A metadata hit with its normalized score (higher is better).
#[derive(Debug, Clone)]
pub struct ScoredSession {
    pub metadata: SessionMetadata,
    pub score: f64,
}

/// A tab hit with the session it came from.
#[derive(Debug, Clone)]
pub struct ScoredTab {
    pub session_id: String,
    pub tab: TabRecord,
    pub score: f64,
}

/// AND-combined structural filters for `search_with_filters`.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Session tags must be a superset of these.
    pub tags: Vec<String>,
    /// Domain preview must intersect these.
    pub domains: Vec<String>,
    /// Folder must match exactly when set.
    pub folder_id: Option<String>,
    /// Inclusive created-at range.
    pub created_from: Option<i64>,
    pub created_to: Option<i64>,
    /// Inclusive tab-count range.
    pub min_tabs: Option<usize>,
    pub max_tabs: Option<usize>,
}

struct CachedIndex {
    built_at: Instant,
    entries: Vec<SessionMetadata>,
}

/// Fuzzy index over session metadata.
pub struct SearchIndex {
    db: Arc<Database>,
    cache: Option<CachedIndex>,
    ttl: Duration,
}

impl SearchIndex {
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_ttl(db, CACHE_TTL)
    }

    pub fn with_ttl(db: Arc<Database>, ttl: Duration) -> Self {
        Self {
            db,
            cache: None,
            ttl,
        }
    }

    /// Drops the cached snapshot. Callers must invoke this after every
    /// session mutation; the index cannot observe writes on its own.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Current metadata snapshot, refreshed when missing or past its TTL.
    fn snapshot(&mut self) -> Result<&[SessionMetadata], StoreError> {
        let stale = match &self.cache {
            Some(cached) => cached.built_at.elapsed() > self.ttl,
            None => true,
        };
        if stale {
            let entries = {
                let conn = self.db.connection();
                SessionStore::new(&conn).get_all_metadata()?
            };
            self.cache = Some(CachedIndex {
                built_at: Instant::now(),
                entries,
            });
        }
        match &self.cache {
            Some(cached) => Ok(&cached.entries),
            None => Ok(&[]),
        }
    }

    /// Fuzzy search over metadata. An empty query returns every session at
    /// uniform score 1 in store order; otherwise results are sorted by
    /// descending score.
    pub fn search_sessions(&mut self, query: &str) -> Result<Vec<ScoredSession>, StoreError> {
        let query = query.trim().to_lowercase();
        let entries = self.snapshot()?;

        if query.is_empty() {
            return Ok(entries
                .iter()
                .map(|meta| ScoredSession {
                    metadata: meta.clone(),
                    score: 1.0,
                })
                .collect());
        }

        let mut hits: Vec<ScoredSession> = entries
            .iter()
            .filter_map(|meta| {
                let score = score_metadata(&query, meta);
                (score >= MIN_SCORE).then(|| ScoredSession {
                    metadata: meta.clone(),
                    score,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(hits)
    }

    /// Composes a text search (or the full list for an empty query) with
    /// AND-combined structural filters.
    pub fn search_with_filters(
        &mut self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<ScoredSession>, StoreError> {
        let mut hits = self.search_sessions(query)?;
        hits.retain(|hit| matches_filters(&hit.metadata, filters));
        Ok(hits)
    }

    /// Searches one session's tabs (title weighted above URL) over an
    /// ephemeral per-call index, decompressing on demand. Unknown session
    /// ids yield no hits.
    pub fn search_tabs_in_session(
        &self,
        session_id: &str,
        query: &str,
    ) -> Result<Vec<ScoredTab>, StoreError> {
        let conn = self.db.connection();
        let store = SessionStore::new(&conn);
        let session = match store.get_session(session_id)? {
            Some(session) => session,
            None => return Ok(Vec::new()),
        };
        let mut hits = score_session_tabs(&session, query);
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(hits)
    }

    /// Searches every session's tabs, aggregated and sorted by descending
    /// score.
    pub fn search_tabs_global(&self, query: &str) -> Result<Vec<ScoredTab>, StoreError> {
        let conn = self.db.connection();
        let store = SessionStore::new(&conn);
        let mut hits = Vec::new();
        for meta in store.get_all_metadata()? {
            if let Some(session) = store.get_session(&meta.id)? {
                hits.append(&mut score_session_tabs(&session, query));
            }
        }
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(hits)
    }
}

/// Weighted best-field score for one metadata entry.
fn score_metadata(query: &str, meta: &SessionMetadata) -> f64 {
    let mut best = WEIGHT_NAME * text_similarity(query, &meta.name.to_lowercase());
    for tag in &meta.tags {
        best = best.max(WEIGHT_TAGS * text_similarity(query, tag));
    }
    if let Some(description) = &meta.description {
        best = best.max(WEIGHT_TAGS * text_similarity(query, &description.to_lowercase()));
    }
    for domain in &meta.domain_preview {
        best = best.max(WEIGHT_DOMAIN * text_similarity(query, domain));
    }
    best
}

fn score_session_tabs(session: &Session, query: &str) -> Vec<ScoredTab> {
    let tabs = if session.is_compressed {
        session
            .compressed_tabs
            .as_deref()
            .map(compression::decompress_tabs)
            .unwrap_or_default()
    } else {
        session.tabs.clone()
    };

    let query = query.trim().to_lowercase();
    tabs.into_iter()
        .filter_map(|tab| {
            let score = if query.is_empty() {
                1.0
            } else {
                let by_title = WEIGHT_TITLE * text_similarity(&query, &tab.title.to_lowercase());
                let by_url = WEIGHT_URL * text_similarity(&query, &tab.url.to_lowercase());
                by_title.max(by_url)
            };
            (score >= MIN_SCORE || query.is_empty()).then(|| ScoredTab {
                session_id: session.id.clone(),
                tab,
                score,
            })
        })
        .collect()
}

/// Similarity in [0, 1]: substring hits score by coverage (floored so a hit
/// always outranks edit-distance noise), everything else falls back to
/// `1 - normalized Levenshtein distance`.
fn text_similarity(query: &str, text: &str) -> f64 {
    if query.is_empty() || text.is_empty() {
        return 0.0;
    }
    if text.contains(query) {
        return (query.len() as f64 / text.len() as f64).max(0.6);
    }
    strsim::normalized_levenshtein(query, text)
}

fn matches_filters(meta: &SessionMetadata, filters: &SearchFilters) -> bool {
    if !filters.tags.is_empty() {
        let has_all = filters
            .tags
            .iter()
            .all(|tag| meta.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)));
        if !has_all {
            return false;
        }
    }
    if !filters.domains.is_empty() {
        let intersects = filters
            .domains
            .iter()
            .any(|domain| meta.domain_preview.iter().any(|d| d.eq_ignore_ascii_case(domain)));
        if !intersects {
            return false;
        }
    }
    if let Some(folder_id) = &filters.folder_id {
        if meta.folder_id.as_deref() != Some(folder_id.as_str()) {
            return false;
        }
    }
    if let Some(from) = filters.created_from {
        if meta.created_at < from {
            return false;
        }
    }
    if let Some(to) = filters.created_to {
        if meta.created_at > to {
            return false;
        }
    }
    if let Some(min) = filters.min_tabs {
        if meta.tab_count < min {
            return false;
        }
    }
    if let Some(max) = filters.max_tabs {
        if meta.tab_count > max {
            return false;
        }
    }
    true
}
