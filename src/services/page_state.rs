//! Page-state capture capability for TabVault.
//!
//! Scroll positions and form values come from a content agent injected into
//! the page — a resource that may legitimately be unavailable (internal
//! browser pages, pages that never finished loading). The engine therefore
//! talks to an injected [`PageStateProvider`] and treats every failure as
//! "no data available".

use std::collections::HashMap;

use crate::types::errors::PageStateError;
use crate::types::tab::ScrollPosition;

/// What the caller wants captured from the page.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageStateRequest {
    pub scroll: bool,
    pub form_data: bool,
}

/// The snapshot a page yields. Either half may be absent.
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    pub scroll_position: Option<ScrollPosition>,
    pub form_data: Option<HashMap<String, String>>,
}

/// Injected capability producing page snapshots for live tabs.
///
/// Implementations must exclude credential-like fields (password inputs,
/// card numbers, one-time codes) before returning form data; see
/// `validation::is_sensitive_field`.
pub trait PageStateProvider: Send {
    fn snapshot(
        &self,
        tab_id: &str,
        request: &PageStateRequest,
    ) -> Result<PageSnapshot, PageStateError>;
}

/// Provider for environments without an injectable content agent: every
/// request reports unavailable, which capture degrades to "no data".
pub struct UnavailablePageState;

impl PageStateProvider for UnavailablePageState {
    fn snapshot(
        &self,
        tab_id: &str,
        _request: &PageStateRequest,
    ) -> Result<PageSnapshot, PageStateError> {
        Err(PageStateError::Unavailable(tab_id.to_string()))
    }
}

/// Provider serving pre-registered snapshots, used by tests and by frontends
/// that collect page state ahead of capture. Sensitive fields are filtered
/// out at registration time.
pub struct StaticPageState {
    snapshots: HashMap<String, PageSnapshot>,
}

impl StaticPageState {
    pub fn new() -> Self {
        Self {
            snapshots: HashMap::new(),
        }
    }

    /// Registers a snapshot for a tab, dropping form fields whose identifier
    /// matches the sensitive-field heuristics.
    pub fn register(&mut self, tab_id: &str, mut snapshot: PageSnapshot) {
        if let Some(form) = snapshot.form_data.take() {
            let filtered: HashMap<String, String> = form
                .into_iter()
                .filter(|(field, _)| {
                    !crate::services::validation::is_sensitive_field(field, "", "")
                })
                .collect();
            snapshot.form_data = Some(filtered);
        }
        self.snapshots.insert(tab_id.to_string(), snapshot);
    }
}

impl Default for StaticPageState {
    fn default() -> Self {
        Self::new()
    }
}

impl PageStateProvider for StaticPageState {
    fn snapshot(
        &self,
        tab_id: &str,
        request: &PageStateRequest,
    ) -> Result<PageSnapshot, PageStateError> {
        let stored = self
            .snapshots
            .get(tab_id)
            .ok_or_else(|| PageStateError::Unavailable(tab_id.to_string()))?;
        Ok(PageSnapshot {
            scroll_position: if request.scroll {
                stored.scroll_position.clone()
            } else {
                None
            },
            form_data: if request.form_data {
                stored.form_data.clone()
            } else {
                None
            },
        })
    }
}
