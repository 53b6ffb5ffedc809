//! Tab capture/restore engine for TabVault.
//!
//! Capture reads the live window model into `TabRecord`s: invalid and
//! excluded URLs are dropped, credentials are stripped, and group styling
//! and page state are fetched best-effort. Restore rebuilds tabs from
//! records in original index order, with optional lazy loading (placeholder
//! URL swapped in when the tab is first activated) and tab-group
//! reconstruction. Per-tab restore failures never abort the batch.

use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::managers::window_manager::{LiveTab, WindowManager, WindowManagerTrait, BLANK_URL};
use crate::services::page_state::{PageStateProvider, PageStateRequest};
use crate::services::validation;
use crate::types::errors::WindowError;
use crate::types::settings::VaultSettings;
use crate::types::tab::{TabRecord, UNGROUPED_TAB_GROUP};

/// Options selecting how a tab batch is restored.
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Create tabs at a placeholder URL and navigate on first activation.
    pub lazy: bool,
    /// Restore into a fresh window instead of the focused one.
    pub new_window: bool,
    /// Re-apply pinned flags.
    pub restore_pinned: bool,
    /// Recreate tab groups with their stored color/title.
    pub restore_groups: bool,
}

impl RestoreOptions {
    /// Derives defaults from settings; callers override per call.
    pub fn from_settings(settings: &VaultSettings) -> Self {
        Self {
            lazy: settings.lazy_restore,
            new_window: true,
            restore_pinned: settings.restore_pinned,
            restore_groups: settings.save_tab_groups,
        }
    }
}

/// What a restore actually created.
#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    pub window_id: String,
    pub created_tab_ids: Vec<String>,
}

/// Capture/restore engine. Holds the injected page-state capability and the
/// pending lazy-URL map consumed by the tab-activated callback.
pub struct TabEngine {
    page_state: Box<dyn PageStateProvider>,
    pending_lazy: HashMap<String, String>,
}

impl TabEngine {
    pub fn new(page_state: Box<dyn PageStateProvider>) -> Self {
        Self {
            page_state,
            pending_lazy: HashMap::new(),
        }
    }

    // === Capture ===

    /// Captures the focused window's tabs. Empty when no window is focused.
    pub fn capture_current_window_tabs(
        &self,
        windows: &WindowManager,
        settings: &VaultSettings,
    ) -> Vec<TabRecord> {
        match windows.focused_window_id() {
            Some(window_id) => self
                .capture_window_tabs(windows, &window_id, settings)
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Captures one window's tabs in display order.
    pub fn capture_window_tabs(
        &self,
        windows: &WindowManager,
        window_id: &str,
        settings: &VaultSettings,
    ) -> Result<Vec<TabRecord>, WindowError> {
        let live = windows.tabs_in_window(window_id)?;
        Ok(self.capture_live_tabs(windows, &live, settings))
    }

    /// Captures every tab across every window.
    pub fn capture_all_tabs(
        &self,
        windows: &WindowManager,
        settings: &VaultSettings,
    ) -> Vec<TabRecord> {
        let mut records = Vec::new();
        for window_id in windows.window_ids() {
            if let Ok(mut captured) = self
                .capture_window_tabs(windows, &window_id, settings)
                .map_err(|e| warn!("skipping window {}: {}", window_id, e))
            {
                records.append(&mut captured);
            }
        }
        records
    }

    fn capture_live_tabs(
        &self,
        windows: &WindowManager,
        live: &[&LiveTab],
        settings: &VaultSettings,
    ) -> Vec<TabRecord> {
        let mut records = Vec::new();
        for (index, tab) in live.iter().enumerate() {
            if !validation::is_valid_url(&tab.url) {
                continue;
            }
            if settings
                .excluded_domains
                .iter()
                .any(|pattern| validation::matches_domain_pattern(&tab.url, pattern))
            {
                continue;
            }
            let url = match validation::sanitize_url(&tab.url) {
                Some(url) => url,
                None => continue,
            };

            let mut record = TabRecord {
                id: Uuid::new_v4().to_string(),
                url,
                title: tab.title.clone(),
                favicon: tab.favicon.clone(),
                pinned: tab.pinned,
                group_id: UNGROUPED_TAB_GROUP,
                group_color: None,
                group_title: None,
                index,
                active: tab.active,
                muted: tab.muted,
                scroll_position: None,
                form_data: None,
            };

            if settings.save_tab_groups && tab.group_id != UNGROUPED_TAB_GROUP {
                record.group_id = tab.group_id;
                // The group may have been closed mid-enumeration; styling is
                // best-effort and its absence is not an error.
                match windows.get_group(tab.group_id) {
                    Some(group) => {
                        record.group_color = group.color.clone();
                        record.group_title = group.title.clone();
                    }
                    None => debug!("group {} vanished during capture", tab.group_id),
                }
            }

            if settings.save_scroll_positions || settings.save_form_data {
                let request = PageStateRequest {
                    scroll: settings.save_scroll_positions,
                    form_data: settings.save_form_data,
                };
                match self.page_state.snapshot(&tab.id, &request) {
                    Ok(snapshot) => {
                        record.scroll_position = snapshot.scroll_position;
                        record.form_data = snapshot.form_data;
                    }
                    // Pages without an injectable content agent land here.
                    Err(e) => debug!("no page state for tab {}: {}", tab.id, e),
                }
            }

            records.push(record);
        }
        records
    }

    // === Restore ===

    /// Restores a tab batch. Tabs are created in ascending order of their
    /// original index; per-tab failures are logged and skipped.
    pub fn restore_tabs(
        &mut self,
        windows: &mut WindowManager,
        tabs: &[TabRecord],
        options: &RestoreOptions,
    ) -> Result<RestoreOutcome, WindowError> {
        let mut ordered: Vec<&TabRecord> = tabs.iter().collect();
        ordered.sort_by_key(|t| t.index);

        // Target window: a fresh one (whose default blank tab is removed
        // once a restored tab exists), or the focused window.
        let (window_id, default_blank) = if options.new_window {
            let window_id = windows.create_window();
            let blank = windows
                .tabs_in_window(&window_id)?
                .first()
                .map(|t| t.id.clone());
            (window_id, blank)
        } else {
            match windows.focused_window_id() {
                Some(id) => (id, None),
                None => {
                    let window_id = windows.create_window();
                    let blank = windows
                        .tabs_in_window(&window_id)?
                        .first()
                        .map(|t| t.id.clone());
                    (window_id, blank)
                }
            }
        };

        let mut created = Vec::new();
        let mut group_map: HashMap<i64, i64> = HashMap::new();

        for tab in ordered {
            let target_url = if options.lazy { BLANK_URL } else { tab.url.as_str() };
            let pinned = tab.pinned && options.restore_pinned;

            let new_id = match windows.create_tab(&window_id, target_url, None, pinned, tab.active)
            {
                Ok(id) => id,
                Err(e) => {
                    warn!("failed to restore tab {}: {}", tab.url, e);
                    continue;
                }
            };

            if options.lazy {
                self.pending_lazy.insert(new_id.clone(), tab.url.clone());
            }
            if let Err(e) = windows.set_tab_title(&new_id, &tab.title) {
                debug!("failed to set title on restored tab: {}", e);
            }
            if tab.muted {
                if let Err(e) = windows.set_muted(&new_id, true) {
                    debug!("failed to mute restored tab: {}", e);
                }
            }

            if options.restore_groups && tab.group_id != UNGROUPED_TAB_GROUP {
                self.restore_group_membership(windows, &window_id, tab, &new_id, &mut group_map);
            }

            created.push(new_id);
        }

        if let Some(blank_id) = default_blank {
            if !created.is_empty() {
                if let Err(e) = windows.remove_tab(&blank_id) {
                    debug!("failed to remove default blank tab: {}", e);
                }
            }
        }

        Ok(RestoreOutcome {
            window_id,
            created_tab_ids: created,
        })
    }

    /// First tab of an old group creates (and styles) the new group; later
    /// tabs of the same old group join it. Failures degrade to ungrouped.
    fn restore_group_membership(
        &self,
        windows: &mut WindowManager,
        window_id: &str,
        tab: &TabRecord,
        new_tab_id: &str,
        group_map: &mut HashMap<i64, i64>,
    ) {
        match group_map.get(&tab.group_id) {
            Some(&new_group) => {
                if let Err(e) = windows.add_to_group(new_group, &[new_tab_id.to_string()]) {
                    warn!("failed to regroup restored tab: {}", e);
                }
            }
            None => match windows.create_group(window_id, &[new_tab_id.to_string()]) {
                Ok(new_group) => {
                    if let Err(e) = windows.update_group(
                        new_group,
                        tab.group_title.as_deref(),
                        tab.group_color.as_deref(),
                    ) {
                        debug!("failed to style restored group: {}", e);
                    }
                    group_map.insert(tab.group_id, new_group);
                }
                Err(e) => warn!("failed to recreate tab group: {}", e),
            },
        }
    }

    /// One-shot fetch of a lazily restored tab's real URL, keyed by the new
    /// tab id. The tab-activated callback calls this and navigates when it
    /// returns `Some`.
    pub fn get_pending_lazy_url(&mut self, tab_id: &str) -> Option<String> {
        self.pending_lazy.remove(tab_id)
    }

    /// Groups tabs by exact URL; only groups with more than one member are
    /// returned.
    pub fn detect_duplicates(tabs: &[TabRecord]) -> HashMap<String, Vec<TabRecord>> {
        let mut groups: HashMap<String, Vec<TabRecord>> = HashMap::new();
        for tab in tabs {
            groups.entry(tab.url.clone()).or_default().push(tab.clone());
        }
        groups.retain(|_, members| members.len() > 1);
        groups
    }
}
