//! In-memory model of live browser windows, tabs, and tab groups.
//!
//! This is the surface the capture/restore engine reads from and writes to.
//! It mirrors the shape of the real windowing API: windows own an ordered
//! tab list, new windows open with a single blank tab, exactly one tab per
//! window is active, and tab groups are window-scoped integer ids.

use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::types::errors::WindowError;
use crate::types::tab::UNGROUPED_TAB_GROUP;

/// Initial URL of a freshly created window's default tab, and the neutral
/// placeholder used by lazy restore.
pub const BLANK_URL: &str = "about:blank";

/// One live tab. `group_id` is `UNGROUPED_TAB_GROUP` when the tab is not in
/// a group; position within the window is its index in the window's list.
#[derive(Debug, Clone)]
pub struct LiveTab {
    pub id: String,
    pub url: String,
    pub title: String,
    pub favicon: Option<String>,
    pub pinned: bool,
    pub muted: bool,
    pub active: bool,
    pub group_id: i64,
    pub created_at: i64,
}

/// A window-scoped tab group with optional styling.
#[derive(Debug, Clone)]
pub struct TabGroup {
    pub id: i64,
    pub window_id: String,
    pub title: Option<String>,
    pub color: Option<String>,
}

/// A browser window owning an ordered list of tabs.
#[derive(Debug, Clone)]
pub struct BrowserWindow {
    pub id: String,
    pub tabs: Vec<LiveTab>,
}

/// Trait defining the live window/tab surface the engine depends on.
pub trait WindowManagerTrait {
    fn create_window(&mut self) -> String;
    fn close_window(&mut self, window_id: &str) -> Result<(), WindowError>;
    fn focused_window_id(&self) -> Option<String>;
    fn focus_window(&mut self, window_id: &str) -> Result<(), WindowError>;
    fn window_ids(&self) -> Vec<String>;
    fn create_tab(
        &mut self,
        window_id: &str,
        url: &str,
        index: Option<usize>,
        pinned: bool,
        active: bool,
    ) -> Result<String, WindowError>;
    fn remove_tab(&mut self, tab_id: &str) -> Result<(), WindowError>;
    fn navigate_tab(&mut self, tab_id: &str, url: &str) -> Result<(), WindowError>;
    fn activate_tab(&mut self, tab_id: &str) -> Result<(), WindowError>;
    fn set_tab_title(&mut self, tab_id: &str, title: &str) -> Result<(), WindowError>;
    fn set_muted(&mut self, tab_id: &str, muted: bool) -> Result<(), WindowError>;
    fn get_tab(&self, tab_id: &str) -> Option<&LiveTab>;
    fn tabs_in_window(&self, window_id: &str) -> Result<Vec<&LiveTab>, WindowError>;
    fn all_tabs(&self) -> Vec<(&str, &LiveTab)>;
    fn create_group(&mut self, window_id: &str, tab_ids: &[String]) -> Result<i64, WindowError>;
    fn add_to_group(&mut self, group_id: i64, tab_ids: &[String]) -> Result<(), WindowError>;
    fn update_group(
        &mut self,
        group_id: i64,
        title: Option<&str>,
        color: Option<&str>,
    ) -> Result<(), WindowError>;
    fn get_group(&self, group_id: i64) -> Option<&TabGroup>;
}

/// In-memory window manager.
pub struct WindowManager {
    windows: Vec<BrowserWindow>,
    groups: Vec<TabGroup>,
    focused_window: Option<String>,
    next_group_id: i64,
}

impl WindowManager {
    pub fn new() -> Self {
        Self {
            windows: Vec::new(),
            groups: Vec::new(),
            focused_window: None,
            next_group_id: 1,
        }
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    fn find_window(&self, window_id: &str) -> Option<usize> {
        self.windows.iter().position(|w| w.id == window_id)
    }

    /// Locates a tab across all windows: (window index, tab index).
    fn find_tab(&self, tab_id: &str) -> Option<(usize, usize)> {
        for (wi, window) in self.windows.iter().enumerate() {
            if let Some(ti) = window.tabs.iter().position(|t| t.id == tab_id) {
                return Some((wi, ti));
            }
        }
        None
    }

    fn blank_tab() -> LiveTab {
        LiveTab {
            id: Uuid::new_v4().to_string(),
            url: BLANK_URL.to_string(),
            title: "New Tab".to_string(),
            favicon: None,
            pinned: false,
            muted: false,
            active: true,
            group_id: UNGROUPED_TAB_GROUP,
            created_at: Self::now(),
        }
    }
}

impl Default for WindowManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowManagerTrait for WindowManager {
    /// Creates a window holding one blank active tab and focuses it.
    fn create_window(&mut self) -> String {
        let id = Uuid::new_v4().to_string();
        self.windows.push(BrowserWindow {
            id: id.clone(),
            tabs: vec![Self::blank_tab()],
        });
        self.focused_window = Some(id.clone());
        id
    }

    /// Closes a window, its tabs, and its groups.
    fn close_window(&mut self, window_id: &str) -> Result<(), WindowError> {
        let idx = self
            .find_window(window_id)
            .ok_or_else(|| WindowError::WindowNotFound(window_id.to_string()))?;
        self.windows.remove(idx);
        self.groups.retain(|g| g.window_id != window_id);
        if self.focused_window.as_deref() == Some(window_id) {
            self.focused_window = self.windows.last().map(|w| w.id.clone());
        }
        Ok(())
    }

    fn focused_window_id(&self) -> Option<String> {
        self.focused_window.clone()
    }

    fn focus_window(&mut self, window_id: &str) -> Result<(), WindowError> {
        if self.find_window(window_id).is_none() {
            return Err(WindowError::WindowNotFound(window_id.to_string()));
        }
        self.focused_window = Some(window_id.to_string());
        Ok(())
    }

    fn window_ids(&self) -> Vec<String> {
        self.windows.iter().map(|w| w.id.clone()).collect()
    }

    /// Creates a tab at the given index (appended when `None`, clamped when
    /// past the end). An active tab deactivates the window's previous one.
    fn create_tab(
        &mut self,
        window_id: &str,
        url: &str,
        index: Option<usize>,
        pinned: bool,
        active: bool,
    ) -> Result<String, WindowError> {
        let wi = self
            .find_window(window_id)
            .ok_or_else(|| WindowError::WindowNotFound(window_id.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let tab = LiveTab {
            id: id.clone(),
            url: url.to_string(),
            title: url.to_string(),
            favicon: None,
            pinned,
            muted: false,
            active,
            group_id: UNGROUPED_TAB_GROUP,
            created_at: Self::now(),
        };

        let window = &mut self.windows[wi];
        if active {
            for t in &mut window.tabs {
                t.active = false;
            }
        }
        let pos = index.unwrap_or(window.tabs.len()).min(window.tabs.len());
        window.tabs.insert(pos, tab);
        Ok(id)
    }

    fn remove_tab(&mut self, tab_id: &str) -> Result<(), WindowError> {
        let (wi, ti) = self
            .find_tab(tab_id)
            .ok_or_else(|| WindowError::TabNotFound(tab_id.to_string()))?;
        let removed = self.windows[wi].tabs.remove(ti);
        // Keep one tab active per non-empty window.
        if removed.active {
            let window = &mut self.windows[wi];
            let next_index = ti.min(window.tabs.len().saturating_sub(1));
            if let Some(next) = window.tabs.get_mut(next_index) {
                next.active = true;
            }
        }
        Ok(())
    }

    fn navigate_tab(&mut self, tab_id: &str, url: &str) -> Result<(), WindowError> {
        let (wi, ti) = self
            .find_tab(tab_id)
            .ok_or_else(|| WindowError::TabNotFound(tab_id.to_string()))?;
        let tab = &mut self.windows[wi].tabs[ti];
        tab.url = url.to_string();
        tab.title = url.to_string();
        Ok(())
    }

    fn activate_tab(&mut self, tab_id: &str) -> Result<(), WindowError> {
        let (wi, ti) = self
            .find_tab(tab_id)
            .ok_or_else(|| WindowError::TabNotFound(tab_id.to_string()))?;
        for t in &mut self.windows[wi].tabs {
            t.active = false;
        }
        self.windows[wi].tabs[ti].active = true;
        Ok(())
    }

    fn set_tab_title(&mut self, tab_id: &str, title: &str) -> Result<(), WindowError> {
        let (wi, ti) = self
            .find_tab(tab_id)
            .ok_or_else(|| WindowError::TabNotFound(tab_id.to_string()))?;
        self.windows[wi].tabs[ti].title = title.to_string();
        Ok(())
    }

    fn set_muted(&mut self, tab_id: &str, muted: bool) -> Result<(), WindowError> {
        let (wi, ti) = self
            .find_tab(tab_id)
            .ok_or_else(|| WindowError::TabNotFound(tab_id.to_string()))?;
        self.windows[wi].tabs[ti].muted = muted;
        Ok(())
    }

    fn get_tab(&self, tab_id: &str) -> Option<&LiveTab> {
        self.find_tab(tab_id)
            .map(|(wi, ti)| &self.windows[wi].tabs[ti])
    }

    /// Tabs of one window in display order.
    fn tabs_in_window(&self, window_id: &str) -> Result<Vec<&LiveTab>, WindowError> {
        let wi = self
            .find_window(window_id)
            .ok_or_else(|| WindowError::WindowNotFound(window_id.to_string()))?;
        Ok(self.windows[wi].tabs.iter().collect())
    }

    /// Every tab across every window, paired with its window id.
    fn all_tabs(&self) -> Vec<(&str, &LiveTab)> {
        self.windows
            .iter()
            .flat_map(|w| w.tabs.iter().map(move |t| (w.id.as_str(), t)))
            .collect()
    }

    /// Creates a new group in the window and moves the given tabs into it.
    fn create_group(&mut self, window_id: &str, tab_ids: &[String]) -> Result<i64, WindowError> {
        if self.find_window(window_id).is_none() {
            return Err(WindowError::WindowNotFound(window_id.to_string()));
        }
        let group_id = self.next_group_id;
        self.next_group_id += 1;
        self.groups.push(TabGroup {
            id: group_id,
            window_id: window_id.to_string(),
            title: None,
            color: None,
        });
        self.add_to_group(group_id, tab_ids)?;
        Ok(group_id)
    }

    fn add_to_group(&mut self, group_id: i64, tab_ids: &[String]) -> Result<(), WindowError> {
        if !self.groups.iter().any(|g| g.id == group_id) {
            return Err(WindowError::GroupNotFound(group_id));
        }
        for tab_id in tab_ids {
            let (wi, ti) = self
                .find_tab(tab_id)
                .ok_or_else(|| WindowError::TabNotFound(tab_id.to_string()))?;
            self.windows[wi].tabs[ti].group_id = group_id;
        }
        Ok(())
    }

    fn update_group(
        &mut self,
        group_id: i64,
        title: Option<&str>,
        color: Option<&str>,
    ) -> Result<(), WindowError> {
        let group = self
            .groups
            .iter_mut()
            .find(|g| g.id == group_id)
            .ok_or(WindowError::GroupNotFound(group_id))?;
        if let Some(t) = title {
            group.title = Some(t.to_string());
        }
        if let Some(c) = color {
            group.color = Some(c.to_string());
        }
        Ok(())
    }

    fn get_group(&self, group_id: i64) -> Option<&TabGroup> {
        self.groups.iter().find(|g| g.id == group_id)
    }
}
