use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Sentinel group id for tabs that belong to no tab group.
pub const UNGROUPED_TAB_GROUP: i64 = -1;

/// One captured browser tab as stored inside a session.
///
/// The URL has already passed the allowed-protocol check and had embedded
/// credentials stripped; records with invalid URLs are dropped at capture
/// and import time and never reach this type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabRecord {
    pub id: String,
    pub url: String,
    pub title: String,
    pub favicon: Option<String>,
    pub pinned: bool,
    /// `UNGROUPED_TAB_GROUP` when the tab is not in a group.
    #[serde(default = "ungrouped")]
    pub group_id: i64,
    #[serde(default)]
    pub group_color: Option<String>,
    #[serde(default)]
    pub group_title: Option<String>,
    /// Position within the window at capture time. Restore recreates tabs
    /// in ascending order of this index.
    pub index: usize,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub scroll_position: Option<ScrollPosition>,
    /// Field-identifier → value snapshot; sensitive fields are excluded by
    /// the page-state provider before this map is built.
    #[serde(default)]
    pub form_data: Option<HashMap<String, String>>,
}

fn ungrouped() -> i64 {
    UNGROUPED_TAB_GROUP
}

/// Scroll position within a web page.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ScrollPosition {
    pub x: f64,
    pub y: f64,
}
