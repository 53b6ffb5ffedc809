//! Unit tests for the tab capture/restore engine.

use std::collections::HashMap;

use tabvault::managers::tab_engine::{RestoreOptions, TabEngine};
use tabvault::managers::window_manager::{WindowManager, WindowManagerTrait, BLANK_URL};
use tabvault::services::page_state::{
    PageSnapshot, StaticPageState, UnavailablePageState,
};
use tabvault::types::settings::VaultSettings;
use tabvault::types::tab::{ScrollPosition, TabRecord, UNGROUPED_TAB_GROUP};

fn engine() -> TabEngine {
    TabEngine::new(Box::new(UnavailablePageState))
}

fn record(url: &str, index: usize) -> TabRecord {
    TabRecord {
        id: format!("tab-{}", index),
        url: url.to_string(),
        title: format!("Tab {}", index),
        favicon: None,
        pinned: false,
        group_id: UNGROUPED_TAB_GROUP,
        group_color: None,
        group_title: None,
        index,
        active: false,
        muted: false,
        scroll_position: None,
        form_data: None,
    }
}

fn options() -> RestoreOptions {
    RestoreOptions {
        lazy: false,
        new_window: true,
        restore_pinned: true,
        restore_groups: true,
    }
}

// ─── Capture ───

#[test]
fn test_capture_skips_invalid_urls() {
    let mut wm = WindowManager::new();
    let window_id = wm.create_window(); // default blank tab is about:blank
    wm.create_tab(&window_id, "https://real.example.com", None, false, false).unwrap();
    wm.create_tab(&window_id, "javascript:alert(1)", None, false, false).unwrap();

    let captured = engine().capture_current_window_tabs(&wm, &VaultSettings::default());
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].url, "https://real.example.com/");
}

#[test]
fn test_capture_skips_excluded_domains() {
    let mut wm = WindowManager::new();
    let window_id = wm.create_window();
    wm.create_tab(&window_id, "https://keep.example.com", None, false, false).unwrap();
    wm.create_tab(&window_id, "https://private.bank.com", None, false, false).unwrap();

    let mut settings = VaultSettings::default();
    settings.excluded_domains = vec!["*.bank.com".to_string()];

    let captured = engine().capture_current_window_tabs(&wm, &settings);
    assert_eq!(captured.len(), 1);
    assert!(captured[0].url.contains("keep.example.com"));
}

#[test]
fn test_capture_strips_credentials_and_assigns_fresh_ids() {
    let mut wm = WindowManager::new();
    let window_id = wm.create_window();
    let live_id = wm
        .create_tab(&window_id, "https://user:pw@example.com/x", None, false, false)
        .unwrap();

    let captured = engine().capture_current_window_tabs(&wm, &VaultSettings::default());
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].url, "https://example.com/x");
    assert_ne!(captured[0].id, live_id);
}

#[test]
fn test_capture_preserves_window_order_as_index() {
    let mut wm = WindowManager::new();
    let window_id = wm.create_window();
    wm.create_tab(&window_id, "https://a.com", None, false, false).unwrap();
    wm.create_tab(&window_id, "https://b.com", None, false, false).unwrap();

    let captured = engine().capture_current_window_tabs(&wm, &VaultSettings::default());
    // Blank tab was skipped but positional indexes still reflect the window.
    assert_eq!(captured[0].index, 1);
    assert_eq!(captured[1].index, 2);
}

#[test]
fn test_capture_includes_group_styling() {
    let mut wm = WindowManager::new();
    let window_id = wm.create_window();
    let a = wm.create_tab(&window_id, "https://a.com", None, false, false).unwrap();
    let group = wm.create_group(&window_id, &[a]).unwrap();
    wm.update_group(group, Some("Work"), Some("blue")).unwrap();

    let captured = engine().capture_current_window_tabs(&wm, &VaultSettings::default());
    assert_eq!(captured[0].group_id, group);
    assert_eq!(captured[0].group_title.as_deref(), Some("Work"));
    assert_eq!(captured[0].group_color.as_deref(), Some("blue"));
}

#[test]
fn test_capture_groups_disabled_by_setting() {
    let mut wm = WindowManager::new();
    let window_id = wm.create_window();
    let a = wm.create_tab(&window_id, "https://a.com", None, false, false).unwrap();
    wm.create_group(&window_id, &[a]).unwrap();

    let mut settings = VaultSettings::default();
    settings.save_tab_groups = false;

    let captured = engine().capture_current_window_tabs(&wm, &settings);
    assert_eq!(captured[0].group_id, UNGROUPED_TAB_GROUP);
}

#[test]
fn test_capture_page_state_best_effort() {
    let mut wm = WindowManager::new();
    let window_id = wm.create_window();
    let live_id = wm.create_tab(&window_id, "https://a.com", None, false, false).unwrap();
    wm.create_tab(&window_id, "https://no-agent.com", None, false, false).unwrap();

    let mut provider = StaticPageState::new();
    let mut form = HashMap::new();
    form.insert("comment".to_string(), "draft text".to_string());
    form.insert("password".to_string(), "hunter2".to_string());
    provider.register(
        &live_id,
        PageSnapshot {
            scroll_position: Some(ScrollPosition { x: 0.0, y: 420.0 }),
            form_data: Some(form),
        },
    );

    let mut settings = VaultSettings::default();
    settings.save_form_data = true;
    let engine = TabEngine::new(Box::new(provider));
    let captured = engine.capture_current_window_tabs(&wm, &settings);

    let with_state = captured.iter().find(|t| t.url.contains("a.com")).unwrap();
    assert_eq!(
        with_state.scroll_position,
        Some(ScrollPosition { x: 0.0, y: 420.0 })
    );
    let form = with_state.form_data.as_ref().unwrap();
    assert_eq!(form.get("comment").map(String::as_str), Some("draft text"));
    // Credential-like fields never make it into the snapshot.
    assert!(form.get("password").is_none());

    // The provider has nothing for the second tab; capture degrades quietly.
    let without = captured.iter().find(|t| t.url.contains("no-agent")).unwrap();
    assert!(without.scroll_position.is_none());
    assert!(without.form_data.is_none());
}

#[test]
fn test_capture_all_spans_windows() {
    let mut wm = WindowManager::new();
    let w1 = wm.create_window();
    wm.create_tab(&w1, "https://a.com", None, false, false).unwrap();
    let w2 = wm.create_window();
    wm.create_tab(&w2, "https://b.com", None, false, false).unwrap();

    let captured = engine().capture_all_tabs(&wm, &VaultSettings::default());
    assert_eq!(captured.len(), 2);
}

// ─── Restore ───

#[test]
fn test_restore_creates_tabs_in_index_order_in_new_window() {
    let mut wm = WindowManager::new();
    let mut engine = engine();

    // Deliberately shuffled input.
    let tabs = vec![
        record("https://c.com", 2),
        record("https://a.com", 0),
        record("https://b.com", 1),
    ];
    let outcome = engine.restore_tabs(&mut wm, &tabs, &options()).unwrap();
    assert_eq!(outcome.created_tab_ids.len(), 3);

    let urls: Vec<String> = wm
        .tabs_in_window(&outcome.window_id)
        .unwrap()
        .iter()
        .map(|t| t.url.clone())
        .collect();
    assert_eq!(urls, vec!["https://a.com", "https://b.com", "https://c.com"]);
}

#[test]
fn test_restore_removes_default_blank_tab() {
    let mut wm = WindowManager::new();
    let mut engine = engine();

    let outcome = engine
        .restore_tabs(&mut wm, &[record("https://a.com", 0)], &options())
        .unwrap();
    let tabs = wm.tabs_in_window(&outcome.window_id).unwrap();
    assert_eq!(tabs.len(), 1);
    assert_ne!(tabs[0].url, BLANK_URL);
}

#[test]
fn test_restore_lazy_uses_placeholder_and_pending_map() {
    let mut wm = WindowManager::new();
    let mut engine = engine();
    let mut opts = options();
    opts.lazy = true;

    let outcome = engine
        .restore_tabs(&mut wm, &[record("https://slow.example.com", 0)], &opts)
        .unwrap();
    let new_id = outcome.created_tab_ids[0].clone();
    assert_eq!(wm.get_tab(&new_id).unwrap().url, BLANK_URL);

    // One-shot: first fetch yields the target, second yields nothing.
    assert_eq!(
        engine.get_pending_lazy_url(&new_id).as_deref(),
        Some("https://slow.example.com")
    );
    assert!(engine.get_pending_lazy_url(&new_id).is_none());
}

#[test]
fn test_restore_pinned_respects_option() {
    let mut wm = WindowManager::new();
    let mut engine = engine();

    let mut pinned_tab = record("https://a.com", 0);
    pinned_tab.pinned = true;

    let outcome = engine
        .restore_tabs(&mut wm, &[pinned_tab.clone()], &options())
        .unwrap();
    assert!(wm.get_tab(&outcome.created_tab_ids[0]).unwrap().pinned);

    let mut opts = options();
    opts.restore_pinned = false;
    let outcome = engine.restore_tabs(&mut wm, &[pinned_tab], &opts).unwrap();
    assert!(!wm.get_tab(&outcome.created_tab_ids[0]).unwrap().pinned);
}

#[test]
fn test_restore_rebuilds_groups_once_per_old_group() {
    let mut wm = WindowManager::new();
    let mut engine = engine();

    let mut a = record("https://a.com", 0);
    let mut b = record("https://b.com", 1);
    let mut c = record("https://c.com", 2);
    a.group_id = 7;
    a.group_title = Some("Work".to_string());
    a.group_color = Some("blue".to_string());
    b.group_id = 7;
    c.group_id = 9;

    let outcome = engine.restore_tabs(&mut wm, &[a, b, c], &options()).unwrap();
    let tabs = wm.tabs_in_window(&outcome.window_id).unwrap();

    let g_a = tabs[0].group_id;
    let g_b = tabs[1].group_id;
    let g_c = tabs[2].group_id;
    assert_eq!(g_a, g_b);
    assert_ne!(g_a, g_c);
    assert_ne!(g_a, UNGROUPED_TAB_GROUP);

    let group = wm.get_group(g_a).unwrap();
    assert_eq!(group.title.as_deref(), Some("Work"));
    assert_eq!(group.color.as_deref(), Some("blue"));
}

#[test]
fn test_restore_into_current_window() {
    let mut wm = WindowManager::new();
    let window_id = wm.create_window();
    let mut engine = engine();
    let mut opts = options();
    opts.new_window = false;

    let outcome = engine
        .restore_tabs(&mut wm, &[record("https://a.com", 0)], &opts)
        .unwrap();
    assert_eq!(outcome.window_id, window_id);
    // The pre-existing blank tab stays; restore into the current window
    // only appends.
    assert_eq!(wm.tabs_in_window(&window_id).unwrap().len(), 2);
}

// ─── Duplicate detection ───

#[test]
fn test_detect_duplicates_groups_by_url() {
    let mut one = record("https://same.com", 0);
    one.title = "First".to_string();
    let mut two = record("https://same.com", 1);
    two.title = "Second".to_string();
    let unique = record("https://unique.com", 2);

    let dupes = TabEngine::detect_duplicates(&[one, two, unique]);
    assert_eq!(dupes.len(), 1);
    assert_eq!(dupes.get("https://same.com").unwrap().len(), 2);
}
