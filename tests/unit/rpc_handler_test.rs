//! Unit tests for the RPC handler — every method goes through the same
//! dispatch path the real `tabvault-rpc` binary uses, against a temporary
//! on-disk database.

use std::sync::Mutex;

use serde_json::json;
use tempfile::TempDir;

use tabvault::app::App;
use tabvault::managers::window_manager::WindowManagerTrait;
use tabvault::rpc_handler::{base64_decode, base64_encode, dispatch, handle_method};

/// Create a fresh App backed by a temp directory DB.
fn setup() -> (Mutex<App>, TempDir) {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let db_path = tmp.path().join("test.db");
    let app = App::new(db_path.to_str().unwrap()).expect("Failed to init App");
    (Mutex::new(app), tmp)
}

/// Open a window with the given tabs in the app's live model.
fn open_tabs(app: &Mutex<App>, urls: &[&str]) -> String {
    let mut a = app.lock().unwrap();
    let window_id = a.windows.create_window();
    for url in urls {
        a.windows
            .create_tab(&window_id, url, None, false, false)
            .unwrap();
    }
    window_id
}

// ─── Envelope / ping / unknown ───

#[test]
fn test_ping() {
    let (app, _tmp) = setup();
    let res = handle_method(&app, "ping", &json!({})).unwrap();
    assert_eq!(res, json!({"pong": true}));
}

#[test]
fn test_unknown_method_maps_to_error_envelope() {
    let (app, _tmp) = setup();
    let res = dispatch(&app, "nonexistent.method", &json!({}));
    assert_eq!(res["success"], false);
    assert_eq!(res["error"], "Unknown message type");
}

#[test]
fn test_dispatch_wraps_success() {
    let (app, _tmp) = setup();
    let res = dispatch(&app, "ping", &json!({}));
    assert_eq!(res["success"], true);
    assert_eq!(res["data"]["pong"], true);
}

#[test]
fn test_handler_error_never_escapes() {
    let (app, _tmp) = setup();
    // Missing required param becomes a well-formed error response.
    let res = dispatch(&app, "session.get", &json!({}));
    assert_eq!(res["success"], false);
    assert!(res["error"].as_str().unwrap().contains("missing id"));
}

// ─── Session lifecycle end to end ───

#[test]
fn test_session_save_list_restore_delete_scenario() {
    let (app, _tmp) = setup();
    let source = open_tabs(
        &app,
        &[
            "https://papers.example.com/1",
            "https://papers.example.com/2",
            "https://data.org/set",
        ],
    );

    // Save the "Research" session.
    let saved = handle_method(&app, "session.save", &json!({"name": "Research"})).unwrap();
    let session_id = saved["id"].as_str().unwrap().to_string();
    assert_eq!(saved["name"], "Research");

    // Listed with tabCount 3 and a 2-entry domain preview.
    let list = handle_method(&app, "session.list", &json!({})).unwrap();
    let entries = list.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["tab_count"], 3);
    assert_eq!(entries[0]["domain_preview"].as_array().unwrap().len(), 2);

    // Close the source so duplicate suppression has nothing to match.
    app.lock().unwrap().windows.close_window(&source).unwrap();

    // Restore eagerly into a new window.
    let restored = handle_method(
        &app,
        "session.restore",
        &json!({"id": session_id, "lazy": false, "new_window": true}),
    )
    .unwrap();
    assert_eq!(restored["created_tab_ids"].as_array().unwrap().len(), 3);
    let window_id = restored["window_id"].as_str().unwrap().to_string();

    {
        let a = app.lock().unwrap();
        let urls: Vec<String> = a
            .windows
            .tabs_in_window(&window_id)
            .unwrap()
            .iter()
            .map(|t| t.url.clone())
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://papers.example.com/1",
                "https://papers.example.com/2",
                "https://data.org/set",
            ]
        );
    }

    // Delete and confirm it is gone from the listing.
    let deleted = handle_method(&app, "session.delete", &json!({"id": session_id})).unwrap();
    assert_eq!(deleted["deleted"], true);
    let list = handle_method(&app, "session.list", &json!({})).unwrap();
    assert!(list.as_array().unwrap().is_empty());
}

#[test]
fn test_session_save_requires_tabs() {
    let (app, _tmp) = setup();
    let res = dispatch(&app, "session.save", &json!({"name": "Empty"}));
    assert_eq!(res["success"], false);
    assert!(res["error"].as_str().unwrap().contains("No valid tabs"));
}

#[test]
fn test_session_update_via_rpc() {
    let (app, _tmp) = setup();
    open_tabs(&app, &["https://a.com"]);
    let saved = handle_method(&app, "session.save", &json!({"name": "Before"})).unwrap();
    let id = saved["id"].as_str().unwrap();

    let updated = handle_method(
        &app,
        "session.update",
        &json!({"id": id, "name": "After", "tags": ["One", "one"]}),
    )
    .unwrap();
    assert_eq!(updated["name"], "After");
    assert_eq!(updated["tags"], json!(["one"]));
    assert_eq!(updated["version"], 2);
}

#[test]
fn test_lazy_restore_and_tab_activated() {
    let (app, _tmp) = setup();
    let source = open_tabs(&app, &["https://slow.example.com/page"]);
    let saved = handle_method(&app, "session.save", &json!({"name": "Lazy"})).unwrap();
    let id = saved["id"].as_str().unwrap().to_string();
    app.lock().unwrap().windows.close_window(&source).unwrap();

    let restored = handle_method(
        &app,
        "session.restore",
        &json!({"id": id, "lazy": true, "new_window": true}),
    )
    .unwrap();
    let tab_id = restored["created_tab_ids"][0].as_str().unwrap().to_string();

    // Placeholder until activation.
    {
        let a = app.lock().unwrap();
        assert_eq!(a.windows.get_tab(&tab_id).unwrap().url, "about:blank");
    }

    let activated =
        handle_method(&app, "tab.activated", &json!({"tab_id": tab_id})).unwrap();
    assert_eq!(activated["url"], "https://slow.example.com/page");
    {
        let a = app.lock().unwrap();
        assert_eq!(
            a.windows.get_tab(&tab_id).unwrap().url,
            "https://slow.example.com/page"
        );
    }

    // Second activation is a no-op.
    let again = handle_method(&app, "tab.activated", &json!({"tab_id": tab_id})).unwrap();
    assert!(again["url"].is_null());
}

#[test]
fn test_merge_and_split_via_rpc() {
    let (app, _tmp) = setup();
    let w1 = open_tabs(&app, &["https://shared.com", "https://a.com"]);
    let first = handle_method(&app, "session.save", &json!({"name": "First"})).unwrap();
    app.lock().unwrap().windows.close_window(&w1).unwrap();
    open_tabs(&app, &["https://shared.com", "https://b.com"]);
    let second = handle_method(&app, "session.save", &json!({"name": "Second"})).unwrap();

    let merged = handle_method(
        &app,
        "session.merge",
        &json!({"ids": [first["id"], second["id"]], "name": "Merged"}),
    )
    .unwrap();
    assert_eq!(merged["tabs"].as_array().unwrap().len(), 3);

    let split = handle_method(
        &app,
        "session.split",
        &json!({"id": merged["id"]}),
    )
    .unwrap();
    assert_eq!(split.as_array().unwrap().len(), 3);
}

// ─── Folders ───

#[test]
fn test_folder_crud() {
    let (app, _tmp) = setup();
    let created = handle_method(&app, "folder.create", &json!({"name": "Projects"})).unwrap();
    let id = created["id"].as_str().unwrap();
    assert_eq!(created["name"], "Projects");
    assert_eq!(created["position"], 0);

    let second = handle_method(&app, "folder.create", &json!({"name": "Archive"})).unwrap();
    assert_eq!(second["position"], 1);

    let updated = handle_method(
        &app,
        "folder.update",
        &json!({"id": id, "name": "Renamed", "color": "blue"}),
    )
    .unwrap();
    assert_eq!(updated["name"], "Renamed");
    assert_eq!(updated["color"], "blue");

    let list = handle_method(&app, "folder.list", &json!({})).unwrap();
    assert_eq!(list.as_array().unwrap().len(), 2);

    let deleted = handle_method(&app, "folder.delete", &json!({"id": id})).unwrap();
    assert_eq!(deleted["deleted"], true);
}

// ─── Settings ───

#[test]
fn test_settings_get_and_update() {
    let (app, _tmp) = setup();
    let settings = handle_method(&app, "settings.get", &json!({})).unwrap();
    assert_eq!(settings["compression_threshold"], 20);

    let updated = handle_method(
        &app,
        "settings.update",
        &json!({"settings": {"compression_threshold": 5, "lazy_restore": false}}),
    )
    .unwrap();
    assert_eq!(updated["compression_threshold"], 5);
    assert_eq!(updated["lazy_restore"], false);

    // Unpatched fields keep their values.
    assert_eq!(updated["max_emergency_sessions"], 5);

    let reread = handle_method(&app, "settings.get", &json!({})).unwrap();
    assert_eq!(reread["compression_threshold"], 5);
}

// ─── Search ───

#[test]
fn test_search_sessions_via_rpc() {
    let (app, _tmp) = setup();
    open_tabs(&app, &["https://a.com"]);
    handle_method(&app, "session.save", &json!({"name": "Quantum Research"})).unwrap();

    let hits = handle_method(&app, "search.sessions", &json!({"query": "quantum"})).unwrap();
    let arr = hits.as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["metadata"]["name"], "Quantum Research");
    assert!(arr[0]["score"].as_f64().unwrap() > 0.5);
}

#[test]
fn test_search_sees_fresh_writes_through_invalidation() {
    let (app, _tmp) = setup();
    open_tabs(&app, &["https://a.com"]);

    // Warm the cache with an empty listing, then save through the handler.
    let empty = handle_method(&app, "search.sessions", &json!({"query": ""})).unwrap();
    assert!(empty.as_array().unwrap().is_empty());

    handle_method(&app, "session.save", &json!({"name": "Fresh"})).unwrap();
    let hits = handle_method(&app, "search.sessions", &json!({"query": ""})).unwrap();
    assert_eq!(hits.as_array().unwrap().len(), 1);
}

#[test]
fn test_search_filtered_via_rpc() {
    let (app, _tmp) = setup();
    open_tabs(&app, &["https://a.com"]);
    handle_method(
        &app,
        "session.save",
        &json!({"name": "Tagged", "tags": ["work"]}),
    )
    .unwrap();

    let hits = handle_method(
        &app,
        "search.filtered",
        &json!({"query": "", "tags": ["work"]}),
    )
    .unwrap();
    assert_eq!(hits.as_array().unwrap().len(), 1);

    let none = handle_method(
        &app,
        "search.filtered",
        &json!({"query": "", "tags": ["absent"]}),
    )
    .unwrap();
    assert!(none.as_array().unwrap().is_empty());
}

// ─── Export / import ───

#[test]
fn test_export_import_via_base64_blob() {
    let (app, _tmp) = setup();
    open_tabs(&app, &["https://a.com/x"]);
    handle_method(&app, "session.save", &json!({"name": "Exported"})).unwrap();

    let exported = handle_method(&app, "export.sessions", &json!({})).unwrap();
    let blob = exported["data"].as_str().unwrap();
    let text = String::from_utf8(base64_decode(blob).unwrap()).unwrap();
    assert!(text.contains("\"version\": \"1.0\""));

    // Import into a second app instance.
    let (app2, _tmp2) = setup();
    let report = handle_method(&app2, "import.sessions", &json!({"data": blob})).unwrap();
    assert_eq!(report["success"], true);
    assert_eq!(report["imported_sessions"], 1);

    let list = handle_method(&app2, "session.list", &json!({})).unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[test]
fn test_import_bad_envelope_reports_failure() {
    let (app, _tmp) = setup();
    let blob = base64_encode(br#"{"version":"1.0"}"#);
    let report = handle_method(&app, "import.sessions", &json!({"data": blob})).unwrap();
    assert_eq!(report["success"], false);
    assert!(!report["errors"].as_array().unwrap().is_empty());
}

// ─── Crash / emergency / stats / versions ───

#[test]
fn test_crash_check_and_clear() {
    let (app, _tmp) = setup();
    let check = handle_method(&app, "crash.check", &json!({})).unwrap();
    assert_eq!(check["crashed"], false);

    let cleared = handle_method(&app, "crash.clear", &json!({})).unwrap();
    assert_eq!(cleared["ok"], true);
}

#[test]
fn test_emergency_backup_list_clear() {
    let (app, _tmp) = setup();
    open_tabs(&app, &["https://a.com"]);

    let backup = handle_method(&app, "emergency.backup", &json!({})).unwrap();
    assert_eq!(backup["is_emergency"], true);

    let list = handle_method(&app, "emergency.list", &json!({})).unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);

    handle_method(&app, "emergency.clear", &json!({})).unwrap();
    let list = handle_method(&app, "emergency.list", &json!({})).unwrap();
    assert!(list.as_array().unwrap().is_empty());
}

#[test]
fn test_version_lifecycle_via_rpc() {
    let (app, _tmp) = setup();
    open_tabs(&app, &["https://a.com"]);
    let saved = handle_method(&app, "session.save", &json!({"name": "Versioned"})).unwrap();
    let id = saved["id"].as_str().unwrap();

    let version =
        handle_method(&app, "version.create", &json!({"session_id": id})).unwrap();
    let version_id = version["version_id"].as_str().unwrap();

    let list = handle_method(&app, "version.list", &json!({"session_id": id})).unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);

    let restored = handle_method(
        &app,
        "version.restore",
        &json!({"session_id": id, "version_id": version_id}),
    )
    .unwrap();
    assert_eq!(restored["id"], saved["id"]);

    let deleted =
        handle_method(&app, "version.delete", &json!({"session_id": id})).unwrap();
    assert_eq!(deleted["deleted"], true);
}

#[test]
fn test_stats_reflect_activity() {
    let (app, _tmp) = setup();
    open_tabs(&app, &["https://a.com", "https://b.com"]);
    handle_method(&app, "session.save", &json!({"name": "Counted"})).unwrap();

    let stats = handle_method(&app, "stats.get", &json!({})).unwrap();
    assert_eq!(stats["sessions_saved"], 1);
    assert_eq!(stats["tabs_saved"], 2);

    handle_method(&app, "stats.clear", &json!({})).unwrap();
    let stats = handle_method(&app, "stats.get", &json!({})).unwrap();
    assert_eq!(stats["sessions_saved"], 0);
}
