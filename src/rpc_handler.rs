//! RPC method handler for the TabVault message protocol.
//!
//! Extracted from the binary so it can be unit-tested independently. One
//! request type per operation; every response is a `{success, data?, error?}`
//! envelope produced by [`dispatch`], and no handler-level error ever
//! escapes unhandled. Mutating handlers invalidate the search index — the
//! index has no subscription mechanism, so this is the callers' contract.

use std::sync::Mutex;

use serde_json::{json, Value};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::app::App;
use crate::database::SessionStore;
use crate::managers::session_manager::{
    CreateSessionOptions, SessionManagerTrait, SessionUpdate,
};
use crate::managers::tab_engine::RestoreOptions;
use crate::managers::window_manager::WindowManagerTrait;
use crate::services::crash_recovery::CrashRecoveryTrait;
use crate::services::search_index::SearchFilters;
use crate::types::export::ImportOptions;
use crate::types::folder::Folder;
use crate::types::settings::VaultSettings;

/// Encode bytes to base64 string.
pub fn base64_encode(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Decode base64 string to bytes.
pub fn base64_decode(input: &str) -> Result<Vec<u8>, String> {
    BASE64
        .decode(input)
        .map_err(|e| format!("base64 decode error: {}", e))
}

/// Wraps a `handle_method` outcome into the response envelope. Every path
/// ends in a well-formed `{success, ...}` value.
pub fn dispatch(app: &Mutex<App>, method: &str, params: &Value) -> Value {
    match handle_method(app, method, params) {
        Ok(data) => json!({"success": true, "data": data}),
        Err(error) => json!({"success": false, "error": error}),
    }
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn opt_str(params: &Value, key: &str) -> Option<String> {
    params.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn str_list(params: &Value, key: &str) -> Vec<String> {
    params
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Dispatch a method call to the appropriate manager or service.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub fn handle_method(app: &Mutex<App>, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        // ─── Sessions ───
        "session.save" => {
            let name = params.get("name").and_then(|v| v.as_str()).ok_or("missing name")?;
            let opts = CreateSessionOptions {
                all_windows: params
                    .get("all_windows")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
                description: opt_str(params, "description"),
                tags: str_list(params, "tags"),
                folder_id: opt_str(params, "folder_id"),
            };
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let App {
                ref windows,
                ref session_manager,
                ref mut search_index,
                ..
            } = *a;
            let session = session_manager
                .create_session(windows, name, &opts)
                .map_err(|e| e.to_string())?;
            search_index.invalidate();
            serde_json::to_value(session).map_err(|e| e.to_string())
        }
        "session.list" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            let sessions = a.session_manager.list_sessions().map_err(|e| e.to_string())?;
            serde_json::to_value(sessions).map_err(|e| e.to_string())
        }
        "session.get" => {
            let id = params.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let session = a.session_manager.get_session(id).map_err(|e| e.to_string())?;
            serde_json::to_value(session).map_err(|e| e.to_string())
        }
        "session.update" => {
            let id = params.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
            let updates = SessionUpdate {
                name: opt_str(params, "name"),
                description: opt_str(params, "description"),
                tags: params
                    .get("tags")
                    .map(|_| str_list(params, "tags")),
                // A present-but-null folder_id clears the folder.
                folder_id: params.get("folder_id").map(|v| {
                    v.as_str().map(str::to_string)
                }),
            };
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let updated = a
                .session_manager
                .update_session(id, &updates)
                .map_err(|e| e.to_string())?;
            a.search_index.invalidate();
            serde_json::to_value(updated).map_err(|e| e.to_string())
        }
        "session.delete" => {
            let id = params.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let deleted = a.session_manager.delete_session(id).map_err(|e| e.to_string())?;
            a.search_index.invalidate();
            Ok(json!({"deleted": deleted}))
        }
        "session.restore" => {
            let id = params.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
            let tab_ids = params.get("tab_ids").map(|_| str_list(params, "tab_ids"));
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let App {
                ref db,
                ref mut windows,
                ref mut session_manager,
                ref mut search_index,
                ..
            } = *a;
            let settings = {
                let conn = db.connection();
                SessionStore::new(&conn)
                    .get_settings()
                    .map_err(|e| e.to_string())?
            };
            let mut options = RestoreOptions::from_settings(&settings);
            if let Some(lazy) = params.get("lazy").and_then(|v| v.as_bool()) {
                options.lazy = lazy;
            }
            if let Some(new_window) = params.get("new_window").and_then(|v| v.as_bool()) {
                options.new_window = new_window;
            }
            if let Some(pinned) = params.get("restore_pinned").and_then(|v| v.as_bool()) {
                options.restore_pinned = pinned;
            }
            if let Some(groups) = params.get("restore_groups").and_then(|v| v.as_bool()) {
                options.restore_groups = groups;
            }
            let outcome = session_manager
                .restore_session(windows, id, tab_ids.as_deref(), Some(options))
                .map_err(|e| e.to_string())?;
            search_index.invalidate();
            Ok(json!({
                "window_id": outcome.window_id,
                "created_tab_ids": outcome.created_tab_ids,
            }))
        }
        "session.duplicate" => {
            let id = params.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
            let new_name = params.get("new_name").and_then(|v| v.as_str());
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let copy = a
                .session_manager
                .duplicate_session(id, new_name)
                .map_err(|e| e.to_string())?;
            a.search_index.invalidate();
            serde_json::to_value(copy).map_err(|e| e.to_string())
        }
        "session.merge" => {
            let ids = str_list(params, "ids");
            let name = params.get("name").and_then(|v| v.as_str()).ok_or("missing name")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let merged = a
                .session_manager
                .merge_sessions(&ids, name)
                .map_err(|e| e.to_string())?;
            a.search_index.invalidate();
            serde_json::to_value(merged).map_err(|e| e.to_string())
        }
        "session.split" => {
            let id = params.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let parts = a.session_manager.split_session(id).map_err(|e| e.to_string())?;
            a.search_index.invalidate();
            serde_json::to_value(parts).map_err(|e| e.to_string())
        }

        // ─── Lazy restore callback ───
        "tab.activated" => {
            let tab_id = params.get("tab_id").and_then(|v| v.as_str()).ok_or("missing tab_id")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let App {
                ref mut windows,
                ref mut session_manager,
                ..
            } = *a;
            match session_manager.take_pending_lazy_url(tab_id) {
                Some(url) => {
                    windows.navigate_tab(tab_id, &url).map_err(|e| e.to_string())?;
                    Ok(json!({"url": url}))
                }
                None => Ok(json!({"url": null})),
            }
        }

        // ─── Folders ───
        "folder.create" => {
            let name = params.get("name").and_then(|v| v.as_str()).ok_or("missing name")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let conn = a.db.connection();
            let store = SessionStore::new(&conn);
            let position = store
                .get_folders()
                .map_err(|e| e.to_string())?
                .iter()
                .map(|f| f.position)
                .max()
                .unwrap_or(-1)
                + 1;
            let ts = now();
            let folder = Folder {
                id: uuid::Uuid::new_v4().to_string(),
                name: crate::services::validation::sanitize_folder_name(name),
                color: opt_str(params, "color"),
                icon: opt_str(params, "icon"),
                parent_id: opt_str(params, "parent_id"),
                position,
                created_at: ts,
                updated_at: ts,
            };
            store.save_folder(&folder).map_err(|e| e.to_string())?;
            serde_json::to_value(folder).map_err(|e| e.to_string())
        }
        "folder.list" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            let conn = a.db.connection();
            let folders = SessionStore::new(&conn)
                .get_folders()
                .map_err(|e| e.to_string())?;
            serde_json::to_value(folders).map_err(|e| e.to_string())
        }
        "folder.update" => {
            let id = params.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let conn = a.db.connection();
            let store = SessionStore::new(&conn);
            let mut folder = store
                .get_folders()
                .map_err(|e| e.to_string())?
                .into_iter()
                .find(|f| f.id == id)
                .ok_or_else(|| format!("Folder not found: {}", id))?;
            if let Some(name) = params.get("name").and_then(|v| v.as_str()) {
                folder.name = crate::services::validation::sanitize_folder_name(name);
            }
            if let Some(color) = params.get("color") {
                folder.color = color.as_str().map(str::to_string);
            }
            if let Some(icon) = params.get("icon") {
                folder.icon = icon.as_str().map(str::to_string);
            }
            if let Some(parent_id) = params.get("parent_id") {
                folder.parent_id = parent_id.as_str().map(str::to_string);
            }
            if let Some(position) = params.get("position").and_then(|v| v.as_i64()) {
                folder.position = position as i32;
            }
            folder.updated_at = now();
            store.save_folder(&folder).map_err(|e| e.to_string())?;
            serde_json::to_value(folder).map_err(|e| e.to_string())
        }
        "folder.delete" => {
            let id = params.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let conn = a.db.connection();
            let deleted = SessionStore::new(&conn)
                .delete_folder(id)
                .map_err(|e| e.to_string())?;
            Ok(json!({"deleted": deleted}))
        }

        // ─── Settings ───
        "settings.get" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            let conn = a.db.connection();
            let settings = SessionStore::new(&conn)
                .get_settings()
                .map_err(|e| e.to_string())?;
            serde_json::to_value(settings).map_err(|e| e.to_string())
        }
        "settings.update" => {
            let patch = params
                .get("settings")
                .and_then(|v| v.as_object())
                .ok_or("missing settings object")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let conn = a.db.connection();
            let store = SessionStore::new(&conn);
            let current = store.get_settings().map_err(|e| e.to_string())?;
            let mut merged = serde_json::to_value(current).map_err(|e| e.to_string())?;
            if let Some(obj) = merged.as_object_mut() {
                for (key, value) in patch {
                    obj.insert(key.clone(), value.clone());
                }
            }
            let updated: VaultSettings =
                serde_json::from_value(merged).map_err(|e| e.to_string())?;
            store.save_settings(&updated).map_err(|e| e.to_string())?;
            serde_json::to_value(updated).map_err(|e| e.to_string())
        }

        // ─── Search ───
        "search.sessions" => {
            let query = params.get("query").and_then(|v| v.as_str()).unwrap_or("");
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let hits = a
                .search_index
                .search_sessions(query)
                .map_err(|e| e.to_string())?;
            let arr: Vec<Value> = hits
                .iter()
                .map(|h| {
                    json!({
                        "metadata": serde_json::to_value(&h.metadata).unwrap_or(Value::Null),
                        "score": h.score,
                    })
                })
                .collect();
            Ok(json!(arr))
        }
        "search.filtered" => {
            let query = params.get("query").and_then(|v| v.as_str()).unwrap_or("");
            let filters = SearchFilters {
                tags: str_list(params, "tags"),
                domains: str_list(params, "domains"),
                folder_id: opt_str(params, "folder_id"),
                created_from: params.get("created_from").and_then(|v| v.as_i64()),
                created_to: params.get("created_to").and_then(|v| v.as_i64()),
                min_tabs: params.get("min_tabs").and_then(|v| v.as_u64()).map(|n| n as usize),
                max_tabs: params.get("max_tabs").and_then(|v| v.as_u64()).map(|n| n as usize),
            };
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let hits = a
                .search_index
                .search_with_filters(query, &filters)
                .map_err(|e| e.to_string())?;
            let arr: Vec<Value> = hits
                .iter()
                .map(|h| {
                    json!({
                        "metadata": serde_json::to_value(&h.metadata).unwrap_or(Value::Null),
                        "score": h.score,
                    })
                })
                .collect();
            Ok(json!(arr))
        }
        "search.tabs" => {
            let query = params.get("query").and_then(|v| v.as_str()).unwrap_or("");
            let a = app.lock().map_err(|e| e.to_string())?;
            let hits = match params.get("session_id").and_then(|v| v.as_str()) {
                Some(session_id) => a
                    .search_index
                    .search_tabs_in_session(session_id, query)
                    .map_err(|e| e.to_string())?,
                None => a
                    .search_index
                    .search_tabs_global(query)
                    .map_err(|e| e.to_string())?,
            };
            let arr: Vec<Value> = hits
                .iter()
                .map(|h| {
                    json!({
                        "session_id": h.session_id,
                        "tab": serde_json::to_value(&h.tab).unwrap_or(Value::Null),
                        "score": h.score,
                    })
                })
                .collect();
            Ok(json!(arr))
        }

        // ─── Export / import ───
        "export.sessions" => {
            let ids = params.get("ids").map(|_| str_list(params, "ids"));
            let include_settings = params
                .get("include_settings")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let a = app.lock().map_err(|e| e.to_string())?;
            let text = a
                .backup_manager
                .export_to_json(ids.as_deref(), include_settings)
                .map_err(|e| e.to_string())?;
            Ok(json!({"data": base64_encode(text.as_bytes())}))
        }
        "import.sessions" => {
            let text = match params.get("data").and_then(|v| v.as_str()) {
                Some(blob) => {
                    let bytes = base64_decode(blob)?;
                    String::from_utf8(bytes).map_err(|e| e.to_string())?
                }
                None => params
                    .get("json")
                    .and_then(|v| v.as_str())
                    .ok_or("missing data")?
                    .to_string(),
            };
            let opts = ImportOptions {
                overwrite: params
                    .get("overwrite")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
                import_settings: params
                    .get("import_settings")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            };
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let report = a
                .backup_manager
                .import_from_json(&text, &opts)
                .map_err(|e| e.to_string())?;
            a.search_index.invalidate();
            serde_json::to_value(report).map_err(|e| e.to_string())
        }

        // ─── Crash recovery / emergency sessions ───
        "crash.check" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            let crashed = a
                .crash_recovery
                .was_crash_detected()
                .map_err(|e| e.to_string())?;
            Ok(json!({"crashed": crashed}))
        }
        "crash.clear" => {
            let mut a = app.lock().map_err(|e| e.to_string())?;
            a.crash_recovery
                .clear_crash_detection()
                .map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "emergency.backup" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            let App {
                ref windows,
                ref session_manager,
                ..
            } = *a;
            let session = session_manager
                .create_emergency_session(windows)
                .map_err(|e| e.to_string())?;
            serde_json::to_value(session).map_err(|e| e.to_string())
        }
        "emergency.list" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            let conn = a.db.connection();
            let sessions = SessionStore::new(&conn)
                .get_emergency_sessions()
                .map_err(|e| e.to_string())?;
            serde_json::to_value(sessions).map_err(|e| e.to_string())
        }
        "emergency.clear" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            let conn = a.db.connection();
            SessionStore::new(&conn)
                .clear_emergency_sessions()
                .map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        // ─── Version history ───
        "version.create" => {
            let session_id = params
                .get("session_id")
                .and_then(|v| v.as_str())
                .ok_or("missing session_id")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let version = a
                .backup_manager
                .create_version(session_id)
                .map_err(|e| e.to_string())?;
            serde_json::to_value(version).map_err(|e| e.to_string())
        }
        "version.list" => {
            let session_id = params
                .get("session_id")
                .and_then(|v| v.as_str())
                .ok_or("missing session_id")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let versions = a
                .backup_manager
                .list_versions(session_id)
                .map_err(|e| e.to_string())?;
            serde_json::to_value(versions).map_err(|e| e.to_string())
        }
        "version.restore" => {
            let session_id = params
                .get("session_id")
                .and_then(|v| v.as_str())
                .ok_or("missing session_id")?;
            let version_id = params
                .get("version_id")
                .and_then(|v| v.as_str())
                .ok_or("missing version_id")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let session = a
                .backup_manager
                .restore_version(session_id, version_id)
                .map_err(|e| e.to_string())?;
            a.search_index.invalidate();
            serde_json::to_value(session).map_err(|e| e.to_string())
        }
        "version.delete" => {
            let session_id = params
                .get("session_id")
                .and_then(|v| v.as_str())
                .ok_or("missing session_id")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let deleted = a
                .backup_manager
                .delete_version_history(session_id)
                .map_err(|e| e.to_string())?;
            Ok(json!({"deleted": deleted}))
        }

        // ─── Statistics ───
        "stats.get" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            let conn = a.db.connection();
            let stats = SessionStore::new(&conn)
                .get_statistics()
                .map_err(|e| e.to_string())?;
            serde_json::to_value(stats).map_err(|e| e.to_string())
        }
        "stats.clear" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            let conn = a.db.connection();
            SessionStore::new(&conn)
                .clear_statistics()
                .map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        // ─── Ping ───
        "ping" => Ok(json!({"pong": true})),

        _ => Err("Unknown message type".to_string()),
    }
}
