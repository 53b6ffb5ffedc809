//! TabVault RPC server — JSON-RPC over stdin/stdout for frontend integration.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"session.save", "params":{"name":"..."}}
//! Response: {"id":1, "result":{"success":true, "data":{...}}}
//!
//! The result field is always the `{success, data?, error?}` envelope; the
//! boundary never lets an error escape as anything else.

use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::{json, Value};

use tabvault::app::{schedule_emergency_backups, App};
use tabvault::rpc_handler::dispatch;

/// Simple rate limiter: max requests per second.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self {
            window_start: Instant::now(),
            request_count: 0,
            max_per_second,
        }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&mut self) -> bool {
        let elapsed = self.window_start.elapsed();
        if elapsed.as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

fn db_path() -> std::path::PathBuf {
    if let Ok(dir) = std::env::var("TABVAULT_DATA_DIR") {
        std::path::PathBuf::from(dir).join("tabvault.db")
    } else if let Ok(exe) = std::env::current_exe() {
        exe.parent()
            .unwrap_or(std::path::Path::new("."))
            .join("tabvault.db")
    } else {
        std::path::PathBuf::from("tabvault.db")
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .init();

    let db_path = db_path();
    let app = App::new(db_path.to_str().unwrap_or("tabvault.db"))
        .expect("Failed to initialize TabVault");
    let app = Arc::new(Mutex::new(app));

    // Crash check, then register the recurring emergency backup.
    let crashed = app.lock().expect("app lock").startup();
    schedule_emergency_backups(&app);

    let ready = json!({
        "event": "ready",
        "version": env!("CARGO_PKG_VERSION"),
        "crash_detected": crashed,
    });
    println!("{}", ready);
    io::stdout().flush().expect("flush stdout");

    // Max 200 RPC requests per second to keep a runaway frontend in check.
    let mut rate_limiter = RateLimiter::new(200);

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                let err = json!({"id": null, "error": format!("parse error: {}", e)});
                println!("{}", err);
                io::stdout().flush().expect("flush stdout");
                continue;
            }
        };

        let id = req.get("id").cloned().unwrap_or(Value::Null);

        if !rate_limiter.check() {
            let response = json!({"id": id, "error": "rate limit exceeded"});
            println!("{}", response);
            io::stdout().flush().expect("flush stdout");
            continue;
        }

        let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
        let params = req.get("params").cloned().unwrap_or(json!({}));

        if method == "shutdown" {
            app.lock().expect("app lock").shutdown();
            let response = json!({"id": id, "result": {"success": true}});
            println!("{}", response);
            io::stdout().flush().expect("flush stdout");
            break;
        }

        let result = dispatch(&app, method, &params);
        let response = json!({"id": id, "result": result});
        println!("{}", response);
        io::stdout().flush().expect("flush stdout");
    }
}
