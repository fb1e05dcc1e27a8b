use std::io::{self, BufRead, Write};

use studenthub::config::HubConfig;
use studenthub::ipc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    let config = match HubConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("hubd: invalid configuration: {e:#}");
            std::process::exit(2);
        }
    };

    // stdout carries the protocol; logs go to stderr only.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .with_writer(io::stderr)
        .init();

    let mut state = ipc::AppState::new(config);
    if let Some(path) = state.config.workspace.clone() {
        match state.open_workspace(path.clone()) {
            Ok(()) => info!(workspace = %path.display(), "workspace opened from environment"),
            Err(e) => warn!(workspace = %path.display(), error = %e, "startup workspace failed to open"),
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id; answer with an id-less error line.
                let _ = writeln!(
                    stdout,
                    "{}",
                    serde_json::json!({
                        "ok": false,
                        "error": { "code": "bad_json", "message": e.to_string() }
                    })
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
