//! markd RPC Server: JSON-RPC over stdin/stdout for the page front end.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"bookmark.create", "params":{"title":"...","url":"..."}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//! Event:    {"event":"view.update", "view_id":"...", "bookmarks":[...]}
//!
//! Logs go to stderr; stdout carries only protocol lines.

use std::sync::Arc;
use std::time::Instant;

use markd::app::App;
use markd::rpc_handler::{handle_method, RpcContext};
use markd::services::config_loader::ConfigLoader;

use serde_json::{json, Value};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

/// Simple rate limiter: max requests per one-second window.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self { window_start: Instant::now(), request_count: 0, max_per_second }
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

/// Serializes every outbound line through one task so responses and events
/// never interleave mid-line.
async fn write_lines(mut rx: mpsc::UnboundedReceiver<Value>) {
    let mut stdout = io::stdout();
    while let Some(msg) = rx.recv().await {
        let mut line = msg.to_string();
        line.push('\n');
        if stdout.write_all(line.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
            break;
        }
    }
}

#[tokio::main]
async fn main() {
    let config = match ConfigLoader::new(None).load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("markd: {}", e);
            std::process::exit(2);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let max_rps = config.rpc.max_requests_per_second;
    let app = match App::new(config) {
        Ok(app) => Arc::new(app),
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize markd");
            std::process::exit(1);
        }
    };

    let (out_tx, out_rx) = mpsc::unbounded_channel::<Value>();
    let writer = tokio::spawn(write_lines(out_rx));
    let ctx = RpcContext::new(app, out_tx.clone());

    let _ = out_tx.send(json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")}));
    tracing::info!("markd rpc ready");

    let mut rate_limiter = RateLimiter::new(max_rps);
    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(l)) => l,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() { continue; }

        let req: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                let _ = out_tx.send(json!({"id": null, "error": format!("parse error: {}", e)}));
                continue;
            }
        };

        let id = req.get("id").cloned().unwrap_or(Value::Null);

        if !rate_limiter.check() {
            tracing::warn!("rate limit exceeded");
            let _ = out_tx.send(json!({"id": id, "error": "rate limit exceeded"}));
            continue;
        }

        let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
        let params = req.get("params").cloned().unwrap_or(json!({}));

        let response = match handle_method(&ctx, method, &params).await {
            Ok(val) => json!({"id": id, "result": val}),
            Err(err) => {
                tracing::debug!(method, error = %err, "rpc error");
                json!({"id": id, "error": err})
            }
        };
        let _ = out_tx.send(response);
    }

    ctx.close_all_views().await;
    drop(ctx);
    drop(out_tx);
    let _ = writer.await;
    tracing::info!("markd rpc stopped");
}
