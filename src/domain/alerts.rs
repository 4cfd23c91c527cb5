//! Alert sink
//!
//! Appends trading events (opens, closes, kill switch, save failures)
//! as JSON lines to a local file for the operator to tail or post-
//! process. Emitting never fails and never blocks the trading loop; a
//! broken file is logged once per attempt and the event is dropped.

use chrono::Utc;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// One line in the alerts file
#[derive(Debug, Serialize)]
struct AlertRecord<'a> {
    timestamp: String,
    #[serde(rename = "type")]
    kind: &'a str,
    message: &'a str,
    data: serde_json::Value,
}

#[derive(Debug)]
struct Inner {
    path: Option<PathBuf>,
    /// Suppresses nested emits from within a failing emit
    emitting: AtomicBool,
}

/// Cheaply cloneable handle shared across cycles.
#[derive(Debug, Clone)]
pub struct AlertSink {
    inner: Arc<Inner>,
}

impl AlertSink {
    pub fn new(path: PathBuf) -> Self {
        Self {
            inner: Arc::new(Inner {
                path: Some(path),
                emitting: AtomicBool::new(false),
            }),
        }
    }

    /// Sink that drops everything, for tests and status commands.
    pub fn disabled() -> Self {
        Self {
            inner: Arc::new(Inner {
                path: None,
                emitting: AtomicBool::new(false),
            }),
        }
    }

    /// Append one event. Best effort; IO failures are logged and
    /// swallowed.
    pub fn emit(&self, kind: &str, message: &str, data: serde_json::Value) {
        let Some(path) = &self.inner.path else {
            return;
        };
        if self.inner.emitting.swap(true, Ordering::SeqCst) {
            return;
        }

        let record = AlertRecord {
            timestamp: Utc::now().to_rfc3339(),
            kind,
            message,
            data,
        };
        if let Err(e) = append_line(path, &record) {
            warn!("alert write failed ({}): {}", kind, e);
        }

        self.inner.emitting.store(false, Ordering::SeqCst);
    }
}

fn append_line(path: &PathBuf, record: &AlertRecord<'_>) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let line = serde_json::to_string(record)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_emit_appends_json_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alerts.jsonl");
        let sink = AlertSink::new(path.clone());

        sink.emit("TRADE_OPENED", "opened BONK", serde_json::json!({"size": 45.0}));
        sink.emit("TRADE_CLOSED", "closed BONK", serde_json::json!({"pnl": -6.75}));

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["type"], "TRADE_OPENED");
        assert_eq!(first["data"]["size"], 45.0);
        assert!(first["timestamp"].as_str().is_some());
    }

    #[test]
    fn test_disabled_sink_is_silent() {
        let sink = AlertSink::disabled();
        sink.emit("X", "dropped", serde_json::Value::Null);
    }

    #[test]
    fn test_emit_survives_bad_path() {
        let sink = AlertSink::new(PathBuf::from("/dev/null/not-a-dir/alerts.jsonl"));
        sink.emit("X", "never lands", serde_json::Value::Null);
    }
}
