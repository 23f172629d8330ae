//! JSONL file writer for query events.
//!
//! Each [`QueryEvent`] becomes one JSON line with a `type` field and an
//! RFC 3339 `timestamp`, appended through a buffered writer. The file is
//! opened in append mode so restarts keep earlier history.

use ensemble_application::ports::query_logger::{QueryEvent, QueryLogger};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Query logger that appends one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes after every record and
/// on `Drop`.
pub struct JsonlQueryLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlQueryLogger {
    /// Open (or create) the log at `path`, creating parent directories.
    ///
    /// Returns `None` if the file cannot be opened.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!("Could not create query log directory {}: {}", parent.display(), e);
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not open query log file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl QueryLogger for JsonlQueryLogger {
    fn log(&self, event: QueryEvent) {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        let record = if let serde_json::Value::Object(mut map) = event.payload {
            map.insert(
                "type".to_string(),
                serde_json::Value::String(event.event_type.to_string()),
            );
            map.insert("timestamp".to_string(), serde_json::Value::String(timestamp));
            serde_json::Value::Object(map)
        } else {
            serde_json::json!({
                "type": event.event_type,
                "timestamp": timestamp,
                "data": event.payload,
            })
        };

        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            warn!("Failed to write query log {}: {}", self.path.display(), e);
        }
    }
}

impl Drop for JsonlQueryLogger {
    fn drop(&mut self) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_writes_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("queries.jsonl");
        let logger = JsonlQueryLogger::new(&path).unwrap();

        logger.log(QueryEvent::new(
            "ensemble_completed",
            serde_json::json!({"question": "What is Rust?", "models": ["gpt-4o"], "total_cost": 0.01}),
        ));
        logger.log(QueryEvent::new(
            "model_call_failed",
            serde_json::json!({"model": "gpt-4-turbo", "error_kind": "timeout"}),
        ));
        drop(logger);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "ensemble_completed");
        assert_eq!(lines[0]["question"], "What is Rust?");
        assert_eq!(lines[1]["type"], "model_call_failed");
        assert_eq!(lines[1]["error_kind"], "timeout");
        for line in &lines {
            let ts = line["timestamp"].as_str().unwrap();
            assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
        }
    }

    #[test]
    fn test_non_object_payload_is_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queries.jsonl");
        let logger = JsonlQueryLogger::new(&path).unwrap();
        logger.log(QueryEvent::new("route_decided", serde_json::json!("fast")));
        drop(logger);

        let lines = read_lines(&path);
        assert_eq!(lines[0]["type"], "route_decided");
        assert_eq!(lines[0]["data"], "fast");
    }

    #[test]
    fn test_reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queries.jsonl");
        for _ in 0..2 {
            let logger = JsonlQueryLogger::new(&path).unwrap();
            logger.log(QueryEvent::new("time_travel_completed", serde_json::json!({})));
        }
        assert_eq!(read_lines(&path).len(), 2);
    }

    #[test]
    fn test_unwritable_path_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        // A regular file cannot be a parent directory
        assert!(JsonlQueryLogger::new(blocker.join("queries.jsonl")).is_none());
    }
}
