use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

const MAX_LOG_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One line of the relay's JSONL access log. Upstream causes land here and in
/// tracing, never in client responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayLogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub request_id: String,
    pub endpoint: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl RelayLogEntry {
    pub fn new(
        level: LogLevel,
        request_id: impl Into<String>,
        endpoint: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            request_id: request_id.into(),
            endpoint: endpoint.into(),
            message: message.into(),
            upstream_status: None,
            elapsed_ms: None,
        }
    }

    pub fn with_upstream_status(mut self, status: u16) -> Self {
        self.upstream_status = Some(status);
        self
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = Some(elapsed_ms);
        self
    }
}

/// Appends entries to a JSONL file and keeps the most recent ones in memory.
pub struct RelayLog {
    entries: VecDeque<RelayLogEntry>,
    writer: Option<BufWriter<std::fs::File>>,
}

impl RelayLog {
    pub fn new(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file_path = file_path.as_ref();

        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(file_path)?;

        Ok(Self {
            entries: VecDeque::with_capacity(MAX_LOG_ENTRIES),
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn log(&mut self, entry: RelayLogEntry) {
        if let Some(ref mut writer) = self.writer {
            if let Ok(json) = serde_json::to_string(&entry) {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }
        if self.entries.len() >= MAX_LOG_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn recent(&self, limit: usize) -> Vec<RelayLogEntry> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }
}

#[derive(Clone)]
pub struct SharedLog(Arc<Mutex<RelayLog>>);

impl SharedLog {
    pub fn new(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self(Arc::new(Mutex::new(RelayLog::new(file_path)?))))
    }

    pub fn log(&self, entry: RelayLogEntry) {
        if let Ok(mut log) = self.0.lock() {
            log.log(entry);
        }
    }

    pub fn info(
        &self,
        request_id: impl Into<String>,
        endpoint: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.log(RelayLogEntry::new(LogLevel::Info, request_id, endpoint, message));
    }

    pub fn warn(
        &self,
        request_id: impl Into<String>,
        endpoint: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.log(RelayLogEntry::new(LogLevel::Warn, request_id, endpoint, message));
    }

    pub fn error(
        &self,
        request_id: impl Into<String>,
        endpoint: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.log(RelayLogEntry::new(LogLevel::Error, request_id, endpoint, message));
    }

    pub fn recent(&self, limit: usize) -> Vec<RelayLogEntry> {
        self.0.lock().map(|l| l.recent(limit)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    #[test]
    fn test_log_appends_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.log");

        let log = SharedLog::new(&path).unwrap();
        log.info("req-1", "weather", "upstream responded");
        log.log(
            RelayLogEntry::new(LogLevel::Error, "req-2", "chat", "request failed")
                .with_upstream_status(502)
                .with_elapsed_ms(12),
        );

        let file = std::fs::File::open(&path).unwrap();
        let lines: Vec<String> = std::io::BufReader::new(file)
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines.len(), 2);

        let second: RelayLogEntry = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(second.request_id, "req-2");
        assert_eq!(second.upstream_status, Some(502));
        assert_eq!(second.elapsed_ms, Some(12));
        // Optional fields stay off the wire when unset
        assert!(!lines[0].contains("upstream_status"));
    }

    #[test]
    fn test_recent_returns_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let log = SharedLog::new(dir.path().join("relay.log")).unwrap();

        log.info("req-1", "weather", "first");
        log.info("req-2", "weather", "second");
        log.info("req-3", "weather", "third");

        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "third");
        assert_eq!(recent[1].message, "second");
    }
}
