use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Number of entries retained in memory
pub const LOG_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

/// One retained log line, optionally carrying structured context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Component that produced the entry, e.g. "capture" or "pipeline::upload"
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, serde_json::Value>>,
}

enum LogCommand {
    Log(LogEntry),
    Snapshot(Sender<Vec<LogEntry>>),
    Clear,
}

/// Non-blocking diagnostic logger.
///
/// Entries are handed to a background thread over a bounded channel and kept
/// in a ring of the last [`LOG_CAPACITY`] entries. Every accepted entry is also
/// forwarded to `tracing`.
pub struct Logger {
    sender: Sender<LogCommand>,
    min_level: Arc<AtomicU8>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(LOG_CAPACITY);
        let min_level = Arc::new(AtomicU8::new(LogLevel::Debug as u8));

        std::thread::Builder::new()
            .name("clipcast-logger".into())
            .spawn(move || Self::run(receiver))
            .ok();

        Self { sender, min_level }
    }

    fn run(receiver: Receiver<LogCommand>) {
        let mut ring: VecDeque<LogEntry> = VecDeque::with_capacity(LOG_CAPACITY);

        for cmd in receiver {
            match cmd {
                LogCommand::Log(entry) => {
                    if ring.len() == LOG_CAPACITY {
                        ring.pop_front();
                    }
                    ring.push_back(entry);
                }
                LogCommand::Snapshot(reply) => {
                    let _ = reply.send(ring.iter().cloned().collect());
                }
                LogCommand::Clear => ring.clear(),
            }
        }
    }

    fn enabled(&self, level: LogLevel) -> bool {
        (level as u8) >= self.min_level.load(Ordering::Relaxed)
    }

    pub fn log(&self, level: LogLevel, message: &str, source: &'static str) {
        self.record(level, message, source, None);
    }

    /// Log with a structured context map
    pub fn log_with_context(
        &self,
        level: LogLevel,
        message: &str,
        source: &'static str,
        context: HashMap<String, serde_json::Value>,
    ) {
        self.record(level, message, source, Some(context));
    }

    fn record(
        &self,
        level: LogLevel,
        message: &str,
        source: &'static str,
        context: Option<HashMap<String, serde_json::Value>>,
    ) {
        if !self.enabled(level) {
            return;
        }

        mirror_to_tracing(level, message, source, context.as_ref());

        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
            source,
            context,
        };

        // Drops the entry if the logger thread is saturated
        let _ = self.sender.try_send(LogCommand::Log(entry));
    }

    pub fn set_min_level(&self, level: LogLevel) {
        self.min_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn min_level(&self) -> LogLevel {
        LogLevel::from_u8(self.min_level.load(Ordering::Relaxed))
    }

    /// Retained entries in chronological order
    pub fn entries(&self) -> Vec<LogEntry> {
        let (reply_tx, reply_rx) = bounded(1);
        if self.sender.send(LogCommand::Snapshot(reply_tx)).is_ok() {
            reply_rx.recv().unwrap_or_default()
        } else {
            Vec::new()
        }
    }

    /// Retained entries produced by one component
    pub fn entries_from(&self, source: &str) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.source == source)
            .collect()
    }

    pub fn clear(&self) {
        let _ = self.sender.send(LogCommand::Clear);
    }
}

fn mirror_to_tracing(
    level: LogLevel,
    message: &str,
    source: &'static str,
    context: Option<&HashMap<String, serde_json::Value>>,
) {
    let context = context
        .map(|c| serde_json::to_string(c).unwrap_or_default())
        .unwrap_or_default();
    match level {
        LogLevel::Debug => tracing::debug!(source, context = %context, "{}", message),
        LogLevel::Info => tracing::info!(source, context = %context, "{}", message),
        LogLevel::Warn => tracing::warn!(source, context = %context, "{}", message),
        LogLevel::Error => tracing::error!(source, context = %context, "{}", message),
    }
}

lazy_static::lazy_static! {
    pub static ref LOGGER: Logger = Logger::new();
}
