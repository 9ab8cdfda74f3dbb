// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity log: the per-call and per-event entries shown to the user.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

/// One entry of the activity log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogEntry {
    /// A call about to be sent. `seq` is the activity count at send time.
    Command { seq: u64, url: String, api: String, verb: String, query: Value },
    /// A successful reply.
    Reply { seq: u64, payload: Value },
    /// A rejected or failed call.
    Error { seq: u64, payload: Value },
    /// An event received through a subscription.
    Event { idx: u64, name: String, data: Value },
}

impl LogEntry {
    /// Render the entry the way the panel prints it.
    pub fn render(&self) -> String {
        match self {
            Self::Command { seq, url, api, verb, query } => {
                format!("{seq}: {url}/{api}/{verb}?query={query}")
            }
            Self::Reply { seq, payload } => format!("{seq}: OK: {}", pretty(payload)),
            Self::Error { seq, payload } => format!("{seq}: ERROR: {}", pretty(payload)),
            Self::Event { idx, name, data } => format!("{idx}: {name} {data}"),
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Activity counters plus the broadcast channel carrying [`LogEntry`] values.
///
/// The call counter advances on every reply and every failure alike; it is a
/// display sequence, never used to correlate replies.
pub struct ActivityLog {
    tx: broadcast::Sender<LogEntry>,
    count: AtomicU64,
    event_idx: AtomicU64,
}

impl ActivityLog {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx, count: AtomicU64::new(0), event_idx: AtomicU64::new(0) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.tx.subscribe()
    }

    /// Number of calls resolved or rejected so far.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn command(&self, url: &str, api: &str, verb: &str, query: &Value) {
        tracing::debug!(api, verb, %query, "binder call");
        self.emit(LogEntry::Command {
            seq: self.count(),
            url: url.to_owned(),
            api: api.to_owned(),
            verb: verb.to_owned(),
            query: query.clone(),
        });
    }

    pub fn reply(&self, payload: &Value) {
        let seq = self.count.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(seq, "binder reply ok");
        self.emit(LogEntry::Reply { seq, payload: payload.clone() });
    }

    pub fn error(&self, payload: &Value) {
        let seq = self.count.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(seq, %payload, "binder reply error");
        self.emit(LogEntry::Error { seq, payload: payload.clone() });
    }

    pub fn event(&self, name: &str, data: &Value) {
        let idx = self.event_idx.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(idx, event = name, "binder event");
        self.emit(LogEntry::Event { idx, name: name.to_owned(), data: data.clone() });
    }

    fn emit(&self, entry: LogEntry) {
        // No receivers is fine: nobody is watching the log.
        let _ = self.tx.send(entry);
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
