// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use serde_json::Value;

/// Failure of a binder call or connection.
#[derive(Debug, Clone, PartialEq)]
pub enum BinderError {
    /// No open connection to send on.
    NotConnected,
    /// The connection closed before the reply arrived.
    Closed,
    /// The binder answered with a failure frame; carries its payload.
    Rejected(Value),
    /// WebSocket-level failure (connect, send, handshake).
    Transport(String),
    /// A frame could not be decoded.
    Protocol(String),
}

impl BinderError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotConnected => "NOT_CONNECTED",
            Self::Closed => "CLOSED",
            Self::Rejected(_) => "REJECTED",
            Self::Transport(_) => "TRANSPORT",
            Self::Protocol(_) => "PROTOCOL",
        }
    }

    /// Payload to show in the activity log for this failure.
    pub fn payload(&self) -> Value {
        match self {
            Self::Rejected(v) => v.clone(),
            Self::Transport(msg) | Self::Protocol(msg) => {
                serde_json::json!({ "code": self.as_str(), "message": msg })
            }
            Self::NotConnected | Self::Closed => serde_json::json!({ "code": self.as_str() }),
        }
    }
}

impl fmt::Display for BinderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(payload) => {
                let info = payload
                    .pointer("/request/info")
                    .and_then(Value::as_str)
                    .unwrap_or("call rejected");
                write!(f, "{}: {info}", self.as_str())
            }
            Self::Transport(msg) | Self::Protocol(msg) => write!(f, "{}: {msg}", self.as_str()),
            Self::NotConnected | Self::Closed => f.write_str(self.as_str()),
        }
    }
}

impl std::error::Error for BinderError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
