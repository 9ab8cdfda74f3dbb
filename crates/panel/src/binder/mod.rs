// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RPC session with a binder: request/reply calls and event subscriptions
//! over one persistent WebSocket.

pub mod frame;
pub mod log;
pub mod session;

use std::fmt;

use serde::Serialize;
use serde_json::Value;

pub use session::{EventStream, Session};

/// Default base path of the binder's WebSocket endpoint.
pub const DEFAULT_BASE: &str = "api";

/// Default binder token.
pub const DEFAULT_TOKEN: &str = "HELLO";

/// Where a session connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub base: String,
    pub token: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into(), base: DEFAULT_BASE.to_owned(), token: DEFAULT_TOKEN.to_owned() }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Display URL, without the token.
    pub fn url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        let ws_host = if let Some(rest) = host.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = host.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if host.starts_with("ws://") || host.starts_with("wss://") {
            host.to_owned()
        } else {
            format!("ws://{host}")
        };
        format!("{ws_host}/{}", self.base.trim_matches('/'))
    }

    /// Full connect URL including the token.
    pub fn ws_url(&self) -> String {
        format!("{}?x-afb-token={}", self.url(), self.token)
    }
}

/// Lifecycle of a session's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Aborted,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Aborted => "aborted",
        }
    }

    /// Status line shown to the user.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "Not Connected",
            Self::Connecting => "Connecting...",
            Self::Open => "Binder WS Active",
            Self::Aborted => "Connection Closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event pushed by the binder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinderEvent {
    pub name: String,
    pub data: Value,
}

/// Extract the `response` member of a successful reply envelope.
pub fn response_of(reply: &Value) -> Value {
    reply.get("response").cloned().unwrap_or(Value::Null)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
