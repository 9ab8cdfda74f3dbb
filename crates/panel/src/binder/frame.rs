// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `x-afb-ws-json1` frame codec.
//!
//! Every frame is a JSON array whose first element is a numeric type code:
//!
//! ```text
//! [2, id, "api/verb", args]   call
//! [3, id, reply]              success reply
//! [4, id, reply]              failure reply
//! [5, "api/event", data]      event
//! ```

use serde_json::Value;

use crate::error::BinderError;

/// WebSocket sub-protocol spoken by the binder.
pub const SUBPROTOCOL: &str = "x-afb-ws-json1";

const CALL: u64 = 2;
const RETOK: u64 = 3;
const RETERR: u64 = 4;
const EVENT: u64 = 5;

/// A decoded binder frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Call { id: String, method: String, args: Value },
    Reply { id: String, reply: Value },
    Failure { id: String, reply: Value },
    Event { name: String, data: Value },
}

impl Frame {
    pub fn encode(&self) -> String {
        let array = match self {
            Self::Call { id, method, args } => {
                serde_json::json!([CALL, id, method, args])
            }
            Self::Reply { id, reply } => serde_json::json!([RETOK, id, reply]),
            Self::Failure { id, reply } => serde_json::json!([RETERR, id, reply]),
            Self::Event { name, data } => serde_json::json!([EVENT, name, data]),
        };
        array.to_string()
    }

    pub fn decode(text: &str) -> Result<Self, BinderError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| BinderError::Protocol(format!("invalid json: {e}")))?;
        let Value::Array(items) = value else {
            return Err(BinderError::Protocol("frame is not an array".to_owned()));
        };
        if items.len() < 2 {
            return Err(BinderError::Protocol(format!("short frame ({} items)", items.len())));
        }

        let code = items[0]
            .as_u64()
            .ok_or_else(|| BinderError::Protocol("missing frame type".to_owned()))?;
        let key = match &items[1] {
            Value::String(s) => s.clone(),
            // Some binders emit numeric call ids.
            Value::Number(n) => n.to_string(),
            other => return Err(BinderError::Protocol(format!("bad frame key: {other}"))),
        };
        let third = items.get(2).cloned().unwrap_or(Value::Null);

        match code {
            CALL => {
                let method = third
                    .as_str()
                    .ok_or_else(|| BinderError::Protocol("call without method".to_owned()))?
                    .to_owned();
                let args = items.get(3).cloned().unwrap_or(Value::Null);
                Ok(Self::Call { id: key, method, args })
            }
            RETOK => Ok(Self::Reply { id: key, reply: third }),
            RETERR => Ok(Self::Failure { id: key, reply: third }),
            EVENT => Ok(Self::Event { name: key, data: third }),
            other => Err(BinderError::Protocol(format!("unknown frame type {other}"))),
        }
    }
}

/// Whether an event name matches a subscription pattern.
///
/// `*` matches everything, `api/*` matches every event of one API, anything
/// else must match exactly.
pub fn pattern_matches(pattern: &str, name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.strip_suffix('*') {
        Some(prefix) if prefix.ends_with('/') => name.starts_with(prefix),
        _ => pattern == name,
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
