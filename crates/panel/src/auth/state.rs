// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Login / refresh state machine.

use std::fmt;

use serde::Serialize;

/// State of the device authorization flow.
///
/// ```text
/// idle -> code_requested -> polling -> authorized
///                           polling -> polling | abandoned | failed
/// authorized -> token_expired -> refreshing -> authorized | failed
/// ```
///
/// A new login may start from any state except `code_requested`/`refreshing`
/// and replaces the attempt in progress. A refresh may also start directly
/// (tokens found in storage at startup, or a manual refresh). Any state can
/// return to `idle` when storage is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Idle,
    CodeRequested,
    Polling,
    Authorized,
    TokenExpired,
    Refreshing,
    Abandoned,
    Failed,
}

impl AuthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CodeRequested => "code_requested",
            Self::Polling => "polling",
            Self::Authorized => "authorized",
            Self::TokenExpired => "token_expired",
            Self::Refreshing => "refreshing",
            Self::Abandoned => "abandoned",
            Self::Failed => "failed",
        }
    }

    pub fn can_transition_to(self, next: AuthState) -> bool {
        use AuthState::*;
        matches!(
            (self, next),
            (_, Idle)
                | (Idle | Polling | Authorized | TokenExpired | Abandoned | Failed, CodeRequested)
                | (CodeRequested, Polling)
                | (Polling, Polling | Authorized | Abandoned | Failed)
                | (Authorized, TokenExpired)
                | (Idle | Authorized | TokenExpired | Abandoned | Failed, Refreshing)
                | (Refreshing, Authorized | Failed)
        )
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
