// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device-code ("code-based linking") authentication for the Alexa voice agent.
//!
//! A login requests a code pair from the identity provider, shows the user
//! code, polls the token endpoint at the provider's interval, stores the
//! tokens and pushes the access token into the agent's binder session. A
//! refresh is armed for every token's lifetime and re-runs silently until it
//! fails or storage is cleared.

pub mod flow;
pub mod identity;
pub mod provider;
pub mod schedule;
pub mod state;
pub mod store;

use serde::Serialize;

pub use flow::{DeviceAuthFlow, RefreshOutcome};
pub use state::AuthState;

/// Public client id registered for the panel with Login with Amazon.
pub const DEFAULT_CLIENT_ID: &str = "amzn1.application-oa2-client.1675c236e59546c2bea62ea5444d3510";

pub const DEFAULT_PRODUCT_ID: &str = "Test";

pub const DEFAULT_CODE_PAIR_URL: &str = "https://api.amazon.com/auth/O2/create/codepair";

pub const DEFAULT_TOKEN_URL: &str = "https://api.amazon.com/auth/O2/token";

/// Scope requested for the voice agent.
pub const ALEXA_SCOPE: &str = "alexa:all";

/// Agent verb that installs a new access token.
pub const SET_AUTH_TOKEN_VERB: &str = "setAuthToken";

/// Static settings for the device authorization flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub client_id: String,
    pub product_id: String,
    pub code_pair_url: String,
    pub token_url: String,
    /// Stop polling once the poll budget reaches zero. Off by default: the
    /// budget is then only counted and logged.
    pub enforce_poll_budget: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_owned(),
            product_id: DEFAULT_PRODUCT_ID.to_owned(),
            code_pair_url: DEFAULT_CODE_PAIR_URL.to_owned(),
            token_url: DEFAULT_TOKEN_URL.to_owned(),
            enforce_poll_budget: false,
        }
    }
}

/// Events published by the flow for whoever renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuthEvent {
    StateChanged { prev: AuthState, next: AuthState },
    /// The user must visit `login_page` and confirm `user_code`.
    CodePair { user_code: String, verification_uri: String, login_page: String },
    /// A poll came back unauthorized; `remaining` may go negative when the
    /// budget is not enforced.
    PollRetry { remaining: i64 },
    Authorized { agent: String },
    Failed { agent: String, error: String },
}

/// Page the user opens to enter the code.
pub fn login_page(verification_uri: &str, user_code: &str) -> String {
    format!("{verification_uri}?cbl-code={user_code}")
}
