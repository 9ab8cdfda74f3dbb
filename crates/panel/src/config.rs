// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::auth::store::default_state_dir;
use crate::auth::{
    AuthConfig, DEFAULT_CLIENT_ID, DEFAULT_CODE_PAIR_URL, DEFAULT_PRODUCT_ID, DEFAULT_TOKEN_URL,
};
use crate::binder::{Endpoint, DEFAULT_BASE, DEFAULT_TOKEN};
use crate::hub::AgentEvent;

/// Control panel for a voice-agent hub.
#[derive(Debug, Clone, Parser)]
#[command(name = "vshl-panel", version, about)]
pub struct PanelConfig {
    /// Host (and port) of the voice-agent hub binder.
    #[arg(long, default_value = "localhost:1234", env = "VSHL_ADDRESS")]
    pub vshl_address: String,

    /// Host of the Alexa voice agent binder. Falls back to the stored address.
    #[arg(long, env = "VSHL_ALEXA_VA_ADDRESS")]
    pub alexa_va_address: Option<String>,

    /// Base path of the binder WebSocket endpoint.
    #[arg(long, default_value = DEFAULT_BASE, env = "VSHL_BASE")]
    pub base: String,

    /// Token presented to the binders.
    #[arg(long, default_value = DEFAULT_TOKEN, env = "VSHL_BINDER_TOKEN")]
    pub binder_token: String,

    /// OAuth client id registered with the identity provider.
    #[arg(long, default_value = DEFAULT_CLIENT_ID, env = "VSHL_CLIENT_ID")]
    pub client_id: String,

    /// Product id sent in the code-pair scope data.
    #[arg(long, default_value = DEFAULT_PRODUCT_ID, env = "VSHL_PRODUCT_ID")]
    pub product_id: String,

    #[arg(long, default_value = DEFAULT_CODE_PAIR_URL, env = "VSHL_CODE_PAIR_URL")]
    pub code_pair_url: String,

    #[arg(long, default_value = DEFAULT_TOKEN_URL, env = "VSHL_TOKEN_URL")]
    pub token_url: String,

    /// Directory holding `storage.json`.
    #[arg(long, env = "VSHL_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Abandon a login once its poll budget is used up.
    #[arg(long, env = "VSHL_ENFORCE_POLL_BUDGET")]
    pub enforce_poll_budget: bool,

    /// Log level filter (e.g. info, debug, vshl_panel=trace).
    #[arg(long, default_value = "info", env = "VSHL_LOG_LEVEL")]
    pub log_level: String,

    /// Log format: text or json.
    #[arg(long, default_value = "text", env = "VSHL_LOG_FORMAT")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Connect, list agents, bootstrap Alexa auth and stream activity.
    Run {
        /// Start a device-code login if no tokens are stored.
        #[arg(long)]
        login: bool,
    },
    /// List voice agents.
    Agents,
    /// Make an agent the default.
    SetDefault { id: String },
    /// Subscribe to an agent's events and stream them.
    Subscribe {
        va_id: String,
        #[arg(long)]
        auth_state: bool,
        #[arg(long)]
        dialog_state: bool,
        #[arg(long)]
        connection_state: bool,
    },
    /// Start a listening session.
    Listen,
    /// Cancel the listening session.
    CancelListen,
    /// Log the Alexa agent in with a device code.
    Login,
    /// Refresh the stored Alexa token once.
    Refresh,
    /// Remember the Alexa voice agent's binder address.
    SetAlexaAddress { host: String },
    /// Forget the stored tokens.
    Logout,
}

impl Command {
    /// Event streams selected by `subscribe`; all of them when none is named.
    pub fn agent_events(&self) -> Vec<AgentEvent> {
        let Self::Subscribe { auth_state, dialog_state, connection_state, .. } = self else {
            return Vec::new();
        };
        let picked: Vec<AgentEvent> = [
            (*auth_state, AgentEvent::AuthState),
            (*dialog_state, AgentEvent::DialogState),
            (*connection_state, AgentEvent::ConnectionState),
        ]
        .into_iter()
        .filter_map(|(on, event)| on.then_some(event))
        .collect();
        if picked.is_empty() {
            AgentEvent::ALL.to_vec()
        } else {
            picked
        }
    }
}

impl PanelConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.vshl_address.trim().is_empty() {
            anyhow::bail!("--vshl-address must not be empty");
        }
        if self.alexa_va_address.as_deref().is_some_and(|a| a.trim().is_empty()) {
            anyhow::bail!("--alexa-va-address must not be empty");
        }
        if self.base.trim_matches('/').is_empty() {
            anyhow::bail!("--base must not be empty");
        }
        if self.client_id.is_empty() {
            anyhow::bail!("--client-id must not be empty");
        }
        if let Some(Command::SetAlexaAddress { host }) = &self.command {
            if host.trim().is_empty() {
                anyhow::bail!("alexa address must not be empty");
            }
        }
        match self.log_format.as_str() {
            "text" | "json" => Ok(()),
            other => anyhow::bail!("invalid --log-format: {other} (expected text or json)"),
        }
    }

    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run { login: false })
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            client_id: self.client_id.clone(),
            product_id: self.product_id.clone(),
            code_pair_url: self.code_pair_url.clone(),
            token_url: self.token_url.clone(),
            enforce_poll_budget: self.enforce_poll_budget,
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(default_state_dir)
    }

    /// Endpoint of a binder on `host` with the configured base and token.
    pub fn endpoint(&self, host: &str) -> Endpoint {
        Endpoint::new(host).with_base(&self.base).with_token(&self.binder_token)
    }

    pub fn hub_endpoint(&self) -> Endpoint {
        self.endpoint(&self.vshl_address)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
