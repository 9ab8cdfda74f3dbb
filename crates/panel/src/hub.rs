// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed client for the voice-agent hub (`vshl`) API.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::binder::{response_of, Session};
use crate::error::BinderError;

/// API namespace of the hub.
pub const VSHL_API: &str = "vshl";

/// Name under which the hub reports the Alexa voice agent.
pub const ALEXA_AGENT_NAME: &str = "Alexa";

/// A voice agent as reported by `vshl/enumerateVoiceAgents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceAgent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// API namespace the agent's own verbs live under.
    #[serde(default)]
    pub api: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub wakewords: Vec<String>,
    #[serde(default)]
    pub activewakeword: String,
}

impl VoiceAgent {
    pub fn is_alexa(&self) -> bool {
        self.name == ALEXA_AGENT_NAME
    }
}

/// Reply of `vshl/enumerateVoiceAgents`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentList {
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub agents: Vec<VoiceAgent>,
}

impl AgentList {
    pub fn is_default(&self, agent: &VoiceAgent) -> bool {
        self.default.as_deref() == Some(agent.id.as_str())
    }

    pub fn alexa(&self) -> Option<&VoiceAgent> {
        self.agents.iter().find(|a| a.is_alexa())
    }
}

/// Per-agent event streams a client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentEvent {
    AuthState,
    DialogState,
    ConnectionState,
}

impl AgentEvent {
    pub const ALL: [AgentEvent; 3] = [Self::AuthState, Self::DialogState, Self::ConnectionState];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthState => "voice_authstate_event",
            Self::DialogState => "voice_dialogstate_event",
            Self::ConnectionState => "voice_connectionstate_event",
        }
    }
}

/// Thin typed wrapper over a hub session.
#[derive(Clone)]
pub struct Hub {
    session: Arc<Session>,
}

impl Hub {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub async fn enumerate_voice_agents(&self) -> anyhow::Result<AgentList> {
        let reply = self.session.call(VSHL_API, "enumerateVoiceAgents", json!({})).await?;
        let list = serde_json::from_value(response_of(&reply))?;
        Ok(list)
    }

    pub async fn set_default_voice_agent(&self, id: &str) -> Result<Value, BinderError> {
        self.session.call(VSHL_API, "setDefaultVoiceAgent", json!({ "id": id })).await
    }

    /// Ask the hub to forward the chosen event streams of one agent.
    pub async fn subscribe(&self, va_id: &str, events: &[AgentEvent]) -> Result<Value, BinderError> {
        let names: Vec<&str> = events.iter().map(AgentEvent::as_str).collect();
        let query = json!({ "va_id": va_id, "events": names });
        self.session.call(VSHL_API, "subscribe", query).await
    }

    /// Start a listening session; returns the hub's request id when it sends one.
    pub async fn start_listening(&self) -> Result<Option<String>, BinderError> {
        let reply = self.session.call(VSHL_API, "startListening", json!({})).await?;
        Ok(response_of(&reply).get("request_id").and_then(Value::as_str).map(str::to_owned))
    }

    pub async fn cancel_listening(&self) -> Result<Value, BinderError> {
        self.session.call(VSHL_API, "cancelListening", json!({})).await
    }
}

/// Call a verb in an agent's own API namespace.
pub async fn call_agent(
    session: &Session,
    agent: &VoiceAgent,
    verb: &str,
    query: Value,
) -> Result<Value, BinderError> {
    session.call(&agent.api, verb, query).await
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
