// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Panel context: the hub session, the Alexa agent session, durable storage
//! and the auth flow, owned in one place.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::provider::{CodePairResponse, HttpProvider};
use crate::auth::store::{TokenStore, KEY_ALEXA_VA_ADDRESS};
use crate::auth::{DeviceAuthFlow, RefreshOutcome};
use crate::binder::log::ActivityLog;
use crate::binder::{ConnectionState, Session};
use crate::config::PanelConfig;
use crate::error::BinderError;
use crate::hub::{AgentEvent, AgentList, Hub, VoiceAgent};

pub struct Panel {
    config: PanelConfig,
    log: Arc<ActivityLog>,
    hub: Hub,
    store: Arc<TokenStore>,
    flow: Arc<DeviceAuthFlow<HttpProvider>>,
    alexa: RwLock<Option<Arc<Session>>>,
    agents: RwLock<AgentList>,
}

impl Panel {
    pub fn new(config: PanelConfig) -> anyhow::Result<Arc<Self>> {
        let store = Arc::new(TokenStore::open(&config.state_dir())?);
        Self::with_store(config, store)
    }

    pub fn with_store(config: PanelConfig, store: Arc<TokenStore>) -> anyhow::Result<Arc<Self>> {
        let log = Arc::new(ActivityLog::new());
        let hub = Hub::new(Session::with_log(config.hub_endpoint(), Arc::clone(&log)));
        let auth = config.auth_config();
        let flow = DeviceAuthFlow::new(auth.clone(), HttpProvider::new(&auth)?, Arc::clone(&store));
        Ok(Arc::new(Self {
            config,
            log,
            hub,
            store,
            flow,
            alexa: RwLock::new(None),
            agents: RwLock::new(AgentList::default()),
        }))
    }

    pub fn log(&self) -> &Arc<ActivityLog> {
        &self.log
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn flow(&self) -> &Arc<DeviceAuthFlow<HttpProvider>> {
        &self.flow
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn agents(&self) -> AgentList {
        self.agents.read().clone()
    }

    pub fn alexa_agent(&self) -> Option<VoiceAgent> {
        self.agents.read().alexa().cloned()
    }

    pub fn alexa_session(&self) -> Option<Arc<Session>> {
        self.alexa.read().clone()
    }

    /// Configured Alexa address, else the stored one.
    pub fn alexa_address(&self) -> Option<String> {
        self.config.alexa_va_address.clone().or_else(|| self.store.get(KEY_ALEXA_VA_ADDRESS))
    }

    /// Open the hub session, mirror every hub event into the activity log and
    /// list the voice agents.
    pub async fn connect_hub(&self) -> anyhow::Result<AgentList> {
        let session = self.hub.session();
        session.connect().await?;
        watch_aborts("hub", session);

        let log = Arc::clone(&self.log);
        session.on_event("*", move |event| log.event(&event.name, &event.data));

        self.refresh_agents().await
    }

    pub async fn refresh_agents(&self) -> anyhow::Result<AgentList> {
        let list = self.hub.enumerate_voice_agents().await?;
        for agent in &list.agents {
            let marker = if list.is_default(agent) { "*" } else { " " };
            debug!(id = %agent.id, name = %agent.name, api = %agent.api, default = marker, "voice agent");
        }
        *self.agents.write() = list.clone();
        Ok(list)
    }

    pub async fn set_default_agent(&self, id: &str) -> anyhow::Result<AgentList> {
        self.hub.set_default_voice_agent(id).await?;
        self.refresh_agents().await
    }

    pub async fn subscribe_agent(&self, va_id: &str, events: &[AgentEvent]) -> Result<Value, BinderError> {
        self.hub.subscribe(va_id, events).await
    }

    pub async fn start_listening(&self) -> Result<Option<String>, BinderError> {
        self.hub.start_listening().await
    }

    pub async fn cancel_listening(&self) -> Result<Value, BinderError> {
        self.hub.cancel_listening().await
    }

    /// Persist a new Alexa agent address, reconnect to it and bootstrap auth.
    pub async fn set_alexa_address(&self, host: &str) -> anyhow::Result<()> {
        self.store.set(KEY_ALEXA_VA_ADDRESS, host)?;
        info!(host, "alexa voice agent address saved");
        self.connect_alexa_at(host).await?;
        self.bootstrap_auth().await;
        Ok(())
    }

    /// Connect the Alexa agent session at the known address.
    ///
    /// Without an address this only logs; login stays unavailable.
    pub async fn connect_alexa(&self) -> anyhow::Result<()> {
        let Some(host) = self.alexa_address() else {
            warn!("no alexa voice agent address configured");
            return Ok(());
        };
        self.connect_alexa_at(&host).await
    }

    async fn connect_alexa_at(&self, host: &str) -> anyhow::Result<()> {
        let session = Session::with_log(self.config.endpoint(host), Arc::clone(&self.log));
        let previous = self.alexa.write().replace(Arc::clone(&session));
        if let Some(previous) = previous {
            previous.close();
        }
        // Tokens must reach the agent even if the connection below fails.
        self.flow.attach(Arc::clone(&session));

        session.connect().await?;
        watch_aborts("alexa", &session);
        Ok(())
    }

    /// Refresh from storage when a token pair is stored. Returns whether the
    /// agent ended up authorized.
    pub async fn bootstrap_auth(&self) -> bool {
        if !self.store.has_tokens() {
            info!("no stored tokens, login required");
            return false;
        }
        self.refresh().await == RefreshOutcome::Refreshed
    }

    /// Begin a device-code login for the Alexa agent.
    pub async fn login(&self) -> anyhow::Result<Option<CodePairResponse>> {
        let Some(agent) = self.alexa_agent() else {
            warn!("no alexa voice agent reported by the hub");
            return Ok(None);
        };
        self.flow.start_login(&agent).await
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        let agent = self.alexa_agent();
        self.flow.refresh_token(agent.as_ref()).await
    }

    pub fn logout(&self) -> anyhow::Result<()> {
        self.flow.logout()
    }

    /// Close both sessions.
    pub fn close(&self) {
        self.hub.session().close();
        if let Some(alexa) = self.alexa.write().take() {
            alexa.close();
        }
        self.flow.detach();
    }
}

/// Warn once when a session drops after being open.
fn watch_aborts(name: &'static str, session: &Arc<Session>) {
    let mut state = session.watch_state();
    let url = session.endpoint().url();
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            if current == ConnectionState::Aborted {
                warn!(session = name, %url, status = current.label(), "connection lost");
                break;
            }
            if current == ConnectionState::Disconnected {
                break;
            }
        }
    });
}
