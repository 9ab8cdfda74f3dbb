// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device-code login, polling and the refresh timer chain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::json;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::auth::identity::device_serial;
use crate::auth::provider::{
    code_pair_form, device_token_form, refresh_form, CodePairResponse, IdentityProvider,
    ProviderEndpoint, ProviderResponse, TokenResponse,
};
use crate::auth::schedule::ScheduledTask;
use crate::auth::store::TokenStore;
use crate::auth::{login_page, AuthConfig, AuthEvent, AuthState, SET_AUTH_TOKEN_VERB};
use crate::binder::Session;
use crate::hub::{call_agent, VoiceAgent};

/// Result of one run of the refresh leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A precondition was missing; nothing was sent.
    Skipped,
    Refreshed,
    /// The provider refused or could not be reached. The chain has ended.
    Failed,
}

/// Poll budget of the login in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    /// `expires_in / interval`, truncated.
    pub max: u64,
    /// Decremented on every unsuccessful poll. Negative once the budget is
    /// overrun while not enforced.
    pub remaining: i64,
}

/// One in-flight login attempt. Never persisted.
struct Grant {
    generation: u64,
    agent: VoiceAgent,
    pair: CodePairResponse,
    interval: Duration,
    budget: PollBudget,
    poll: Option<ScheduledTask>,
}

pub struct DeviceAuthFlow<P> {
    config: AuthConfig,
    provider: P,
    store: Arc<TokenStore>,
    serial: String,
    target: RwLock<Option<Arc<Session>>>,
    state: watch::Sender<AuthState>,
    grant: Mutex<Option<Grant>>,
    generation: AtomicU64,
    refresh_tasks: Mutex<HashMap<String, ScheduledTask>>,
    events: broadcast::Sender<AuthEvent>,
}

impl<P: IdentityProvider> DeviceAuthFlow<P> {
    pub fn new(config: AuthConfig, provider: P, store: Arc<TokenStore>) -> Arc<Self> {
        let (state, _) = watch::channel(AuthState::Idle);
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            config,
            provider,
            store,
            serial: device_serial().to_owned(),
            target: RwLock::new(None),
            state,
            grant: Mutex::new(None),
            generation: AtomicU64::new(0),
            refresh_tasks: Mutex::new(HashMap::new()),
            events,
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Set the agent's binder session: the host tokens are pushed to.
    pub fn attach(&self, session: Arc<Session>) {
        *self.target.write() = Some(session);
    }

    pub fn detach(&self) {
        self.target.write().take();
    }

    pub fn has_target(&self) -> bool {
        self.target.read().is_some()
    }

    fn target(&self) -> Option<Arc<Session>> {
        self.target.read().clone()
    }

    pub fn poll_budget(&self) -> Option<PollBudget> {
        self.grant.lock().as_ref().map(|g| g.budget)
    }

    /// When the refresh armed for `agent_id` will fire, if one is pending.
    pub fn refresh_deadline(&self, agent_id: &str) -> Option<Instant> {
        self.refresh_tasks.lock().get(agent_id).map(ScheduledTask::deadline)
    }

    /// Number of refresh timers currently armed.
    pub fn pending_refreshes(&self) -> usize {
        self.refresh_tasks.lock().len()
    }

    /// Start a device-code login for `agent`.
    ///
    /// Returns `Ok(None)` without contacting the provider when no agent host
    /// is attached. Any login already in progress is superseded.
    pub async fn start_login(
        self: &Arc<Self>,
        agent: &VoiceAgent,
    ) -> anyhow::Result<Option<CodePairResponse>> {
        if !self.has_target() {
            warn!(agent = %agent.id, "no voice agent address configured, login skipped");
            return Ok(None);
        }
        let current = self.state();
        if !current.can_transition_to(AuthState::CodeRequested) {
            warn!(state = %current, "login not possible now");
            return Ok(None);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.grant.lock().take();

        let form = code_pair_form(&self.config.client_id, &self.config.product_id, &self.serial);
        let resp = match self.provider.post_form(ProviderEndpoint::CodePair, form).await {
            Ok(resp) => resp,
            Err(e) => {
                self.fail(&agent.id, format!("code pair request failed: {e}"));
                return Err(e);
            }
        };
        if !resp.is_success() {
            let msg = rejection("code pair", &resp);
            self.fail(&agent.id, msg.clone());
            anyhow::bail!(msg);
        }
        let pair: CodePairResponse = resp.parse()?;

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("code pair superseded by a newer login");
            return Ok(None);
        }
        if !self.transition(AuthState::CodeRequested) {
            return Ok(None);
        }

        let interval = Duration::from_secs(pair.interval.max(1));
        let max = pair.expires_in / pair.interval.max(1);
        let budget = PollBudget { max, remaining: i64::try_from(max).unwrap_or(i64::MAX) };

        let page = login_page(&pair.verification_uri, &pair.user_code);
        info!(user_code = %pair.user_code, login_page = %page, polls = budget.max, "waiting for user authorization");
        self.emit(AuthEvent::CodePair {
            user_code: pair.user_code.clone(),
            verification_uri: pair.verification_uri.clone(),
            login_page: page,
        });

        let poll = self.schedule_poll(generation, interval);
        *self.grant.lock() = Some(Grant {
            generation,
            agent: agent.clone(),
            pair: pair.clone(),
            interval,
            budget,
            poll: Some(poll),
        });
        self.transition(AuthState::Polling);
        Ok(Some(pair))
    }

    fn schedule_poll(self: &Arc<Self>, generation: u64, delay: Duration) -> ScheduledTask {
        let flow = Arc::clone(self);
        ScheduledTask::after(delay, async move { flow.poll(generation).await })
    }

    async fn poll(self: Arc<Self>, generation: u64) {
        let Some((agent, form)) = self.with_grant(generation, |g| {
            (g.agent.clone(), device_token_form(&g.pair.device_code, &g.pair.user_code))
        }) else {
            debug!(generation, "stale poll dropped");
            return;
        };

        let reply = self.provider.post_form(ProviderEndpoint::Token, form).await;
        if self.with_grant(generation, |_| ()).is_none() {
            debug!(generation, "poll reply for superseded login dropped");
            return;
        }

        let resp = match reply {
            Ok(resp) if resp.is_success() => resp,
            Ok(resp) => {
                debug!(status = resp.status, "not authorized yet");
                self.retry_poll(generation);
                return;
            }
            Err(e) => {
                debug!(err = %e, "token poll failed");
                self.retry_poll(generation);
                return;
            }
        };

        self.grant.lock().take();
        match resp.parse::<TokenResponse>() {
            Ok(token) => {
                self.transition(AuthState::Authorized);
                info!(agent = %agent.id, "voice agent authorized");
                self.apply_token(&agent, &token);
                self.emit(AuthEvent::Authorized { agent: agent.id.clone() });
            }
            Err(e) => {
                self.transition(AuthState::Failed);
                self.fail(&agent.id, format!("malformed token response: {e}"));
            }
        }
    }

    fn retry_poll(self: &Arc<Self>, generation: u64) {
        let mut guard = self.grant.lock();
        let Some(grant) = guard.as_mut().filter(|g| g.generation == generation) else {
            return;
        };
        grant.budget.remaining -= 1;
        let remaining = grant.budget.remaining;

        if self.config.enforce_poll_budget && remaining <= 0 {
            guard.take();
            drop(guard);
            warn!("poll budget exhausted, login abandoned");
            self.transition(AuthState::Abandoned);
            return;
        }
        if remaining < 0 {
            debug!(remaining, "poll budget overrun");
        }
        grant.poll = Some(self.schedule_poll(generation, grant.interval));
        drop(guard);

        self.emit(AuthEvent::PollRetry { remaining });
    }

    fn with_grant<T>(&self, generation: u64, f: impl FnOnce(&Grant) -> T) -> Option<T> {
        self.grant.lock().as_ref().filter(|g| g.generation == generation).map(f)
    }

    /// Store a token pair, arm the next refresh for the token's lifetime and
    /// push the access token into the attached session if it is open.
    ///
    /// The push is not awaited: the agent's reply is only logged.
    pub fn apply_token(self: &Arc<Self>, agent: &VoiceAgent, token: &TokenResponse) {
        if let Err(e) = self.store.set_tokens(&token.access_token, token.refresh_token.as_deref()) {
            warn!(err = %e, "failed to persist tokens");
        }

        self.arm_refresh(agent, Duration::from_secs(token.expires_in.max(1)));

        match self.target() {
            Some(session) if session.is_open() => {
                let agent = agent.clone();
                let query = json!({ "token": token.access_token });
                tokio::spawn(async move {
                    match call_agent(&session, &agent, SET_AUTH_TOKEN_VERB, query).await {
                        Ok(_) => debug!(agent = %agent.id, "token pushed to agent"),
                        Err(e) => warn!(agent = %agent.id, err = %e, "setAuthToken failed"),
                    }
                });
            }
            _ => debug!(agent = %agent.id, "agent session not open, token stored only"),
        }
    }

    fn arm_refresh(self: &Arc<Self>, agent: &VoiceAgent, delay: Duration) {
        let flow = Arc::clone(self);
        let target = agent.clone();
        let task = ScheduledTask::after(delay, async move { flow.refresh_due(target).await });
        debug!(agent = %agent.id, secs = delay.as_secs(), "refresh armed");
        self.refresh_tasks.lock().insert(agent.id.clone(), task);
    }

    /// Body of an armed refresh timer.
    async fn refresh_due(self: Arc<Self>, agent: VoiceAgent) {
        let deadline = self.refresh_deadline(&agent.id);
        let state = self.state();
        let ready =
            self.store.refresh_token().is_some() && state.can_transition_to(AuthState::Refreshing);
        if ready {
            if state.can_transition_to(AuthState::TokenExpired) {
                self.transition(AuthState::TokenExpired);
            }
            if self.refresh_token(Some(&agent)).await != RefreshOutcome::Skipped {
                return;
            }
        } else {
            warn!(agent = %agent.id, %state, "refresh due but not possible, skipped");
        }
        // Drop the spent timer unless a newer one replaced it meanwhile.
        let mut tasks = self.refresh_tasks.lock();
        if tasks.get(&agent.id).map(ScheduledTask::deadline) == deadline {
            tasks.remove(&agent.id);
        }
    }

    /// Exchange the stored refresh token for a new pair.
    ///
    /// Skips without any request when `agent` is missing or no refresh token
    /// is stored. A failure ends the refresh chain; the user must log in again.
    pub async fn refresh_token(self: &Arc<Self>, agent: Option<&VoiceAgent>) -> RefreshOutcome {
        let Some(agent) = agent else {
            warn!("no agent specified, refresh skipped");
            return RefreshOutcome::Skipped;
        };
        let Some(refresh_token) = self.store.refresh_token() else {
            warn!(agent = %agent.id, "no refresh token stored, refresh skipped");
            return RefreshOutcome::Skipped;
        };
        if !self.transition(AuthState::Refreshing) {
            warn!(state = %self.state(), "refresh not possible now, skipped");
            return RefreshOutcome::Skipped;
        }

        let form = refresh_form(&refresh_token, &self.config.client_id);
        let outcome = match self.provider.post_form(ProviderEndpoint::Token, form).await {
            Ok(resp) if resp.is_success() => resp.parse::<TokenResponse>(),
            Ok(resp) => Err(anyhow::anyhow!(rejection("refresh", &resp))),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(token) => {
                self.transition(AuthState::Authorized);
                info!(agent = %agent.id, "token refreshed");
                self.apply_token(agent, &token);
                self.emit(AuthEvent::Authorized { agent: agent.id.clone() });
                RefreshOutcome::Refreshed
            }
            Err(e) => {
                self.refresh_tasks.lock().remove(&agent.id);
                self.transition(AuthState::Failed);
                self.fail(&agent.id, format!("refresh failed: {e}"));
                RefreshOutcome::Failed
            }
        }
    }

    /// Forget stored tokens, stop every timer and return to `idle`.
    pub fn logout(&self) -> anyhow::Result<()> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.grant.lock().take();
        self.refresh_tasks.lock().clear();
        self.transition(AuthState::Idle);
        self.store.clear_tokens()
    }

    fn transition(&self, next: AuthState) -> bool {
        let mut prev = None;
        self.state.send_if_modified(|state| {
            if state.can_transition_to(next) {
                prev = Some(*state);
                *state = next;
                true
            } else {
                false
            }
        });
        match prev {
            Some(prev) if prev != next => {
                info!(%prev, %next, "auth state");
                self.emit(AuthEvent::StateChanged { prev, next });
                true
            }
            Some(_) => true,
            None => {
                debug!(state = %self.state(), %next, "auth transition refused");
                false
            }
        }
    }

    fn fail(&self, agent: &str, error: String) {
        warn!(agent, %error, "authorization failed");
        self.emit(AuthEvent::Failed { agent: agent.to_owned(), error });
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }
}

fn rejection(what: &str, resp: &ProviderResponse) -> String {
    format!("{what} rejected ({}): {}", resp.status, resp.body)
}

#[cfg(test)]
#[path = "flow_tests.rs"]
mod tests;
