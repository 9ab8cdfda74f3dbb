// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subcommand dispatch and terminal rendering.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::auth::{AuthEvent, AuthState, RefreshOutcome};
use crate::binder::log::{ActivityLog, LogEntry};
use crate::config::{Command, PanelConfig};
use crate::hub::AgentList;
use crate::panel::Panel;

pub fn init_tracing(config: &PanelConfig) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

pub async fn run(config: PanelConfig) -> anyhow::Result<()> {
    let command = config.command();
    let panel = Panel::new(config)?;

    if command == Command::Logout {
        panel.logout()?;
        println!("stored tokens cleared");
        return Ok(());
    }

    let printer = print_activity(panel.log());
    let result = dispatch(&panel, command).await;
    panel.close();
    printer.abort();
    result
}

async fn dispatch(panel: &Arc<Panel>, command: Command) -> anyhow::Result<()> {
    let agents = panel.connect_hub().await?;

    match command {
        Command::Run { login } => {
            print_agents(&agents);
            let _auth_printer = print_auth_events(panel.flow().subscribe());
            if let Err(e) = panel.connect_alexa().await {
                warn!(err = %e, "alexa voice agent not reachable");
            }
            if !panel.bootstrap_auth().await && login {
                panel.login().await?;
            }
            info!("panel running, press Ctrl-C to exit");
            tokio::signal::ctrl_c().await?;
        }
        Command::Agents => print_agents(&agents),
        Command::SetDefault { ref id } => print_agents(&panel.set_default_agent(id).await?),
        Command::Subscribe { ref va_id, .. } => {
            panel.subscribe_agent(va_id, &command.agent_events()).await?;
            info!(va_id = %va_id, "subscribed, press Ctrl-C to exit");
            tokio::signal::ctrl_c().await?;
        }
        Command::Listen => match panel.start_listening().await? {
            Some(id) => println!("listening, request id {id}"),
            None => println!("listening"),
        },
        Command::CancelListen => {
            panel.cancel_listening().await?;
            println!("listening cancelled");
        }
        Command::Login => {
            if let Err(e) = panel.connect_alexa().await {
                warn!(err = %e, "alexa voice agent not reachable, token will only be stored");
            }
            login_until_done(panel).await?;
        }
        Command::Refresh => {
            if let Err(e) = panel.connect_alexa().await {
                warn!(err = %e, "alexa voice agent not reachable, token will only be stored");
            }
            match panel.refresh().await {
                RefreshOutcome::Refreshed => println!("token refreshed"),
                RefreshOutcome::Skipped => anyhow::bail!("nothing to refresh, log in first"),
                RefreshOutcome::Failed => anyhow::bail!("refresh failed, log in again"),
            }
        }
        Command::SetAlexaAddress { ref host } => {
            panel.set_alexa_address(host).await?;
            println!("alexa voice agent address set to {host}");
        }
        Command::Logout => panel.logout()?,
    }
    Ok(())
}

/// Run a login and wait until it is authorized, abandoned or failed.
async fn login_until_done(panel: &Arc<Panel>) -> anyhow::Result<()> {
    let flow = panel.flow();
    let mut state = flow.watch_state();
    let _printer = print_auth_events(flow.subscribe());

    if panel.login().await?.is_none() {
        anyhow::bail!("login not started");
    }

    loop {
        tokio::select! {
            changed = state.changed() => {
                changed?;
                let current = *state.borrow_and_update();
                match current {
                    AuthState::Authorized => {
                        println!("authorized");
                        return Ok(());
                    }
                    AuthState::Abandoned => anyhow::bail!("login abandoned: code expired"),
                    AuthState::Failed => anyhow::bail!("login failed"),
                    _ => {}
                }
            }
            r = tokio::signal::ctrl_c() => {
                r?;
                anyhow::bail!("login interrupted");
            }
        }
    }
}

fn print_agents(list: &AgentList) {
    if list.agents.is_empty() {
        println!("no voice agents");
    }
    for agent in &list.agents {
        let marker = if list.is_default(agent) { "*" } else { " " };
        let active = if agent.active { "active" } else { "inactive" };
        println!("{marker} {:<24} {:<12} {:<20} {active}", agent.id, agent.name, agent.api);
    }
}

/// Print every activity log entry until aborted.
fn print_activity(log: &ActivityLog) -> JoinHandle<()> {
    let mut rx = log.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(entry @ LogEntry::Event { .. }) => println!("event {}", entry.render()),
                Ok(entry) => println!("{}", entry.render()),
                Err(broadcast::error::RecvError::Lagged(n)) => warn!(skipped = n, "activity log lagged"),
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Print auth events; the task stops when the returned guard is dropped.
fn print_auth_events(mut rx: broadcast::Receiver<AuthEvent>) -> AbortOnDrop {
    AbortOnDrop(tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(AuthEvent::CodePair { user_code, login_page, .. }) => {
                    println!("to authorize, open {login_page} and enter code {user_code}");
                }
                Ok(AuthEvent::Failed { error, .. }) => println!("authorization failed: {error}"),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }))
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
