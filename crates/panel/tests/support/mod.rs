// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process stand-ins for a binder and the identity provider.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Form, Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{any, post};
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use vshl_panel::binder::frame::SUBPROTOCOL;
use vshl_panel::binder::Endpoint;

pub const ALEXA_API: &str = "alexa-voiceagent";

/// Calls and tokens a mock binder has seen.
#[derive(Default)]
pub struct BinderLog {
    pub calls: Mutex<Vec<(String, Value)>>,
    pub tokens: Mutex<Vec<String>>,
}

impl BinderLog {
    pub fn methods(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn args_of(&self, method: &str) -> Option<Value> {
        self.calls.lock().iter().find(|(m, _)| m == method).map(|(_, a)| a.clone())
    }
}

pub struct MockBinder {
    pub addr: SocketAddr,
    pub log: Arc<BinderLog>,
}

impl MockBinder {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.addr.to_string())
    }
}

pub fn agents_reply() -> Value {
    json!({
        "default": "VA-001",
        "agents": [
            {
                "id": "VA-001",
                "name": "Alexa",
                "description": "Alexa voice assistant",
                "api": ALEXA_API,
                "vendor": "Amazon.com Services Inc",
                "active": true,
                "wakewords": ["alexa"],
                "activewakeword": "alexa"
            },
            {
                "id": "VA-002",
                "name": "Other",
                "api": "other-voiceagent",
                "active": false
            }
        ]
    })
}

fn success(response: Value) -> Value {
    json!({
        "jtype": "afb-reply",
        "request": { "status": "success" },
        "response": response
    })
}

fn failure(status: &str, info: &str) -> Value {
    json!({
        "jtype": "afb-reply",
        "request": { "status": status, "info": info }
    })
}

/// Start a binder speaking `x-afb-ws-json1` on `/api`.
///
/// Verbs: `vshl/enumerateVoiceAgents` (followed by a connection-state event),
/// `vshl/setDefaultVoiceAgent`,
/// `vshl/subscribe` (pushes one dialog-state event), `vshl/startListening`,
/// `vshl/cancelListening`, `{alexa}/setAuthToken`; `vshl/hang` closes the
/// socket without answering; anything else fails.
pub async fn mock_binder() -> anyhow::Result<MockBinder> {
    let log = Arc::new(BinderLog::default());
    let app = Router::new().route("/api", any(upgrade)).with_state(Arc::clone(&log));

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok(MockBinder { addr, log })
}

async fn upgrade(
    State(log): State<Arc<BinderLog>>,
    Query(query): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    if query.get("x-afb-token").map(String::as_str) != Some("HELLO") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.protocols([SUBPROTOCOL]).on_upgrade(move |socket| serve_binder(socket, log)).into_response()
}

async fn serve_binder(socket: WebSocket, log: Arc<BinderLog>) {
    let (mut tx, mut rx) = socket.split();
    while let Some(Ok(msg)) = rx.next().await {
        let Message::Text(text) = msg else { continue };
        let Ok(Value::Array(items)) = serde_json::from_str::<Value>(text.as_str()) else {
            continue;
        };
        let id = items.get(1).cloned().unwrap_or(Value::Null);
        let method = items.get(2).and_then(Value::as_str).unwrap_or_default().to_owned();
        let args = items.get(3).cloned().unwrap_or(Value::Null);
        log.calls.lock().push((method.clone(), args.clone()));

        let mut out = Vec::new();
        match method.as_str() {
            "vshl/enumerateVoiceAgents" => {
                out.push(json!([3, id, success(agents_reply())]));
                out.push(json!([5, "vshl/voice_connectionstate_event", { "state": "CONNECTED" }]));
            }
            "vshl/setDefaultVoiceAgent" | "vshl/cancelListening" => {
                out.push(json!([3, id, success(json!({}))]));
            }
            "vshl/startListening" => out.push(json!([3, id, success(json!({ "request_id": "req-7" }))])),
            "vshl/subscribe" => {
                out.push(json!([3, id, success(json!({}))]));
                out.push(json!([5, "vshl/voice_dialogstate_event", { "state": "IDLE" }]));
            }
            "vshl/hang" => break,
            m if m == format!("{ALEXA_API}/setAuthToken") => {
                let token = args.get("token").and_then(Value::as_str).unwrap_or_default();
                log.tokens.lock().push(token.to_owned());
                out.push(json!([3, id, success(json!({}))]));
            }
            _ => out.push(json!([4, id, failure("unknown-verb", "no such verb")])),
        }
        for frame in out {
            if tx.send(Message::Text(frame.to_string().into())).await.is_err() {
                return;
            }
        }
    }
    let _ = tx.close().await;
}

/// Form bodies a mock provider has received, per route.
#[derive(Default)]
pub struct ProviderLog {
    pub code_pair: Mutex<Vec<HashMap<String, String>>>,
    pub token: Mutex<Vec<HashMap<String, String>>>,
}

pub struct MockProvider {
    pub code_pair_url: String,
    pub token_url: String,
    pub log: Arc<ProviderLog>,
}

/// Start an identity provider with scripted `(status, body)` replies. The
/// last reply of each route repeats once its script runs out.
pub async fn mock_provider(
    code_pair: Vec<(u16, String)>,
    token: Vec<(u16, String)>,
) -> anyhow::Result<MockProvider> {
    let log = Arc::new(ProviderLog::default());
    let code_pair = Arc::new(code_pair);
    let token = Arc::new(token);

    let cp_log = Arc::clone(&log);
    let tok_log = Arc::clone(&log);
    let app = Router::new()
        .route(
            "/auth/O2/create/codepair",
            post(move |Form(form): Form<HashMap<String, String>>| {
                let log = Arc::clone(&cp_log);
                let script = Arc::clone(&code_pair);
                async move { scripted(&log.code_pair, &script, form) }
            }),
        )
        .route(
            "/auth/O2/token",
            post(move |Form(form): Form<HashMap<String, String>>| {
                let log = Arc::clone(&tok_log);
                let script = Arc::clone(&token);
                async move { scripted(&log.token, &script, form) }
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok(MockProvider {
        code_pair_url: format!("http://{addr}/auth/O2/create/codepair"),
        token_url: format!("http://{addr}/auth/O2/token"),
        log,
    })
}

fn scripted(
    seen: &Mutex<Vec<HashMap<String, String>>>,
    script: &[(u16, String)],
    form: HashMap<String, String>,
) -> (StatusCode, String) {
    let idx = {
        let mut seen = seen.lock();
        seen.push(form);
        seen.len() - 1
    };
    let (status, body) = script
        .get(idx)
        .or_else(|| script.last())
        .cloned()
        .unwrap_or((500, "{}".to_owned()));
    (StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), body)
}

/// Start a server that reads one request, then answers `200` with a body
/// shorter than its `Content-Length` and hangs up. Returns its URL.
pub async fn truncating_server() -> anyhow::Result<String> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let head = "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 100\r\n\r\n{\"access";
            let _ = stream.write_all(head.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });
    Ok(format!("http://{addr}/auth/O2/token"))
}

/// Start a binder that completes the handshake and then never answers.
pub async fn silent_binder() -> anyhow::Result<MockBinder> {
    let log = Arc::new(BinderLog::default());
    let app = Router::new()
        .route(
            "/api",
            any(|State(log): State<Arc<BinderLog>>, ws: WebSocketUpgrade| async move {
                ws.protocols([SUBPROTOCOL]).on_upgrade(move |socket| swallow(socket, log))
            }),
        )
        .with_state(Arc::clone(&log));

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok(MockBinder { addr, log })
}

async fn swallow(mut socket: WebSocket, log: Arc<BinderLog>) {
    while let Some(Ok(msg)) = socket.recv().await {
        if let Message::Text(text) = msg {
            log.calls.lock().push((text.as_str().to_owned(), Value::Null));
        }
    }
}

/// Start a binder that drops every connection right after the upgrade.
pub async fn hangup_binder() -> anyhow::Result<SocketAddr> {
    let app = Router::new().route(
        "/api",
        any(|ws: WebSocketUpgrade| async move {
            ws.protocols([SUBPROTOCOL]).on_upgrade(|socket| async move { drop(socket) })
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok(addr)
}

pub fn install_crypto() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}
