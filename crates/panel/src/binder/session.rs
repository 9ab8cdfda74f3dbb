// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One persistent connection to a binder.
//!
//! `connect` moves the session `disconnected -> connecting -> open`, or to
//! `aborted` if the handshake fails. There is no automatic reconnect: a lost
//! connection stays `aborted` until the owner builds a new session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::binder::frame::{pattern_matches, Frame, SUBPROTOCOL};
use crate::binder::log::ActivityLog;
use crate::binder::{BinderEvent, ConnectionState, Endpoint};
use crate::error::BinderError;

/// Lazy, unbounded stream of events matching one subscription pattern.
pub type EventStream = UnboundedReceiverStream<BinderEvent>;

type PendingCalls = HashMap<String, oneshot::Sender<Result<Value, BinderError>>>;

struct Subscriber {
    pattern: String,
    tx: mpsc::UnboundedSender<BinderEvent>,
}

pub struct Session {
    endpoint: Endpoint,
    state: watch::Sender<ConnectionState>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    pending: Mutex<PendingCalls>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    log: Arc<ActivityLog>,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(endpoint: Endpoint) -> Arc<Self> {
        Self::with_log(endpoint, Arc::new(ActivityLog::new()))
    }

    /// Create a session that writes into a shared activity log.
    pub fn with_log(endpoint: Endpoint, log: Arc<ActivityLog>) -> Arc<Self> {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Arc::new(Self {
            endpoint,
            state,
            outbound: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            log,
            cancel: CancellationToken::new(),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn log(&self) -> &Arc<ActivityLog> {
        &self.log
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Watch connection state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Open the WebSocket. Resolves once the session is `open` or `aborted`.
    pub async fn connect(self: &Arc<Self>) -> Result<(), BinderError> {
        match self.state() {
            ConnectionState::Open => return Ok(()),
            ConnectionState::Connecting => {
                return Err(BinderError::Transport("connect already in progress".to_owned()))
            }
            ConnectionState::Disconnected | ConnectionState::Aborted => {}
        }
        self.set_state(ConnectionState::Connecting);

        let url = self.endpoint.ws_url();
        let mut request = match url.as_str().into_client_request() {
            Ok(r) => r,
            Err(e) => {
                self.set_state(ConnectionState::Aborted);
                return Err(BinderError::Transport(e.to_string()));
            }
        };
        request
            .headers_mut()
            .insert("Sec-WebSocket-Protocol", HeaderValue::from_static(SUBPROTOCOL));

        let connected = tokio::select! {
            _ = self.cancel.cancelled() => {
                self.set_state(ConnectionState::Aborted);
                return Err(BinderError::Closed);
            }
            r = tokio_tungstenite::connect_async(request) => r,
        };

        let (stream, _) = match connected {
            Ok(ok) => ok,
            Err(e) => {
                warn!(url = %self.endpoint.url(), err = %e, "binder connection aborted");
                self.set_state(ConnectionState::Aborted);
                return Err(BinderError::Transport(e.to_string()));
            }
        };

        let (mut write, read) = stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        *self.outbound.lock() = Some(tx);

        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = write.send(msg).await {
                    debug!(err = %e, "binder write failed");
                    break;
                }
            }
            let _ = write.close().await;
        });

        // Open must be published before the reader can observe a close.
        info!(url = %self.endpoint.url(), "binder connected");
        self.set_state(ConnectionState::Open);

        let session = Arc::clone(self);
        tokio::spawn(async move {
            session.read_loop(read).await;
        });
        Ok(())
    }

    /// Close the connection. Pending calls are rejected with [`BinderError::Closed`].
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Call `api/verb` with a key-value query.
    ///
    /// The request and its outcome are written to the activity log before the
    /// result is returned, and the activity counter advances on either outcome.
    pub async fn call(&self, api: &str, verb: &str, query: Value) -> Result<Value, BinderError> {
        self.log.command(&self.endpoint.url(), api, verb, &query);
        let result = self.send_call(api, verb, query).await;
        match &result {
            Ok(reply) => self.log.reply(reply),
            Err(e) => self.log.error(&e.payload()),
        }
        result
    }

    async fn send_call(&self, api: &str, verb: &str, query: Value) -> Result<Value, BinderError> {
        let id = (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id.clone(), tx);

        let frame = Frame::Call { id: id.clone(), method: format!("{api}/{verb}"), args: query };
        let sent = match self.outbound.lock().as_ref() {
            Some(out) => out.send(Message::Text(frame.encode().into())).is_ok(),
            None => false,
        };
        if !sent {
            self.pending.lock().remove(&id);
            return Err(BinderError::NotConnected);
        }

        rx.await.unwrap_or(Err(BinderError::Closed))
    }

    /// Register for events matching `pattern` (`*`, `api/*`, or an exact name).
    ///
    /// Registration takes effect before this returns. Events are delivered in
    /// arrival order for as long as the stream is held.
    pub fn subscribe(&self, pattern: &str) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(Subscriber { pattern: pattern.to_owned(), tx });
        UnboundedReceiverStream::new(rx)
    }

    /// Register `handler` for events matching `pattern` and drive it on a task.
    pub fn on_event<F>(&self, pattern: &str, mut handler: F)
    where
        F: FnMut(BinderEvent) + Send + 'static,
    {
        let mut events = self.subscribe(pattern);
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                handler(event);
            }
        });
    }

    async fn read_loop<S>(self: Arc<Self>, mut read: S)
    where
        S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        let closed_locally = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break true,
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.dispatch(text.as_str()),
                    Some(Ok(Message::Close(_))) | None => break false,
                    Some(Err(e)) => {
                        debug!(err = %e, "binder read failed");
                        break false;
                    }
                    _ => {}
                },
            }
        };

        // Drop the writer first so no new call can slip in after the drain.
        self.outbound.lock().take();
        let next = if closed_locally {
            ConnectionState::Disconnected
        } else {
            warn!(url = %self.endpoint.url(), "binder connection aborted");
            ConnectionState::Aborted
        };
        self.set_state(next);

        let pending: Vec<_> = self.pending.lock().drain().collect();
        for (_, tx) in pending {
            let _ = tx.send(Err(BinderError::Closed));
        }
    }

    fn dispatch(&self, text: &str) {
        match Frame::decode(text) {
            Ok(Frame::Reply { id, reply }) => self.resolve(&id, Ok(reply)),
            Ok(Frame::Failure { id, reply }) => self.resolve(&id, Err(BinderError::Rejected(reply))),
            Ok(Frame::Event { name, data }) => self.publish(BinderEvent { name, data }),
            Ok(Frame::Call { method, .. }) => debug!(method, "ignoring call from binder"),
            Err(e) => warn!(err = %e, "dropping undecodable binder frame"),
        }
    }

    fn resolve(&self, id: &str, result: Result<Value, BinderError>) {
        match self.pending.lock().remove(id) {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => debug!(id, "reply for unknown call"),
        }
    }

    fn publish(&self, event: BinderEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|s| !s.tx.is_closed());
        for sub in subscribers.iter().filter(|s| pattern_matches(&s.pattern, &event.name)) {
            let _ = sub.tx.send(event.clone());
        }
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(url = %self.endpoint.url(), %prev, %next, "binder state");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
