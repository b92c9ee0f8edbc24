// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process fake of the devsync backend: the notification push channel and
//! the REST endpoints the client consumes.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};

use devsync_notify::config::NotifyConfig;
use devsync_notify::supervisor::SupervisorEvent;

pub const TOKEN: &str = "secret";
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// What the server does to every connected socket.
#[derive(Debug, Clone)]
pub enum Push {
    Text(String),
    /// Send a close frame with this code.
    Close(u16),
    /// Drop the socket without a close frame.
    Drop,
}

/// What the server saw from a client.
#[derive(Debug, Clone, PartialEq)]
pub enum Seen {
    Text(Value),
    Close(Option<(u16, String)>),
}

struct ServerState {
    push: broadcast::Sender<Push>,
    seen: mpsc::UnboundedSender<Seen>,
    connections: AtomicUsize,
    tokens: Mutex<Vec<String>>,
    requests: Mutex<Vec<String>>,
    notifications: Mutex<Value>,
    invitations: Mutex<Value>,
}

pub struct FakeBackend {
    pub addr: SocketAddr,
    state: Arc<ServerState>,
    seen: mpsc::UnboundedReceiver<Seen>,
    _handle: tokio::task::JoinHandle<()>,
}

impl FakeBackend {
    pub async fn spawn() -> anyhow::Result<Self> {
        devsync_notify::install_crypto_provider();
        let (push, _) = broadcast::channel(64);
        let (seen_tx, seen) = mpsc::unbounded_channel();
        let state = Arc::new(ServerState {
            push,
            seen: seen_tx,
            connections: AtomicUsize::new(0),
            tokens: Mutex::new(vec![]),
            requests: Mutex::new(vec![]),
            notifications: Mutex::new(json!([])),
            invitations: Mutex::new(json!([])),
        });

        let router = Router::new()
            .route("/ws/notifications/", get(ws_handler))
            .route("/api/v1/notifications/", get(list_notifications))
            .route("/api/v1/invitations/", get(list_invitations))
            .route("/api/v1/invitations/{id}/accept/", post(invitation_reply))
            .route("/api/v1/invitations/{id}/reject/", post(invitation_reply))
            .route("/api/v1/votings/{id}/vote/", post(vote))
            .route("/api/v1/broken/", post(broken))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok(Self { addr, state, seen, _handle: handle })
    }

    pub fn api_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws/notifications/", self.addr)
    }

    pub fn config(&self) -> NotifyConfig {
        NotifyConfig {
            api_url: self.api_url(),
            ws_url: None,
            token: Some(TOKEN.to_owned()),
            max_reconnect_attempts: 5,
            reconnect_base_ms: 20,
            reconnect_cap_ms: 200,
            request_timeout_ms: 5000,
            log_format: "text".to_owned(),
            log_level: "debug".to_owned(),
        }
    }

    pub fn push(&self, push: Push) {
        let _ = self.state.push.send(push);
    }

    pub fn push_json(&self, value: Value) {
        self.push(Push::Text(value.to_string()));
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> Vec<String> {
        self.state.tokens.lock().clone()
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().clone()
    }

    pub fn set_notifications(&self, value: Value) {
        *self.state.notifications.lock() = value;
    }

    pub fn set_invitations(&self, value: Value) {
        *self.state.invitations.lock() = value;
    }

    /// Next thing a client sent, or an error after the timeout.
    pub async fn next_seen(&mut self) -> anyhow::Result<Seen> {
        tokio::time::timeout(RECV_TIMEOUT, self.seen.recv())
            .await
            .map_err(|_| anyhow::anyhow!("server saw nothing"))?
            .ok_or_else(|| anyhow::anyhow!("server gone"))
    }

    /// Whether the server sees nothing more within `window`.
    pub async fn quiet_for(&mut self, window: Duration) -> bool {
        tokio::time::timeout(window, self.seen.recv()).await.is_err()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    let expected = format!("Token {TOKEN}");
    headers.get("authorization").and_then(|v| v.to_str().ok()) == Some(expected.as_str())
}

async fn ws_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let token = query.get("token").cloned().unwrap_or_default();
    state.tokens.lock().push(token.clone());
    if token.is_empty() || token == "bad" {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    state.connections.fetch_add(1, Ordering::SeqCst);
    // Subscribe before the handshake completes so no push is missed.
    let push = state.push.subscribe();
    ws.on_upgrade(move |socket| serve_socket(state, socket, push))
}

async fn serve_socket(state: Arc<ServerState>, mut socket: WebSocket, mut push: broadcast::Receiver<Push>) {
    loop {
        tokio::select! {
            frame = push.recv() => match frame {
                Ok(Push::Text(text)) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Ok(Push::Close(code)) => {
                    let frame = CloseFrame { code, reason: "server close".into() };
                    let _ = socket.send(Message::Close(Some(frame))).await;
                    break;
                }
                Ok(Push::Drop) | Err(_) => break,
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let value = serde_json::from_str(&text).unwrap_or(Value::String(text.to_string()));
                    let _ = state.seen.send(Seen::Text(value));
                }
                Some(Ok(Message::Close(frame))) => {
                    let _ = state.seen.send(Seen::Close(frame.map(|f| (f.code, f.reason.to_string()))));
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            },
        }
    }
}

async fn list_notifications(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Invalid token."}))).into_response();
    }
    let notifications = state.notifications.lock().clone();
    Json(json!({ "notifications": notifications })).into_response()
}

async fn list_invitations(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let invitations = state.invitations.lock().clone();
    Json(json!({ "invitations": invitations })).into_response()
}

async fn invitation_reply(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<i64>,
    uri: axum::http::Uri,
) -> Response {
    state.requests.lock().push(uri.path().to_owned());
    Json(json!({ "invitation": id, "ok": true })).into_response()
}

async fn vote(State(state): State<Arc<ServerState>>, uri: axum::http::Uri) -> Response {
    state.requests.lock().push(uri.path().to_owned());
    StatusCode::NO_CONTENT.into_response()
}

async fn broken() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable").into_response()
}

/// Wait for the first event matching `pred`, skipping the rest.
pub async fn wait_for_event(
    rx: &mut broadcast::Receiver<SupervisorEvent>,
    pred: impl Fn(&SupervisorEvent) -> bool,
) -> anyhow::Result<SupervisorEvent> {
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    loop {
        let event = tokio::time::timeout_at(deadline, rx.recv())
            .await
            .map_err(|_| anyhow::anyhow!("timed out waiting for supervisor event"))??;
        if pred(&event) {
            return Ok(event);
        }
    }
}

pub fn notification_json(id: i64, created_at: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Notification {id}"),
        "message": "Task \"Deploy\" was assigned to you",
        "created_at": created_at,
        "is_read": false,
        "actions_data": [],
        "footnote": null
    })
}

pub fn push_frame(kind: &str, id: i64, data: Value) -> Value {
    json!({ "type": "notification", "data": { "id": id, "type": kind, "data": data } })
}

pub fn invitation_json(id: i64, date_created: &str) -> Value {
    json!({
        "id": id,
        "project": {
            "id": 12,
            "title": "Roadmap",
            "description": "",
            "owner": { "id": 1, "first_name": "Ada", "last_name": "King" }
        },
        "invited_by": 1,
        "date_created": date_created
    })
}
