// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Push channel supervisor: owns at most one live WebSocket and at most one
//! pending reconnect timer, and turns transport activity into a typed event
//! stream.

mod backoff;
mod lifecycle;

pub use backoff::ReconnectPolicy;
pub use lifecycle::{CloseOutcome, ConnectionState, Lifecycle};

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec::{self, ClientCommand, ServerEvent};
use crate::credential::Credentials;

const DEFAULT_CLOSE_REASON: &str = "client disconnect";

/// Everything subscribers can observe about the push channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorEvent {
    Opened,
    Event(ServerEvent),
    Closed { clean: bool },
    TransportError(String),
    DecodeFailed(String),
    /// Reconnect attempts exhausted; the channel stays down until the next
    /// explicit connect.
    ReconnectFailed,
}

/// Status summary for a connected/disconnected indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Failed,
}

enum Outbound {
    Frame(String),
    Close(String),
}

/// The driver task currently allowed to touch the connection state.
struct Run {
    epoch: u64,
    cancel: CancellationToken,
    outbound: mpsc::UnboundedSender<Outbound>,
    task: JoinHandle<()>,
}

struct Control {
    lifecycle: Lifecycle,
    run: Option<Run>,
    next_epoch: u64,
}

struct Inner {
    url: String,
    credentials: Arc<dyn Credentials>,
    events: broadcast::Sender<SupervisorEvent>,
    state_tx: watch::Sender<ConnectionState>,
    control: Mutex<Control>,
}

impl Inner {
    fn emit(&self, event: SupervisorEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn publish(&self, ctl: &Control) {
        self.state_tx.send_replace(ctl.lifecycle.state());
    }

    /// Apply `f` only if `epoch` is still the active run. Returns what `f`
    /// returned, or `None` when the run was superseded or disconnected.
    fn with_run<T>(&self, epoch: u64, f: impl FnOnce(&mut Control) -> T) -> Option<T> {
        let mut ctl = self.control.lock();
        if ctl.run.as_ref().map(|r| r.epoch) != Some(epoch) {
            return None;
        }
        let out = f(&mut *ctl);
        self.publish(&ctl);
        Some(out)
    }
}

/// Owner of the push channel for one authenticated session.
///
/// `connect` spawns onto the current tokio runtime, so it must be called from
/// within one.
pub struct ConnectionSupervisor {
    inner: Arc<Inner>,
}

impl ConnectionSupervisor {
    /// `url` is the push channel address without the token parameter.
    pub fn new(
        url: impl Into<String>,
        credentials: Arc<dyn Credentials>,
        policy: ReconnectPolicy,
    ) -> Self {
        crate::install_crypto_provider();
        let (events, _) = broadcast::channel(256);
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let inner = Arc::new(Inner {
            url: url.into(),
            credentials,
            events,
            state_tx,
            control: Mutex::new(Control {
                lifecycle: Lifecycle::new(policy),
                run: None,
                next_epoch: 0,
            }),
        });
        Self { inner }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.inner.events.subscribe()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.control.lock().lifecycle.state()
    }

    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    pub fn status(&self) -> ConnectionStatus {
        let ctl = self.inner.control.lock();
        if ctl.lifecycle.state().is_open() {
            ConnectionStatus::Connected
        } else if ctl.lifecycle.exhausted() {
            ConnectionStatus::Failed
        } else {
            ConnectionStatus::Disconnected
        }
    }

    /// Start the connection. No-op while connecting, open or waiting to
    /// reconnect, without a credential, and outside a tokio runtime.
    pub fn connect(&self) {
        let mut ctl = self.inner.control.lock();
        if ctl.lifecycle.state().is_in_flight() {
            debug!(state = ?ctl.lifecycle.state(), "connect ignored, push channel already in flight");
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime, push channel not started");
            return;
        };
        if !ctl.lifecycle.begin_connect(self.inner.credentials.is_authenticated()) {
            warn!("not authenticated, push channel not started");
            return;
        }

        let epoch = ctl.next_epoch;
        ctl.next_epoch += 1;
        let cancel = CancellationToken::new();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        // Spawned under the lock so the driver never observes a missing run.
        let task = runtime.spawn(drive(Arc::clone(&self.inner), epoch, cancel.clone(), outbound_rx));
        ctl.run = Some(Run { epoch, cancel, outbound, task });
        self.inner.publish(&ctl);
    }

    /// Close quietly: cancels any pending reconnect, closes the live socket
    /// with a normal close code, and leaves the state `Closed`. Idempotent.
    pub fn disconnect(&self, reason: Option<&str>) {
        // The driver finishes the close handshake in the background.
        drop(self.stop(reason));
    }

    /// Like [`disconnect`](Self::disconnect), but waits until queued commands
    /// are flushed and the close frame is sent.
    pub async fn close(&self, reason: Option<&str>) {
        if let Some(task) = self.stop(reason) {
            let _ = task.await;
        }
    }

    fn stop(&self, reason: Option<&str>) -> Option<JoinHandle<()>> {
        let mut ctl = self.inner.control.lock();
        let run = ctl.run.take();
        ctl.lifecycle.disconnect();
        self.inner.publish(&ctl);
        drop(ctl);

        let run = run?;
        let reason = reason.unwrap_or(DEFAULT_CLOSE_REASON).to_owned();
        info!(%reason, "push channel disconnect");
        let _ = run.outbound.send(Outbound::Close(reason));
        run.cancel.cancel();
        self.inner.emit(SupervisorEvent::Closed { clean: true });
        Some(run.task)
    }

    /// Send a command if the channel is open. Otherwise the command is
    /// dropped with a warning; there is no outbox. Returns whether the
    /// command was handed to the socket.
    pub fn send(&self, command: &ClientCommand) -> bool {
        let ctl = self.inner.control.lock();
        let run = match ctl.run {
            Some(ref run) if ctl.lifecycle.state().is_open() => run,
            _ => {
                warn!(?command, state = ?ctl.lifecycle.state(), "push channel not open, command dropped");
                return false;
            }
        };
        run.outbound.send(Outbound::Frame(codec::encode(command))).is_ok()
    }

    /// Wait until the channel opens, fails, or `timeout` elapses. Returns
    /// whether it is open.
    pub async fn wait_open(&self, timeout: Duration) -> bool {
        let mut rx = self.watch_state();
        let settled = tokio::time::timeout(
            timeout,
            rx.wait_for(|s| s.is_open() || !s.is_in_flight()),
        )
        .await;
        matches!(settled, Ok(Ok(ref state)) if state.is_open())
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        self.disconnect(None);
    }
}

/// Append the auth token as a percent-encoded query parameter.
pub fn build_ws_url(base_url: &str, token: &str) -> String {
    match reqwest::Url::parse(base_url) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("token", token);
            url.into()
        }
        // connect_async rejects it with a clear error; keep the token out.
        Err(e) => {
            debug!(url = base_url, err = %e, "push channel url does not parse");
            base_url.to_owned()
        }
    }
}

enum PumpEnd {
    Cancelled,
    Closed { clean: bool },
}

/// One driver task per explicit `connect`: open, pump, back off, repeat.
async fn drive(
    inner: Arc<Inner>,
    epoch: u64,
    cancel: CancellationToken,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
) {
    loop {
        let Some(token) = inner.credentials.token() else {
            warn!("credential gone, push channel stopped");
            let stopped = inner.with_run(epoch, |ctl| {
                ctl.lifecycle.disconnect();
                ctl.run = None;
            });
            if stopped.is_some() {
                inner.emit(SupervisorEvent::Closed { clean: false });
            }
            return;
        };
        let url = build_ws_url(&inner.url, &token);

        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            r = tokio_tungstenite::connect_async(&url) => r,
        };

        let clean = match connected {
            Ok((mut ws, _)) => {
                if inner.with_run(epoch, |ctl| ctl.lifecycle.opened()).is_none() {
                    // Disconnect won the race with the handshake.
                    close_normally(&mut ws, &mut outbound_rx).await;
                    return;
                }
                info!(url = %inner.url, "push channel open");
                inner.emit(SupervisorEvent::Opened);

                match pump(&inner, ws, &cancel, &mut outbound_rx).await {
                    PumpEnd::Cancelled => return,
                    PumpEnd::Closed { clean } => clean,
                }
            }
            Err(e) => {
                warn!(url = %inner.url, err = %e, "push channel connect failed");
                inner.emit(SupervisorEvent::TransportError(e.to_string()));
                false
            }
        };

        let authenticated = inner.credentials.is_authenticated();
        let outcome = inner.with_run(epoch, |ctl| {
            let outcome = ctl.lifecycle.closed(clean, authenticated);
            if !matches!(outcome, CloseOutcome::Retry { .. }) {
                ctl.run = None;
            }
            outcome
        });
        // None: disconnect already took over and reported the close.
        let Some(outcome) = outcome else { return };
        inner.emit(SupervisorEvent::Closed { clean });

        match outcome {
            CloseOutcome::Retry { attempt, delay } => {
                info!(attempt, delay_ms = delay.as_millis(), "push channel reconnect scheduled");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                if inner.with_run(epoch, |ctl| ctl.lifecycle.retry_elapsed()).is_none() {
                    return;
                }
            }
            CloseOutcome::Stopped => {
                debug!(clean, "push channel closed, not reconnecting");
                return;
            }
            CloseOutcome::Exhausted => {
                error!("push channel reconnect attempts exhausted");
                inner.emit(SupervisorEvent::ReconnectFailed);
                return;
            }
        }
    }
}

/// Shuttle frames until the socket closes or the run is cancelled.
async fn pump<S>(
    inner: &Inner,
    ws: tokio_tungstenite::WebSocketStream<S>,
    cancel: &CancellationToken,
    outbound_rx: &mut mpsc::UnboundedReceiver<Outbound>,
) -> PumpEnd
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                close_normally(&mut write, outbound_rx).await;
                return PumpEnd::Cancelled;
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match codec::decode(&text) {
                        Ok(event) => inner.emit(SupervisorEvent::Event(event)),
                        Err(e) => {
                            warn!(err = %e, "push frame ignored");
                            inner.emit(SupervisorEvent::DecodeFailed(e.to_string()));
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let clean = frame.as_ref().is_some_and(|f| f.code == CloseCode::Normal);
                        debug!(clean, "push channel closed by server");
                        return PumpEnd::Closed { clean };
                    }
                    Some(Ok(_)) => {} // Ignore binary, ping, pong.
                    Some(Err(e)) => {
                        warn!(err = %e, "push channel error");
                        inner.emit(SupervisorEvent::TransportError(e.to_string()));
                        return PumpEnd::Closed { clean: false };
                    }
                    None => return PumpEnd::Closed { clean: false },
                }
            }
            out = outbound_rx.recv() => {
                match out {
                    Some(Outbound::Frame(text)) => {
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            warn!(err = %e, "push channel send failed");
                            inner.emit(SupervisorEvent::TransportError(e.to_string()));
                            return PumpEnd::Closed { clean: false };
                        }
                    }
                    // Nothing is queued behind a close.
                    Some(Outbound::Close(reason)) => {
                        send_close(&mut write, reason).await;
                        return PumpEnd::Cancelled;
                    }
                    None => return PumpEnd::Cancelled,
                }
            }
        }
    }
}

/// Flush queued commands, then send a normal close frame.
async fn close_normally<W>(write: &mut W, outbound_rx: &mut mpsc::UnboundedReceiver<Outbound>)
where
    W: futures_util::Sink<Message> + Unpin,
{
    let reason = flush_outbound(write, outbound_rx).await;
    send_close(write, reason).await;
}

async fn send_close<W>(write: &mut W, reason: String)
where
    W: futures_util::Sink<Message> + Unpin,
{
    let frame = CloseFrame { code: CloseCode::Normal, reason: reason.into() };
    let _ = write.send(Message::Close(Some(frame))).await;
}

/// Send commands accepted before the disconnect, and return the close reason
/// queued behind them.
async fn flush_outbound<W>(write: &mut W, outbound_rx: &mut mpsc::UnboundedReceiver<Outbound>) -> String
where
    W: futures_util::Sink<Message> + Unpin,
{
    let mut reason = DEFAULT_CLOSE_REASON.to_owned();
    while let Ok(out) = outbound_rx.try_recv() {
        match out {
            Outbound::Frame(text) => {
                if write.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            Outbound::Close(r) => reason = r,
        }
    }
    reason
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
