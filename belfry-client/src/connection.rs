//! WebSocket connection manager
//!
//! `SocketClient` owns the single live connection to the messaging gateway
//! and everything attached to it: the action handler registry, the current
//! identity binding, the server-assigned socket id, and the reconnect state
//! machine.
//!
//! # Connection Lifecycle
//!
//! ```text
//! Uninitialized → Connecting → Open
//!                     ↑          ↓
//!                  (timer) ← Closing/Closed
//! ```
//!
//! `init()` always tears down whatever came before it, so there is never
//! more than one live socket per client. On an unexpected close the client
//! schedules a reconnect through its [`ReconnectPolicy`]; a successful
//! re-dial synthesizes a `reconnect` action to every registered handler so
//! consumers can catch up on anything missed while offline. `cleanup()`
//! stops all of it and is safe to call at any point, any number of times.
//!
//! # Cloning
//!
//! `SocketClient` is cheaply cloneable over an `Arc`; all clones share the
//! same connection and registry.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock as StdRwLock};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use belfry_core::{
    actions, codec, ConnectionRegistration, Error, PersonChurch, Result, SocketFrame, GET_ID,
};

use crate::api::ApiClient;
use crate::backoff::ReconnectPolicy;
use crate::metrics::ClientMetrics;
use crate::registry::ActionRegistry;

type WsSink = futures::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;
type WsStream =
    futures::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Time given to the gateway to answer the `getId` bootstrap before
/// `init()` resolves.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection has been opened yet, or `cleanup()` ran
    Uninitialized,
    /// Dialing the gateway
    Connecting,
    /// Connected and operational
    Open,
    /// Close in progress
    Closing,
    /// Connection lost or closed
    Closed,
}

impl ConnectionState {
    /// String form of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Uninitialized => "uninitialized",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        }
    }

    fn as_metric(&self) -> i64 {
        match self {
            ConnectionState::Uninitialized => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Open => 2,
            ConnectionState::Closing => 3,
            ConnectionState::Closed => 4,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct ClientShared {
    socket_url: String,
    api: ApiClient,
    state: StdRwLock<ConnectionState>,
    socket_id: StdRwLock<Option<String>>,
    identity: StdRwLock<Option<PersonChurch>>,
    registry: ActionRegistry,
    sender: AsyncMutex<Option<WsSink>>,
    reconnect_attempts: AtomicU32,
    cleaned_up: AtomicBool,
    /// Bumped on every teardown. Receive loops and in-flight dials carry the
    /// epoch they were started under and stand down when it has moved on,
    /// so a re-entrant `init()` can never race a stale loop over the shared
    /// state.
    epoch: AtomicU64,
    reconnect_timer: StdMutex<Option<JoinHandle<()>>>,
    receive_task: StdMutex<Option<JoinHandle<()>>>,
    policy: StdMutex<Box<dyn ReconnectPolicy>>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl ClientShared {
    fn state(&self) -> ConnectionState {
        *self.state.read().unwrap()
    }

    fn set_state(&self, next: ConnectionState) {
        *self.state.write().unwrap() = next;
        if let Some(m) = &self.metrics {
            m.update_connection_state(next.as_metric());
        }
    }
}

/// Client for the gateway's real-time channel
#[derive(Clone)]
pub struct SocketClient {
    inner: Arc<ClientShared>,
}

impl SocketClient {
    pub(crate) fn from_parts(
        socket_url: String,
        api: ApiClient,
        policy: Box<dyn ReconnectPolicy>,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientShared {
                socket_url,
                api,
                state: StdRwLock::new(ConnectionState::Uninitialized),
                socket_id: StdRwLock::new(None),
                identity: StdRwLock::new(None),
                registry: ActionRegistry::new(),
                sender: AsyncMutex::new(None),
                reconnect_attempts: AtomicU32::new(0),
                cleaned_up: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                reconnect_timer: StdMutex::new(None),
                receive_task: StdMutex::new(None),
                policy: StdMutex::new(policy),
                metrics,
            }),
        }
    }

    /// Open the connection, tearing down any prior one first.
    ///
    /// Resolves once the socket is open, the `getId` bootstrap has been
    /// sent, and the settle delay has elapsed. Rejects with
    /// [`Error::WebSocket`] when the dial fails. Safe to call again at any
    /// time; the previous connection (even a still-pending one) is fully
    /// abandoned before the new dial starts.
    #[tracing::instrument(skip(self), fields(url = %self.inner.socket_url))]
    pub async fn init(&self) -> Result<()> {
        self.teardown_connection().await;

        let shared = &self.inner;
        shared.cleaned_up.store(false, Ordering::SeqCst);
        let epoch = shared.epoch.load(Ordering::SeqCst);
        shared.set_state(ConnectionState::Connecting);

        tracing::info!("Connecting to messaging gateway");
        let (ws_stream, _) = match connect_async(&shared.socket_url).await {
            Ok(connected) => connected,
            Err(e) => {
                shared.set_state(ConnectionState::Closed);
                tracing::error!(error = %e, "Failed to connect");
                return Err(Error::WebSocket(e.to_string()));
            }
        };

        // A newer init() or cleanup() may have taken over while we were
        // dialing; if so this socket is already orphaned.
        if shared.epoch.load(Ordering::SeqCst) != epoch {
            return Err(Error::ConnectionClosed);
        }

        let (sink, stream) = ws_stream.split();
        *shared.sender.lock().await = Some(sink);
        shared.set_state(ConnectionState::Open);
        shared.reconnect_attempts.store(0, Ordering::SeqCst);
        shared.policy.lock().unwrap().reset();

        let client = self.clone();
        let handle = tokio::spawn(async move { client.receive_loop(stream, epoch).await });
        *shared.receive_task.lock().unwrap() = Some(handle);

        tracing::info!("Connected, requesting socket identity");
        self.send_text(GET_ID.to_string()).await?;
        tokio::time::sleep(SETTLE_DELAY).await;

        Ok(())
    }

    /// Register or replace a handler for an action. See
    /// [`ActionRegistry::upsert`].
    pub fn add_handler<F>(&self, action: impl Into<String>, id: impl Into<String>, callback: F)
    where
        F: Fn(serde_json::Value) + Send + Sync + 'static,
    {
        self.inner.registry.upsert(action, id, callback);
    }

    /// Remove the handler with the given id. No-op when unknown.
    pub fn remove_handler(&self, id: &str) {
        self.inner.registry.remove_by_id(id);
    }

    /// Remove every handler for an action. No-op when none exist.
    pub fn remove_handlers_by_action(&self, action: &str) {
        self.inner.registry.remove_by_action(action);
    }

    /// Remove all handlers.
    pub fn clear_handlers(&self) {
        self.inner.registry.clear();
    }

    /// Number of registered handler entries.
    pub fn handler_count(&self) -> usize {
        self.inner.registry.handler_count()
    }

    /// Bind the connection to a person and church.
    ///
    /// Applied only when both ids are non-empty and at least one differs
    /// from the current binding. When the binding changes and the socket id
    /// is already known, a best-effort registration call is fired in the
    /// background; its failure is logged and never surfaced.
    pub fn set_person_church(&self, binding: PersonChurch) {
        if !binding.is_complete() {
            return;
        }

        let shared = &self.inner;
        {
            let mut identity = shared.identity.write().unwrap();
            if let Some(current) = identity.as_ref() {
                if current.same_routing(&binding) {
                    return;
                }
            }
            *identity = Some(binding);
        }

        self.spawn_register_connection();
    }

    /// Dispatch one decoded frame.
    ///
    /// The reserved `socketId` action stores the assigned identity and
    /// triggers the alert-routing registration. Every other action fans out
    /// to all matching handlers; a panicking handler is isolated so the
    /// rest still get the payload.
    pub fn handle_message(&self, frame: SocketFrame) {
        let shared = &self.inner;
        if let Some(m) = &shared.metrics {
            m.record_frame(&frame.action);
        }

        if frame.action == actions::SOCKET_ID {
            let socket_id = match frame.data.as_str() {
                Some(id) => id.to_string(),
                None => {
                    tracing::warn!("socketId frame without a string payload, dropping");
                    if let Some(m) = &shared.metrics {
                        m.record_dispatch_error("bad_socket_id");
                    }
                    return;
                }
            };
            tracing::debug!(socket_id = %socket_id, "Socket identity assigned");
            *shared.socket_id.write().unwrap() = Some(socket_id);
            self.spawn_register_connection();
            return;
        }

        let invoked = shared.registry.dispatch(&frame.action, &frame.data);
        tracing::debug!(action = %frame.action, handlers = invoked, "Frame dispatched");
    }

    /// Tear everything down.
    ///
    /// Cancels any pending reconnect, aborts the receive loop, closes the
    /// socket, clears the handler registry, identity binding and socket id,
    /// and resets the attempt counter. Idempotent, and safe to call even if
    /// `init()` never ran.
    pub async fn cleanup(&self) {
        self.teardown_connection().await;

        let shared = &self.inner;
        shared.registry.clear();
        *shared.identity.write().unwrap() = None;
        *shared.socket_id.write().unwrap() = None;
        shared.reconnect_attempts.store(0, Ordering::SeqCst);
        shared.set_state(ConnectionState::Uninitialized);
        tracing::debug!("Connection cleaned up");
    }

    /// True while the connection is open.
    pub fn is_connected(&self) -> bool {
        self.inner.state() == ConnectionState::Open
    }

    /// Current lifecycle state.
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// Server-assigned socket identity, once known.
    pub fn socket_id(&self) -> Option<String> {
        self.inner.socket_id.read().unwrap().clone()
    }

    /// Reconnect attempts since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.reconnect_attempts.load(Ordering::SeqCst)
    }

    /// Close the current connection without touching handlers or identity.
    /// Used by `init()` before dialing and by `cleanup()`.
    async fn teardown_connection(&self) {
        let shared = &self.inner;
        shared.cleaned_up.store(true, Ordering::SeqCst);
        shared.epoch.fetch_add(1, Ordering::SeqCst);

        if let Some(timer) = shared.reconnect_timer.lock().unwrap().take() {
            timer.abort();
        }
        if let Some(task) = shared.receive_task.lock().unwrap().take() {
            task.abort();
        }

        let had_socket = {
            let mut sender = shared.sender.lock().await;
            match sender.take() {
                Some(mut sink) => {
                    shared.set_state(ConnectionState::Closing);
                    let _ = sink.close().await;
                    true
                }
                None => false,
            }
        };
        if had_socket {
            shared.set_state(ConnectionState::Closed);
        }
    }

    async fn send_text(&self, text: String) -> Result<()> {
        let mut sender = self.inner.sender.lock().await;
        match sender.as_mut() {
            Some(sink) => sink
                .send(Message::Text(text))
                .await
                .map_err(|e| Error::WebSocket(e.to_string())),
            None => Err(Error::ConnectionClosed),
        }
    }

    async fn receive_loop(self, mut stream: WsStream, epoch: u64) {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => match codec::decode_frame(&text) {
                    Ok(frame) => self.handle_message(frame),
                    Err(e) => {
                        tracing::warn!(error = %e, "Dropping undecodable frame");
                        if let Some(m) = &self.inner.metrics {
                            m.record_dispatch_error("decode");
                        }
                    }
                },
                Ok(Message::Close(_)) => {
                    tracing::info!("Connection closed by gateway");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "WebSocket error");
                    break;
                }
                _ => {} // Ignore binary/ping/pong frames
            }
        }

        let shared = &self.inner;
        if shared.epoch.load(Ordering::SeqCst) != epoch {
            // A newer connection owns the state now.
            return;
        }

        shared.set_state(ConnectionState::Closed);
        shared.sender.lock().await.take();

        if shared.cleaned_up.load(Ordering::SeqCst) {
            return;
        }
        self.schedule_reconnect();
    }

    /// Arm the reconnect timer for the next attempt, or give up when the
    /// policy says so. Attempts reset to zero on every successful open.
    fn schedule_reconnect(&self) {
        let shared = &self.inner;
        let attempt = shared.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
        let delay = shared.policy.lock().unwrap().next_delay(attempt);

        let Some(delay) = delay else {
            tracing::warn!(
                attempts = attempt,
                "Reconnect abandoned; call init() to resume"
            );
            return;
        };

        tracing::info!(
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );
        if let Some(m) = &shared.metrics {
            m.record_reconnection_attempt();
        }

        let client = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // Drop our own slot entry first so the teardown inside init()
            // does not abort this very task.
            client.inner.reconnect_timer.lock().unwrap().take();

            let shared = &client.inner;
            if shared.cleaned_up.load(Ordering::SeqCst)
                || shared.state() != ConnectionState::Closed
            {
                return;
            }

            match client.init().await {
                Ok(()) => {
                    tracing::info!("Reconnected");
                    if let Some(m) = &shared.metrics {
                        m.record_reconnection_success();
                    }
                    shared
                        .registry
                        .dispatch(actions::RECONNECT, &serde_json::Value::Null);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Reconnect attempt failed");
                    shared.set_state(ConnectionState::Closed);
                    client.schedule_reconnect();
                }
            }
        });
        *shared.reconnect_timer.lock().unwrap() = Some(handle);
    }

    /// Fire the alert-routing registration in the background, if both the
    /// identity binding and the socket id are known.
    fn spawn_register_connection(&self) {
        let shared = &self.inner;
        let identity = shared.identity.read().unwrap().clone();
        let socket_id = shared.socket_id.read().unwrap().clone();

        let (Some(identity), Some(socket_id)) = (identity, socket_id) else {
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime available, skipping connection registration");
            return;
        };

        let api = shared.api.clone();
        runtime.spawn(async move {
            let registration = ConnectionRegistration::alerts(&identity, socket_id);
            if let Err(e) = api.register_connection(&registration).await {
                tracing::warn!(error = %e, "Failed to register connection for alerts");
            }
        });
    }
}
