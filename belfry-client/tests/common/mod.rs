//! Common test utilities for belfry-client integration tests
//!
//! Provides a mock messaging gateway (WebSocket) and a mock messaging API
//! (REST) so client behavior can be exercised without any real backend.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Per-message handler for the mock gateway. Returning `Some` sends that
/// text back to the client.
pub type GatewayHandler = Arc<dyn Fn(String) -> Option<String> + Send + Sync>;

/// Mock WebSocket gateway
///
/// Accepts connections, records everything the client sends, answers the
/// `getId` bootstrap with a `socketId` frame (default handler), and can
/// push arbitrary frames to every connected client.
pub struct MockGateway {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    message_rx: mpsc::Receiver<String>,
    push_tx: broadcast::Sender<String>,
    connections: Arc<AtomicUsize>,
}

impl MockGateway {
    /// Start a gateway on an ephemeral port with the default handler.
    pub async fn new() -> Self {
        Self::start(0, Self::default_handler()).await
    }

    /// Start a gateway on a specific port (for restart scenarios).
    pub async fn on_port(port: u16) -> Self {
        Self::start(port, Self::default_handler()).await
    }

    /// Start a gateway with a custom per-message handler.
    pub async fn with_handler(handler: GatewayHandler) -> Self {
        Self::start(0, handler).await
    }

    /// The stock handler: answer `getId` with a fixed socket identity.
    pub fn default_handler() -> GatewayHandler {
        Arc::new(|text| {
            if text == "getId" {
                Some(json!({"action": "socketId", "data": "mock-socket-1"}).to_string())
            } else {
                None
            }
        })
    }

    async fn start(port: u16, handler: GatewayHandler) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (msg_tx, message_rx) = mpsc::channel::<String>(100);
        let (push_tx, _) = broadcast::channel::<String>(100);
        let connections = Arc::new(AtomicUsize::new(0));

        let accept_push = push_tx.clone();
        let accept_connections = Arc::clone(&connections);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { break };
                        accept_connections.fetch_add(1, Ordering::SeqCst);
                        let msg_tx = msg_tx.clone();
                        let handler = Arc::clone(&handler);
                        let mut push_rx = accept_push.subscribe();

                        tokio::spawn(async move {
                            let Ok(ws_stream) = accept_async(stream).await else {
                                return;
                            };
                            let (mut write, mut read) = ws_stream.split();
                            loop {
                                tokio::select! {
                                    inbound = read.next() => {
                                        match inbound {
                                            Some(Ok(Message::Text(text))) => {
                                                let _ = msg_tx.send(text.clone()).await;
                                                if let Some(response) = handler(text) {
                                                    let _ = write.send(Message::Text(response)).await;
                                                }
                                            }
                                            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                                            Some(Ok(_)) => {}
                                        }
                                    }
                                    pushed = push_rx.recv() => {
                                        match pushed {
                                            Ok(text) => {
                                                let _ = write.send(Message::Text(text)).await;
                                            }
                                            Err(_) => break,
                                        }
                                    }
                                }
                            }
                        });
                    }
                }
            }
        });

        // Give the accept loop a moment to come up
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            addr,
            shutdown_tx,
            message_rx,
            push_tx,
            connections,
        }
    }

    /// WebSocket URL for connecting to this gateway.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Bound port, for restart scenarios.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Number of connections accepted since startup.
    pub fn connections_accepted(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Push an action frame to every connected client.
    pub fn push_frame(&self, action: &str, data: serde_json::Value) {
        let _ = self
            .push_tx
            .send(json!({"action": action, "data": data}).to_string());
    }

    /// Push a raw text message to every connected client.
    pub fn push_raw(&self, text: impl Into<String>) {
        let _ = self.push_tx.send(text.into());
    }

    /// Wait for the next message the client sent, up to five seconds.
    pub async fn wait_for_message(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(5), self.message_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Shut the gateway down, dropping every connection.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Mock messaging API
///
/// Serves `/privateMessages`, `/notifications` and `/connections` with
/// scriptable bodies and per-endpoint request counters. Setting a body to
/// `None` makes that endpoint answer 500.
pub struct MockApi {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    pm_requests: Arc<AtomicUsize>,
    notification_requests: Arc<AtomicUsize>,
    registrations: Arc<Mutex<Vec<serde_json::Value>>>,
    private_messages: Arc<Mutex<Option<serde_json::Value>>>,
    notifications: Arc<Mutex<Option<serde_json::Value>>>,
}

impl MockApi {
    pub async fn new() -> Self {
        use warp::http::StatusCode;
        use warp::Filter;

        let pm_requests = Arc::new(AtomicUsize::new(0));
        let notification_requests = Arc::new(AtomicUsize::new(0));
        let registrations = Arc::new(Mutex::new(Vec::new()));
        let private_messages = Arc::new(Mutex::new(Some(json!([]))));
        let notifications = Arc::new(Mutex::new(Some(json!([]))));

        let pm_route = {
            let counter = Arc::clone(&pm_requests);
            let body = Arc::clone(&private_messages);
            warp::path("privateMessages")
                .and(warp::path::end())
                .and(warp::get())
                .map(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    match body.lock().unwrap().clone() {
                        Some(value) => {
                            warp::reply::with_status(warp::reply::json(&value), StatusCode::OK)
                        }
                        None => warp::reply::with_status(
                            warp::reply::json(&json!({"error": "unavailable"})),
                            StatusCode::INTERNAL_SERVER_ERROR,
                        ),
                    }
                })
        };

        let notification_route = {
            let counter = Arc::clone(&notification_requests);
            let body = Arc::clone(&notifications);
            warp::path("notifications")
                .and(warp::path::end())
                .and(warp::get())
                .map(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    match body.lock().unwrap().clone() {
                        Some(value) => {
                            warp::reply::with_status(warp::reply::json(&value), StatusCode::OK)
                        }
                        None => warp::reply::with_status(
                            warp::reply::json(&json!({"error": "unavailable"})),
                            StatusCode::INTERNAL_SERVER_ERROR,
                        ),
                    }
                })
        };

        let registration_route = {
            let log = Arc::clone(&registrations);
            warp::path("connections")
                .and(warp::path::end())
                .and(warp::post())
                .and(warp::body::json())
                .map(move |body: serde_json::Value| {
                    log.lock().unwrap().push(body);
                    warp::reply::json(&json!({"success": true}))
                })
        };

        let routes = pm_route.or(notification_route).or(registration_route);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (addr, server) =
            warp::serve(routes).bind_with_graceful_shutdown(([127, 0, 0, 1], 0), async {
                shutdown_rx.await.ok();
            });
        tokio::spawn(server);

        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            pm_requests,
            notification_requests,
            registrations,
            private_messages,
            notifications,
        }
    }

    /// Base URL for this API.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_private_messages(&self, body: serde_json::Value) {
        *self.private_messages.lock().unwrap() = Some(body);
    }

    pub fn fail_private_messages(&self) {
        *self.private_messages.lock().unwrap() = None;
    }

    pub fn set_notifications(&self, body: serde_json::Value) {
        *self.notifications.lock().unwrap() = Some(body);
    }

    pub fn fail_notifications(&self) {
        *self.notifications.lock().unwrap() = None;
    }

    pub fn pm_request_count(&self) -> usize {
        self.pm_requests.load(Ordering::SeqCst)
    }

    pub fn notification_request_count(&self) -> usize {
        self.notification_requests.load(Ordering::SeqCst)
    }

    /// Bodies of the connection registrations received so far.
    pub fn registrations(&self) -> Vec<serde_json::Value> {
        self.registrations.lock().unwrap().clone()
    }

    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Build a private-message record in the API's wire shape.
pub fn pm_record(from: &str, to: &str, notify: &str) -> serde_json::Value {
    json!({
        "fromPersonId": from,
        "toPersonId": to,
        "notifyPersonId": notify,
        "conversationId": format!("{}-{}", from, to),
    })
}
