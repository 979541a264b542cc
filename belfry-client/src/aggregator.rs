//! Unread-count aggregation
//!
//! `NotificationAggregator` turns the raw action stream into the two
//! numbers the application shell actually renders: unread notifications
//! and unread private-message conversations. It subscribes to the relevant
//! actions on the connection, coalesces bursts of events into a single
//! recount (300 ms trailing-edge debounce), recomputes the counts from the
//! messaging API, and publishes to its subscribers only when the tuple
//! actually changed.
//!
//! A `reconnect` action bypasses the debounce: the connection may have
//! missed events while offline, so the recount runs immediately.
//!
//! The aggregator is an ordinary service object constructed once at
//! application start and handed around by cheap clones; the
//! one-live-connection invariant lives in the [`SocketClient`] it wraps,
//! not in hidden global state.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock as StdRwLock};
use std::time::Duration;

use tokio::task::JoinHandle;

use belfry_core::{actions, MessageEvent, NotificationCounts, PrivateMessage, Result, UserContext};

use crate::api::ApiClient;
use crate::connection::SocketClient;
use crate::metrics::ClientMetrics;

/// Coalescing window for event-triggered recounts.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

/// Handler ids this aggregator registers on the connection. Namespaced so
/// they can never collide with ids picked by application code.
const HANDLER_PRIVATE_MESSAGE: &str = "unread-counts:privateMessage";
const HANDLER_NOTIFICATION: &str = "unread-counts:notification";
const HANDLER_MESSAGE: &str = "unread-counts:message";
const HANDLER_RECONNECT: &str = "unread-counts:reconnect";

/// Subscriber callback invoked with each published counts value.
pub type CountsListener = Arc<dyn Fn(NotificationCounts) + Send + Sync>;

/// Number of distinct conversations with unread messages for `person_id`.
///
/// A conversation is keyed by the other party's person id, and a record
/// participates only when its `notifyPersonId` names the current person.
/// Three unread messages from the same person therefore count as one.
pub fn unread_conversation_count(messages: &[PrivateMessage], person_id: &str) -> u64 {
    messages
        .iter()
        .filter(|pm| pm.notifies(person_id))
        .map(|pm| pm.other_party(person_id))
        .collect::<HashSet<_>>()
        .len() as u64
}

struct SubscriberEntry {
    id: u64,
    listener: CountsListener,
}

struct AggregatorShared {
    connection: SocketClient,
    api: ApiClient,
    counts: StdRwLock<NotificationCounts>,
    subscribers: StdMutex<Vec<SubscriberEntry>>,
    next_subscriber_id: AtomicU64,
    person_id: StdRwLock<Option<String>>,
    initialized: AtomicBool,
    debounce_timer: StdMutex<Option<JoinHandle<()>>>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl AggregatorShared {
    /// Arm (or re-arm) the debounce timer. Each call replaces any pending
    /// timer, so only the trailing edge of a burst runs a recount.
    fn schedule_debounced(shared: &Arc<Self>) {
        let task_shared = Arc::clone(shared);
        let mut timer = shared.debounce_timer.lock().unwrap();
        if let Some(pending) = timer.take() {
            pending.abort();
        }
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(DEBOUNCE_WINDOW).await;
            task_shared.debounce_timer.lock().unwrap().take();
            task_shared.load_counts().await;
        }));
    }

    /// Run a recount right away, superseding any pending debounce timer.
    fn schedule_immediate(shared: &Arc<Self>) {
        if let Some(pending) = shared.debounce_timer.lock().unwrap().take() {
            pending.abort();
        }
        let task_shared = Arc::clone(shared);
        tokio::spawn(async move {
            task_shared.load_counts().await;
        });
    }

    /// Recompute the counts from the messaging API and publish on change.
    ///
    /// A private-message fetch failure keeps the previous counts in place;
    /// a notifications fetch failure degrades that count to zero. Neither
    /// surfaces an error, the next trigger or a manual refresh retries
    /// naturally.
    async fn load_counts(&self) {
        let person = match self.person_id.read().unwrap().clone() {
            Some(person) => person,
            None => return,
        };

        if let Some(m) = &self.metrics {
            m.record_recount();
        }

        let messages = match self.api.fetch_private_messages().await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch private messages, keeping previous counts");
                return;
            }
        };
        let pm_count = unread_conversation_count(&messages, &person);

        let notification_count = match self.api.fetch_notifications().await {
            Ok(records) => records.len() as u64,
            Err(e) => {
                tracing::debug!(error = %e, "Notifications endpoint unavailable, treating as empty");
                0
            }
        };

        let next = NotificationCounts::new(notification_count, pm_count);
        let changed = {
            let mut counts = self.counts.write().unwrap();
            if *counts == next {
                false
            } else {
                *counts = next;
                true
            }
        };

        if changed {
            tracing::debug!(
                notification_count = next.notification_count,
                pm_count = next.pm_count,
                "Unread counts changed"
            );
            self.publish(next);
        }
    }

    fn publish(&self, counts: NotificationCounts) {
        if let Some(m) = &self.metrics {
            m.record_publish();
        }
        let snapshot: Vec<(u64, CountsListener)> = self
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .map(|s| (s.id, Arc::clone(&s.listener)))
            .collect();
        for (id, listener) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(counts))).is_err() {
                tracing::error!(subscriber_id = id, "Subscriber panicked during publish");
            }
        }
    }
}

/// Aggregated unread-count service
///
/// Cheaply cloneable; all clones share the same state.
#[derive(Clone)]
pub struct NotificationAggregator {
    inner: Arc<AggregatorShared>,
}

impl NotificationAggregator {
    /// Create an aggregator over a connection and API client. Nothing
    /// happens until [`initialize`](Self::initialize).
    pub fn new(connection: SocketClient, api: ApiClient) -> Self {
        Self::with_metrics(connection, api, None)
    }

    /// Create an aggregator that records recount and publish metrics.
    pub fn with_metrics(
        connection: SocketClient,
        api: ApiClient,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        Self {
            inner: Arc::new(AggregatorShared {
                connection,
                api,
                counts: StdRwLock::new(NotificationCounts::default()),
                subscribers: StdMutex::new(Vec::new()),
                next_subscriber_id: AtomicU64::new(0),
                person_id: StdRwLock::new(None),
                initialized: AtomicBool::new(false),
                debounce_timer: StdMutex::new(None),
                metrics,
            }),
        }
    }

    /// Bring the aggregator up for a signed-in person.
    ///
    /// Opens the connection (errors propagate to the caller), binds the
    /// identity, registers the event handlers, and runs the initial
    /// recount. A second call while initialized is a no-op.
    pub async fn initialize(&self, context: UserContext) -> Result<()> {
        let shared = &self.inner;
        if shared.initialized.load(Ordering::SeqCst) {
            tracing::debug!("Aggregator already initialized");
            return Ok(());
        }

        *shared.person_id.write().unwrap() = Some(context.person.id.clone());

        shared.connection.init().await?;
        shared.connection.set_person_church(context.identity());

        self.register_handlers();
        shared.load_counts().await;
        shared.initialized.store(true, Ordering::SeqCst);

        tracing::info!(person_id = %context.person.id, "Notification aggregator ready");
        Ok(())
    }

    /// Subscribe to published counts.
    ///
    /// The listener is invoked immediately with the current counts, then on
    /// every change. The returned closure unsubscribes.
    pub fn subscribe<F>(&self, listener: F) -> impl FnOnce() + Send + 'static
    where
        F: Fn(NotificationCounts) + Send + Sync + 'static,
    {
        let shared = &self.inner;
        let id = shared.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        let listener: CountsListener = Arc::new(listener);

        let current = *shared.counts.read().unwrap();
        shared.subscribers.lock().unwrap().push(SubscriberEntry {
            id,
            listener: Arc::clone(&listener),
        });

        // New subscribers see the current state right away, no separate
        // "get current" round trip needed.
        if catch_unwind(AssertUnwindSafe(|| listener(current))).is_err() {
            tracing::error!(subscriber_id = id, "Subscriber panicked during initial replay");
        }

        let unsub_shared = Arc::clone(&self.inner);
        move || {
            unsub_shared
                .subscribers
                .lock()
                .unwrap()
                .retain(|s| s.id != id);
        }
    }

    /// Current counts (a copy).
    pub fn get_counts(&self) -> NotificationCounts {
        *self.inner.counts.read().unwrap()
    }

    /// Force an immediate recount, bypassing the debounce window.
    pub async fn refresh(&self) {
        if let Some(pending) = self.inner.debounce_timer.lock().unwrap().take() {
            pending.abort();
        }
        self.inner.load_counts().await;
    }

    /// True once initialized and while the underlying connection is open.
    pub fn is_ready(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst) && self.inner.connection.is_connected()
    }

    /// The connection this aggregator listens on.
    pub fn connection(&self) -> &SocketClient {
        &self.inner.connection
    }

    /// Tear the aggregator down.
    ///
    /// Cancels any pending recount, removes this aggregator's handler
    /// registrations (other handlers on the connection are untouched),
    /// drops all subscribers, zeroes the counts and forgets the person.
    /// Idempotent, and safe to call even if `initialize` never ran.
    pub fn cleanup(&self) {
        let shared = &self.inner;
        if let Some(pending) = shared.debounce_timer.lock().unwrap().take() {
            pending.abort();
        }
        for id in [
            HANDLER_PRIVATE_MESSAGE,
            HANDLER_NOTIFICATION,
            HANDLER_MESSAGE,
            HANDLER_RECONNECT,
        ] {
            shared.connection.remove_handler(id);
        }
        shared.subscribers.lock().unwrap().clear();
        *shared.counts.write().unwrap() = NotificationCounts::default();
        *shared.person_id.write().unwrap() = None;
        shared.initialized.store(false, Ordering::SeqCst);
        tracing::debug!("Aggregator cleaned up");
    }

    fn register_handlers(&self) {
        let connection = &self.inner.connection;

        let debounced = Arc::clone(&self.inner);
        connection.add_handler(actions::PRIVATE_MESSAGE, HANDLER_PRIVATE_MESSAGE, move |_| {
            AggregatorShared::schedule_debounced(&debounced);
        });

        let debounced = Arc::clone(&self.inner);
        connection.add_handler(actions::NOTIFICATION, HANDLER_NOTIFICATION, move |_| {
            AggregatorShared::schedule_debounced(&debounced);
        });

        // Message updates fire for everyone in a conversation; only the ones
        // naming the current person matter here.
        let filtered = Arc::clone(&self.inner);
        connection.add_handler(actions::MESSAGE, HANDLER_MESSAGE, move |data| {
            let person = match filtered.person_id.read().unwrap().clone() {
                Some(person) => person,
                None => return,
            };
            let event: MessageEvent = serde_json::from_value(data).unwrap_or_default();
            if event.concerns(&person) {
                AggregatorShared::schedule_debounced(&filtered);
            }
        });

        // Events may have been missed while offline; do not wait out the
        // debounce window after a reconnect.
        let immediate = Arc::clone(&self.inner);
        connection.add_handler(actions::RECONNECT, HANDLER_RECONNECT, move |_| {
            AggregatorShared::schedule_immediate(&immediate);
        });
    }
}
