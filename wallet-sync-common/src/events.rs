//! In-process message transport between synchronization workers and their listeners
//!
//! Schedulers and sync jobs publish `{msg, data}` messages on a
//! [`MessageBus`]. Listeners subscribe either to a single tag (for example
//! `syncBtcWalletStatus`) or to every message. Each subscriber owns an
//! unbounded tokio channel, so publishing never blocks and never awaits.
//!
//! Messages reach every receiver in publish order.
//!
//! ```
//! use wallet_sync_common::events::MessageBus;
//! use serde_json::json;
//!
//! let bus = MessageBus::new();
//! let mut rx = bus.subscribe("syncBtcWalletStatus");
//!
//! bus.publish("syncBtcWalletStatus", json!({ "state": "idle" }));
//!
//! let message = rx.try_recv().unwrap();
//! assert_eq!(message.data["state"], "idle");
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::logging::{log_scheduler, LogLevel};

/// Tag of the status message published by a scheduler named `name`
pub fn status_tag(name: &str) -> String {
    format!("{}Status", name)
}

/// A message crossing the worker boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerMessage {
    /// Bus-local sequence number, strictly increasing
    pub id: u64,
    /// Message tag
    pub msg: String,
    /// Payload
    pub data: serde_json::Value,
    /// RFC 3339 publish time
    pub timestamp: String,
}

impl WorkerMessage {
    pub fn new(id: u64, msg: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id,
            msg: msg.into(),
            data,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Default)]
struct Subscribers {
    by_tag: HashMap<String, Vec<UnboundedSender<WorkerMessage>>>,
    all: Vec<UnboundedSender<WorkerMessage>>,
}

/// Fan-out bus for [`WorkerMessage`]s
///
/// Cloning is cheap and every clone publishes to the same subscribers.
#[derive(Clone, Default)]
pub struct MessageBus {
    subscribers: Arc<Mutex<Subscribers>>,
    next_id: Arc<AtomicU64>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Subscribe to messages carrying exactly `tag`
    pub fn subscribe(&self, tag: &str) -> UnboundedReceiver<WorkerMessage> {
        let (sender, receiver) = unbounded_channel();
        self.lock()
            .by_tag
            .entry(tag.to_string())
            .or_insert_with(Vec::new)
            .push(sender);
        receiver
    }

    /// Subscribe to every message published on the bus
    pub fn subscribe_all(&self) -> UnboundedReceiver<WorkerMessage> {
        let (sender, receiver) = unbounded_channel();
        self.lock().all.push(sender);
        receiver
    }

    /// Publish a message and return the id it was assigned
    ///
    /// Subscribers whose receiver was dropped are removed.
    pub fn publish(&self, msg: &str, data: serde_json::Value) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let message = WorkerMessage::new(id, msg, data);

        let mut subscribers = self.lock();
        if let Some(senders) = subscribers.by_tag.get_mut(msg) {
            senders.retain(|sender| sender.send(message.clone()).is_ok());
        }
        subscribers
            .all
            .retain(|sender| sender.send(message.clone()).is_ok());

        log_scheduler(LogLevel::Trace, &format!("Published {}", msg), None);
        id
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        let subscribers = self.lock();
        subscribers
            .by_tag
            .values()
            .map(|senders| senders.iter().filter(|s| !s.is_closed()).count())
            .sum::<usize>()
            + subscribers.all.iter().filter(|s| !s.is_closed()).count()
    }
}
