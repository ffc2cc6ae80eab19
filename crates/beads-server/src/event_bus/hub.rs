use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use beads_protocol::TopicFilter;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::ring::EventRing;

/// Sizing of the live event hub
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HubConfig {
    /// Events retained for `Last-Event-ID` replay (default: 1000)
    #[serde(default = "default_ring_capacity")]
    pub ring_capacity: usize,
    /// Per-subscriber delivery queue depth (default: 64)
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,
}

fn default_ring_capacity() -> usize {
    1000
}

fn default_subscriber_capacity() -> usize {
    64
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            ring_capacity: default_ring_capacity(),
            subscriber_capacity: default_subscriber_capacity(),
        }
    }
}

/// Event as broadcast to live subscribers and kept in the replay ring.
///
/// `sequence` is process-local and unrelated to ledger row ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubEvent {
    pub sequence: u64,
    pub topic: Arc<str>,
    /// Already serialized payload, never inspected by the hub
    pub data: Arc<str>,
}

impl HubEvent {
    pub fn new(sequence: u64, topic: impl Into<Arc<str>>, data: impl Into<Arc<str>>) -> Self {
        Self {
            sequence,
            topic: topic.into(),
            data: data.into(),
        }
    }
}

/// Opaque handle identifying one registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct SubscriberEntry {
    filter: TopicFilter,
    sender: mpsc::Sender<HubEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriberInfo {
    pub id: SubscriberId,
    pub topics: TopicFilter,
}

#[derive(Debug, Clone, Serialize)]
pub struct HubStats {
    pub last_sequence: u64,
    pub retained: usize,
    pub ring_capacity: usize,
    pub subscriber_count: usize,
    pub subscribers: Vec<SubscriberInfo>,
}

/// In-process publish/subscribe hub with bounded replay history.
///
/// `broadcast` never blocks: each subscriber owns a bounded queue and events
/// that do not fit are dropped for that subscriber only.
pub struct Hub {
    config: HubConfig,
    sequence: AtomicU64,
    next_subscriber: AtomicU64,
    history: RwLock<EventRing>,
    subscribers: RwLock<HashMap<SubscriberId, SubscriberEntry>>,
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            history: RwLock::new(EventRing::new(config.ring_capacity)),
            subscribers: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            next_subscriber: AtomicU64::new(1),
            config,
        }
    }

    /// Register a subscriber for the topics accepted by `filter`.
    ///
    /// The returned handle unsubscribes itself when dropped.
    pub fn subscribe(self: &Arc<Self>, filter: TopicFilter) -> Subscription {
        let id = SubscriberId(self.next_subscriber.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.config.subscriber_capacity.max(1));

        write(&self.subscribers).insert(
            id,
            SubscriberEntry {
                filter: filter.clone(),
                sender,
            },
        );

        debug!(subscriber_id = %id, topics = ?filter.patterns(), "subscriber registered");

        Subscription {
            id,
            filter,
            receiver,
            hub: Arc::clone(self),
        }
    }

    /// Remove a subscriber. Unknown or already removed ids are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if write(&self.subscribers).remove(&id).is_some() {
            debug!(subscriber_id = %id, "subscriber removed");
        }
    }

    /// Assign the next sequence number, record the event for replay and
    /// offer it to every matching subscriber. Returns the assigned sequence.
    pub fn broadcast(&self, topic: &str, data: impl Into<Arc<str>>) -> u64 {
        let event = {
            let mut history = write(&self.history);
            // Assigned under the history lock so the ring stays in sequence order.
            let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
            let event = HubEvent::new(sequence, topic, data);
            history.append(event.clone());
            event
        };

        let subscribers = read(&self.subscribers);
        for (id, entry) in subscribers.iter() {
            if !entry.filter.matches(&event.topic) {
                continue;
            }
            match entry.sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    trace!(subscriber_id = %id, sequence = event.sequence, "subscriber queue full, event dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    trace!(subscriber_id = %id, sequence = event.sequence, "subscriber gone, event dropped");
                }
            }
        }

        event.sequence
    }

    /// Retained events newer than `last_id`, oldest first.
    pub fn events_since(&self, last_id: u64) -> Vec<HubEvent> {
        read(&self.history).since(last_id)
    }

    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        read(&self.subscribers).len()
    }

    pub fn retained(&self) -> usize {
        read(&self.history).len()
    }

    pub fn stats(&self) -> HubStats {
        let (retained, ring_capacity) = {
            let history = read(&self.history);
            (history.len(), history.capacity())
        };

        let mut subscribers: Vec<SubscriberInfo> = read(&self.subscribers)
            .iter()
            .map(|(id, entry)| SubscriberInfo {
                id: *id,
                topics: entry.filter.clone(),
            })
            .collect();
        subscribers.sort_by_key(|info| info.id.0);

        HubStats {
            last_sequence: self.last_sequence(),
            retained,
            ring_capacity,
            subscriber_count: subscribers.len(),
            subscribers,
        }
    }
}

// Hub state is consistent between operations, so a poisoned lock is still usable.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// A live registration with the hub.
///
/// Owns the receiving half of the subscriber queue; dropping it deregisters
/// the subscriber.
pub struct Subscription {
    id: SubscriberId,
    filter: TopicFilter,
    receiver: mpsc::Receiver<HubEvent>,
    hub: Arc<Hub>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }

    /// Wait for the next delivered event.
    pub async fn recv(&mut self) -> Option<HubEvent> {
        self.receiver.recv().await
    }

    /// Take the next delivered event if one is already queued.
    pub fn try_recv(&mut self) -> Option<HubEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}
