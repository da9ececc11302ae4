// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Connection admission scheduler for live polling tiles.
//!
//! Browsers cap persistent connections per origin, so only `max_active`
//! camera tiles may hold a polling connection at once. Everyone else waits
//! in a queue ordered by `(priority desc, requested_at desc)`.
//!
//! ```text
//! tile.request ──► active set (≤ max_active) ──► ReadySignal: Ready
//!        │                 ▲
//!        ▼                 │ release / rotation
//!   pending queue ─────────┘
//! ```
//!
//! The scheduler is a plain state machine: no operation blocks, awaits or
//! fails. Hosts that mutate it from several threads wrap it with
//! [`ConnectionScheduler::into_shared`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info};

use crate::config::SchedulerConfig;

/// Event delivered to a single consumer's [`ReadySignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionEvent {
    /// The consumer holds a slot and may open its connection.
    Ready,
    /// The consumer lost its slot to a higher priority waiter.
    Evicted,
}

/// Per-consumer receiving end of admission events.
#[derive(Debug)]
pub struct ReadySignal {
    consumer_id: String,
    rx: mpsc::UnboundedReceiver<AdmissionEvent>,
}

impl ReadySignal {
    pub fn consumer_id(&self) -> &str {
        &self.consumer_id
    }

    /// Wait for the next event. `None` once the scheduler shut down, the
    /// consumer was released or the subscription was replaced.
    pub async fn recv(&mut self) -> Option<AdmissionEvent> {
        self.rx.recv().await
    }

    /// Non-blocking poll for UI loops that drive the scheduler synchronously.
    pub fn try_recv(&mut self) -> Option<AdmissionEvent> {
        self.rx.try_recv().ok()
    }

    pub fn into_stream(self) -> UnboundedReceiverStream<AdmissionEvent> {
        UnboundedReceiverStream::new(self.rx)
    }
}

struct ActiveSlot<H> {
    handle: H,
    priority: i32,
    admitted_at: Instant,
    /// Admission order, lower is older.
    admission_seq: u64,
}

struct PendingEntry<H> {
    consumer_id: String,
    handle: H,
    priority: i32,
    requested_at: Instant,
    /// Breaks ties between identical instants; higher is more recent.
    seq: u64,
}

/// Snapshot of the scheduler for status endpoints and debugging.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub capacity: usize,
    pub active: Vec<ActiveStatus>,
    pub pending: Vec<PendingStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveStatus {
    pub consumer_id: String,
    pub priority: i32,
    pub active_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingStatus {
    pub consumer_id: String,
    pub priority: i32,
    pub waiting_ms: u64,
}

/// Shared handle for hosts that drive the scheduler from several threads.
pub type SharedScheduler<H> = Arc<Mutex<ConnectionScheduler<H>>>;

/// Bounded pool of polling connections, keyed by consumer id.
///
/// `H` is whatever the host needs to keep alongside an admitted consumer
/// (an element reference, a task handle, ...). The scheduler never looks
/// inside it.
pub struct ConnectionScheduler<H> {
    config: SchedulerConfig,
    active: HashMap<String, ActiveSlot<H>>,
    pending: Vec<PendingEntry<H>>,
    observers: HashMap<String, mpsc::UnboundedSender<AdmissionEvent>>,
    seq: u64,
}

impl<H> ConnectionScheduler<H> {
    pub fn new(config: SchedulerConfig) -> Self {
        info!(
            max_active = config.max_active,
            rotation_floor = config.rotation_floor,
            rotation_threshold = config.rotation_threshold,
            "Connection scheduler created"
        );
        Self {
            config,
            active: HashMap::new(),
            pending: Vec::new(),
            observers: HashMap::new(),
            seq: 0,
        }
    }

    pub fn into_shared(self) -> SharedScheduler<H> {
        Arc::new(Mutex::new(self))
    }

    /// Ask for a polling slot.
    ///
    /// Returns `true` when the consumer is active after the call returns
    /// through the fast path. A queued consumer gets `false` and learns about
    /// a later admission through its [`ReadySignal`].
    pub fn request(&mut self, consumer_id: impl Into<String>, handle: H, priority: i32) -> bool {
        let consumer_id = consumer_id.into();
        debug!(
            consumer = consumer_id,
            active = self.active.len(),
            max = self.config.max_active,
            "Connection requested"
        );

        if self.active.contains_key(&consumer_id) {
            debug!(consumer = consumer_id, "Already active");
            return true;
        }

        if self.has_capacity() {
            self.remove_pending(&consumer_id);
            self.admit(consumer_id, handle, priority);
            return true;
        }

        self.enqueue(consumer_id, handle, priority);
        self.try_rotate();
        false
    }

    /// Give a slot back, or withdraw a pending request.
    ///
    /// Ends the consumer's subscription as well; observers whose signal was
    /// dropped are pruned on the way.
    pub fn release(&mut self, consumer_id: &str) {
        if self.active.contains_key(consumer_id) {
            info!(consumer = consumer_id, "Connection released");
            self.deactivate(consumer_id);
        } else if self.remove_pending(consumer_id) {
            debug!(consumer = consumer_id, "Pending request withdrawn");
        }
        self.observers.remove(consumer_id);
        self.observers.retain(|_, tx| !tx.is_closed());
    }

    /// Re-rank a waiting consumer. Active consumers are left untouched.
    pub fn update_priority(&mut self, consumer_id: &str, new_priority: i32) {
        if self.active.contains_key(consumer_id) {
            return;
        }
        let Some(pos) = self.pending.iter().position(|p| p.consumer_id == consumer_id) else {
            return;
        };

        let seq = self.next_seq();
        let entry = &mut self.pending[pos];
        entry.priority = new_priority;
        entry.requested_at = Instant::now();
        entry.seq = seq;
        self.sort_queue();
        debug!(consumer = consumer_id, priority = new_priority, "Pending priority updated");

        if new_priority > self.config.rotation_threshold {
            self.try_rotate();
        }
    }

    /// Move a waiting consumer between the visible and hidden priority tiers.
    ///
    /// Only the tier changes: the request keeps its place in time and no
    /// rotation is attempted.
    pub fn update_visibility(&mut self, consumer_id: &str, is_visible: bool) {
        let tier = if is_visible {
            self.config.visible_priority
        } else {
            self.config.hidden_priority
        };
        let Some(entry) = self.pending.iter_mut().find(|p| p.consumer_id == consumer_id) else {
            return;
        };
        entry.priority = tier;
        self.sort_queue();
        debug!(consumer = consumer_id, visible = is_visible, priority = tier, "Visibility changed");
    }

    /// Register the observer for `consumer_id`, replacing any earlier one.
    ///
    /// A consumer that is already active receives `Ready` straight away.
    pub fn subscribe(&mut self, consumer_id: impl Into<String>) -> ReadySignal {
        let consumer_id = consumer_id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        if self.active.contains_key(&consumer_id) {
            let _ = tx.send(AdmissionEvent::Ready);
        }
        self.observers.insert(consumer_id.clone(), tx);
        ReadySignal { consumer_id, rx }
    }

    pub fn unsubscribe(&mut self, consumer_id: &str) {
        self.observers.remove(consumer_id);
    }

    /// Drop every slot, queue entry and observer. Observers see their
    /// channel close.
    pub fn shutdown(&mut self) {
        info!(
            active = self.active.len(),
            pending = self.pending.len(),
            "Connection scheduler shutting down"
        );
        self.active.clear();
        self.pending.clear();
        self.observers.clear();
    }

    pub fn capacity(&self) -> usize {
        self.config.max_active
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_active(&self, consumer_id: &str) -> bool {
        self.active.contains_key(consumer_id)
    }

    pub fn is_pending(&self, consumer_id: &str) -> bool {
        self.pending.iter().any(|p| p.consumer_id == consumer_id)
    }

    /// Handle stored for an active consumer.
    pub fn handle(&self, consumer_id: &str) -> Option<&H> {
        self.active.get(consumer_id).map(|slot| &slot.handle)
    }

    pub fn active_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.active.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Pending consumers with their priority, in queue order.
    pub fn pending_queue(&self) -> Vec<(&str, i32)> {
        self.pending
            .iter()
            .map(|p| (p.consumer_id.as_str(), p.priority))
            .collect()
    }

    pub fn status(&self) -> SchedulerStatus {
        let now = Instant::now();
        let mut active: Vec<ActiveStatus> = self
            .active
            .iter()
            .map(|(id, slot)| ActiveStatus {
                consumer_id: id.clone(),
                priority: slot.priority,
                active_ms: now.duration_since(slot.admitted_at).as_millis() as u64,
            })
            .collect();
        active.sort_by(|a, b| a.consumer_id.cmp(&b.consumer_id));

        let pending = self
            .pending
            .iter()
            .map(|p| PendingStatus {
                consumer_id: p.consumer_id.clone(),
                priority: p.priority,
                waiting_ms: now.duration_since(p.requested_at).as_millis() as u64,
            })
            .collect();

        SchedulerStatus {
            capacity: self.config.max_active,
            active,
            pending,
        }
    }

    fn has_capacity(&self) -> bool {
        self.active.len() < self.config.max_active
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn admit(&mut self, consumer_id: String, handle: H, priority: i32) {
        info!(consumer = consumer_id, priority, "Connection admitted");
        let admission_seq = self.next_seq();
        self.notify(&consumer_id, AdmissionEvent::Ready);
        self.active.insert(
            consumer_id,
            ActiveSlot {
                handle,
                priority,
                admitted_at: Instant::now(),
                admission_seq,
            },
        );
    }

    fn enqueue(&mut self, consumer_id: String, handle: H, priority: i32) {
        self.remove_pending(&consumer_id);
        let seq = self.next_seq();
        self.pending.push(PendingEntry {
            consumer_id,
            handle,
            priority,
            requested_at: Instant::now(),
            seq,
        });
        self.sort_queue();
    }

    fn remove_pending(&mut self, consumer_id: &str) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.consumer_id != consumer_id);
        self.pending.len() != before
    }

    fn sort_queue(&mut self) {
        self.pending.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.requested_at.cmp(&a.requested_at))
                .then_with(|| b.seq.cmp(&a.seq))
        });
    }

    /// Preempt one active consumer when the queue head is urgent enough.
    fn try_rotate(&mut self) {
        let Some(head) = self.pending.first() else {
            return;
        };
        if self.has_capacity() {
            self.process_queue();
            return;
        }
        if head.priority <= self.config.rotation_floor {
            return;
        }
        let Some(victim) = self.pick_victim() else {
            return;
        };

        info!(
            evicted = victim,
            admitted = head.consumer_id,
            priority = head.priority,
            "Rotating connection"
        );
        self.notify(&victim, AdmissionEvent::Evicted);
        self.deactivate(&victim);
    }

    /// Free an active slot and hand it to the queue head. The observer stays.
    fn deactivate(&mut self, consumer_id: &str) {
        if self.active.remove(consumer_id).is_some() {
            self.process_queue();
        }
    }

    /// Lowest admitted priority first, then the least recently admitted.
    fn pick_victim(&self) -> Option<String> {
        self.active
            .iter()
            .min_by_key(|(_, slot)| (slot.priority, slot.admission_seq))
            .map(|(id, _)| id.clone())
    }

    fn process_queue(&mut self) {
        if self.pending.is_empty() || !self.has_capacity() {
            return;
        }
        let next = self.pending.remove(0);
        self.admit(next.consumer_id, next.handle, next.priority);
    }

    fn notify(&mut self, consumer_id: &str, event: AdmissionEvent) {
        if let Some(tx) = self.observers.get(consumer_id) {
            if tx.send(event).is_err() {
                self.observers.remove(consumer_id);
            }
        }
    }
}

impl<H> Drop for ConnectionScheduler<H> {
    fn drop(&mut self) {
        if !self.active.is_empty() || !self.pending.is_empty() {
            self.shutdown();
        }
    }
}
