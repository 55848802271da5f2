//! Live subscribers per account.

use std::{
    collections::HashMap,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use api_types::transaction::Transaction;
use engine::{FlowChange, TransactionRecord};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::records::to_transaction;

/// Default per-subscriber queue length.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 32;

struct Slot {
    id: u64,
    sender: mpsc::Sender<Transaction>,
    dropped: Arc<AtomicU64>,
}

/// Map of account id -> live subscribers.
///
/// Dispatch never blocks: a subscriber whose queue is full misses the event
/// and its dropped counter is bumped.
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<String, Vec<Slot>>>,
    capacity: usize,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a subscriber for `account_id`. Dropping the returned
    /// [`Subscription`] unregisters it.
    pub fn subscribe(self: &Arc<Self>, account_id: &str) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.capacity);
        let dropped = Arc::new(AtomicU64::new(0));

        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(account_id.to_string())
            .or_default()
            .push(Slot {
                id,
                sender,
                dropped: Arc::clone(&dropped),
            });
        tracing::debug!(account_id, subscriber_id = id, "subscriber registered");

        Subscription {
            id,
            account_id: account_id.to_string(),
            receiver,
            dropped,
            registry: Arc::clone(self),
        }
    }

    /// Removes a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, account_id: &str, id: u64) {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(slots) = subscribers.get_mut(account_id) {
            slots.retain(|slot| slot.id != id);
            if slots.is_empty() {
                subscribers.remove(account_id);
            }
            tracing::debug!(account_id, subscriber_id = id, "subscriber removed");
        }
    }

    /// Number of live subscribers for an account.
    pub fn subscriber_count(&self, account_id: &str) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(account_id)
            .map_or(0, Vec::len)
    }

    /// Delivers a flow change to every subscriber of its account and returns
    /// how many received it.
    pub fn dispatch(&self, change: &FlowChange) -> usize {
        let record = match TransactionRecord::try_from(change) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(flow_id = %change.id, "skipping flow change: {err}");
                return 0;
            }
        };
        let transaction = to_transaction(record);

        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(slots) = subscribers.get(&change.account_id) else {
            return 0;
        };

        let mut delivered = 0;
        for slot in slots {
            match slot.sender.try_send(transaction.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    let dropped = slot.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::warn!(
                        account_id = %change.account_id,
                        subscriber_id = slot.id,
                        dropped,
                        "subscriber queue full; event dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

/// Receiving end of one subscriber.
pub struct Subscription {
    id: u64,
    account_id: String,
    receiver: mpsc::Receiver<Transaction>,
    dropped: Arc<AtomicU64>,
    registry: Arc<SubscriberRegistry>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Events this subscriber missed because its queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub async fn recv(&mut self) -> Option<Transaction> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.unsubscribe(&self.account_id, self.id);
    }
}
