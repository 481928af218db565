//! LRU-bounded deduplication set of (device, timestamp) pairs
//!
//! Capacity bounds memory, not correctness: once a pair is evicted it is
//! forgotten, and the same reading arriving again will be counted again.
//! Callers that need exactly-once counting over longer horizons must size
//! `TIMESTAMP_STORE_CAPACITY` for their replay window.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use readings_telemetry::Counter;
use std::collections::HashMap;
use tracing::trace;
use uuid::Uuid;

use super::TimestampStore;

/// Composite dedup key with the timestamp in canonical epoch form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub device_id: Uuid,
    pub epoch_secs: i64,
    pub subsec_nanos: u32,
}

impl DedupKey {
    pub fn new(device_id: Uuid, timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id,
            epoch_secs: timestamp.timestamp(),
            subsec_nanos: timestamp.timestamp_subsec_nanos(),
        }
    }
}

#[derive(Debug)]
struct Node {
    key: DedupKey,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Slab of nodes threaded into a recency list, plus a hash index into the slab.
/// `head` is the least recently touched entry, `tail` the most recent.
#[derive(Debug, Default)]
struct RecencyList {
    index: HashMap<DedupKey, usize>,
    nodes: Vec<Node>,
    head: Option<usize>,
    tail: Option<usize>,
}

enum Touch {
    Hit,
    Inserted { evicted: Option<DedupKey> },
}

impl RecencyList {
    fn with_capacity(capacity: usize) -> Self {
        // the slab grows lazily so large capacities cost nothing until used
        let initial = capacity.min(1024);
        Self {
            index: HashMap::with_capacity(initial),
            nodes: Vec::with_capacity(initial),
            head: None,
            tail: None,
        }
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn touch(&mut self, key: DedupKey, capacity: usize) -> Touch {
        if let Some(&slot) = self.index.get(&key) {
            self.move_to_tail(slot);
            return Touch::Hit;
        }

        let mut evicted = None;
        let slot = match self.head {
            Some(victim) if self.nodes.len() >= capacity => {
                self.unlink(victim);
                let old = std::mem::replace(&mut self.nodes[victim].key, key);
                self.index.remove(&old);
                evicted = Some(old);
                victim
            }
            _ => {
                self.nodes.push(Node {
                    key,
                    prev: None,
                    next: None,
                });
                self.nodes.len() - 1
            }
        };

        self.push_tail(slot);
        self.index.insert(key, slot);
        Touch::Inserted { evicted }
    }

    fn contains(&self, key: &DedupKey) -> bool {
        self.index.contains_key(key)
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.nodes[slot].prev, self.nodes[slot].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[slot].prev = None;
        self.nodes[slot].next = None;
    }

    fn push_tail(&mut self, slot: usize) {
        self.nodes[slot].prev = self.tail;
        self.nodes[slot].next = None;
        match self.tail {
            Some(t) => self.nodes[t].next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
    }

    fn move_to_tail(&mut self, slot: usize) {
        if self.tail == Some(slot) {
            return;
        }
        self.unlink(slot);
        self.push_tail(slot);
    }

    #[cfg(test)]
    fn keys_oldest_first(&self) -> Vec<DedupKey> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            keys.push(self.nodes[slot].key);
            cursor = self.nodes[slot].next;
        }
        keys
    }
}

/// In-memory timestamp store with least-recently-touched eviction.
///
/// Inserts and duplicate hits both count as a touch. When a new pair would
/// exceed capacity, exactly one oldest pair is evicted in the same critical
/// section, so the store never holds more than `capacity` entries.
pub struct InMemoryTimestampStore {
    entries: Mutex<RecencyList>,
    capacity: usize,
    evictions: Counter,
}

impl InMemoryTimestampStore {
    /// A capacity of zero is treated as one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(RecencyList::with_capacity(capacity)),
            capacity,
            evictions: Counter::new("timestamp_store_evictions"),
        }
    }

    /// Membership test that does not count as a touch
    pub fn contains(&self, device_id: Uuid, timestamp: DateTime<Utc>) -> bool {
        self.entries.lock().contains(&DedupKey::new(device_id, timestamp))
    }
}

impl TimestampStore for InMemoryTimestampStore {
    fn check_and_add(&self, device_id: Uuid, timestamp: DateTime<Utc>) -> bool {
        let key = DedupKey::new(device_id, timestamp);
        let outcome = self.entries.lock().touch(key, self.capacity);

        match outcome {
            Touch::Hit => false,
            Touch::Inserted { evicted } => {
                if let Some(old) = evicted {
                    self.evictions.inc();
                    trace!(
                        device_id = %old.device_id,
                        epoch_secs = old.epoch_secs,
                        "Evicted oldest dedup entry"
                    );
                }
                true
            }
        }
    }

    fn clear(&self) {
        *self.entries.lock() = RecencyList::with_capacity(self.capacity);
        self.evictions.reset();
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn evictions(&self) -> u64 {
        self.evictions.get()
    }
}

impl std::fmt::Debug for InMemoryTimestampStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTimestampStore")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("evictions", &self.evictions.get())
            .finish()
    }
}
