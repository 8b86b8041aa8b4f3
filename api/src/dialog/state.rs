//! Per-principal conversation state with a hard capacity bound and age
//! expiry. Eviction is FIFO by first insertion: updating a step does not
//! move an entry back in line.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use jiff::Timestamp;

use super::DialogStep;
use crate::store::UserId;

/// Entries older than this are removable by the scheduler's GC task.
pub const STATE_TTL: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Debug, Clone)]
pub struct StateEntry {
    pub step: DialogStep,
    pub updated_at: Timestamp,
}

pub struct StateStore {
    capacity: usize,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<UserId, StateEntry>,
    /// first-insertion order; eviction pops the front
    order: VecDeque<UserId>,
}

impl StateStore {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), inner: Mutex::default() }
    }

    pub fn get(&self, user_id: UserId) -> Option<StateEntry> {
        self.inner.lock().unwrap().entries.get(&user_id).cloned()
    }

    /// Insert or update a principal's step. At capacity, the oldest
    /// first-inserted entry is evicted to make room.
    pub fn set(&self, user_id: UserId, step: DialogStep, now: Timestamp) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.entries.contains_key(&user_id) {
            if inner.entries.len() >= self.capacity {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.entries.remove(&oldest);
                    tracing::warn!(
                        user_id = %oldest,
                        "conversation state evicted (capacity reached)"
                    );
                }
            }
            inner.order.push_back(user_id);
        }
        inner.entries.insert(user_id, StateEntry { step, updated_at: now });
    }

    pub fn clear(&self, user_id: UserId) {
        let mut inner = self.inner.lock().unwrap();
        if inner.entries.remove(&user_id).is_some() {
            inner.order.retain(|u| *u != user_id);
        }
    }

    /// Drop entries whose last write is older than `ttl`. Returns how many
    /// were removed.
    pub fn sweep_expired(&self, ttl: Duration, now: Timestamp) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let expired: Vec<UserId> = inner
            .entries
            .iter()
            .filter(|(_, entry)| {
                now.duration_since(entry.updated_at).as_secs()
                    > ttl.as_secs() as i64
            })
            .map(|(user_id, _)| *user_id)
            .collect();
        for user_id in &expired {
            inner.entries.remove(user_id);
            inner.order.retain(|u| u != user_id);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
