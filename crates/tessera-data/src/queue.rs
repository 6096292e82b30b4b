// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The render request queue.
//!
//! Pending requests live in two FIFO lanes. Every batch draw drains the
//! priority lane before it takes anything from the background lane, and moves
//! what it draws into the in-flight set. An instance is in at most one of
//! {priority, background, in-flight} at any time.
//!
//! Enqueueing an instance that is in flight does not put it in a lane; it is
//! deferred until the in-flight render completes and then re-enters its lane
//! at the front, so the very next batch picks it up. This keeps a single
//! instance from ever being rendered twice concurrently.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;

/// Which pending lane a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Interactive edits and explicit recovery/replace operations.
    Priority,
    /// Bulk and initial-load work.
    Background,
}

/// What [`RenderRequestQueue::enqueue`] did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Appended to the requested lane.
    Queued,
    /// Already pending in some lane; the existing position was kept.
    AlreadyQueued,
    /// The instance is in flight; the request waits for it to complete.
    Deferred,
    /// The instance is in flight and already had a deferred request.
    AlreadyDeferred,
}

/// Lanes of pending render requests plus the in-flight set.
#[derive(Debug)]
pub struct RenderRequestQueue<K> {
    priority: VecDeque<K>,
    background: VecDeque<K>,
    pending: HashMap<K, Lane>,
    in_flight: HashSet<K>,
    deferred: VecDeque<(K, Lane)>,
}

impl<K> Default for RenderRequestQueue<K> {
    fn default() -> Self {
        Self {
            priority: VecDeque::new(),
            background: VecDeque::new(),
            pending: HashMap::new(),
            in_flight: HashSet::new(),
            deferred: VecDeque::new(),
        }
    }
}

impl<K: Copy + Eq + Hash + Debug> RenderRequestQueue<K> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a render of `key` in `lane`.
    ///
    /// Idempotent: a key already pending anywhere keeps its current lane and
    /// FIFO position.
    pub fn enqueue(&mut self, key: K, lane: Lane) -> EnqueueOutcome {
        if self.in_flight.contains(&key) {
            if self.is_deferred(key) {
                return EnqueueOutcome::AlreadyDeferred;
            }
            self.deferred.push_back((key, lane));
            log::trace!("Deferred {:?} until its in-flight render completes", key);
            return EnqueueOutcome::Deferred;
        }
        if self.pending.contains_key(&key) {
            return EnqueueOutcome::AlreadyQueued;
        }
        self.pending.insert(key, lane);
        self.lane_mut(lane).push_back(key);
        EnqueueOutcome::Queued
    }

    /// Draws up to `max_size` keys, priority lane first, and marks them in flight.
    pub fn draw_batch(&mut self, max_size: usize) -> Vec<K> {
        let mut batch = Vec::with_capacity(max_size.min(self.pending_len()));
        while batch.len() < max_size {
            let Some(key) = self
                .priority
                .pop_front()
                .or_else(|| self.background.pop_front())
            else {
                break;
            };
            self.pending.remove(&key);
            self.in_flight.insert(key);
            batch.push(key);
        }
        batch
    }

    /// Removes keys from the in-flight set and releases their deferred
    /// requests back into the lanes.
    pub fn complete_batch(&mut self, keys: &[K]) {
        for key in keys {
            self.in_flight.remove(key);
        }

        let mut released = Vec::new();
        self.deferred.retain(|&(key, lane)| {
            if keys.contains(&key) {
                released.push((key, lane));
                false
            } else {
                true
            }
        });

        // Reverse so that the earliest deferral ends up first in its lane.
        for (key, lane) in released.into_iter().rev() {
            self.pending.insert(key, lane);
            self.lane_mut(lane).push_front(key);
        }
    }

    /// Drops a pending or deferred request. In-flight keys are left alone;
    /// they leave the queue through [`complete_batch`](Self::complete_batch).
    pub fn remove(&mut self, key: K) -> bool {
        let mut removed = false;
        if let Some(lane) = self.pending.remove(&key) {
            self.lane_mut(lane).retain(|queued| *queued != key);
            removed = true;
        }
        let before = self.deferred.len();
        self.deferred.retain(|(deferred, _)| *deferred != key);
        removed || self.deferred.len() != before
    }

    /// Forgets every pending, deferred, and in-flight key.
    pub fn clear(&mut self) {
        self.priority.clear();
        self.background.clear();
        self.pending.clear();
        self.in_flight.clear();
        self.deferred.clear();
    }

    /// The lane `key` is pending in, if any.
    pub fn lane_of(&self, key: K) -> Option<Lane> {
        self.pending.get(&key).copied()
    }

    /// Returns `true` if `key` is in flight.
    pub fn is_in_flight(&self, key: K) -> bool {
        self.in_flight.contains(&key)
    }

    /// Returns `true` if `key` waits for its in-flight render to complete.
    pub fn is_deferred(&self, key: K) -> bool {
        self.deferred.iter().any(|(deferred, _)| *deferred == key)
    }

    /// Keys pending in the priority lane, front first.
    pub fn priority_keys(&self) -> impl Iterator<Item = &K> {
        self.priority.iter()
    }

    /// Keys pending in the background lane, front first.
    pub fn background_keys(&self) -> impl Iterator<Item = &K> {
        self.background.iter()
    }

    /// Number of keys pending in either lane.
    pub fn pending_len(&self) -> usize {
        self.priority.len() + self.background.len()
    }

    /// Number of keys in flight.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of deferred requests.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Returns `true` if nothing is pending in either lane.
    pub fn is_empty(&self) -> bool {
        self.pending_len() == 0
    }

    /// Returns `true` if anything is pending, deferred, or in flight.
    pub fn has_work(&self) -> bool {
        !self.is_empty() || !self.in_flight.is_empty() || !self.deferred.is_empty()
    }

    fn lane_mut(&mut self, lane: Lane) -> &mut VecDeque<K> {
        match lane {
            Lane::Priority => &mut self.priority,
            Lane::Background => &mut self.background,
        }
    }
}
