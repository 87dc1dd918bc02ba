//! Per-key callback coalescing.
//!
//! The [`Coalescer`] only keeps deadlines and values; it owns no timer. The
//! session driver sleeps until [`Coalescer::next_deadline`] and then calls
//! [`Coalescer::take_due`], so the same contract works under any clock.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct Pending<V> {
    value: V,
    deadline: Instant,
    /// Breaks ties between equal deadlines in scheduling order.
    seq: u64,
}

/// Holds at most one pending value per key.
///
/// Scheduling a key that already has a pending value replaces the value and
/// restarts its delay, so only the most recent value for a key survives a
/// coalescing window.
#[derive(Debug)]
pub struct Coalescer<K, V> {
    delay: Duration,
    pending: HashMap<K, Pending<V>>,
    next_seq: u64,
}

impl<K, V> Coalescer<K, V>
where
    K: Eq + Hash + Copy,
{
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Schedules `value` for `key` to fire `delay` after `now`.
    ///
    /// Returns the superseded value, if one was pending.
    pub fn schedule(&mut self, key: K, value: V, now: Instant) -> Option<V> {
        let deadline = now + self.delay;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending
            .insert(key, Pending { value, deadline, seq })
            .map(|old| old.value)
    }

    /// Discards the pending value for `key` without firing it.
    pub fn cancel(&mut self, key: &K) -> Option<V> {
        self.pending.remove(key).map(|p| p.value)
    }

    /// Discards every pending value. Returns how many were discarded.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending = HashMap::new();
        count
    }

    /// Earliest deadline among pending values.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    /// Removes and returns every value whose deadline is at or before `now`,
    /// earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<(K, V)> {
        let due: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(k, _)| *k)
            .collect();
        let mut fired: Vec<(K, Pending<V>)> = due
            .into_iter()
            .filter_map(|k| self.pending.remove(&k).map(|p| (k, p)))
            .collect();
        fired.sort_by_key(|(_, p)| (p.deadline, p.seq));
        fired.into_iter().map(|(k, p)| (k, p.value)).collect()
    }

    /// Removes and returns every pending value regardless of deadline,
    /// earliest first.
    pub fn drain(&mut self) -> Vec<(K, V)> {
        let mut all: Vec<(K, Pending<V>)> = self.pending.drain().collect();
        all.sort_by_key(|(_, p)| (p.deadline, p.seq));
        all.into_iter().map(|(k, p)| (k, p.value)).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
