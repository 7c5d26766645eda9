// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyed single-flight: at most one attempt per key, result shared with every waiter.
//!
//! Attempts run on their own task. Waiters hold a [`Shared`] handle to the
//! task's output, so a waiter that gives up (timeout, dropped request) never
//! cancels the attempt for the others, and an attempt with no waiters left
//! still runs to completion.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::task::JoinError;

/// Handle to an in-flight attempt. Cloneable; every clone yields the same output.
pub type Attempt<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

type Slots<K, V, E> = Mutex<HashMap<K, Slot<V, E>>>;

struct Slot<V, E> {
    id: u64,
    attempt: Attempt<V, E>,
}

pub struct SingleFlight<K, V, E> {
    slots: Arc<Slots<K, V, E>>,
    next_id: AtomicU64,
}

impl<K, V, E> Default for SingleFlight<K, V, E> {
    fn default() -> Self {
        Self { slots: Arc::new(Mutex::new(HashMap::new())), next_id: AtomicU64::new(0) }
    }
}

impl<K, V, E> SingleFlight<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the attempt in flight for `key`, or spawn `start()` as the new one.
    ///
    /// `start` is only called when no attempt is in flight. The slot is
    /// cleared when the attempt finishes, whether or not anyone is waiting.
    pub fn join_or_start<F, Fut>(&self, key: &K, start: F) -> Attempt<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(key) {
            return slot.attempt.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let release = Release { slots: Arc::clone(&self.slots), key: key.clone(), id };
        let work = start();
        let handle = tokio::spawn(async move {
            let _release = release;
            work.await
        });
        let attempt: Attempt<V, E> =
            async move { handle.await.unwrap_or_else(|e| Err(E::from(e))) }.boxed().shared();

        slots.insert(key.clone(), Slot { id, attempt: attempt.clone() });
        attempt
    }

    /// True while an attempt for `key` has not finished.
    pub fn in_flight(&self, key: &K) -> bool {
        self.slots.lock().contains_key(key)
    }
}

/// Clears the slot when the attempt task ends, including on panic.
struct Release<K: Eq + Hash, V, E> {
    slots: Arc<Slots<K, V, E>>,
    key: K,
    id: u64,
}

impl<K: Eq + Hash, V, E> Drop for Release<K, V, E> {
    fn drop(&mut self) {
        let mut slots = self.slots.lock();
        if slots.get(&self.key).is_some_and(|slot| slot.id == self.id) {
            slots.remove(&self.key);
        }
    }
}

#[cfg(test)]
#[path = "flight_tests.rs"]
mod tests;
