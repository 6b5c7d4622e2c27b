/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Registry of in-progress fetches, one shared future per key.
//!
//! The table only keeps a weak handle: the fetch lives as long as at least one caller is
//! awaiting it, and its entry is removed when it finishes or when the last caller gives up.

use futures_util::future::{BoxFuture, FutureExt, Shared, WeakShared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::error::{DerefError, DerefResult};

type SharedFetch<T> = Shared<BoxFuture<'static, DerefResult<T>>>;

struct Entry<T: Clone> {
    generation: u64,
    fetch: WeakShared<BoxFuture<'static, DerefResult<T>>>,
}

struct Table<T: Clone> {
    next_generation: u64,
    entries: HashMap<String, Entry<T>>,
}

pub struct InFlight<T: Clone> {
    table: Arc<Mutex<Table<T>>>,
}

impl<T: Clone + Send + Sync + 'static> Default for InFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> InFlight<T> {
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(Table {
                next_generation: 0,
                entries: HashMap::new(),
            })),
        }
    }

    /// Awaits the fetch registered under `key`, starting it with `start` if there is none.
    pub async fn run<F>(&self, key: &str, cancel: &CancellationToken, start: F) -> DerefResult<T>
    where
        F: FnOnce() -> BoxFuture<'static, DerefResult<T>>,
    {
        let fetch = self.join_or_start(key, start);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DerefError::Cancelled),
            res = fetch => res,
        }
    }

    fn join_or_start<F>(&self, key: &str, start: F) -> SharedFetch<T>
    where
        F: FnOnce() -> BoxFuture<'static, DerefResult<T>>,
    {
        let mut table = lock(&self.table);
        if let Some(existing) = table.entries.get(key).and_then(|e| e.fetch.upgrade()) {
            return existing;
        }

        table.next_generation += 1;
        let generation = table.next_generation;
        let guard = Deregister {
            table: self.table.clone(),
            key: key.to_string(),
            generation,
        };
        let inner = start();
        let fetch = async move {
            let _guard = guard;
            inner.await
        }
        .boxed()
        .shared();
        if let Some(weak) = fetch.downgrade() {
            table.entries.insert(
                key.to_string(),
                Entry {
                    generation,
                    fetch: weak,
                },
            );
        }
        fetch
    }

    pub fn len(&self) -> usize {
        lock(&self.table).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<T: Clone>(table: &Mutex<Table<T>>) -> MutexGuard<'_, Table<T>> {
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Dropped together with the fetch future, on completion or abandonment.
struct Deregister<T: Clone> {
    table: Arc<Mutex<Table<T>>>,
    key: String,
    generation: u64,
}

impl<T: Clone> Drop for Deregister<T> {
    fn drop(&mut self) {
        let mut table = lock(&self.table);
        if table
            .entries
            .get(&self.key)
            .is_some_and(|e| e.generation == self.generation)
        {
            table.entries.remove(&self.key);
        }
    }
}
