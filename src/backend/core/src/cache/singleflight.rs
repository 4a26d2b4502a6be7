//! Single-flight coalescing: at most one in-progress rebuild per key.
//!
//! Each key maps to a pending shared future. The first caller starts the
//! flight; every concurrent caller for the same key clones and awaits the
//! same future and receives the same result. The started future is expected
//! to be backed by a detached spawned task, so the work keeps running and
//! publishes its result even when every awaiting caller is dropped.
//!
//! A flight slot is removed only after its result has been published, so a
//! late joiner either finds the pending flight or finds the published
//! result, never neither.

use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::hash::Hash;

/// A pending shared result that any number of callers can await.
pub type Flight<T> = Shared<BoxFuture<'static, T>>;

/// Per-key coalescing of in-flight work.
pub struct SingleFlight<K: Eq + Hash + Clone, T: Clone> {
    flights: DashMap<K, Flight<T>>,
}

impl<K: Eq + Hash + Clone, T: Clone> SingleFlight<K, T> {
    pub fn new() -> Self {
        Self {
            flights: DashMap::new(),
        }
    }

    /// Join the key's pending flight, starting one with `start` if none is
    /// in progress.
    ///
    /// `start` runs at most once per flight. The future it returns must make
    /// progress without being polled by the joiners, i.e. wrap a spawned
    /// task, so that abandonment of every joiner does not cancel the work.
    pub fn join_or_start<F>(&self, key: &K, start: F) -> Flight<T>
    where
        F: FnOnce() -> BoxFuture<'static, T>,
    {
        self.flights
            .entry(key.clone())
            .or_insert_with(|| start().shared())
            .clone()
    }

    /// Remove the key's flight slot. Called by the flight itself once its
    /// result has been published.
    pub fn finish(&self, key: &K) {
        self.flights.remove(key);
    }

    /// Number of keys with a pending flight.
    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    /// Drop all flight slots. Shutdown only: a spawned flight keeps running,
    /// but new callers will no longer coalesce onto it.
    pub fn clear(&self) {
        self.flights.clear();
    }
}

impl<K: Eq + Hash + Clone, T: Clone> Default for SingleFlight<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_joiners_share_one_start() {
        fn make(starts: Arc<AtomicU64>) -> BoxFuture<'static, u64> {
            async move {
                starts.fetch_add(1, Ordering::SeqCst);
                7u64
            }
            .boxed()
        }

        let flights: SingleFlight<&str, u64> = SingleFlight::new();
        let starts = Arc::new(AtomicU64::new(0));

        let a = flights.join_or_start(&"user-1", {
            let starts = starts.clone();
            move || make(starts)
        });
        let b = flights.join_or_start(&"user-1", {
            let starts = starts.clone();
            move || make(starts)
        });

        assert_eq!(a.await, 7);
        assert_eq!(b.await, 7);
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_fly_independently() {
        let flights: SingleFlight<&str, u64> = SingleFlight::new();

        let a = flights.join_or_start(&"user-a", || async { 1u64 }.boxed());
        let b = flights.join_or_start(&"user-b", || async { 2u64 }.boxed());
        assert_eq!(flights.len(), 2);

        assert_eq!(a.await, 1);
        assert_eq!(b.await, 2);
    }

    #[tokio::test]
    async fn test_finish_removes_slot() {
        let flights: SingleFlight<&str, u64> = SingleFlight::new();

        let flight = flights.join_or_start(&"user-1", || async { 1u64 }.boxed());
        flight.await;
        assert_eq!(flights.len(), 1);

        flights.finish(&"user-1");
        assert!(flights.is_empty());

        flights.join_or_start(&"user-1", || async { 2u64 }.boxed());
        flights.clear();
        assert!(flights.is_empty());
    }

    #[tokio::test]
    async fn test_spawned_flight_survives_dropped_joiners() {
        let flights: SingleFlight<&str, u64> = SingleFlight::new();
        let completions = Arc::new(AtomicU64::new(0));

        let flight = flights.join_or_start(&"user-1", {
            let completions = completions.clone();
            move || {
                let task = tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    completions.fetch_add(1, Ordering::SeqCst);
                    9u64
                });
                async move { task.await.unwrap_or(0) }.boxed()
            }
        });

        // Every joiner walks away before the work completes.
        drop(flight);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }
}
