//! Caching decorator for authenticators.
//!
//! # Invariants
//! - An entry is served only while `now - created < ttl`; older entries are
//!   removed on read and count as a miss
//! - One entry per credentials value; re-insertion replaces
//! - `BackendUnavailable` is never stored
//! - The store never holds more than `max_entries`; the oldest insertion is
//!   evicted first
//!
//! Reads go straight to the sharded map. Inserts and evictions are serialized
//! behind a small mutex that owns the insertion order, so the size bound is
//! exact.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use super::{AuthError, Authenticator, Credentials, Principal};
use crate::config::CacheConfig;
use crate::observability::metrics;

/// How long and how many verification results are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Duration,
    pub max_entries: usize,
    /// Whether `Denied` results are remembered as well as successes.
    pub cache_denials: bool,
}

impl CachePolicy {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            ttl: Duration::from_secs(config.ttl_secs),
            max_entries: config.max_entries,
            cache_denials: config.cache_denials,
        }
    }
}

#[derive(Debug, Clone)]
enum Cached {
    Granted(Principal),
    Denied,
}

impl Cached {
    fn into_result(self) -> Result<Principal, AuthError> {
        match self {
            Cached::Granted(principal) => Ok(principal),
            Cached::Denied => Err(AuthError::Denied),
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    outcome: Cached,
    created: Instant,
    /// Matches the insertion-order record that owns this entry.
    generation: u64,
}

#[derive(Default)]
struct InsertionOrder {
    queue: VecDeque<(Credentials, u64)>,
    next_generation: u64,
}

/// Point-in-time counters, exposed on the admin endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Wraps an authenticator and memoizes its definitive answers.
pub struct CachingAuthenticator {
    inner: Box<dyn Authenticator>,
    policy: CachePolicy,
    entries: DashMap<Credentials, CacheEntry>,
    order: Mutex<InsertionOrder>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CachingAuthenticator {
    /// Take ownership of `inner` and serve repeated verifications from memory.
    pub fn wrap(inner: Box<dyn Authenticator>, policy: CachePolicy) -> Self {
        Self {
            inner,
            policy,
            entries: DashMap::new(),
            order: Mutex::new(InsertionOrder::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Forget the cached result for one set of credentials.
    pub fn invalidate(&self, credentials: &Credentials) {
        let _order = self.lock_order();
        self.entries.remove(credentials);
        metrics::record_cache_size(self.entries.len());
    }

    /// Forget everything.
    pub fn invalidate_all(&self) {
        let mut order = self.lock_order();
        self.entries.clear();
        order.queue.clear();
        metrics::record_cache_size(0);
        tracing::info!("Authentication cache flushed");
    }

    fn lock_order(&self) -> std::sync::MutexGuard<'_, InsertionOrder> {
        // The guarded data is only a queue of keys; a panic mid-update leaves
        // at worst a stale record, which eviction tolerates.
        self.order.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, credentials: &Credentials) -> Option<Cached> {
        let expired = match self.entries.get(credentials) {
            Some(entry) if entry.created.elapsed() < self.policy.ttl => {
                return Some(entry.outcome.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            let ttl = self.policy.ttl;
            self.entries
                .remove_if(credentials, |_, entry| entry.created.elapsed() >= ttl);
        }
        None
    }

    fn store(&self, credentials: &Credentials, outcome: Cached) {
        let mut order = self.lock_order();

        if !self.entries.contains_key(credentials) {
            while self.entries.len() >= self.policy.max_entries {
                let Some((oldest, generation)) = order.queue.pop_front() else {
                    break;
                };
                // Records whose entry was replaced or expired are skipped.
                if self
                    .entries
                    .remove_if(&oldest, |_, entry| entry.generation == generation)
                    .is_some()
                {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                    metrics::record_cache_eviction();
                }
            }
        }

        let generation = order.next_generation;
        order.next_generation += 1;
        self.entries.insert(
            credentials.clone(),
            CacheEntry {
                outcome,
                created: Instant::now(),
                generation,
            },
        );
        order.queue.push_back((credentials.clone(), generation));

        // Drop records that no longer own an entry so the queue stays
        // proportional to the map.
        if order.queue.len() > self.policy.max_entries.saturating_mul(2) {
            order.queue.retain(|(key, generation)| {
                self.entries
                    .get(key)
                    .is_some_and(|entry| entry.generation == *generation)
            });
        }

        metrics::record_cache_size(self.entries.len());
    }
}

#[async_trait]
impl Authenticator for CachingAuthenticator {
    fn name(&self) -> &'static str {
        "cached"
    }

    async fn verify(&self, credentials: &Credentials) -> Result<Principal, AuthError> {
        if let Some(cached) = self.lookup(credentials) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_lookup(true);
            return cached.into_result();
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_lookup(false);

        let result = self.inner.verify(credentials).await;
        match &result {
            Ok(principal) => self.store(credentials, Cached::Granted(principal.clone())),
            Err(AuthError::Denied) if self.policy.cache_denials => {
                self.store(credentials, Cached::Denied)
            }
            Err(_) => {}
        }
        result
    }
}
