//! Continuous-refill token buckets keyed by scope.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::config::{BucketConfig, RateLimitConfig};
use crate::core::RateScope;

/// Slack for float accumulation when refilling at exactly the consumption rate.
const EPSILON: f64 = 1e-9;

/// Key used for the single global bucket.
pub const GLOBAL_BUCKET_KEY: &str = "*";

/// One bucket: current tokens and the time they were last brought up to date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucket {
    /// Tokens available as of `last_refill_ms`.
    pub tokens: f64,
    /// Last refill timestamp.
    pub last_refill_ms: u64,
}

impl TokenBucket {
    /// A bucket at capacity.
    #[must_use]
    pub fn full(shape: &BucketConfig, now_ms: u64) -> Self {
        Self {
            tokens: shape.capacity(),
            last_refill_ms: now_ms,
        }
    }

    /// Token count at `now_ms`, capped at capacity. Does not mutate.
    #[must_use]
    pub fn refilled(&self, shape: &BucketConfig, now_ms: u64) -> f64 {
        let elapsed_ms = now_ms.saturating_sub(self.last_refill_ms);
        #[allow(clippy::cast_precision_loss)]
        let elapsed_secs = elapsed_ms as f64 / 1000.0;
        elapsed_secs
            .mul_add(shape.rate_per_sec, self.tokens)
            .min(shape.capacity())
    }
}

/// All buckets of one scope, sharing a shape.
#[derive(Debug)]
pub struct BucketTable {
    shape: BucketConfig,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl BucketTable {
    /// Empty table; buckets are created full on first use.
    #[must_use]
    pub fn new(shape: BucketConfig) -> Self {
        Self {
            shape,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Bucket shape.
    #[must_use]
    pub const fn shape(&self) -> &BucketConfig {
        &self.shape
    }

    /// Take `cost` tokens from `key`'s bucket. On refusal the bucket is untouched.
    pub fn try_consume(&self, key: &str, cost: f64, now_ms: u64) -> bool {
        let mut guard = self.buckets.lock();
        let available = available(&guard, &self.shape, key, now_ms);
        if available + EPSILON < cost {
            return false;
        }
        commit(&mut guard, key, available - cost, now_ms);
        true
    }

    /// Tokens `key` would have at `now_ms`.
    #[must_use]
    pub fn peek(&self, key: &str, now_ms: u64) -> f64 {
        available(&self.buckets.lock(), &self.shape, key, now_ms)
    }

    /// Drop buckets that have refilled to capacity; they are indistinguishable
    /// from fresh ones.
    pub fn prune_full(&self, now_ms: u64) -> usize {
        let mut guard = self.buckets.lock();
        let before = guard.len();
        let capacity = self.shape.capacity();
        guard.retain(|_, b| b.refilled(&self.shape, now_ms) + EPSILON < capacity);
        before - guard.len()
    }

    /// Number of tracked buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.lock().len()
    }

    /// True when no bucket is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn available(
    map: &HashMap<String, TokenBucket>,
    shape: &BucketConfig,
    key: &str,
    now_ms: u64,
) -> f64 {
    map.get(key)
        .map_or_else(|| shape.capacity(), |b| b.refilled(shape, now_ms))
}

fn commit(map: &mut HashMap<String, TokenBucket>, key: &str, tokens: f64, now_ms: u64) {
    let tokens = tokens.max(0.0);
    match map.get_mut(key) {
        Some(bucket) => {
            bucket.tokens = tokens;
            bucket.last_refill_ms = now_ms;
        }
        None => {
            map.insert(
                key.to_string(),
                TokenBucket {
                    tokens,
                    last_refill_ms: now_ms,
                },
            );
        }
    }
}

/// The three per-submission scopes.
#[derive(Debug)]
pub struct RateLimiter {
    user: BucketTable,
    address: BucketTable,
    global: BucketTable,
}

impl RateLimiter {
    /// Build from configuration.
    #[must_use]
    pub fn new(cfg: &RateLimitConfig) -> Self {
        Self {
            user: BucketTable::new(cfg.user),
            address: BucketTable::new(cfg.address),
            global: BucketTable::new(cfg.global),
        }
    }

    /// Table for one scope.
    #[must_use]
    pub const fn table(&self, scope: RateScope) -> &BucketTable {
        match scope {
            RateScope::User => &self.user,
            RateScope::Address => &self.address,
            RateScope::Global => &self.global,
        }
    }

    /// Consume one token from each of the user, address and global buckets, or
    /// from none of them. Locks are taken in that fixed order.
    pub fn try_consume_all(&self, user: &str, address: &str, now_ms: u64) -> Result<(), RateScope> {
        let mut user_guard = self.user.buckets.lock();
        let mut address_guard = self.address.buckets.lock();
        let mut global_guard = self.global.buckets.lock();

        let user_left = available(&user_guard, &self.user.shape, user, now_ms);
        if user_left + EPSILON < 1.0 {
            return Err(RateScope::User);
        }
        let address_left = available(&address_guard, &self.address.shape, address, now_ms);
        if address_left + EPSILON < 1.0 {
            return Err(RateScope::Address);
        }
        let global_left = available(&global_guard, &self.global.shape, GLOBAL_BUCKET_KEY, now_ms);
        if global_left + EPSILON < 1.0 {
            return Err(RateScope::Global);
        }

        commit(&mut user_guard, user, user_left - 1.0, now_ms);
        commit(&mut address_guard, address, address_left - 1.0, now_ms);
        commit(&mut global_guard, GLOBAL_BUCKET_KEY, global_left - 1.0, now_ms);
        Ok(())
    }

    /// Prune full buckets in every scope.
    pub fn prune_full(&self, now_ms: u64) -> usize {
        self.user.prune_full(now_ms) + self.address.prune_full(now_ms) + self.global.prune_full(now_ms)
    }
}
