// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-key mutual exclusion for in-flight transactions.
//!
//! Anti-spam proofs are bound to (key, block) pairs, so two concurrent
//! submissions for the same key would race each other's proof budget. The
//! locker serializes them: at most one in-flight transaction per public
//! key, with a bounded wait before giving up.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
const DEFAULT_MAX_ATTEMPTS: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyLockError {
    #[error("the key is already in use, retry later")]
    KeyAlreadyInUse,
}

/// Hands out at most one [`KeyLockGuard`] per public key at a time.
#[derive(Clone)]
pub struct KeyLocker {
    in_use: Arc<Mutex<HashSet<String>>>,
    poll_interval: Duration,
    max_attempts: u32,
}

impl Default for KeyLocker {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_ATTEMPTS)
    }
}

impl KeyLocker {
    pub fn new(poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            in_use: Arc::new(Mutex::new(HashSet::new())),
            poll_interval,
            max_attempts,
        }
    }

    /// Acquires the lock for `pub_key`, polling until it frees up or the
    /// attempt budget runs out.
    pub async fn acquire(&self, pub_key: &str) -> Result<KeyLockGuard, KeyLockError> {
        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.poll_interval).await;
            }
            let mut in_use = self.in_use.lock().expect("key lock table poisoned");
            if in_use.insert(pub_key.to_string()) {
                return Ok(KeyLockGuard {
                    in_use: self.in_use.clone(),
                    pub_key: pub_key.to_string(),
                });
            }
        }
        Err(KeyLockError::KeyAlreadyInUse)
    }
}

/// Releases the key on drop, so every exit path of the transaction
/// pipeline frees the lock.
#[derive(Debug)]
pub struct KeyLockGuard {
    in_use: Arc<Mutex<HashSet<String>>>,
    pub_key: String,
}

impl Drop for KeyLockGuard {
    fn drop(&mut self) {
        self.in_use
            .lock()
            .expect("key lock table poisoned")
            .remove(&self.pub_key);
    }
}
