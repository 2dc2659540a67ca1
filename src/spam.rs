// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Anti-spam proof-of-work for transaction submission.
//!
//! The chain prices transactions with a small proof-of-work puzzle bound
//! to the current block, and caps how many a key may submit per block.
//! Both halves live behind [`SpamHandler`] so the pipeline stays testable
//! with a no-op fake.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::network::LastBlock;

const SUPPORTED_HASH_FUNCTION: &str = "sha2_256";
const TX_ID_LENGTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpamError {
    #[error("the transaction per block limit has been reached")]
    BlockLimitReached,

    #[error("the proof-of-work hash function {0:?} is not supported")]
    UnsupportedHashFunction(String),
}

/// A solved puzzle, attached to the transaction on submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProofOfWork {
    pub tx_id: String,
    pub nonce: u64,
}

#[async_trait]
pub trait SpamHandler: Send + Sync {
    /// Verifies the key still has budget for the block the proof will be
    /// bound to, and consumes one slot.
    async fn check_submission(&self, pub_key: &str, block: &LastBlock) -> Result<(), SpamError>;

    /// Solves the puzzle for a fresh transaction id against `block`.
    async fn generate_proof_of_work(
        &self,
        pub_key: &str,
        block: &LastBlock,
    ) -> Result<ProofOfWork, SpamError>;
}

/// Default handler: sha256 leading-zero puzzle plus per-block counters.
///
/// Counters for stale blocks are dropped whenever a newer block is seen,
/// so the table stays bounded by the number of active keys.
#[derive(Default)]
pub struct PowSpamHandler {
    submissions: Mutex<SubmissionCounters>,
}

#[derive(Default)]
struct SubmissionCounters {
    block_hash: String,
    per_key: HashMap<String, u32>,
}

impl PowSpamHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SpamHandler for PowSpamHandler {
    async fn check_submission(&self, pub_key: &str, block: &LastBlock) -> Result<(), SpamError> {
        let mut counters = self
            .submissions
            .lock()
            .expect("spam counter table poisoned");

        if counters.block_hash != block.block_hash {
            counters.block_hash = block.block_hash.clone();
            counters.per_key.clear();
        }

        let count = counters.per_key.entry(pub_key.to_string()).or_insert(0);
        if *count >= block.transactions_per_block {
            return Err(SpamError::BlockLimitReached);
        }
        *count += 1;
        Ok(())
    }

    async fn generate_proof_of_work(
        &self,
        _pub_key: &str,
        block: &LastBlock,
    ) -> Result<ProofOfWork, SpamError> {
        if block.proof_of_work_hash_function != SUPPORTED_HASH_FUNCTION {
            return Err(SpamError::UnsupportedHashFunction(
                block.proof_of_work_hash_function.clone(),
            ));
        }

        let tx_id: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TX_ID_LENGTH)
            .map(char::from)
            .collect();
        let nonce = solve(&block.block_hash, &tx_id, block.proof_of_work_difficulty);
        Ok(ProofOfWork { tx_id, nonce })
    }
}

/// Finds the first nonce whose digest carries at least `difficulty`
/// leading zero bits.
fn solve(block_hash: &str, tx_id: &str, difficulty: u32) -> u64 {
    let mut nonce = 0u64;
    loop {
        if leading_zero_bits(&digest(block_hash, tx_id, nonce)) >= difficulty {
            return nonce;
        }
        nonce += 1;
    }
}

fn digest(block_hash: &str, tx_id: &str, nonce: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(block_hash.as_bytes());
    hasher.update(tx_id.as_bytes());
    hasher.update(nonce.to_be_bytes());
    hasher.finalize().into()
}

fn leading_zero_bits(bytes: &[u8; 32]) -> u32 {
    let mut zeros = 0;
    for byte in bytes {
        if *byte == 0 {
            zeros += 8;
        } else {
            zeros += byte.leading_zeros();
            break;
        }
    }
    zeros
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(hash: &str, per_block: u32) -> LastBlock {
        LastBlock {
            chain_id: "test-chain".to_string(),
            block_height: 10,
            block_hash: hash.to_string(),
            proof_of_work_difficulty: 4,
            proof_of_work_hash_function: SUPPORTED_HASH_FUNCTION.to_string(),
            transactions_per_block: per_block,
        }
    }

    #[tokio::test]
    async fn generated_proof_satisfies_the_difficulty() {
        let handler = PowSpamHandler::new();
        let block = block("deadbeef", 2);

        let proof = handler.generate_proof_of_work("k1", &block).await.unwrap();
        assert_eq!(proof.tx_id.len(), TX_ID_LENGTH);
        assert!(
            leading_zero_bits(&digest(&block.block_hash, &proof.tx_id, proof.nonce))
                >= block.proof_of_work_difficulty
        );
    }

    #[tokio::test]
    async fn unsupported_hash_function_is_rejected() {
        let handler = PowSpamHandler::new();
        let mut block = block("deadbeef", 2);
        block.proof_of_work_hash_function = "blake3".to_string();

        assert_eq!(
            handler
                .generate_proof_of_work("k1", &block)
                .await
                .unwrap_err(),
            SpamError::UnsupportedHashFunction("blake3".to_string())
        );
    }

    #[tokio::test]
    async fn per_block_budget_is_enforced_per_key() {
        let handler = PowSpamHandler::new();
        let block = block("deadbeef", 2);

        handler.check_submission("k1", &block).await.unwrap();
        handler.check_submission("k1", &block).await.unwrap();
        assert_eq!(
            handler.check_submission("k1", &block).await.unwrap_err(),
            SpamError::BlockLimitReached
        );

        // Another key has its own budget.
        handler.check_submission("k2", &block).await.unwrap();
    }

    #[tokio::test]
    async fn a_new_block_resets_the_budget() {
        let handler = PowSpamHandler::new();
        let first = block("deadbeef", 1);
        let second = block("cafebabe", 1);

        handler.check_submission("k1", &first).await.unwrap();
        assert_eq!(
            handler.check_submission("k1", &first).await.unwrap_err(),
            SpamError::BlockLimitReached
        );
        handler.check_submission("k1", &second).await.unwrap();
    }
}
