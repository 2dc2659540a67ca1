// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Network-facing collaborators: node contracts and wire types.
//!
//! The transaction pipeline never talks HTTP directly; it depends on the
//! [`Node`] and [`NodeSelector`] traits so tests substitute static fakes
//! and deployments choose their own node pool.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// How the node should handle a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendingMode {
    /// Wait for the transaction to pass mempool checks.
    Sync,
    /// Fire and forget.
    Async,
    /// Wait for the transaction to be committed in a block.
    Commit,
}

/// Snapshot of the chain head, carrying everything the anti-spam proof
/// needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastBlock {
    pub chain_id: String,
    pub block_height: u64,
    pub block_hash: String,
    pub proof_of_work_difficulty: u32,
    pub proof_of_work_hash_function: String,
    pub transactions_per_block: u32,
}

/// A transaction the network refused, or failed to reach.
///
/// `abci_code` is the chain's rejection code when the node answered;
/// `None` means the node itself could not be reached or understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransactionError {
    pub abci_code: Option<u32>,
    pub message: String,
}

impl TransactionError {
    pub fn communication(message: impl ToString) -> Self {
        Self {
            abci_code: None,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
    #[error("no healthy node is available")]
    NoHealthyNode,

    #[error("{0}")]
    Communication(String),
}

/// One network node.
#[async_trait]
pub trait Node: Send + Sync {
    /// Host identifier reported back to the user in notifications.
    fn host(&self) -> &str;

    async fn last_block(&self) -> Result<LastBlock, NodeError>;

    /// Submits a signed transaction and returns its hash.
    async fn send_transaction(
        &self,
        transaction: &str,
        mode: SendingMode,
    ) -> Result<String, TransactionError>;

    /// Runs mempool checks without submitting.
    async fn check_transaction(&self, transaction: &str) -> Result<(), TransactionError>;
}

impl std::fmt::Debug for dyn Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node").field("host", &self.host()).finish()
    }
}

/// Picks a node for one request. Selection failures surface as node
/// communication errors at the API.
#[async_trait]
pub trait NodeSelector: Send + Sync {
    async fn select(&self) -> Result<Arc<dyn Node>, NodeError>;
}

/// Probes nodes in rotating order and hands out the first healthy one.
pub struct RoundRobinSelector {
    nodes: Vec<Arc<dyn Node>>,
    next: std::sync::atomic::AtomicUsize,
}

impl RoundRobinSelector {
    pub fn new(nodes: Vec<Arc<dyn Node>>) -> Self {
        Self {
            nodes,
            next: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl NodeSelector for RoundRobinSelector {
    async fn select(&self) -> Result<Arc<dyn Node>, NodeError> {
        if self.nodes.is_empty() {
            return Err(NodeError::NoHealthyNode);
        }

        let start = self
            .next
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        for offset in 0..self.nodes.len() {
            let node = &self.nodes[(start + offset) % self.nodes.len()];
            match node.last_block().await {
                Ok(_) => {
                    tracing::debug!(host = node.host(), "Selected network node");
                    return Ok(node.clone());
                }
                Err(e) => {
                    tracing::warn!(host = node.host(), error = %e, "Skipping unhealthy node");
                }
            }
        }
        Err(NodeError::NoHealthyNode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeNode {
        host: String,
        healthy: bool,
        probes: AtomicU32,
    }

    impl FakeNode {
        fn new(host: &str, healthy: bool) -> Arc<Self> {
            Arc::new(Self {
                host: host.to_string(),
                healthy,
                probes: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl Node for FakeNode {
        fn host(&self) -> &str {
            &self.host
        }

        async fn last_block(&self) -> Result<LastBlock, NodeError> {
            self.probes.fetch_add(1, Ordering::Relaxed);
            if self.healthy {
                Ok(LastBlock {
                    chain_id: "test-chain".to_string(),
                    block_height: 10,
                    block_hash: "aa".repeat(32),
                    proof_of_work_difficulty: 1,
                    proof_of_work_hash_function: "sha2_256".to_string(),
                    transactions_per_block: 2,
                })
            } else {
                Err(NodeError::Communication("down".to_string()))
            }
        }

        async fn send_transaction(
            &self,
            _: &str,
            _: SendingMode,
        ) -> Result<String, TransactionError> {
            Ok("hash".to_string())
        }

        async fn check_transaction(&self, _: &str) -> Result<(), TransactionError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn selector_skips_unhealthy_nodes() {
        let down = FakeNode::new("down.example", false);
        let up = FakeNode::new("up.example", true);
        let selector =
            RoundRobinSelector::new(vec![down.clone() as Arc<dyn Node>, up.clone()]);

        let selected = selector.select().await.unwrap();
        assert_eq!(selected.host(), "up.example");
        assert_eq!(down.probes.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn selector_rotates_between_healthy_nodes() {
        let a = FakeNode::new("a.example", true);
        let b = FakeNode::new("b.example", true);
        let selector = RoundRobinSelector::new(vec![a as Arc<dyn Node>, b as Arc<dyn Node>]);

        let first = selector.select().await.unwrap().host().to_string();
        let second = selector.select().await.unwrap().host().to_string();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn selector_fails_without_any_healthy_node() {
        let selector = RoundRobinSelector::new(vec![
            FakeNode::new("down.example", false) as Arc<dyn Node>,
        ]);
        assert_eq!(
            selector.select().await.unwrap_err(),
            NodeError::NoHealthyNode
        );

        let empty = RoundRobinSelector::new(Vec::new());
        assert_eq!(empty.select().await.unwrap_err(), NodeError::NoHealthyNode);
    }
}
