// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The JSON-RPC API surface.
//!
//! Two caller classes, two handler sets: [`client`] serves third-party
//! applications through session tokens and the interactive review
//! workflow, [`admin`] serves the wallet owner's own tooling and skips
//! review entirely. Both share the transaction act-phase below, so the
//! key lock, anti-spam and node plumbing behave identically regardless of
//! who asked.

pub mod admin;
pub mod client;
pub mod error;

use std::sync::Arc;

use base64ct::{Base64, Encoding};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::network::{Node, NodeSelector};
use crate::spam::{ProofOfWork, SpamHandler};
use crate::wallet::{Signature, Wallet};
use error::RpcError;

/// Per-request metadata resolved by the transport.
#[derive(Clone)]
pub struct RequestContext {
    /// Trace identifier shared with the front-end for the whole request.
    pub trace_id: String,
    /// Hostname claimed by the third-party application, from `Origin`.
    pub hostname: String,
    /// Fires when the caller goes away; awaited loops must observe it.
    pub cancellation: CancellationToken,
}

/// Structural validation of a submitted transaction: base64-encoded JSON.
/// Returns the decoded payload bytes.
pub(crate) fn decode_transaction(transaction: &str) -> Result<Vec<u8>, RpcError> {
    if transaction.is_empty() {
        return Err(RpcError::invalid_params("the transaction is required"));
    }
    let bytes = Base64::decode_vec(transaction)
        .map_err(|_| RpcError::invalid_params("the transaction is not a valid base64 string"))?;
    serde_json::from_slice::<serde_json::Value>(&bytes)
        .map_err(|_| RpcError::invalid_params("the transaction is not a valid JSON payload"))?;
    Ok(bytes)
}

/// What the act-phase produced: everything needed to submit the
/// transaction and to describe the outcome to the user.
pub(crate) struct SignedTransaction {
    pub node: Arc<dyn Node>,
    pub signature: Signature,
    /// Serialized envelope handed to the node.
    pub envelope: String,
}

#[derive(Serialize)]
struct TransactionEnvelope<'a> {
    chain_id: &'a str,
    block_height: u64,
    pub_key: &'a str,
    transaction: &'a str,
    signature: &'a Signature,
    proof_of_work: &'a ProofOfWork,
}

/// The shared act-phase of the transaction pipeline: select a node, fetch
/// the chain head, charge the anti-spam budget, solve the proof-of-work
/// and sign.
///
/// The caller must hold the key lock for `pub_key` before calling this
/// and keep it until the node answered the submission.
pub(crate) async fn prepare_transaction(
    node_selector: &dyn NodeSelector,
    spam: &dyn SpamHandler,
    wallet: &Wallet,
    pub_key: &str,
    transaction: &str,
    payload: &[u8],
) -> Result<SignedTransaction, RpcError> {
    let node = node_selector
        .select()
        .await
        .map_err(RpcError::node_communication)?;
    let block = node
        .last_block()
        .await
        .map_err(RpcError::node_communication)?;

    spam.check_submission(pub_key, &block)
        .await
        .map_err(RpcError::request_not_permitted)?;
    let proof_of_work = spam
        .generate_proof_of_work(pub_key, &block)
        .await
        .map_err(RpcError::internal)?;

    // The signature binds the payload to the chain head and the proof, so
    // a replay against another block fails verification.
    let mut signing_input =
        Vec::with_capacity(block.chain_id.len() + proof_of_work.tx_id.len() + payload.len() + 2);
    signing_input.extend_from_slice(block.chain_id.as_bytes());
    signing_input.push(0);
    signing_input.extend_from_slice(proof_of_work.tx_id.as_bytes());
    signing_input.push(0);
    signing_input.extend_from_slice(payload);

    let signature = wallet
        .sign(pub_key, &signing_input)
        .map_err(RpcError::internal)?;

    let envelope = serde_json::to_string(&TransactionEnvelope {
        chain_id: &block.chain_id,
        block_height: block.block_height,
        pub_key,
        transaction,
        signature: &signature,
        proof_of_work: &proof_of_work,
    })
    .map_err(RpcError::internal)?;

    Ok(SignedTransaction {
        node,
        signature,
        envelope,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_transaction_accepts_base64_json() {
        let encoded = Base64::encode_string(br#"{"transfer":{"amount":"1"}}"#);
        assert!(decode_transaction(&encoded).is_ok());
    }

    #[test]
    fn decode_transaction_rejects_bad_input() {
        assert_eq!(
            decode_transaction("").unwrap_err(),
            RpcError::invalid_params("the transaction is required")
        );
        assert_eq!(
            decode_transaction("not-base64!!").unwrap_err(),
            RpcError::invalid_params("the transaction is not a valid base64 string")
        );
        let encoded = Base64::encode_string(b"not json");
        assert_eq!(
            decode_transaction(&encoded).unwrap_err(),
            RpcError::invalid_params("the transaction is not a valid JSON payload")
        );
    }
}
