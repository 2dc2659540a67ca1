// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP implementation of the [`Node`] contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{LastBlock, Node, NodeError, SendingMode, TransactionError};

#[derive(Serialize)]
struct SubmitTransactionRequest<'a> {
    transaction: &'a str,
    mode: SendingMode,
}

#[derive(Deserialize)]
struct SubmitTransactionResponse {
    tx_hash: String,
}

/// Rejection body returned by the node on a 4xx/5xx answer.
#[derive(Deserialize)]
struct TransactionRejection {
    abci_code: Option<u32>,
    message: String,
}

/// One network node reached over HTTP.
pub struct HttpNode {
    client: reqwest::Client,
    base_url: Url,
    host: String,
}

impl HttpNode {
    pub fn new(base_url: Url) -> Self {
        let host = base_url.host_str().unwrap_or("unknown").to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            host,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, NodeError> {
        self.base_url
            .join(path)
            .map_err(|e| NodeError::Communication(e.to_string()))
    }

    /// Turns a node answer into a transaction outcome. Non-success answers
    /// are decoded as rejections when the body parses, communication
    /// failures otherwise.
    async fn rejection_from(response: reqwest::Response) -> TransactionError {
        let status = response.status();
        match response.json::<TransactionRejection>().await {
            Ok(rejection) => TransactionError {
                abci_code: rejection.abci_code,
                message: rejection.message,
            },
            Err(_) => TransactionError::communication(format!(
                "the node answered with status {status}"
            )),
        }
    }
}

#[async_trait]
impl Node for HttpNode {
    fn host(&self) -> &str {
        &self.host
    }

    async fn last_block(&self) -> Result<LastBlock, NodeError> {
        let url = self.endpoint("blockchain/last-block")?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NodeError::Communication(e.to_string()))?
            .error_for_status()
            .map_err(|e| NodeError::Communication(e.to_string()))?;
        response
            .json::<LastBlock>()
            .await
            .map_err(|e| NodeError::Communication(e.to_string()))
    }

    async fn send_transaction(
        &self,
        transaction: &str,
        mode: SendingMode,
    ) -> Result<String, TransactionError> {
        let url = self
            .endpoint("transactions")
            .map_err(|e| TransactionError::communication(e.to_string()))?;
        let response = self
            .client
            .post(url)
            .json(&SubmitTransactionRequest { transaction, mode })
            .send()
            .await
            .map_err(|e| TransactionError::communication(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::rejection_from(response).await);
        }
        response
            .json::<SubmitTransactionResponse>()
            .await
            .map(|body| body.tx_hash)
            .map_err(|e| TransactionError::communication(e.to_string()))
    }

    async fn check_transaction(&self, transaction: &str) -> Result<(), TransactionError> {
        let url = self
            .endpoint("transactions/check")
            .map_err(|e| TransactionError::communication(e.to_string()))?;
        let response = self
            .client
            .post(url)
            .json(&SubmitTransactionRequest {
                transaction,
                mode: SendingMode::Sync,
            })
            .send()
            .await
            .map_err(|e| TransactionError::communication(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::rejection_from(response).await);
        }
        Ok(())
    }
}
