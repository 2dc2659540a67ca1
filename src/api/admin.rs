// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Handlers for the wallet owner's own tooling.
//!
//! The admin surface is trusted: it operates directly on wallet names and
//! never goes through the interactive review workflow. Transaction
//! submission still takes the per-key lock so admin and third-party
//! traffic cannot race each other's anti-spam budget.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::keylock::KeyLocker;
use crate::network::{NodeSelector, SendingMode};
use crate::session::{ConnectionSummary, SessionRegistry};
use crate::spam::SpamHandler;
use crate::wallet::store::{StoreError, WalletStore};
use crate::wallet::{KeyHandle, PermissionsSummary, Signature, Wallet};

use super::error::RpcError;
use super::{decode_transaction, prepare_transaction};

#[derive(Debug, Deserialize)]
pub struct CreateWalletParams {
    pub wallet: String,
    pub passphrase: String,
}

#[derive(Debug, Serialize)]
pub struct CreateWalletResult {
    pub wallet: String,
    pub public_key: String,
}

#[derive(Debug, Serialize)]
pub struct ListWalletsResult {
    pub wallets: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DescribePermissionsParams {
    pub wallet: String,
    pub hostname: String,
}

#[derive(Debug, Serialize)]
pub struct DescribePermissionsResult {
    pub permissions: PermissionsSummary,
}

#[derive(Debug, Deserialize)]
pub struct RevokePermissionsParams {
    pub wallet: String,
    pub hostname: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateKeyParams {
    pub wallet: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateKeyResult {
    pub public_key: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct TaintKeyParams {
    pub wallet: String,
    pub public_key: String,
}

#[derive(Debug, Serialize)]
pub struct ListConnectionsResult {
    pub connections: Vec<ConnectionSummary>,
}

#[derive(Debug, Deserialize)]
pub struct AdminSignTransactionParams {
    pub wallet: String,
    pub public_key: String,
    pub transaction: String,
}

#[derive(Debug, Serialize)]
pub struct AdminSignTransactionResult {
    pub signature: Signature,
    pub signed_transaction: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminSendTransactionParams {
    pub wallet: String,
    pub public_key: String,
    pub sending_mode: SendingMode,
    pub transaction: String,
}

#[derive(Debug, Serialize)]
pub struct AdminSendTransactionResult {
    pub transaction_hash: String,
    pub node_host: String,
    pub sent_at: DateTime<Utc>,
}

/// The wallet owner's API.
pub struct AdminApi {
    store: Arc<dyn WalletStore>,
    registry: Arc<SessionRegistry>,
    node_selector: Arc<dyn NodeSelector>,
    spam: Arc<dyn SpamHandler>,
    key_locker: KeyLocker,
}

impl AdminApi {
    pub fn new(
        store: Arc<dyn WalletStore>,
        registry: Arc<SessionRegistry>,
        node_selector: Arc<dyn NodeSelector>,
        spam: Arc<dyn SpamHandler>,
        key_locker: KeyLocker,
    ) -> Self {
        Self {
            store,
            registry,
            node_selector,
            spam,
            key_locker,
        }
    }

    pub async fn create_wallet(
        &self,
        params: CreateWalletParams,
    ) -> Result<CreateWalletResult, RpcError> {
        if params.wallet.is_empty() {
            return Err(RpcError::invalid_params("the wallet name is required"));
        }
        if params.passphrase.is_empty() {
            return Err(RpcError::invalid_params("the passphrase is required"));
        }

        let wallet = Wallet::new(&params.wallet);
        let public_key = wallet.list_key_pairs()[0].public_key.clone();
        self.store
            .create_wallet(wallet, &params.passphrase)
            .await
            .map_err(map_store_error)?;
        Ok(CreateWalletResult {
            wallet: params.wallet,
            public_key,
        })
    }

    pub async fn list_wallets(&self) -> Result<ListWalletsResult, RpcError> {
        Ok(ListWalletsResult {
            wallets: self.store.list_wallets().await,
        })
    }

    pub async fn describe_permissions(
        &self,
        params: DescribePermissionsParams,
    ) -> Result<DescribePermissionsResult, RpcError> {
        let wallet = self
            .store
            .get_wallet(&params.wallet)
            .await
            .map_err(map_store_error)?;
        Ok(DescribePermissionsResult {
            permissions: wallet.permissions(&params.hostname).summary(),
        })
    }

    /// Strips every grant held by `hostname` on the wallet. Live
    /// connections keep their in-memory copy until they reconnect.
    pub async fn revoke_permissions(
        &self,
        params: RevokePermissionsParams,
    ) -> Result<(), RpcError> {
        let mut wallet = self
            .store
            .get_wallet(&params.wallet)
            .await
            .map_err(map_store_error)?;
        wallet.revoke_permissions(&params.hostname);
        self.store
            .save_wallet(&wallet)
            .await
            .map_err(map_store_error)?;
        Ok(())
    }

    pub async fn generate_key(
        &self,
        params: GenerateKeyParams,
    ) -> Result<GenerateKeyResult, RpcError> {
        let mut wallet = self
            .store
            .get_wallet(&params.wallet)
            .await
            .map_err(map_store_error)?;
        let handle = wallet.generate_key_pair();
        self.store
            .save_wallet(&wallet)
            .await
            .map_err(map_store_error)?;
        Ok(GenerateKeyResult {
            public_key: handle.public_key,
            name: handle.name,
        })
    }

    pub async fn taint_key(&self, params: TaintKeyParams) -> Result<(), RpcError> {
        let mut wallet = self
            .store
            .get_wallet(&params.wallet)
            .await
            .map_err(map_store_error)?;
        wallet
            .taint_key(&params.public_key)
            .map_err(RpcError::invalid_params)?;
        self.store
            .save_wallet(&wallet)
            .await
            .map_err(map_store_error)?;
        Ok(())
    }

    pub async fn untaint_key(&self, params: TaintKeyParams) -> Result<(), RpcError> {
        let mut wallet = self
            .store
            .get_wallet(&params.wallet)
            .await
            .map_err(map_store_error)?;
        wallet
            .untaint_key(&params.public_key)
            .map_err(RpcError::invalid_params)?;
        self.store
            .save_wallet(&wallet)
            .await
            .map_err(map_store_error)?;
        Ok(())
    }

    pub async fn list_connections(&self) -> Result<ListConnectionsResult, RpcError> {
        Ok(ListConnectionsResult {
            connections: self.registry.list_connections(),
        })
    }

    pub async fn sign_transaction(
        &self,
        params: AdminSignTransactionParams,
    ) -> Result<AdminSignTransactionResult, RpcError> {
        let payload = decode_transaction(&params.transaction)?;
        let wallet = self.usable_wallet(&params.wallet, &params.public_key).await?;

        let _guard = self
            .key_locker
            .acquire(&params.public_key)
            .await
            .map_err(RpcError::application_cancellation)?;
        let prepared = prepare_transaction(
            self.node_selector.as_ref(),
            self.spam.as_ref(),
            &wallet,
            &params.public_key,
            &params.transaction,
            &payload,
        )
        .await?;

        Ok(AdminSignTransactionResult {
            signature: prepared.signature,
            signed_transaction: prepared.envelope,
        })
    }

    pub async fn send_transaction(
        &self,
        params: AdminSendTransactionParams,
    ) -> Result<AdminSendTransactionResult, RpcError> {
        let payload = decode_transaction(&params.transaction)?;
        let wallet = self.usable_wallet(&params.wallet, &params.public_key).await?;

        let _guard = self
            .key_locker
            .acquire(&params.public_key)
            .await
            .map_err(RpcError::application_cancellation)?;
        let prepared = prepare_transaction(
            self.node_selector.as_ref(),
            self.spam.as_ref(),
            &wallet,
            &params.public_key,
            &params.transaction,
            &payload,
        )
        .await?;

        let sent_at = Utc::now();
        let transaction_hash = prepared
            .node
            .send_transaction(&prepared.envelope, params.sending_mode)
            .await
            .map_err(|e| RpcError::from_transaction_error(&e))?;
        Ok(AdminSendTransactionResult {
            transaction_hash,
            node_host: prepared.node.host().to_string(),
            sent_at,
        })
    }

    /// Loads the wallet and checks the key is present and usable.
    async fn usable_wallet(&self, wallet_name: &str, pub_key: &str) -> Result<Wallet, RpcError> {
        if pub_key.is_empty() {
            return Err(RpcError::invalid_params("the public key is required"));
        }
        let wallet = self
            .store
            .get_wallet(wallet_name)
            .await
            .map_err(map_store_error)?;
        let handle: KeyHandle = wallet
            .describe_key_pair(pub_key)
            .map_err(RpcError::invalid_params)?;
        if handle.tainted {
            return Err(RpcError::request_not_permitted("the public key is tainted"));
        }
        Ok(wallet)
    }
}

fn map_store_error(err: StoreError) -> RpcError {
    match err {
        StoreError::WalletNotFound => RpcError::invalid_params("the wallet does not exist"),
        StoreError::WalletAlreadyExists => {
            RpcError::invalid_params("a wallet with the same name already exists")
        }
        StoreError::WrongPassphrase => RpcError::invalid_params("wrong passphrase"),
        StoreError::WalletIsLocked => RpcError::request_not_permitted("the wallet is locked"),
        StoreError::Internal(cause) => RpcError::internal(cause),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use base64ct::{Base64, Encoding};

    use crate::api::error;
    use crate::network::{LastBlock, Node, NodeError, RoundRobinSelector, TransactionError};
    use crate::spam::PowSpamHandler;
    use crate::wallet::store::InMemoryWalletStore;

    use super::*;

    struct FakeNode;

    #[async_trait]
    impl Node for FakeNode {
        fn host(&self) -> &str {
            "node.example"
        }

        async fn last_block(&self) -> Result<LastBlock, NodeError> {
            Ok(LastBlock {
                chain_id: "test-chain".to_string(),
                block_height: 42,
                block_hash: "ab".repeat(32),
                proof_of_work_difficulty: 2,
                proof_of_work_hash_function: "sha2_256".to_string(),
                transactions_per_block: 10,
            })
        }

        async fn send_transaction(
            &self,
            _: &str,
            _: SendingMode,
        ) -> Result<String, TransactionError> {
            Ok("txhash123".to_string())
        }

        async fn check_transaction(&self, _: &str) -> Result<(), TransactionError> {
            Ok(())
        }
    }

    fn api() -> AdminApi {
        AdminApi::new(
            Arc::new(InMemoryWalletStore::new()),
            Arc::new(SessionRegistry::new()),
            Arc::new(RoundRobinSelector::new(vec![
                Arc::new(FakeNode) as Arc<dyn Node>
            ])),
            Arc::new(PowSpamHandler::new()),
            KeyLocker::default(),
        )
    }

    fn encoded_transaction() -> String {
        Base64::encode_string(br#"{"transfer":{"amount":"1"}}"#)
    }

    #[tokio::test]
    async fn create_list_and_generate_keys() {
        let api = api();
        let created = api
            .create_wallet(CreateWalletParams {
                wallet: "w1".to_string(),
                passphrase: "s3cr3t".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(created.wallet, "w1");
        assert_eq!(created.public_key.len(), 66);

        assert_eq!(api.list_wallets().await.unwrap().wallets, vec!["w1"]);

        let generated = api
            .generate_key(GenerateKeyParams {
                wallet: "w1".to_string(),
            })
            .await
            .unwrap();
        assert_ne!(generated.public_key, created.public_key);
    }

    #[tokio::test]
    async fn duplicate_wallet_name_is_rejected() {
        let api = api();
        api.create_wallet(CreateWalletParams {
            wallet: "w1".to_string(),
            passphrase: "a".to_string(),
        })
        .await
        .unwrap();
        let err = api
            .create_wallet(CreateWalletParams {
                wallet: "w1".to_string(),
                passphrase: "b".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, error::ERROR_CODE_INVALID_PARAMS);
    }

    #[tokio::test]
    async fn admin_send_skips_review_and_submits() {
        let api = api();
        let created = api
            .create_wallet(CreateWalletParams {
                wallet: "w1".to_string(),
                passphrase: "s3cr3t".to_string(),
            })
            .await
            .unwrap();

        let sent = api
            .send_transaction(AdminSendTransactionParams {
                wallet: "w1".to_string(),
                public_key: created.public_key,
                sending_mode: SendingMode::Sync,
                transaction: encoded_transaction(),
            })
            .await
            .unwrap();
        assert_eq!(sent.transaction_hash, "txhash123");
    }

    #[tokio::test]
    async fn tainted_key_cannot_sign_until_untainted() {
        let api = api();
        let created = api
            .create_wallet(CreateWalletParams {
                wallet: "w1".to_string(),
                passphrase: "s3cr3t".to_string(),
            })
            .await
            .unwrap();

        api.taint_key(TaintKeyParams {
            wallet: "w1".to_string(),
            public_key: created.public_key.clone(),
        })
        .await
        .unwrap();

        let err = api
            .sign_transaction(AdminSignTransactionParams {
                wallet: "w1".to_string(),
                public_key: created.public_key.clone(),
                transaction: encoded_transaction(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, error::ERROR_CODE_REQUEST_NOT_PERMITTED);

        api.untaint_key(TaintKeyParams {
            wallet: "w1".to_string(),
            public_key: created.public_key.clone(),
        })
        .await
        .unwrap();
        assert!(api
            .sign_transaction(AdminSignTransactionParams {
                wallet: "w1".to_string(),
                public_key: created.public_key,
                transaction: encoded_transaction(),
            })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn revoking_permissions_clears_the_stored_grant() {
        let api = api();
        api.create_wallet(CreateWalletParams {
            wallet: "w1".to_string(),
            passphrase: "s3cr3t".to_string(),
        })
        .await
        .unwrap();

        // Grant directly through the store, as a client session would.
        let mut wallet = api.store.get_wallet("w1").await.unwrap();
        let summary = PermissionsSummary::from([("public_keys".to_string(), "read".to_string())]);
        let permissions = crate::wallet::Permissions::parse_summary(&summary).unwrap();
        wallet.update_permissions("dapp.example", permissions);
        api.store.save_wallet(&wallet).await.unwrap();

        let described = api
            .describe_permissions(DescribePermissionsParams {
                wallet: "w1".to_string(),
                hostname: "dapp.example".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(described.permissions, summary);

        api.revoke_permissions(RevokePermissionsParams {
            wallet: "w1".to_string(),
            hostname: "dapp.example".to_string(),
        })
        .await
        .unwrap();

        let described = api
            .describe_permissions(DescribePermissionsParams {
                wallet: "w1".to_string(),
                hostname: "dapp.example".to_string(),
            })
            .await
            .unwrap();
        assert!(described.permissions.is_empty());
    }

    #[tokio::test]
    async fn connections_are_listed_from_the_registry() {
        let api = api();
        api.create_wallet(CreateWalletParams {
            wallet: "w1".to_string(),
            passphrase: "s3cr3t".to_string(),
        })
        .await
        .unwrap();
        let wallet = api.store.get_wallet("w1").await.unwrap();
        api.registry.connect("dapp.example", wallet).unwrap();

        let listed = api.list_connections().await.unwrap();
        assert_eq!(
            listed.connections,
            vec![ConnectionSummary {
                hostname: "dapp.example".to_string(),
                wallet: "w1".to_string(),
            }]
        );
    }
}
