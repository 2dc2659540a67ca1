// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet persistence contract and the in-memory implementation.
//!
//! The core never talks to concrete storage: it depends on [`WalletStore`]
//! only, so tests (and deployments that keep keys elsewhere) substitute
//! their own implementation. The in-memory store is the default backing
//! for a standalone server.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::Wallet;

/// Errors raised by wallet storage.
///
/// `WrongPassphrase` is distinguished so callers can treat it as
/// retryable-by-the-user instead of fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("the wallet does not exist")]
    WalletNotFound,

    #[error("a wallet with the same name already exists")]
    WalletAlreadyExists,

    #[error("wrong passphrase")]
    WrongPassphrase,

    #[error("the wallet is locked")]
    WalletIsLocked,

    #[error("{0}")]
    Internal(String),
}

/// Storage contract for wallets.
#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn wallet_exists(&self, name: &str) -> bool;

    /// Sorted list of stored wallet names.
    async fn list_wallets(&self) -> Vec<String>;

    /// Verifies the passphrase and marks the wallet as unlocked.
    async fn unlock_wallet(&self, name: &str, passphrase: &str) -> Result<(), StoreError>;

    async fn is_wallet_unlocked(&self, name: &str) -> bool;

    /// Returns a copy of an unlocked wallet.
    async fn get_wallet(&self, name: &str) -> Result<Wallet, StoreError>;

    /// Creates a new wallet protected by `passphrase`. The wallet starts
    /// unlocked for its creator.
    async fn create_wallet(&self, wallet: Wallet, passphrase: &str) -> Result<(), StoreError>;

    /// Persists the current state of an unlocked wallet.
    async fn save_wallet(&self, wallet: &Wallet) -> Result<(), StoreError>;
}

struct StoredWallet {
    wallet: Wallet,
    passphrase: String,
    unlocked: bool,
}

/// In-memory wallet store.
#[derive(Default)]
pub struct InMemoryWalletStore {
    wallets: RwLock<HashMap<String, StoredWallet>>,
}

impl InMemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn wallet_exists(&self, name: &str) -> bool {
        self.wallets.read().await.contains_key(name)
    }

    async fn list_wallets(&self) -> Vec<String> {
        let mut names: Vec<String> = self.wallets.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    async fn unlock_wallet(&self, name: &str, passphrase: &str) -> Result<(), StoreError> {
        let mut wallets = self.wallets.write().await;
        let stored = wallets.get_mut(name).ok_or(StoreError::WalletNotFound)?;
        if stored.passphrase != passphrase {
            return Err(StoreError::WrongPassphrase);
        }
        stored.unlocked = true;
        Ok(())
    }

    async fn is_wallet_unlocked(&self, name: &str) -> bool {
        self.wallets
            .read()
            .await
            .get(name)
            .is_some_and(|stored| stored.unlocked)
    }

    async fn get_wallet(&self, name: &str) -> Result<Wallet, StoreError> {
        let wallets = self.wallets.read().await;
        let stored = wallets.get(name).ok_or(StoreError::WalletNotFound)?;
        if !stored.unlocked {
            return Err(StoreError::WalletIsLocked);
        }
        Ok(stored.wallet.clone())
    }

    async fn create_wallet(&self, wallet: Wallet, passphrase: &str) -> Result<(), StoreError> {
        let mut wallets = self.wallets.write().await;
        if wallets.contains_key(wallet.name()) {
            return Err(StoreError::WalletAlreadyExists);
        }
        wallets.insert(
            wallet.name().to_string(),
            StoredWallet {
                wallet,
                passphrase: passphrase.to_string(),
                unlocked: true,
            },
        );
        Ok(())
    }

    async fn save_wallet(&self, wallet: &Wallet) -> Result<(), StoreError> {
        let mut wallets = self.wallets.write().await;
        let stored = wallets
            .get_mut(wallet.name())
            .ok_or(StoreError::WalletNotFound)?;
        if !stored.unlocked {
            return Err(StoreError::WalletIsLocked);
        }
        stored.wallet = wallet.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_list_and_exists() {
        let store = InMemoryWalletStore::new();
        store.create_wallet(Wallet::new("w2"), "s3cr3t").await.unwrap();
        store.create_wallet(Wallet::new("w1"), "s3cr3t").await.unwrap();

        assert!(store.wallet_exists("w1").await);
        assert!(!store.wallet_exists("w3").await);
        assert_eq!(store.list_wallets().await, vec!["w1", "w2"]);
    }

    #[tokio::test]
    async fn creating_duplicate_wallet_fails() {
        let store = InMemoryWalletStore::new();
        store.create_wallet(Wallet::new("w1"), "a").await.unwrap();
        assert_eq!(
            store.create_wallet(Wallet::new("w1"), "b").await.unwrap_err(),
            StoreError::WalletAlreadyExists
        );
    }

    #[tokio::test]
    async fn unlock_distinguishes_wrong_passphrase() {
        let store = InMemoryWalletStore::new();
        store.create_wallet(Wallet::new("w1"), "s3cr3t").await.unwrap();

        assert_eq!(
            store.unlock_wallet("w1", "nope").await.unwrap_err(),
            StoreError::WrongPassphrase
        );
        assert_eq!(
            store.unlock_wallet("missing", "s3cr3t").await.unwrap_err(),
            StoreError::WalletNotFound
        );
        store.unlock_wallet("w1", "s3cr3t").await.unwrap();
        assert!(store.is_wallet_unlocked("w1").await);
    }

    #[tokio::test]
    async fn save_round_trips_wallet_state() {
        let store = InMemoryWalletStore::new();
        store.create_wallet(Wallet::new("w1"), "s3cr3t").await.unwrap();

        let mut wallet = store.get_wallet("w1").await.unwrap();
        let handle = wallet.generate_key_pair();
        store.save_wallet(&wallet).await.unwrap();

        let reloaded = store.get_wallet("w1").await.unwrap();
        assert!(reloaded.has_key(&handle.public_key));
    }

    #[tokio::test]
    async fn saving_unknown_wallet_fails() {
        let store = InMemoryWalletStore::new();
        assert_eq!(
            store.save_wallet(&Wallet::new("ghost")).await.unwrap_err(),
            StoreError::WalletNotFound
        );
    }
}
