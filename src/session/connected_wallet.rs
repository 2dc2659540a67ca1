// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The projection of a wallet through the permissions system.
//!
//! A regular wallet has no notion of restricted access, so a connection
//! never handles the wallet directly: it goes through a `ConnectedWallet`,
//! which binds the wallet to one hostname and caches the set of keys that
//! hostname may use under the current permissions.

use crate::wallet::{KeyHandle, Permissions, Wallet, WalletError};

/// One wallet bound to one hostname for the lifetime of a connection.
///
/// The wallet value is exclusively owned by this connection while
/// connected: mutations happen here first, then are persisted. The
/// `allowed_keys` cache is derived, never authoritative; it is recomputed
/// on connect, after a successful permission update, and after a reload
/// from storage.
pub struct ConnectedWallet {
    hostname: Option<String>,
    wallet: Wallet,
    allowed_keys: Vec<KeyHandle>,
}

// Manual impl because `Wallet` holds secret key material and therefore
// does not implement `Debug`; only the wallet name is shown.
impl std::fmt::Debug for ConnectedWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectedWallet")
            .field("hostname", &self.hostname)
            .field("wallet", &self.wallet.name())
            .field("allowed_keys", &self.allowed_keys)
            .finish()
    }
}

impl ConnectedWallet {
    /// Builds the projection for a session connection.
    ///
    /// Fails if the stored permissions reference a key that no longer
    /// exists on the wallet.
    pub fn new_session(hostname: impl Into<String>, wallet: Wallet) -> Result<Self, WalletError> {
        let mut connected = Self {
            hostname: Some(hostname.into()),
            wallet,
            allowed_keys: Vec::new(),
        };
        connected.recompute_allowed_keys()?;
        Ok(connected)
    }

    /// Builds the projection for a long-lived (admin-issued) connection:
    /// no hostname, no interactive review, every usable key allowed.
    pub fn long_lived(wallet: Wallet) -> Self {
        let allowed_keys = wallet.list_usable_keys();
        Self {
            hostname: None,
            wallet,
            allowed_keys,
        }
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn name(&self) -> &str {
        self.wallet.name()
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    /// Whether operations on this connection go through the interactive
    /// review workflow. Long-lived connections skip it.
    pub fn requires_interaction(&self) -> bool {
        self.hostname.is_some()
    }

    /// Permissions currently granted to this connection's hostname.
    pub fn permissions(&self) -> Permissions {
        match &self.hostname {
            Some(hostname) => self.wallet.permissions(hostname),
            None => Permissions::default(),
        }
    }

    /// The cached set of keys usable under the current permissions.
    pub fn allowed_keys(&self) -> &[KeyHandle] {
        &self.allowed_keys
    }

    /// Whether this connection may use `pub_key`: the permissions must
    /// grant it AND the key must exist on the wallet AND it must not be
    /// tainted. Long-lived connections skip the permission half.
    pub fn can_use_key(&self, pub_key: &str) -> bool {
        if let Some(hostname) = &self.hostname {
            if !self.wallet.permissions(hostname).can_use_key(pub_key) {
                return false;
            }
        }
        self.wallet
            .describe_key_pair(pub_key)
            .is_ok_and(|handle| !handle.tainted)
    }

    /// Applies new permissions to the underlying wallet and recomputes the
    /// allowed-key cache. On failure the previous permissions and cache are
    /// left untouched.
    pub fn update_permissions(&mut self, permissions: Permissions) -> Result<(), WalletError> {
        let Some(hostname) = self.hostname.clone() else {
            return Ok(());
        };

        let previous = self.wallet.permissions(&hostname);
        self.wallet.update_permissions(&hostname, permissions);
        if let Err(e) = self.recompute_allowed_keys() {
            self.wallet.update_permissions(&hostname, previous);
            return Err(e);
        }
        Ok(())
    }

    /// Best-effort restoration of the last known-persisted permissions
    /// after a failed save. The original error is authoritative, so a
    /// failure here is logged, not escalated.
    pub fn rollback_permissions(&mut self, previous: Permissions) {
        if let Err(e) = self.update_permissions(previous) {
            tracing::warn!(
                wallet = %self.wallet.name(),
                error = %e,
                "Could not roll back the in-memory permissions after a failed save"
            );
        }
    }

    /// Swaps the wallet value, absorbing changes persisted out-of-band,
    /// and recomputes the allowed-key cache.
    pub fn reload_with_wallet(&mut self, wallet: Wallet) -> Result<(), WalletError> {
        self.wallet = wallet;
        if self.hostname.is_some() {
            self.recompute_allowed_keys()
        } else {
            self.allowed_keys = self.wallet.list_usable_keys();
            Ok(())
        }
    }

    fn recompute_allowed_keys(&mut self) -> Result<(), WalletError> {
        let Some(hostname) = &self.hostname else {
            return Ok(());
        };

        let permissions = self.wallet.permissions(hostname);
        if !permissions.public_keys.has_access() {
            self.allowed_keys = Vec::new();
            return Ok(());
        }

        if permissions.public_keys.restricted_keys.is_empty() {
            self.allowed_keys = self.wallet.list_usable_keys();
            return Ok(());
        }

        let mut allowed = Vec::with_capacity(permissions.public_keys.restricted_keys.len());
        for pub_key in &permissions.public_keys.restricted_keys {
            let handle = self.wallet.describe_key_pair(pub_key)?;
            if !handle.tainted {
                allowed.push(handle);
            }
        }
        self.allowed_keys = allowed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::permissions::{AccessMode, PublicKeysPermission};

    fn read_all() -> Permissions {
        Permissions {
            public_keys: PublicKeysPermission {
                access: AccessMode::Read,
                restricted_keys: Vec::new(),
            },
        }
    }

    fn read_only(keys: Vec<String>) -> Permissions {
        Permissions {
            public_keys: PublicKeysPermission {
                access: AccessMode::Read,
                restricted_keys: keys,
            },
        }
    }

    #[test]
    fn connection_without_grant_allows_no_keys() {
        let connected = ConnectedWallet::new_session("dapp.example", Wallet::new("w1")).unwrap();
        assert!(connected.allowed_keys().is_empty());
        assert!(connected.permissions().summary().is_empty());
        let pub_key = connected.wallet().list_key_pairs()[0].public_key.clone();
        assert!(!connected.can_use_key(&pub_key));
    }

    #[test]
    fn connecting_with_permissions_referencing_missing_key_fails() {
        let mut wallet = Wallet::new("w1");
        wallet.update_permissions("dapp.example", read_only(vec!["gone".to_string()]));
        let err = ConnectedWallet::new_session("dapp.example", wallet).unwrap_err();
        assert_eq!(err, WalletError::KeyNotFound);
    }

    #[test]
    fn cache_matches_permissions_after_update() {
        let mut connected =
            ConnectedWallet::new_session("dapp.example", Wallet::new("w1")).unwrap();
        let pub_key = connected.wallet().list_key_pairs()[0].public_key.clone();

        connected.update_permissions(read_all()).unwrap();

        assert_eq!(connected.permissions().summary(), read_all().summary());
        assert_eq!(connected.allowed_keys().len(), 1);
        assert!(connected.can_use_key(&pub_key));
    }

    #[test]
    fn revocation_by_empty_permissions_denies_every_key() {
        let mut connected =
            ConnectedWallet::new_session("dapp.example", Wallet::new("w1")).unwrap();
        connected.update_permissions(read_all()).unwrap();
        let pub_key = connected.wallet().list_key_pairs()[0].public_key.clone();
        assert!(connected.can_use_key(&pub_key));

        connected.update_permissions(Permissions::default()).unwrap();
        assert!(!connected.can_use_key(&pub_key));
        assert!(connected.allowed_keys().is_empty());
    }

    #[test]
    fn failed_update_leaves_previous_permissions_and_cache() {
        let mut connected =
            ConnectedWallet::new_session("dapp.example", Wallet::new("w1")).unwrap();
        connected.update_permissions(read_all()).unwrap();
        let before_keys = connected.allowed_keys().to_vec();
        let before_permissions = connected.permissions();

        let err = connected
            .update_permissions(read_only(vec!["missing".to_string()]))
            .unwrap_err();
        assert_eq!(err, WalletError::KeyNotFound);

        assert_eq!(connected.permissions(), before_permissions);
        assert_eq!(connected.allowed_keys(), before_keys.as_slice());
    }

    #[test]
    fn tainted_keys_are_excluded_even_when_granted() {
        let mut wallet = Wallet::new("w1");
        let pub_key = wallet.list_key_pairs()[0].public_key.clone();
        wallet.update_permissions("dapp.example", read_all());
        wallet.taint_key(&pub_key).unwrap();

        let connected = ConnectedWallet::new_session("dapp.example", wallet).unwrap();
        assert!(connected.allowed_keys().is_empty());
        assert!(!connected.can_use_key(&pub_key));
    }

    #[test]
    fn reload_absorbs_out_of_band_changes() {
        let mut connected =
            ConnectedWallet::new_session("dapp.example", Wallet::new("w1")).unwrap();
        connected.update_permissions(read_all()).unwrap();

        // Someone generated a key in the stored wallet behind our back.
        let mut stored = connected.wallet().clone();
        let new_key = stored.generate_key_pair();

        connected.reload_with_wallet(stored).unwrap();
        assert!(connected.can_use_key(&new_key.public_key));
        assert_eq!(connected.allowed_keys().len(), 2);
    }

    #[test]
    fn long_lived_connection_skips_permissions_but_not_taint() {
        let mut wallet = Wallet::new("w1");
        let tainted = wallet.generate_key_pair();
        wallet.taint_key(&tainted.public_key).unwrap();
        let usable = wallet.list_usable_keys()[0].public_key.clone();

        let connected = ConnectedWallet::long_lived(wallet);
        assert!(!connected.requires_interaction());
        assert!(connected.can_use_key(&usable));
        assert!(!connected.can_use_key(&tainted.public_key));
        assert_eq!(connected.allowed_keys().len(), 1);
    }
}
