// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet model: named key pairs, taint flags, and per-hostname permissions.
//!
//! The wallet held here is an in-memory value. Connections own their copy
//! exclusively while connected; mutations happen on that copy first and are
//! persisted through the [`store::WalletStore`].

pub mod permissions;
pub mod store;

use std::collections::HashMap;

use k256::ecdsa::signature::Signer;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::rand_core::OsRng;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Serialize};

pub use permissions::{Permissions, PermissionsError, PermissionsSummary};

/// Errors raised by wallet-level operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("the public key does not exist")]
    KeyNotFound,

    #[error("the public key is tainted")]
    KeyIsTainted,
}

/// Public description of a key pair. Never carries secret material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyHandle {
    pub public_key: String,
    pub name: String,
    pub tainted: bool,
}

/// A signature produced by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Hex-encoded signature bytes.
    pub value: String,
    pub algorithm: String,
    pub version: u32,
}

const SIGNATURE_ALGORITHM: &str = "ecdsa-secp256k1";
const SIGNATURE_VERSION: u32 = 1;

/// One secp256k1 key pair with its metadata.
#[derive(Clone)]
struct KeyPair {
    public_key: String,
    secret: SigningKey,
    name: String,
    tainted: bool,
}

impl KeyPair {
    fn generate(name: String) -> Self {
        let secret = SigningKey::random(&mut OsRng);
        let public_key = hex::encode(secret.verifying_key().to_encoded_point(true).as_bytes());
        Self {
            public_key,
            secret,
            name,
            tainted: false,
        }
    }

    fn handle(&self) -> KeyHandle {
        KeyHandle {
            public_key: self.public_key.clone(),
            name: self.name.clone(),
            tainted: self.tainted,
        }
    }
}

/// An unlocked wallet: key pairs plus the permissions it has granted to
/// each hostname.
#[derive(Clone)]
pub struct Wallet {
    name: String,
    key_pairs: Vec<KeyPair>,
    permissions: HashMap<String, Permissions>,
}

impl Wallet {
    /// Creates a wallet with a single freshly generated key pair.
    pub fn new(name: impl Into<String>) -> Self {
        let mut wallet = Self {
            name: name.into(),
            key_pairs: Vec::new(),
            permissions: HashMap::new(),
        };
        wallet.generate_key_pair();
        wallet
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Permissions granted to `hostname`. Hostnames never granted anything
    /// get the default record, which denies everything.
    pub fn permissions(&self, hostname: &str) -> Permissions {
        self.permissions.get(hostname).cloned().unwrap_or_default()
    }

    /// Replaces the permissions for `hostname`. Updates are full
    /// replacements; there is no merging with the previous record.
    pub fn update_permissions(&mut self, hostname: &str, permissions: Permissions) {
        self.permissions.insert(hostname.to_string(), permissions);
    }

    /// Removes every grant held by `hostname`.
    pub fn revoke_permissions(&mut self, hostname: &str) {
        self.permissions.remove(hostname);
    }

    /// Generates a new key pair and returns its description.
    pub fn generate_key_pair(&mut self) -> KeyHandle {
        let name = format!("key-{}", self.key_pairs.len() + 1);
        let key_pair = KeyPair::generate(name);
        let handle = key_pair.handle();
        self.key_pairs.push(key_pair);
        handle
    }

    pub fn describe_key_pair(&self, pub_key: &str) -> Result<KeyHandle, WalletError> {
        self.key_pairs
            .iter()
            .find(|kp| kp.public_key == pub_key)
            .map(KeyPair::handle)
            .ok_or(WalletError::KeyNotFound)
    }

    pub fn list_key_pairs(&self) -> Vec<KeyHandle> {
        self.key_pairs.iter().map(KeyPair::handle).collect()
    }

    /// Every key that can still be used for signing, tainted keys excluded.
    pub fn list_usable_keys(&self) -> Vec<KeyHandle> {
        self.key_pairs
            .iter()
            .filter(|kp| !kp.tainted)
            .map(KeyPair::handle)
            .collect()
    }

    pub fn has_key(&self, pub_key: &str) -> bool {
        self.key_pairs.iter().any(|kp| kp.public_key == pub_key)
    }

    /// Marks a key as compromised or rotated out. Tainted keys refuse to
    /// sign regardless of any permission grant.
    pub fn taint_key(&mut self, pub_key: &str) -> Result<(), WalletError> {
        let key_pair = self
            .key_pairs
            .iter_mut()
            .find(|kp| kp.public_key == pub_key)
            .ok_or(WalletError::KeyNotFound)?;
        key_pair.tainted = true;
        Ok(())
    }

    pub fn untaint_key(&mut self, pub_key: &str) -> Result<(), WalletError> {
        let key_pair = self
            .key_pairs
            .iter_mut()
            .find(|kp| kp.public_key == pub_key)
            .ok_or(WalletError::KeyNotFound)?;
        key_pair.tainted = false;
        Ok(())
    }

    /// Signs `data` with the key pair identified by `pub_key`.
    pub fn sign(&self, pub_key: &str, data: &[u8]) -> Result<Signature, WalletError> {
        let key_pair = self
            .key_pairs
            .iter()
            .find(|kp| kp.public_key == pub_key)
            .ok_or(WalletError::KeyNotFound)?;
        if key_pair.tainted {
            return Err(WalletError::KeyIsTainted);
        }

        let signature: k256::ecdsa::Signature = key_pair.secret.sign(data);
        Ok(Signature {
            value: hex::encode(signature.to_bytes()),
            algorithm: SIGNATURE_ALGORITHM.to_string(),
            version: SIGNATURE_VERSION,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::permissions::{AccessMode, PublicKeysPermission};
    use super::*;

    #[test]
    fn new_wallet_has_one_usable_key() {
        let wallet = Wallet::new("w1");
        let keys = wallet.list_usable_keys();
        assert_eq!(keys.len(), 1);
        assert!(!keys[0].tainted);
        // Compressed secp256k1 point: 33 bytes, hex encoded.
        assert_eq!(keys[0].public_key.len(), 66);
    }

    #[test]
    fn describe_unknown_key_fails() {
        let wallet = Wallet::new("w1");
        assert_eq!(
            wallet.describe_key_pair("missing").unwrap_err(),
            WalletError::KeyNotFound
        );
    }

    #[test]
    fn tainted_key_refuses_to_sign_and_leaves_usable_list() {
        let mut wallet = Wallet::new("w1");
        let pub_key = wallet.list_key_pairs()[0].public_key.clone();

        wallet.taint_key(&pub_key).unwrap();
        assert!(wallet.list_usable_keys().is_empty());
        assert_eq!(
            wallet.sign(&pub_key, b"payload").unwrap_err(),
            WalletError::KeyIsTainted
        );

        wallet.untaint_key(&pub_key).unwrap();
        assert!(wallet.sign(&pub_key, b"payload").is_ok());
    }

    #[test]
    fn permissions_default_to_no_access_per_hostname() {
        let mut wallet = Wallet::new("w1");
        assert_eq!(wallet.permissions("dapp.example"), Permissions::default());

        wallet.update_permissions(
            "dapp.example",
            Permissions {
                public_keys: PublicKeysPermission {
                    access: AccessMode::Read,
                    restricted_keys: Vec::new(),
                },
            },
        );
        assert!(wallet.permissions("dapp.example").public_keys.has_access());
        // Another hostname is unaffected.
        assert_eq!(wallet.permissions("other.example"), Permissions::default());

        wallet.revoke_permissions("dapp.example");
        assert_eq!(wallet.permissions("dapp.example"), Permissions::default());
    }

    #[test]
    fn signatures_are_hex_and_stable_in_shape() {
        let wallet = Wallet::new("w1");
        let pub_key = wallet.list_key_pairs()[0].public_key.clone();
        let signature = wallet.sign(&pub_key, b"payload").unwrap();
        assert_eq!(signature.algorithm, "ecdsa-secp256k1");
        assert_eq!(signature.version, 1);
        assert_eq!(signature.value.len(), 128);
        assert!(signature.value.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
