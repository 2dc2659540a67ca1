// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registry of open connections between third-party applications and
//! wallets.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex as AsyncMutex;

use super::{ConnectedWallet, SessionError, Token};
use crate::wallet::{Wallet, WalletError};

/// How long a session token stays valid after connecting.
const SESSION_TTL_HOURS: i64 = 1;

/// Hostname/wallet pair describing one live session connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSummary {
    pub hostname: String,
    pub wallet: String,
}

struct Connection {
    /// Per-token lock: writes to one connection (permission updates,
    /// wallet reloads) are serialized by taking this mutex for the whole
    /// operation.
    connected_wallet: Arc<AsyncMutex<ConnectedWallet>>,
    hostname: Option<String>,
    wallet_name: String,
    expires_at: Option<DateTime<Utc>>,
    fingerprint: Option<String>,
}

#[derive(Default)]
struct Inner {
    token_to_connection: HashMap<Token, Connection>,
    fingerprint_to_token: HashMap<String, Token>,
}

/// Owns the token-to-connection map and enforces "at most one live
/// connection per (hostname, wallet)".
///
/// The registry's own maps are the shared mutable state; they are guarded
/// by a plain mutex held only for map operations, never across awaits.
pub struct SessionRegistry {
    inner: Mutex<Inner>,
    session_ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_ttl(Duration::hours(SESSION_TTL_HOURS))
    }

    /// Registry with a custom session lifetime. Tests shrink it to reach
    /// the expiry path.
    pub fn with_ttl(session_ttl: Duration) -> Self {
        Self {
            inner: Mutex::default(),
            session_ttl,
        }
    }

    /// Opens a session connection and returns its fresh token.
    ///
    /// If a connection already exists for the same (hostname, wallet)
    /// fingerprint, it is disconnected first: after this call exactly one
    /// token is valid for that fingerprint.
    pub fn connect(&self, hostname: &str, wallet: Wallet) -> Result<Token, WalletError> {
        let wallet_name = wallet.name().to_string();
        let connected = ConnectedWallet::new_session(hostname, wallet)?;

        let mut inner = self.inner.lock().expect("session registry lock poisoned");

        let fingerprint = session_fingerprint(hostname, &wallet_name);
        if let Some(previous) = inner.fingerprint_to_token.remove(&fingerprint) {
            inner.token_to_connection.remove(&previous);
        }

        let token = generate_unused_token(&inner);
        inner
            .fingerprint_to_token
            .insert(fingerprint.clone(), token.clone());
        inner.token_to_connection.insert(
            token.clone(),
            Connection {
                connected_wallet: Arc::new(AsyncMutex::new(connected)),
                hostname: Some(hostname.to_string()),
                wallet_name,
                expires_at: Some(Utc::now() + self.session_ttl),
                fingerprint: Some(fingerprint),
            },
        );

        Ok(token)
    }

    /// Registers a long-lived connection under a caller-provided token.
    /// Long-lived connections have no fingerprint, never expire here, and
    /// skip interactive review.
    pub fn attach_long_lived(&self, token: Token, wallet: Wallet) {
        let mut inner = self.inner.lock().expect("session registry lock poisoned");
        let wallet_name = wallet.name().to_string();
        inner.token_to_connection.insert(
            token,
            Connection {
                connected_wallet: Arc::new(AsyncMutex::new(ConnectedWallet::long_lived(wallet))),
                hostname: None,
                wallet_name,
                expires_at: None,
                fingerprint: None,
            },
        );
    }

    /// Best-effort disconnection. Unknown tokens are a no-op.
    pub fn disconnect(&self, token: &Token) {
        let mut inner = self.inner.lock().expect("session registry lock poisoned");
        if let Some(connection) = inner.token_to_connection.remove(token) {
            if let Some(fingerprint) = connection.fingerprint {
                inner.fingerprint_to_token.remove(&fingerprint);
            }
        }
    }

    /// Resolves a token to its connection.
    ///
    /// An expired token is dropped and treated exactly like an absent one.
    pub fn get(&self, token: &Token) -> Result<Arc<AsyncMutex<ConnectedWallet>>, SessionError> {
        let mut inner = self.inner.lock().expect("session registry lock poisoned");

        let expired = match inner.token_to_connection.get(token) {
            None => return Err(SessionError::NoWalletConnected),
            Some(connection) => connection
                .expires_at
                .is_some_and(|expires_at| expires_at <= Utc::now()),
        };

        if expired {
            if let Some(connection) = inner.token_to_connection.remove(token) {
                if let Some(fingerprint) = connection.fingerprint {
                    inner.fingerprint_to_token.remove(&fingerprint);
                }
            }
            return Err(SessionError::NoWalletConnected);
        }

        Ok(inner.token_to_connection[token].connected_wallet.clone())
    }

    /// Lists the live session connections, sorted by hostname then wallet
    /// name. Long-lived connections are not listed.
    pub fn list_connections(&self) -> Vec<ConnectionSummary> {
        let inner = self.inner.lock().expect("session registry lock poisoned");
        let mut connections: Vec<ConnectionSummary> = inner
            .token_to_connection
            .values()
            .filter_map(|connection| {
                connection.hostname.as_ref().map(|hostname| ConnectionSummary {
                    hostname: hostname.clone(),
                    wallet: connection.wallet_name.clone(),
                })
            })
            .collect();
        connections.sort_by(|a, b| {
            a.hostname
                .cmp(&b.hostname)
                .then_with(|| a.wallet.cmp(&b.wallet))
        });
        connections
    }
}

/// One-way hash binding a hostname to a wallet name, used to guarantee
/// connection uniqueness per pair.
fn session_fingerprint(hostname: &str, wallet_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(hostname.as_bytes());
    hasher.update(b"::");
    hasher.update(wallet_name.as_bytes());
    hex::encode(hasher.finalize())
}

/// Draws tokens until one not already in use is found, to rule out
/// collisions.
fn generate_unused_token(inner: &Inner) -> Token {
    loop {
        let token = Token::generate();
        if !inner.token_to_connection.contains_key(&token) {
            return token;
        }
    }
}
