// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session layer: connection tokens, the permission-projected wallet each
//! connection owns, and the registry that binds them together.
//!
//! Invariant enforced here: at most one live token per (hostname, wallet)
//! fingerprint. Reconnecting from the same hostname to the same wallet
//! silently disconnects the previous token and issues a fresh one.

pub mod connected_wallet;
pub mod registry;
pub mod token;

pub use connected_wallet::ConnectedWallet;
pub use registry::{ConnectionSummary, SessionRegistry};
pub use token::Token;

/// Errors raised when resolving a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The token is unknown or expired. Expired tokens are deliberately
    /// indistinguishable from absent ones.
    #[error("no wallet is connected with this token")]
    NoWalletConnected,
}
