// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-hostname key permissions.
//!
//! A wallet records, for each hostname it has been connected to, what that
//! hostname may do with the wallet's keys. The only capability is the use
//! of public keys, with two access modes: `none` and `read`. An optional
//! list of restricted keys narrows a grant to specific keys.
//!
//! Permission updates are always a full replacement: a capability omitted
//! from a requested summary is revoked, never carried over.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The capability name under which key access is granted.
pub const PUBLIC_KEYS_PERMISSION: &str = "public_keys";

/// Access mode string for [`AccessMode::Read`].
pub const READ_ACCESS_MODE: &str = "read";

/// Access mode string for [`AccessMode::None`].
pub const NO_ACCESS_MODE: &str = "none";

/// Stable, serializable form of a permissions record: capability name to
/// access-mode string.
pub type PermissionsSummary = BTreeMap<String, String>;

/// Error raised when a requested-permissions summary cannot be parsed.
///
/// These are client-input errors: the third-party application asked for
/// something this service does not model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionsError {
    #[error("permission {0:?} is not supported")]
    UnsupportedPermission(String),

    #[error("access mode {0:?} is not supported")]
    UnsupportedAccessMode(String),
}

/// How much access a hostname has to a capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    #[default]
    None,
    Read,
}

impl AccessMode {
    fn as_str(&self) -> &'static str {
        match self {
            AccessMode::None => NO_ACCESS_MODE,
            AccessMode::Read => READ_ACCESS_MODE,
        }
    }

    fn parse(mode: &str) -> Result<Self, PermissionsError> {
        match mode {
            NO_ACCESS_MODE => Ok(AccessMode::None),
            READ_ACCESS_MODE => Ok(AccessMode::Read),
            other => Err(PermissionsError::UnsupportedAccessMode(other.to_string())),
        }
    }
}

/// Grant covering the use of the wallet's public keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeysPermission {
    pub access: AccessMode,
    /// When non-empty, only these keys are usable. When empty, the grant
    /// covers every non-tainted key of the wallet.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restricted_keys: Vec<String>,
}

impl PublicKeysPermission {
    pub fn has_access(&self) -> bool {
        self.access != AccessMode::None
    }
}

/// Everything a given hostname may do with a wallet's keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub public_keys: PublicKeysPermission,
}

impl Permissions {
    /// Builds the typed model from a requested-permissions summary.
    ///
    /// Rejects unknown capability names and unknown access-mode strings.
    /// Capabilities absent from the summary are revoked.
    pub fn parse_summary(summary: &PermissionsSummary) -> Result<Self, PermissionsError> {
        let mut permissions = Permissions::default();
        for (permission, mode) in summary {
            if permission != PUBLIC_KEYS_PERMISSION {
                return Err(PermissionsError::UnsupportedPermission(permission.clone()));
            }
            permissions.public_keys = PublicKeysPermission {
                access: AccessMode::parse(mode)?,
                restricted_keys: Vec::new(),
            };
        }
        Ok(permissions)
    }

    /// Stable mapping of capability name to access-mode string.
    pub fn summary(&self) -> PermissionsSummary {
        let mut summary = PermissionsSummary::new();
        if self.public_keys.has_access() {
            summary.insert(
                PUBLIC_KEYS_PERMISSION.to_string(),
                self.public_keys.access.as_str().to_string(),
            );
        }
        summary
    }

    /// Whether the permissions alone allow the use of `pub_key`.
    ///
    /// The key must additionally exist on the wallet and not be tainted;
    /// that part of the check belongs to the wallet, not to this model.
    pub fn can_use_key(&self, pub_key: &str) -> bool {
        if !self.public_keys.has_access() {
            return false;
        }
        self.public_keys.restricted_keys.is_empty()
            || self
                .public_keys
                .restricted_keys
                .iter()
                .any(|k| k == pub_key)
    }
}
