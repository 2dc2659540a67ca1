// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Structured JSON-RPC errors and the error-code space.
//!
//! Codes below -32000 are reserved implementation-defined server errors.
//! Network errors range from 1000 to 1999 and, apart from the
//! communication failure, mirror the chain's rejection code plus 1000.
//! Application errors range from 2000 to 2999, user errors from 3000 to
//! 3999.

use serde::Serialize;

use crate::network::TransactionError;

/// The request was interrupted by the server or the third-party
/// application, through a timeout or an explicit cancellation.
pub const ERROR_CODE_REQUEST_INTERRUPTED: i64 = -32001;

/// The server could not resolve the hostname from the request.
pub const ERROR_CODE_HOSTNAME_RESOLUTION_FAILURE: i64 = -32002;

/// The request has authentication problems.
pub const ERROR_CODE_AUTHENTICATION_FAILURE: i64 = -32003;

pub const ERROR_CODE_METHOD_NOT_FOUND: i64 = -32601;
pub const ERROR_CODE_INVALID_PARAMS: i64 = -32602;
pub const ERROR_CODE_INTERNAL_ERROR: i64 = -32603;

/// The program could not talk to the network nodes.
pub const ERROR_CODE_NODE_COMMUNICATION_FAILED: i64 = 1000;

/// The network rejected the transaction for an unknown reason.
pub const ERROR_CODE_NETWORK_REJECTED_TRANSACTION: i64 = 1001;
pub const ERROR_CODE_NETWORK_REJECTED_INVALID_TRANSACTION: i64 = 1051;
pub const ERROR_CODE_NETWORK_REJECTED_MALFORMED_TRANSACTION: i64 = 1060;
pub const ERROR_CODE_NETWORK_COULD_NOT_PROCESS_TRANSACTION: i64 = 1070;
pub const ERROR_CODE_NETWORK_REJECTED_UNSUPPORTED_TRANSACTION: i64 = 1080;
pub const ERROR_CODE_NETWORK_SPAM_PROTECTION_ACTIVATED: i64 = 1089;

/// The third-party application asked for something it is not permitted to
/// do under the permissions system.
pub const ERROR_CODE_REQUEST_NOT_PERMITTED: i64 = 2000;

/// The application core cancelled the request because requirements for
/// handling it correctly were missing.
pub const ERROR_CODE_REQUEST_CANCELLED_BY_APPLICATION: i64 = 2001;

/// The user interrupted the service.
pub const ERROR_CODE_CONNECTION_CLOSED: i64 = 3000;

/// The user explicitly rejected the request. The third-party application
/// should consider the user has withdrawn from the action and abandon it.
pub const ERROR_CODE_REQUEST_REJECTED: i64 = 3001;

/// The user cancelled the request without deciding. Contrary to a
/// rejection, the third-party application should back off, keep its
/// state, and wait for the user to be ready.
pub const ERROR_CODE_REQUEST_CANCELLED_BY_USER: i64 = 3002;

/// Structured error returned by every JSON-RPC method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}: {data}")]
pub struct RpcError {
    pub code: i64,
    pub message: &'static str,
    pub data: String,
}

impl RpcError {
    fn new(code: i64, message: &'static str, data: impl ToString) -> Self {
        Self {
            code,
            message,
            data: data.to_string(),
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            ERROR_CODE_METHOD_NOT_FOUND,
            "Method not found",
            format!("the method {method:?} does not exist"),
        )
    }

    pub fn invalid_params(err: impl ToString) -> Self {
        Self::new(ERROR_CODE_INVALID_PARAMS, "Invalid params", err)
    }

    pub fn internal(err: impl ToString) -> Self {
        Self::new(ERROR_CODE_INTERNAL_ERROR, "Internal error", err)
    }

    pub fn application(code: i64, err: impl ToString) -> Self {
        debug_assert!(code > -32000, "application error codes are above -32000");
        Self::new(code, "Application error", err)
    }

    pub fn user(code: i64, err: impl ToString) -> Self {
        debug_assert!(code > -32000, "user error codes are above -32000");
        Self::new(code, "User error", err)
    }

    pub fn network(code: i64, err: impl ToString) -> Self {
        Self::new(code, "Network error", err)
    }

    pub fn server(code: i64, err: impl ToString) -> Self {
        Self::new(code, "Server error", err)
    }

    pub fn request_interrupted() -> Self {
        Self::server(
            ERROR_CODE_REQUEST_INTERRUPTED,
            "the request has been interrupted",
        )
    }

    pub fn hostname_resolution_failure(err: impl ToString) -> Self {
        Self::server(ERROR_CODE_HOSTNAME_RESOLUTION_FAILURE, err)
    }

    pub fn authentication_failure(err: impl ToString) -> Self {
        Self::server(ERROR_CODE_AUTHENTICATION_FAILURE, err)
    }

    pub fn connection_closed() -> Self {
        Self::user(
            ERROR_CODE_CONNECTION_CLOSED,
            "the connection has been closed",
        )
    }

    pub fn user_rejection(err: impl ToString) -> Self {
        Self::user(ERROR_CODE_REQUEST_REJECTED, err)
    }

    pub fn user_cancellation() -> Self {
        Self::user(
            ERROR_CODE_REQUEST_CANCELLED_BY_USER,
            "the user cancelled the request",
        )
    }

    pub fn request_not_permitted(err: impl ToString) -> Self {
        Self::application(ERROR_CODE_REQUEST_NOT_PERMITTED, err)
    }

    pub fn application_cancellation(err: impl ToString) -> Self {
        Self::application(ERROR_CODE_REQUEST_CANCELLED_BY_APPLICATION, err)
    }

    pub fn node_communication(err: impl ToString) -> Self {
        Self::network(ERROR_CODE_NODE_COMMUNICATION_FAILED, err)
    }

    /// Builds a network error with a generic message but a specialized
    /// code, so the third-party application gets a coarse-grained
    /// indication without leaking node error details.
    pub fn from_transaction_error(err: &TransactionError) -> Self {
        match err.abci_code {
            Some(51) => Self::network(
                ERROR_CODE_NETWORK_REJECTED_INVALID_TRANSACTION,
                format!("the network rejected the transaction because it's invalid: {err}"),
            ),
            Some(60) => Self::network(
                ERROR_CODE_NETWORK_REJECTED_MALFORMED_TRANSACTION,
                format!("the network rejected the transaction because it's malformed: {err}"),
            ),
            Some(70) => Self::network(
                ERROR_CODE_NETWORK_COULD_NOT_PROCESS_TRANSACTION,
                format!("the network could not process the transaction: {err}"),
            ),
            Some(80) => Self::network(
                ERROR_CODE_NETWORK_REJECTED_UNSUPPORTED_TRANSACTION,
                format!("the network does not support this transaction: {err}"),
            ),
            Some(89) => Self::network(
                ERROR_CODE_NETWORK_SPAM_PROTECTION_ACTIVATED,
                format!("the network blocked the transaction through the spam protection: {err}"),
            ),
            Some(_) => Self::network(
                ERROR_CODE_NETWORK_REJECTED_TRANSACTION,
                format!("the transaction failed: {err}"),
            ),
            None => Self::network(
                ERROR_CODE_NODE_COMMUNICATION_FAILED,
                format!("the transaction failed: {err}"),
            ),
        }
    }
}
