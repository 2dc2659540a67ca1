// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The interactive-review protocol between the core and the wallet
//! front-end.
//!
//! Sensitive operations route their review steps through an [`Interactor`]:
//! a session-scoped, numbered workflow opened with
//! `notify_interaction_session_began` and closed exactly once with
//! `notify_interaction_session_ended`, on every exit path. Review steps
//! either return a business outcome (approved, a selected wallet, a
//! passphrase) or fail with one of the [`InteractionError`] variants, which
//! [`handle_request_flow_error`] translates into API error categories.

pub mod channel;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::error::RpcError;
use crate::wallet::PermissionsSummary;

/// Named workflows, giving the front-end a stable identifier for the kind
/// of review being opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    WalletConnection,
    WalletUnlocking,
    Permissions,
    TransactionReview,
}

/// What a transaction review will lead to if approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionPurpose {
    Signing,
    Sending,
    Checking,
}

/// Classification attached to error notifications pushed to the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    ApplicationError,
    UserError,
    NetworkError,
    ServerError,
    InternalError,
}

/// Severity of log lines forwarded to the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
}

/// Sentinel outcomes of a review step, as tagged variants instead of
/// error-equality chains, so the decision table below stays exhaustive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InteractionError {
    /// The user closed the connection with the front-end. There is no one
    /// left to notify.
    #[error("the user closed the connection")]
    ConnectionClosed,

    /// The request was interrupted: the caller's context was cancelled or
    /// timed out while awaiting a human response.
    #[error("the request has been interrupted")]
    Interrupted,

    /// The user withdrew without deciding. Distinct from a rejection: the
    /// third-party application should back off and may retry later.
    #[error("the user cancelled the request")]
    Cancelled,

    /// Anything else. Never swallowed: the calling pipeline notifies an
    /// internal error and fails the operation.
    #[error("{0}")]
    Other(String),
}

/// The review and notification surface the core calls on the front-end
/// adapter. Review steps carry a 1-based step index bounded by the
/// `total_steps` declared when the session began, giving the front-end a
/// deterministic progress indicator.
#[async_trait]
pub trait Interactor: Send + Sync {
    /// Must be called once before any step-numbered request. An error
    /// means the front-end refused to open a session; the operation must
    /// abort without side effects.
    async fn notify_interaction_session_began(
        &self,
        trace_id: &str,
        workflow: WorkflowType,
        total_steps: u8,
    ) -> Result<(), InteractionError>;

    /// Must be called exactly once per session, on every exit path.
    async fn notify_interaction_session_ended(&self, trace_id: &str);

    async fn request_wallet_connection_review(
        &self,
        trace_id: &str,
        step: u8,
        hostname: &str,
    ) -> Result<bool, InteractionError>;

    /// Asks the user to pick one of the available wallets. The returned
    /// name is not guaranteed to exist; the caller re-prompts when it does
    /// not.
    async fn request_wallet_selection(
        &self,
        trace_id: &str,
        step: u8,
        hostname: &str,
        available_wallets: &[String],
    ) -> Result<String, InteractionError>;

    async fn request_passphrase(
        &self,
        trace_id: &str,
        step: u8,
        wallet: &str,
        reason: &str,
    ) -> Result<String, InteractionError>;

    async fn request_permissions_review(
        &self,
        trace_id: &str,
        step: u8,
        hostname: &str,
        wallet: &str,
        requested: &PermissionsSummary,
    ) -> Result<bool, InteractionError>;

    #[allow(clippy::too_many_arguments)]
    async fn request_transaction_review(
        &self,
        trace_id: &str,
        step: u8,
        purpose: TransactionPurpose,
        hostname: &str,
        wallet: &str,
        pub_key: &str,
        transaction: &str,
        received_at: DateTime<Utc>,
    ) -> Result<bool, InteractionError>;

    /// Fire-and-forget. Never blocks the protocol, never fails the
    /// operation.
    async fn notify_successful_request(&self, trace_id: &str, step: u8, message: &str);

    #[allow(clippy::too_many_arguments)]
    async fn notify_successful_transaction(
        &self,
        trace_id: &str,
        step: u8,
        tx_hash: &str,
        transaction: &str,
        sent_at: DateTime<Utc>,
        node_host: &str,
    );

    async fn notify_failed_transaction(
        &self,
        trace_id: &str,
        step: u8,
        transaction: &str,
        error: &str,
        sent_at: DateTime<Utc>,
        node_host: &str,
    );

    async fn notify_error(&self, trace_id: &str, kind: ErrorType, error: &str);

    async fn log(&self, trace_id: &str, level: LogLevel, message: &str);
}

/// Translates a review step's sentinel error into the API error category,
/// in priority order. Returns `None` for unmapped errors: the caller must
/// itself notify an internal error and fail the operation, so unknown
/// errors are never silently swallowed.
pub async fn handle_request_flow_error(
    interactor: &dyn Interactor,
    trace_id: &str,
    err: &InteractionError,
) -> Option<RpcError> {
    match err {
        // The front-end is gone; there is no one to notify.
        InteractionError::ConnectionClosed => Some(RpcError::connection_closed()),
        InteractionError::Interrupted => {
            interactor
                .notify_error(trace_id, ErrorType::ServerError, &err.to_string())
                .await;
            Some(RpcError::request_interrupted())
        }
        InteractionError::Cancelled => {
            // The front-end is told this is terminal, even though the
            // third-party application is invited to retry later.
            interactor
                .notify_error(
                    trace_id,
                    ErrorType::ApplicationError,
                    "the request has been cancelled",
                )
                .await;
            Some(RpcError::user_cancellation())
        }
        InteractionError::Other(_) => None,
    }
}

/// One open, numbered review workflow.
///
/// Handlers open the session once, run their steps through it, and call
/// [`InteractionSession::end`] at their single wrap-up point. A session
/// dropped without `end` (an unwind inside a handler body) still closes
/// on the front-end side: the drop impl emits the ended notification from
/// a detached task.
pub struct InteractionSession {
    interactor: Arc<dyn Interactor>,
    trace_id: String,
    current_step: u8,
    total_steps: u8,
    ended: bool,
}

impl InteractionSession {
    pub async fn begin(
        interactor: Arc<dyn Interactor>,
        trace_id: &str,
        workflow: WorkflowType,
        total_steps: u8,
    ) -> Result<InteractionSession, RpcError> {
        interactor
            .notify_interaction_session_began(trace_id, workflow, total_steps)
            .await
            .map_err(RpcError::request_not_permitted)?;
        Ok(Self {
            interactor,
            trace_id: trace_id.to_string(),
            current_step: 0,
            total_steps,
            ended: false,
        })
    }

    /// Advances to the next 1-based step index.
    pub fn next_step(&mut self) -> u8 {
        debug_assert!(
            self.current_step < self.total_steps,
            "step index exceeds the declared total"
        );
        self.current_step += 1;
        self.current_step
    }

    /// The current step index, for notifications attached to the step that
    /// just ran.
    pub fn step(&self) -> u8 {
        self.current_step
    }

    pub async fn end(mut self) {
        self.ended = true;
        self.interactor
            .notify_interaction_session_ended(&self.trace_id)
            .await;
    }
}

impl Drop for InteractionSession {
    fn drop(&mut self) {
        if self.ended {
            return;
        }
        // Drop cannot await; the notification goes out on a detached task.
        let interactor = self.interactor.clone();
        let trace_id = std::mem::take(&mut self.trace_id);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                interactor.notify_interaction_session_ended(&trace_id).await;
            });
        }
    }
}
