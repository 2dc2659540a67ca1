// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session-scoped handlers for third-party applications.
//!
//! Every handler follows the same shape: validate the input, resolve the
//! session token, check permissions, run the interactive review when the
//! connection requires one, act, notify. Exactly one terminal outcome is
//! reached per invocation and the interaction session is closed on every
//! path.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::interaction::{
    handle_request_flow_error, ErrorType, InteractionError, InteractionSession, Interactor,
    LogLevel, TransactionPurpose, WorkflowType,
};
use crate::keylock::KeyLocker;
use crate::network::{NodeSelector, SendingMode};
use crate::session::{ConnectedWallet, SessionRegistry, Token};
use crate::spam::SpamHandler;
use crate::wallet::store::{StoreError, WalletStore};
use crate::wallet::{Permissions, PermissionsSummary, Signature};

use super::error::{self, RpcError};
use super::{decode_transaction, prepare_transaction, RequestContext};

#[derive(Debug, Serialize)]
pub struct ConnectWalletResult {
    pub token: Token,
}

#[derive(Debug, Deserialize)]
pub struct DisconnectWalletParams {
    pub token: Token,
}

#[derive(Debug, Deserialize)]
pub struct GetPermissionsParams {
    pub token: Token,
}

#[derive(Debug, Serialize)]
pub struct GetPermissionsResult {
    pub permissions: PermissionsSummary,
}

#[derive(Debug, Deserialize)]
pub struct ListKeysParams {
    pub token: Token,
}

#[derive(Debug, Serialize)]
pub struct NamedKey {
    pub name: String,
    pub public_key: String,
}

#[derive(Debug, Serialize)]
pub struct ListKeysResult {
    pub keys: Vec<NamedKey>,
}

#[derive(Debug, Deserialize)]
pub struct RequestPermissionsParams {
    pub token: Token,
    pub requested_permissions: PermissionsSummary,
}

#[derive(Debug, Serialize)]
pub struct RequestPermissionsResult {
    pub permissions: PermissionsSummary,
}

#[derive(Debug, Deserialize)]
pub struct SignTransactionParams {
    pub token: Token,
    pub public_key: String,
    pub transaction: String,
}

#[derive(Debug, Serialize)]
pub struct SignTransactionResult {
    pub signature: Signature,
    pub signed_transaction: String,
}

#[derive(Debug, Deserialize)]
pub struct SendTransactionParams {
    pub token: Token,
    pub public_key: String,
    pub sending_mode: SendingMode,
    pub transaction: String,
}

#[derive(Debug, Serialize)]
pub struct SendTransactionResult {
    pub transaction_hash: String,
    pub node_host: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CheckTransactionParams {
    pub token: Token,
    pub public_key: String,
    pub transaction: String,
}

#[derive(Debug, Serialize)]
pub struct CheckTransactionResult {
    pub valid: bool,
}

/// The third-party application API.
pub struct ClientApi {
    store: Arc<dyn WalletStore>,
    registry: Arc<SessionRegistry>,
    interactor: Arc<dyn Interactor>,
    node_selector: Arc<dyn NodeSelector>,
    spam: Arc<dyn SpamHandler>,
    key_locker: KeyLocker,
}

impl ClientApi {
    pub fn new(
        store: Arc<dyn WalletStore>,
        registry: Arc<SessionRegistry>,
        interactor: Arc<dyn Interactor>,
        node_selector: Arc<dyn NodeSelector>,
        spam: Arc<dyn SpamHandler>,
        key_locker: KeyLocker,
    ) -> Self {
        Self {
            store,
            registry,
            interactor,
            node_selector,
            spam,
            key_locker,
        }
    }

    /// Connects the calling hostname to a wallet the user picks, and
    /// returns the fresh session token.
    pub async fn connect_wallet(
        &self,
        ctx: &RequestContext,
    ) -> Result<ConnectWalletResult, RpcError> {
        let wallets = self.store.list_wallets().await;
        if wallets.is_empty() {
            self.interactor
                .notify_error(
                    &ctx.trace_id,
                    ErrorType::ApplicationError,
                    "there is no wallet to connect to",
                )
                .await;
            return Err(RpcError::application_cancellation(
                "there is no wallet to connect to",
            ));
        }

        let mut session = InteractionSession::begin(
            self.interactor.clone(),
            &ctx.trace_id,
            WorkflowType::WalletConnection,
            2,
        )
        .await?;
        let result = self.run_connect_wallet(ctx, &mut session, &wallets).await;
        session.end().await;
        result
    }

    async fn run_connect_wallet(
        &self,
        ctx: &RequestContext,
        session: &mut InteractionSession,
        wallets: &[String],
    ) -> Result<ConnectWalletResult, RpcError> {
        let step = session.next_step();
        let approved = match self
            .interactor
            .request_wallet_connection_review(&ctx.trace_id, step, &ctx.hostname)
            .await
        {
            Ok(approved) => approved,
            Err(e) => return Err(self.flow_error(ctx, e).await),
        };
        if !approved {
            return Err(RpcError::user_rejection(
                "the user rejected the wallet connection",
            ));
        }

        let step = session.next_step();
        let wallet_name = loop {
            self.ensure_not_cancelled(ctx).await?;
            let selected = match self
                .interactor
                .request_wallet_selection(&ctx.trace_id, step, &ctx.hostname, wallets)
                .await
            {
                Ok(selected) => selected,
                Err(e) => return Err(self.flow_error(ctx, e).await),
            };
            if self.store.wallet_exists(&selected).await {
                break selected;
            }
            self.interactor
                .notify_error(&ctx.trace_id, ErrorType::UserError, "the wallet does not exist")
                .await;
        };

        if !self.store.is_wallet_unlocked(&wallet_name).await {
            self.unlock_with_retries(ctx, step, &wallet_name, "unlock the wallet to connect")
                .await?;
        }

        let wallet = match self.store.get_wallet(&wallet_name).await {
            Ok(wallet) => wallet,
            Err(e) => return Err(self.internal_with_notification(ctx, e).await),
        };
        let token = match self.registry.connect(&ctx.hostname, wallet) {
            Ok(token) => token,
            Err(e) => return Err(self.internal_with_notification(ctx, e).await),
        };

        self.interactor
            .notify_successful_request(&ctx.trace_id, step, "the connection has been established")
            .await;
        Ok(ConnectWalletResult { token })
    }

    /// Best-effort: an unknown token is not an error.
    pub async fn disconnect_wallet(&self, params: DisconnectWalletParams) -> Result<(), RpcError> {
        self.registry.disconnect(&params.token);
        Ok(())
    }

    pub async fn get_permissions(
        &self,
        params: GetPermissionsParams,
    ) -> Result<GetPermissionsResult, RpcError> {
        let connection = self.resolve(&params.token)?;
        let connected = connection.lock().await;
        Ok(GetPermissionsResult {
            permissions: connected.permissions().summary(),
        })
    }

    pub async fn list_keys(&self, params: ListKeysParams) -> Result<ListKeysResult, RpcError> {
        let connection = self.resolve(&params.token)?;
        let connected = connection.lock().await;
        if connected.requires_interaction() && !connected.permissions().public_keys.has_access() {
            return Err(RpcError::request_not_permitted(
                "read access on the public keys is required",
            ));
        }
        Ok(ListKeysResult {
            keys: connected
                .allowed_keys()
                .iter()
                .map(|key| NamedKey {
                    name: key.name.clone(),
                    public_key: key.public_key.clone(),
                })
                .collect(),
        })
    }

    /// Replaces the permissions granted to the calling hostname, after
    /// user review and passphrase confirmation. Updates are full
    /// replacements; an omitted capability is a revocation.
    pub async fn request_permissions(
        &self,
        ctx: &RequestContext,
        params: RequestPermissionsParams,
    ) -> Result<RequestPermissionsResult, RpcError> {
        let requested =
            Permissions::parse_summary(&params.requested_permissions).map_err(RpcError::invalid_params)?;

        let connection = self.resolve(&params.token)?;
        let mut connected = connection.lock().await;
        if !connected.requires_interaction() {
            return Err(RpcError::request_not_permitted(
                "this connection does not allow updating the permissions",
            ));
        }

        let mut session = InteractionSession::begin(
            self.interactor.clone(),
            &ctx.trace_id,
            WorkflowType::Permissions,
            2,
        )
        .await?;
        let result = self
            .run_request_permissions(ctx, &mut session, &mut connected, requested)
            .await;
        session.end().await;
        result
    }

    async fn run_request_permissions(
        &self,
        ctx: &RequestContext,
        session: &mut InteractionSession,
        connected: &mut ConnectedWallet,
        requested: Permissions,
    ) -> Result<RequestPermissionsResult, RpcError> {
        let hostname = connected.hostname().unwrap_or_default().to_string();
        let wallet_name = connected.name().to_string();

        let step = session.next_step();
        let approved = match self
            .interactor
            .request_permissions_review(
                &ctx.trace_id,
                step,
                &hostname,
                &wallet_name,
                &requested.summary(),
            )
            .await
        {
            Ok(approved) => approved,
            Err(e) => return Err(self.flow_error(ctx, e).await),
        };
        if !approved {
            return Err(RpcError::user_rejection(
                "the user rejected the request to update the permissions",
            ));
        }

        let step = session.next_step();
        self.unlock_with_retries(ctx, step, &wallet_name, "confirm the permission update")
            .await?;

        let previous = connected.permissions();
        if let Err(e) = connected.update_permissions(requested.clone()) {
            return Err(self.internal_with_notification(ctx, e).await);
        }

        // Persist against a fresh copy so changes saved out-of-band since
        // the connection opened are not overwritten.
        let mut fresh = match self.store.get_wallet(&wallet_name).await {
            Ok(wallet) => wallet,
            Err(e) => {
                connected.rollback_permissions(previous);
                return Err(self.internal_with_notification(ctx, e).await);
            }
        };
        fresh.update_permissions(&hostname, requested.clone());
        if let Err(e) = self.store.save_wallet(&fresh).await {
            connected.rollback_permissions(previous);
            return Err(self.internal_with_notification(ctx, e).await);
        }
        if let Err(e) = connected.reload_with_wallet(fresh) {
            return Err(self.internal_with_notification(ctx, e).await);
        }

        self.interactor
            .notify_successful_request(&ctx.trace_id, step, "the permissions have been updated")
            .await;
        Ok(RequestPermissionsResult {
            permissions: requested.summary(),
        })
    }

    pub async fn sign_transaction(
        &self,
        ctx: &RequestContext,
        params: SignTransactionParams,
    ) -> Result<SignTransactionResult, RpcError> {
        let payload = validate_transaction_params(&params.public_key, &params.transaction)?;
        let connection = self.resolve(&params.token)?;
        let connected = connection.lock().await;
        self.authorize_key(&connected, &params.public_key)?;

        if connected.requires_interaction() {
            let mut session = self.begin_transaction_review(ctx).await?;
            let result = self
                .run_sign(ctx, Some(&mut session), &connected, &params, &payload)
                .await;
            session.end().await;
            result
        } else {
            self.run_sign(ctx, None, &connected, &params, &payload).await
        }
    }

    async fn run_sign(
        &self,
        ctx: &RequestContext,
        mut session: Option<&mut InteractionSession>,
        connected: &ConnectedWallet,
        params: &SignTransactionParams,
        payload: &[u8],
    ) -> Result<SignTransactionResult, RpcError> {
        if let Some(session) = session.as_deref_mut() {
            self.review_transaction(
                ctx,
                session,
                connected,
                TransactionPurpose::Signing,
                &params.public_key,
                payload,
            )
            .await?;
        }

        let _guard = self
            .key_locker
            .acquire(&params.public_key)
            .await
            .map_err(RpcError::application_cancellation)?;
        let prepared = match prepare_transaction(
            self.node_selector.as_ref(),
            self.spam.as_ref(),
            connected.wallet(),
            &params.public_key,
            &params.transaction,
            payload,
        )
        .await
        {
            Ok(prepared) => prepared,
            Err(e) => {
                self.notify_failure(ctx, session.is_some(), &e).await;
                return Err(e);
            }
        };

        if let Some(session) = session.as_deref_mut() {
            self.interactor
                .notify_successful_request(
                    &ctx.trace_id,
                    session.step(),
                    "the transaction has been signed",
                )
                .await;
        }
        Ok(SignTransactionResult {
            signature: prepared.signature,
            signed_transaction: prepared.envelope,
        })
    }

    pub async fn send_transaction(
        &self,
        ctx: &RequestContext,
        params: SendTransactionParams,
    ) -> Result<SendTransactionResult, RpcError> {
        let payload = validate_transaction_params(&params.public_key, &params.transaction)?;
        let connection = self.resolve(&params.token)?;
        let connected = connection.lock().await;
        self.authorize_key(&connected, &params.public_key)?;

        if connected.requires_interaction() {
            let mut session = self.begin_transaction_review(ctx).await?;
            let result = self
                .run_send(ctx, Some(&mut session), &connected, &params, &payload)
                .await;
            session.end().await;
            result
        } else {
            self.run_send(ctx, None, &connected, &params, &payload).await
        }
    }

    async fn run_send(
        &self,
        ctx: &RequestContext,
        mut session: Option<&mut InteractionSession>,
        connected: &ConnectedWallet,
        params: &SendTransactionParams,
        payload: &[u8],
    ) -> Result<SendTransactionResult, RpcError> {
        if let Some(session) = session.as_deref_mut() {
            self.review_transaction(
                ctx,
                session,
                connected,
                TransactionPurpose::Sending,
                &params.public_key,
                payload,
            )
            .await?;
        }

        let _guard = self
            .key_locker
            .acquire(&params.public_key)
            .await
            .map_err(RpcError::application_cancellation)?;
        let prepared = match prepare_transaction(
            self.node_selector.as_ref(),
            self.spam.as_ref(),
            connected.wallet(),
            &params.public_key,
            &params.transaction,
            payload,
        )
        .await
        {
            Ok(prepared) => prepared,
            Err(e) => {
                self.notify_failure(ctx, session.is_some(), &e).await;
                return Err(e);
            }
        };

        let sent_at = Utc::now();
        match prepared
            .node
            .send_transaction(&prepared.envelope, params.sending_mode)
            .await
        {
            Ok(transaction_hash) => {
                if let Some(session) = session.as_deref_mut() {
                    self.interactor
                        .notify_successful_transaction(
                            &ctx.trace_id,
                            session.step(),
                            &transaction_hash,
                            &String::from_utf8_lossy(payload),
                            sent_at,
                            prepared.node.host(),
                        )
                        .await;
                }
                Ok(SendTransactionResult {
                    transaction_hash,
                    node_host: prepared.node.host().to_string(),
                    sent_at,
                })
            }
            Err(e) => {
                if let Some(session) = session.as_deref_mut() {
                    self.interactor
                        .notify_failed_transaction(
                            &ctx.trace_id,
                            session.step(),
                            &String::from_utf8_lossy(payload),
                            &e.to_string(),
                            sent_at,
                            prepared.node.host(),
                        )
                        .await;
                }
                Err(RpcError::from_transaction_error(&e))
            }
        }
    }

    pub async fn check_transaction(
        &self,
        ctx: &RequestContext,
        params: CheckTransactionParams,
    ) -> Result<CheckTransactionResult, RpcError> {
        let payload = validate_transaction_params(&params.public_key, &params.transaction)?;
        let connection = self.resolve(&params.token)?;
        let connected = connection.lock().await;
        self.authorize_key(&connected, &params.public_key)?;

        if connected.requires_interaction() {
            let mut session = self.begin_transaction_review(ctx).await?;
            let result = self
                .run_check(ctx, Some(&mut session), &connected, &params, &payload)
                .await;
            session.end().await;
            result
        } else {
            self.run_check(ctx, None, &connected, &params, &payload).await
        }
    }

    async fn run_check(
        &self,
        ctx: &RequestContext,
        mut session: Option<&mut InteractionSession>,
        connected: &ConnectedWallet,
        params: &CheckTransactionParams,
        payload: &[u8],
    ) -> Result<CheckTransactionResult, RpcError> {
        if let Some(session) = session.as_deref_mut() {
            self.review_transaction(
                ctx,
                session,
                connected,
                TransactionPurpose::Checking,
                &params.public_key,
                payload,
            )
            .await?;
        }

        let _guard = self
            .key_locker
            .acquire(&params.public_key)
            .await
            .map_err(RpcError::application_cancellation)?;
        let prepared = match prepare_transaction(
            self.node_selector.as_ref(),
            self.spam.as_ref(),
            connected.wallet(),
            &params.public_key,
            &params.transaction,
            payload,
        )
        .await
        {
            Ok(prepared) => prepared,
            Err(e) => {
                self.notify_failure(ctx, session.is_some(), &e).await;
                return Err(e);
            }
        };

        if let Err(e) = prepared.node.check_transaction(&prepared.envelope).await {
            if let Some(session) = session.as_deref_mut() {
                self.interactor
                    .notify_failed_transaction(
                        &ctx.trace_id,
                        session.step(),
                        &String::from_utf8_lossy(payload),
                        &e.to_string(),
                        Utc::now(),
                        prepared.node.host(),
                    )
                    .await;
            }
            return Err(RpcError::from_transaction_error(&e));
        }
        if let Some(session) = session.as_deref_mut() {
            self.interactor
                .notify_successful_request(
                    &ctx.trace_id,
                    session.step(),
                    "the transaction passed the checks",
                )
                .await;
        }
        Ok(CheckTransactionResult { valid: true })
    }

    fn resolve(
        &self,
        token: &Token,
    ) -> Result<Arc<tokio::sync::Mutex<ConnectedWallet>>, RpcError> {
        self.registry
            .get(token)
            .map_err(RpcError::authentication_failure)
    }

    fn authorize_key(&self, connected: &ConnectedWallet, pub_key: &str) -> Result<(), RpcError> {
        if !connected.can_use_key(pub_key) {
            return Err(RpcError::request_not_permitted(
                "the public key is not allowed to be used",
            ));
        }
        Ok(())
    }

    async fn begin_transaction_review(
        &self,
        ctx: &RequestContext,
    ) -> Result<InteractionSession, RpcError> {
        InteractionSession::begin(
            self.interactor.clone(),
            &ctx.trace_id,
            WorkflowType::TransactionReview,
            1,
        )
        .await
    }

    async fn review_transaction(
        &self,
        ctx: &RequestContext,
        session: &mut InteractionSession,
        connected: &ConnectedWallet,
        purpose: TransactionPurpose,
        pub_key: &str,
        payload: &[u8],
    ) -> Result<(), RpcError> {
        let step = session.next_step();
        let approved = match self
            .interactor
            .request_transaction_review(
                &ctx.trace_id,
                step,
                purpose,
                connected.hostname().unwrap_or_default(),
                connected.name(),
                pub_key,
                &String::from_utf8_lossy(payload),
                Utc::now(),
            )
            .await
        {
            Ok(approved) => approved,
            Err(e) => return Err(self.flow_error(ctx, e).await),
        };
        if !approved {
            return Err(RpcError::user_rejection("the user rejected the transaction"));
        }
        Ok(())
    }

    /// Prompts for the passphrase until the wallet unlocks, the user gives
    /// up, or the caller goes away. Wrong passphrases re-prompt.
    async fn unlock_with_retries(
        &self,
        ctx: &RequestContext,
        step: u8,
        wallet_name: &str,
        reason: &str,
    ) -> Result<(), RpcError> {
        loop {
            self.ensure_not_cancelled(ctx).await?;
            let passphrase = match self
                .interactor
                .request_passphrase(&ctx.trace_id, step, wallet_name, reason)
                .await
            {
                Ok(passphrase) => passphrase,
                Err(e) => return Err(self.flow_error(ctx, e).await),
            };
            match self.store.unlock_wallet(wallet_name, &passphrase).await {
                Ok(()) => {
                    self.interactor
                        .log(
                            &ctx.trace_id,
                            LogLevel::Success,
                            "the wallet has been unlocked",
                        )
                        .await;
                    return Ok(());
                }
                Err(StoreError::WrongPassphrase) => {
                    self.interactor
                        .notify_error(&ctx.trace_id, ErrorType::UserError, "wrong passphrase")
                        .await;
                }
                Err(e) => return Err(self.internal_with_notification(ctx, e).await),
            }
        }
    }

    /// Caller cancellation between retry iterations surfaces as an
    /// interruption, never as a silent hang.
    async fn ensure_not_cancelled(&self, ctx: &RequestContext) -> Result<(), RpcError> {
        if ctx.cancellation.is_cancelled() {
            return Err(self.flow_error(ctx, InteractionError::Interrupted).await);
        }
        Ok(())
    }

    /// Maps a review step's sentinel error to its API outcome. Unmapped
    /// errors are notified as internal and fail the operation.
    async fn flow_error(&self, ctx: &RequestContext, err: InteractionError) -> RpcError {
        match handle_request_flow_error(self.interactor.as_ref(), &ctx.trace_id, &err).await {
            Some(mapped) => mapped,
            None => {
                self.interactor
                    .notify_error(&ctx.trace_id, ErrorType::InternalError, &err.to_string())
                    .await;
                RpcError::internal(err)
            }
        }
    }

    async fn internal_with_notification(
        &self,
        ctx: &RequestContext,
        err: impl std::fmt::Display,
    ) -> RpcError {
        self.interactor
            .notify_error(&ctx.trace_id, ErrorType::InternalError, &err.to_string())
            .await;
        RpcError::internal(err)
    }

    /// Pushes a failure notification matching the error's category, when a
    /// review session is open.
    async fn notify_failure(&self, ctx: &RequestContext, has_session: bool, err: &RpcError) {
        if !has_session {
            return;
        }
        self.interactor
            .notify_error(&ctx.trace_id, failure_kind(err.code), &err.data)
            .await;
    }
}

/// Categories are carved out of the code space, so the front-end
/// classification follows the code, never the display message.
fn failure_kind(code: i64) -> ErrorType {
    match code {
        1000..=1999 => ErrorType::NetworkError,
        2000..=2999 => ErrorType::ApplicationError,
        3000..=3999 => ErrorType::UserError,
        error::ERROR_CODE_REQUEST_INTERRUPTED
        | error::ERROR_CODE_HOSTNAME_RESOLUTION_FAILURE
        | error::ERROR_CODE_AUTHENTICATION_FAILURE => ErrorType::ServerError,
        _ => ErrorType::InternalError,
    }
}

fn validate_transaction_params(public_key: &str, transaction: &str) -> Result<Vec<u8>, RpcError> {
    if public_key.is_empty() {
        return Err(RpcError::invalid_params("the public key is required"));
    }
    decode_transaction(transaction)
}
