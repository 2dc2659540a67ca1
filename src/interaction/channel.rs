// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Channel-backed [`Interactor`] implementation.
//!
//! The front-end (a desktop app, a console bridge, a test harness) holds
//! the receiving end of an mpsc queue of [`FrontEndEvent`]s. Review events
//! carry a oneshot reply channel; notifications are fire-and-forget and
//! never block. A dropped receiver means the front-end is gone and maps to
//! `ConnectionClosed`; a fired shutdown token maps to `Interrupted`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::{
    ErrorType, InteractionError, Interactor, LogLevel, TransactionPurpose, WorkflowType,
};
use crate::wallet::PermissionsSummary;

/// A review step forwarded to the front-end.
#[derive(Debug)]
pub enum ReviewRequest {
    WalletConnection {
        hostname: String,
    },
    WalletSelection {
        hostname: String,
        available_wallets: Vec<String>,
    },
    Passphrase {
        wallet: String,
        reason: String,
    },
    Permissions {
        hostname: String,
        wallet: String,
        requested: PermissionsSummary,
    },
    Transaction {
        purpose: TransactionPurpose,
        hostname: String,
        wallet: String,
        pub_key: String,
        transaction: String,
        received_at: DateTime<Utc>,
    },
}

/// The front-end's answer to a review step.
#[derive(Debug)]
pub enum ReviewReply {
    Decision(bool),
    Selection(String),
    Passphrase(String),
    /// The user withdrew without deciding.
    Cancelled,
}

/// Everything the core pushes to the front-end.
#[derive(Debug)]
pub enum FrontEndEvent {
    SessionBegan {
        trace_id: String,
        workflow: WorkflowType,
        total_steps: u8,
    },
    SessionEnded {
        trace_id: String,
    },
    Review {
        trace_id: String,
        step: u8,
        request: ReviewRequest,
        reply: oneshot::Sender<ReviewReply>,
    },
    TransactionSucceeded {
        trace_id: String,
        step: u8,
        tx_hash: String,
        transaction: String,
        sent_at: DateTime<Utc>,
        node_host: String,
    },
    TransactionFailed {
        trace_id: String,
        step: u8,
        transaction: String,
        error: String,
        sent_at: DateTime<Utc>,
        node_host: String,
    },
    RequestSucceeded {
        trace_id: String,
        step: u8,
        message: String,
    },
    Error {
        trace_id: String,
        kind: ErrorType,
        message: String,
    },
    Log {
        trace_id: String,
        level: LogLevel,
        message: String,
    },
}

/// Interactor forwarding everything to an mpsc queue.
pub struct ChannelInteractor {
    events: mpsc::Sender<FrontEndEvent>,
    shutdown: CancellationToken,
}

impl ChannelInteractor {
    pub fn new(events: mpsc::Sender<FrontEndEvent>, shutdown: CancellationToken) -> Self {
        Self { events, shutdown }
    }

    /// Sends a review step and awaits its reply, honoring shutdown.
    async fn review(
        &self,
        trace_id: &str,
        step: u8,
        request: ReviewRequest,
    ) -> Result<ReviewReply, InteractionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.events
            .send(FrontEndEvent::Review {
                trace_id: trace_id.to_string(),
                step,
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| InteractionError::ConnectionClosed)?;

        tokio::select! {
            _ = self.shutdown.cancelled() => Err(InteractionError::Interrupted),
            reply = reply_rx => reply.map_err(|_| InteractionError::ConnectionClosed),
        }
    }

    /// Notifications must never block the protocol: a full or closed queue
    /// drops the event.
    fn notify(&self, event: FrontEndEvent) {
        if let Err(e) = self.events.try_send(event) {
            tracing::debug!(error = %e, "Dropped front-end notification");
        }
    }

    fn decision(reply: ReviewReply) -> Result<bool, InteractionError> {
        match reply {
            ReviewReply::Decision(approved) => Ok(approved),
            ReviewReply::Cancelled => Err(InteractionError::Cancelled),
            other => Err(InteractionError::Other(format!(
                "the front-end returned an unexpected reply: {other:?}"
            ))),
        }
    }
}

#[async_trait]
impl Interactor for ChannelInteractor {
    async fn notify_interaction_session_began(
        &self,
        trace_id: &str,
        workflow: WorkflowType,
        total_steps: u8,
    ) -> Result<(), InteractionError> {
        self.events
            .send(FrontEndEvent::SessionBegan {
                trace_id: trace_id.to_string(),
                workflow,
                total_steps,
            })
            .await
            .map_err(|_| InteractionError::ConnectionClosed)
    }

    async fn notify_interaction_session_ended(&self, trace_id: &str) {
        self.notify(FrontEndEvent::SessionEnded {
            trace_id: trace_id.to_string(),
        });
    }

    async fn request_wallet_connection_review(
        &self,
        trace_id: &str,
        step: u8,
        hostname: &str,
    ) -> Result<bool, InteractionError> {
        let reply = self
            .review(
                trace_id,
                step,
                ReviewRequest::WalletConnection {
                    hostname: hostname.to_string(),
                },
            )
            .await?;
        Self::decision(reply)
    }

    async fn request_wallet_selection(
        &self,
        trace_id: &str,
        step: u8,
        hostname: &str,
        available_wallets: &[String],
    ) -> Result<String, InteractionError> {
        let reply = self
            .review(
                trace_id,
                step,
                ReviewRequest::WalletSelection {
                    hostname: hostname.to_string(),
                    available_wallets: available_wallets.to_vec(),
                },
            )
            .await?;
        match reply {
            ReviewReply::Selection(wallet) => Ok(wallet),
            ReviewReply::Cancelled => Err(InteractionError::Cancelled),
            other => Err(InteractionError::Other(format!(
                "the front-end returned an unexpected reply: {other:?}"
            ))),
        }
    }

    async fn request_passphrase(
        &self,
        trace_id: &str,
        step: u8,
        wallet: &str,
        reason: &str,
    ) -> Result<String, InteractionError> {
        let reply = self
            .review(
                trace_id,
                step,
                ReviewRequest::Passphrase {
                    wallet: wallet.to_string(),
                    reason: reason.to_string(),
                },
            )
            .await?;
        match reply {
            ReviewReply::Passphrase(passphrase) => Ok(passphrase),
            ReviewReply::Cancelled => Err(InteractionError::Cancelled),
            other => Err(InteractionError::Other(format!(
                "the front-end returned an unexpected reply: {other:?}"
            ))),
        }
    }

    async fn request_permissions_review(
        &self,
        trace_id: &str,
        step: u8,
        hostname: &str,
        wallet: &str,
        requested: &PermissionsSummary,
    ) -> Result<bool, InteractionError> {
        let reply = self
            .review(
                trace_id,
                step,
                ReviewRequest::Permissions {
                    hostname: hostname.to_string(),
                    wallet: wallet.to_string(),
                    requested: requested.clone(),
                },
            )
            .await?;
        Self::decision(reply)
    }

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
    ) -> Result<bool, InteractionError> {
        let reply = self
            .review(
                trace_id,
                step,
                ReviewRequest::Transaction {
                    purpose,
                    hostname: hostname.to_string(),
                    wallet: wallet.to_string(),
                    pub_key: pub_key.to_string(),
                    transaction: transaction.to_string(),
                    received_at,
                },
            )
            .await?;
        Self::decision(reply)
    }

    async fn notify_successful_request(&self, trace_id: &str, step: u8, message: &str) {
        self.notify(FrontEndEvent::RequestSucceeded {
            trace_id: trace_id.to_string(),
            step,
            message: message.to_string(),
        });
    }

    async fn notify_successful_transaction(
        &self,
        trace_id: &str,
        step: u8,
        tx_hash: &str,
        transaction: &str,
        sent_at: DateTime<Utc>,
        node_host: &str,
    ) {
        self.notify(FrontEndEvent::TransactionSucceeded {
            trace_id: trace_id.to_string(),
            step,
            tx_hash: tx_hash.to_string(),
            transaction: transaction.to_string(),
            sent_at,
            node_host: node_host.to_string(),
        });
    }

    async fn notify_failed_transaction(
        &self,
        trace_id: &str,
        step: u8,
        transaction: &str,
        error: &str,
        sent_at: DateTime<Utc>,
        node_host: &str,
    ) {
        self.notify(FrontEndEvent::TransactionFailed {
            trace_id: trace_id.to_string(),
            step,
            transaction: transaction.to_string(),
            error: error.to_string(),
            sent_at,
            node_host: node_host.to_string(),
        });
    }

    async fn notify_error(&self, trace_id: &str, kind: ErrorType, error: &str) {
        self.notify(FrontEndEvent::Error {
            trace_id: trace_id.to_string(),
            kind,
            message: error.to_string(),
        });
    }

    async fn log(&self, trace_id: &str, level: LogLevel, message: &str) {
        self.notify(FrontEndEvent::Log {
            trace_id: trace_id.to_string(),
            level,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn review_round_trips_a_decision() {
        let (tx, mut rx) = mpsc::channel(8);
        let interactor = ChannelInteractor::new(tx, CancellationToken::new());

        let front_end = tokio::spawn(async move {
            match rx.recv().await {
                Some(FrontEndEvent::Review { step, reply, .. }) => {
                    assert_eq!(step, 1);
                    reply.send(ReviewReply::Decision(true)).unwrap();
                }
                other => panic!("unexpected event: {other:?}"),
            }
        });

        let approved = interactor
            .request_wallet_connection_review("t1", 1, "dapp.example")
            .await
            .unwrap();
        assert!(approved);
        front_end.await.unwrap();
    }

    #[tokio::test]
    async fn dropped_front_end_is_connection_closed() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let interactor = ChannelInteractor::new(tx, CancellationToken::new());

        let err = interactor
            .request_wallet_connection_review("t1", 1, "dapp.example")
            .await
            .unwrap_err();
        assert_eq!(err, InteractionError::ConnectionClosed);
    }

    #[tokio::test]
    async fn dropped_reply_channel_is_connection_closed() {
        let (tx, mut rx) = mpsc::channel(8);
        let interactor = ChannelInteractor::new(tx, CancellationToken::new());

        tokio::spawn(async move {
            if let Some(FrontEndEvent::Review { reply, .. }) = rx.recv().await {
                drop(reply);
            }
        });

        let err = interactor
            .request_passphrase("t1", 1, "w1", "unlock")
            .await
            .unwrap_err();
        assert_eq!(err, InteractionError::ConnectionClosed);
    }

    #[tokio::test]
    async fn shutdown_interrupts_a_pending_review() {
        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let interactor = ChannelInteractor::new(tx, shutdown.clone());

        tokio::spawn(async move {
            // Take the event but never answer; the reply sender is kept
            // alive until after the shutdown fires.
            let event = rx.recv().await;
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            drop(event);
        });

        let review = interactor.request_wallet_connection_review("t1", 1, "dapp.example");
        shutdown.cancel();
        assert_eq!(review.await.unwrap_err(), InteractionError::Interrupted);
    }

    #[tokio::test]
    async fn cancellation_reply_maps_to_cancelled() {
        let (tx, mut rx) = mpsc::channel(8);
        let interactor = ChannelInteractor::new(tx, CancellationToken::new());

        tokio::spawn(async move {
            if let Some(FrontEndEvent::Review { reply, .. }) = rx.recv().await {
                reply.send(ReviewReply::Cancelled).unwrap();
            }
        });

        let err = interactor
            .request_wallet_connection_review("t1", 1, "dapp.example")
            .await
            .unwrap_err();
        assert_eq!(err, InteractionError::Cancelled);
    }
}
