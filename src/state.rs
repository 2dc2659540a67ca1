// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api::admin::AdminApi;
use crate::api::client::ClientApi;
use crate::interaction::Interactor;
use crate::keylock::KeyLocker;
use crate::network::NodeSelector;
use crate::session::SessionRegistry;
use crate::spam::{PowSpamHandler, SpamHandler};
use crate::wallet::store::WalletStore;

/// Shared application state: the two API surfaces plus the shutdown
/// token child request cancellations derive from.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<ClientApi>,
    pub admin: Arc<AdminApi>,
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wires both API surfaces over one session registry, one anti-spam
    /// handler and one key locker, so third-party and admin traffic see
    /// the same sessions and contend on the same per-key locks.
    pub fn new(
        store: Arc<dyn WalletStore>,
        interactor: Arc<dyn Interactor>,
        node_selector: Arc<dyn NodeSelector>,
        shutdown: CancellationToken,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let spam: Arc<dyn SpamHandler> = Arc::new(PowSpamHandler::new());
        let key_locker = KeyLocker::default();

        let client = Arc::new(ClientApi::new(
            store.clone(),
            registry.clone(),
            interactor,
            node_selector.clone(),
            spam.clone(),
            key_locker.clone(),
        ));
        let admin = Arc::new(AdminApi::new(
            store,
            registry,
            node_selector,
            spam,
            key_locker,
        ));

        Self {
            client,
            admin,
            shutdown,
        }
    }
}
