// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use dapp_wallet_server::config::{ServiceConfig, LOG_FORMAT_ENV};
use dapp_wallet_server::interaction::channel::{ChannelInteractor, FrontEndEvent};
use dapp_wallet_server::network::http::HttpNode;
use dapp_wallet_server::network::{Node, RoundRobinSelector};
use dapp_wallet_server::service;
use dapp_wallet_server::state::AppState;
use dapp_wallet_server::wallet::store::InMemoryWalletStore;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();

    // Until a front-end attaches, review events are drained and declined,
    // so interactive client methods fail closed while the admin surface
    // stays available.
    let (events, receiver) = mpsc::channel(64);
    tokio::spawn(drain_front_end_events(receiver));
    let interactor = Arc::new(ChannelInteractor::new(events, shutdown.clone()));

    let nodes: Vec<Arc<dyn Node>> = config
        .node_urls
        .iter()
        .cloned()
        .map(|url| Arc::new(HttpNode::new(url)) as Arc<dyn Node>)
        .collect();
    let state = AppState::new(
        Arc::new(InMemoryWalletStore::new()),
        interactor,
        Arc::new(RoundRobinSelector::new(nodes)),
        shutdown.clone(),
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Failed to parse bind address");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind the server address");

    tracing::info!(%addr, "dApp wallet server listening");
    axum::serve(listener, service::router(state))
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .expect("Server failed");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    match std::env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("json") => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for the shutdown signal");
        return;
    }
    tracing::info!("Shutting down");
    // In-flight review waits observe this and resolve as interruptions.
    shutdown.cancel();
}

async fn drain_front_end_events(mut events: mpsc::Receiver<FrontEndEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            FrontEndEvent::Review {
                trace_id,
                step,
                request,
                reply,
            } => {
                tracing::warn!(
                    %trace_id,
                    step,
                    ?request,
                    "No front-end is attached; declining the review"
                );
                drop(reply);
            }
            other => tracing::debug!(event = ?other, "Front-end event"),
        }
    }
}
