// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! dApp Wallet Server - Session-Scoped Wallet Service
//!
//! This crate exposes a JSON-RPC surface to two caller classes: the wallet
//! owner's own tooling, and third-party applications that are granted
//! scoped, revocable access to specific keys through session tokens and a
//! human-in-the-loop review workflow.
//!
//! ## Modules
//!
//! - `api` - JSON-RPC handlers for both caller classes
//! - `session` - Connection tokens, permission projection, session registry
//! - `interaction` - The review protocol between the core and the front-end
//! - `wallet` - Key pairs, permissions, storage contract
//! - `network` - Node contracts and the HTTP node client
//! - `spam` - Anti-spam proof-of-work and per-block budgets
//! - `keylock` - Per-key mutual exclusion for in-flight transactions
//! - `service` - JSON-RPC 2.0 transport over HTTP (Axum)

pub mod api;
pub mod config;
pub mod interaction;
pub mod keylock;
pub mod network;
pub mod service;
pub mod session;
pub mod spam;
pub mod state;
pub mod wallet;
