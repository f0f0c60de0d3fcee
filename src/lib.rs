// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! MetaFarm Auth Server - Wallet Challenge/Session Authentication
//!
//! Proves control of an EVM address by having the wallet sign a
//! server-issued, single-use challenge, then hands out bearer sessions.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Challenge issuance, signature recovery, login protocol, sessions
//! - `config` - Environment configuration
//! - `storage` - Identity/session/audit stores (redb or in-memory)

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
