// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login audit trail.
//!
//! Every login attempt, successful or not, produces one
//! [`LoginAuditEvent`] carrying the precise internal outcome, even though
//! the HTTP response itself is generic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StoreResult;
use crate::models::{ClientMeta, WalletAddress};

/// An audit log entry for one login attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginAuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the attempt finished.
    pub timestamp: DateTime<Utc>,
    /// Address the attempt claimed.
    pub address: WalletAddress,
    /// User logged in as (successes only).
    pub user_id: Option<u64>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    /// Internal error code for failures.
    pub reason: Option<String>,
}

impl LoginAuditEvent {
    /// Create a new, successful event.
    pub fn new(address: WalletAddress) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            address,
            user_id: None,
            ip_address: None,
            user_agent: None,
            success: true,
            reason: None,
        }
    }

    pub fn with_user(mut self, user_id: u64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_client(mut self, client: &ClientMeta) -> Self {
        self.ip_address = client.ip_address.clone();
        self.user_agent = client.user_agent.clone();
        self
    }

    /// Mark as failed with the internal reason code.
    pub fn failed(mut self, reason: impl Into<String>) -> Self {
        self.success = false;
        self.reason = Some(reason.into());
        self
    }
}

/// Append-only sink for login audit events.
pub trait LoginAuditLog: Send + Sync {
    fn append(&self, event: &LoginAuditEvent) -> StoreResult<()>;

    /// Events for one address, oldest first.
    fn events_for(&self, address: &WalletAddress) -> StoreResult<Vec<LoginAuditEvent>>;
}
