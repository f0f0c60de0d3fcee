// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies for the login endpoints plus the
//! [`WalletAddress`] newtype shared by the protocol and the stores.
//! All HTTP types derive `ToSchema` for the OpenAPI document.
//!
//! ## Wallet Address Type
//!
//! Addresses are folded to lower case the moment they are constructed, so
//! every comparison and storage key downstream is case-insensitive by
//! construction. A checksummed `0xAbC...` and `0xabc...` are the same
//! [`WalletAddress`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// Wallet Address Type
// =============================================================================

/// Ethereum-compatible wallet address in canonical (lower-case) form.
///
/// # Example
///
/// ```rust,ignore
/// let addr = WalletAddress::from("0x742d35Cc6634C0532925a3b844Bc9e7595f4aB12");
/// assert_eq!(addr.as_str(), "0x742d35cc6634c0532925a3b844bc9e7595f4ab12");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(from = "String", into = "String")]
#[schema(value_type = String, example = "0x742d35cc6634c0532925a3b844bc9e7595f4ab12")]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Fold a raw client-supplied address into canonical form.
    pub fn normalize(raw: &str) -> Self {
        WalletAddress(raw.trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `0x` followed by exactly 40 hex digits.
    pub fn is_well_formed(&self) -> bool {
        self.0
            .strip_prefix("0x")
            .map(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
            .unwrap_or(false)
    }

    /// Last eight characters, used for generated usernames.
    pub fn short_suffix(&self) -> &str {
        let start = self.0.len().saturating_sub(8);
        &self.0[start..]
    }
}

impl std::fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WalletAddress {
    fn from(value: String) -> Self {
        WalletAddress::normalize(&value)
    }
}

impl From<&str> for WalletAddress {
    fn from(value: &str) -> Self {
        WalletAddress::normalize(value)
    }
}

impl From<WalletAddress> for String {
    fn from(value: WalletAddress) -> Self {
        value.0
    }
}

// =============================================================================
// Client Metadata
// =============================================================================

/// Request-scoped facts about the caller, recorded on sessions and in the
/// login audit trail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

// =============================================================================
// Login Models
// =============================================================================

/// Request a signing challenge for an address.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginMessageRequest {
    /// Address the client claims to control. Any letter case is accepted.
    #[serde(alias = "wallet_address")]
    pub address: WalletAddress,
}

/// The challenge a wallet must sign.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginMessageResponse {
    /// Exact text to pass to `personal_sign`.
    pub message: String,
    /// Nonce to echo back on `POST /login`.
    pub nonce: String,
    /// When the challenge stops being accepted.
    pub expires_at: DateTime<Utc>,
}

/// Submit a signed challenge.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(alias = "wallet_address")]
    pub address: WalletAddress,
    /// 65-byte `r || s || v` signature, hex encoded, `0x` prefix optional.
    pub signature: String,
    pub nonce: String,
}

/// Successful login.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub user_id: u64,
    pub address: WalletAddress,
    /// Bearer credential; also set as the `session_token` cookie.
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Logout acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LogoutResponse {
    pub ok: bool,
}

/// The session attached to the current request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionInfoResponse {
    pub user_id: u64,
    /// Generated on first login from the address suffix.
    #[schema(example = "user_95f4ab12")]
    pub username: String,
    pub address: WalletAddress,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_address_folds_case_and_whitespace() {
        let addr = WalletAddress::from("  0xABCDEF0123456789abcdef0123456789ABCDEF01 ");
        assert_eq!(addr.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
        assert!(addr.is_well_formed());
    }

    #[test]
    fn wallet_address_shape_check() {
        assert!(!WalletAddress::from("0x1234").is_well_formed());
        assert!(!WalletAddress::from("abcdef0123456789abcdef0123456789abcdef0123").is_well_formed());
        assert!(!WalletAddress::from("0xzzcdef0123456789abcdef0123456789abcdef01").is_well_formed());
    }

    #[test]
    fn wallet_address_deserializes_normalized() {
        let req: LoginMessageRequest =
            serde_json::from_str(r#"{"wallet_address":"0xAbC0000000000000000000000000000000000001"}"#)
                .unwrap();
        assert_eq!(
            req.address.as_str(),
            "0xabc0000000000000000000000000000000000001"
        );
    }

    #[test]
    fn short_suffix_takes_last_eight() {
        let addr = WalletAddress::from("0x00000000000000000000000000000000DEADBEEF");
        assert_eq!(addr.short_suffix(), "deadbeef");
        assert_eq!(WalletAddress::from("0x1").short_suffix(), "0x1");
    }
}
