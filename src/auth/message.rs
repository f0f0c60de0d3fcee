// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login message rendering.
//!
//! The message a wallet signs is a pure function of the login domain
//! (application name, version, chain id) and the stored challenge
//! (address, nonce, expiry). Issuance and verification both call
//! [`render_login_message`], so the bytes checked at login are exactly the
//! bytes handed out at issuance.
//!
//! ## Formats
//!
//! - [`MessageFormat::TypedData`]: the EIP-712 signing hash of
//!   `Login { wallet, nonce, expires }` under the login domain, as `0x` hex.
//!   Falls back to plain text when the address is not a valid EVM address.
//! - [`MessageFormat::PlainText`]: a human-readable notice with the same
//!   fields in a fixed order.

use std::str::FromStr;

use alloy::{
    primitives::{Address, U256},
    sol,
    sol_types::{Eip712Domain, SolStruct},
};
use chrono::{DateTime, Utc};

use crate::models::WalletAddress;

sol! {
    struct Login {
        address wallet;
        string nonce;
        uint256 expires;
    }
}

/// How login messages are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    TypedData,
    PlainText,
}

/// Fields shared by every login message of this deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginDomain {
    pub app_name: String,
    pub app_version: String,
    pub chain_id: u64,
    pub format: MessageFormat,
}

impl LoginDomain {
    fn eip712_domain(&self) -> Eip712Domain {
        Eip712Domain::new(
            Some(self.app_name.clone().into()),
            Some(self.app_version.clone().into()),
            Some(U256::from(self.chain_id)),
            None,
            None,
        )
    }
}

/// The stored half of a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginChallenge {
    pub address: WalletAddress,
    pub nonce: String,
    /// Whole seconds; sub-second precision is never stored.
    pub expires_at: DateTime<Utc>,
}

/// Render the exact text the wallet must `personal_sign`.
pub fn render_login_message(domain: &LoginDomain, challenge: &LoginChallenge) -> String {
    match domain.format {
        MessageFormat::TypedData => {
            typed_data_message(domain, challenge).unwrap_or_else(|| plain_text_message(domain, challenge))
        }
        MessageFormat::PlainText => plain_text_message(domain, challenge),
    }
}

fn typed_data_message(domain: &LoginDomain, challenge: &LoginChallenge) -> Option<String> {
    let wallet = Address::from_str(challenge.address.as_str()).ok()?;
    let expires = u64::try_from(challenge.expires_at.timestamp()).ok()?;
    let login = Login {
        wallet,
        nonce: challenge.nonce.clone(),
        expires: U256::from(expires),
    };
    let hash = login.eip712_signing_hash(&domain.eip712_domain());
    Some(format!("{hash:#x}"))
}

fn plain_text_message(domain: &LoginDomain, challenge: &LoginChallenge) -> String {
    format!(
        "Welcome to {name}!\n\n\
         Click to sign in to {name} {version}.\n\n\
         This request will not trigger a blockchain transaction or cost any gas fees.\n\n\
         Wallet address:\n{address}\n\n\
         Nonce:\n{nonce}\n\n\
         Expires at:\n{expires}",
        name = domain.app_name,
        version = domain.app_version,
        address = challenge.address,
        nonce = challenge.nonce,
        expires = challenge.expires_at.timestamp(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(format: MessageFormat) -> LoginDomain {
        LoginDomain {
            app_name: "MetaFarm".to_string(),
            app_version: "1.0.0".to_string(),
            chain_id: 137,
            format,
        }
    }

    fn challenge(address: &str) -> LoginChallenge {
        LoginChallenge {
            address: WalletAddress::from(address),
            nonce: "00112233445566778899aabbccddeeff".to_string(),
            expires_at: DateTime::from_timestamp(1_900_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn typed_message_is_deterministic_hex_hash() {
        let c = challenge("0xabcdef0123456789abcdef0123456789abcdef01");
        let a = render_login_message(&domain(MessageFormat::TypedData), &c);
        let b = render_login_message(&domain(MessageFormat::TypedData), &c);
        assert_eq!(a, b);
        assert!(a.starts_with("0x"));
        assert_eq!(a.len(), 66);
    }

    #[test]
    fn typed_message_binds_every_field() {
        let base = challenge("0xabcdef0123456789abcdef0123456789abcdef01");
        let d = domain(MessageFormat::TypedData);
        let reference = render_login_message(&d, &base);

        let mut other_nonce = base.clone();
        other_nonce.nonce = "ff".to_string();
        assert_ne!(render_login_message(&d, &other_nonce), reference);

        let mut other_expiry = base.clone();
        other_expiry.expires_at = DateTime::from_timestamp(1_900_000_001, 0).unwrap();
        assert_ne!(render_login_message(&d, &other_expiry), reference);

        let mut other_chain = d.clone();
        other_chain.chain_id = 1;
        assert_ne!(render_login_message(&other_chain, &base), reference);
    }

    #[test]
    fn malformed_address_falls_back_to_plain_text() {
        let c = challenge("not-an-address");
        let typed = render_login_message(&domain(MessageFormat::TypedData), &c);
        let plain = render_login_message(&domain(MessageFormat::PlainText), &c);
        assert_eq!(typed, plain);
    }

    #[test]
    fn plain_text_embeds_fields_in_order() {
        let c = challenge("0xABCDEF0123456789abcdef0123456789abcdef01");
        let text = render_login_message(&domain(MessageFormat::PlainText), &c);

        let addr = text.find("0xabcdef0123456789abcdef0123456789abcdef01").unwrap();
        let nonce = text.find("00112233445566778899aabbccddeeff").unwrap();
        let expiry = text.find("1900000000").unwrap();
        assert!(text.contains("MetaFarm 1.0.0"));
        assert!(addr < nonce && nonce < expiry);
    }
}
