// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `personal_sign` signature verification.
//!
//! Recovers the signer of an EIP-191 prefixed message from a 65-byte
//! `r || s || v` secp256k1 signature and compares the derived address with
//! the claimed one. Pure CPU work: no I/O, no shared state.
//!
//! High-s signatures are accepted and normalised, as go-ethereum's
//! `SigToPub` and most wallets' verifiers do. The `(r, n - s)` twin of a
//! valid signature therefore verifies too; replay is bounded by the
//! single-use nonce, not by rejecting the twin.

use alloy::primitives::{eip191_hash_message, keccak256, Address};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

use crate::models::WalletAddress;

/// `r || s || v`.
pub const SIGNATURE_LEN: usize = 65;

/// Why a signature was rejected. Logged, never returned to clients.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature is not valid hex")]
    Encoding,
    #[error("signature must be {SIGNATURE_LEN} bytes, got {0}")]
    Length(usize),
    #[error("unsupported recovery id {0}")]
    RecoveryId(u8),
    #[error("malformed signature scalars")]
    Malformed,
    #[error("public key recovery failed")]
    Recovery,
    #[error("recovered signer does not match the claimed address")]
    AddressMismatch,
}

/// Stateless verifier for wallet login signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Succeeds iff `signature` over `message` was produced by `address`.
    pub fn verify(
        &self,
        address: &WalletAddress,
        message: &str,
        signature: &str,
    ) -> Result<(), SignatureError> {
        let recovered = self.recover_address(message, signature)?;
        if recovered.as_str() != address.as_str() {
            return Err(SignatureError::AddressMismatch);
        }
        Ok(())
    }

    /// Recover the signer address of a `personal_sign` signature.
    pub fn recover_address(
        &self,
        message: &str,
        signature: &str,
    ) -> Result<WalletAddress, SignatureError> {
        let bytes = decode_signature(signature)?;
        let (signature, recovery_id) = split_signature(&bytes)?;

        let prehash = eip191_hash_message(message.as_bytes());
        let key = VerifyingKey::recover_from_prehash(prehash.as_slice(), &signature, recovery_id)
            .map_err(|_| SignatureError::Recovery)?;

        Ok(address_of(&key))
    }
}

fn decode_signature(signature: &str) -> Result<Vec<u8>, SignatureError> {
    let hex = signature.trim();
    let hex = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .unwrap_or(hex);
    let bytes = alloy::hex::decode(hex).map_err(|_| SignatureError::Encoding)?;
    if bytes.len() != SIGNATURE_LEN {
        return Err(SignatureError::Length(bytes.len()));
    }
    Ok(bytes)
}

/// Split into a low-s signature and a `{0, 1}`-range recovery id.
fn split_signature(bytes: &[u8]) -> Result<(Signature, RecoveryId), SignatureError> {
    let v = bytes[SIGNATURE_LEN - 1];
    let v = match v {
        27 | 28 => v - 27,
        0 | 1 => v,
        other => return Err(SignatureError::RecoveryId(other)),
    };
    let mut recovery_id = RecoveryId::from_byte(v).ok_or(SignatureError::RecoveryId(v))?;

    let mut signature =
        Signature::from_slice(&bytes[..SIGNATURE_LEN - 1]).map_err(|_| SignatureError::Malformed)?;
    // High-s signatures recover the same key once s is negated and y flipped
    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }
    Ok((signature, recovery_id))
}

/// Keccak of the uncompressed point (sans tag byte), last 20 bytes.
pub fn address_of(key: &VerifyingKey) -> WalletAddress {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let address = Address::from_slice(&hash[12..]);
    WalletAddress::from(format!("{address:#x}"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    pub(crate) fn test_key(seed: u8) -> SigningKey {
        SigningKey::from_slice(&[seed; 32]).unwrap()
    }

    /// Sign like a wallet: EIP-191 prefix, 27/28 v byte, 0x hex.
    pub(crate) fn personal_sign(key: &SigningKey, message: &str) -> String {
        let prehash = eip191_hash_message(message.as_bytes());
        let (signature, recovery_id) = key.sign_prehash_recoverable(prehash.as_slice()).unwrap();
        let mut bytes = signature.to_bytes().to_vec();
        bytes.push(recovery_id.to_byte() + 27);
        format!("0x{}", alloy::hex::encode(bytes))
    }

    pub(crate) fn wallet_of(key: &SigningKey) -> WalletAddress {
        address_of(key.verifying_key())
    }

    #[test]
    fn valid_signature_verifies() {
        let key = test_key(7);
        let sig = personal_sign(&key, "hello");
        SignatureVerifier::new()
            .verify(&wallet_of(&key), "hello", &sig)
            .unwrap();
    }

    #[test]
    fn claimed_address_is_case_insensitive() {
        let key = test_key(7);
        let sig = personal_sign(&key, "hello");
        let upper = WalletAddress::from(wallet_of(&key).as_str().to_uppercase());
        assert!(SignatureVerifier::new().verify(&upper, "hello", &sig).is_ok());
    }

    #[test]
    fn wrong_address_or_message_fails() {
        let key = test_key(7);
        let other = test_key(8);
        let sig = personal_sign(&key, "hello");
        let verifier = SignatureVerifier::new();

        assert_eq!(
            verifier.verify(&wallet_of(&other), "hello", &sig),
            Err(SignatureError::AddressMismatch)
        );
        assert!(verifier.verify(&wallet_of(&key), "hello!", &sig).is_err());
    }

    #[test]
    fn any_single_bit_flip_fails() {
        let key = test_key(9);
        let address = wallet_of(&key);
        let sig = personal_sign(&key, "login");
        let bytes = alloy::hex::decode(&sig[2..]).unwrap();
        let verifier = SignatureVerifier::new();

        for byte in 0..SIGNATURE_LEN {
            for bit in 0..8 {
                let mut mutated = bytes.clone();
                mutated[byte] ^= 1 << bit;
                let encoded = alloy::hex::encode(&mutated);
                assert!(
                    verifier.verify(&address, "login", &encoded).is_err(),
                    "flip of byte {byte} bit {bit} still verified"
                );
            }
        }
    }

    #[test]
    fn zero_one_and_27_28_recovery_ids_are_equivalent() {
        let key = test_key(3);
        let sig = personal_sign(&key, "msg");
        let mut bytes = alloy::hex::decode(&sig[2..]).unwrap();
        bytes[64] -= 27;
        let raw = alloy::hex::encode(&bytes);

        let verifier = SignatureVerifier::new();
        assert!(verifier.verify(&wallet_of(&key), "msg", &sig).is_ok());
        assert!(verifier.verify(&wallet_of(&key), "msg", &raw).is_ok());
    }

    #[test]
    fn high_s_twin_recovers_the_same_signer() {
        let key = test_key(4);
        let prehash = eip191_hash_message("msg".as_bytes());
        let (low, recovery_id) = key.sign_prehash_recoverable(prehash.as_slice()).unwrap();
        assert!(low.normalize_s().is_none());

        let high = Signature::from_scalars(low.r(), -low.s()).unwrap();
        let mut bytes = high.to_bytes().to_vec();
        bytes.push((recovery_id.to_byte() ^ 1) + 27);

        let recovered = SignatureVerifier::new()
            .recover_address("msg", &alloy::hex::encode(bytes))
            .unwrap();
        assert_eq!(recovered, wallet_of(&key));
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        let verifier = SignatureVerifier::new();
        let address = wallet_of(&test_key(1));

        assert_eq!(
            verifier.verify(&address, "m", "0xzz"),
            Err(SignatureError::Encoding)
        );
        assert_eq!(
            verifier.verify(&address, "m", &"ab".repeat(64)),
            Err(SignatureError::Length(64))
        );
        let mut bad_v = "11".repeat(64);
        bad_v.push_str("05");
        assert_eq!(
            verifier.verify(&address, "m", &bad_v),
            Err(SignatureError::RecoveryId(5))
        );
        assert_eq!(
            verifier.verify(&address, "m", &"00".repeat(65)),
            Err(SignatureError::Malformed)
        );
    }
}
