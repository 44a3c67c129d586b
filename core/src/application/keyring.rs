// Copyright (c) 2026 Warden Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Authority Keyring
//!
//! Holds the governing authority's registered Ed25519 public keys and
//! verifies capability-grant signatures against them. This is a hard
//! security boundary: a grant is authorized only by a genuine
//! asymmetric signature over the domain-separated grant message —
//! never by a derived-hash comparison.
//!
//! Key distribution is an administrative concern outside this core;
//! the keyring only consumes keys it is handed.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::domain::capability::Capability;
use crate::domain::execution::SandboxError;

/// Domain separator binding a signature to its purpose, so a key used
/// elsewhere cannot be replayed as a capability grant.
const GRANT_CONTEXT: &[u8] = b"warden-capability-grant:";

pub struct AuthorityKeyring {
    keys: Vec<VerifyingKey>,
}

impl AuthorityKeyring {
    /// Build a keyring from raw 32-byte Ed25519 public keys.
    pub fn new(public_keys: &[[u8; 32]]) -> anyhow::Result<Self> {
        if public_keys.is_empty() {
            return Err(anyhow::anyhow!("authority keyring must hold at least one key"));
        }
        let keys = public_keys
            .iter()
            .map(VerifyingKey::from_bytes)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("invalid authority public key: {e}"))?;
        Ok(Self { keys })
    }

    pub fn from_keys(keys: Vec<VerifyingKey>) -> anyhow::Result<Self> {
        if keys.is_empty() {
            return Err(anyhow::anyhow!("authority keyring must hold at least one key"));
        }
        Ok(Self { keys })
    }

    /// The exact byte string the authority signs to grant `capability`.
    pub fn grant_message(capability: Capability) -> Vec<u8> {
        let mut message = GRANT_CONTEXT.to_vec();
        message.extend_from_slice(capability.as_str().as_bytes());
        message
    }

    /// Verify a base64 Ed25519 signature over the grant message for
    /// `capability`. Any registered key may authorize.
    pub fn verify_grant(
        &self,
        capability: Capability,
        signature_b64: &str,
    ) -> Result<(), SandboxError> {
        let decoded = STANDARD
            .decode(signature_b64)
            .map_err(|e| SandboxError::InvalidSignature(format!("invalid base64 signature: {e}")))?;
        let sig_bytes: [u8; 64] = decoded.try_into().map_err(|_| {
            SandboxError::InvalidSignature("invalid signature length (must be 64 bytes)".to_string())
        })?;
        let signature = Signature::from_bytes(&sig_bytes);

        let message = Self::grant_message(capability);
        if self
            .keys
            .iter()
            .any(|key| key.verify(&message, &signature).is_ok())
        {
            Ok(())
        } else {
            Err(SandboxError::InvalidSignature(format!(
                "no registered authority key verifies the grant for '{capability}'"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    fn keypair() -> (SigningKey, VerifyingKey) {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        (signing_key, verifying_key)
    }

    fn sign_grant(signing_key: &SigningKey, capability: Capability) -> String {
        let message = AuthorityKeyring::grant_message(capability);
        STANDARD.encode(signing_key.sign(&message).to_bytes())
    }

    #[test]
    fn test_valid_grant_verifies() {
        let (sk, vk) = keypair();
        let keyring = AuthorityKeyring::from_keys(vec![vk]).unwrap();
        let sig = sign_grant(&sk, Capability::Network);
        assert!(keyring.verify_grant(Capability::Network, &sig).is_ok());
    }

    #[test]
    fn test_grant_bound_to_capability_name() {
        let (sk, vk) = keypair();
        let keyring = AuthorityKeyring::from_keys(vec![vk]).unwrap();
        // A signature for `network` must not authorize `filesystem`.
        let sig = sign_grant(&sk, Capability::Network);
        assert!(matches!(
            keyring.verify_grant(Capability::Filesystem, &sig),
            Err(SandboxError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_unregistered_key_is_rejected() {
        let (rogue_sk, _) = keypair();
        let (_, trusted_vk) = keypair();
        let keyring = AuthorityKeyring::from_keys(vec![trusted_vk]).unwrap();
        let sig = sign_grant(&rogue_sk, Capability::Network);
        assert!(keyring.verify_grant(Capability::Network, &sig).is_err());
    }

    #[test]
    fn test_any_registered_key_may_authorize() {
        let (sk_a, vk_a) = keypair();
        let (_, vk_b) = keypair();
        let keyring = AuthorityKeyring::from_keys(vec![vk_b, vk_a]).unwrap();
        let sig = sign_grant(&sk_a, Capability::Process);
        assert!(keyring.verify_grant(Capability::Process, &sig).is_ok());
    }

    #[test]
    fn test_malformed_signature_is_rejected() {
        let (_, vk) = keypair();
        let keyring = AuthorityKeyring::from_keys(vec![vk]).unwrap();
        assert!(keyring
            .verify_grant(Capability::Network, "not-base64!!")
            .is_err());
        assert!(keyring
            .verify_grant(Capability::Network, &STANDARD.encode([0u8; 10]))
            .is_err());
    }

    #[test]
    fn test_empty_keyring_is_rejected() {
        assert!(AuthorityKeyring::new(&[]).is_err());
        assert!(AuthorityKeyring::from_keys(Vec::new()).is_err());
    }
}
