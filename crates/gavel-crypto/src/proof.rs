//! Challenge proofs.
//!
//! A proof is the challenge text sealed under a key derived from the
//! account's shared secret:
//!
//! ```text
//! key   = HKDF-SHA256(salt = PROOF_SALT, ikm = secret, info = PROOF_LABEL || username)
//! proof = nonce (24 bytes) || XChaCha20-Poly1305(key, nonce, challenge, aad = username)
//! ```
//!
//! Binding the username into both the key and the associated data means a
//! proof made for one account never opens under another account's secret.

use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;

/// Size of a shared secret in bytes.
pub const SECRET_SIZE: usize = 32;

/// Size of the random nonce prefixed to every proof.
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size.
pub const TAG_SIZE: usize = 16;

const PROOF_SALT: &[u8] = b"gavel challenge salt";
const PROOF_LABEL: &[u8] = b"gavel challenge proof v1";

/// Per-account symmetric secret, provisioned on registration.
///
/// # Security
///
/// - **Debug Redaction**: `Debug` never prints key material.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret([u8; SECRET_SIZE]);

impl SharedSecret {
    /// Wrap 32 random bytes supplied by the caller.
    pub fn from_random(bytes: [u8; SECRET_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a secret read from the key store.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProofError> {
        let array: [u8; SECRET_SIZE] = bytes
            .try_into()
            .map_err(|_| ProofError::InvalidSecretLength { actual: bytes.len() })?;
        Ok(Self(array))
    }

    /// Raw key material.
    pub fn as_bytes(&self) -> &[u8; SECRET_SIZE] {
        &self.0
    }

    fn proof_cipher(&self, username: &str) -> Result<XChaCha20Poly1305, ProofError> {
        let hkdf = Hkdf::<Sha256>::new(Some(PROOF_SALT), &self.0);
        let mut okm = [0u8; 32];
        hkdf.expand_multi_info(&[PROOF_LABEL, username.as_bytes()], &mut okm)
            .map_err(|_| ProofError::KeyDerivation)?;
        Ok(XChaCha20Poly1305::new(Key::from_slice(&okm)))
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// Errors from sealing or opening a proof.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    /// Key material has the wrong length.
    #[error("invalid secret length: expected {SECRET_SIZE}, got {actual}")]
    InvalidSecretLength {
        /// Bytes supplied.
        actual: usize,
    },

    /// Proof is too short to hold a nonce and a tag.
    #[error("malformed proof: {len} bytes")]
    Malformed {
        /// Bytes supplied.
        len: usize,
    },

    /// HKDF expansion failed.
    #[error("key derivation failed")]
    KeyDerivation,

    /// Encryption failed.
    #[error("encryption failed")]
    EncryptionFailed,

    /// Wrong key, wrong account or tampered proof.
    #[error("decryption failed")]
    DecryptionFailed,
}

/// Seal `challenge` for `username`.
///
/// `nonce` must be fresh random bytes from the caller's environment.
pub fn seal_challenge(
    secret: &SharedSecret,
    username: &str,
    challenge: &[u8],
    nonce: [u8; NONCE_SIZE],
) -> Result<Vec<u8>, ProofError> {
    let cipher = secret.proof_cipher(username)?;
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), Payload { msg: challenge, aad: username.as_bytes() })
        .map_err(|_| ProofError::EncryptionFailed)?;

    let mut proof = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    proof.extend_from_slice(&nonce);
    proof.extend_from_slice(&ciphertext);
    Ok(proof)
}

/// Open a proof produced by [`seal_challenge`], returning the challenge bytes.
pub fn open_challenge(
    secret: &SharedSecret,
    username: &str,
    proof: &[u8],
) -> Result<Vec<u8>, ProofError> {
    if proof.len() < NONCE_SIZE + TAG_SIZE {
        return Err(ProofError::Malformed { len: proof.len() });
    }

    let (nonce, ciphertext) = proof.split_at(NONCE_SIZE);
    let cipher = secret.proof_cipher(username)?;
    cipher
        .decrypt(XNonce::from_slice(nonce), Payload { msg: ciphertext, aad: username.as_bytes() })
        .map_err(|_| ProofError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn secret(fill: u8) -> SharedSecret {
        SharedSecret::from_random([fill; SECRET_SIZE])
    }

    #[test]
    fn sealed_challenge_opens_with_same_secret() {
        let proof = seal_challenge(&secret(1), "max", b"Q3x9LmPz0aTu", [7; NONCE_SIZE]).unwrap();
        let opened = open_challenge(&secret(1), "max", &proof).unwrap();
        assert_eq!(opened, b"Q3x9LmPz0aTu");
    }

    #[test]
    fn wrong_secret_fails() {
        let proof = seal_challenge(&secret(1), "max", b"challenge", [7; NONCE_SIZE]).unwrap();
        assert_eq!(open_challenge(&secret(2), "max", &proof), Err(ProofError::DecryptionFailed));
    }

    #[test]
    fn proof_is_bound_to_username() {
        let proof = seal_challenge(&secret(1), "max", b"challenge", [7; NONCE_SIZE]).unwrap();
        assert_eq!(open_challenge(&secret(1), "shaun", &proof), Err(ProofError::DecryptionFailed));
    }

    #[test]
    fn tampered_proof_fails() {
        let mut proof = seal_challenge(&secret(1), "max", b"challenge", [7; NONCE_SIZE]).unwrap();
        let last = proof.len() - 1;
        proof[last] ^= 0x01;
        assert_eq!(open_challenge(&secret(1), "max", &proof), Err(ProofError::DecryptionFailed));
    }

    #[test]
    fn short_proof_is_malformed() {
        assert_eq!(
            open_challenge(&secret(1), "max", &[0; 10]),
            Err(ProofError::Malformed { len: 10 })
        );
    }

    #[test]
    fn secret_length_is_checked() {
        assert_eq!(
            SharedSecret::from_slice(&[0; 8]),
            Err(ProofError::InvalidSecretLength { actual: 8 })
        );
        assert!(SharedSecret::from_slice(&[0; SECRET_SIZE]).is_ok());
    }

    #[test]
    fn secret_debug_is_redacted() {
        assert_eq!(format!("{:?}", secret(0xAB)), "SharedSecret(<redacted>)");
    }

    proptest! {
        #[test]
        fn garbage_never_opens(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
            prop_assert!(open_challenge(&secret(3), "max", &bytes).is_err());
        }
    }
}
