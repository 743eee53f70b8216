//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples the state machine from the system's
//! entropy source. Secrets and challenge tokens are the only non-deterministic
//! values a replica produces, and all of them come through here:
//!
//! - Deterministic Simulation: a seeded RNG makes challenge tokens and secrets
//!   reproducible, so a failing test can be replayed exactly.
//!
//! - Production Runtime: `getrandom` supplies OS entropy without any change to
//!   the state machine.
//!
//! # Invariants
//!
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

use thiserror::Error;

/// The entropy source could not supply bytes.
#[derive(Debug, Error)]
#[error("entropy source unavailable: {0}")]
pub struct EntropyError(pub String);

/// Symbols a challenge token is drawn from.
pub const TOKEN_ALPHABET: &[u8; 62] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Abstract source of randomness.
///
/// # Safety
///
/// Implementations MUST use cryptographically secure entropy in production:
/// tokens and secrets generated here gate authentication.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    ///
    /// Fails rather than leaving the buffer predictable when no entropy is
    /// available.
    ///
    /// # Invariants
    ///
    /// - Determinism during simulations: Given the same RNG seed, this produces
    ///   the same sequence of bytes
    /// - Unpredictability in production: Uses cryptographically secure RNG
    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError>;

    /// Generates a fixed-size random array.
    fn random_array<const N: usize>(&self) -> Result<[u8; N], EntropyError> {
        let mut bytes = [0u8; N];
        self.random_bytes(&mut bytes)?;
        Ok(bytes)
    }

    /// Generates a random alphanumeric token of `len` characters.
    ///
    /// Uses rejection sampling so every symbol of [`TOKEN_ALPHABET`] is
    /// equally likely.
    fn random_token(&self, len: usize) -> Result<String, EntropyError> {
        // Largest multiple of 62 that fits in a byte.
        const LIMIT: u8 = 248;

        let mut token = String::with_capacity(len);
        let mut chunk = [0u8; 32];
        while token.len() < len {
            self.random_bytes(&mut chunk)?;
            for &byte in chunk.iter().filter(|&&b| b < LIMIT) {
                if token.len() == len {
                    break;
                }
                token.push(char::from(TOKEN_ALPHABET[usize::from(byte % 62)]));
            }
        }
        Ok(token)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    use super::{EntropyError, Environment};

    /// Seeded environment for unit tests.
    #[derive(Clone)]
    pub struct SeededEnv(Arc<Mutex<ChaCha20Rng>>);

    impl SeededEnv {
        pub fn new(seed: u64) -> Self {
            Self(Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))))
        }
    }

    impl Environment for SeededEnv {
        fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError> {
            self.0.lock().unwrap().fill_bytes(buffer);
            Ok(())
        }
    }

    /// Environment whose entropy source is always exhausted.
    #[derive(Clone)]
    pub struct FailingEnv;

    impl Environment for FailingEnv {
        fn random_bytes(&self, _buffer: &mut [u8]) -> Result<(), EntropyError> {
            Err(EntropyError("no entropy".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        testing::{FailingEnv, SeededEnv},
        *,
    };

    #[test]
    fn token_has_requested_length_and_alphabet() {
        let env = SeededEnv::new(7);
        let token = env.random_token(16).unwrap();

        assert_eq!(token.len(), 16);
        assert!(token.bytes().all(|b| TOKEN_ALPHABET.contains(&b)));
    }

    #[test]
    fn same_seed_same_tokens() {
        let a = SeededEnv::new(42);
        let b = SeededEnv::new(42);
        assert_eq!(a.random_token(10).unwrap(), b.random_token(10).unwrap());
    }

    #[test]
    fn successive_tokens_differ() {
        let env = SeededEnv::new(1);
        assert_ne!(env.random_token(16).unwrap(), env.random_token(16).unwrap());
    }

    #[test]
    fn exhausted_source_yields_no_token() {
        assert!(FailingEnv.random_token(16).is_err());
        assert!(FailingEnv.random_array::<32>().is_err());
    }
}
