//! Production environment backed by OS entropy.

use gavel_core::{EntropyError, Environment};

/// Production environment using `getrandom`.
///
/// # Security
///
/// `getrandom` provides OS-level cryptographic randomness, suitable for
/// shared secrets and challenge tokens. A failure is reported, never papered
/// over with predictable bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError> {
        getrandom::fill(buffer).map_err(|e| EntropyError(e.to_string()))
    }
}
