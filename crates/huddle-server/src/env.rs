//! Environment abstraction for time and randomness.
//!
//! The gateway never reaches for the system clock or the OS RNG
//! directly. Everything flows through [`Environment`] so tests can
//! drive the server with deterministic values.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock time and random bytes.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Seconds since the Unix epoch.
    fn wall_clock_secs(&self) -> u64;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Random `u128`, used for room and participant identifiers.
    fn random_u128(&self) -> u128 {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        u128::from_be_bytes(bytes)
    }
}

/// Production environment backed by the OS clock and RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)] // system clock before 1970 is unrecoverable
    fn wall_clock_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_secs()
    }

    #[allow(clippy::expect_used)] // OS RNG failure is unrecoverable
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("OS RNG unavailable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_env_produces_distinct_identifiers() {
        let env = SystemEnv::new();
        assert_ne!(env.random_u128(), env.random_u128());
    }

    #[test]
    fn wall_clock_is_after_2020() {
        assert!(SystemEnv::new().wall_clock_secs() > 1_577_836_800);
    }
}
