//! State token generation
//!
//! The random source is passed into the state store explicitly so tests can swap
//! in a deterministic one.

use base64::{engine::general_purpose, Engine as _};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::sync::Mutex;

/// Random bytes per state token (192 bits of entropy, 32 URL-safe characters)
pub const STATE_TOKEN_BYTES: usize = 24;

/// Source of opaque, URL-safe state tokens
pub trait TokenSource: Send + Sync {
    fn next_token(&self) -> String;
}

fn encode(bytes: &[u8]) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Production source backed by the thread-local CSPRNG, seeded from the OS
#[derive(Debug, Default, Clone, Copy)]
pub struct OsTokenSource;

impl TokenSource for OsTokenSource {
    fn next_token(&self) -> String {
        let mut bytes = [0u8; STATE_TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        encode(&bytes)
    }
}

/// Deterministic source for tests: same seed, same token sequence
#[derive(Debug)]
pub struct SeededTokenSource {
    rng: Mutex<StdRng>,
}

impl SeededTokenSource {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl TokenSource for SeededTokenSource {
    fn next_token(&self) -> String {
        let mut bytes = [0u8; STATE_TOKEN_BYTES];
        match self.rng.lock() {
            Ok(mut rng) => rng.fill_bytes(&mut bytes),
            Err(poisoned) => poisoned.into_inner().fill_bytes(&mut bytes),
        }
        encode(&bytes)
    }
}

/// True if `token` has the shape produced by the sources above
#[must_use]
pub fn is_well_formed(token: &str) -> bool {
    token.len() >= 22
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
