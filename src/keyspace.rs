//! Candidate key enumeration.
//!
//! A [`KeySource`] produces the stream of 256-bit candidate private keys
//! under one of three mutually exclusive modes:
//!
//! - **Sequential**: big-endian increment by one from a seed, never skipping
//!   or repeating a value until the full 2^256 space wraps around
//! - **Random**: uniform draws from OS-seeded entropy, repeats permitted
//! - **Passwords**: one candidate per password via SHA-256, finite
//!
//! The source is single-threaded by construction: only the generator task
//! ever holds it, so the enumeration cursor needs no synchronization.

use rand::{rngs::StdRng, RngCore, SeedableRng};
use sha2::{Digest, Sha256};

/// Canonical text width of a candidate: 32 bytes as lowercase hex.
pub const CANDIDATE_HEX_LEN: usize = 64;

/// A 256-bit candidate private key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate([u8; 32]);

impl Candidate {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a candidate from its 64-hex-character text form.
    pub fn from_hex(text: &str) -> anyhow::Result<Self> {
        if text.len() != CANDIDATE_HEX_LEN {
            anyhow::bail!(
                "candidate key must be {} hex characters (32 bytes), got {}",
                CANDIDATE_HEX_LEN,
                text.len()
            );
        }
        let bytes: [u8; 32] = hex::decode(text)
            .map_err(|e| anyhow::anyhow!("candidate key is not valid hex: {}", e))?
            .try_into()
            .map_err(|_| anyhow::anyhow!("candidate key must be 32 bytes"))?;
        Ok(Self(bytes))
    }

    /// Derive a candidate from a password (brain-wallet convention):
    /// the key is the SHA-256 digest of the password bytes.
    pub fn from_password(password: &str) -> Self {
        let digest = Sha256::digest(password.as_bytes());
        Self(digest.into())
    }

    /// Raw key bytes, big-endian.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Canonical lowercase hex form, always exactly 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The next candidate in big-endian increment order.
    ///
    /// Carries propagate from the least significant byte; incrementing the
    /// all-`ff` key wraps around to all zeros.
    pub fn successor(&self) -> Self {
        let mut bytes = self.0;
        for byte in bytes.iter_mut().rev() {
            let (next, carry) = byte.overflowing_add(1);
            *byte = next;
            if !carry {
                break;
            }
        }
        Self(bytes)
    }
}

/// A generated candidate, tagged with the password it came from (if any).
pub type GeneratedKey = (Option<String>, Candidate);

/// Source of candidate keys.
///
/// Sequential and random sources are infinite; the password source ends when
/// the list is exhausted.
pub enum KeySource {
    /// Big-endian increment from a seed. The seed itself is not emitted;
    /// enumeration starts at its successor.
    Sequential { cursor: Candidate },
    /// Uniform random draws.
    Random { rng: StdRng },
    /// Password-derived keys, in list order, blank entries included.
    Passwords { remaining: std::vec::IntoIter<String> },
}

impl KeySource {
    /// Sequential enumeration starting after `seed`.
    pub fn sequential(seed: Candidate) -> Self {
        Self::Sequential { cursor: seed }
    }

    /// Random enumeration, seeded once from OS entropy. Draws are not
    /// reproducible across runs and may (astronomically rarely) repeat.
    pub fn random() -> Self {
        Self::Random {
            rng: StdRng::from_entropy(),
        }
    }

    /// Password-derived enumeration over the given list, in order, without
    /// deduplication.
    pub fn passwords(list: Vec<String>) -> Self {
        Self::Passwords {
            remaining: list.into_iter(),
        }
    }
}

impl Iterator for KeySource {
    type Item = GeneratedKey;

    fn next(&mut self) -> Option<GeneratedKey> {
        match self {
            KeySource::Sequential { cursor } => {
                *cursor = cursor.successor();
                Some((None, *cursor))
            }
            KeySource::Random { rng } => {
                let mut bytes = [0u8; 32];
                rng.fill_bytes(&mut bytes);
                Some((None, Candidate::from_bytes(bytes)))
            }
            KeySource::Passwords { remaining } => {
                let password = remaining.next()?;
                let candidate = Candidate::from_password(&password);
                Some((Some(password), candidate))
            }
        }
    }
}
