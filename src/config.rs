//! Scanner configuration.

use std::path::PathBuf;

use crate::keyspace::{Candidate, KeySource, CANDIDATE_HEX_LEN};

/// How candidate keys are generated. Exactly one mode is active per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMode {
    /// Count upward from a 64-hex-character start key.
    Sequential { start_key: String },
    /// Draw uniformly random keys.
    Random,
    /// Derive keys from a password list, one per line.
    Passwords { path: PathBuf },
}

/// Scanner configuration, assembled from CLI flags.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Key generation mode.
    pub mode: KeyMode,

    /// Number of checker workers.
    pub threads: usize,

    /// JSON-RPC endpoint of the remote node.
    pub rpc_endpoint: String,

    /// Findings file, opened append-only.
    pub found_file: PathBuf,
}

impl ScanConfig {
    /// Validate the configuration. All violations here are fatal startup
    /// errors, reported before any worker starts.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.threads == 0 {
            anyhow::bail!("threads must be at least 1");
        }

        if self.rpc_endpoint.is_empty() {
            anyhow::bail!("an RPC endpoint must be specified");
        }

        if let KeyMode::Sequential { start_key } = &self.mode {
            if start_key.len() != CANDIDATE_HEX_LEN {
                anyhow::bail!(
                    "start key must be {} hex characters (32 bytes), got {}",
                    CANDIDATE_HEX_LEN,
                    start_key.len()
                );
            }
            hex::decode(start_key)
                .map_err(|e| anyhow::anyhow!("start key is not valid hex: {}", e))?;
        }

        Ok(())
    }

    /// Build the key source for the configured mode.
    ///
    /// Reads the password list eagerly so a missing or unreadable file fails
    /// here, before the engine starts.
    pub fn key_source(&self) -> anyhow::Result<KeySource> {
        match &self.mode {
            KeyMode::Sequential { start_key } => {
                let seed = Candidate::from_hex(start_key)?;
                Ok(KeySource::sequential(seed))
            }
            KeyMode::Random => Ok(KeySource::random()),
            KeyMode::Passwords { path } => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("read password list {:?}: {}", path, e))?;
                // Split, don't filter: blank lines are candidates too.
                let passwords = content.split('\n').map(str::to_string).collect();
                Ok(KeySource::passwords(passwords))
            }
        }
    }
}
