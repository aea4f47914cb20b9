//! Durable recording of positive findings.
//!
//! Every non-zero balance is appended as one newline-terminated line to a
//! shared findings file. The file handle is opened once (create-if-missing,
//! never truncating) and all writes are serialized behind a mutex, so
//! concurrent workers can never interleave or drop lines. A failed write is
//! unrecoverable: a detected positive result must never be silently lost.

use std::path::Path;

use primitive_types::U256;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// A positive-balance result.
#[derive(Debug, Clone)]
pub struct Finding {
    /// The password the key was derived from, for brain-wallet scans.
    pub password: Option<String>,
    /// Candidate private key, 64 lowercase hex characters.
    pub key_hex: String,
    /// Checksummed account address.
    pub address: String,
    /// Balance in wei.
    pub balance: U256,
}

impl Finding {
    /// Render as a findings-file line: `[password:]key:address:balance`.
    pub fn line(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "{}:{}:{}:{}",
                password, self.key_hex, self.address, self.balance
            ),
            None => format!("{}:{}:{}", self.key_hex, self.address, self.balance),
        }
    }
}

/// Append-only findings log shared by all workers.
pub struct FindingsLog {
    file: Mutex<File>,
}

impl FindingsLog {
    /// Open (or create) the findings file for appending.
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| anyhow::anyhow!("open findings file {:?}: {}", path, e))?;

        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Append one finding and flush it to disk.
    pub async fn record(&self, finding: &Finding) -> anyhow::Result<()> {
        let mut line = finding.line();
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}
