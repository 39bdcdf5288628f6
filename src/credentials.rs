//! Round-robin API key rotation shared by all fetch workers.

use crate::api::{ApiConnector, ApiError};
use crate::util::mask_credential;
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("credential list is empty")]
    Empty,
}

/// Load one key per line; blank lines are ignored.
/// A missing file or a file without keys is fatal.
pub fn load_credentials(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        bail!("credential file not found: {}", path.display());
    }
    let keys = crate::lines::read_trimmed_lines(path)
        .with_context(|| format!("read {}", path.display()))?;
    if keys.is_empty() {
        bail!("credential file {} holds no keys", path.display());
    }
    tracing::info!("Loaded {} API keys.", keys.len());
    Ok(keys)
}

/// Hands out clients bound to credentials in round-robin order.
///
/// The cursor is a single atomic counter: each `next_client()` claims one slot
/// with `fetch_add`, so concurrent workers never observe the same position.
/// Rotation is blind; a key that just failed comes round again once the
/// others have been used.
pub struct CredentialPool<C: ApiConnector> {
    keys: Vec<String>,
    cursor: AtomicUsize,
    connector: C,
}

impl<C: ApiConnector> CredentialPool<C> {
    pub fn new(keys: Vec<String>, connector: C) -> Result<Self, PoolError> {
        if keys.is_empty() {
            return Err(PoolError::Empty);
        }
        Ok(Self { keys, cursor: AtomicUsize::new(0), connector })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Claim the next credential in rotation.
    pub fn next_credential(&self) -> &str {
        let slot = self.cursor.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        &self.keys[slot]
    }

    /// A ready-to-use client bound to the next credential.
    pub fn next_client(&self) -> Result<C::Client, ApiError> {
        let key = self.next_credential();
        tracing::info!("Using API key {}", mask_credential(key));
        self.connector.connect(key)
    }
}
