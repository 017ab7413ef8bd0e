/// Durable token persistence
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::{CollectorError, Result};
use crate::types::{Credential, TokenKind};

const REFRESH_TOKEN_FILE: &str = "fyers_refresh_token.txt";
const ACCESS_TOKEN_FILE: &str = "fyers_access_token.txt";

/// Durable key-value persistence of the two secrets.
///
/// Writes replace value and timestamp atomically; the last-write time of the
/// refresh token is the sole source of truth for token age across restarts.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn read(&self, kind: TokenKind) -> Result<Credential>;
    async fn write(&self, kind: TokenKind, value: &str) -> Result<()>;
    /// Age measured against the caller's clock, so one scheduler timestamp
    /// governs a whole reconcile cycle
    async fn age_of(&self, kind: TokenKind, now: DateTime<Utc>) -> Result<Duration>;
}

/// File-backed store: one bare secret blob per token kind.
///
/// Token age derives from the blob's filesystem mtime, so it survives
/// process restarts without any extra bookkeeping.
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        FileTokenStore {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, kind: TokenKind) -> PathBuf {
        match kind {
            TokenKind::Refresh => self.dir.join(REFRESH_TOKEN_FILE),
            TokenKind::Access => self.dir.join(ACCESS_TOKEN_FILE),
        }
    }

    async fn modified_at(&self, kind: TokenKind) -> Result<DateTime<Utc>> {
        let path = self.path_for(kind);
        let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CollectorError::TokenMissing(format!("{} token not found", kind.as_str()))
            } else {
                CollectorError::FileError(e)
            }
        })?;
        let mtime = metadata.modified()?;
        Ok(DateTime::<Utc>::from(mtime))
    }
}

#[async_trait]
impl CredentialStore for FileTokenStore {
    async fn read(&self, kind: TokenKind) -> Result<Credential> {
        let path = self.path_for(kind);
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CollectorError::TokenMissing(format!("{} token not found", kind.as_str()))
            } else {
                CollectorError::FileError(e)
            }
        })?;

        let value = content.trim().to_string();
        if value.is_empty() {
            return Err(CollectorError::TokenMissing(format!(
                "{} token file is empty",
                kind.as_str()
            )));
        }

        let saved_at = self.modified_at(kind).await?;
        Ok(Credential {
            kind,
            value,
            saved_at,
        })
    }

    async fn write(&self, kind: TokenKind, value: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        // Write-then-rename keeps partial writes invisible to readers
        let path = self.path_for(kind);
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!("Persisted {} token to {}", kind.as_str(), path.display());
        Ok(())
    }

    async fn age_of(&self, kind: TokenKind, now: DateTime<Utc>) -> Result<Duration> {
        let saved_at = self.modified_at(kind).await?;
        Ok(now - saved_at)
    }
}
