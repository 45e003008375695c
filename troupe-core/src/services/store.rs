//! Content-Addressable Spec Store
//!
//! Stores agent-spec documents under their SHA-256 digest so sessions can
//! be created from immutable `sha256:<hex>` references in addition to
//! named files.

use std::path::PathBuf;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

/// Filesystem-backed blob store keyed by content digest.
pub struct ContentStore {
    base_dir: PathBuf,
}

impl ContentStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Hex SHA-256 digest of a document.
    pub fn digest(content: &str) -> String {
        let hash = Sha256::digest(content.as_bytes());
        hash.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Store a document and return its digest.
    pub async fn put(&self, content: &str) -> Result<String> {
        let digest = Self::digest(content);
        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .with_context(|| format!("failed to create store dir {}", self.base_dir.display()))?;
        let path = self.base_dir.join(&digest);
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("failed to write blob {}", path.display()))?;
        tracing::debug!(digest = %digest, "stored agent spec blob");
        Ok(digest)
    }

    /// Fetch a document by digest. `None` when the blob is absent.
    pub async fn get(&self, digest: &str) -> Result<Option<String>> {
        let path = self.base_dir.join(digest);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("failed to read blob {}", path.display()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path());

        let digest = store.put("root = \"a\"").await.unwrap();
        assert_eq!(digest.len(), 64);

        let content = store.get(&digest).await.unwrap().unwrap();
        assert_eq!(content, "root = \"a\"");
    }

    #[tokio::test]
    async fn missing_blob_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path());
        assert!(store.get(&"0".repeat(64)).await.unwrap().is_none());
    }

    #[test]
    fn digest_is_stable() {
        assert_eq!(ContentStore::digest("x"), ContentStore::digest("x"));
        assert_ne!(ContentStore::digest("x"), ContentStore::digest("y"));
    }
}
