//! Asset sources
//!
//! The loader only needs "fetch text or JSON by logical path"; how the bytes
//! travel is up to the implementation.

use crate::error::SourceError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Fetches raw assets by logical path (`/mods.json`, `/mods/{id}/package.json`)
#[async_trait]
pub trait AssetSource: Send + Sync + fmt::Debug {
    /// Fetch an asset as text
    async fn fetch_text(&self, path: &str) -> Result<String, SourceError>;

    /// Fetch an asset and decode it as JSON
    async fn fetch_json(&self, path: &str) -> Result<serde_json::Value, SourceError> {
        let text = self.fetch_text(path).await?;
        serde_json::from_str(&text).map_err(|e| SourceError::json(path, e))
    }
}

/// Asset source backed by a directory on disk
#[derive(Debug, Clone)]
pub struct FsAssetSource {
    root: PathBuf,
}

impl FsAssetSource {
    /// Serve assets from `root`; `/a/b.json` maps to `root/a/b.json`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, SourceError> {
        let relative = Path::new(path.trim_start_matches('/'));

        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(SourceError::InvalidPath(path.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl AssetSource for FsAssetSource {
    async fn fetch_text(&self, path: &str) -> Result<String, SourceError> {
        let full = self.resolve(path)?;

        tokio::fs::read_to_string(&full).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SourceError::not_found(path)
            } else {
                SourceError::Io {
                    path: path.to_string(),
                    source: e,
                }
            }
        })
    }
}

/// Asset source holding everything in memory
#[derive(Debug, Default)]
pub struct MemoryAssetSource {
    assets: DashMap<String, String>,
}

impl MemoryAssetSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Store text at a path
    pub fn insert(&self, path: impl Into<String>, text: impl Into<String>) {
        self.assets.insert(path.into(), text.into());
    }

    /// Store a JSON value at a path
    pub fn insert_json(&self, path: impl Into<String>, value: &serde_json::Value) {
        self.assets.insert(path.into(), value.to_string());
    }

    /// Remove the asset at a path
    pub fn remove(&self, path: &str) -> Option<String> {
        self.assets.remove(path).map(|(_, text)| text)
    }
}

#[async_trait]
impl AssetSource for MemoryAssetSource {
    async fn fetch_text(&self, path: &str) -> Result<String, SourceError> {
        self.assets
            .get(path)
            .map(|text| text.value().clone())
            .ok_or_else(|| SourceError::not_found(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_source() {
        let source = MemoryAssetSource::new();
        source.insert_json("/mods.json", &json!(["a", "b"]));

        let value = source.fetch_json("/mods.json").await.unwrap();
        assert_eq!(value, json!(["a", "b"]));

        let missing = source.fetch_text("/nope.json").await;
        assert!(matches!(missing, Err(SourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_memory_source_invalid_json() {
        let source = MemoryAssetSource::new();
        source.insert("/broken.json", "{ not json");

        let result = source.fetch_json("/broken.json").await;
        assert!(matches!(result, Err(SourceError::Json { .. })));
    }

    #[tokio::test]
    async fn test_fs_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("mods/simplify")).unwrap();
        std::fs::write(
            dir.path().join("mods/simplify/package.json"),
            r#"{"name":"simplify","version":"2.0.0"}"#,
        )
        .unwrap();

        let source = FsAssetSource::new(dir.path());
        let value = source
            .fetch_json("/mods/simplify/package.json")
            .await
            .unwrap();
        assert_eq!(value["name"], "simplify");

        let missing = source.fetch_text("/mods.json").await;
        assert!(matches!(missing, Err(SourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fs_source_rejects_escaping_paths() {
        let source = FsAssetSource::new("/tmp");
        let result = source.fetch_text("/../etc/passwd").await;
        assert!(matches!(result, Err(SourceError::InvalidPath(_))));
    }
}
