//! Knowledge Sources
//!
//! Where the manifest and agent records are read from. The cache never
//! writes through a source.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::{SDKError, SDKResult};

/// Read-only access to the knowledge base
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Raw manifest text. A missing manifest is `KnowledgeSourceMissing`.
    async fn read_manifest(&self) -> SDKResult<String>;

    /// Raw record text for a manifest `recordPath`
    async fn read_record(&self, record_path: &str) -> SDKResult<String>;

    /// Human-readable location for logs and errors
    fn describe(&self) -> String;
}

/// Knowledge base stored as files under one directory
#[derive(Debug, Clone)]
pub struct FsKnowledgeSource {
    root: PathBuf,
    manifest_file: String,
}

impl FsKnowledgeSource {
    pub fn new(root: impl Into<PathBuf>, manifest_file: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            manifest_file: manifest_file.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(&self.manifest_file)
    }

    fn record_path(&self, record_path: &str) -> SDKResult<PathBuf> {
        let relative = Path::new(record_path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(SDKError::invalid_record(
                record_path,
                "record path must stay inside the knowledge directory",
            ));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl KnowledgeSource for FsKnowledgeSource {
    async fn read_manifest(&self) -> SDKResult<String> {
        let path = self.manifest_path();
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(SDKError::knowledge_source_missing(
                path.display().to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_record(&self, record_path: &str) -> SDKResult<String> {
        let path = self.record_path(record_path)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(SDKError::not_found("agent record", path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        self.manifest_path().display().to_string()
    }
}

/// Knowledge base held in memory, with read counters
#[derive(Debug, Default)]
pub struct InMemoryKnowledgeSource {
    manifest: Option<String>,
    records: HashMap<String, String>,
    manifest_reads: AtomicUsize,
    record_reads: AtomicUsize,
}

impl InMemoryKnowledgeSource {
    /// A source whose manifest is absent
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn new(manifest: impl Into<String>) -> Self {
        Self {
            manifest: Some(manifest.into()),
            ..Default::default()
        }
    }

    pub fn with_record(mut self, record_path: impl Into<String>, json: impl Into<String>) -> Self {
        self.records.insert(record_path.into(), json.into());
        self
    }

    /// Times the manifest was requested
    pub fn manifest_reads(&self) -> usize {
        self.manifest_reads.load(Ordering::SeqCst)
    }

    /// Times any record was requested
    pub fn record_reads(&self) -> usize {
        self.record_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KnowledgeSource for InMemoryKnowledgeSource {
    async fn read_manifest(&self) -> SDKResult<String> {
        self.manifest_reads.fetch_add(1, Ordering::SeqCst);
        self.manifest
            .clone()
            .ok_or_else(|| SDKError::knowledge_source_missing(self.describe()))
    }

    async fn read_record(&self, record_path: &str) -> SDKResult<String> {
        self.record_reads.fetch_add(1, Ordering::SeqCst);
        self.records
            .get(record_path)
            .cloned()
            .ok_or_else(|| SDKError::not_found("agent record", record_path))
    }

    fn describe(&self) -> String {
        "memory://index.json".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fs_source_reads_manifest_and_records() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("agents")).unwrap();
        std::fs::write(dir.path().join("index.json"), r#"{"agents":[]}"#).unwrap();
        std::fs::write(dir.path().join("agents/a.json"), r#"{"name":"a"}"#).unwrap();

        let source = FsKnowledgeSource::new(dir.path(), "index.json");
        assert_eq!(source.read_manifest().await.unwrap(), r#"{"agents":[]}"#);
        assert_eq!(source.read_record("agents/a.json").await.unwrap(), r#"{"name":"a"}"#);

        let err = source.read_record("agents/missing.json").await.unwrap_err();
        assert!(matches!(err, SDKError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_fs_source_missing_manifest() {
        let dir = TempDir::new().unwrap();
        let source = FsKnowledgeSource::new(dir.path().join("absent"), "index.json");

        let err = source.read_manifest().await.unwrap_err();
        assert!(err.is_knowledge_source_missing());
    }

    #[tokio::test]
    async fn test_fs_source_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let source = FsKnowledgeSource::new(dir.path(), "index.json");

        for path in ["../secrets.json", "/etc/passwd", "agents/../../x.json"] {
            let err = source.read_record(path).await.unwrap_err();
            assert!(matches!(err, SDKError::InvalidRecord { .. }), "{}", path);
        }
    }

    #[tokio::test]
    async fn test_in_memory_source_counts_reads() {
        let source = InMemoryKnowledgeSource::missing();
        assert!(source.read_manifest().await.is_err());
        assert!(source.read_manifest().await.is_err());
        assert_eq!(source.manifest_reads(), 2);
        assert_eq!(source.record_reads(), 0);
    }
}
