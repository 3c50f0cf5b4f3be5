use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use super::StorageError;
use crate::pipeline::traits::DocumentStore;

/// Reads documents from a directory; file references are relative paths.
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, file_reference: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(file_reference);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || file_reference.trim().is_empty() {
            return Err(StorageError::InvalidReference(file_reference.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn read(&self, file_reference: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(file_reference)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(file_reference.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}
