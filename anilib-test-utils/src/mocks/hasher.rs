use anilib_core::Result;
use anilib_core::handlers::{FileHasher, FileHashes};
use async_trait::async_trait;
use std::path::Path;

/// Reports the real file size and a fixed ed2k hash
pub struct StaticHasher {
    pub ed2k: String,
}

impl StaticHasher {
    pub fn new(ed2k: &str) -> Self {
        Self {
            ed2k: ed2k.to_string(),
        }
    }
}

#[async_trait]
impl FileHasher for StaticHasher {
    async fn hash(&self, path: &Path) -> Result<FileHashes> {
        let size = tokio::fs::metadata(path).await?.len();
        Ok(FileHashes {
            size,
            ed2k: self.ed2k.clone(),
        })
    }
}
