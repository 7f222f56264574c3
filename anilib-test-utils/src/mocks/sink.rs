//! Sink that remembers what it was given

use anilib_core::Result;
use anilib_core::handlers::{FileHashes, MetadataSink};
use anilib_core::protocol::HttpDocument;
use anilib_core::protocol::messages::{FileRecord, MyListAddOutcome, ReleaseGroup};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Default)]
pub struct RecordingSink {
    pub known_anime: Mutex<HashSet<u64>>,
    pub hashed: Mutex<Vec<(PathBuf, FileHashes)>>,
    pub files: Mutex<Vec<FileRecord>>,
    pub unknown_files: Mutex<Vec<String>>,
    pub mylist: Mutex<Vec<(String, MyListAddOutcome)>>,
    pub groups: Mutex<Vec<ReleaseGroup>>,
    pub documents: Mutex<Vec<(Option<u64>, HttpDocument)>>,
    pub images: Mutex<Vec<PathBuf>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend full metadata for these anime is already stored
    pub fn with_known_anime(self, aids: &[u64]) -> Self {
        self.known_anime.lock().extend(aids.iter().copied());
        self
    }
}

#[async_trait]
impl MetadataSink for RecordingSink {
    async fn has_anime(&self, aid: u64) -> bool {
        self.known_anime.lock().contains(&aid)
    }

    async fn file_hashed(&self, path: &Path, hashes: &FileHashes) -> Result<()> {
        self.hashed.lock().push((path.to_path_buf(), hashes.clone()));
        Ok(())
    }

    async fn file_found(&self, file: &FileRecord) -> Result<()> {
        self.files.lock().push(file.clone());
        Ok(())
    }

    async fn file_unknown(&self, _size: u64, ed2k: &str) -> Result<()> {
        self.unknown_files.lock().push(ed2k.to_string());
        Ok(())
    }

    async fn mylist_added(&self, ed2k: &str, outcome: &MyListAddOutcome) -> Result<()> {
        self.mylist.lock().push((ed2k.to_string(), outcome.clone()));
        Ok(())
    }

    async fn release_group(&self, group: &ReleaseGroup) -> Result<()> {
        self.groups.lock().push(group.clone());
        Ok(())
    }

    async fn document(&self, aid: Option<u64>, document: &HttpDocument) -> Result<()> {
        self.documents.lock().push((aid, document.clone()));
        Ok(())
    }

    async fn image_saved(&self, path: &Path) -> Result<()> {
        self.images.lock().push(path.to_path_buf());
        Ok(())
    }
}
