//! Collaborators outside the queue: where results go and how files are hashed

use crate::error::Result;
use crate::protocol::HttpDocument;
use crate::protocol::messages::{
    CalendarEntry, EpisodeRecord, FileRecord, MyListAddOutcome, ReleaseGroup, UpdatedAnime,
    VoteOutcome,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Receives registry results; every method defaults to doing nothing
#[async_trait]
pub trait MetadataSink: Send + Sync {
    /// Whether full anime metadata is already stored locally
    async fn has_anime(&self, _aid: u64) -> bool {
        false
    }

    async fn has_release_group(&self, _gid: u64) -> bool {
        false
    }

    async fn file_hashed(&self, _path: &Path, _hashes: &FileHashes) -> Result<()> {
        Ok(())
    }

    async fn file_found(&self, _file: &FileRecord) -> Result<()> {
        Ok(())
    }

    async fn file_unknown(&self, _size: u64, _ed2k: &str) -> Result<()> {
        Ok(())
    }

    async fn mylist_added(&self, _ed2k: &str, _outcome: &MyListAddOutcome) -> Result<()> {
        Ok(())
    }

    async fn mylist_removed(&self, _ed2k: &str, _entries: u32) -> Result<()> {
        Ok(())
    }

    async fn vote_recorded(&self, _aid: u64, _outcome: &VoteOutcome) -> Result<()> {
        Ok(())
    }

    async fn calendar(&self, _entries: &[CalendarEntry]) -> Result<()> {
        Ok(())
    }

    async fn updated(&self, _updated: &UpdatedAnime) -> Result<()> {
        Ok(())
    }

    async fn release_group(&self, _group: &ReleaseGroup) -> Result<()> {
        Ok(())
    }

    async fn episode(&self, _episode: &EpisodeRecord) -> Result<()> {
        Ok(())
    }

    /// A raw document; `aid` is set for anime documents
    async fn document(&self, _aid: Option<u64>, _document: &HttpDocument) -> Result<()> {
        Ok(())
    }

    async fn image_saved(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MetadataSink for NullSink {}

/// Hashes the registry identifies files by
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHashes {
    pub size: u64,
    pub ed2k: String,
}

/// Computes file hashes; supplied by the embedding application
#[async_trait]
pub trait FileHasher: Send + Sync {
    async fn hash(&self, path: &Path) -> Result<FileHashes>;
}
