//! File-backed metadata sink
//!
//! Layout under the documents directory:
//!
//! ```text
//! anime/<aid>.xml        anime documents
//! mylist.xml votes.xml   account documents
//! groups/<gid>.json      release groups
//! episodes/<eid>.json    episodes
//! files/<ed2k>_<size>.json
//! calendar.json updated.json
//! ```

use anilib_core::error::{IoError, Result};
use anilib_core::handlers::FileHashes;
use anilib_core::protocol::messages::{
    CalendarEntry, EpisodeRecord, FileRecord, MyListAddOutcome, ReleaseGroup, UpdatedAnime,
    VoteOutcome,
};
use anilib_core::protocol::{DocumentKind, HttpDocument};
use anilib_core::MetadataSink;
use async_trait::async_trait;
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct DocumentSink {
    root: PathBuf,
}

impl DocumentSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn anime_path(&self, aid: u64) -> PathBuf {
        self.root.join("anime").join(format!("{aid}.xml"))
    }

    pub fn group_path(&self, gid: u64) -> PathBuf {
        self.root.join("groups").join(format!("{gid}.json"))
    }

    fn document_path(&self, aid: Option<u64>, kind: DocumentKind) -> PathBuf {
        match (kind, aid) {
            (DocumentKind::Anime, Some(aid)) => self.anime_path(aid),
            (DocumentKind::Anime, None) => self.root.join("anime.xml"),
            (DocumentKind::MyList, _) => self.root.join("mylist.xml"),
            (DocumentKind::Votes, _) => self.root.join("votes.xml"),
        }
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| IoError::write_failed(parent, e))?;
        }
        fs::write(path, contents)
            .await
            .map_err(|e| IoError::write_failed(path, e))?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        let data = serde_json::to_vec_pretty(value)?;
        self.write(path, &data).await
    }
}

#[async_trait]
impl MetadataSink for DocumentSink {
    async fn has_anime(&self, aid: u64) -> bool {
        fs::try_exists(self.anime_path(aid)).await.unwrap_or(false)
    }

    async fn has_release_group(&self, gid: u64) -> bool {
        fs::try_exists(self.group_path(gid)).await.unwrap_or(false)
    }

    async fn file_hashed(&self, path: &Path, hashes: &FileHashes) -> Result<()> {
        info!(
            "Hashed {}: ed2k={} size={}",
            path.display(),
            hashes.ed2k,
            hashes.size
        );
        Ok(())
    }

    async fn file_found(&self, file: &FileRecord) -> Result<()> {
        info!("File {} belongs to anime {}", file.fid, file.aid);
        let name = match (&file.ed2k, file.size) {
            (Some(ed2k), Some(size)) => format!("{ed2k}_{size}.json"),
            _ => format!("fid-{}.json", file.fid),
        };
        self.write_json(&self.root.join("files").join(name), file)
            .await
    }

    async fn file_unknown(&self, size: u64, ed2k: &str) -> Result<()> {
        warn!("File not known to the registry: ed2k={ed2k} size={size}");
        Ok(())
    }

    async fn mylist_added(&self, ed2k: &str, outcome: &MyListAddOutcome) -> Result<()> {
        match outcome {
            MyListAddOutcome::Added { lid } => info!("Added {ed2k} to mylist (lid {lid})"),
            MyListAddOutcome::AlreadyInList { .. } => info!("{ed2k} is already in mylist"),
            MyListAddOutcome::Edited { entries } => {
                info!("Updated {entries} mylist entries for {ed2k}")
            }
        }
        Ok(())
    }

    async fn mylist_removed(&self, ed2k: &str, entries: u32) -> Result<()> {
        info!("Removed {entries} mylist entries for {ed2k}");
        Ok(())
    }

    async fn vote_recorded(&self, aid: u64, outcome: &VoteOutcome) -> Result<()> {
        match outcome {
            VoteOutcome::Voted { name, value } | VoteOutcome::Updated { name, value } => {
                info!("Vote {value} recorded for {name} ({aid})")
            }
            VoteOutcome::Revoked { name } => info!("Vote revoked for {name} ({aid})"),
        }
        Ok(())
    }

    async fn calendar(&self, entries: &[CalendarEntry]) -> Result<()> {
        info!("Calendar lists {} anime", entries.len());
        self.write_json(&self.root.join("calendar.json"), entries)
            .await
    }

    async fn updated(&self, updated: &UpdatedAnime) -> Result<()> {
        info!("{} anime updated", updated.aids.len());
        self.write_json(&self.root.join("updated.json"), updated)
            .await
    }

    async fn release_group(&self, group: &ReleaseGroup) -> Result<()> {
        info!("Release group {} [{}]", group.name, group.short_name);
        self.write_json(&self.group_path(group.gid), group).await
    }

    async fn episode(&self, episode: &EpisodeRecord) -> Result<()> {
        let path = self
            .root
            .join("episodes")
            .join(format!("{}.json", episode.eid));
        self.write_json(&path, episode).await
    }

    async fn document(&self, aid: Option<u64>, document: &HttpDocument) -> Result<()> {
        let path = self.document_path(aid, document.kind);
        info!("Saving document to {}", path.display());
        self.write(&path, document.body.as_bytes()).await
    }

    async fn image_saved(&self, path: &Path) -> Result<()> {
        info!("Image saved to {}", path.display());
        Ok(())
    }
}
