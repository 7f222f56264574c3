//! Hashing local files before identification

use super::file::GetFile;
use super::sink::{FileHasher, MetadataSink};
use crate::error::{IoError, Result};
use crate::queue::{Command, CommandHandler, CommandPayload, CommandType, HandlerContext};
use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Hash a file, then identify it on the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashFile {
    pub path: PathBuf,
    /// Add the identified file to the user's list afterwards
    #[serde(default)]
    pub add_to_mylist: bool,
}

impl HashFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            add_to_mylist: false,
        }
    }

    pub fn and_add_to_mylist(mut self) -> Self {
        self.add_to_mylist = true;
        self
    }
}

impl CommandPayload for HashFile {
    const COMMAND_TYPE: CommandType = CommandType::HashFile;

    fn key(&self) -> String {
        self.path.display().to_string()
    }
}

pub(crate) struct HashFileHandler {
    hasher: Arc<dyn FileHasher>,
    sink: Arc<dyn MetadataSink>,
}

impl HashFileHandler {
    pub(crate) fn new(hasher: Arc<dyn FileHasher>, sink: Arc<dyn MetadataSink>) -> Self {
        Self { hasher, sink }
    }
}

#[async_trait]
impl CommandHandler for HashFileHandler {
    async fn handle(&self, command: &Command, ctx: &HandlerContext) -> Result<()> {
        let payload: HashFile = command.payload()?;

        if !tokio::fs::try_exists(&payload.path).await? {
            return Err(IoError::file_not_found(&payload.path).into());
        }

        let hashes = self.hasher.hash(&payload.path).await?;
        debug!(
            "Hashed {}: size={} ed2k={}",
            payload.path.display(),
            hashes.size,
            hashes.ed2k
        );
        self.sink.file_hashed(&payload.path, &hashes).await?;

        let mut lookup = GetFile::new(hashes.size, &hashes.ed2k);
        lookup.add_to_mylist = payload.add_to_mylist;
        if ctx.submit(lookup.into_command()?).await? {
            info!("Queued identification of {}", payload.path.display());
        }
        Ok(())
    }
}
