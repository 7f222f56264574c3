//! File identification by hash

use super::anime::{GetAnimeHttp, GetReleaseGroup};
use super::mylist::AddFileToMyList;
use super::sink::MetadataSink;
use crate::error::Result;
use crate::protocol::{Lookup, RegistryClient};
use crate::queue::{Command, CommandHandler, CommandPayload, CommandType, HandlerContext};
use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetFile {
    pub size: u64,
    pub ed2k: String,
    #[serde(default)]
    pub add_to_mylist: bool,
}

impl GetFile {
    pub fn new(size: u64, ed2k: impl Into<String>) -> Self {
        Self {
            size,
            ed2k: ed2k.into().to_lowercase(),
            add_to_mylist: false,
        }
    }
}

impl CommandPayload for GetFile {
    const COMMAND_TYPE: CommandType = CommandType::GetFile;

    fn key(&self) -> String {
        format!("{}_{}", self.ed2k, self.size)
    }
}

pub(crate) struct GetFileHandler {
    client: RegistryClient,
    sink: Arc<dyn MetadataSink>,
}

impl GetFileHandler {
    pub(crate) fn new(client: RegistryClient, sink: Arc<dyn MetadataSink>) -> Self {
        Self { client, sink }
    }
}

#[async_trait]
impl CommandHandler for GetFileHandler {
    async fn handle(&self, command: &Command, ctx: &HandlerContext) -> Result<()> {
        let payload: GetFile = command.payload()?;

        let file = match self.client.file_by_hash(payload.size, &payload.ed2k).await? {
            Lookup::Found(file) => file,
            Lookup::NoData => {
                info!("File {} is unknown to the registry", payload.ed2k);
                return self.sink.file_unknown(payload.size, &payload.ed2k).await;
            }
        };

        debug!(
            "Identified {} as fid={} aid={}",
            payload.ed2k, file.fid, file.aid
        );
        self.sink.file_found(&file).await?;

        if let Some(gid) = file.gid
            && !self.sink.has_release_group(gid).await
        {
            ctx.submit(GetReleaseGroup { gid }.into_command()?).await?;
        }
        if !self.sink.has_anime(file.aid).await {
            ctx.submit(GetAnimeHttp { aid: file.aid }.into_command()?)
                .await?;
        }
        if payload.add_to_mylist {
            ctx.submit(AddFileToMyList::new(payload.size, &payload.ed2k).into_command()?)
                .await?;
        }
        Ok(())
    }
}
