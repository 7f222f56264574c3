//! Anime, episode, group and calendar lookups

use super::sink::MetadataSink;
use crate::error::Result;
use crate::protocol::{Lookup, RegistryClient};
use crate::queue::{Command, CommandHandler, CommandPayload, CommandType, HandlerContext};
use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Upcoming and recently aired anime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetCalendar {}

impl CommandPayload for GetCalendar {
    const COMMAND_TYPE: CommandType = CommandType::GetCalendar;

    fn key(&self) -> String {
        "calendar".to_string()
    }
}

/// Anime changed since a unix timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetUpdated {
    pub since: i64,
}

impl CommandPayload for GetUpdated {
    const COMMAND_TYPE: CommandType = CommandType::GetUpdated;

    fn key(&self) -> String {
        self.since.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetReleaseGroup {
    pub gid: u64,
}

impl CommandPayload for GetReleaseGroup {
    const COMMAND_TYPE: CommandType = CommandType::GetReleaseGroup;

    fn key(&self) -> String {
        self.gid.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetEpisode {
    pub eid: u64,
}

impl CommandPayload for GetEpisode {
    const COMMAND_TYPE: CommandType = CommandType::GetEpisode;

    fn key(&self) -> String {
        self.eid.to_string()
    }
}

/// Full anime metadata from the HTTP API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAnimeHttp {
    pub aid: u64,
}

impl CommandPayload for GetAnimeHttp {
    const COMMAND_TYPE: CommandType = CommandType::GetAnimeHttp;

    fn key(&self) -> String {
        self.aid.to_string()
    }
}

pub(crate) struct GetCalendarHandler {
    client: RegistryClient,
    sink: Arc<dyn MetadataSink>,
}

impl GetCalendarHandler {
    pub(crate) fn new(client: RegistryClient, sink: Arc<dyn MetadataSink>) -> Self {
        Self { client, sink }
    }
}

#[async_trait]
impl CommandHandler for GetCalendarHandler {
    async fn handle(&self, command: &Command, ctx: &HandlerContext) -> Result<()> {
        let _: GetCalendar = command.payload()?;

        let entries = match self.client.calendar().await? {
            Lookup::Found(entries) => entries,
            Lookup::NoData => return Ok(()),
        };
        self.sink.calendar(&entries).await?;

        let mut queued = 0;
        for entry in &entries {
            if !self.sink.has_anime(entry.aid).await
                && ctx.submit(GetAnimeHttp { aid: entry.aid }.into_command()?).await?
            {
                queued += 1;
            }
        }
        info!(
            "Calendar lists {} anime, queued {queued} metadata fetches",
            entries.len()
        );
        Ok(())
    }
}

pub(crate) struct GetUpdatedHandler {
    client: RegistryClient,
    sink: Arc<dyn MetadataSink>,
}

impl GetUpdatedHandler {
    pub(crate) fn new(client: RegistryClient, sink: Arc<dyn MetadataSink>) -> Self {
        Self { client, sink }
    }
}

#[async_trait]
impl CommandHandler for GetUpdatedHandler {
    async fn handle(&self, command: &Command, ctx: &HandlerContext) -> Result<()> {
        let payload: GetUpdated = command.payload()?;

        let updated = match self.client.updated_since(payload.since).await? {
            Lookup::Found(updated) => updated,
            Lookup::NoData => {
                debug!("No anime updated since {}", payload.since);
                return Ok(());
            }
        };
        self.sink.updated(&updated).await?;

        // Only anime already stored locally need refreshing
        for &aid in &updated.aids {
            if self.sink.has_anime(aid).await {
                ctx.submit(GetAnimeHttp { aid }.into_command()?).await?;
            }
        }
        Ok(())
    }
}

pub(crate) struct GetReleaseGroupHandler {
    client: RegistryClient,
    sink: Arc<dyn MetadataSink>,
}

impl GetReleaseGroupHandler {
    pub(crate) fn new(client: RegistryClient, sink: Arc<dyn MetadataSink>) -> Self {
        Self { client, sink }
    }
}

#[async_trait]
impl CommandHandler for GetReleaseGroupHandler {
    async fn handle(&self, command: &Command, _ctx: &HandlerContext) -> Result<()> {
        let payload: GetReleaseGroup = command.payload()?;

        match self.client.release_group(payload.gid).await? {
            Lookup::Found(group) => self.sink.release_group(&group).await,
            Lookup::NoData => {
                debug!("Release group {} not found", payload.gid);
                Ok(())
            }
        }
    }
}

pub(crate) struct GetEpisodeHandler {
    client: RegistryClient,
    sink: Arc<dyn MetadataSink>,
}

impl GetEpisodeHandler {
    pub(crate) fn new(client: RegistryClient, sink: Arc<dyn MetadataSink>) -> Self {
        Self { client, sink }
    }
}

#[async_trait]
impl CommandHandler for GetEpisodeHandler {
    async fn handle(&self, command: &Command, _ctx: &HandlerContext) -> Result<()> {
        let payload: GetEpisode = command.payload()?;

        match self.client.episode(payload.eid).await? {
            Lookup::Found(episode) => self.sink.episode(&episode).await,
            Lookup::NoData => {
                debug!("Episode {} not found", payload.eid);
                Ok(())
            }
        }
    }
}

pub(crate) struct GetAnimeHttpHandler {
    client: RegistryClient,
    sink: Arc<dyn MetadataSink>,
}

impl GetAnimeHttpHandler {
    pub(crate) fn new(client: RegistryClient, sink: Arc<dyn MetadataSink>) -> Self {
        Self { client, sink }
    }
}

#[async_trait]
impl CommandHandler for GetAnimeHttpHandler {
    async fn handle(&self, command: &Command, _ctx: &HandlerContext) -> Result<()> {
        let payload: GetAnimeHttp = command.payload()?;

        match self.client.anime_document(payload.aid).await? {
            Lookup::Found(document) => self.sink.document(Some(payload.aid), &document).await,
            Lookup::NoData => {
                info!("Anime {} not found", payload.aid);
                Ok(())
            }
        }
    }
}
