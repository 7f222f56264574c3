//! Votes

use super::sink::MetadataSink;
use crate::error::{Result, ValidationError};
use crate::protocol::{DocumentKind, Lookup, RegistryClient};
use crate::queue::{Command, CommandHandler, CommandPayload, CommandType, HandlerContext};
use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Smallest accepted non-zero vote (1.00)
pub const MIN_VOTE: u16 = 100;
/// Largest accepted vote (10.00)
pub const MAX_VOTE: u16 = 1000;

/// Vote on an anime; `value` is the rating times 100, zero revokes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteAnime {
    pub aid: u64,
    pub value: u16,
    #[serde(default)]
    pub temporary: bool,
}

impl VoteAnime {
    pub fn new(aid: u64, value: u16) -> Self {
        Self {
            aid,
            value,
            temporary: false,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.value == 0 || (MIN_VOTE..=MAX_VOTE).contains(&self.value) {
            Ok(())
        } else {
            Err(ValidationError::invalid_parameter(
                "value",
                "must be 0 or between 100 and 1000",
            ))
        }
    }
}

impl CommandPayload for VoteAnime {
    const COMMAND_TYPE: CommandType = CommandType::VoteAnime;

    fn key(&self) -> String {
        self.aid.to_string()
    }
}

/// Download all of the user's votes as a document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncVotes {}

impl CommandPayload for SyncVotes {
    const COMMAND_TYPE: CommandType = CommandType::SyncVotes;

    fn key(&self) -> String {
        "all".to_string()
    }
}

pub(crate) struct VoteAnimeHandler {
    client: RegistryClient,
    sink: Arc<dyn MetadataSink>,
}

impl VoteAnimeHandler {
    pub(crate) fn new(client: RegistryClient, sink: Arc<dyn MetadataSink>) -> Self {
        Self { client, sink }
    }
}

#[async_trait]
impl CommandHandler for VoteAnimeHandler {
    async fn handle(&self, command: &Command, _ctx: &HandlerContext) -> Result<()> {
        let payload: VoteAnime = command.payload()?;
        payload.validate()?;

        match self
            .client
            .vote_anime(payload.aid, payload.value, payload.temporary)
            .await?
        {
            Lookup::Found(outcome) => self.sink.vote_recorded(payload.aid, &outcome).await,
            Lookup::NoData => {
                info!("No vote to change for anime {}", payload.aid);
                Ok(())
            }
        }
    }
}

pub(crate) struct SyncVotesHandler {
    client: RegistryClient,
    sink: Arc<dyn MetadataSink>,
}

impl SyncVotesHandler {
    pub(crate) fn new(client: RegistryClient, sink: Arc<dyn MetadataSink>) -> Self {
        Self { client, sink }
    }
}

#[async_trait]
impl CommandHandler for SyncVotesHandler {
    async fn handle(&self, command: &Command, _ctx: &HandlerContext) -> Result<()> {
        let _: SyncVotes = command.payload()?;

        match self.client.votes_document().await? {
            Lookup::Found(document) => self.sink.document(None, &document).await,
            Lookup::NoData => {
                info!("Registry returned no {} document", DocumentKind::Votes);
                Ok(())
            }
        }
    }
}
