//! The user's file list

use super::sink::MetadataSink;
use crate::error::Result;
use crate::protocol::messages::MyListState;
use crate::protocol::{DocumentKind, Lookup, RegistryClient};
use crate::queue::{Command, CommandHandler, CommandPayload, CommandType, HandlerContext};
use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddFileToMyList {
    pub size: u64,
    pub ed2k: String,
    #[serde(default)]
    pub state: MyListState,
    #[serde(default)]
    pub watched: bool,
}

impl AddFileToMyList {
    pub fn new(size: u64, ed2k: impl Into<String>) -> Self {
        Self {
            size,
            ed2k: ed2k.into().to_lowercase(),
            state: MyListState::default(),
            watched: false,
        }
    }

    pub fn watched(mut self, watched: bool) -> Self {
        self.watched = watched;
        self
    }
}

impl CommandPayload for AddFileToMyList {
    const COMMAND_TYPE: CommandType = CommandType::AddFileToMyList;

    fn key(&self) -> String {
        format!("{}_{}", self.ed2k, self.size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteFileFromMyList {
    pub size: u64,
    pub ed2k: String,
}

impl DeleteFileFromMyList {
    pub fn new(size: u64, ed2k: impl Into<String>) -> Self {
        Self {
            size,
            ed2k: ed2k.into().to_lowercase(),
        }
    }
}

impl CommandPayload for DeleteFileFromMyList {
    const COMMAND_TYPE: CommandType = CommandType::DeleteFileFromMyList;

    fn key(&self) -> String {
        format!("{}_{}", self.ed2k, self.size)
    }
}

/// Download the whole list as a document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMyList {}

impl CommandPayload for SyncMyList {
    const COMMAND_TYPE: CommandType = CommandType::SyncMyList;

    fn key(&self) -> String {
        "all".to_string()
    }
}

pub(crate) struct AddFileToMyListHandler {
    client: RegistryClient,
    sink: Arc<dyn MetadataSink>,
}

impl AddFileToMyListHandler {
    pub(crate) fn new(client: RegistryClient, sink: Arc<dyn MetadataSink>) -> Self {
        Self { client, sink }
    }
}

#[async_trait]
impl CommandHandler for AddFileToMyListHandler {
    async fn handle(&self, command: &Command, _ctx: &HandlerContext) -> Result<()> {
        let payload: AddFileToMyList = command.payload()?;

        let lookup = self
            .client
            .add_file_to_mylist(payload.size, &payload.ed2k, payload.state, payload.watched)
            .await?;
        match lookup {
            Lookup::Found(outcome) => {
                info!("Added {} to list: {outcome:?}", payload.ed2k);
                self.sink.mylist_added(&payload.ed2k, &outcome).await
            }
            Lookup::NoData => {
                warn!("Cannot add {} to list: file unknown", payload.ed2k);
                self.sink.file_unknown(payload.size, &payload.ed2k).await
            }
        }
    }
}

pub(crate) struct DeleteFileFromMyListHandler {
    client: RegistryClient,
    sink: Arc<dyn MetadataSink>,
}

impl DeleteFileFromMyListHandler {
    pub(crate) fn new(client: RegistryClient, sink: Arc<dyn MetadataSink>) -> Self {
        Self { client, sink }
    }
}

#[async_trait]
impl CommandHandler for DeleteFileFromMyListHandler {
    async fn handle(&self, command: &Command, _ctx: &HandlerContext) -> Result<()> {
        let payload: DeleteFileFromMyList = command.payload()?;

        let removed = self
            .client
            .delete_file_from_mylist(payload.size, &payload.ed2k)
            .await?;
        let entries = match removed {
            Lookup::Found(entries) => entries,
            Lookup::NoData => 0,
        };
        info!("Removed {entries} list entries for {}", payload.ed2k);
        self.sink.mylist_removed(&payload.ed2k, entries).await
    }
}

pub(crate) struct SyncMyListHandler {
    client: RegistryClient,
    sink: Arc<dyn MetadataSink>,
}

impl SyncMyListHandler {
    pub(crate) fn new(client: RegistryClient, sink: Arc<dyn MetadataSink>) -> Self {
        Self { client, sink }
    }
}

#[async_trait]
impl CommandHandler for SyncMyListHandler {
    async fn handle(&self, command: &Command, _ctx: &HandlerContext) -> Result<()> {
        let _: SyncMyList = command.payload()?;

        match self.client.mylist_document().await? {
            Lookup::Found(document) => {
                info!("Fetched {} ({} bytes)", document.kind, document.body.len());
                self.sink.document(None, &document).await
            }
            Lookup::NoData => {
                info!("Registry returned no {} document", DocumentKind::MyList);
                Ok(())
            }
        }
    }
}
