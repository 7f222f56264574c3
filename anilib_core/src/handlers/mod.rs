//! Command handlers
//!
//! One handler per [`CommandType`]. Handlers translate a command payload into
//! registry calls, hand the results to a [`MetadataSink`] and chain follow-up
//! commands. Turning registry records into library entities is the sink's
//! business.

pub mod anime;
pub mod file;
pub mod hash;
pub mod image;
pub mod mylist;
pub mod sink;
pub mod vote;

pub use anime::{GetAnimeHttp, GetCalendar, GetEpisode, GetReleaseGroup, GetUpdated};
pub use file::GetFile;
pub use hash::HashFile;
pub use image::DownloadImage;
pub use mylist::{AddFileToMyList, DeleteFileFromMyList, SyncMyList};
pub use sink::{FileHasher, FileHashes, MetadataSink, NullSink};
pub use vote::{SyncVotes, VoteAnime};

use crate::config::CoreConfig;
use crate::protocol::{HttpTransport, RateLimiter, RegistryClient};
use crate::queue::{CommandType, HandlerRegistry};
use std::sync::Arc;

/// Collaborators shared by the built-in handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub client: RegistryClient,
    pub sink: Arc<dyn MetadataSink>,
    pub hasher: Arc<dyn FileHasher>,
    /// Transport for image downloads, outside registry ban accounting
    pub images: Arc<dyn HttpTransport>,
    pub image_limiter: Arc<RateLimiter>,
}

impl HandlerDeps {
    pub fn new(
        config: &CoreConfig,
        client: RegistryClient,
        hasher: Arc<dyn FileHasher>,
        images: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            client,
            sink: Arc::new(NullSink),
            hasher,
            images,
            image_limiter: Arc::new(RateLimiter::new("images", config.image_rate.clone())),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn MetadataSink>) -> Self {
        self.sink = sink;
        self
    }
}

/// A registry with a handler for every command type
pub fn default_registry(deps: &HandlerDeps) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    let HandlerDeps {
        client,
        sink,
        hasher,
        images,
        image_limiter,
    } = deps.clone();

    registry.register(
        CommandType::HashFile,
        Arc::new(hash::HashFileHandler::new(hasher, sink.clone())),
    );
    registry.register(
        CommandType::GetFile,
        Arc::new(file::GetFileHandler::new(client.clone(), sink.clone())),
    );
    registry.register(
        CommandType::AddFileToMyList,
        Arc::new(mylist::AddFileToMyListHandler::new(client.clone(), sink.clone())),
    );
    registry.register(
        CommandType::DeleteFileFromMyList,
        Arc::new(mylist::DeleteFileFromMyListHandler::new(client.clone(), sink.clone())),
    );
    registry.register(
        CommandType::SyncMyList,
        Arc::new(mylist::SyncMyListHandler::new(client.clone(), sink.clone())),
    );
    registry.register(
        CommandType::VoteAnime,
        Arc::new(vote::VoteAnimeHandler::new(client.clone(), sink.clone())),
    );
    registry.register(
        CommandType::SyncVotes,
        Arc::new(vote::SyncVotesHandler::new(client.clone(), sink.clone())),
    );
    registry.register(
        CommandType::GetCalendar,
        Arc::new(anime::GetCalendarHandler::new(client.clone(), sink.clone())),
    );
    registry.register(
        CommandType::GetUpdated,
        Arc::new(anime::GetUpdatedHandler::new(client.clone(), sink.clone())),
    );
    registry.register(
        CommandType::GetReleaseGroup,
        Arc::new(anime::GetReleaseGroupHandler::new(client.clone(), sink.clone())),
    );
    registry.register(
        CommandType::GetEpisode,
        Arc::new(anime::GetEpisodeHandler::new(client.clone(), sink.clone())),
    );
    registry.register(
        CommandType::GetAnimeHttp,
        Arc::new(anime::GetAnimeHttpHandler::new(client, sink.clone())),
    );
    registry.register(
        CommandType::DownloadImage,
        Arc::new(image::DownloadImageHandler::new(images, image_limiter, sink)),
    );

    registry
}
