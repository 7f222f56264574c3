//! Wiring of the whole client
//!
//! [`Runtime`] builds the shared ban tracker, session, HTTP client, handler
//! registry and command queue from one [`CoreConfig`].

use crate::config::CoreConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::handlers::{FileHasher, HandlerDeps, MetadataSink, default_registry};
use crate::protocol::{
    BanTracker, HttpClient, HttpTransport, ProtocolSession, RegistryClient, ReqwestTransport,
    UdpSocketTransport, UdpTransport,
};
use crate::queue::{CommandQueue, CommandStore};
use log::info;
use std::sync::Arc;

/// Transports and collaborators supplied by the embedding application
pub struct Collaborators {
    pub udp: Arc<dyn UdpTransport>,
    pub http: Arc<dyn HttpTransport>,
    pub images: Arc<dyn HttpTransport>,
    pub hasher: Arc<dyn FileHasher>,
    pub sink: Arc<dyn MetadataSink>,
}

/// A fully wired client with its command queue
pub struct Runtime {
    pub events: EventBus,
    pub bans: Arc<BanTracker>,
    pub session: Arc<ProtocolSession>,
    pub client: RegistryClient,
    pub queue: CommandQueue,
}

impl Runtime {
    /// Wire everything over the given transports; nothing is started
    pub fn assemble(
        config: &CoreConfig,
        store: Arc<dyn CommandStore>,
        collaborators: Collaborators,
    ) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new();
        let bans = BanTracker::new(config.bans.clone(), events.clone());
        let session = ProtocolSession::new(config, collaborators.udp, bans.clone(), events.clone());
        let http = Arc::new(HttpClient::new(config, collaborators.http, bans.clone()));
        let client = RegistryClient::new(session.clone(), http);

        let deps = HandlerDeps::new(
            config,
            client.clone(),
            collaborators.hasher,
            collaborators.images,
        )
        .with_sink(collaborators.sink);
        let queue = CommandQueue::new(
            store,
            default_registry(&deps),
            bans.clone(),
            events.clone(),
            config.queues.clone(),
        )
        .with_session(session.clone());

        Ok(Self {
            events,
            bans,
            session,
            client,
            queue,
        })
    }

    /// Wire everything over real sockets
    pub async fn connect(
        config: &CoreConfig,
        store: Arc<dyn CommandStore>,
        hasher: Arc<dyn FileHasher>,
        sink: Arc<dyn MetadataSink>,
    ) -> Result<Self> {
        let udp = UdpSocketTransport::connect(&config.registry).await?;
        let user_agent = format!(
            "{}/{}",
            config.registry.client_name, config.registry.client_version
        );
        let http: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(
            config.registry.http_timeout(),
            &user_agent,
        )?);

        info!("Registry endpoint {}", config.registry.server_addr());
        Self::assemble(
            config,
            store,
            Collaborators {
                udp: Arc::new(udp),
                http: http.clone(),
                images: http,
                hasher,
                sink,
            },
        )
    }

    /// Start session maintenance and the queue processors
    pub fn start(&self) {
        self.queue.start();
    }

    /// Stop processors within `grace`, log out and stop timers
    pub async fn shutdown(&self, grace: std::time::Duration) {
        self.queue.shutdown(grace).await;
    }
}
