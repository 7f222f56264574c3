use crate::mocks::{ScriptedHttp, ScriptedUdp};
use anilib_core::config::CoreConfig;
use anilib_core::events::EventBus;
use anilib_core::handlers::{FileHasher, HandlerDeps, MetadataSink};
use anilib_core::protocol::{BanTracker, HttpClient, ProtocolSession, RegistryClient};
use anilib_core::queue::{CommandQueue, CommandStore, HandlerRegistry, InMemoryCommandStore};
use std::sync::Arc;

/// Configuration for tests: test credentials, short bans, a loopback endpoint
pub fn test_config() -> CoreConfig {
    let mut config = CoreConfig::test();
    config.bans.udp_ban_secs = 30 * 60;
    config.bans.http_ban_secs = 30 * 60;
    config.queues.poll_interval_secs = 1;
    config.queues.retry_base_delay_ms = 100;
    config
}

/// A session, HTTP client and registry client over scripted transports
pub struct TestStack {
    pub config: CoreConfig,
    pub events: EventBus,
    pub bans: Arc<BanTracker>,
    pub udp: Arc<ScriptedUdp>,
    pub http: Arc<ScriptedHttp>,
    pub session: Arc<ProtocolSession>,
    pub client: RegistryClient,
}

impl TestStack {
    /// A stack whose HTTP side must never be used
    pub fn new(udp: ScriptedUdp) -> Self {
        Self::with_http(udp, ScriptedHttp::unreachable())
    }

    pub fn with_http(udp: ScriptedUdp, http: ScriptedHttp) -> Self {
        Self::build(test_config(), udp, http)
    }

    pub fn build(config: CoreConfig, udp: ScriptedUdp, http: ScriptedHttp) -> Self {
        let events = EventBus::new();
        let bans = BanTracker::new(config.bans.clone(), events.clone());
        let udp = Arc::new(udp);
        let http = Arc::new(http);
        let session = ProtocolSession::new(&config, udp.clone(), bans.clone(), events.clone());
        let http_client = Arc::new(HttpClient::new(&config, http.clone(), bans.clone()));
        let client = RegistryClient::new(session.clone(), http_client);

        Self {
            config,
            events,
            bans,
            udp,
            http,
            session,
            client,
        }
    }

    /// Queue sharing this stack's bans, events and session
    pub fn queue(&self, store: Arc<dyn CommandStore>, handlers: HandlerRegistry) -> CommandQueue {
        CommandQueue::new(
            store,
            handlers,
            self.bans.clone(),
            self.events.clone(),
            self.config.queues.clone(),
        )
        .with_session(self.session.clone())
    }

    /// Queue over a fresh in-memory store, returning the store for inspection
    pub fn memory_queue(&self, handlers: HandlerRegistry) -> (CommandQueue, Arc<InMemoryCommandStore>) {
        let store = Arc::new(InMemoryCommandStore::new());
        (self.queue(store.clone(), handlers), store)
    }

    /// Handler collaborators over this stack; images are fetched from the HTTP script
    pub fn handler_deps(
        &self,
        sink: Arc<dyn MetadataSink>,
        hasher: Arc<dyn FileHasher>,
    ) -> HandlerDeps {
        HandlerDeps::new(&self.config, self.client.clone(), hasher, self.http.clone())
            .with_sink(sink)
    }
}
