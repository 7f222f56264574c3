//! Registry session
//!
//! [`ProtocolSession`] owns the login lifecycle of the UDP transport and is
//! the single entry point for every wire request. Callers may dispatch from
//! any number of tasks; requests leave one at a time, paced by the UDP rate
//! limiter and gated by the ban tracker.

mod state;

pub use state::{SessionState, StateTransition};

use crate::config::{BanConfig, CoreConfig, RegistryConfig, SessionConfig};
use crate::events::{EventBus, RegistryEvent};
use crate::protocol::ban::{Axis, BanSnapshot, BanTracker};
use crate::protocol::codec;
use crate::protocol::error::{ProtocolError, ResponseCode, Result};
use crate::protocol::messages::{Lookup, LoginReply, RawResponse, Request};
use crate::protocol::rate_limiter::RateLimiter;
use crate::protocol::transport::UdpTransport;
use crate::shutdown::SharedShutdown;
use chrono::{DateTime, Utc};
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, timeout};

/// Response codes that mean "nothing there" rather than failure
const NO_DATA_CODES: [u16; 7] = [320, 321, 330, 340, 343, 350, 394];

/// Codes after which the session key must be considered gone
const INVALID_SESSION_CODES: [u16; 4] = [501, 505, 506, 598];

/// Serializable view of the session for UI layers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub logged_in: bool,
    pub invalid_session: bool,
    pub last_activity: Option<DateTime<Utc>>,
    pub auth_failures: u32,
    pub bans: BanSnapshot,
}

/// What one maintenance tick decided to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceAction {
    Nothing,
    Ping,
    ForceLogout,
}

#[derive(Debug, Default)]
struct SessionInner {
    state: SessionState,
    token: Option<String>,
    last_activity: Option<Instant>,
    last_activity_at: Option<DateTime<Utc>>,
    /// Last request other than a keepalive ping
    last_command: Option<Instant>,
    last_ping: Option<Instant>,
    auth_failures: u32,
}

impl SessionInner {
    fn transition(&mut self, to: SessionState) -> bool {
        let transition = StateTransition::new(self.state, to);
        match transition.validation_error() {
            None => {
                trace!("Session state {} -> {to}", self.state);
                self.state = to;
                true
            }
            Some(message) => {
                warn!("{message}");
                false
            }
        }
    }
}

/// Clears the in-flight flag when the exchange finishes or is cancelled
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Login state machine and single-flight dispatch for the UDP transport
pub struct ProtocolSession {
    config: RegistryConfig,
    session_config: SessionConfig,
    ban_config: BanConfig,
    transport: Arc<dyn UdpTransport>,
    limiter: RateLimiter,
    bans: Arc<BanTracker>,
    events: EventBus,
    /// Held around every wire exchange
    wire: tokio::sync::Mutex<()>,
    /// Serializes concurrent login attempts
    login_lock: tokio::sync::Mutex<()>,
    inner: Mutex<SessionInner>,
    in_flight: AtomicBool,
    shutting_down: AtomicBool,
}

impl ProtocolSession {
    pub fn new(
        config: &CoreConfig,
        transport: Arc<dyn UdpTransport>,
        bans: Arc<BanTracker>,
        events: EventBus,
    ) -> Arc<Self> {
        Arc::new(Self {
            config: config.registry.clone(),
            session_config: config.session.clone(),
            ban_config: config.bans.clone(),
            transport,
            limiter: RateLimiter::new("UDP", config.udp_rate.clone()),
            bans,
            events,
            wire: tokio::sync::Mutex::new(()),
            login_lock: tokio::sync::Mutex::new(()),
            inner: Mutex::new(SessionInner::default()),
            in_flight: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
        })
    }

    pub fn bans(&self) -> &Arc<BanTracker> {
        &self.bans
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn is_logged_in(&self) -> bool {
        self.state().is_logged_in()
    }

    pub fn is_invalid_session(&self) -> bool {
        self.state() == SessionState::InvalidSession
    }

    /// Whether a wire request is awaiting its response
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> SessionStatus {
        let inner = self.inner.lock();
        SessionStatus {
            state: inner.state,
            logged_in: inner.state.is_logged_in(),
            invalid_session: inner.state == SessionState::InvalidSession,
            last_activity: inner.last_activity_at,
            auth_failures: inner.auth_failures,
            bans: self.bans.snapshot(),
        }
    }

    /// Log in unless a session is already held
    pub async fn login(&self) -> Result<()> {
        self.ensure_open()?;
        if self.is_logged_in() {
            return Ok(());
        }

        let (username, password) = self.credentials()?;

        let _login = self.login_lock.lock().await;
        if self.is_logged_in() {
            return Ok(());
        }
        self.bans.check(Axis::Udp)?;

        if !self.inner.lock().transition(SessionState::LoggingIn) {
            return Err(ProtocolError::NotLoggedIn);
        }

        info!("Logging in as {username}");
        let request = Request::auth(
            &username,
            &password,
            &self.config.client_name,
            self.config.client_version,
        );

        let result = self.exchange(&request, None).await;
        let outcome = result.and_then(|response| self.complete_login(&response));
        if outcome.is_err() {
            self.inner.lock().transition(SessionState::LoggedOut);
        }
        outcome
    }

    /// Send a request, logging in first when needed.
    ///
    /// An invalid-session reply triggers exactly one fresh login and one
    /// retry. "No such ..." replies come back as [`Lookup::NoData`].
    pub async fn dispatch(&self, request: &Request) -> Result<Lookup<RawResponse>> {
        self.ensure_open()?;
        self.bans.check(Axis::Udp)?;

        let mut relogged = false;
        loop {
            let result = self.dispatch_once(request).await;
            match result {
                Err(e) if e.requires_reauth() && !relogged => {
                    info!("{} needs a fresh session ({e}), logging in again", request.command());
                    relogged = true;
                }
                other => return other,
            }
        }
    }

    async fn dispatch_once(&self, request: &Request) -> Result<Lookup<RawResponse>> {
        let token = if request.requires_session() {
            self.login().await?;
            Some(self.token().ok_or(ProtocolError::NotLoggedIn)?)
        } else {
            None
        };

        let response = self.exchange(request, token.as_deref()).await?;
        self.classify(request, response)
    }

    fn classify(&self, request: &Request, response: RawResponse) -> Result<Lookup<RawResponse>> {
        let code = response.code;

        if INVALID_SESSION_CODES.contains(&code.0) {
            self.mark_invalid_session(code);
            return Err(ProtocolError::InvalidSession);
        }

        match code {
            ResponseCode(502..=504) => {
                error!(
                    "Registry rejected the client on {}: {code} {}",
                    request.command(),
                    response.message
                );
                Err(ProtocolError::client_rejected(code.0, response.message))
            }
            ResponseCode(c) if NO_DATA_CODES.contains(&c) => {
                debug!("{} returned no data ({code})", request.command());
                Ok(Lookup::NoData)
            }
            ResponseCode(c) if c < 500 => Ok(Lookup::Found(response)),
            _ => Err(ProtocolError::server_error(code.0, response.message)),
        }
    }

    /// Send LOGOUT if a session is held, then clear local state
    pub async fn logout(&self) -> Result<()> {
        let token = {
            let inner = self.inner.lock();
            inner.token.clone().filter(|_| inner.state.is_logged_in())
        };

        let mut result = Ok(());
        if let Some(token) = token {
            if self.bans.is_blocked(Axis::Udp) {
                debug!("Skipping LOGOUT while UDP is blocked");
            } else {
                result = self
                    .exchange(&Request::logout(), Some(&token))
                    .await
                    .map(|response| debug!("LOGOUT answered {}", response.code));
            }
            self.clear_session(false);
        }
        result
    }

    /// Drop the session, ignoring any error from the server
    pub async fn force_logout(&self) {
        if let Err(e) = self.logout().await {
            debug!("Forced logout ignored error: {e}");
        }
        // A session that was only half established still gets cleared
        self.clear_session(true);
    }

    /// Refuse any further dispatch
    pub fn close(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    /// Keepalive ping; skipped when another request holds the wire
    pub async fn ping(&self) -> Result<Option<Duration>> {
        let Ok(_wire) = self.wire.try_lock() else {
            trace!("Keepalive skipped, a request is on the wire");
            return Ok(None);
        };
        let started = Instant::now();
        let response = self.send_locked(&Request::ping(), None).await?;
        if response.code != ResponseCode::PONG {
            debug!("Unexpected ping reply {}", response.code);
        }
        Ok(Some(started.elapsed()))
    }

    /// Decide what the maintenance timer should do right now
    pub fn next_maintenance(&self) -> MaintenanceAction {
        if self.is_in_flight() {
            return MaintenanceAction::Nothing;
        }

        let inner = self.inner.lock();
        if !inner.state.is_logged_in() {
            return MaintenanceAction::Nothing;
        }

        let now = Instant::now();
        let since = |at: Option<Instant>| at.map(|at| now.duration_since(at));

        if since(inner.last_command).is_some_and(|idle| idle >= self.session_config.idle_logout())
        {
            return MaintenanceAction::ForceLogout;
        }

        if self.bans.is_blocked(Axis::Udp) {
            return MaintenanceAction::Nothing;
        }

        let interval = self.session_config.ping_interval();
        let quiet = since(inner.last_activity).is_none_or(|idle| idle >= interval);
        let ping_due = since(inner.last_ping).is_none_or(|idle| idle >= interval);
        if quiet && ping_due {
            MaintenanceAction::Ping
        } else {
            MaintenanceAction::Nothing
        }
    }

    /// Run one maintenance tick
    pub async fn run_maintenance(&self) -> MaintenanceAction {
        let action = self.next_maintenance();
        match action {
            MaintenanceAction::Nothing => {}
            MaintenanceAction::Ping => {
                if let Err(e) = self.ping().await {
                    debug!("Keepalive ping failed: {e}");
                }
            }
            MaintenanceAction::ForceLogout => {
                info!(
                    "No requests for {:?}, logging out",
                    self.session_config.idle_logout()
                );
                self.force_logout().await;
            }
        }
        action
    }

    /// Spawn the keepalive and idle-logout timer
    pub fn spawn_maintenance(self: &Arc<Self>, shutdown: SharedShutdown) -> JoinHandle<()> {
        let session = Arc::downgrade(self);
        let tick = self.session_config.keepalive_tick();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + tick, tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.wait_for_shutdown() => break,
                    _ = interval.tick() => {}
                }

                let Some(session) = session.upgrade() else {
                    break;
                };
                session.run_maintenance().await;
            }
            debug!("Session maintenance stopped");
        })
    }

    fn token(&self) -> Option<String> {
        self.inner.lock().token.clone()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.shutting_down.load(Ordering::SeqCst) {
            Err(ProtocolError::ShuttingDown)
        } else {
            Ok(())
        }
    }

    fn credentials(&self) -> Result<(String, String)> {
        let username = self
            .config
            .username
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());
        let password = self
            .config
            .password
            .as_ref()
            .filter(|password| !password.is_empty())
            .map(|password| password.expose_secret());

        match (username, password) {
            (Some(username), Some(password)) => Ok((username.to_string(), password)),
            _ => Err(ProtocolError::MissingCredentials),
        }
    }

    async fn exchange(&self, request: &Request, session: Option<&str>) -> Result<RawResponse> {
        let _wire = self.wire.lock().await;
        self.send_locked(request, session).await
    }

    /// One wire round trip; the caller holds the wire lock
    async fn send_locked(&self, request: &Request, session: Option<&str>) -> Result<RawResponse> {
        // The ban may have landed while waiting for the lock
        self.bans.check(Axis::Udp)?;

        let waited = self.limiter.ensure_rate_with(request.is_ping()).await;
        if !waited.is_zero() {
            trace!("{} held back {waited:?} by the rate limiter", request.command());
        }

        let packet = codec::encode(&request.encode(session))?;
        debug!("--> {}", request.masked(session));

        let request_timeout = self.config.request_timeout();
        let reply = {
            let _in_flight = InFlight::start(&self.in_flight);
            timeout(request_timeout, self.transport.exchange(packet)).await
        };
        self.record_activity(request.is_ping());

        let data = match reply {
            Ok(result) => result?,
            Err(_) => {
                warn!("{} timed out after {request_timeout:?}", request.command());
                return Err(ProtocolError::Timeout(request_timeout));
            }
        };

        if codec::is_ban_marker(&data) {
            let reason = "empty reply datagram";
            self.bans.set_banned(Axis::Udp, reason);
            return Err(ProtocolError::banned(Axis::Udp, reason));
        }

        let response = RawResponse::parse(&codec::decode(&data)?)?;
        debug!("<-- {} {}", response.code, response.message);

        if response.code == ResponseCode::BANNED {
            let reason = response
                .fields()
                .first()
                .filter(|reason| !reason.is_empty())
                .cloned()
                .unwrap_or_else(|| response.message.clone());
            self.bans.set_banned(Axis::Udp, reason.clone());
            return Err(ProtocolError::banned(Axis::Udp, reason));
        }

        if response.code.is_server_trouble() {
            let backoff = self.ban_config.server_busy_backoff();
            let reason = format!("{} {}", response.code, response.message);
            self.bans.start_backoff(Axis::Udp, backoff, reason.clone());
            return Err(ProtocolError::backoff(Axis::Udp, backoff, reason));
        }

        Ok(response)
    }

    fn complete_login(&self, response: &RawResponse) -> Result<()> {
        match response.code {
            ResponseCode::LOGIN_ACCEPTED | ResponseCode::LOGIN_ACCEPTED_NEW_VERSION => {
                let reply = LoginReply::from_response(response)?;
                if reply.new_version_available {
                    info!("A newer client version is available");
                }
                {
                    let mut inner = self.inner.lock();
                    inner.token = Some(reply.session);
                    inner.auth_failures = 0;
                    inner.transition(SessionState::LoggedIn);
                }
                info!("Logged in");
                self.events.emit(RegistryEvent::LoggedIn);
                Ok(())
            }
            ResponseCode::LOGIN_FAILED => Err(self.login_rejected(&response.message)),
            ResponseCode(502..=504) => {
                error!("Login refused: {} {}", response.code, response.message);
                Err(ProtocolError::client_rejected(
                    response.code.0,
                    response.message.clone(),
                ))
            }
            code => Err(ProtocolError::server_error(code.0, response.message.clone())),
        }
    }

    /// Start the login cooldown and report the failure
    fn login_rejected(&self, message: &str) -> ProtocolError {
        let failures = {
            let mut inner = self.inner.lock();
            inner.auth_failures = inner.auth_failures.saturating_add(1);
            inner.auth_failures
        };

        let cooldown = login_cooldown(
            self.ban_config.login_backoff_base(),
            failures,
            self.ban_config.ban_duration(Axis::Udp),
        );
        error!("Login rejected ({failures} in a row): {message}; next attempt in {cooldown:?}");

        self.bans
            .start_backoff(Axis::Udp, cooldown, format!("login rejected: {message}"));
        self.events.emit(RegistryEvent::LoginFailed {
            reason: message.to_string(),
            retry_in: cooldown,
        });

        ProtocolError::authentication_failed(message)
    }

    fn mark_invalid_session(&self, code: ResponseCode) {
        let mut inner = self.inner.lock();
        inner.token = None;
        if inner.state.is_logged_in() {
            warn!("Session invalidated by {code}");
            inner.transition(SessionState::InvalidSession);
        }
    }

    fn clear_session(&self, forced: bool) {
        let was_held = {
            let mut inner = self.inner.lock();
            let was_held = inner.token.take().is_some() || inner.state != SessionState::LoggedOut;
            inner.transition(SessionState::LoggedOut);
            was_held
        };

        if was_held {
            info!("Logged out{}", if forced { " (forced)" } else { "" });
            self.events.emit(RegistryEvent::LoggedOut { forced });
        }
    }

    fn record_activity(&self, ping: bool) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.last_activity = Some(now);
        inner.last_activity_at = Some(Utc::now());
        if ping {
            inner.last_ping = Some(now);
        } else {
            inner.last_command = Some(now);
        }
    }
}

/// Cooldown after the n-th consecutive rejected login: base doubled per
/// failure, capped at `max`
pub fn login_cooldown(base: Duration, failures: u32, max: Duration) -> Duration {
    let exponent = failures.saturating_sub(1).min(31);
    base.saturating_mul(1u32 << exponent).min(max)
}
