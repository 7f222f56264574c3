//! Core configuration
//!
//! All values are supplied externally (the CLI layers defaults, a TOML file and
//! environment variables on top of each other). Durations are stored as
//! integers with the unit in the field name so the TOML stays readable.

use crate::error::ValidationError;
use crate::security::SecureString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard ceiling for the idle force-logout period
pub const MAX_IDLE_LOGOUT_SECS: u64 = 600;

/// Complete configuration of the registry client and the command queues
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub registry: RegistryConfig,
    pub udp_rate: RateLimitConfig,
    pub http_rate: RateLimitConfig,
    pub image_rate: RateLimitConfig,
    pub bans: BanConfig,
    pub session: SessionConfig,
    pub queues: QueueConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            udp_rate: RateLimitConfig::udp(),
            http_rate: RateLimitConfig::http(),
            image_rate: RateLimitConfig::images(),
            bans: BanConfig::default(),
            session: SessionConfig::default(),
            queues: QueueConfig::default(),
        }
    }
}

/// Registry account, client identity and endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub username: Option<String>,
    pub password: Option<SecureString>,
    pub client_name: String,
    pub client_version: u32,
    pub udp_host: String,
    pub udp_port: u16,
    /// Local UDP port, 0 picks an ephemeral one
    pub local_port: u16,
    pub http_base_url: String,
    pub request_timeout_secs: u64,
    pub http_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            client_name: "anilib".to_string(),
            client_version: 1,
            udp_host: crate::protocol::DEFAULT_SERVER.to_string(),
            udp_port: crate::protocol::DEFAULT_PORT,
            local_port: 0,
            http_base_url: crate::protocol::DEFAULT_HTTP_URL.to_string(),
            request_timeout_secs: 30,
            http_timeout_secs: 20,
        }
    }
}

impl RegistryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Server address in `host:port` form
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.udp_host, self.udp_port)
    }

    /// Whether both username and password are present and non-empty
    pub fn has_credentials(&self) -> bool {
        let user_ok = self
            .username
            .as_deref()
            .is_some_and(|u| !u.trim().is_empty());
        let pass_ok = self.password.as_ref().is_some_and(|p| !p.is_empty());
        user_ok && pass_ok
    }
}

/// Two-tier pacing constants for one transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub short_delay_ms: u64,
    pub long_delay_ms: u64,
    /// Continuous activity after which the long delay applies
    pub short_period_secs: u64,
    /// Inactivity after which a burst counts as fresh
    pub reset_period_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::udp()
    }
}

impl RateLimitConfig {
    /// Pacing for the UDP command transport
    pub fn udp() -> Self {
        Self {
            short_delay_ms: 2_500,
            long_delay_ms: 4_500,
            short_period_secs: 60 * 60,
            reset_period_secs: 30 * 60,
        }
    }

    /// Pacing for registry HTTP document requests
    pub fn http() -> Self {
        Self {
            short_delay_ms: 2_000,
            long_delay_ms: 4_000,
            short_period_secs: 60 * 60,
            reset_period_secs: 30 * 60,
        }
    }

    /// Pacing for image downloads
    pub fn images() -> Self {
        Self {
            short_delay_ms: 500,
            long_delay_ms: 1_500,
            short_period_secs: 60 * 60,
            reset_period_secs: 30 * 60,
        }
    }

    pub fn short_delay(&self) -> Duration {
        Duration::from_millis(self.short_delay_ms)
    }

    pub fn long_delay(&self) -> Duration {
        Duration::from_millis(self.long_delay_ms)
    }

    pub fn short_period(&self) -> Duration {
        Duration::from_secs(self.short_period_secs)
    }

    pub fn reset_period(&self) -> Duration {
        Duration::from_secs(self.reset_period_secs)
    }

    fn validate(&self, name: &str) -> Result<(), ValidationError> {
        if self.short_delay_ms == 0 {
            return Err(ValidationError::invalid_configuration(&format!(
                "{name}.short_delay_ms must be greater than 0"
            )));
        }
        if self.long_delay_ms < self.short_delay_ms {
            return Err(ValidationError::invalid_configuration(&format!(
                "{name}.long_delay_ms must not be shorter than short_delay_ms"
            )));
        }
        if self.reset_period_secs == 0 || self.short_period_secs == 0 {
            return Err(ValidationError::invalid_configuration(&format!(
                "{name} periods must be greater than 0"
            )));
        }
        Ok(())
    }
}

/// Ban and backoff durations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BanConfig {
    pub udp_ban_secs: u64,
    pub http_ban_secs: u64,
    /// Pause applied when the registry reports it is overloaded
    pub server_busy_backoff_secs: u64,
    /// First cooldown after a rejected login, doubled on each rejection
    pub login_backoff_base_secs: u64,
}

impl Default for BanConfig {
    fn default() -> Self {
        Self {
            udp_ban_secs: 12 * 60 * 60,
            http_ban_secs: 12 * 60 * 60,
            server_busy_backoff_secs: 5 * 60,
            login_backoff_base_secs: 5 * 60,
        }
    }
}

impl BanConfig {
    pub fn ban_duration(&self, axis: crate::protocol::Axis) -> Duration {
        match axis {
            crate::protocol::Axis::Udp => Duration::from_secs(self.udp_ban_secs),
            crate::protocol::Axis::Http => Duration::from_secs(self.http_ban_secs),
        }
    }

    pub fn server_busy_backoff(&self) -> Duration {
        Duration::from_secs(self.server_busy_backoff_secs)
    }

    pub fn login_backoff_base(&self) -> Duration {
        Duration::from_secs(self.login_backoff_base_secs)
    }
}

/// Keepalive and idle-logout timers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub keepalive_tick_secs: u64,
    pub ping_interval_secs: u64,
    pub idle_logout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keepalive_tick_secs: 5,
            ping_interval_secs: 45,
            idle_logout_secs: 5 * 60,
        }
    }
}

impl SessionConfig {
    pub fn keepalive_tick(&self) -> Duration {
        Duration::from_secs(self.keepalive_tick_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn idle_logout(&self) -> Duration {
        Duration::from_secs(self.idle_logout_secs)
    }
}

/// Queue processor tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub poll_interval_secs: u64,
    pub max_transient_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub shutdown_grace_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            max_transient_retries: 3,
            retry_base_delay_ms: 2_000,
            retry_max_delay_ms: 60_000,
            shutdown_grace_secs: 30,
        }
    }
}

impl QueueConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Exponential retry delay for the given attempt (0-based), capped at the max delay
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = self.retry_base_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.retry_max_delay_ms))
    }
}

impl CoreConfig {
    /// Check values that would make the client misbehave
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.registry.client_name.trim().is_empty() {
            return Err(ValidationError::invalid_configuration(
                "registry.client_name must not be empty",
            ));
        }
        if self.registry.request_timeout_secs == 0 || self.registry.http_timeout_secs == 0 {
            return Err(ValidationError::invalid_configuration(
                "registry timeouts must be greater than 0",
            ));
        }

        self.udp_rate.validate("udp_rate")?;
        self.http_rate.validate("http_rate")?;
        self.image_rate.validate("image_rate")?;

        if self.bans.udp_ban_secs == 0 || self.bans.http_ban_secs == 0 {
            return Err(ValidationError::invalid_configuration(
                "ban durations must be greater than 0",
            ));
        }
        if self.session.keepalive_tick_secs == 0 {
            return Err(ValidationError::invalid_configuration(
                "session.keepalive_tick_secs must be greater than 0",
            ));
        }
        if self.session.idle_logout_secs > MAX_IDLE_LOGOUT_SECS {
            return Err(ValidationError::invalid_configuration(&format!(
                "session.idle_logout_secs must not exceed {MAX_IDLE_LOGOUT_SECS}"
            )));
        }
        if self.session.ping_interval_secs >= self.session.idle_logout_secs {
            return Err(ValidationError::invalid_configuration(
                "session.ping_interval_secs must be shorter than idle_logout_secs",
            ));
        }
        if self.queues.poll_interval_secs == 0 {
            return Err(ValidationError::invalid_configuration(
                "queues.poll_interval_secs must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Create a test configuration
    pub fn test() -> Self {
        Self {
            registry: RegistryConfig {
                username: Some("testuser".to_string()),
                password: Some(SecureString::new("testpass")),
                client_name: "testclient".to_string(),
                client_version: 1,
                udp_host: "127.0.0.1".to_string(),
                udp_port: 9999,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Axis;

    #[test]
    fn test_default_config_is_valid() {
        let config = CoreConfig::default();
        config.validate().unwrap();

        assert_eq!(config.udp_rate, RateLimitConfig::udp());
        assert_eq!(config.http_rate, RateLimitConfig::http());
        assert_eq!(config.image_rate, RateLimitConfig::images());
        assert_eq!(
            config.bans.ban_duration(Axis::Udp),
            Duration::from_secs(12 * 3600)
        );
        assert!(!config.registry.has_credentials());
    }

    #[test]
    fn test_credentials_detection() {
        let mut registry = CoreConfig::test().registry;
        assert!(registry.has_credentials());

        registry.username = Some("   ".to_string());
        assert!(!registry.has_credentials());

        registry.username = Some("user".to_string());
        registry.password = Some(SecureString::new(""));
        assert!(!registry.has_credentials());
    }

    #[test]
    fn test_rejects_inverted_rate_tiers() {
        let mut config = CoreConfig::default();
        config.udp_rate.long_delay_ms = 1_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("udp_rate.long_delay_ms"));
    }

    #[test]
    fn test_rejects_idle_logout_above_ceiling() {
        let mut config = CoreConfig::default();
        config.session.idle_logout_secs = MAX_IDLE_LOGOUT_SECS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_delay_is_exponential_and_capped() {
        let queues = QueueConfig::default();
        assert_eq!(queues.retry_delay(0), Duration::from_secs(2));
        assert_eq!(queues.retry_delay(1), Duration::from_secs(4));
        assert_eq!(queues.retry_delay(3), Duration::from_secs(16));
        assert_eq!(queues.retry_delay(10), Duration::from_secs(60));
        assert_eq!(queues.retry_delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_toml_like_input_uses_defaults() {
        let json = r#"{ "registry": { "username": "alice" }, "http_rate": { "short_delay_ms": 3000, "long_delay_ms": 5000, "short_period_secs": 60, "reset_period_secs": 60 } }"#;
        let config: CoreConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.registry.username.as_deref(), Some("alice"));
        assert_eq!(config.registry.udp_port, crate::protocol::DEFAULT_PORT);
        assert_eq!(config.http_rate.short_delay_ms, 3000);
        assert_eq!(config.image_rate, RateLimitConfig::images());
    }
}
