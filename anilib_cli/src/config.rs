//! Layered CLI configuration
//!
//! Defaults, then the TOML file, then `ANILIB_` environment variables
//! (`__` separates nesting levels, e.g. `ANILIB_REGISTRY__USERNAME`).

use crate::paths;
use anilib_core::config::{
    BanConfig, CoreConfig, QueueConfig, RateLimitConfig, RegistryConfig, SessionConfig,
    MAX_IDLE_LOGOUT_SECS,
};
use anilib_core::security::SecureString;
use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::{Confirm, Input, Password};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Shown instead of secrets in `config get` and `config list`
const MASK: &str = "********";

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default = "RateLimitConfig::udp")]
    pub udp_rate: RateLimitConfig,

    #[serde(default = "RateLimitConfig::http")]
    pub http_rate: RateLimitConfig,

    #[serde(default = "RateLimitConfig::images")]
    pub image_rate: RateLimitConfig,

    #[serde(default)]
    pub bans: BanConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub queues: QueueConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct StorageConfig {
    /// Queue database; the platform data directory when unset
    pub database_path: Option<PathBuf>,
    /// Where fetched documents are written; the data directory when unset
    pub documents_dir: Option<PathBuf>,
    /// Default target for image downloads queued without a destination
    pub images_dir: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub color_enabled: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            color_enabled: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let core = CoreConfig::default();
        Self {
            registry: core.registry,
            udp_rate: core.udp_rate,
            http_rate: core.http_rate,
            image_rate: core.image_rate,
            bans: core.bans,
            session: core.session,
            queues: core.queues,
            storage: StorageConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl AppConfig {
    /// The part of the configuration the core library consumes
    pub fn core(&self) -> CoreConfig {
        CoreConfig {
            registry: self.registry.clone(),
            udp_rate: self.udp_rate.clone(),
            http_rate: self.http_rate.clone(),
            image_rate: self.image_rate.clone(),
            bans: self.bans.clone(),
            session: self.session.clone(),
            queues: self.queues.clone(),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(paths::get_database_path)
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.storage
            .documents_dir
            .clone()
            .unwrap_or_else(paths::get_documents_dir)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.storage
            .images_dir
            .clone()
            .unwrap_or_else(paths::get_images_dir)
    }
}

/// Configuration manager that handles XDG-compliant paths and layered configuration
pub struct ConfigManager {
    config_path: PathBuf,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config_path: paths::get_config_path(),
        }
    }

    /// Create a ConfigManager with a specific path (for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    pub fn get_config_path(&self) -> PathBuf {
        self.config_path.clone()
    }

    /// Load configuration with layered priority: ENV > File > Defaults
    pub fn load(&self) -> Result<AppConfig> {
        let mut figment = Figment::new();

        // Layer 1: Defaults
        figment = figment.merge(Serialized::defaults(AppConfig::default()));

        // Layer 2: Config file (if exists)
        if self.config_path.exists() {
            figment = figment.merge(Toml::file(&self.config_path));
        }

        // Layer 3: Environment variables
        figment = figment.merge(Env::prefixed("ANILIB_").split("__"));

        figment.extract().context("Failed to load configuration")
    }

    /// Get a configuration value by key (dot notation); secrets are masked
    pub fn get(&self, key: &str) -> Result<String> {
        let value = self.load_value()?;

        let mut current = &value;
        for part in key.split('.') {
            match current {
                toml::Value::Table(table) => {
                    current = table
                        .get(part)
                        .ok_or_else(|| anyhow::anyhow!("Key '{}' not found", key))?;
                }
                _ => anyhow::bail!("Invalid key path: {}", key),
            }
        }

        let rendered = match current {
            toml::Value::String(s) => s.clone(),
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            _ => anyhow::bail!("Value at '{}' is not a simple type", key),
        };
        Ok(if is_secret(key) { MASK.to_string() } else { rendered })
    }

    /// Set a configuration value by key (dot notation)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_config_value(key, value)?;

        let mut config = if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)?;
            toml::from_str(&content)?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };

        let parts: Vec<&str> = key.split('.').collect();
        let Some((last, parents)) = parts.split_last() else {
            anyhow::bail!("Empty key");
        };

        let mut current = &mut config;
        for part in parents {
            let toml::Value::Table(table) = current else {
                anyhow::bail!("Invalid key path: expected table at '{}'", part);
            };
            current = table
                .entry(part.to_string())
                .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
        }
        let toml::Value::Table(table) = current else {
            anyhow::bail!("Cannot set value on non-table");
        };
        table.insert(last.to_string(), parse_config_value(key, value)?);

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.config_path, toml::to_string_pretty(&config)?)?;

        // Reject files the loader would not accept
        self.load().map(|_| ())
    }

    /// List all configuration values; secrets are masked
    pub fn list(&self) -> Result<Vec<(String, String)>> {
        let value = self.load_value()?;

        let mut items = Vec::new();
        collect_values(&value, String::new(), &mut items);
        for (key, value) in &mut items {
            if is_secret(key) {
                *value = MASK.to_string();
            }
        }
        items.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(items)
    }

    fn load_value(&self) -> Result<toml::Value> {
        let config = self.load()?;
        let toml_string = toml::to_string(&config)?;
        Ok(toml::from_str(&toml_string)?)
    }
}

fn is_secret(key: &str) -> bool {
    key.ends_with("password")
}

/// Recursively collect all key-value pairs from TOML
fn collect_values(value: &toml::Value, prefix: String, items: &mut Vec<(String, String)>) {
    match value {
        toml::Value::Table(table) => {
            for (key, val) in table {
                let new_prefix = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                collect_values(val, new_prefix, items);
            }
        }
        toml::Value::String(s) => items.push((prefix, s.clone())),
        toml::Value::Integer(i) => items.push((prefix, i.to_string())),
        toml::Value::Float(f) => items.push((prefix, f.to_string())),
        toml::Value::Boolean(b) => items.push((prefix, b.to_string())),
        _ => {} // Skip arrays and other complex types
    }
}

fn validate_config_value(key: &str, value: &str) -> Result<()> {
    match key {
        "registry.udp_port" | "registry.local_port" => {
            let _: u16 = value.parse().context("port must be between 0 and 65535")?;
        }
        "registry.client_version" => {
            let _: u32 = value
                .parse()
                .context("client_version must be a non-negative integer")?;
        }
        "registry.client_name" => {
            if value.trim().is_empty() {
                anyhow::bail!("client_name must not be empty");
            }
        }
        "session.idle_logout_secs" => {
            let secs: u64 = value
                .parse()
                .context("idle_logout_secs must be a positive integer")?;
            if secs > MAX_IDLE_LOGOUT_SECS {
                anyhow::bail!("idle_logout_secs must not exceed {MAX_IDLE_LOGOUT_SECS}");
            }
        }
        k if k.ends_with("_secs") || k.ends_with("_ms") => {
            let duration: u64 = value.parse().context("Expected a positive integer")?;
            if duration == 0 {
                anyhow::bail!("{k} must be greater than 0");
            }
        }
        "output.color_enabled" => {
            let _: bool = value.parse().context("Value must be 'true' or 'false'")?;
        }
        _ => {} // No validation for unknown keys
    }
    Ok(())
}

/// Parse a value to the appropriate TOML type
fn parse_config_value(key: &str, value: &str) -> Result<toml::Value> {
    match key {
        k if k.ends_with("_secs")
            || k.ends_with("_ms")
            || k.ends_with("_port")
            || k.ends_with("_version")
            || k.ends_with("_retries") =>
        {
            let num: i64 = value.parse().context("Expected integer value")?;
            Ok(toml::Value::Integer(num))
        }
        k if k.ends_with("_enabled") => {
            let bool_val: bool = value
                .parse()
                .context("Expected boolean value (true/false)")?;
            Ok(toml::Value::Boolean(bool_val))
        }
        // Force string types for these fields
        "registry.username" | "registry.password" | "registry.client_name" => {
            Ok(toml::Value::String(value.to_string()))
        }
        _ => {
            if let Ok(b) = value.parse::<bool>() {
                Ok(toml::Value::Boolean(b))
            } else if let Ok(i) = value.parse::<i64>() {
                Ok(toml::Value::Integer(i))
            } else {
                Ok(toml::Value::String(value.to_string()))
            }
        }
    }
}

/// Load the configuration from the default location
pub fn get_config() -> Result<AppConfig> {
    ConfigManager::new().load()
}

/// Interactive setup wizard for registry credentials and client identity
pub fn interactive_init(manager: &mut ConfigManager, force: bool) -> Result<()> {
    println!("{}", "anilib setup".bold());
    println!("{}", "============".bold());
    println!();

    let existing = manager.load()?;
    if !force && existing.registry.has_credentials() {
        let reconfigure = Confirm::new()
            .with_prompt("Configuration already exists. Reconfigure?")
            .default(false)
            .interact()
            .context("Failed to read input")?;

        if !reconfigure {
            println!("Setup cancelled.");
            return Ok(());
        }
    }

    println!("{}", "Registry account".bold());
    let mut username = Input::<String>::new().with_prompt("Username");
    if let Some(current) = existing.registry.username.clone() {
        username = username.default(current);
    }
    let username = username.interact_text().context("Failed to read username")?;

    let password = SecureString::new(
        Password::new()
            .with_prompt("Password")
            .interact()
            .context("Failed to read password")?,
    );

    println!();
    println!("{}", "Registered client".bold());
    let client_name: String = Input::new()
        .with_prompt("Client name")
        .default(existing.registry.client_name.clone())
        .interact_text()
        .context("Failed to read client name")?;
    let client_version: u32 = Input::new()
        .with_prompt("Client version")
        .default(existing.registry.client_version)
        .interact_text()
        .context("Failed to read client version")?;

    manager.set("registry.username", &username)?;
    manager.set("registry.password", &password.expose_secret())?;
    manager.set("registry.client_name", &client_name)?;
    manager.set("registry.client_version", &client_version.to_string())?;

    println!();
    println!(
        "{} Configuration saved to {}",
        "✓".green(),
        manager.get_config_path().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_core_defaults() {
        let config = AppConfig::default();
        let core = CoreConfig::default();
        assert_eq!(config.udp_rate, core.udp_rate);
        assert_eq!(config.http_rate, core.http_rate);
        assert!(config.core().validate().is_ok());
    }

    #[test]
    fn test_password_is_masked() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = ConfigManager::with_path(temp_dir.path().join("config.toml"));

        manager.set("registry.password", "hunter2").unwrap();

        assert_eq!(manager.get("registry.password").unwrap(), MASK);
        let listed = manager.list().unwrap();
        assert!(listed.iter().all(|(_, value)| value != "hunter2"));
        assert_eq!(
            manager.load().unwrap().registry.password.unwrap().expose_secret(),
            "hunter2"
        );
    }

    #[test]
    fn test_idle_logout_ceiling() {
        assert!(validate_config_value("session.idle_logout_secs", "600").is_ok());
        assert!(validate_config_value("session.idle_logout_secs", "601").is_err());
        assert!(validate_config_value("queues.poll_interval_secs", "0").is_err());
    }
}
