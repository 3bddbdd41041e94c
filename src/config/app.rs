//! Application configuration loading from config.toml and the environment.
//!
//! Every section of the file is optional. Values from the environment (usually
//! populated from `.env`) take precedence over the file, so deployments can keep
//! the password hash out of version control.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings
    pub server: ServerConfig,
    /// Administrator credential
    pub admin: AdminConfig,
    /// Initial venue display strings
    pub venue: VenueConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind, e.g. `0.0.0.0:5000`
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
        }
    }
}

/// The single administrative account
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AdminConfig {
    /// Login name
    pub username: String,
    /// Argon2 PHC string, generate one with the `gen_hash` binary
    pub password_hash: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password_hash: None,
        }
    }
}

/// Venue strings written to the settings table on first start
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VenueConfig {
    /// Venue name shown to customers
    pub name: String,
    /// Greeting on the ticket page
    pub welcome_message: String,
    /// Heading of the public call display
    pub display_header: String,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            name: "Our Restaurant".to_string(),
            welcome_message: "Welcome! Take a ticket and we will call your number.".to_string(),
            display_header: "Now Calling".to_string(),
        }
    }
}

impl AppConfig {
    /// Applies `QUEUE_*` overrides using the given variable lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind_address) = lookup("QUEUE_BIND_ADDRESS") {
            self.server.bind_address = bind_address;
        }
        if let Some(username) = lookup("QUEUE_ADMIN_USERNAME") {
            self.admin.username = username;
        }
        if let Some(hash) = lookup("QUEUE_ADMIN_PASSWORD_HASH") {
            self.admin.password_hash = Some(hash);
        }
    }

    /// Returns the configured password hash or a configuration error.
    pub fn admin_password_hash(&self) -> Result<&str> {
        self.admin
            .password_hash
            .as_deref()
            .filter(|hash| !hash.trim().is_empty())
            .ok_or_else(|| Error::Config {
                message: "admin password hash is not configured (set [admin].password_hash or QUEUE_ADMIN_PASSWORD_HASH)".to_string(),
            })
    }
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path.as_ref().display()),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path.as_ref().display()),
    })
}

/// Loads the full application configuration.
///
/// Reads the file named by `QUEUE_CONFIG` (default `config.toml`); a missing file
/// falls back to defaults. Environment overrides are applied last.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var("QUEUE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let mut config = if Path::new(&path).exists() {
        debug!("Loading configuration from {}", path);
        load_config(&path)?
    } else {
        warn!("Config file {} not found, using defaults", path);
        AppConfig::default()
    };

    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}
