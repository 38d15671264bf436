use std::net::SocketAddr;
use std::path::PathBuf;

use netmon_auth::{IdentityProviderConfig, SessionConfig};
use netmon_storage::DynamoConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Encrypted session cookie settings
    #[serde(default)]
    pub session: SessionConfig,
    /// External identity provider (Google by default)
    #[serde(default)]
    pub provider: IdentityProviderConfig,
    /// Device record store
    #[serde(default)]
    pub store: StoreConfig,
    /// Access gateway behaviour
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Path of the JSON secrets file
    #[serde(default = "default_secrets_file")]
    pub secrets_file: PathBuf,
}

fn default_secrets_file() -> PathBuf {
    PathBuf::from(".env.json")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            session: SessionConfig::default(),
            provider: IdentityProviderConfig::default(),
            store: StoreConfig::default(),
            gateway: GatewayConfig::default(),
            secrets_file: default_secrets_file(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        self.session
            .validate()
            .map_err(|e| format!("session config error: {e}"))?;
        if self.provider.scopes.is_empty() {
            return Err("provider.scopes must not be empty".into());
        }
        if self.gateway.collection.trim().is_empty() {
            return Err("gateway.collection must not be empty".into());
        }
        if self.store.dynamodb.max_pages == 0 {
            return Err("store.dynamodb.max_pages must be > 0".into());
        }
        if self.store.backend == StoreBackend::Memory && self.store.seed_file.is_none() {
            return Err("store.backend = \"memory\" requires store.seed_file".into());
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Dynamodb,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default)]
    pub dynamodb: DynamoConfig,
    /// Seed data for the memory backend: `{"collection": [record, ...]}`
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Collection (table) holding the device records
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Address named on the access-denied page
    #[serde(default = "default_contact_email")]
    pub contact_email: String,
}

fn default_collection() -> String {
    "netmon_devices".into()
}
fn default_contact_email() -> String {
    "nanderson7@gmail.com".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            contact_email: default_contact_email(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or("netmon.toml"));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., NETMON__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("NETMON")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.addr().to_string(), "127.0.0.1:5000");
        assert_eq!(cfg.gateway.collection, "netmon_devices");
        assert_eq!(cfg.secrets_file, PathBuf::from(".env.json"));
    }

    #[test]
    fn test_memory_backend_requires_seed() {
        let mut cfg = AppConfig::default();
        cfg.store.backend = StoreBackend::Memory;
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("seed_file"));

        cfg.store.seed_file = Some(PathBuf::from("devices.json"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut cfg = AppConfig::default();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().is_err());
    }
}
