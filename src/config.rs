use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::transport::MAX_WIRE_FRAME;

/// Well-known v4 kadmin port.
pub const DEFAULT_PORT: u16 = 751;

/// Default frame bound. The wire allows up to 65535 bytes; v4 requests are
/// a few hundred bytes at most.
pub const DEFAULT_MAX_FRAME_LEN: usize = 8192;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("default realm must not be empty")]
    EmptyRealm,
    #[error("max_frame_len must be between 1 and 65535, got {0}")]
    FrameBound(usize),
}

/// Gateway settings, loaded from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
    /// Realm attached to every v4 name, which carries none of its own.
    pub realm: String,
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,
    /// Carry modification metadata and key versions across the bridge.
    #[serde(default)]
    pub extended_fields: bool,
    /// `env_logger` filter directive.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_bind_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_frame_len() -> usize {
    DEFAULT_MAX_FRAME_LEN
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl GatewayConfig {
    pub fn new(realm: impl Into<String>) -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
            realm: realm.into(),
            max_frame_len: default_max_frame_len(),
            extended_fields: false,
            log_filter: default_log_filter(),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: GatewayConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.realm.trim().is_empty() {
            return Err(ConfigError::EmptyRealm);
        }
        if self.max_frame_len == 0 || self.max_frame_len > MAX_WIRE_FRAME {
            return Err(ConfigError::FrameBound(self.max_frame_len));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.bind_port)
    }
}
