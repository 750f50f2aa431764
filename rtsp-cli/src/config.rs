//! Configuration file support for the RTSP CLI

use rtsp::SessionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

/// Server to stream from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host name or address
    pub host: String,
    /// RTSP control port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Resource named in SETUP (e.g. "movie.Mjpeg")
    pub resource: String,
}

fn default_port() -> u16 {
    554
}

/// Engine overrides; anything left out keeps the engine default
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionOverrides {
    /// Local address for the data socket
    pub bind: Option<IpAddr>,
    /// Data receive timeout in milliseconds
    pub recv_timeout_ms: Option<u64>,
    /// Minimum spacing between receive-loop iterations in milliseconds
    pub poll_interval_ms: Option<u64>,
    /// Rate sampling interval in milliseconds
    pub sample_interval_ms: Option<u64>,
    /// Reorder buffer low-watermark
    pub reorder_depth: Option<usize>,
    /// Largest accepted datagram in bytes
    pub max_datagram_size: Option<usize>,
    /// Expected RTP payload type
    pub payload_type: Option<u8>,
    /// Kernel receive buffer size in bytes
    pub recv_buffer_size: Option<usize>,
}

/// Combined configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub session: Option<SessionOverrides>,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Example configuration streaming a local test server
    pub fn example() -> Self {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8554,
                resource: "movie.Mjpeg".to_string(),
            },
            session: Some(SessionOverrides {
                recv_timeout_ms: Some(1000),
                reorder_depth: Some(15),
                ..SessionOverrides::default()
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.is_empty() {
            return Err(ConfigError::Invalid("server.host is empty".into()));
        }
        if self.server.resource.is_empty() {
            return Err(ConfigError::Invalid("server.resource is empty".into()));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }
        self.session_config().map(|_| ())
    }

    /// Engine configuration with the file's overrides applied
    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        let overrides = self.session.clone().unwrap_or_default();
        overrides.apply(SessionConfig::default())
    }
}

impl SessionOverrides {
    pub fn apply(&self, mut config: SessionConfig) -> Result<SessionConfig, ConfigError> {
        if let Some(bind) = self.bind {
            config.data_bind_addr = bind;
        }
        if let Some(ms) = self.recv_timeout_ms {
            config.recv_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.poll_interval_ms {
            config.min_poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.sample_interval_ms {
            config.sample_interval = Duration::from_millis(ms);
        }
        if let Some(depth) = self.reorder_depth {
            config.reorder_depth = depth;
        }
        if let Some(size) = self.max_datagram_size {
            config.max_datagram_size = size;
        }
        if let Some(pt) = self.payload_type {
            config.payload_type = pt;
        }
        if self.recv_buffer_size.is_some() {
            config.recv_buffer_size = self.recv_buffer_size;
        }

        config
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config() {
        let config = Config::example();
        assert!(config.validate().is_ok());

        let session = config.session_config().unwrap();
        assert_eq!(session.recv_timeout, Duration::from_secs(1));
        assert_eq!(session.reorder_depth, 15);
    }

    #[test]
    fn test_serialize_deserialize() {
        let config = Config::example();
        let toml = toml::to_string(&config).unwrap();
        let parsed = Config::from_toml(&toml).unwrap();

        assert_eq!(parsed.server.resource, "movie.Mjpeg");
        assert_eq!(parsed.server.port, 8554);
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            host = "media.local"
            resource = "movie.Mjpeg"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 554);
        let session = config.session_config().unwrap();
        assert_eq!(session.min_poll_interval, Duration::from_millis(20));
        assert_eq!(session.payload_type, 26);
    }

    #[test]
    fn test_overrides_applied() {
        let config = Config::from_toml(
            r#"
            [server]
            host = "127.0.0.1"
            port = 8554
            resource = "clip"

            [session]
            bind = "127.0.0.1"
            poll_interval_ms = 5
            reorder_depth = 4
            "#,
        )
        .unwrap();

        let session = config.session_config().unwrap();
        assert_eq!(session.data_bind_addr, "127.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(session.min_poll_interval, Duration::from_millis(5));
        assert_eq!(session.reorder_depth, 4);
    }

    #[test]
    fn test_zero_watermark_rejected() {
        let err = Config::from_toml(
            r#"
            [server]
            host = "127.0.0.1"
            resource = "clip"

            [session]
            reorder_depth = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let overrides = SessionOverrides {
            recv_timeout_ms: Some(0),
            ..SessionOverrides::default()
        };
        assert!(overrides.apply(SessionConfig::default()).is_err());
    }

    #[test]
    fn test_missing_server_is_parse_error() {
        assert!(matches!(
            Config::from_toml("[session]\nreorder_depth = 3\n"),
            Err(ConfigError::Toml(_))
        ));
    }
}
