//! Configuration for Dialcast

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Telephony provider configuration
    #[serde(default)]
    pub telephony: TelephonyConfig,

    /// Dispatch worker configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Publicly reachable base URL, used to build the signaling and
    /// status-callback URLs handed to the telephony provider
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            public_url: default_public_url(),
        }
    }
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database backend: "postgres"
    #[serde(default = "default_db_backend")]
    pub backend: String,

    /// Database URL
    pub url: Option<String>,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_db_backend() -> String {
    "postgres".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API server port
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

fn default_api_port() -> u16 {
    8080
}

/// Telephony provider configuration (LaML-compatible REST API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelephonyConfig {
    /// Provider space URL, e.g. "example.signalwire.com"
    #[serde(default = "default_space_url")]
    pub space_url: String,

    /// Project / account identifier
    #[serde(default)]
    pub project_id: String,

    /// API token paired with the project identifier
    #[serde(default)]
    pub api_token: String,

    /// SIP domain where voice agents are reachable
    #[serde(default = "default_agent_sip_domain")]
    pub agent_sip_domain: String,
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            space_url: default_space_url(),
            project_id: String::new(),
            api_token: String::new(),
            agent_sip_domain: default_agent_sip_domain(),
        }
    }
}

fn default_space_url() -> String {
    "example.signalwire.com".to_string()
}

fn default_agent_sip_domain() -> String {
    "sip.example.com".to_string()
}

/// Dispatch worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Seconds between sweep ticks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Maximum recipients claimed per dispatch unit
    #[serde(default = "default_chunk_size")]
    pub chunk_size: i64,

    /// Delay between call originations within one chunk, in milliseconds.
    /// Each recipient costs two originations against the provider's rate
    /// limit, so chunks are paced rather than fired at once.
    #[serde(default = "default_inter_call_delay")]
    pub inter_call_delay_ms: u64,

    /// Hard upper bound on simultaneous in-flight calls per campaign,
    /// regardless of the campaign's requested concurrency
    #[serde(default = "default_system_ceiling")]
    pub system_ceiling: i64,

    /// Maximum recipients accepted per campaign
    #[serde(default = "default_max_recipients")]
    pub max_recipients: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            chunk_size: default_chunk_size(),
            inter_call_delay_ms: default_inter_call_delay(),
            system_ceiling: default_system_ceiling(),
            max_recipients: default_max_recipients(),
        }
    }
}

fn default_poll_interval() -> u64 {
    60
}

fn default_chunk_size() -> i64 {
    5
}

fn default_inter_call_delay() -> u64 {
    2000
}

fn default_system_ceiling() -> i64 {
    5
}

fn default_max_recipients() -> usize {
    500
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from default file locations, honoring the
    /// DATABASE_URL environment variable when set
    pub fn load() -> crate::Result<Self> {
        let paths = [
            std::path::PathBuf::from("./config.toml"),
            std::path::PathBuf::from("/etc/dialcast/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                let mut config = Self::from_file(&path)?;
                if let Ok(url) = std::env::var("DATABASE_URL") {
                    config.database.url = Some(url);
                }
                return Ok(config);
            }
        }

        Err(crate::Error::Config(
            "No configuration file found".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let server = ServerConfig::default();
        assert_eq!(server.hostname, "localhost");
        assert_eq!(server.public_url, "http://localhost:8080");

        let dispatch = DispatchConfig::default();
        assert_eq!(dispatch.chunk_size, 5);
        assert_eq!(dispatch.inter_call_delay_ms, 2000);
        assert_eq!(dispatch.system_ceiling, 5);
        assert_eq!(dispatch.max_recipients, 500);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
hostname = "calls.example.com"
public_url = "https://calls.example.com"

[database]
backend = "postgres"
url = "postgres://localhost/dialcast"

[telephony]
space_url = "acme.signalwire.com"
project_id = "proj-123"
api_token = "tok-456"

[dispatch]
poll_interval_secs = 30
system_ceiling = 3
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.hostname, "calls.example.com");
        assert_eq!(config.database.backend, "postgres");
        assert_eq!(config.telephony.space_url, "acme.signalwire.com");
        assert_eq!(config.dispatch.poll_interval_secs, 30);
        assert_eq!(config.dispatch.system_ceiling, 3);
        // Unset sections fall back to defaults
        assert_eq!(config.dispatch.chunk_size, 5);
        assert_eq!(config.api.port, 8080);
    }
}
