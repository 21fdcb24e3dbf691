use crate::application_impl::{DeviceTtls, JwtConfig, SessionTtls, TokenSecrets};
use crate::domain_port::JtiTtlPolicy;
use anyhow::{Result, anyhow};
use config::{Config, Environment, File, Source};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// String that never shows up in `Debug` output.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub http: Http,
    pub log: Log,
    pub redis: Redis,
    pub stats: Stats,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub registry: String, // "memory" or "redis"
    pub secrets: Secrets,
    /// Presented by upstream credential services when they request issuance.
    pub service_key: Secret,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub device_connection_ttl_secs: u64,
    pub device_refresh_ttl_secs: u64,
    pub leeway_secs: u64,
    #[serde(default = "default_clock_skew_buffer_secs")]
    pub clock_skew_buffer_secs: u64,
    #[serde(default = "default_jti_fallback_ttl_secs")]
    pub jti_fallback_ttl_secs: u64,
    pub registry_timeout_ms: u64,
    #[serde(default)]
    pub default_roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct Secrets {
    pub user_access: Secret,
    pub user_refresh: Secret,
    pub device_connection: Secret,
    pub device_refresh: Secret,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub cert_path: String,
    pub key_path: String,
    pub address: String,
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Redis {
    pub dsn: Secret,
    pub prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct Stats {
    pub interval_secs: u64,
}

fn default_clock_skew_buffer_secs() -> u64 {
    5 * 60
}

fn default_jti_fallback_ttl_secs() -> u64 {
    60
}

fn default_secure_cookies() -> bool {
    true
}

impl Auth {
    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig {
            secrets: TokenSecrets {
                user_access: self.secrets.user_access.expose().as_bytes().to_vec(),
                user_refresh: self.secrets.user_refresh.expose().as_bytes().to_vec(),
                device_connection: self.secrets.device_connection.expose().as_bytes().to_vec(),
                device_refresh: self.secrets.device_refresh.expose().as_bytes().to_vec(),
            },
            leeway: Duration::from_secs(self.leeway_secs),
        }
    }

    pub fn session_ttls(&self) -> SessionTtls {
        SessionTtls {
            access_ttl: Duration::from_secs(self.access_ttl_secs),
            refresh_ttl: Duration::from_secs(self.refresh_ttl_secs),
        }
    }

    pub fn device_ttls(&self) -> DeviceTtls {
        DeviceTtls {
            connection_ttl: Duration::from_secs(self.device_connection_ttl_secs),
            refresh_ttl: Duration::from_secs(self.device_refresh_ttl_secs),
        }
    }

    pub fn ttl_policy(&self) -> JtiTtlPolicy {
        JtiTtlPolicy {
            fallback: Duration::from_secs(self.jti_fallback_ttl_secs),
            clock_skew_buffer: Duration::from_secs(self.clock_skew_buffer_secs),
        }
    }

    pub fn registry_timeout(&self) -> Duration {
        Duration::from_millis(self.registry_timeout_ms)
    }
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

const ENV_PREFIX: &str = "MESHPOINT";

/// Load the settings file, then let `MESHPOINT__SECTION__KEY` variables
/// override it (secrets normally arrive this way).
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);
    load(File::with_name(path))
}

#[cfg(test)]
pub fn parse_settings_str(toml: &str) -> Result<Settings> {
    load(File::from_str(toml, config::FileFormat::Toml))
}

fn load<S>(file: S) -> Result<Settings>
where
    S: Source + Send + Sync + 'static,
{
    let settings: Settings = Config::builder()
        .add_source(file)
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
