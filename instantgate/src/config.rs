//! Server configuration.
//!
//! Configuration loads from an optional YAML file and is then overridden by
//! environment variables of the form `INSTANTGATE_<SECTION>_<FIELD>`, e.g.
//! `INSTANTGATE_DATABASE_HOST` or `INSTANTGATE_SECURITY_REQUIRE_AUTH`.
//! Durations are integer seconds.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use instantgate_core::adapters::ConnectionOptions;
use instantgate_core::error::{GateError, Result};
use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub redis: RedisConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Request-wide deadline, seconds
    pub request_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            request_timeout: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub max_open_conns: u32,
    pub max_idle_conns: u32,
    /// Seconds
    pub conn_max_lifetime: u64,
    /// Startup ping / pool acquire deadline, seconds
    pub connect_timeout: u64,
    /// Server-side statement cap, seconds
    pub query_timeout: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: "mysql".to_string(),
            host: "localhost".to_string(),
            port: 3306,
            name: "instantgate".to_string(),
            user: "root".to_string(),
            password: String::new(),
            max_open_conns: 25,
            max_idle_conns: 5,
            conn_max_lifetime: 300,
            connect_timeout: 10,
            query_timeout: 30,
        }
    }
}

impl DatabaseConfig {
    /// Renders the connection URL. Credentials are percent-encoded by the
    /// URL builder, so passwords with special characters survive intact.
    pub fn url(&self) -> Result<String> {
        let mut url = Url::parse(&format!("mysql://{}:{}", self.host, self.port))
            .map_err(|e| GateError::configuration(format!("invalid database host: {e}")))?;
        let _ = url.set_username(&self.user);
        if !self.password.is_empty() {
            let _ = url.set_password(Some(&self.password));
        }
        url.set_path(&self.name);
        Ok(url.to_string())
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            max_open_conns: self.max_open_conns,
            max_idle_conns: self.max_idle_conns,
            conn_max_lifetime: Duration::from_secs(self.conn_max_lifetime),
            connect_timeout: Duration::from_secs(self.connect_timeout),
            query_timeout: Duration::from_secs(self.query_timeout),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub secret: String,
    /// Token lifetime, seconds
    pub expiry: u64,
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "change-me-in-production".to_string(),
            expiry: 86_400,
            issuer: "instantgate".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: i64,
    /// Response-cache TTL, seconds
    pub cache_ttl: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: String::new(),
            db: 0,
            cache_ttl: 300,
        }
    }
}

impl RedisConfig {
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                self.password, self.host, self.port, self.db
            )
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub enabled: bool,
    pub whitelist: Vec<String>,
    pub blacklist: Vec<String>,
    pub require_auth: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            require_auth: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration: defaults, then the YAML file (explicit path, or
    /// `config.yaml` / `config/config.yaml` when present), then environment
    /// overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => ["config.yaml", "config/config.yaml"]
                .iter()
                .map(Path::new)
                .find(|candidate| candidate.exists())
                .map(Self::from_file)
                .transpose()?
                .unwrap_or_default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            GateError::configuration(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        serde_yaml::from_str(&text).map_err(|e| {
            GateError::configuration(format!(
                "failed to parse config file {}: {e}",
                path.display()
            ))
        })
    }

    /// Applies `INSTANTGATE_*` environment overrides.
    fn apply_env_overrides(&mut self) -> Result<()> {
        for (key, raw) in std::env::vars() {
            let Some(rest) = key.strip_prefix("INSTANTGATE_") else {
                continue;
            };
            let Some((section, field)) = rest.split_once('_') else {
                continue;
            };
            let section = section.to_ascii_lowercase();
            let field = field.to_ascii_lowercase();

            match (section.as_str(), field.as_str()) {
                ("server", "port") => self.server.port = parse_env(&key, &raw)?,
                ("server", "request_timeout") => {
                    self.server.request_timeout = parse_env(&key, &raw)?
                }

                ("database", "driver") => self.database.driver = raw,
                ("database", "host") => self.database.host = raw,
                ("database", "port") => self.database.port = parse_env(&key, &raw)?,
                ("database", "name") => self.database.name = raw,
                ("database", "user") => self.database.user = raw,
                ("database", "password") => self.database.password = raw,
                ("database", "max_open_conns") => {
                    self.database.max_open_conns = parse_env(&key, &raw)?
                }
                ("database", "max_idle_conns") => {
                    self.database.max_idle_conns = parse_env(&key, &raw)?
                }
                ("database", "conn_max_lifetime") => {
                    self.database.conn_max_lifetime = parse_env(&key, &raw)?
                }
                ("database", "connect_timeout") => {
                    self.database.connect_timeout = parse_env(&key, &raw)?
                }
                ("database", "query_timeout") => {
                    self.database.query_timeout = parse_env(&key, &raw)?
                }

                ("jwt", "secret") => self.jwt.secret = raw,
                ("jwt", "expiry") => self.jwt.expiry = parse_env(&key, &raw)?,
                ("jwt", "issuer") => self.jwt.issuer = raw,

                ("redis", "host") => self.redis.host = raw,
                ("redis", "port") => self.redis.port = parse_env(&key, &raw)?,
                ("redis", "password") => self.redis.password = raw,
                ("redis", "db") => self.redis.db = parse_env(&key, &raw)?,
                ("redis", "cache_ttl") => self.redis.cache_ttl = parse_env(&key, &raw)?,

                ("security", "enabled") => self.security.enabled = parse_env(&key, &raw)?,
                ("security", "require_auth") => {
                    self.security.require_auth = parse_env(&key, &raw)?
                }
                ("security", "whitelist") => self.security.whitelist = parse_list(&raw),
                ("security", "blacklist") => self.security.blacklist = parse_list(&raw),

                ("logging", "level") => self.logging.level = raw,
                ("logging", "format") => self.logging.format = raw,

                _ => {}
            }
        }
        Ok(())
    }

    /// Validates the effective configuration.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(GateError::configuration("server port must be in 1..=65535"));
        }
        if self.database.host.is_empty() {
            return Err(GateError::configuration("database host is required"));
        }
        if self.database.name.is_empty() {
            return Err(GateError::configuration("database name is required"));
        }
        if self.jwt.secret.is_empty() {
            return Err(GateError::configuration("JWT secret is required"));
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| GateError::configuration(format!("invalid value for {key}: '{raw}'")))
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
