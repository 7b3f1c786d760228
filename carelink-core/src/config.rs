//! Layered configuration for carelink
//!
//! Precedence (lowest to highest):
//! 1. Built-in defaults
//! 2. TOML file (`--config`, `CARELINK_CONFIG`, or `~/.carelink/config.toml`)
//! 3. Environment variables (the CLI loads `.env` first via dotenvy)
//!
//! Environment variables:
//!   CARELINK_BIND                 # Server bind address (default: 0.0.0.0:5001)
//!   CARELINK_CORS_PERMISSIVE      # Allow any origin (default: true)
//!   DATABASE_URL                  # PostgreSQL connection string
//!   POSTGRES_USER/PASSWORD/HOST/PORT/DB  # Assembled into a URL when DATABASE_URL is unset
//!   CARELINK_DB_MAX_CONNECTIONS   # Pool size (default: 10)
//!   SECRET_KEY                    # JWT signing secret
//!   CARELINK_TOKEN_TTL_HOURS      # Access token lifetime (default: 24)
//!   GEMINI_API_KEY / GOOGLE_API_KEY  # Chat model key (chat disabled when unset)
//!   CARELINK_CHAT_MODEL           # Chat model name (default: gemini-2.5-flash)
//!   CARELINK_CHAT_BASE_URL        # Chat API base URL

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CoreError, Result};

pub const DEFAULT_BIND: &str = "0.0.0.0:5001";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
/// Ten years.
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365 * 10;
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_CHAT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Raw TOML file contents. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: FileServer,
    pub database: FileDatabase,
    pub auth: FileAuth,
    pub chat: FileChat,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileServer {
    pub bind: Option<String>,
    pub cors_permissive: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileDatabase {
    pub url: Option<String>,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileAuth {
    pub secret_key: Option<String>,
    pub token_ttl_hours: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileChat {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub chat: ChatSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind: SocketAddr,
    pub cors_permissive: bool,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub secret_key: Option<String>,
    pub token_ttl_hours: i64,
}

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl Config {
    /// Load config from file (if any) and the process environment.
    ///
    /// An explicitly given path must exist. The default path
    /// `~/.carelink/config.toml` is only read when present.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let file = match explicit_path {
            Some(path) => Some(read_file(path)?),
            None => {
                let env_path = std::env::var("CARELINK_CONFIG").ok().map(PathBuf::from);
                match env_path {
                    Some(path) => Some(read_file(&path)?),
                    None => {
                        let default = Self::default_path();
                        if default.exists() {
                            Some(read_file(&default)?)
                        } else {
                            None
                        }
                    }
                }
            }
        };

        Self::resolve(file.unwrap_or_default(), |key| std::env::var(key).ok())
    }

    /// Default config file path: ~/.carelink/config.toml
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".carelink/config.toml")
    }

    /// Merge file values with an environment lookup.
    pub fn resolve<F>(file: FileConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_raw = env("CARELINK_BIND")
            .or(file.server.bind)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_raw
            .parse()
            .map_err(|_| CoreError::config(format!("invalid bind address '{}'", bind_raw)))?;

        let cors_permissive = match env("CARELINK_CORS_PERMISSIVE") {
            Some(raw) => parse_bool("CARELINK_CORS_PERMISSIVE", &raw)?,
            None => file.server.cors_permissive.unwrap_or(true),
        };

        let url = env("DATABASE_URL")
            .or_else(|| postgres_url_from_parts(&env))
            .or(file.database.url);

        let max_connections = match env("CARELINK_DB_MAX_CONNECTIONS") {
            Some(raw) => parse_number("CARELINK_DB_MAX_CONNECTIONS", &raw)?,
            None => file.database.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS),
        };

        let token_ttl_hours = match env("CARELINK_TOKEN_TTL_HOURS") {
            Some(raw) => parse_number("CARELINK_TOKEN_TTL_HOURS", &raw)?,
            None => file.auth.token_ttl_hours.unwrap_or(DEFAULT_TOKEN_TTL_HOURS),
        };
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&token_ttl_hours) {
            return Err(CoreError::config(format!(
                "token TTL must be between 1 and {MAX_TOKEN_TTL_HOURS} hours, got {token_ttl_hours}"
            )));
        }

        Ok(Self {
            server: ServerSettings {
                bind,
                cors_permissive,
            },
            database: DatabaseSettings {
                url,
                max_connections,
            },
            auth: AuthSettings {
                secret_key: env("SECRET_KEY").or(file.auth.secret_key),
                token_ttl_hours,
            },
            chat: ChatSettings {
                api_key: env("GEMINI_API_KEY")
                    .or_else(|| env("GOOGLE_API_KEY"))
                    .or(file.chat.api_key),
                model: env("CARELINK_CHAT_MODEL")
                    .or(file.chat.model)
                    .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
                base_url: env("CARELINK_CHAT_BASE_URL")
                    .or(file.chat.base_url)
                    .unwrap_or_else(|| DEFAULT_CHAT_BASE_URL.to_string()),
            },
        })
    }

    /// Database URL, or an actionable error.
    pub fn database_url(&self) -> Result<&str> {
        self.database.url.as_deref().ok_or_else(|| {
            CoreError::config(
                "database URL not set. Set DATABASE_URL, the POSTGRES_* variables, or [database] url in the config file",
            )
        })
    }

    /// JWT signing secret, or an actionable error.
    pub fn secret_key(&self) -> Result<&str> {
        match self.auth.secret_key.as_deref() {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(CoreError::config(
                "SECRET_KEY not set. Set SECRET_KEY or [auth] secret_key in the config file",
            )),
        }
    }
}

fn read_file(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)?;
    tracing::debug!(path = %path.display(), "Loaded config file");
    toml::from_str(&content).map_err(|e| CoreError::config_parse(path, e.to_string()))
}

/// Build a URL from POSTGRES_* parts; all five must be present.
fn postgres_url_from_parts<F>(env: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let user = env("POSTGRES_USER")?;
    let password = env("POSTGRES_PASSWORD")?;
    let host = env("POSTGRES_HOST")?;
    let port = env("POSTGRES_PORT")?;
    let db = env("POSTGRES_DB")?;
    Some(format!("postgresql://{user}:{password}@{host}:{port}/{db}"))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CoreError::config(format!("{key}: expected a boolean, got '{raw}'"))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| CoreError::config(format!("{key}: expected a number, got '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_file_or_env() {
        let config = Config::resolve(FileConfig::default(), env_from(&[])).unwrap();
        assert_eq!(config.server.bind.port(), 5001);
        assert!(config.server.cors_permissive);
        assert_eq!(config.database.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.chat.model, DEFAULT_CHAT_MODEL);
        assert!(config.chat.api_key.is_none());
        assert!(config.database_url().is_err());
        assert!(config.secret_key().is_err());
    }

    #[test]
    fn env_overrides_file() {
        let file: FileConfig = toml::from_str(
            r#"
            [server]
            bind = "127.0.0.1:8080"

            [database]
            url = "postgres://file/db"

            [auth]
            secret_key = "from-file"
            "#,
        )
        .unwrap();

        let config = Config::resolve(
            file,
            env_from(&[("DATABASE_URL", "postgres://env/db"), ("CARELINK_CORS_PERMISSIVE", "no")]),
        )
        .unwrap();

        assert_eq!(config.server.bind.port(), 8080);
        assert!(!config.server.cors_permissive);
        assert_eq!(config.database_url().unwrap(), "postgres://env/db");
        assert_eq!(config.secret_key().unwrap(), "from-file");
    }

    #[test]
    fn assembles_url_from_postgres_parts() {
        let config = Config::resolve(
            FileConfig::default(),
            env_from(&[
                ("POSTGRES_USER", "care"),
                ("POSTGRES_PASSWORD", "pw"),
                ("POSTGRES_HOST", "db"),
                ("POSTGRES_PORT", "5432"),
                ("POSTGRES_DB", "carelink"),
            ]),
        )
        .unwrap();

        assert_eq!(
            config.database_url().unwrap(),
            "postgresql://care:pw@db:5432/carelink"
        );
    }

    #[test]
    fn partial_postgres_parts_are_ignored() {
        let config = Config::resolve(
            FileConfig::default(),
            env_from(&[("POSTGRES_USER", "care"), ("POSTGRES_HOST", "db")]),
        )
        .unwrap();
        assert!(config.database.url.is_none());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::resolve(FileConfig::default(), env_from(&[("CARELINK_BIND", "nowhere")])).is_err());
        assert!(Config::resolve(
            FileConfig::default(),
            env_from(&[("CARELINK_DB_MAX_CONNECTIONS", "many")])
        )
        .is_err());
        assert!(Config::resolve(
            FileConfig::default(),
            env_from(&[("CARELINK_TOKEN_TTL_HOURS", "0")])
        )
        .is_err());
    }

    #[test]
    fn oversized_token_ttl_is_a_config_error() {
        let err = Config::resolve(
            FileConfig::default(),
            env_from(&[("CARELINK_TOKEN_TTL_HOURS", "9223372036854775807")]),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
        assert!(err.to_string().contains("token TTL"));

        let max = MAX_TOKEN_TTL_HOURS.to_string();
        let config = Config::resolve(FileConfig::default(), env_from(&[("CARELINK_TOKEN_TTL_HOURS", max.as_str())]))
            .unwrap();
        assert_eq!(config.auth.token_ttl_hours, MAX_TOKEN_TTL_HOURS);
    }

    #[test]
    fn gemini_key_takes_precedence_over_google_key() {
        let config = Config::resolve(
            FileConfig::default(),
            env_from(&[("GEMINI_API_KEY", "g1"), ("GOOGLE_API_KEY", "g2")]),
        )
        .unwrap();
        assert_eq!(config.chat.api_key.as_deref(), Some("g1"));
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[chat]\nmodel = \"gemini-test\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        // CARELINK_CHAT_MODEL may be set in the developer's shell
        if std::env::var("CARELINK_CHAT_MODEL").is_err() {
            assert_eq!(config.chat.model, "gemini-test");
        }
    }

    #[test]
    fn load_fails_on_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, CoreError::Io { .. }));
    }

    #[test]
    fn unknown_sections_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[mystery]\nkey = 1\n").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, CoreError::ConfigParse { .. }));
    }
}
