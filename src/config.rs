// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment exactly once, at startup,
//! into an [`AppConfig`] that is handed to every component by value. No
//! module reads the environment on its own.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory for the redb database (`:memory:` for none) | `./data` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `APP_NAME` | Application name embedded in login messages | `MetaFarm` |
//! | `APP_VERSION` | Application version embedded in login messages | `1.0.0` |
//! | `CHAIN_ID` | Chain id of the typed-data domain | `137` |
//! | `LOGIN_MESSAGE_FORMAT` | `typed` or `text` | `typed` |
//! | `CHALLENGE_TTL_SECS` | Challenge validity window | `1800` |
//! | `SESSION_TTL_SECS` | Session lifetime | `86400` |
//! | `SESSION_TOKEN_SECRET` | HMAC key for stored session token keys | random per process |
//! | `SESSION_COOKIE_SECURE` | Mark the session cookie `Secure` | `false` |
//! | `SESSION_CACHE_CAPACITY` | Max cached sessions | `10000` |
//! | `SESSION_CACHE_TTL_SECS` | Cache entry lifetime (`0` disables) | `30` |
//! | `AUDIT_QUEUE_CAPACITY` | Pending login audit events | `1024` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; both set enables HTTPS | unset |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::message::MessageFormat;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the database directory.
///
/// The special value `:memory:` runs the server on the in-memory store,
/// which loses every identity and session on restart.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const APP_NAME_ENV: &str = "APP_NAME";
pub const APP_VERSION_ENV: &str = "APP_VERSION";
pub const CHAIN_ID_ENV: &str = "CHAIN_ID";
pub const LOGIN_MESSAGE_FORMAT_ENV: &str = "LOGIN_MESSAGE_FORMAT";
pub const CHALLENGE_TTL_ENV: &str = "CHALLENGE_TTL_SECS";
pub const SESSION_TTL_ENV: &str = "SESSION_TTL_SECS";

/// HMAC key used to derive the storage key of each session token.
///
/// Rotating it invalidates every outstanding session.
pub const SESSION_TOKEN_SECRET_ENV: &str = "SESSION_TOKEN_SECRET";
pub const SESSION_COOKIE_SECURE_ENV: &str = "SESSION_COOKIE_SECURE";
pub const SESSION_CACHE_CAPACITY_ENV: &str = "SESSION_CACHE_CAPACITY";
pub const SESSION_CACHE_TTL_ENV: &str = "SESSION_CACHE_TTL_SECS";
pub const AUDIT_QUEUE_CAPACITY_ENV: &str = "AUDIT_QUEUE_CAPACITY";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

pub const IN_MEMORY_DATA_DIR: &str = ":memory:";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

const DEFAULT_CHALLENGE_TTL: Duration = Duration::from_secs(30 * 60);
const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_CHAIN_ID: u64 = 137;
/// Upper bound for challenge and session TTLs (ten years).
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid value `{value}` ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("{0} and {1} must be set together")]
    Incomplete(&'static str, &'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Redb { data_dir: PathBuf },
    InMemory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Settings consumed by the authentication core.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub app_name: String,
    pub app_version: String,
    pub chain_id: u64,
    pub message_format: MessageFormat,
    pub challenge_ttl: Duration,
    pub session_ttl: Duration,
    /// `None` means a random key is generated at startup.
    pub session_token_secret: Option<Vec<u8>>,
    pub cookie_secure: bool,
    pub session_cache_capacity: usize,
    pub session_cache_ttl: Duration,
    pub audit_queue_capacity: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            app_name: "MetaFarm".to_string(),
            app_version: "1.0.0".to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            message_format: MessageFormat::TypedData,
            challenge_ttl: DEFAULT_CHALLENGE_TTL,
            session_ttl: DEFAULT_SESSION_TTL,
            session_token_secret: None,
            cookie_secure: false,
            session_cache_capacity: 10_000,
            session_cache_ttl: Duration::from_secs(30),
            audit_queue_capacity: 1024,
        }
    }
}

/// Complete process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub storage: StorageBackend,
    pub log_format: LogFormat,
    pub tls: Option<TlsConfig>,
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host: IpAddr = parse_or(&get, HOST_ENV, IpAddr::from([0, 0, 0, 0]))?;
        let port: u16 = parse_or(&get, PORT_ENV, 8080)?;

        let storage = match get(DATA_DIR_ENV) {
            Some(dir) if dir == IN_MEMORY_DATA_DIR => StorageBackend::InMemory,
            Some(dir) => StorageBackend::Redb {
                data_dir: PathBuf::from(dir),
            },
            None => StorageBackend::Redb {
                data_dir: PathBuf::from("./data"),
            },
        };

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(invalid(LOG_FORMAT_ENV, other, "expected json or pretty")),
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::Incomplete(TLS_CERT_PATH_ENV, TLS_KEY_PATH_ENV)),
        };

        let defaults = AuthConfig::default();
        let message_format = match get(LOGIN_MESSAGE_FORMAT_ENV).as_deref() {
            None | Some("typed") => MessageFormat::TypedData,
            Some("text") => MessageFormat::PlainText,
            Some(other) => {
                return Err(invalid(LOGIN_MESSAGE_FORMAT_ENV, other, "expected typed or text"))
            }
        };

        let auth = AuthConfig {
            app_name: get(APP_NAME_ENV).unwrap_or(defaults.app_name),
            app_version: get(APP_VERSION_ENV).unwrap_or(defaults.app_version),
            chain_id: parse_or(&get, CHAIN_ID_ENV, defaults.chain_id)?,
            message_format,
            challenge_ttl: positive_secs(&get, CHALLENGE_TTL_ENV, defaults.challenge_ttl)?,
            session_ttl: positive_secs(&get, SESSION_TTL_ENV, defaults.session_ttl)?,
            session_token_secret: get(SESSION_TOKEN_SECRET_ENV).map(String::into_bytes),
            cookie_secure: parse_or(&get, SESSION_COOKIE_SECURE_ENV, defaults.cookie_secure)?,
            session_cache_capacity: parse_or(
                &get,
                SESSION_CACHE_CAPACITY_ENV,
                defaults.session_cache_capacity,
            )?,
            session_cache_ttl: Duration::from_secs(parse_or(
                &get,
                SESSION_CACHE_TTL_ENV,
                defaults.session_cache_ttl.as_secs(),
            )?),
            audit_queue_capacity: positive(
                &get,
                AUDIT_QUEUE_CAPACITY_ENV,
                defaults.audit_queue_capacity,
            )?,
        };

        Ok(Self {
            bind_addr: SocketAddr::new(host, port),
            storage,
            log_format,
            tls,
            auth,
        })
    }
}

fn invalid(var: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => raw.parse().map_err(|e: T::Err| invalid(var, &raw, e.to_string())),
        None => Ok(default),
    }
}

fn positive<G>(get: &G, var: &'static str, default: usize) -> Result<usize, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let value = parse_or(get, var, default)?;
    if value == 0 {
        return Err(invalid(var, "0", "must be greater than zero"));
    }
    Ok(value)
}

fn positive_secs<G>(get: &G, var: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_or(get, var, default.as_secs())?;
    if secs == 0 {
        return Err(invalid(var, "0", "must be greater than zero"));
    }
    if secs > MAX_TTL_SECS {
        return Err(invalid(
            var,
            &secs.to_string(),
            format!("must be at most {MAX_TTL_SECS} seconds"),
        ));
    }
    Ok(Duration::from_secs(secs))
}
