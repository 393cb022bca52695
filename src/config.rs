// src/config.rs
use std::{
    collections::HashMap,
    env,
    fmt::Display,
    net::{IpAddr, SocketAddr},
    str::FromStr,
};

use http::HeaderValue;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::ids::UserId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreConfig {
    Postgres {
        database_url: String,
        max_connections: u32,
        run_migrations: bool,
        /// Run each transaction as the session's database role, so row
        /// policies apply even when the pool logs in as the table owner.
        switch_role: bool,
    },
    Memory,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IdentityConfig {
    Supabase { url: String, anon_key: String },
    /// Token to user table; tokens are matched without the `Bearer ` prefix.
    Static(HashMap<String, UserId>),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub store: StoreConfig,
    pub identity: IdentityConfig,
    /// Public origin without trailing slash; share links are built on it.
    pub site_url: String,
    pub cors_allow_origin: Option<HeaderValue>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let store = match var("STORE_BACKEND").as_deref().unwrap_or("postgres") {
            "postgres" => StoreConfig::Postgres {
                database_url: var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
                max_connections: try_load(&var, "DATABASE_MAX_CONNECTIONS", "5")?,
                run_migrations: parse_bool("RUN_MIGRATIONS", var("RUN_MIGRATIONS"))?,
                switch_role: parse_bool("DATABASE_SWITCH_ROLE", var("DATABASE_SWITCH_ROLE"))?,
            },
            "memory" => StoreConfig::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND",
                    reason: format!("unknown backend '{other}'"),
                })
            }
        };

        let identity = match var("AUTH_STATIC_TOKENS") {
            Some(raw) => IdentityConfig::Static(parse_static_tokens(&raw)?),
            None => IdentityConfig::Supabase {
                url: var("SUPABASE_URL").ok_or(ConfigError::Missing("SUPABASE_URL"))?,
                anon_key: var("SUPABASE_ANON_KEY")
                    .ok_or(ConfigError::Missing("SUPABASE_ANON_KEY"))?,
            },
        };

        let cors_allow_origin = var("CORS_ALLOW_ORIGIN")
            .map(|origin| {
                HeaderValue::from_str(&origin).map_err(|e| ConfigError::Invalid {
                    key: "CORS_ALLOW_ORIGIN",
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        Ok(Self {
            host: try_load(&var, "HOST", "0.0.0.0")?,
            port: try_load(&var, "PORT", "3030")?,
            store,
            identity,
            site_url: var("SITE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_default(),
            cors_allow_origin,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn try_load<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
}

fn parse_bool(key: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::trim) {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            key,
            reason: format!("'{other}' is not a boolean"),
        }),
    }
}

/// `token=uuid,token=uuid`; blank entries are skipped.
fn parse_static_tokens(raw: &str) -> Result<HashMap<String, UserId>, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        key: "AUTH_STATIC_TOKENS",
        reason,
    };

    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (token, user) = entry
                .split_once('=')
                .ok_or_else(|| invalid(format!("entry '{entry}' is not token=uuid")))?;
            let user = Uuid::parse_str(user.trim())
                .map_err(|e| invalid(format!("entry for '{}': {e}", token.trim())))?;
            Ok((token.trim().to_string(), UserId::new(user)))
        })
        .collect()
}
