//! Environment-driven configuration

use crate::db::DEFAULT_MAX_HISTORY;
use crate::functions::{DiscoveryOptions, DuplicatePolicy};
use crate::llm::GrokConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} has invalid value {value:?}: expected {expected}")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Everything the binary needs to start
#[derive(Debug, Clone)]
pub struct Config {
    pub grok: GrokConfig,
    pub db_path: PathBuf,
    /// Conversations kept in the database; 0 keeps everything
    pub max_history: usize,
    pub auto_save: bool,
    pub discovery: DiscoveryOptions,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("GROK_API_KEY").ok_or(ConfigError::Missing("GROK_API_KEY"))?;
        let mut grok = GrokConfig::new(api_key);
        if let Some(base_url) = get("GROK_BASE_URL") {
            grok.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(model) = get("GROK_MODEL") {
            grok.model = model;
        }
        if let Some(max_tokens) = parse(&get, "GROK_MAX_TOKENS", "a positive integer")? {
            grok.max_tokens = max_tokens;
        }
        if let Some(temperature) = parse(&get, "GROK_TEMPERATURE", "a number")? {
            grok.temperature = temperature;
        }
        if let Some(secs) = parse(&get, "GROK_TIMEOUT_SECS", "a whole number of seconds")? {
            grok.timeout = Duration::from_secs(secs);
        }

        let db_path = get("TELLER_DB_PATH").map_or_else(default_db_path, PathBuf::from);
        let max_history =
            parse(&get, "TELLER_MAX_HISTORY", "a whole number")?.unwrap_or(DEFAULT_MAX_HISTORY);
        let auto_save = match get("TELLER_AUTO_SAVE") {
            Some(value) => parse_bool(&value).ok_or(ConfigError::Invalid {
                name: "TELLER_AUTO_SAVE",
                value,
                expected: "true or false",
            })?,
            None => true,
        };

        let duplicates = match get("TELLER_ON_DUPLICATE") {
            Some(value) => DuplicatePolicy::parse(&value).ok_or(ConfigError::Invalid {
                name: "TELLER_ON_DUPLICATE",
                value,
                expected: "reject or replace",
            })?,
            None => DuplicatePolicy::default(),
        };
        let disabled = get("TELLER_DISABLED_FUNCTIONS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            grok,
            db_path,
            max_history,
            auto_save,
            discovery: DiscoveryOptions {
                duplicates,
                disabled,
            },
        })
    }
}

fn parse<T, G>(get: &G, name: &'static str, expected: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    get(name)
        .map(|value| {
            value.trim().parse().map_err(|_| ConfigError::Invalid {
                name,
                value,
                expected,
            })
        })
        .transpose()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn default_db_path() -> PathBuf {
    std::env::var_os("HOME")
        .map_or_else(|| PathBuf::from("."), PathBuf::from)
        .join(".teller")
        .join("history.db")
}
