//! Environment configuration helpers
//!
//! Every setting of a run comes from the process environment, optionally
//! seeded from a `.env` file. These helpers give typed access with
//! consistent error messages.

use std::str::FromStr;
use thiserror::Error;

/// Errors raised while reading settings from the environment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    /// A variable is set but cannot be parsed
    #[error("{name} has invalid value '{value}': expected {expected}")]
    Invalid {
        name: String,
        value: String,
        expected: String,
    },
}

/// Load a `.env` file from the working directory or its parents, if any.
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }
}

/// Read a variable, treating blank values as unset
pub fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a variable, falling back to `default` when unset
pub fn env_parse<T>(name: &str, default: T) -> Result<T, EnvError>
where
    T: FromStr,
{
    match env_string(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}

/// Read a boolean flag, falling back to `default` when unset
pub fn env_bool(name: &str, default: bool) -> bool {
    env_string(name).map_or(default, |raw| parse_bool(&raw))
}

/// Read a comma-separated list, dropping blank items
pub fn env_list(name: &str) -> Vec<String> {
    env_string(name)
        .map(|raw| split_list(&raw))
        .unwrap_or_default()
}

/// Parse a raw value for the variable `name`
pub fn parse_value<T>(name: &str, raw: &str) -> Result<T, EnvError>
where
    T: FromStr,
{
    raw.trim().parse::<T>().map_err(|_| EnvError::Invalid {
        name: name.to_string(),
        value: raw.to_string(),
        expected: std::any::type_name::<T>().to_string(),
    })
}

/// Anything except `0`, `false`, `no`, `off` (case-insensitive) is true
pub fn parse_bool(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    lowered != "0" && lowered != "false" && lowered != "no" && lowered != "off"
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
