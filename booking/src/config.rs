//! Configuration management for the booking client.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::environment::DEFAULT_MAX_SEATS;
use crate::error::ConfigError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the REST API; the in-memory backend is used when unset
    pub api_url: Option<String>,
    /// Bearer token sent with every request
    pub api_token: Option<String>,
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// How long the flow waits for the outcome of a step
    pub flow_timeout: Duration,
    /// Most seats one booking may hold
    pub max_seats: usize,
    /// Lease length in the in-memory backend
    pub lock_ttl: Duration,
    /// Directory for file snapshots; snapshots stay in memory when unset
    pub snapshot_dir: Option<PathBuf>,
    /// Snapshot key and in-memory session id
    pub session: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            api_token: None,
            request_timeout: Duration::from_secs(10),
            flow_timeout: Duration::from_secs(15),
            max_seats: DEFAULT_MAX_SEATS,
            lock_ttl: Duration::from_secs(300),
            snapshot_dir: None,
            session: "guest".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment (and `.env`, if present).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a variable that is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is normal
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a variable that is set but cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let max_seats = parse(&lookup, "MARQUEE_MAX_SEATS")?.unwrap_or(defaults.max_seats);
        if max_seats == 0 {
            return Err(ConfigError {
                variable: "MARQUEE_MAX_SEATS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            api_url: text("MARQUEE_API_URL"),
            api_token: text("MARQUEE_API_TOKEN"),
            request_timeout: parse(&lookup, "MARQUEE_REQUEST_TIMEOUT_SECS")?
                .map_or(defaults.request_timeout, Duration::from_secs),
            flow_timeout: parse(&lookup, "MARQUEE_FLOW_TIMEOUT_SECS")?
                .map_or(defaults.flow_timeout, Duration::from_secs),
            max_seats,
            lock_ttl: parse(&lookup, "MARQUEE_LOCK_TTL_SECS")?
                .map_or(defaults.lock_ttl, Duration::from_secs),
            snapshot_dir: text("MARQUEE_SNAPSHOT_DIR").map(PathBuf::from),
            session: text("MARQUEE_SESSION").unwrap_or(defaults.session),
        })
    }
}

fn parse<T, F>(lookup: &F, variable: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(variable) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|e: T::Err| ConfigError {
            variable,
            value,
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        assert_eq!(Config::from_lookup(lookup(&[])), Ok(Config::default()));
    }

    #[test]
    fn values_are_read() {
        let config = Config::from_lookup(lookup(&[
            ("MARQUEE_API_URL", "https://cinema.example/api"),
            ("MARQUEE_MAX_SEATS", "4"),
            ("MARQUEE_LOCK_TTL_SECS", " 60 "),
            ("MARQUEE_SESSION", "user-42"),
        ]));
        let Ok(config) = config else {
            unreachable!("config should parse: {config:?}");
        };
        assert_eq!(config.api_url.as_deref(), Some("https://cinema.example/api"));
        assert_eq!(config.max_seats, 4);
        assert_eq!(config.lock_ttl, Duration::from_secs(60));
        assert_eq!(config.session, "user-42");
    }

    #[test]
    fn bad_number_names_the_variable() {
        let result = Config::from_lookup(lookup(&[("MARQUEE_FLOW_TIMEOUT_SECS", "soon")]));
        let Err(error) = result else {
            unreachable!("should fail");
        };
        assert_eq!(error.variable, "MARQUEE_FLOW_TIMEOUT_SECS");
        assert_eq!(error.value, "soon");
    }

    #[test]
    fn zero_seat_cap_is_refused() {
        assert!(Config::from_lookup(lookup(&[("MARQUEE_MAX_SEATS", "0")])).is_err());
    }

    #[test]
    fn blank_url_means_in_memory() {
        let config = Config::from_lookup(lookup(&[("MARQUEE_API_URL", "  ")]));
        assert_eq!(config.map(|c| c.api_url), Ok(None));
    }
}
