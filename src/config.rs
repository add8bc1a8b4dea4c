use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_WS_URL: &str = "wss://api.fogbender.com/ws";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: expected a non-negative integer")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub ws_url: String,
    pub request_timeout: Duration,
    pub keepalive_interval: Duration,
    /// Rows fetched per `Roster.GetRange` page.
    pub roster_page_limit: u32,
    pub search_debounce: Duration,
    pub search_stale_time: Duration,
    pub idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            request_timeout: Duration::from_secs(75),
            keepalive_interval: Duration::from_secs(30),
            roster_page_limit: 30,
            search_debounce: Duration::from_millis(500),
            search_stale_time: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by any `FOGBENDER_*` variables present in the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup("FOGBENDER_WS_URL") {
            config.ws_url = url;
        }

        let millis = |key: &'static str, current: Duration| -> Result<Duration, ConfigError> {
            match lookup(key) {
                Some(raw) => parse_number(key, &raw).map(Duration::from_millis),
                None => Ok(current),
            }
        };
        config.request_timeout = millis("FOGBENDER_REQUEST_TIMEOUT_MS", config.request_timeout)?;
        config.keepalive_interval =
            millis("FOGBENDER_KEEPALIVE_INTERVAL_MS", config.keepalive_interval)?;
        config.search_debounce = millis("FOGBENDER_SEARCH_DEBOUNCE_MS", config.search_debounce)?;
        config.search_stale_time = millis("FOGBENDER_SEARCH_STALE_MS", config.search_stale_time)?;
        config.idle_timeout = millis("FOGBENDER_IDLE_TIMEOUT_MS", config.idle_timeout)?;

        if let Some(raw) = lookup("FOGBENDER_ROSTER_PAGE_LIMIT") {
            let limit = parse_number("FOGBENDER_ROSTER_PAGE_LIMIT", &raw)?;
            config.roster_page_limit =
                u32::try_from(limit).map_err(|_| ConfigError::InvalidValue {
                    key: "FOGBENDER_ROSTER_PAGE_LIMIT",
                    value: raw,
                })?;
        }

        Ok(config)
    }
}

fn parse_number(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.roster_page_limit, 30);
        assert_eq!(config.search_debounce, Duration::from_millis(500));
    }

    #[test]
    fn overrides_are_applied() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("FOGBENDER_WS_URL", "ws://localhost:8000/ws"),
            ("FOGBENDER_ROSTER_PAGE_LIMIT", "50"),
            ("FOGBENDER_KEEPALIVE_INTERVAL_MS", " 1000 "),
        ]))
        .unwrap();
        assert_eq!(config.ws_url, "ws://localhost:8000/ws");
        assert_eq!(config.roster_page_limit, 50);
        assert_eq!(config.keepalive_interval, Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(75));
    }

    #[test]
    fn garbage_is_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[("FOGBENDER_SEARCH_STALE_MS", "soon")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "FOGBENDER_SEARCH_STALE_MS",
                value: "soon".into()
            }
        );

        assert!(
            ClientConfig::from_lookup(lookup(&[("FOGBENDER_ROSTER_PAGE_LIMIT", "99999999999")]))
                .is_err()
        );
    }
}
