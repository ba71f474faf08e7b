use std::{str::FromStr, time::Duration};

use anyhow::Context;

/// Settings read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub max_connections: u32,
    pub delivery_timeout: Duration,
    pub leave_on_rejoin: bool,
    pub session_minutes: i64,
    pub bot_token: Option<String>,
    pub bot_api_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: "sqlite://roomrelay.db".to_owned(),
            bind_addr: "0.0.0.0:8080".to_owned(),
            max_connections: 16,
            delivery_timeout: Duration::from_millis(5000),
            leave_on_rejoin: false,
            session_minutes: 60,
            bot_token: None,
            bot_api_url: "https://api.telegram.org".to_owned(),
        }
    }
}

fn parsed<T: FromStr>(key: &str, value: String) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse().with_context(|| format!("invalid {key}: {value}"))
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        Config::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let defaults = Config::default();
        Ok(Config {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            max_connections: match lookup("DB_MAX_CONNECTIONS") {
                Some(value) => parsed("DB_MAX_CONNECTIONS", value)?,
                None => defaults.max_connections,
            },
            delivery_timeout: match lookup("DELIVERY_TIMEOUT_MS") {
                Some(value) => Duration::from_millis(parsed("DELIVERY_TIMEOUT_MS", value)?),
                None => defaults.delivery_timeout,
            },
            leave_on_rejoin: match lookup("LEAVE_ON_REJOIN") {
                Some(value) => parsed("LEAVE_ON_REJOIN", value)?,
                None => defaults.leave_on_rejoin,
            },
            session_minutes: match lookup("SESSION_MINUTES") {
                Some(value) => parsed("SESSION_MINUTES", value)?,
                None => defaults.session_minutes,
            },
            bot_token: lookup("BOT_TOKEN").filter(|token| !token.is_empty()),
            bot_api_url: lookup("BOT_API_URL").unwrap_or(defaults.bot_api_url),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.delivery_timeout, Duration::from_secs(5));
        assert!(!config.leave_on_rejoin);
        assert!(config.bot_token.is_none());
    }

    #[test]
    fn values_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("DELIVERY_TIMEOUT_MS", "250"),
            ("LEAVE_ON_REJOIN", "true"),
            ("BOT_TOKEN", "123:abc"),
        ])).unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.delivery_timeout, Duration::from_millis(250));
        assert!(config.leave_on_rejoin);
        assert_eq!(config.bot_token.as_deref(), Some("123:abc"));
    }

    #[test]
    fn bad_numbers_are_reported() {
        let err = Config::from_lookup(lookup(&[("DELIVERY_TIMEOUT_MS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("DELIVERY_TIMEOUT_MS"));
    }
}
