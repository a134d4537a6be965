use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use parley_gateway::relay::DEFAULT_CAPACITY;
use parley_gateway::stream::DEFAULT_KEEPALIVE;

/// Chat instance settings, read from the environment (after `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// `ws://host:port/bridge`; `None` runs the instance standalone
    pub broker_url: Option<String>,
    pub relay_capacity: usize,
    pub keepalive: Duration,
    pub history_limit: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: std::env::var("PARLEY_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_var("PARLEY_PORT", 3000)?,
            db_path: std::env::var("PARLEY_DB_PATH")
                .unwrap_or_else(|_| "parley.db".into())
                .into(),
            broker_url: std::env::var("PARLEY_BROKER_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            relay_capacity: parse_var("PARLEY_RELAY_CAPACITY", DEFAULT_CAPACITY)?,
            keepalive: Duration::from_secs(parse_var(
                "PARLEY_KEEPALIVE_SECS",
                DEFAULT_KEEPALIVE.as_secs(),
            )?),
            history_limit: parse_var("PARLEY_HISTORY_LIMIT", 50)?,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}='{}': {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_falls_back_and_rejects_garbage() {
        assert_eq!(parse_var("PARLEY_TEST_UNSET_PORT", 3000u16).unwrap(), 3000);

        // Names are unique to this test
        unsafe {
            std::env::set_var("PARLEY_TEST_GOOD_CAPACITY", " 64 ");
            std::env::set_var("PARLEY_TEST_BAD_CAPACITY", "lots");
        }
        assert_eq!(parse_var("PARLEY_TEST_GOOD_CAPACITY", 1usize).unwrap(), 64);

        let err = parse_var("PARLEY_TEST_BAD_CAPACITY", 1usize).unwrap_err();
        assert!(err.to_string().contains("PARLEY_TEST_BAD_CAPACITY"));
    }
}
