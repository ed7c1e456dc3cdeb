use core::{fmt::Display, str::FromStr, time::Duration};

use crate::error::{Error, Result};

pub const ENV_OPERATIONS: &str = "RWHAZARD_OPERATIONS";
pub const ENV_SLEEP_MS: &str = "RWHAZARD_SLEEP_MS";
pub const ENV_WAIT_NANOS: &str = "RWHAZARD_WAIT_NANOS";
pub const ENV_BACKOFF_MS: &str = "RWHAZARD_BACKOFF_MS";
pub const ENV_PAYLOAD_LEN: &str = "RWHAZARD_PAYLOAD_LEN";

/// Tunables shared by resources and workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Operations each worker performs before finishing.
    pub operation_count: usize,
    /// Idle time between operations is drawn from `[0, 2 * average_sleep)`.
    pub average_sleep: Duration,
    /// Upper bound of each randomly sampled condition wait.
    pub wait_time_unit: Duration,
    /// Initial backoff after failing to get the second lock.
    pub backoff_unit: Duration,
    pub payload_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            operation_count: 50,
            average_sleep: Duration::from_millis(300),
            wait_time_unit: Duration::from_millis(1),
            backoff_unit: Duration::from_millis(1),
            payload_len: 20,
        }
    }
}

impl Config {
    /// Defaults overridden by any `RWHAZARD_*` environment variables that are set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = parse(&lookup, ENV_OPERATIONS)? {
            config.operation_count = v;
        }
        if let Some(v) = parse(&lookup, ENV_SLEEP_MS)? {
            config.average_sleep = Duration::from_millis(v);
        }
        if let Some(v) = parse(&lookup, ENV_WAIT_NANOS)? {
            config.wait_time_unit = Duration::from_nanos(v);
        }
        if let Some(v) = parse(&lookup, ENV_BACKOFF_MS)? {
            config.backoff_unit = Duration::from_millis(v);
        }
        if let Some(v) = parse(&lookup, ENV_PAYLOAD_LEN)? {
            config.payload_len = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.payload_len == 0 {
            return Err(Error::Config("payload length must be at least 1".into()));
        }
        if self.wait_time_unit.is_zero() {
            return Err(Error::Config("wait time unit must be non-zero".into()));
        }
        Ok(())
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|e| Error::Config(format!("{key}={raw:?}: {e}")))
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
    fn defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.operation_count, 50);
        assert_eq!(config.payload_len, 20);
    }

    #[test]
    fn overrides() {
        let config = Config::from_lookup(lookup(&[
            (ENV_OPERATIONS, "7"),
            (ENV_SLEEP_MS, "0"),
            (ENV_WAIT_NANOS, "250000"),
            (ENV_PAYLOAD_LEN, " 5 "),
        ]))
        .unwrap();

        assert_eq!(config.operation_count, 7);
        assert_eq!(config.average_sleep, Duration::ZERO);
        assert_eq!(config.wait_time_unit, Duration::from_micros(250));
        assert_eq!(config.backoff_unit, Duration::from_millis(1));
        assert_eq!(config.payload_len, 5);
    }

    #[test]
    fn rejects_garbage() {
        let err = Config::from_lookup(lookup(&[(ENV_OPERATIONS, "many")])).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains(ENV_OPERATIONS)));
    }

    #[test]
    fn rejects_out_of_range() {
        let err = Config::from_lookup(lookup(&[(ENV_PAYLOAD_LEN, "99999999999999999999999")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains(ENV_PAYLOAD_LEN)));

        let err = Config::from_lookup(lookup(&[(ENV_WAIT_NANOS, "-5")])).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains(ENV_WAIT_NANOS)));
    }

    #[test]
    fn parses_counts_as_usize() {
        let config = Config::from_lookup(lookup(&[(ENV_OPERATIONS, "4096")])).unwrap();
        assert_eq!(config.operation_count, 4096usize);
    }

    #[test]
    fn rejects_empty_payload() {
        assert!(Config::from_lookup(lookup(&[(ENV_PAYLOAD_LEN, "0")])).is_err());
    }
}
