//! Configuration loading and representation.
//!
//! Everything is read from the process environment once at startup;
//! tests build configs directly through the `with_*` methods.

use thiserror::Error;

use crate::store::{PostgresSettings, MAX_PAGE_LIMIT};
use crate::window::{CivilCalendar, DEFAULT_UTC_OFFSET_MINUTES};

pub const ENV_UTC_OFFSET_MINUTES: &str = "FIXTRACK_UTC_OFFSET_MINUTES";
pub const ENV_PAGE_SIZE: &str = "FIXTRACK_PAGE_SIZE";
pub const ENV_PARALLEL_THRESHOLD: &str = "FIXTRACK_PARALLEL_THRESHOLD";
pub const ENV_SURGICAL_LOOKBACK_MONTHS: &str = "FIXTRACK_SURGICAL_LOOKBACK_MONTHS";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_DB_MAX_CONNECTIONS: &str = "FIXTRACK_DB_MAX_CONNECTIONS";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is not a valid number: {value:?}")]
    NotANumber { name: &'static str, value: String },

    #[error("{name} is out of range: {detail}")]
    OutOfRange { name: &'static str, detail: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Engine and adapter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub calendar: CivilCalendar,
    /// History rows fetched per store round trip (1..=1000).
    pub page_size: u32,
    /// Candidate items above which seeding runs on the rayon pool.
    pub parallel_threshold: usize,
    pub surgical_lookback_months: u32,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            calendar: CivilCalendar::default(),
            page_size: MAX_PAGE_LIMIT,
            parallel_threshold: 64,
            surgical_lookback_months: 2,
            database_url: None,
            db_max_connections: 5,
        }
    }
}

impl TrackerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any key lookup (the environment, or a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let offset: i32 = parse_var(&lookup, ENV_UTC_OFFSET_MINUTES)?.unwrap_or(DEFAULT_UTC_OFFSET_MINUTES);
        config.calendar = CivilCalendar::from_offset_minutes(offset).map_err(|e| ConfigError::OutOfRange {
            name: ENV_UTC_OFFSET_MINUTES,
            detail: e.to_string(),
        })?;

        if let Some(page_size) = parse_var::<u32>(&lookup, ENV_PAGE_SIZE)? {
            if page_size == 0 || page_size > MAX_PAGE_LIMIT {
                return Err(ConfigError::OutOfRange {
                    name: ENV_PAGE_SIZE,
                    detail: format!("{page_size} not in 1..={MAX_PAGE_LIMIT}"),
                });
            }
            config.page_size = page_size;
        }

        if let Some(threshold) = parse_var(&lookup, ENV_PARALLEL_THRESHOLD)? {
            config.parallel_threshold = threshold;
        }
        if let Some(months) = parse_var(&lookup, ENV_SURGICAL_LOOKBACK_MONTHS)? {
            config.surgical_lookback_months = months;
        }
        if let Some(max) = parse_var::<u32>(&lookup, ENV_DB_MAX_CONNECTIONS)? {
            if max == 0 {
                return Err(ConfigError::OutOfRange {
                    name: ENV_DB_MAX_CONNECTIONS,
                    detail: "must be at least 1".to_string(),
                });
            }
            config.db_max_connections = max;
        }
        config.database_url = lookup(ENV_DATABASE_URL).filter(|url| !url.trim().is_empty());

        Ok(config)
    }

    pub fn with_calendar(mut self, calendar: CivilCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_LIMIT);
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn with_surgical_lookback_months(mut self, months: u32) -> Self {
        self.surgical_lookback_months = months;
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn postgres(&self) -> Result<PostgresSettings, ConfigError> {
        let url = self.database_url.clone().ok_or(ConfigError::Missing(ENV_DATABASE_URL))?;
        Ok(PostgresSettings {
            url,
            max_connections: self.db_max_connections,
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::NotANumber { name, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = TrackerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, TrackerConfig::default());
        assert_eq!(config.calendar.offset().local_minus_utc(), 9 * 3600);
        assert!(matches!(config.postgres(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn reads_overrides() {
        let config = TrackerConfig::from_lookup(lookup(&[
            (ENV_UTC_OFFSET_MINUTES, "0"),
            (ENV_PAGE_SIZE, "250"),
            (ENV_PARALLEL_THRESHOLD, "8"),
            (ENV_SURGICAL_LOOKBACK_MONTHS, "3"),
            (ENV_DATABASE_URL, "postgres://localhost/fixtrack"),
            (ENV_DB_MAX_CONNECTIONS, "2"),
        ]))
        .unwrap();
        assert_eq!(config.calendar.offset().local_minus_utc(), 0);
        assert_eq!(config.page_size, 250);
        assert_eq!(config.parallel_threshold, 8);
        assert_eq!(config.surgical_lookback_months, 3);
        let pg = config.postgres().unwrap();
        assert_eq!(pg.max_connections, 2);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            TrackerConfig::from_lookup(lookup(&[(ENV_PAGE_SIZE, "lots")])),
            Err(ConfigError::NotANumber { .. })
        ));
        assert!(matches!(
            TrackerConfig::from_lookup(lookup(&[(ENV_PAGE_SIZE, "5000")])),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(matches!(
            TrackerConfig::from_lookup(lookup(&[(ENV_UTC_OFFSET_MINUTES, "100000")])),
            Err(ConfigError::OutOfRange { .. })
        ));
    }
}
