//! Store configuration loaded from the environment.

use tracing::warn;

pub const DEFAULT_DATABASE: &str = "docid-test";
pub const DEFAULT_MAX_REQUESTS_PER_SESSION: usize = 100;

/// Document store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Database name handed to the id generator.
    pub database: String,
    /// Requests a single session may issue before failing.
    pub max_requests_per_session: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: DEFAULT_DATABASE.to_string(),
            max_requests_per_session: DEFAULT_MAX_REQUESTS_PER_SESSION,
        }
    }
}

impl StoreConfig {
    /// Read `DOCID_DATABASE` and `DOCID_MAX_REQUESTS_PER_SESSION`, falling
    /// back to dev defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let database = lookup("DOCID_DATABASE").unwrap_or(defaults.database);

        let max_requests_per_session = match lookup("DOCID_MAX_REQUESTS_PER_SESSION") {
            None => defaults.max_requests_per_session,
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    warn!(
                        value = %raw,
                        "DOCID_MAX_REQUESTS_PER_SESSION is not a positive integer; using default"
                    );
                    defaults.max_requests_per_session
                }
            },
        };

        Self {
            database,
            max_requests_per_session,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_max_requests_per_session(mut self, max: usize) -> Self {
        self.max_requests_per_session = max;
        self
    }
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
    fn defaults_when_unset() {
        assert_eq!(StoreConfig::from_lookup(lookup(&[])), StoreConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("DOCID_DATABASE", "orders-db"),
            ("DOCID_MAX_REQUESTS_PER_SESSION", "5"),
        ]));
        assert_eq!(config.database, "orders-db");
        assert_eq!(config.max_requests_per_session, 5);
    }

    #[test]
    fn builders_override_fields() {
        let config = StoreConfig::default()
            .with_database("orders-db")
            .with_max_requests_per_session(3);
        assert_eq!(config.database, "orders-db");
        assert_eq!(config.max_requests_per_session, 3);
    }

    #[test]
    fn invalid_request_budget_falls_back() {
        for raw in ["zero", "0", "-3"] {
            let config =
                StoreConfig::from_lookup(lookup(&[("DOCID_MAX_REQUESTS_PER_SESSION", raw)]));
            assert_eq!(
                config.max_requests_per_session,
                DEFAULT_MAX_REQUESTS_PER_SESSION
            );
        }
    }
}
