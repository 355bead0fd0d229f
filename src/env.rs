//! Environment variable names read by this crate, and an immutable
//! snapshot of them.
//!
//! Drivers never read the process environment themselves; configuration
//! is resolved once from an [`Environment`] when a driver is built.

use std::collections::HashMap;

/// Deployment environment; `prod`, `production`, `qas` and `qa` select
/// the Pub/Sub backend.
pub const ENV_ENV: &str = "ENV";

/// Postgres connection string for the relational driver.
pub const DB_URL_ENV: &str = "DB_URL";

/// Google Cloud project hosting the Pub/Sub topic.
pub const GOOGLE_CLOUD_PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";

/// Alternate name for the Google Cloud project.
pub const GCP_PROJECT_ENV: &str = "GCP_PROJECT";

/// Pub/Sub topic name.
pub const PUBSUB_TOPIC_NAME_ENV: &str = "PUBSUB_TOPIC_NAME";

/// Set to `false` (any case) to turn publishing off.
pub const PUBLISH_FLAG_ENV: &str = "SDKTRACKING_PUBLISH";

/// `host:port` of a local Pub/Sub emulator.
pub const PUBSUB_EMULATOR_HOST_ENV: &str = "PUBSUB_EMULATOR_HOST";

/// Disables colored diagnostics when set.
pub const NO_COLOR_ENV: &str = "NO_COLOR";

/// Forces colored diagnostics when set.
pub const FORCE_COLOR_ENV: &str = "FORCE_COLOR";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Point-in-time copy of the variables relevant to driver configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the current process environment.
    pub fn from_process() -> Self {
        Self::from_pairs(std::env::vars())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Environment {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of `key`, treating an empty string as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}
