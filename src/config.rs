//! Immutable driver configuration, resolved once from explicit arguments
//! with the [`Environment`] as fallback.

use crate::env::{
    Environment, DB_URL_ENV, ENV_ENV, FORCE_COLOR_ENV, GCP_PROJECT_ENV, GOOGLE_CLOUD_PROJECT_ENV,
    NO_COLOR_ENV, PUBLISH_FLAG_ENV, PUBSUB_EMULATOR_HOST_ENV, PUBSUB_TOPIC_NAME_ENV,
};
use crate::error::DriverError;

/// Service name used when a logger is created without one.
pub const DEFAULT_SERVICE_NAME: &str = "digital-edd";

/// Topic used when neither an argument nor `PUBSUB_TOPIC_NAME` names one.
pub const DEFAULT_TOPIC_NAME: &str = "digital-edd-sdk";

/// Public Pub/Sub REST endpoint.
pub const PUBSUB_API_ENDPOINT: &str = "https://pubsub.googleapis.com";

const PRODUCTION_LIKE: [&str; 4] = ["prod", "production", "qas", "qa"];

/// `true` when `ENV` names a production-like deployment (case-insensitive).
pub fn is_production_like(env: &Environment) -> bool {
    env.get(ENV_ENV)
        .map(|value| {
            let value = value.to_ascii_lowercase();
            PRODUCTION_LIKE.contains(&value.as_str())
        })
        .unwrap_or(false)
}

/// Settings for [`PostgresDriver`](crate::postgres::PostgresDriver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub database_url: String,
}

impl PostgresConfig {
    /// Use `database_url` when non-empty, otherwise `DB_URL`.
    pub fn resolve(database_url: &str, env: &Environment) -> Result<Self, DriverError> {
        let database_url = non_empty(database_url)
            .or_else(|| env.get(DB_URL_ENV))
            .ok_or_else(|| DriverError::Configuration(format!("{DB_URL_ENV} is not configured")))?;

        Ok(PostgresConfig {
            database_url: database_url.to_string(),
        })
    }
}

/// Settings for [`PubSubDriver`](crate::pubsub::PubSubDriver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubSubConfig {
    pub project_id: String,
    pub topic_name: String,
    /// When `false`, `send` returns a sentinel without any network call.
    pub publish_enabled: bool,
    /// `host:port` of a Pub/Sub emulator, if one is configured.
    pub emulator_host: Option<String>,
}

impl PubSubConfig {
    /// Resolve project and topic from the arguments, falling back to
    /// `GOOGLE_CLOUD_PROJECT`, then `GCP_PROJECT`, and `PUBSUB_TOPIC_NAME`.
    pub fn resolve(
        project_id: &str,
        topic_name: &str,
        env: &Environment,
    ) -> Result<Self, DriverError> {
        let project_id = non_empty(project_id)
            .or_else(|| env.get(GOOGLE_CLOUD_PROJECT_ENV))
            .or_else(|| env.get(GCP_PROJECT_ENV))
            .ok_or_else(|| {
                DriverError::Configuration(format!("{GOOGLE_CLOUD_PROJECT_ENV} is not configured"))
            })?;

        let topic_name = non_empty(topic_name)
            .or_else(|| env.get(PUBSUB_TOPIC_NAME_ENV))
            .unwrap_or(DEFAULT_TOPIC_NAME);

        let publish_enabled = env
            .get(PUBLISH_FLAG_ENV)
            .map(|flag| !flag.eq_ignore_ascii_case("false"))
            .unwrap_or(true);

        Ok(PubSubConfig {
            project_id: project_id.to_string(),
            topic_name: topic_name.to_string(),
            publish_enabled,
            emulator_host: env.get(PUBSUB_EMULATOR_HOST_ENV).map(str::to_string),
        })
    }

    /// `projects/{project}/topics/{topic}`.
    pub fn topic_path(&self) -> String {
        format!("projects/{}/topics/{}", self.project_id, self.topic_name)
    }

    /// Base URL of the Pub/Sub REST API, honoring the emulator.
    pub fn endpoint(&self) -> String {
        match &self.emulator_host {
            Some(host) => format!("http://{host}"),
            None => PUBSUB_API_ENDPOINT.to_string(),
        }
    }
}

/// Settings for the crate's own console diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsConfig {
    pub color: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        DiagnosticsConfig { color: true }
    }
}

impl DiagnosticsConfig {
    /// `NO_COLOR` wins over `FORCE_COLOR`; color is on otherwise.
    pub fn resolve(env: &Environment) -> Self {
        let color = if env.contains(NO_COLOR_ENV) {
            false
        } else if env.contains(FORCE_COLOR_ENV) {
            true
        } else {
            DiagnosticsConfig::default().color
        };
        DiagnosticsConfig { color }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value).filter(|v| !v.is_empty())
}
