use crate::config::PubSubConfig;
use crate::driver::Driver;
use crate::env::Environment;
use crate::error::DriverError;
use crate::record::Record;
use async_trait::async_trait;
use tracing::{debug, info};

const BACKEND: &str = "pubsub";

/// Identifier returned when publishing is turned off.
pub const PUBLISH_DISABLED_ID: &str = "publish-disabled";

/// Creates publisher clients for a resolved [`PubSubConfig`].
#[async_trait]
pub trait PublisherConnector: Send + Sync {
    async fn connect(&self, config: &PubSubConfig) -> Result<Box<dyn Publisher>, DriverError>;
}

/// An established publisher client.
#[async_trait]
pub trait Publisher: Send {
    /// Publish `data` to `topic_path` and wait for the server-assigned
    /// message id.
    async fn publish(&mut self, topic_path: &str, data: Vec<u8>) -> Result<String, DriverError>;
}

struct Connection {
    publisher: Box<dyn Publisher>,
    topic_path: String,
}

/// Driver that publishes each record as a JSON message to a Pub/Sub topic.
pub struct PubSubDriver {
    config: PubSubConfig,
    connector: Box<dyn PublisherConnector>,
    connection: Option<Connection>,
}

impl PubSubDriver {
    /// Build from explicit project and topic; empty values fall back to
    /// the environment.
    pub fn new(project_id: &str, topic_name: &str) -> Result<Self, DriverError> {
        Self::from_env(project_id, topic_name, &Environment::from_process())
    }

    pub fn from_env(
        project_id: &str,
        topic_name: &str,
        env: &Environment,
    ) -> Result<Self, DriverError> {
        Ok(Self::from_config(PubSubConfig::resolve(project_id, topic_name, env)?))
    }

    pub fn from_config(config: PubSubConfig) -> Self {
        Self::with_connector(config, default_connector())
    }

    pub fn with_connector(
        config: PubSubConfig,
        connector: impl PublisherConnector + 'static,
    ) -> Self {
        PubSubDriver {
            config,
            connector: Box::new(connector),
            connection: None,
        }
    }

    pub fn config(&self) -> &PubSubConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    async fn ensure_client(&mut self) -> Result<&mut Connection, DriverError> {
        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => {
                let publisher = self.connector.connect(&self.config).await?;
                info!(topic = %self.config.topic_name, "pubsub connected");
                Connection {
                    publisher,
                    topic_path: self.config.topic_path(),
                }
            }
        };
        Ok(self.connection.insert(connection))
    }
}

#[async_trait]
impl Driver for PubSubDriver {
    async fn send(&mut self, record: &Record) -> Result<String, DriverError> {
        if !self.config.publish_enabled {
            return Ok(PUBLISH_DISABLED_ID.to_string());
        }

        let data = serde_json::to_vec(record)?;
        let connection = self.ensure_client().await?;
        let id = connection
            .publisher
            .publish(&connection.topic_path, data)
            .await?;
        debug!(message_id = %id, "trace published");
        Ok(id)
    }

    async fn close(&mut self) {
        self.connection = None;
    }
}

#[cfg(feature = "pubsub")]
fn default_connector() -> impl PublisherConnector {
    HttpPublisherConnector::default()
}

#[cfg(not(feature = "pubsub"))]
fn default_connector() -> impl PublisherConnector {
    MissingConnector
}

#[cfg(not(feature = "pubsub"))]
struct MissingConnector;

#[cfg(not(feature = "pubsub"))]
#[async_trait]
impl PublisherConnector for MissingConnector {
    async fn connect(&self, _config: &PubSubConfig) -> Result<Box<dyn Publisher>, DriverError> {
        Err(DriverError::DependencyMissing {
            backend: BACKEND,
            hint: "rebuild trace-log-client with the `pubsub` feature",
        })
    }
}

#[cfg(feature = "pubsub")]
pub use http::HttpPublisherConnector;

#[cfg(feature = "pubsub")]
mod http {
    use super::{Publisher, PublisherConnector, BACKEND};
    use crate::config::PubSubConfig;
    use crate::error::DriverError;
    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use reqwest::Client;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use std::time::{Duration, Instant};

    /// GCE/GKE metadata endpoint handing out the service account token.
    const METADATA_TOKEN_URL: &str =
        "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

    /// Refresh tokens this long before they expire.
    const TOKEN_SLACK: Duration = Duration::from_secs(60);

    /// [`PublisherConnector`] speaking the Pub/Sub REST API.
    ///
    /// Against an emulator (`PUBSUB_EMULATOR_HOST`) no credentials are
    /// sent; otherwise an access token is taken from the metadata server.
    #[derive(Debug, Clone, Default)]
    pub struct HttpPublisherConnector {
        access_token: Option<String>,
    }

    impl HttpPublisherConnector {
        /// Use a fixed bearer token instead of the metadata server.
        pub fn with_access_token(token: impl Into<String>) -> Self {
            HttpPublisherConnector {
                access_token: Some(token.into()),
            }
        }
    }

    enum Credentials {
        Anonymous,
        Static(String),
        Metadata { token: String, expires_at: Instant },
    }

    struct HttpPublisher {
        client: Client,
        endpoint: String,
        credentials: Credentials,
    }

    #[derive(Deserialize)]
    struct TokenResponse {
        access_token: String,
        expires_in: u64,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct PublishResponse {
        #[serde(default)]
        message_ids: Vec<String>,
    }

    #[async_trait]
    impl PublisherConnector for HttpPublisherConnector {
        async fn connect(&self, config: &PubSubConfig) -> Result<Box<dyn Publisher>, DriverError> {
            let client = Client::new();
            let credentials = match (&config.emulator_host, &self.access_token) {
                (Some(_), _) => Credentials::Anonymous,
                (None, Some(token)) => Credentials::Static(token.clone()),
                (None, None) => fetch_metadata_token(&client).await?,
            };

            Ok(Box::new(HttpPublisher {
                client,
                endpoint: config.endpoint(),
                credentials,
            }))
        }
    }

    async fn fetch_metadata_token(client: &Client) -> Result<Credentials, DriverError> {
        let resp = client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| DriverError::connection(BACKEND, e))?;

        if !resp.status().is_success() {
            return Err(DriverError::connection(
                BACKEND,
                format!("metadata token request failed with status {}", resp.status()),
            ));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| DriverError::connection(BACKEND, e))?;

        Ok(Credentials::Metadata {
            token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }

    impl HttpPublisher {
        async fn bearer(&mut self) -> Result<Option<&str>, DriverError> {
            if let Credentials::Metadata { expires_at, .. } = &self.credentials {
                if Instant::now() + TOKEN_SLACK >= *expires_at {
                    self.credentials = fetch_metadata_token(&self.client).await?;
                }
            }
            Ok(match &self.credentials {
                Credentials::Anonymous => None,
                Credentials::Static(token) | Credentials::Metadata { token, .. } => {
                    Some(token.as_str())
                }
            })
        }
    }

    #[async_trait]
    impl Publisher for HttpPublisher {
        async fn publish(&mut self, topic_path: &str, data: Vec<u8>) -> Result<String, DriverError> {
            let url = publish_url(&self.endpoint, topic_path);
            let body = publish_body(&data);
            let client = self.client.clone();

            let mut request = client.post(&url).json(&body);
            if let Some(token) = self.bearer().await? {
                request = request.bearer_auth(token);
            }

            let resp = request
                .send()
                .await
                .map_err(|e| DriverError::connection(BACKEND, e))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
                return Err(DriverError::delivery(
                    BACKEND,
                    format!("publish failed with status {}: {}", status, text),
                ));
            }

            let published: PublishResponse = resp
                .json()
                .await
                .map_err(|e| DriverError::delivery(BACKEND, e))?;

            published
                .message_ids
                .into_iter()
                .next()
                .ok_or_else(|| DriverError::delivery(BACKEND, "publish response carried no message id"))
        }
    }

    pub(super) fn publish_url(endpoint: &str, topic_path: &str) -> String {
        let path = topic_path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/v1/{}:publish", endpoint.trim_end_matches('/'), path)
    }

    pub(super) fn publish_body(data: &[u8]) -> Value {
        json!({ "messages": [{ "data": STANDARD.encode(data) }] })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{GOOGLE_CLOUD_PROJECT_ENV, PUBLISH_FLAG_ENV};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Published {
        connects: Arc<AtomicUsize>,
        messages: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    }

    struct FakeConnector(Published);

    struct FakePublisher(Published);

    #[async_trait]
    impl PublisherConnector for FakeConnector {
        async fn connect(&self, _config: &PubSubConfig) -> Result<Box<dyn Publisher>, DriverError> {
            self.0.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakePublisher(self.0.clone())))
        }
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        async fn publish(&mut self, topic_path: &str, data: Vec<u8>) -> Result<String, DriverError> {
            let mut messages = self.0.messages.lock().unwrap();
            messages.push((topic_path.to_string(), data));
            Ok(format!("msg-{}", messages.len()))
        }
    }

    fn config(publish_enabled: bool) -> PubSubConfig {
        PubSubConfig {
            project_id: "proj".to_string(),
            topic_name: "traces".to_string(),
            publish_enabled,
            emulator_host: None,
        }
    }

    fn record() -> Record {
        json!({"traceId": "t-9", "action": "PUBLISH"}).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn disabled_publishing_never_connects() {
        let published = Published::default();
        let mut driver = PubSubDriver::with_connector(config(false), FakeConnector(published.clone()));

        assert_eq!(driver.send(&record()).await.unwrap(), PUBLISH_DISABLED_ID);
        assert_eq!(published.connects.load(Ordering::SeqCst), 0);
        assert!(!driver.is_connected());
    }

    #[tokio::test]
    async fn publishes_full_record_as_json() {
        let published = Published::default();
        let mut driver = PubSubDriver::with_connector(config(true), FakeConnector(published.clone()));

        assert_eq!(driver.send(&record()).await.unwrap(), "msg-1");
        assert_eq!(driver.send(&record()).await.unwrap(), "msg-2");
        assert_eq!(published.connects.load(Ordering::SeqCst), 1);

        let messages = published.messages.lock().unwrap();
        let (topic, data) = &messages[0];
        assert_eq!(topic, "projects/proj/topics/traces");
        let decoded: serde_json::Value = serde_json::from_slice(data).unwrap();
        assert_eq!(decoded, json!({"traceId": "t-9", "action": "PUBLISH"}));
    }

    #[tokio::test]
    async fn close_releases_client_and_is_idempotent() {
        let published = Published::default();
        let mut driver = PubSubDriver::with_connector(config(true), FakeConnector(published.clone()));
        driver.send(&record()).await.unwrap();
        assert!(driver.is_connected());

        driver.close().await;
        driver.close().await;
        assert!(!driver.is_connected());

        driver.send(&record()).await.unwrap();
        assert_eq!(published.connects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn construction_reads_flag_once() {
        let env = Environment::from_pairs([
            (GOOGLE_CLOUD_PROJECT_ENV, "proj"),
            (PUBLISH_FLAG_ENV, "False"),
        ]);
        let driver = PubSubDriver::from_env("", "", &env).unwrap();
        assert!(!driver.config().publish_enabled);
        assert_eq!(driver.config().topic_name, "digital-edd-sdk");
    }

    #[test]
    fn construction_without_project_fails() {
        let err = PubSubDriver::from_env("", "", &Environment::default()).err().unwrap();
        assert!(matches!(err, DriverError::Configuration(_)));
    }

    #[cfg(feature = "pubsub")]
    #[tokio::test]
    async fn rest_connector_skips_metadata_when_credentials_are_known() {
        let static_token = HttpPublisherConnector::with_access_token("token");
        assert!(static_token.connect(&config(true)).await.is_ok());

        let emulator = PubSubConfig {
            emulator_host: Some("localhost:8085".to_string()),
            ..config(true)
        };
        assert!(HttpPublisherConnector::default().connect(&emulator).await.is_ok());
    }

    #[cfg(feature = "pubsub")]
    #[test]
    fn rest_request_shape() {
        assert_eq!(
            http::publish_url("http://localhost:8085/", "projects/p/topics/my topic"),
            "http://localhost:8085/v1/projects/p/topics/my%20topic:publish"
        );
        assert_eq!(
            http::publish_body(b"{}"),
            json!({"messages": [{"data": "e30="}]})
        );
    }
}
