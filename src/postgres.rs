use crate::config::PostgresConfig;
use crate::driver::Driver;
use crate::env::Environment;
use crate::error::DriverError;
use crate::record::Record;
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::{debug, info};

const BACKEND: &str = "postgres";

/// Table every trace row is written to.
pub const TABLE_NAME: &str = "LGS_EDD_SDK_HIS";

/// Idempotent schema: the table plus indexes on trace id and UTC time.
pub const SCHEMA_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS LGS_EDD_SDK_HIS (
    id SERIAL PRIMARY KEY,
    traceId VARCHAR(255) NOT NULL,
    timeLocal TIMESTAMP NOT NULL,
    timeUTC TIMESTAMP NOT NULL,
    service VARCHAR(255) NOT NULL,
    level VARCHAR(50) NOT NULL,
    "user" VARCHAR(255),
    action VARCHAR(255),
    context VARCHAR(255),
    request JSONB,
    response JSONB,
    durationMs FLOAT,
    tags TEXT,
    messageInfo TEXT,
    messageRaw TEXT,
    flagSummary INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_lgs_edd_sdk_his_trace_id ON LGS_EDD_SDK_HIS(traceId);
CREATE INDEX IF NOT EXISTS idx_lgs_edd_sdk_his_time_utc ON LGS_EDD_SDK_HIS(timeUTC);
"#;

/// Parameterized insert; parameters follow the field order of [`LogRow`].
pub const INSERT_SQL: &str = r#"
INSERT INTO LGS_EDD_SDK_HIS
    (traceId, timeLocal, timeUTC, service, level, "user", action, context,
     request, response, durationMs, tags, messageInfo, messageRaw, flagSummary)
VALUES
    ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
RETURNING id
"#;

/// Column values for one inserted trace.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub trace_id: Option<String>,
    pub time_local: NaiveDateTime,
    pub time_utc: NaiveDateTime,
    pub service: Option<String>,
    pub level: Option<String>,
    /// No record field feeds this column yet; always `None`.
    pub user: Option<String>,
    pub action: Option<String>,
    pub context: Option<String>,
    pub request: Option<Value>,
    pub response: Option<Value>,
    pub duration_ms: Option<f64>,
    /// Tags joined with `,`; `None` when there are none.
    pub tags: Option<String>,
    pub message_info: Option<String>,
    pub message_raw: Option<String>,
    pub flag_summary: i32,
}

impl LogRow {
    pub fn from_record(record: &Record, time_local: NaiveDateTime, time_utc: NaiveDateTime) -> Self {
        let text = |key: &str| record.get(key).and_then(Value::as_str).map(str::to_string);
        let json = |key: &str| record.get(key).filter(|v| !v.is_null()).cloned();

        let tags = record
            .get("tags")
            .and_then(Value::as_array)
            .filter(|tags| !tags.is_empty())
            .map(|tags| {
                tags.iter()
                    .map(|tag| match tag {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(",")
            });

        LogRow {
            trace_id: text("traceId"),
            time_local,
            time_utc,
            service: text("service"),
            level: text("level"),
            user: text("user"),
            action: text("action"),
            context: text("context"),
            request: json("request"),
            response: json("response"),
            duration_ms: record.get("durationMs").and_then(Value::as_f64),
            tags,
            message_info: text("messageInfo"),
            message_raw: text("messageRaw"),
            flag_summary: 0,
        }
    }
}

/// Opens sessions against a Postgres server.
#[async_trait]
pub trait PgConnector: Send + Sync {
    async fn connect(&self, database_url: &str) -> Result<Box<dyn PgSession>, DriverError>;
}

/// An open connection used by [`PostgresDriver`].
#[async_trait]
pub trait PgSession: Send {
    /// Run `ddl` and commit it.
    async fn migrate(&mut self, ddl: &str) -> Result<(), DriverError>;

    /// Insert `row` with [`INSERT_SQL`] and commit, returning the generated id
    /// if the server reported one.
    async fn insert(&mut self, row: &LogRow) -> Result<Option<i64>, DriverError>;

    async fn close(&mut self);
}

/// Where a [`PostgresDriver`] stands in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStage {
    Unconnected,
    Connected,
    SchemaVerified,
}

#[derive(Default)]
enum State {
    #[default]
    Unconnected,
    Connected(Box<dyn PgSession>),
    SchemaVerified(Box<dyn PgSession>),
}

/// Driver that inserts each record as a row of [`TABLE_NAME`].
///
/// The connection is opened on the first `send` and the schema is verified
/// once per driver; construction only validates configuration.
pub struct PostgresDriver {
    config: PostgresConfig,
    connector: Box<dyn PgConnector>,
    state: State,
}

impl PostgresDriver {
    /// Build from an explicit connection string, or `DB_URL` when empty.
    pub fn new(database_url: &str) -> Result<Self, DriverError> {
        Self::from_env(database_url, &Environment::from_process())
    }

    pub fn from_env(database_url: &str, env: &Environment) -> Result<Self, DriverError> {
        Ok(Self::from_config(PostgresConfig::resolve(database_url, env)?))
    }

    pub fn from_config(config: PostgresConfig) -> Self {
        Self::with_connector(config, default_connector())
    }

    pub fn with_connector(config: PostgresConfig, connector: impl PgConnector + 'static) -> Self {
        PostgresDriver {
            config,
            connector: Box::new(connector),
            state: State::Unconnected,
        }
    }

    pub fn stage(&self) -> ConnectionStage {
        match self.state {
            State::Unconnected => ConnectionStage::Unconnected,
            State::Connected(_) => ConnectionStage::Connected,
            State::SchemaVerified(_) => ConnectionStage::SchemaVerified,
        }
    }

    async fn ensure_connection(&mut self) -> Result<(), DriverError> {
        if let State::Unconnected = self.state {
            let session = self.connector.connect(&self.config.database_url).await?;
            info!(backend = BACKEND, "connected to postgres");
            self.state = State::Connected(session);
        }
        Ok(())
    }

    async fn ensure_table(&mut self) -> Result<(), DriverError> {
        self.ensure_connection().await?;
        if let State::Connected(session) = &mut self.state {
            session.migrate(SCHEMA_DDL).await?;
            if let State::Connected(session) = std::mem::take(&mut self.state) {
                self.state = State::SchemaVerified(session);
            }
            info!(table = TABLE_NAME, "table verified");
        }
        Ok(())
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    async fn send(&mut self, record: &Record) -> Result<String, DriverError> {
        self.ensure_table().await?;
        let State::SchemaVerified(session) = &mut self.state else {
            return Err(DriverError::Integrity(
                "schema was not verified before insert".to_string(),
            ));
        };

        let row = LogRow::from_record(record, Local::now().naive_local(), Utc::now().naive_utc());
        let id = session.insert(&row).await?.ok_or_else(|| {
            DriverError::Integrity("no id returned while inserting log record".to_string())
        })?;
        debug!(id, "trace row inserted");
        Ok(id.to_string())
    }

    async fn close(&mut self) {
        match std::mem::take(&mut self.state) {
            State::Connected(mut session) | State::SchemaVerified(mut session) => {
                session.close().await
            }
            State::Unconnected => {}
        }
    }
}

#[cfg(feature = "postgres")]
fn default_connector() -> impl PgConnector {
    TokioPostgresConnector
}

#[cfg(not(feature = "postgres"))]
fn default_connector() -> impl PgConnector {
    MissingConnector
}

#[cfg(not(feature = "postgres"))]
struct MissingConnector;

#[cfg(not(feature = "postgres"))]
#[async_trait]
impl PgConnector for MissingConnector {
    async fn connect(&self, _database_url: &str) -> Result<Box<dyn PgSession>, DriverError> {
        Err(DriverError::DependencyMissing {
            backend: BACKEND,
            hint: "rebuild trace-log-client with the `postgres` feature",
        })
    }
}

#[cfg(feature = "postgres")]
pub use tokio_pg::TokioPostgresConnector;

#[cfg(feature = "postgres")]
mod tokio_pg {
    use super::{LogRow, PgConnector, PgSession, BACKEND, INSERT_SQL};
    use crate::error::DriverError;
    use async_trait::async_trait;
    use tokio::task::JoinHandle;
    use tokio_postgres::{Client, NoTls};
    use tracing::error;

    /// [`PgConnector`] backed by `tokio-postgres` without TLS.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct TokioPostgresConnector;

    struct TokioPostgresSession {
        client: Client,
        connection: JoinHandle<()>,
    }

    #[async_trait]
    impl PgConnector for TokioPostgresConnector {
        async fn connect(&self, database_url: &str) -> Result<Box<dyn PgSession>, DriverError> {
            let (client, connection) = tokio_postgres::connect(database_url, NoTls)
                .await
                .map_err(|e| DriverError::connection(BACKEND, e))?;

            // The connection object drives the socket I/O.
            let connection = tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!(error = %e, "postgres connection error");
                }
            });

            Ok(Box::new(TokioPostgresSession { client, connection }))
        }
    }

    #[async_trait]
    impl PgSession for TokioPostgresSession {
        async fn migrate(&mut self, ddl: &str) -> Result<(), DriverError> {
            // Simple-query batches run outside an explicit transaction and
            // are committed as they complete.
            self.client
                .batch_execute(ddl)
                .await
                .map_err(|e| DriverError::delivery(BACKEND, e))
        }

        async fn insert(&mut self, row: &LogRow) -> Result<Option<i64>, DriverError> {
            let inserted = self
                .client
                .query_opt(
                    INSERT_SQL,
                    &[
                        &row.trace_id,
                        &row.time_local,
                        &row.time_utc,
                        &row.service,
                        &row.level,
                        &row.user,
                        &row.action,
                        &row.context,
                        &row.request,
                        &row.response,
                        &row.duration_ms,
                        &row.tags,
                        &row.message_info,
                        &row.message_raw,
                        &row.flag_summary,
                    ],
                )
                .await
                .map_err(|e| DriverError::delivery(BACKEND, e))?;

            inserted
                .map(|r| r.try_get::<_, i32>(0).map(i64::from))
                .transpose()
                .map_err(|e| DriverError::delivery(BACKEND, e))
        }

        async fn close(&mut self) {
            self.connection.abort();
        }
    }
}
