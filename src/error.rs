use std::error::Error;

/// Boxed error used as the source of backend failures.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Error type returned by drivers and by driver construction.
#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    /// A required connection string or namespace was not configured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The client library for a backend was compiled out.
    #[error("{backend} support is not available: {hint}")]
    DependencyMissing {
        backend: &'static str,
        hint: &'static str,
    },

    /// The backend could not be reached while connecting lazily.
    #[error("failed to connect to {backend}: {source}")]
    Connection {
        backend: &'static str,
        #[source]
        source: BoxError,
    },

    /// The backend was reached but rejected the write.
    #[error("{backend} delivery failed: {source}")]
    Delivery {
        backend: &'static str,
        #[source]
        source: BoxError,
    },

    /// A write completed without producing an identifier.
    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

impl DriverError {
    pub fn connection(backend: &'static str, source: impl Into<BoxError>) -> Self {
        DriverError::Connection {
            backend,
            source: source.into(),
        }
    }

    pub fn delivery(backend: &'static str, source: impl Into<BoxError>) -> Self {
        DriverError::Delivery {
            backend,
            source: source.into(),
        }
    }

    /// `true` for failures that stem from how the driver was configured
    /// rather than from the backend itself.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DriverError::Configuration(_) | DriverError::DependencyMissing { .. }
        )
    }
}
