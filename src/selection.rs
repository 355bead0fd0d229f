use crate::config::is_production_like;
use crate::console::ConsoleDriver;
use crate::driver::Driver;
use crate::env::Environment;
use crate::error::DriverError;
#[cfg(feature = "postgres")]
use crate::postgres::PostgresDriver;
#[cfg(feature = "pubsub")]
use crate::pubsub::PubSubDriver;
use tracing::{error, warn};

/// Backends the selection policy can settle on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Console,
    Postgres,
    PubSub,
}

impl BackendKind {
    /// Backend preferred for `env`: Pub/Sub in production-like
    /// deployments, Postgres everywhere else.
    pub fn preferred(env: &Environment) -> Self {
        if is_production_like(env) {
            BackendKind::PubSub
        } else {
            BackendKind::Postgres
        }
    }
}

/// Build the driver for `kind` from `env`, without any fallback.
pub fn make_driver(kind: BackendKind, env: &Environment) -> Result<Box<dyn Driver>, DriverError> {
    match kind {
        BackendKind::Console => Ok(Box::new(ConsoleDriver::new())),
        BackendKind::Postgres => {
            #[cfg(feature = "postgres")]
            {
                Ok(Box::new(PostgresDriver::from_env("", env)?))
            }

            #[cfg(not(feature = "postgres"))]
            {
                let _ = env; // silence unused warning when feature is disabled
                Err(DriverError::DependencyMissing {
                    backend: "postgres",
                    hint: "rebuild trace-log-client with the `postgres` feature",
                })
            }
        }
        BackendKind::PubSub => {
            #[cfg(feature = "pubsub")]
            {
                Ok(Box::new(PubSubDriver::from_env("", "", env)?))
            }

            #[cfg(not(feature = "pubsub"))]
            {
                let _ = env;
                Err(DriverError::DependencyMissing {
                    backend: "pubsub",
                    hint: "rebuild trace-log-client with the `pubsub` feature",
                })
            }
        }
    }
}

/// Try the preferred backend for `env`; if it cannot be built, log why and
/// fall back to the console. Never fails.
pub fn select_driver(env: &Environment) -> (BackendKind, Box<dyn Driver>) {
    let preferred = BackendKind::preferred(env);
    match make_driver(preferred, env) {
        Ok(driver) => (preferred, driver),
        Err(err) => {
            error!(backend = ?preferred, error = %err, "could not initialize driver");
            warn!("using console driver as fallback");
            (BackendKind::Console, Box::new(ConsoleDriver::new()))
        }
    }
}
