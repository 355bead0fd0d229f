//! Structured trace-log client.
//!
//! Application code describes an event with [`LogOptions`], the
//! [`Logger`] turns it into a normalized [`Record`], and a pluggable
//! [`Driver`] delivers it: to the console, a Postgres table, or a
//! Pub/Sub topic. Without an explicitly bound driver the logger picks one
//! from the environment and falls back to the console when the preferred
//! backend is not configured.

pub mod clock;
pub mod config;
pub mod console;
pub mod driver;
pub mod env;
pub mod error;
pub mod init;
pub mod logger;
pub mod memory_driver;
pub mod postgres;
pub mod pubsub;
pub mod record;
pub mod selection;

pub use console::ConsoleDriver;
pub use driver::Driver;
pub use error::DriverError;
pub use logger::{LogOptions, Logger};
pub use memory_driver::MemoryDriver;
pub use postgres::PostgresDriver;
pub use pubsub::PubSubDriver;
pub use record::{LogLevel, Record, RequestInfo, ResponseInfo, TraceLog};
