use crate::driver::Driver;
use crate::error::DriverError;
use crate::record::Record;
use async_trait::async_trait;
use std::io::{self, Write};

/// Identifier returned by every [`ConsoleDriver::send`].
pub const CONSOLE_DELIVERY_ID: &str = "console-log";

/// Driver that pretty-prints records as JSON.
///
/// Used for local development and as the fallback when the preferred
/// backend cannot be built. Write failures are ignored: `send` always
/// succeeds.
pub struct ConsoleDriver {
    out: Box<dyn Write + Send>,
}

impl ConsoleDriver {
    /// Print to standard output.
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }

    pub fn with_writer(out: impl Write + Send + 'static) -> Self {
        ConsoleDriver { out: Box::new(out) }
    }
}

impl Default for ConsoleDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for ConsoleDriver {
    async fn send(&mut self, record: &Record) -> Result<String, DriverError> {
        let text = serde_json::to_string_pretty(record).unwrap_or_else(|_| format!("{record:?}"));
        let _ = writeln!(self.out, "{text}");
        let _ = self.out.flush();
        Ok(CONSOLE_DELIVERY_ID.to_string())
    }

    async fn close(&mut self) {}
}
