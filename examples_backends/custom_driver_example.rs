use async_trait::async_trait;
use trace_log_client::{Driver, DriverError, LogOptions, Logger, Record};

/// Example of plugging in a completely custom backend by implementing
/// the `Driver` trait directly. A real driver would call its own client
/// library here; this one prints a single line per record.
struct OneLineDriver {
    sent: u64,
}

#[async_trait]
impl Driver for OneLineDriver {
    async fn send(&mut self, record: &Record) -> Result<String, DriverError> {
        self.sent += 1;
        println!("[one-line] {}", serde_json::to_string(record)?);
        Ok(format!("line-{}", self.sent))
    }

    async fn close(&mut self) {
        println!("[one-line] closed after {} records", self.sent);
    }
}

#[tokio::main]
async fn main() -> Result<(), DriverError> {
    let mut logger = Logger::new("custom-demo");
    logger.set_driver(OneLineDriver { sent: 0 });

    for step in ["FETCH", "TRANSFORM", "STORE"] {
        logger
            .log(LogOptions {
                trace_id: "demo-004".into(),
                action: step.into(),
                ..Default::default()
            })
            .await?;
    }

    logger.close().await;
    Ok(())
}
