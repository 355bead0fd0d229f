use trace_log_client::init::init_diagnostics;
use trace_log_client::{LogOptions, Logger, PubSubDriver};

/// Publishes one trace to Pub/Sub.
///
/// Needs `GOOGLE_CLOUD_PROJECT` (or `GCP_PROJECT`). Set
/// `PUBSUB_EMULATOR_HOST=localhost:8085` to target a local emulator, or
/// `SDKTRACKING_PUBLISH=false` to skip the network entirely.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_diagnostics()?;

    let driver = PubSubDriver::new("", "")?;
    let mut logger = Logger::new("pubsub-demo");
    logger.set_driver(driver);

    let id = logger
        .log(LogOptions {
            trace_id: "demo-003".into(),
            action: "USER_LOGIN".into(),
            duration_ms: 4.0,
            ..Default::default()
        })
        .await?;

    println!("published message {id}");
    logger.close().await;
    Ok(())
}
