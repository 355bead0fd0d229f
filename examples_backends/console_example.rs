use serde_json::json;
use trace_log_client::init::init_diagnostics;
use trace_log_client::{ConsoleDriver, LogLevel, LogOptions, Logger};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_diagnostics()?;

    let mut logger = Logger::new("console-demo");
    logger.set_driver(ConsoleDriver::new());

    let id = logger
        .log(LogOptions {
            trace_id: "demo-001".into(),
            action: "CREATE_ORDER".into(),
            context: "OrderService".into(),
            level: Some(LogLevel::Notice),
            method: "POST".into(),
            path: "/orders".into(),
            request_body: Some(json!({"sku": "A-1", "qty": 2})),
            status_code: 201,
            response_body: Some(json!({"orderId": 991})),
            duration_ms: 18.2,
            tags: vec!["orders".into(), "demo".into()],
            ..Default::default()
        })
        .await?;

    println!("delivered as {id}");
    logger.close().await;
    Ok(())
}
