use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use trace_log_client::env::{Environment, PUBLISH_FLAG_ENV};
use trace_log_client::pubsub::PUBLISH_DISABLED_ID;
use trace_log_client::{
    ConsoleDriver, Driver, DriverError, LogLevel, LogOptions, Logger, MemoryDriver, PubSubDriver,
    Record,
};

/// Driver that fails every send, to check errors reach the caller.
struct RejectingDriver;

#[async_trait]
impl Driver for RejectingDriver {
    async fn send(&mut self, _record: &Record) -> Result<String, DriverError> {
        Err(DriverError::delivery("test", "rejected"))
    }

    async fn close(&mut self) {}
}

fn logger_with_memory() -> (Logger, trace_log_client::memory_driver::MemoryHandle) {
    let mut logger = Logger::with_environment("test-service", Environment::default());
    let driver = MemoryDriver::new();
    let handle = driver.handle();
    logger.set_driver(driver);
    (logger, handle)
}

#[tokio::test]
async fn log_builds_request_and_response() {
    let (mut logger, handle) = logger_with_memory();

    let id = logger
        .log(LogOptions {
            trace_id: "t-1".into(),
            action: "A".into(),
            method: "POST".into(),
            path: "/x".into(),
            status_code: 200,
            duration_ms: 12.5,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(id, "memory-log");
    let record = handle.last().unwrap();
    assert_eq!(record["request"]["method"], "POST");
    assert_eq!(record["request"]["headers"], json!({}));
    assert_eq!(record["response"]["statusCode"], 200);
    assert_eq!(record["durationMs"], 12.5);
    assert_eq!(record["service"], "test-service");
    assert!(!record.contains_key("tags"));
}

#[tokio::test]
async fn bare_trace_id_yields_only_required_keys() {
    let (mut logger, handle) = logger_with_memory();

    logger
        .log(LogOptions {
            trace_id: "t-2".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let record = handle.last().unwrap();
    let mut keys: Vec<_> = record.keys().cloned().collect();
    keys.sort();
    assert_eq!(keys, ["action", "level", "service", "timestamp", "traceId"]);
    assert_eq!(record["level"], "INFO");
    assert_eq!(record["traceId"], "t-2");
}

#[tokio::test]
async fn tags_keep_order_and_length() {
    let (mut logger, handle) = logger_with_memory();

    logger
        .log(LogOptions {
            trace_id: "t-3".into(),
            action: "TAGGED_ACTION".into(),
            tags: vec!["tag1".into(), "tag2".into(), "tag3".into()],
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(handle.last().unwrap()["tags"], json!(["tag1", "tag2", "tag3"]));
}

#[tokio::test]
async fn custom_level_and_context_are_forwarded() {
    let (mut logger, handle) = logger_with_memory();

    logger
        .log(LogOptions {
            trace_id: "t-4".into(),
            action: "ERROR_ACTION".into(),
            context: "TestContext".into(),
            level: Some(LogLevel::Error),
            ..Default::default()
        })
        .await
        .unwrap();

    let record = handle.last().unwrap();
    assert_eq!(record["level"], "ERROR");
    assert_eq!(record["context"], "TestContext");
    let timestamp = record["timestamp"].as_str().unwrap();
    assert!(timestamp.ends_with('Z'));
    assert_eq!(timestamp.len(), 24);
}

#[tokio::test]
async fn zero_status_code_omits_response() {
    let (mut logger, handle) = logger_with_memory();

    logger
        .log(LogOptions {
            trace_id: "t-5".into(),
            response_body: Some(json!({"ignored": true})),
            path: "/only-path".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let record = handle.last().unwrap();
    assert!(!record.contains_key("response"));
    assert!(!record.contains_key("request"));
}

#[tokio::test]
async fn close_reaches_bound_driver() {
    let (mut logger, handle) = logger_with_memory();
    logger.close().await;
    assert!(handle.is_closed());
}

#[tokio::test]
async fn set_driver_hands_back_previous_without_closing_it() {
    let (mut logger, first) = logger_with_memory();

    let second = MemoryDriver::new();
    let second_handle = second.handle();
    let mut previous = logger.set_driver(second).unwrap();
    assert!(!first.is_closed());

    logger
        .log(LogOptions {
            trace_id: "t-6".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(first.records().is_empty());
    assert_eq!(second_handle.records().len(), 1);

    previous.close().await;
    assert!(first.is_closed());
}

#[tokio::test]
async fn send_failures_propagate() {
    let mut logger = Logger::with_environment("svc", Environment::default());
    logger.set_driver(RejectingDriver);

    let err = logger.log(LogOptions::default()).await.unwrap_err();
    assert!(matches!(err, DriverError::Delivery { .. }));
}

#[tokio::test]
async fn unconfigured_environment_falls_back_to_console() {
    let mut logger = Logger::with_environment("svc", Environment::default());
    assert!(!logger.has_driver());

    let id = logger
        .log(LogOptions {
            trace_id: "t-7".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(id, "console-log");
    assert!(logger.has_driver());
    logger.close().await;
}

#[tokio::test]
async fn disabled_pubsub_short_circuits_through_logger() {
    let env = Environment::from_pairs([(PUBLISH_FLAG_ENV, "false")]);
    let driver = PubSubDriver::from_env("proj", "topic", &env).unwrap();

    let mut logger = Logger::with_environment("svc", env);
    logger.set_driver(driver);

    let id = logger.log(LogOptions::default()).await.unwrap();
    assert_eq!(id, PUBLISH_DISABLED_ID);
}

#[tokio::test]
async fn console_driver_output_is_pretty_json() {
    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let sink = Sink::default();
    let mut logger = Logger::with_environment("svc", Environment::default());
    logger.set_driver(ConsoleDriver::with_writer(sink.clone()));

    logger
        .log(LogOptions {
            trace_id: "t-8".into(),
            action: "PRINT".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let printed = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&printed).unwrap();
    assert_eq!(parsed["action"], "PRINT");
    assert!(printed.lines().count() > 1);
}
