use crate::clock::reporting_timestamp;
use crate::config::DEFAULT_SERVICE_NAME;
use crate::driver::Driver;
use crate::env::Environment;
use crate::error::DriverError;
use crate::record::{LogLevel, RequestInfo, ResponseInfo, TraceLog};
use crate::selection::select_driver;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Caller-supplied fields for [`Logger::log`].
///
/// Every field is optional. A request is attached only when both `method`
/// and `path` are set, a response only when `status_code` is non-zero.
/// A non-empty `service` overrides the logger's own service name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogOptions {
    pub trace_id: String,
    /// `None`, `null` and `""` all mean INFO.
    #[serde(deserialize_with = "blank_level_as_none")]
    pub level: Option<LogLevel>,
    pub action: String,
    pub context: String,
    pub method: String,
    pub path: String,
    pub request_headers: BTreeMap<String, String>,
    pub request_body: Option<Value>,
    pub status_code: u16,
    pub response_headers: BTreeMap<String, String>,
    pub response_body: Option<Value>,
    pub message_info: String,
    pub message_raw: String,
    pub duration_ms: f64,
    pub tags: Vec<String>,
    pub service: String,
}

fn blank_level_as_none<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<LogLevel>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(name) if !name.is_empty() => name.parse().map(Some).map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

impl LogOptions {
    /// Build the trace log for these options, stamped with `timestamp`.
    pub fn into_trace_log(self, default_service: &str, timestamp: String) -> TraceLog {
        let request = (!self.method.is_empty() && !self.path.is_empty()).then(|| RequestInfo {
            method: self.method,
            path: self.path,
            headers: self.request_headers,
            body: self.request_body,
        });

        let response = (self.status_code != 0).then(|| ResponseInfo {
            status_code: self.status_code,
            headers: self.response_headers,
            body: self.response_body,
        });

        let service = if self.service.is_empty() {
            default_service.to_string()
        } else {
            self.service
        };

        TraceLog {
            trace_id: self.trace_id,
            timestamp,
            service,
            level: self.level.unwrap_or_default(),
            action: self.action,
            context: self.context,
            request,
            response,
            message_info: self.message_info,
            message_raw: self.message_raw,
            duration_ms: self.duration_ms,
            tags: self.tags,
        }
    }
}

/// Builds trace logs and hands them to a [`Driver`].
///
/// When no driver has been bound with [`Logger::set_driver`], the first
/// send picks one from the environment snapshot (see
/// [`select_driver`]) and keeps it for the logger's lifetime.
pub struct Logger {
    service: String,
    env: Environment,
    driver: Option<Box<dyn Driver>>,
}

impl Logger {
    /// Logger for `service` (or the default service name when empty),
    /// selecting its driver from the current process environment.
    pub fn new(service: &str) -> Self {
        Self::with_environment(service, Environment::from_process())
    }

    pub fn with_environment(service: &str, env: Environment) -> Self {
        let service = if service.is_empty() {
            DEFAULT_SERVICE_NAME
        } else {
            service
        };
        Logger {
            service: service.to_string(),
            env,
            driver: None,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn has_driver(&self) -> bool {
        self.driver.is_some()
    }

    /// Bind `driver`, returning the one it replaces. The replaced driver is
    /// not closed; that is left to the caller.
    pub fn set_driver(&mut self, driver: impl Driver + 'static) -> Option<Box<dyn Driver>> {
        self.driver.replace(Box::new(driver))
    }

    fn driver(&mut self) -> &mut Box<dyn Driver> {
        let env = &self.env;
        self.driver.get_or_insert_with(|| select_driver(env).1)
    }

    /// Normalize `trace` and send it through the active driver.
    pub async fn send_trace_log(&mut self, trace: &TraceLog) -> Result<String, DriverError> {
        let record = trace.normalize();
        debug!(trace_id = %trace.trace_id, action = %trace.action, "sending trace log");
        self.driver().send(&record).await
    }

    /// Build a trace log from `opts` and send it, returning the driver's
    /// delivery identifier.
    pub async fn log(&mut self, opts: LogOptions) -> Result<String, DriverError> {
        let trace = opts.into_trace_log(&self.service, reporting_timestamp());
        self.send_trace_log(&trace).await
    }

    /// Close the bound driver, if any.
    pub async fn close(&mut self) {
        if let Some(driver) = self.driver.as_mut() {
            driver.close().await;
        }
    }
}
