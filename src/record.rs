use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Transport shape handed to every [`Driver`](crate::driver::Driver).
pub type Record = Map<String, Value>;

/// Severity attached to a [`TraceLog`]. Transmitted as its upper-case name;
/// parsed case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Notice => "NOTICE",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
            LogLevel::Alert => "ALERT",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown log level: {0}")]
pub struct ParseLevelError(String);

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "NOTICE" => Ok(LogLevel::Notice),
            "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            "ALERT" => Ok(LogLevel::Alert),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Inbound HTTP-like request attached to a trace.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestInfo {
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl RequestInfo {
    pub fn normalize(&self) -> Record {
        let mut data = Record::new();
        data.insert("method".into(), Value::from(self.method.as_str()));
        data.insert("path".into(), Value::from(self.path.as_str()));
        data.insert("headers".into(), headers_value(&self.headers));
        if let Some(body) = present(&self.body) {
            data.insert("body".into(), body.clone());
        }
        data
    }
}

/// Outbound response attached to a trace.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseInfo {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl ResponseInfo {
    pub fn normalize(&self) -> Record {
        let mut data = Record::new();
        data.insert("statusCode".into(), Value::from(self.status_code));
        data.insert("headers".into(), headers_value(&self.headers));
        if let Some(body) = present(&self.body) {
            data.insert("body".into(), body.clone());
        }
        data
    }
}

/// A single structured event, built fresh for each `log` call.
///
/// Only `trace_id`, `timestamp`, `service`, `level` and `action` always
/// reach the transport mapping; every other field is dropped from
/// [`TraceLog::normalize`] when empty, zero or absent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TraceLog {
    pub trace_id: String,
    pub timestamp: String,
    pub service: String,
    pub level: LogLevel,
    pub action: String,
    pub context: String,
    pub request: Option<RequestInfo>,
    pub response: Option<ResponseInfo>,
    pub message_info: String,
    pub message_raw: String,
    pub duration_ms: f64,
    pub tags: Vec<String>,
}

impl TraceLog {
    pub fn normalize(&self) -> Record {
        let mut data = Record::new();
        data.insert("traceId".into(), Value::from(self.trace_id.as_str()));
        data.insert("timestamp".into(), Value::from(self.timestamp.as_str()));
        data.insert("service".into(), Value::from(self.service.as_str()));
        data.insert("level".into(), Value::from(self.level.as_str()));
        data.insert("action".into(), Value::from(self.action.as_str()));

        if !self.context.is_empty() {
            data.insert("context".into(), Value::from(self.context.as_str()));
        }
        if let Some(request) = &self.request {
            data.insert("request".into(), Value::Object(request.normalize()));
        }
        if let Some(response) = &self.response {
            data.insert("response".into(), Value::Object(response.normalize()));
        }
        if !self.message_info.is_empty() {
            data.insert("messageInfo".into(), Value::from(self.message_info.as_str()));
        }
        if !self.message_raw.is_empty() {
            data.insert("messageRaw".into(), Value::from(self.message_raw.as_str()));
        }
        if self.duration_ms != 0.0 {
            data.insert("durationMs".into(), Value::from(self.duration_ms));
        }
        if !self.tags.is_empty() {
            data.insert("tags".into(), Value::from(self.tags.clone()));
        }
        data
    }
}

fn headers_value(headers: &BTreeMap<String, String>) -> Value {
    Value::Object(
        headers
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect(),
    )
}

// A JSON null body counts as no body.
fn present(body: &Option<Value>) -> Option<&Value> {
    body.as_ref().filter(|b| !b.is_null())
}
