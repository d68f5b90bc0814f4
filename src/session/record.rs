//! Typed model of session log records.
//!
//! Each log line is a JSON object with a `type` tag and a `payload`. The
//! known shapes are modeled as a closed set of variants plus an explicit
//! unknown fallback, so the summarization policy downstream is an
//! exhaustive match rather than a chain of optional lookups. Malformed
//! lines parse to `None` and are skipped, never fatal.

use serde::Deserialize;
use serde_json::Value;

/// `session_meta` payload: identity and provenance of one session.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionMetaPayload {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub cwd: String,
    #[serde(default)]
    pub source: SourceInfo,
    #[serde(default)]
    pub git: GitInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceInfo {
    #[serde(default)]
    pub subagent: SubagentInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubagentInfo {
    #[serde(default)]
    pub thread_spawn: Option<ThreadSpawn>,
}

/// Spawn linkage carried by subagent sessions.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadSpawn {
    #[serde(default)]
    pub parent_thread_id: String,
    #[serde(default)]
    pub depth: Option<i64>,
}

impl ThreadSpawn {
    /// An empty descriptor carries no linkage and classifies as primary.
    pub fn is_empty(&self) -> bool {
        self.parent_thread_id.is_empty() && self.depth.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitInfo {
    #[serde(default)]
    pub branch: String,
}

/// One fragment of a message body.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageContent {
    #[serde(default)]
    pub text: Option<String>,
}

/// Typed body of one log record.
#[derive(Debug, Clone)]
pub enum RecordBody {
    SessionMeta(SessionMetaPayload),
    TurnContext { cwd: String },
    FunctionCall { name: String },
    FunctionCallOutput,
    Reasoning,
    Message { role: String, content: Vec<MessageContent> },
    /// `response_item` with an unrecognized sub-type.
    ResponseOther(String),
    /// `event_msg`; carries `payload.type`, empty when absent.
    Event(String),
    /// Unrecognized top-level type, kept verbatim.
    Unknown(String),
}

/// One parsed log line.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: Option<String>,
    pub body: RecordBody,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct TurnContextPayload {
    #[serde(default)]
    cwd: String,
}

#[derive(Debug, Deserialize)]
struct ResponseItemPayload {
    #[serde(rename = "type", default)]
    item_type: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
struct EventMsgPayload {
    #[serde(rename = "type", default)]
    msg_type: String,
}

/// Parse one log line. `None` means blank or malformed; both are skipped.
pub fn parse_line(line: &str) -> Option<LogRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let raw: RawRecord = serde_json::from_str(line).ok()?;

    let body = match raw.kind.as_str() {
        "session_meta" => match serde_json::from_value::<SessionMetaPayload>(raw.payload) {
            Ok(meta) => RecordBody::SessionMeta(meta),
            Err(_) => RecordBody::Unknown(raw.kind.clone()),
        },
        "turn_context" => match serde_json::from_value::<TurnContextPayload>(raw.payload) {
            Ok(ctx) => RecordBody::TurnContext { cwd: ctx.cwd },
            Err(_) => RecordBody::Unknown(raw.kind.clone()),
        },
        "response_item" => match serde_json::from_value::<ResponseItemPayload>(raw.payload) {
            Ok(item) => match item.item_type.as_str() {
                "function_call" => RecordBody::FunctionCall { name: item.name },
                "function_call_output" => RecordBody::FunctionCallOutput,
                "reasoning" => RecordBody::Reasoning,
                "message" => RecordBody::Message {
                    role: item.role,
                    content: item.content,
                },
                other => RecordBody::ResponseOther(other.to_string()),
            },
            Err(_) => RecordBody::Unknown(raw.kind.clone()),
        },
        "event_msg" => match serde_json::from_value::<EventMsgPayload>(raw.payload) {
            Ok(msg) => RecordBody::Event(msg.msg_type),
            Err(_) => RecordBody::Unknown(raw.kind.clone()),
        },
        other => RecordBody::Unknown(other.to_string()),
    };

    Some(LogRecord {
        timestamp: raw.timestamp,
        body,
    })
}
