//! `PipelineEvent`: the tagged union streamed to callers over the
//! Streaming Channel, and returned in collapsed form to batch callers.

use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PipelineEvent {
    Connection {
        #[serde(rename = "streamId")]
        stream_id: String,
    },
    Progress {
        step: String,
        message: String,
        progress: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    Result {
        step: String,
        progress: u8,
        data: Value,
    },
    Error {
        step: String,
        message: String,
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        suggestions: Option<Vec<String>>,
    },
}

impl PipelineEvent {
    pub fn connection(stream_id: impl Into<String>) -> Self {
        Self::Connection { stream_id: stream_id.into() }
    }

    pub fn progress(step: &str, message: impl Into<String>, progress: u8) -> Self {
        Self::Progress { step: step.to_string(), message: message.into(), progress, data: None }
    }

    pub fn progress_with(step: &str, message: impl Into<String>, progress: u8, data: Value) -> Self {
        Self::Progress {
            step: step.to_string(),
            message: message.into(),
            progress,
            data: Some(data),
        }
    }

    pub fn result(step: &str, data: Value) -> Self {
        Self::Result { step: step.to_string(), progress: 100, data }
    }

    pub fn error(step: &str, message: impl Into<String>, error_kind: &str) -> Self {
        Self::Error {
            step: step.to_string(),
            message: message.into(),
            error: error_kind.to_string(),
            suggestions: None,
        }
    }

    pub fn error_with_suggestions(
        step: &str,
        message: impl Into<String>,
        error_kind: &str,
        suggestions: Vec<String>,
    ) -> Self {
        Self::Error {
            step: step.to_string(),
            message: message.into(),
            error: error_kind.to_string(),
            suggestions: Some(suggestions),
        }
    }

    /// Progress value carried by this event, for monotonicity checks.
    pub fn progress_value(&self) -> Option<u8> {
        match self {
            Self::Progress { progress, .. } | Self::Result { progress, .. } => Some(*progress),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result { .. } | Self::Error { .. })
    }

    /// Newline-delimited JSON encoding used by the wire protocol.
    pub fn to_ndjson_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        line.push('\n');
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_event_serializes_with_type_tag() {
        let event = PipelineEvent::connection("abc123");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "connection");
        assert_eq!(json["streamId"], "abc123");
    }

    #[test]
    fn result_is_terminal_and_progress_is_always_100() {
        let event = PipelineEvent::result("completed", serde_json::json!({"rowCount": 10}));
        assert!(event.is_terminal());
        assert_eq!(event.progress_value(), Some(100));
    }

    #[test]
    fn error_event_is_terminal_without_progress() {
        let event = PipelineEvent::error("sql_execution", "boom", "execution_failed");
        assert!(event.is_terminal());
        assert_eq!(event.progress_value(), None);
    }
}
