use crate::destination::FailureEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const UNKNOWN: &str = "unknown";

/// `ParsedLogMessage` is the JSON document embedded in a log entry's message
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedLogMessage {
    /// Exception class
    pub error_type: Option<Value>,
    /// Exception message
    pub error_message: Option<Value>,
    /// Frames, outermost first
    pub stack_trace: Option<Vec<String>>,
    /// Request that failed
    pub request_id: Option<Value>,
    /// When it failed, as emitted by the function
    pub timestamp: Option<Value>,
}

/// `ComposedAlert` is one notification, ready to be published
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ComposedAlert {
    /// Email subject
    pub subject: String,
    /// Email body
    pub message: String,
}

/// Build the alert for one log entry.
pub fn compose_alert(
    input: &FailureEvent,
    parsed: &ParsedLogMessage,
    stack_trace: &str,
) -> ComposedAlert {
    let payload = &input.detail.response_payload;

    let subject = format!("Log alert in account {} ({})", input.account, input.region);
    let message = format!(
        "An error was logged in account {account} ({region}).\n\
         \n\
         Log group: {log_group}\n\
         Log stream: {log_stream}\n\
         Timestamp: {timestamp}\n\
         Request id: {request_id}\n\
         Error type: {error_type}\n\
         Error message: {error_message}\n\
         \n\
         Stack trace:\n\
         {stack_trace}",
        account = input.account,
        region = input.region,
        log_group = payload.log_group,
        log_stream = payload.log_stream,
        timestamp = render(&parsed.timestamp),
        request_id = render(&parsed.request_id),
        error_type = render(&parsed.error_type),
        error_message = render(&parsed.error_message),
        stack_trace = stack_trace,
    );

    ComposedAlert { subject, message }
}

/// Strings go in as is, other JSON values as their JSON text.
fn render(field: &Option<Value>) -> String {
    match field {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => UNKNOWN.into(),
        Some(other) => other.to_string(),
    }
}
