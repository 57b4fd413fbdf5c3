use crate::event::LogEntry;
use serde::{Deserialize, Serialize};

/// `detail-type` of the event emitted when an asynchronous invocation fails
pub const FAILURE_DETAIL_TYPE: &str = "Lambda Function Invocation Result - Failure";
/// `detail-type` of the event emitted when an asynchronous invocation succeeds
pub const SUCCESS_DETAIL_TYPE: &str = "Lambda Function Invocation Result - Success";

/// `DestinationEvent` is the EventBridge envelope around an invocation result
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct DestinationEvent {
    /// Event id
    #[serde(default)]
    pub id: String,
    /// Failure or success, absent when the event was already routed
    #[serde(rename = "detail-type", default)]
    pub detail_type: Option<String>,
    /// Emitting service
    #[serde(default)]
    pub source: String,
    /// Account the invocation ran in
    #[serde(default)]
    pub account: String,
    /// Region the invocation ran in
    #[serde(default)]
    pub region: String,
    /// Emission time
    #[serde(default)]
    pub time: String,
    /// Invocation record
    pub detail: InvocationRecord,
}

/// `InvocationRecord` describes one asynchronous invocation and its payload
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRecord {
    /// Invocation metadata
    #[serde(default)]
    pub request_context: Option<RequestContext>,
    /// What the decoder was working on
    pub response_payload: ResponsePayload,
}

/// `RequestContext` carries the invocation metadata
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// Invocation request id
    #[serde(default)]
    pub request_id: String,
    /// Invoked function
    #[serde(default)]
    pub function_arn: String,
    /// `Success`, `RetriesExhausted` or `EventAgeExceeded`
    #[serde(default)]
    pub condition: String,
    /// Attempts made by the runtime
    #[serde(default)]
    pub approximate_invoke_count: u32,
}

/// `ResponsePayload` holds the original log batch
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    /// Source log group
    #[serde(default)]
    pub log_group: String,
    /// Source log stream
    #[serde(default)]
    pub log_stream: String,
    /// Raw records, in delivery order
    pub log_events: Vec<LogEntry>,
}

/// `FailureEvent` is a routed failure, the input of the alert workflow
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct FailureEvent {
    /// Account the invocation ran in
    #[serde(default)]
    pub account: String,
    /// Region the invocation ran in
    #[serde(default)]
    pub region: String,
    /// Invocation record
    pub detail: InvocationRecord,
}

impl From<DestinationEvent> for FailureEvent {
    fn from(event: DestinationEvent) -> Self {
        FailureEvent {
            account: event.account,
            region: event.region,
            detail: event.detail,
        }
    }
}

/// Where a destination event goes
#[derive(Clone, Debug, PartialEq)]
pub enum Route {
    /// Start an alert workflow execution
    Workflow(FailureEvent),
    /// Nothing to do
    Ignore,
}

/// Route failures to the alert workflow and drop everything else.
/// Events without a `detail-type` were routed upstream and go through.
///
/// The decoder's failures are expected to carry the log batch as their
/// `responsePayload`. A plain runtime error payload (`errorType`,
/// `errorMessage`, no `logEvents`) is rejected when the event is
/// deserialized, before it gets here, and the invocation fails.
pub fn route(event: DestinationEvent) -> Route {
    match event.detail_type.as_deref() {
        None | Some(FAILURE_DETAIL_TYPE) => Route::Workflow(event.into()),
        Some(other) => {
            tracing::debug!(detail_type = other, "ignoring destination event");
            Route::Ignore
        }
    }
}
