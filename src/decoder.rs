use crate::{error::RuntimeError, event::LogsEvent, sink::DiagnosticSink};
use flate2::read::GzDecoder;
use lambda_runtime::LambdaEvent;
use serde_json::Value;
use std::{fmt::Debug, io::Read};

/// Decode a subscription delivery into the JSON document it carries.
///
/// The raw event and context are handed to `sink` before anything else.
/// Every failure is logged and returned as is, so the invoking runtime
/// can route the invocation to its failure destination.
pub fn process_logs<C: Debug>(
    event: &LogsEvent,
    context: &C,
    sink: &dyn DiagnosticSink,
) -> Result<Value, RuntimeError> {
    sink.record("event", event);
    sink.record("context", context);

    decode(&event.aws_logs.data).map_err(|err| {
        tracing::error!(error = %err, "failed to decode log payload");
        err
    })
}

fn decode(data: &str) -> Result<Value, RuntimeError> {
    let compressed = base64::decode(data)?;

    let mut json = Vec::new();
    GzDecoder::new(&compressed[..])
        .read_to_end(&mut json)
        .map_err(RuntimeError::Decompression)?;

    serde_json::from_slice(&json).map_err(RuntimeError::MalformedPayload)
}

/// `handle_logs` is the Lambda function entry point
/// that receives the events from CloudWatch Logs
#[tracing::instrument(skip(event, sink), fields(request_id = %event.context.request_id))]
pub async fn handle_logs(
    event: LambdaEvent<LogsEvent>,
    sink: &dyn DiagnosticSink,
) -> Result<Value, RuntimeError> {
    let document = process_logs(&event.payload, &event.context, sink)?;

    let count = document
        .get("logEvents")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    tracing::info!(count, "decoded log events");

    Ok(document)
}
