#![deny(missing_docs)]
//! <fullname>CloudWatch log alerts</fullname>
//!
//! Lambda functions that turn ERROR and WARN lines from a CloudWatch Logs
//! group into email alerts. The decoder receives the subscription batches,
//! failed invocations are routed to the alert workflow, and the workflow
//! publishes one alert per log entry to an SNS topic.
use lambda_runtime::LambdaEvent;

mod alert;
pub use alert::{compose_alert, ComposedAlert, ParsedLogMessage};

mod config;
pub use config::Config;

mod decoder;
pub use decoder::{handle_logs, process_logs};

/// `destination` routes invocation results to the alert workflow
pub mod destination;
use destination::{route, DestinationEvent, Route};

mod error;
pub use error::RuntimeError;

mod event;
pub use event::{AwsLogs, LogData, LogEntry, LogsEvent};

/// `filter` reproduces the subscription filter binding
pub mod filter;

mod notify;
pub use notify::{Notifier, SnsNotifier};

mod sink;
pub use sink::{DiagnosticSink, DiscardSink, MemorySink, TracingSink};

/// `workflow` is the alert composition state machine
pub mod workflow;
use workflow::{ExecutionSummary, Workflow};

#[cfg(test)]
mod test_util;

/// `handle_destination_event` is the Lambda function entry point
/// that receives the routed invocation results.
/// Returns `None` when the event isn't a failure.
#[tracing::instrument(skip(workflow, notifier, event), fields(request_id = %event.context.request_id))]
pub async fn handle_destination_event(
    workflow: &Workflow,
    notifier: &dyn Notifier,
    event: LambdaEvent<DestinationEvent>,
) -> Result<Option<ExecutionSummary>, RuntimeError> {
    match route(event.payload) {
        Route::Workflow(failure) => workflow.execute(&failure, notifier).await.map(Some),
        Route::Ignore => Ok(None),
    }
}
