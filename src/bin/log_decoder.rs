use cloudwatch_log_alerts::{handle_logs, LogsEvent, TracingSink};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        // disabling time is handy because CloudWatch will add the ingestion time.
        .without_time()
        .init();

    let sink = TracingSink;

    run(service_fn(|event: LambdaEvent<LogsEvent>| {
        handle_logs(event, &sink)
    }))
    .await
}
