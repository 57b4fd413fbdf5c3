use cloudwatch_log_alerts::{
    destination::DestinationEvent, handle_destination_event, Config, SnsNotifier,
};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        // disabling time is handy because CloudWatch will add the ingestion time.
        .without_time()
        .init();

    let config = Config::from_env()?;
    let workflow = config.workflow();

    // Get AWS Configuration
    let aws_config = aws_config::load_from_env().await;
    let notifier = SnsNotifier::new(&aws_config, &config.topic_arn);

    run(service_fn(|event: LambdaEvent<DestinationEvent>| {
        handle_destination_event(&workflow, &notifier, event)
    }))
    .await
}
