use crate::{alert::ComposedAlert, error::RuntimeError};
use async_trait::async_trait;
use aws_sdk_sns::{Client, Error};
use aws_types::SdkConfig;

/// Publishes alerts to a notification topic.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Publish one alert. Fan-out to the subscribers is up to the topic.
    async fn publish(&self, alert: &ComposedAlert) -> Result<(), RuntimeError>;
}

/// SNS topic client implementation.
pub struct SnsNotifier {
    client: Client,
    topic_arn: String,
}

impl SnsNotifier {
    /// Initialize the SNS client for a topic.
    #[tracing::instrument(skip(config))]
    pub fn new(config: &SdkConfig, topic_arn: &str) -> SnsNotifier {
        tracing::info!("Initializing SNS client");
        SnsNotifier {
            client: Client::new(config),
            topic_arn: topic_arn.into(),
        }
    }
}

#[async_trait]
impl Notifier for SnsNotifier {
    #[tracing::instrument(skip(self, alert), fields(topic_arn = %self.topic_arn))]
    async fn publish(&self, alert: &ComposedAlert) -> Result<(), RuntimeError> {
        let output = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(&alert.subject)
            .message(&alert.message)
            .send()
            .await
            .map_err(Error::from)?;

        tracing::info!(
            message_id = output.message_id().unwrap_or_default(),
            "published alert"
        );
        Ok(())
    }
}
