use crate::{alert::ComposedAlert, error::RuntimeError, notify::Notifier};
use async_trait::async_trait;
use aws_types::{region::Region, Credentials, SdkConfig};
use flate2::{write::GzEncoder, Compression};
use std::{io::Write, sync::Mutex, time::Duration};

/// Configuration for mocking AWS SDK clients
pub async fn get_mock_config() -> SdkConfig {
    aws_config::from_env()
        .region(Region::new("us-west-1"))
        .credentials_provider(Credentials::new(
            "accesskey",
            "privatekey",
            None,
            None,
            "dummy",
        ))
        .load()
        .await
}

/// Base request builder for the AWS SDK calls
pub fn get_request_builder(service: &str) -> http::request::Builder {
    http::Request::builder().uri(format!("https://{service}.us-west-1.amazonaws.com/"))
}

/// Gzip and base64 arbitrary bytes, the way CloudWatch Logs delivers payloads
pub fn gzip_base64(bytes: &[u8]) -> String {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    base64::encode(encoder.finish().unwrap())
}

/// Notifier that keeps every published alert in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<ComposedAlert>>,
    delay: Option<Duration>,
}

impl RecordingNotifier {
    /// Notifier that waits before every publish
    pub fn with_delay(delay: Duration) -> Self {
        RecordingNotifier {
            delay: Some(delay),
            ..Default::default()
        }
    }

    /// Alerts published so far
    pub fn alerts(&self) -> Vec<ComposedAlert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, alert: &ComposedAlert) -> Result<(), RuntimeError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}
