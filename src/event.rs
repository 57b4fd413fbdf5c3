use crate::error::RuntimeError;
use flate2::{write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// `LogsEvent` represents the raw event sent by a CloudWatch Logs subscription
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct LogsEvent {
    /// Subscription delivery envelope
    #[serde(rename = "awslogs")]
    pub aws_logs: AwsLogs,
}

/// `AwsLogs` holds the gzipped and base64 encoded log document.
/// It's kept encoded so the decoder can tell encoding, compression
/// and parsing failures apart.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct AwsLogs {
    /// base64 string of gzip-compressed JSON
    pub data: String,
}

/// `LogData` represents the logs group event information
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogData {
    /// Account that owns the log group
    #[serde(default)]
    pub owner: String,
    /// Source log group
    #[serde(default)]
    pub log_group: String,
    /// Source log stream
    #[serde(default)]
    pub log_stream: String,
    /// Names of the subscription filters that matched
    #[serde(default)]
    pub subscription_filters: Vec<String>,
    /// `DATA_MESSAGE` or `CONTROL_MESSAGE`
    #[serde(default)]
    pub message_type: String,
    /// Records delivered in this batch, in source order
    pub log_events: Vec<LogEntry>,
}

/// `LogEntry` represents a log entry from cloudwatch logs
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct LogEntry {
    /// Record id assigned by CloudWatch
    #[serde(default)]
    pub id: String,
    /// Milliseconds since the epoch
    #[serde(default)]
    pub timestamp: i64,
    /// Raw message body, usually a JSON document
    #[serde(default)]
    pub message: String,
}

impl LogData {
    /// Compress and encode the batch the way CloudWatch Logs
    /// delivers it to a subscription destination.
    pub fn encode(&self) -> Result<LogsEvent, RuntimeError> {
        let json = serde_json::to_vec(self).map_err(RuntimeError::MalformedPayload)?;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&json)
            .map_err(RuntimeError::Compression)?;
        let bytes = encoder.finish().map_err(RuntimeError::Compression)?;

        Ok(LogsEvent {
            aws_logs: AwsLogs {
                data: base64::encode(bytes),
            },
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_deserialize_entries_with_missing_fields() {
        let data: LogData =
            serde_json::from_str(r#"{"logEvents": [{"message": "{\"level\":\"ERROR\"}"}]}"#)
                .expect("failed to deserialize");

        assert_eq!("", data.log_group);
        assert_eq!(1, data.log_events.len());
        assert_eq!("", data.log_events[0].id);
        assert_eq!(0, data.log_events[0].timestamp);
        assert_eq!(r#"{"level":"ERROR"}"#, data.log_events[0].message);
    }

    #[test]
    fn test_log_events_are_required() {
        let res = serde_json::from_str::<LogData>(r#"{"logGroup": "/aws/lambda/checkout"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_encode_produces_gzip_base64() {
        let data = LogData {
            log_group: "/aws/lambda/checkout".into(),
            log_events: vec![LogEntry {
                id: "1".into(),
                timestamp: 1552518348220,
                message: "boom".into(),
            }],
            ..Default::default()
        };

        let event = data.encode().expect("failed to encode");
        let bytes = base64::decode(&event.aws_logs.data).expect("not base64");

        // gzip magic number
        assert_eq!(&[0x1f, 0x8b], &bytes[..2]);
    }
}
