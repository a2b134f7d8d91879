use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DomainError;

/// Bucket and key of the object an invocation was asked to ingest.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), key: key.into() }
    }

    /// Normalizes either trigger shape into a location.
    ///
    /// Storage notifications (`{"Records": [{"s3": {...}}]}`) carry
    /// form-encoded keys, so `+` becomes a space before percent-decoding.
    /// Direct invocations (`{"bucketName", "objectKey"}`) are taken verbatim.
    pub fn from_trigger(payload: Value) -> Result<Self, DomainError> {
        let raw: RawTrigger = serde_json::from_value(payload)
            .map_err(|error| DomainError::UnsupportedTrigger(error.to_string()))?;

        if let Some(record) = raw.records.and_then(|records| records.into_iter().next()) {
            let key = decode_notification_key(&record.s3.object.key)?;
            return Self::non_empty(record.s3.bucket.name, key);
        }

        match (raw.bucket_name, raw.object_key) {
            (Some(bucket), Some(key)) => Self::non_empty(bucket, key),
            _ => Err(DomainError::UnsupportedTrigger(
                "expected `Records[0].s3` or `bucketName` + `objectKey`".to_owned(),
            )),
        }
    }

    pub fn is_processed(&self, processed_prefix: &str) -> bool {
        self.key.starts_with(processed_prefix)
    }

    pub fn processed(&self, processed_prefix: &str) -> Self {
        Self { bucket: self.bucket.clone(), key: format!("{processed_prefix}{}", self.key) }
    }

    fn non_empty(bucket: String, key: String) -> Result<Self, DomainError> {
        if bucket.is_empty() || key.is_empty() {
            return Err(DomainError::UnsupportedTrigger(
                "bucket name and object key must not be empty".to_owned(),
            ));
        }
        Ok(Self { bucket, key })
    }
}

/// Every `%` must start a two-digit hex escape and the decoded bytes must be
/// UTF-8; anything else rejects the trigger instead of passing through.
fn decode_notification_key(raw_key: &str) -> Result<String, DomainError> {
    let undecodable = |reason: String| {
        DomainError::UnsupportedTrigger(format!("object key `{raw_key}` is not decodable: {reason}"))
    };

    if let Some(offset) = malformed_escape(raw_key) {
        return Err(undecodable(format!("malformed escape at byte {offset}")));
    }

    let spaced = raw_key.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|error| undecodable(error.to_string()))
}

fn malformed_escape(raw_key: &str) -> Option<usize> {
    let bytes = raw_key.as_bytes();
    bytes.iter().enumerate().find_map(|(offset, byte)| {
        let escape = bytes.get(offset + 1..offset + 3);
        let valid = escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
        (*byte == b'%' && !valid).then_some(offset)
    })
}

#[derive(Debug, Deserialize)]
struct RawTrigger {
    #[serde(rename = "Records", default)]
    records: Option<Vec<NotificationRecord>>,
    #[serde(rename = "bucketName", default)]
    bucket_name: Option<String>,
    #[serde(rename = "objectKey", default)]
    object_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NotificationRecord {
    s3: NotificationEntity,
}

#[derive(Debug, Deserialize)]
struct NotificationEntity {
    bucket: NotificationBucket,
    object: NotificationObject,
}

#[derive(Debug, Deserialize)]
struct NotificationBucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct NotificationObject {
    key: String,
}
