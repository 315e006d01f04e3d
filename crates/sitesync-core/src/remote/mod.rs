//! Remote spreadsheet middleware: the one endpoint every sheet lives behind.

mod http;

pub use http::HttpRemote;

use std::future::Future;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::models::{CollectionName, PhotoUpload, Record};
use crate::util::compact_text;

/// Extra query parameters for a collection read.
pub type FetchParams = Vec<(String, String)>;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Remote API error: {0}")]
    Api(String),
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
    #[error("Remote request timed out after {0} ms")]
    Timeout(u128),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Acknowledgement of an accepted photo upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoReceipt {
    pub url: Option<String>,
}

/// Operations offered by the remote service.
///
/// Implementations only talk to the network; caching, queueing and timeouts
/// are layered on top by the sync gateway.
pub trait RemoteService: Send + Sync {
    /// Read every record of a collection.
    fn fetch(
        &self,
        collection: &CollectionName,
        params: &[(String, String)],
    ) -> impl Future<Output = RemoteResult<Vec<Record>>> + Send;

    /// Append or update one record.
    fn update(
        &self,
        collection: &CollectionName,
        record: &Record,
        timestamp: &str,
    ) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Upload a photo for a site.
    fn upload_photo(
        &self,
        site_id: &str,
        caption: &str,
        photo: &PhotoUpload,
    ) -> impl Future<Output = RemoteResult<PhotoReceipt>> + Send;

    /// Cheap reachability check.
    fn ping(&self) -> impl Future<Output = RemoteResult<()>> + Send;
}

impl<T: RemoteService> RemoteService for Arc<T> {
    fn fetch(
        &self,
        collection: &CollectionName,
        params: &[(String, String)],
    ) -> impl Future<Output = RemoteResult<Vec<Record>>> + Send {
        (**self).fetch(collection, params)
    }

    fn update(
        &self,
        collection: &CollectionName,
        record: &Record,
        timestamp: &str,
    ) -> impl Future<Output = RemoteResult<()>> + Send {
        (**self).update(collection, record, timestamp)
    }

    fn upload_photo(
        &self,
        site_id: &str,
        caption: &str,
        photo: &PhotoUpload,
    ) -> impl Future<Output = RemoteResult<PhotoReceipt>> + Send {
        (**self).upload_photo(site_id, caption, photo)
    }

    fn ping(&self) -> impl Future<Output = RemoteResult<()>> + Send {
        (**self).ping()
    }
}

#[derive(Debug, Deserialize)]
struct WriteAck {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Interpret the body of a collection read.
///
/// An array is the snapshot, `{error}` is a failure, and any other object is
/// treated as a single record.
pub(crate) fn parse_fetch_body(body: &str) -> RemoteResult<Vec<Record>> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|error| RemoteError::InvalidPayload(format!("{error}: {}", compact_text(body))))?;

    match value {
        serde_json::Value::Array(records) => Ok(records),
        serde_json::Value::Object(object) => {
            if let Some(error) = object.get("error") {
                return Err(RemoteError::Api(error_message(error)));
            }
            Ok(vec![serde_json::Value::Object(object)])
        }
        other => Err(RemoteError::InvalidPayload(format!(
            "expected an array of records, got {}",
            compact_text(&other.to_string())
        ))),
    }
}

/// Interpret the body of a write or upload.
pub(crate) fn parse_write_body(body: &str) -> RemoteResult<PhotoReceipt> {
    let ack: WriteAck = serde_json::from_str(body)
        .map_err(|error| RemoteError::InvalidPayload(format!("{error}: {}", compact_text(body))))?;

    if let Some(error) = ack.error {
        return Err(RemoteError::Api(error.trim().to_string()));
    }
    if !ack.success {
        return Err(RemoteError::InvalidPayload(
            "response did not report success".to_string(),
        ));
    }
    Ok(PhotoReceipt { url: ack.url })
}

fn error_message(value: &serde_json::Value) -> String {
    value
        .as_str()
        .map_or_else(|| value.to_string(), |message| message.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn fetch_body_accepts_arrays() {
        let records = parse_fetch_body(r#"[{"id":"1"},{"id":"2"}]"#).unwrap();
        assert_eq!(records, vec![json!({"id": "1"}), json!({"id": "2"})]);
    }

    #[test]
    fn fetch_body_wraps_single_object() {
        let records = parse_fetch_body(r#"{"id":"1","name":"Depot"}"#).unwrap();
        assert_eq!(records, vec![json!({"id": "1", "name": "Depot"})]);
    }

    #[test]
    fn fetch_body_surfaces_api_errors() {
        let error = parse_fetch_body(r#"{"error":"Sheet not found"}"#).unwrap_err();
        assert!(matches!(error, RemoteError::Api(ref message) if message == "Sheet not found"));
    }

    #[test]
    fn fetch_body_rejects_garbage() {
        assert!(matches!(
            parse_fetch_body("<html>quota</html>"),
            Err(RemoteError::InvalidPayload(_))
        ));
        assert!(matches!(
            parse_fetch_body("42"),
            Err(RemoteError::InvalidPayload(_))
        ));
    }

    #[test]
    fn write_body_requires_success() {
        assert!(parse_write_body(r#"{"success":true}"#).is_ok());
        assert!(matches!(
            parse_write_body(r#"{"error":"Invalid action"}"#),
            Err(RemoteError::Api(_))
        ));
        assert!(matches!(
            parse_write_body(r"{}"),
            Err(RemoteError::InvalidPayload(_))
        ));
    }

    #[test]
    fn write_body_returns_photo_url() {
        let receipt =
            parse_write_body(r#"{"success":true,"url":"https://drive.example/p/1"}"#).unwrap();
        assert_eq!(receipt.url.as_deref(), Some("https://drive.example/p/1"));
    }
}
