//! Pending queue items: writes waiting for remote delivery

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::util::unix_millis_now;

use super::collection::{CollectionName, Record};

/// A unique identifier for a pending item, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingId(Uuid);

impl PendingId {
    /// Create a new unique pending ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for PendingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PendingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PendingId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The two write-behind queues kept by the durable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    Mutations,
    Binaries,
}

impl QueueName {
    pub(crate) const fn table(self) -> &'static str {
        match self {
            Self::Mutations => "pending_mutations",
            Self::Binaries => "pending_binaries",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mutations => f.write_str("mutations"),
            Self::Binaries => f.write_str("binaries"),
        }
    }
}

/// A non-binary update waiting to be sent to the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMutation {
    pub id: PendingId,
    /// Target collection of the update
    pub kind: CollectionName,
    pub payload: Record,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl PendingMutation {
    #[must_use]
    pub fn new(kind: CollectionName, payload: Record) -> Self {
        Self {
            id: PendingId::new(),
            kind,
            payload,
            created_at: unix_millis_now(),
        }
    }
}

/// Photo bytes in a form that can be handed to the remote upload call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    /// Content MIME type
    pub file_type: String,
}

impl PhotoUpload {
    pub fn new(
        bytes: Vec<u8>,
        file_name: impl Into<String>,
        file_type: impl Into<String>,
    ) -> Result<Self> {
        let file_name = file_name.into().trim().to_string();
        let mut file_type = file_type.into().trim().to_string();
        if file_type.is_empty() {
            file_type = mime_for_file_name(&file_name).to_string();
        }

        let upload = Self {
            bytes,
            file_name,
            file_type,
        };
        upload.validate()?;
        Ok(upload)
    }

    /// Check that the upload can be sent as a multipart file part.
    pub fn validate(&self) -> Result<()> {
        if self.file_name.trim().is_empty() {
            return Err(Error::Validation(
                "Photo file name cannot be empty".to_string(),
            ));
        }
        if self.bytes.is_empty() {
            return Err(Error::Validation("Photo file is empty".to_string()));
        }
        if self.file_type.parse::<mime::Mime>().is_err() {
            return Err(Error::Validation(format!(
                "Invalid photo content type '{}'",
                self.file_type
            )));
        }
        Ok(())
    }

    /// Size of the payload in bytes.
    pub fn size(&self) -> i64 {
        i64::try_from(self.bytes.len()).unwrap_or(i64::MAX)
    }
}

/// Guess an image MIME type from a file name extension.
pub fn mime_for_file_name(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

/// A photo upload waiting to be sent, with its bytes persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBinary {
    pub id: PendingId,
    pub bytes: Vec<u8>,
    pub site_id: String,
    pub caption: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
}

impl PendingBinary {
    #[must_use]
    pub fn from_upload(upload: &PhotoUpload, site_id: &str, caption: &str) -> Self {
        Self {
            id: PendingId::new(),
            bytes: upload.bytes.clone(),
            site_id: site_id.to_string(),
            caption: caption.to_string(),
            created_at: unix_millis_now(),
            file_name: upload.file_name.clone(),
            file_type: upload.file_type.clone(),
            file_size: upload.size(),
        }
    }

    /// Re-hydrate the persisted bytes into an uploadable photo.
    #[must_use]
    pub fn to_upload(&self) -> PhotoUpload {
        PhotoUpload {
            bytes: self.bytes.clone(),
            file_name: self.file_name.clone(),
            file_type: self.file_type.clone(),
        }
    }
}
