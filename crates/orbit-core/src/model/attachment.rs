//! Attachment references: pointers to externally stored binary blobs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::AttachmentId;

/// Tracks an attachment stored outside the database. Never holds content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentReference {
    pub id: AttachmentId,
    pub created_at_timestamp_millis: i64,
    pub mime_type: AttachmentMimeType,
}

/// Supported attachment content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttachmentMimeType {
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/svg+xml")]
    Svg,
}

impl AttachmentMimeType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Svg => "image/svg+xml",
        }
    }
}

impl fmt::Display for AttachmentMimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttachmentMimeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image/png" => Ok(Self::Png),
            "image/jpeg" => Ok(Self::Jpeg),
            "image/svg+xml" => Ok(Self::Svg),
            other => Err(format!("unsupported attachment mime type '{other}'")),
        }
    }
}
