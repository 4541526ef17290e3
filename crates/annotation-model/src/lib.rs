//! Shared data model for point annotations.
//!
//! Locations are stored in document units: scale 1, rotation 0, origin at the
//! bottom-left corner of the page. Only the annotator converts them to screen
//! pixels.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const TEMPORARY_THREAD_PREFIX: &str = "pending-";

/// Partition key for a store: one version of one file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileVersionId(pub String);

impl FileVersionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileVersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a thread.
///
/// Threads that were never saved carry a client-generated temporary id until
/// the store hands back the canonical one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh client-side id for a thread that has not been saved yet.
    pub fn temporary() -> Self {
        Self(format!("{TEMPORARY_THREAD_PREFIX}{}", uuid::Uuid::new_v4()))
    }

    /// Fresh canonical id, as handed out by a store.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_THREAD_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(pub String);

impl AnnotationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Anchor of a thread in document units.
///
/// Values outside the page are tolerated; they must only survive the
/// coordinate transform unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    /// 1-based page number.
    pub page: u32,
}

impl Location {
    pub fn new(x: f64, y: f64, page: u32) -> Self {
        Self { x, y, page }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationType {
    #[default]
    Point,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Author {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), avatar_url: None }
    }

    /// Used when the host does not identify the current user.
    pub fn anonymous() -> Self {
        Self::new("anonymous", "Anonymous")
    }
}

impl Default for Author {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// One comment in a thread. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: AnnotationId,
    pub thread_id: ThreadId,
    pub location: Location,
    #[serde(rename = "type", default)]
    pub kind: AnnotationType,
    pub text: String,
    pub author: Author,
    /// Unix timestamp in seconds.
    pub created_at: i64,
}

/// Payload of a create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAnnotation {
    pub text: String,
    pub author: Author,
}

impl NewAnnotation {
    pub fn new(text: impl Into<String>, author: Author) -> Self {
        Self { text: text.into(), author }
    }
}

/// Persisted annotations of one file version, grouped by thread in
/// chronological order.
pub type ThreadMap = BTreeMap<ThreadId, Vec<Annotation>>;

/// Current time as Unix seconds.
pub fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
