//! Persistence contract for annotation threads.
//!
//! Stores are keyed by file version. The annotator only depends on
//! [`AnnotationStore`]; [`MemoryStore`] and [`FileStore`] are the local
//! implementations shipped with the workspace.

use annotation_model::{
    Annotation, AnnotationId, AnnotationType, FileVersionId, Location, NewAnnotation, ThreadId,
    ThreadMap,
};
use async_trait::async_trait;

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("annotation store unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("annotation {0} not found")]
    NotFound(AnnotationId),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable { reason: reason.into() }
    }

    /// Everything except a missing annotation may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// CRUD contract for persisted annotations.
///
/// Futures are not `Send`: the annotator runs on a single cooperative event
/// loop. No ordering is guaranteed between calls on different threads; callers
/// serialize writes to the same thread.
#[async_trait(?Send)]
pub trait AnnotationStore {
    /// All annotations of a file version, grouped by thread.
    async fn get_thread_map(&self, file_version_id: &FileVersionId) -> StoreResult<ThreadMap>;

    /// Store one annotation.
    ///
    /// `thread_id = None` starts a new thread; the returned annotation carries
    /// the thread's canonical id.
    async fn create(
        &self,
        file_version_id: &FileVersionId,
        thread_id: Option<&ThreadId>,
        location: Location,
        kind: AnnotationType,
        payload: NewAnnotation,
    ) -> StoreResult<Annotation>;

    /// Remove one annotation. Fails with [`StoreError::NotFound`] if it is
    /// already gone.
    async fn delete(
        &self,
        file_version_id: &FileVersionId,
        annotation_id: &AnnotationId,
    ) -> StoreResult<()>;
}

/// Builds the stored form of a create request.
pub(crate) fn build_annotation(
    thread_id: Option<&ThreadId>,
    location: Location,
    kind: AnnotationType,
    payload: NewAnnotation,
) -> Annotation {
    Annotation {
        id: AnnotationId::generate(),
        thread_id: thread_id.cloned().unwrap_or_else(ThreadId::generate),
        location,
        kind,
        text: payload.text,
        author: payload.author,
        created_at: annotation_model::now_unix(),
    }
}

/// Groups a flat, chronologically ordered list into a thread map.
pub(crate) fn group_by_thread(annotations: &[Annotation]) -> ThreadMap {
    let mut map = ThreadMap::new();
    for annotation in annotations {
        map.entry(annotation.thread_id.clone()).or_default().push(annotation.clone());
    }
    map
}
