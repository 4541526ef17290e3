use annotation_model::ThreadId;
use annotation_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("point mode is already in the requested state")]
    PointModeConflict,
    #[error("annotations are read-only for this document")]
    ReadOnly,
    #[error("thread {0} already has a write in flight")]
    WriteInProgress(ThreadId),
    #[error("comment text is empty")]
    EmptyComment,
    #[error("thread {0} not found")]
    ThreadNotFound(ThreadId),
    #[error("annotator has been destroyed")]
    Destroyed,
}

impl AnnotationError {
    /// Whether the user may retry the operation that produced this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(error) => error.is_retryable(),
            Self::WriteInProgress(_) => true,
            _ => false,
        }
    }
}

pub type AnnotationResult<T> = Result<T, AnnotationError>;
