use annotation_model::{Author, FileVersionId};
use serde::{Deserialize, Serialize};

/// Configuration for one annotator instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    /// Store partition for the annotated document
    pub file_version_id: FileVersionId,

    /// Author of new comments, anonymous when the host does not say
    pub user: Option<Author>,

    /// Whether the current user may create and delete comments
    pub can_annotate: bool,

    /// Host already provides a point-mode toggle (e.g. in its own header), so
    /// the annotator does not install one
    pub host_controls: bool,

    /// Click distance from an indicator's anchor that still hits it, in pixels
    pub indicator_hit_radius: f64,
}

impl AnnotatorConfig {
    pub fn new(file_version_id: impl Into<String>) -> Self {
        Self { file_version_id: FileVersionId::new(file_version_id), ..Self::default() }
    }

    pub fn with_user(mut self, user: Author) -> Self {
        self.user = Some(user);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.can_annotate = false;
        self
    }

    /// Author attached to new comments.
    pub fn author(&self) -> Author {
        self.user.clone().unwrap_or_else(Author::anonymous)
    }
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            file_version_id: FileVersionId::new(""),
            user: None,
            can_annotate: true,
            host_controls: false,
            indicator_hit_radius: 12.0,
        }
    }
}
