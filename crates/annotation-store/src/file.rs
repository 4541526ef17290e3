use crate::{build_annotation, group_by_thread, AnnotationStore, StoreError, StoreResult};
use annotation_model::{
    Annotation, AnnotationId, AnnotationType, FileVersionId, Location, NewAnnotation, ThreadId,
    ThreadMap,
};
use async_trait::async_trait;
use directories::ProjectDirs;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const ANNOTATIONS_SCHEMA_VERSION: u32 = 1;

/// Everything outside `[A-Za-z0-9_-]` is percent-encoded, so distinct ids
/// never share a file name.
const FILE_NAME: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

/// Durable local store: one JSON document per file version.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotationsEnvelope {
    version: u32,
    file_version_id: FileVersionId,
    annotations: Vec<Annotation>,
}

impl FileStore {
    pub fn from_default_project() -> StoreResult<Self> {
        let dirs = ProjectDirs::from("dev", "PointAnnotations", "PointAnnotations")
            .ok_or_else(|| StoreError::unavailable("unable to resolve local data directory"))?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the document holding one file version's annotations.
    pub fn document_path(&self, file_version_id: &FileVersionId) -> PathBuf {
        let name = utf8_percent_encode(file_version_id.as_str(), FILE_NAME);
        self.root.join("annotations").join(format!("{name}.json"))
    }

    fn load(&self, file_version_id: &FileVersionId) -> StoreResult<Vec<Annotation>> {
        let path = self.document_path(file_version_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let bytes = fs::read(path)?;
        let envelope: AnnotationsEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != ANNOTATIONS_SCHEMA_VERSION {
            return Err(StoreError::unavailable(format!(
                "unsupported annotations schema version {}",
                envelope.version
            )));
        }
        if &envelope.file_version_id != file_version_id {
            return Err(StoreError::unavailable(format!(
                "annotations document for {file_version_id} belongs to {}",
                envelope.file_version_id
            )));
        }

        Ok(envelope.annotations)
    }

    fn save(&self, file_version_id: &FileVersionId, annotations: Vec<Annotation>) -> StoreResult<()> {
        let path = self.document_path(file_version_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let envelope = AnnotationsEnvelope {
            version: ANNOTATIONS_SCHEMA_VERSION,
            file_version_id: file_version_id.clone(),
            annotations,
        };
        let bytes = serde_json::to_vec_pretty(&envelope)?;

        // temp file + rename keeps the previous document intact on a failed write
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }
}

#[async_trait(?Send)]
impl AnnotationStore for FileStore {
    async fn get_thread_map(&self, file_version_id: &FileVersionId) -> StoreResult<ThreadMap> {
        let annotations = self.load(file_version_id)?;
        Ok(group_by_thread(&annotations))
    }

    async fn create(
        &self,
        file_version_id: &FileVersionId,
        thread_id: Option<&ThreadId>,
        location: Location,
        kind: AnnotationType,
        payload: NewAnnotation,
    ) -> StoreResult<Annotation> {
        let mut annotations = self.load(file_version_id)?;
        let annotation = build_annotation(thread_id, location, kind, payload);
        annotations.push(annotation.clone());
        self.save(file_version_id, annotations)?;

        log::debug!(
            "file store: created annotation {} in thread {} ({})",
            annotation.id,
            annotation.thread_id,
            file_version_id
        );
        Ok(annotation)
    }

    async fn delete(
        &self,
        file_version_id: &FileVersionId,
        annotation_id: &AnnotationId,
    ) -> StoreResult<()> {
        let mut annotations = self.load(file_version_id)?;
        let Some(index) = annotations.iter().position(|annotation| &annotation.id == annotation_id)
        else {
            return Err(StoreError::NotFound(annotation_id.clone()));
        };

        annotations.remove(index);
        self.save(file_version_id, annotations)?;
        log::debug!("file store: deleted annotation {annotation_id} ({file_version_id})");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annotation_model::Author;
    use futures::executor::block_on;

    fn version() -> FileVersionId {
        FileVersionId::new("v1")
    }

    fn create(store: &FileStore, thread: Option<&ThreadId>, text: &str) -> Annotation {
        block_on(store.create(
            &version(),
            thread,
            Location::new(10.0, 20.0, 2),
            AnnotationType::Point,
            NewAnnotation::new(text, Author::new("u1", "User One")),
        ))
        .expect("create should succeed")
    }

    #[test]
    fn annotations_survive_a_new_store_instance() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let first = create(&FileStore::with_root(temp.path()), None, "hi");

        let reopened = FileStore::with_root(temp.path());
        let map = block_on(reopened.get_thread_map(&version())).expect("fetch should succeed");

        assert_eq!(map.len(), 1);
        let stored = &map[&first.thread_id][0];
        assert_eq!(stored, &first);
        assert_eq!(stored.location, Location::new(10.0, 20.0, 2));
    }

    #[test]
    fn missing_document_is_an_empty_map() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = FileStore::with_root(temp.path());

        let map = block_on(store.get_thread_map(&version())).expect("fetch should succeed");
        assert!(map.is_empty());
    }

    #[test]
    fn delete_removes_and_then_reports_not_found() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = FileStore::with_root(temp.path());
        let first = create(&store, None, "hi");
        let reply = create(&store, Some(&first.thread_id), "reply");

        block_on(store.delete(&version(), &first.id)).expect("delete should succeed");
        let map = block_on(store.get_thread_map(&version())).expect("fetch should succeed");
        assert_eq!(map[&first.thread_id], vec![reply]);

        let again = block_on(store.delete(&version(), &first.id));
        assert!(matches!(again, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn corrupt_document_surfaces_a_serialization_error() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = FileStore::with_root(temp.path());
        let path = store.document_path(&version());
        fs::create_dir_all(path.parent().expect("document has a parent"))
            .expect("dir should be created");
        fs::write(&path, b"{ not json").expect("write should succeed");

        let result = block_on(store.get_thread_map(&version()));
        assert!(matches!(result, Err(StoreError::Serde(_))));
    }

    #[test]
    fn file_version_ids_are_encoded_into_distinct_file_names() {
        let store = FileStore::with_root("/tmp/root");
        let path = store.document_path(&FileVersionId::new("../v 1"));
        assert_eq!(path, PathBuf::from("/tmp/root/annotations/%2E%2E%2Fv%201.json"));
        assert_eq!(
            store.document_path(&FileVersionId::new("rev_2-a")),
            PathBuf::from("/tmp/root/annotations/rev_2-a.json")
        );

        let paths: std::collections::HashSet<_> = ["file.1", "file/1", "file_1"]
            .into_iter()
            .map(|id| store.document_path(&FileVersionId::new(id)))
            .collect();
        assert_eq!(paths.len(), 3);
    }

    #[test]
    fn similar_file_version_ids_do_not_share_annotations() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = FileStore::with_root(temp.path());
        block_on(store.create(
            &FileVersionId::new("file.1"),
            None,
            Location::new(1.0, 2.0, 1),
            AnnotationType::Point,
            NewAnnotation::new("hi", Author::new("u1", "User One")),
        ))
        .expect("create should succeed");

        for other in ["file_1", "file/1"] {
            let map = block_on(store.get_thread_map(&FileVersionId::new(other)))
                .expect("fetch should succeed");
            assert!(map.is_empty(), "{other} should not see file.1's annotations");
        }
        let map = block_on(store.get_thread_map(&FileVersionId::new("file.1")))
            .expect("fetch should succeed");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn document_of_another_file_version_is_rejected() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = FileStore::with_root(temp.path());
        create(&store, None, "hi");

        let other = FileVersionId::new("v2");
        let other_path = store.document_path(&other);
        fs::copy(store.document_path(&version()), &other_path).expect("copy should succeed");

        let result = block_on(store.get_thread_map(&other));
        assert!(matches!(result, Err(StoreError::Unavailable { .. })));
        let delete = block_on(store.delete(&other, &AnnotationId::new("missing")));
        assert!(matches!(delete, Err(StoreError::Unavailable { .. })));
    }
}
