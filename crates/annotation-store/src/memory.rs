use crate::{build_annotation, group_by_thread, AnnotationStore, StoreError, StoreResult};
use annotation_model::{
    Annotation, AnnotationId, AnnotationType, FileVersionId, Location, NewAnnotation, ThreadId,
    ThreadMap,
};
use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

/// Session-only store. Contents are lost when the store is dropped.
#[derive(Debug)]
pub struct MemoryStore {
    annotations: RefCell<BTreeMap<FileVersionId, Vec<Annotation>>>,
    available: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { annotations: RefCell::new(BTreeMap::new()), available: Cell::new(true) }
    }

    /// Store pre-populated with already persisted annotations.
    pub fn with_annotations(
        file_version_id: FileVersionId,
        annotations: impl IntoIterator<Item = Annotation>,
    ) -> Self {
        let store = Self::new();
        store.annotations.borrow_mut().insert(file_version_id, annotations.into_iter().collect());
        store
    }

    /// While unavailable every call fails with [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.set(available);
    }

    pub fn is_available(&self) -> bool {
        self.available.get()
    }

    /// Number of annotations stored for a file version.
    pub fn len(&self, file_version_id: &FileVersionId) -> usize {
        self.annotations.borrow().get(file_version_id).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, file_version_id: &FileVersionId) -> bool {
        self.len(file_version_id) == 0
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.available.get() {
            Ok(())
        } else {
            Err(StoreError::unavailable("memory store is offline"))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl AnnotationStore for MemoryStore {
    async fn get_thread_map(&self, file_version_id: &FileVersionId) -> StoreResult<ThreadMap> {
        self.ensure_available()?;
        let annotations = self.annotations.borrow();
        Ok(annotations.get(file_version_id).map(|list| group_by_thread(list)).unwrap_or_default())
    }

    async fn create(
        &self,
        file_version_id: &FileVersionId,
        thread_id: Option<&ThreadId>,
        location: Location,
        kind: AnnotationType,
        payload: NewAnnotation,
    ) -> StoreResult<Annotation> {
        self.ensure_available()?;
        let annotation = build_annotation(thread_id, location, kind, payload);
        log::debug!(
            "memory store: created annotation {} in thread {} ({})",
            annotation.id,
            annotation.thread_id,
            file_version_id
        );

        self.annotations
            .borrow_mut()
            .entry(file_version_id.clone())
            .or_default()
            .push(annotation.clone());
        Ok(annotation)
    }

    async fn delete(
        &self,
        file_version_id: &FileVersionId,
        annotation_id: &AnnotationId,
    ) -> StoreResult<()> {
        self.ensure_available()?;
        let mut annotations = self.annotations.borrow_mut();
        let list = annotations
            .get_mut(file_version_id)
            .ok_or_else(|| StoreError::NotFound(annotation_id.clone()))?;

        let Some(index) = list.iter().position(|annotation| &annotation.id == annotation_id)
        else {
            return Err(StoreError::NotFound(annotation_id.clone()));
        };

        list.remove(index);
        log::debug!("memory store: deleted annotation {annotation_id} ({file_version_id})");
        Ok(())
    }
}
