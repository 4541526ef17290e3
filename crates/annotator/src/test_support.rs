//! Fixtures shared by the unit tests of this crate.

use crate::coords::StaticPageGeometry;
use crate::lifecycle::DestroyToken;
use crate::surface::SceneSurface;
use crate::thread::ThreadContext;
use annotation_model::{
    Annotation, AnnotationId, AnnotationType, Author, FileVersionId, Location, NewAnnotation,
    ThreadId, ThreadMap,
};
use annotation_store::{AnnotationStore, MemoryStore, StoreResult};
use async_trait::async_trait;
use futures::channel::oneshot;
use std::cell::RefCell;
use std::rc::Rc;

pub fn version() -> FileVersionId {
    FileVersionId::new("v1")
}

/// Page 1 is 600x500, pages 2 and 3 are 600x800, stacked without gaps from
/// the client origin. Page 2 therefore starts at `(0, 500)`.
pub fn geometry() -> StaticPageGeometry {
    StaticPageGeometry::new(vec![(600.0, 500.0), (600.0, 800.0), (600.0, 800.0)])
}

pub fn annotation(id: &str, thread: &str, text: &str, location: Location) -> Annotation {
    Annotation {
        id: AnnotationId::new(id),
        thread_id: ThreadId::new(thread),
        location,
        kind: AnnotationType::Point,
        text: text.to_owned(),
        author: Author::new("u1", "Ada"),
        created_at: 1_700_000_000,
    }
}

pub struct Fixture<S: AnnotationStore + 'static> {
    pub store: Rc<S>,
    pub geometry: Rc<StaticPageGeometry>,
    pub surface: Rc<RefCell<SceneSurface>>,
}

impl<S: AnnotationStore + 'static> Fixture<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Rc::new(store),
            geometry: Rc::new(geometry()),
            surface: Rc::new(RefCell::new(SceneSurface::new())),
        }
    }

    pub fn thread_context(&self, can_annotate: bool) -> Rc<ThreadContext> {
        Rc::new(ThreadContext {
            store: self.store.clone(),
            geometry: self.geometry.clone(),
            surface: self.surface.clone(),
            file_version_id: version(),
            author: Author::new("u1", "Ada"),
            can_annotate,
            lifecycle: DestroyToken::new(),
        })
    }
}

/// One-shot hold on the next async step that passes through it.
#[derive(Debug, Default)]
pub struct Gate {
    receiver: RefCell<Option<oneshot::Receiver<()>>>,
}

impl Gate {
    /// The next pass waits until the returned sender fires or drops.
    pub fn hold(&self) -> oneshot::Sender<()> {
        let (sender, receiver) = oneshot::channel();
        *self.receiver.borrow_mut() = Some(receiver);
        sender
    }

    pub async fn pass(&self) {
        let receiver = self.receiver.borrow_mut().take();
        if let Some(receiver) = receiver {
            let _ = receiver.await;
        }
    }
}

/// Memory store whose calls can be held open before they reach the store.
#[derive(Debug, Default)]
pub struct GatedStore {
    pub inner: MemoryStore,
    gate: Gate,
}

impl GatedStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self { inner, gate: Gate::default() }
    }

    /// The next store call waits until the returned sender fires or drops.
    pub fn hold(&self) -> oneshot::Sender<()> {
        self.gate.hold()
    }
}

#[async_trait(?Send)]
impl AnnotationStore for GatedStore {
    async fn get_thread_map(&self, file_version_id: &FileVersionId) -> StoreResult<ThreadMap> {
        self.gate.pass().await;
        self.inner.get_thread_map(file_version_id).await
    }

    async fn create(
        &self,
        file_version_id: &FileVersionId,
        thread_id: Option<&ThreadId>,
        location: Location,
        kind: AnnotationType,
        payload: NewAnnotation,
    ) -> StoreResult<Annotation> {
        self.gate.pass().await;
        self.inner.create(file_version_id, thread_id, location, kind, payload).await
    }

    async fn delete(
        &self,
        file_version_id: &FileVersionId,
        annotation_id: &AnnotationId,
    ) -> StoreResult<()> {
        self.gate.pass().await;
        self.inner.delete(file_version_id, annotation_id).await
    }
}

/// Memory store that commits writes at once but holds the reply back, so a
/// fetch can observe a write whose caller is still waiting. Fetches are not
/// held.
#[derive(Debug, Default)]
pub struct SlowReplyStore {
    pub inner: MemoryStore,
    gate: Gate,
}

impl SlowReplyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self { inner, gate: Gate::default() }
    }

    /// The reply to the next write waits until the returned sender fires or drops.
    pub fn hold(&self) -> oneshot::Sender<()> {
        self.gate.hold()
    }
}

#[async_trait(?Send)]
impl AnnotationStore for SlowReplyStore {
    async fn get_thread_map(&self, file_version_id: &FileVersionId) -> StoreResult<ThreadMap> {
        self.inner.get_thread_map(file_version_id).await
    }

    async fn create(
        &self,
        file_version_id: &FileVersionId,
        thread_id: Option<&ThreadId>,
        location: Location,
        kind: AnnotationType,
        payload: NewAnnotation,
    ) -> StoreResult<Annotation> {
        let result = self.inner.create(file_version_id, thread_id, location, kind, payload).await;
        self.gate.pass().await;
        result
    }

    async fn delete(
        &self,
        file_version_id: &FileVersionId,
        annotation_id: &AnnotationId,
    ) -> StoreResult<()> {
        let result = self.inner.delete(file_version_id, annotation_id).await;
        self.gate.pass().await;
        result
    }
}
