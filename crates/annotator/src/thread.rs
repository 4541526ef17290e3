//! One discussion anchored at one location.
//!
//! A thread starts `Pending` (dialog open, nothing saved), becomes `Active`
//! once its first comment is stored, and then moves between `Active` (dialog
//! open) and `Inactive` (indicator only). Hover is a flag on top of that.
//!
//! [`AnnotationThread`] is a handle: clones share state, so a store call in
//! flight never holds a borrow of the thread.

use crate::coords::{check_scale, to_screen_space, DocumentPoint, PageGeometryProvider, ScreenPoint};
use crate::error::{AnnotationError, AnnotationResult};
use crate::event::{EventBus, SubscriptionId, ThreadEvent};
use crate::lifecycle::DestroyToken;
use crate::surface::{AnnotationSurface, DialogView, ThreadView};
use annotation_model::{
    Annotation, AnnotationId, AnnotationType, Author, FileVersionId, Location, NewAnnotation,
    ThreadId,
};
use annotation_store::{AnnotationStore, StoreError};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadState {
    /// Created by a click, no comment saved yet.
    Pending,
    /// Saved, dialog open.
    Active,
    /// Saved, dialog closed.
    Inactive,
}

/// Collaborators every thread of one annotator shares.
pub struct ThreadContext {
    pub store: Rc<dyn AnnotationStore>,
    pub geometry: Rc<dyn PageGeometryProvider>,
    pub surface: Rc<RefCell<dyn AnnotationSurface>>,
    pub file_version_id: FileVersionId,
    pub author: Author,
    pub can_annotate: bool,
    /// Tripped when the owning annotator is destroyed.
    pub lifecycle: DestroyToken,
}

impl std::fmt::Debug for ThreadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadContext")
            .field("file_version_id", &self.file_version_id)
            .field("author", &self.author)
            .field("can_annotate", &self.can_annotate)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct ThreadInner {
    id: ThreadId,
    location: Location,
    kind: AnnotationType,
    annotations: Vec<Annotation>,
    state: ThreadState,
    hovered: bool,
    visible: bool,
    scale: f64,
    draft: String,
    error: Option<String>,
    write_in_flight: bool,
}

#[derive(Clone)]
pub struct AnnotationThread {
    inner: Rc<RefCell<ThreadInner>>,
    events: Rc<EventBus<ThreadEvent>>,
    destroyed: DestroyToken,
    context: Rc<ThreadContext>,
}

impl std::fmt::Debug for AnnotationThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("AnnotationThread")
            .field("id", &inner.id)
            .field("location", &inner.location)
            .field("state", &inner.state)
            .field("annotations", &inner.annotations.len())
            .finish()
    }
}

impl AnnotationThread {
    /// Thread over already persisted annotations, or a new pending thread when
    /// `annotations` is empty.
    pub fn new(
        context: Rc<ThreadContext>,
        location: Location,
        kind: AnnotationType,
        annotations: Vec<Annotation>,
    ) -> Self {
        let (id, state) = match annotations.first() {
            Some(first) => (first.thread_id.clone(), ThreadState::Inactive),
            None => (ThreadId::temporary(), ThreadState::Pending),
        };

        let inner = ThreadInner {
            id,
            location,
            kind,
            annotations,
            state,
            hovered: false,
            visible: false,
            scale: 1.0,
            draft: String::new(),
            error: None,
            write_in_flight: false,
        };

        Self {
            inner: Rc::new(RefCell::new(inner)),
            events: Rc::new(EventBus::new()),
            destroyed: DestroyToken::new(),
            context,
        }
    }

    pub fn id(&self) -> ThreadId {
        self.inner.borrow().id.clone()
    }

    pub fn location(&self) -> Location {
        self.inner.borrow().location
    }

    pub fn page(&self) -> u32 {
        self.inner.borrow().location.page
    }

    pub fn kind(&self) -> AnnotationType {
        self.inner.borrow().kind
    }

    pub fn state(&self) -> ThreadState {
        self.inner.borrow().state
    }

    pub fn is_pending(&self) -> bool {
        self.state() == ThreadState::Pending
    }

    pub fn annotations(&self) -> Vec<Annotation> {
        self.inner.borrow().annotations.clone()
    }

    pub fn annotation_count(&self) -> usize {
        self.inner.borrow().annotations.len()
    }

    pub fn is_hovered(&self) -> bool {
        self.inner.borrow().hovered
    }

    pub fn is_visible(&self) -> bool {
        self.inner.borrow().visible
    }

    pub fn draft(&self) -> String {
        self.inner.borrow().draft.clone()
    }

    /// Inline error left by the last failed save, if any.
    pub fn error(&self) -> Option<String> {
        self.inner.borrow().error.clone()
    }

    pub fn is_write_in_flight(&self) -> bool {
        self.inner.borrow().write_in_flight
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.is_destroyed()
    }

    pub fn scale(&self) -> f64 {
        self.inner.borrow().scale
    }

    /// Whether two handles refer to the same thread.
    pub fn same_thread(&self, other: &AnnotationThread) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn subscribe(&self, listener: impl FnMut(&ThreadEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Record the zoom scale used by the next [`AnnotationThread::show`].
    pub fn set_scale(&self, scale: f64) -> AnnotationResult<()> {
        check_scale(scale)?;
        self.inner.borrow_mut().scale = scale;
        Ok(())
    }

    /// Draw the indicator, and the dialog when pending or active, at the
    /// current scale. Returns `false` if the page is not rendered.
    pub fn show(&self) -> bool {
        if self.is_destroyed() {
            return false;
        }

        let Some((view, dialog)) = self.views() else {
            self.inner.borrow_mut().visible = false;
            return false;
        };

        {
            let mut surface = self.context.surface.borrow_mut();
            surface.show_indicator(&view);
            match dialog {
                Some(dialog) => surface.show_dialog(&view, &dialog),
                None => surface.hide_dialog(&view.thread_id),
            }
        }

        self.inner.borrow_mut().visible = true;
        true
    }

    /// Remove indicator and dialog without touching thread data.
    pub fn hide(&self) {
        let id = {
            let mut inner = self.inner.borrow_mut();
            inner.visible = false;
            inner.id.clone()
        };
        self.context.surface.borrow_mut().remove_thread(&id);
    }

    pub fn open_dialog(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.state != ThreadState::Inactive {
                return;
            }
            inner.state = ThreadState::Active;
        }
        self.refresh();
    }

    /// Close the dialog of a saved thread. Pending threads keep theirs open
    /// until saved or discarded.
    pub fn close_dialog(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.state != ThreadState::Active {
                return;
            }
            inner.state = ThreadState::Inactive;
        }
        self.refresh();
    }

    pub fn set_hovered(&self, hovered: bool) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.hovered == hovered {
                return;
            }
            inner.hovered = hovered;
        }
        self.refresh();
    }

    /// Update the unsaved comment text shown in the dialog.
    pub fn set_draft(&self, text: impl Into<String>) {
        self.inner.borrow_mut().draft = text.into();
        self.refresh();
    }

    /// Save a comment.
    ///
    /// On a pending thread this is the thread's first store call: on success
    /// the thread takes its canonical id and turns active, on failure it stays
    /// pending with the draft and an inline error kept. On a saved thread the
    /// comment is appended optimistically and rolled back on failure.
    pub async fn add_annotation(&self, text: &str) -> AnnotationResult<Annotation> {
        if !self.context.can_annotate {
            return Err(AnnotationError::ReadOnly);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(AnnotationError::EmptyComment);
        }
        if self.context.lifecycle.join(&self.destroyed).is_destroyed() {
            return Err(AnnotationError::Destroyed);
        }

        let (target, location, kind, optimistic_id) = {
            let mut inner = self.inner.borrow_mut();
            if inner.write_in_flight {
                return Err(AnnotationError::WriteInProgress(inner.id.clone()));
            }
            inner.write_in_flight = true;
            inner.error = None;
            inner.draft = text.to_owned();

            if inner.state == ThreadState::Pending {
                (None, inner.location, inner.kind, None)
            } else {
                let optimistic = Annotation {
                    id: AnnotationId::generate(),
                    thread_id: inner.id.clone(),
                    location: inner.location,
                    kind: inner.kind,
                    text: text.to_owned(),
                    author: self.context.author.clone(),
                    created_at: annotation_model::now_unix(),
                };
                let optimistic_id = optimistic.id.clone();
                inner.annotations.push(optimistic);
                (Some(inner.id.clone()), inner.location, inner.kind, Some(optimistic_id))
            }
        };
        self.refresh();

        let payload = NewAnnotation::new(text, self.context.author.clone());
        let result = self
            .context
            .store
            .create(&self.context.file_version_id, target.as_ref(), location, kind, payload)
            .await;

        if self.context.lifecycle.join(&self.destroyed).is_destroyed() {
            log::debug!("dropping create result for a destroyed thread");
            return Err(AnnotationError::Destroyed);
        }

        match result {
            Ok(annotation) => Ok(self.commit_create(annotation, optimistic_id)),
            Err(error) => Err(self.rollback_create(error, optimistic_id)),
        }
    }

    fn commit_create(&self, annotation: Annotation, optimistic_id: Option<AnnotationId>) -> Annotation {
        let event = {
            let mut inner = self.inner.borrow_mut();
            inner.write_in_flight = false;
            inner.draft.clear();

            match optimistic_id {
                Some(optimistic_id) => {
                    if let Some(slot) = inner.annotations.iter_mut().find(|a| a.id == optimistic_id) {
                        *slot = annotation.clone();
                    }
                    ThreadEvent::Updated { thread_id: inner.id.clone() }
                }
                None => {
                    let previous_id = std::mem::replace(&mut inner.id, annotation.thread_id.clone());
                    inner.annotations.push(annotation.clone());
                    inner.state = ThreadState::Active;
                    ThreadEvent::Created {
                        previous_id,
                        thread_id: inner.id.clone(),
                        page: inner.location.page,
                    }
                }
            }
        };

        if let ThreadEvent::Created { previous_id, thread_id, .. } = &event {
            log::debug!("thread {previous_id} saved as {thread_id}");
            if self.is_visible() {
                self.context.surface.borrow_mut().remove_thread(previous_id);
            }
        }

        self.refresh();
        self.events.emit(&event);
        annotation
    }

    fn rollback_create(&self, error: StoreError, optimistic_id: Option<AnnotationId>) -> AnnotationError {
        let thread_id = {
            let mut inner = self.inner.borrow_mut();
            inner.write_in_flight = false;
            if let Some(optimistic_id) = optimistic_id {
                inner.annotations.retain(|annotation| annotation.id != optimistic_id);
            }
            inner.error = Some(error.to_string());
            inner.id.clone()
        };

        log::warn!("saving comment on thread {thread_id} failed: {error}");
        self.refresh();
        self.events.emit(&ThreadEvent::SaveFailed { thread_id, retryable: error.is_retryable() });
        error.into()
    }

    /// Delete one comment.
    ///
    /// The comment disappears locally at once and comes back if the store
    /// fails. A comment the store no longer has counts as deleted, and so does
    /// one this thread never had. Deleting the last comment destroys the
    /// thread and emits [`ThreadEvent::Deleted`].
    pub async fn delete_annotation(&self, annotation_id: &AnnotationId) -> AnnotationResult<()> {
        if !self.context.can_annotate {
            return Err(AnnotationError::ReadOnly);
        }
        if self.context.lifecycle.is_destroyed() {
            return Err(AnnotationError::Destroyed);
        }
        if self.is_destroyed() {
            return Ok(());
        }

        let (position, removed) = {
            let mut inner = self.inner.borrow_mut();
            if inner.write_in_flight {
                return Err(AnnotationError::WriteInProgress(inner.id.clone()));
            }
            let Some(position) = inner.annotations.iter().position(|a| &a.id == annotation_id)
            else {
                return Ok(());
            };
            inner.write_in_flight = true;
            inner.error = None;
            (position, inner.annotations.remove(position))
        };
        self.refresh();

        let result = self.context.store.delete(&self.context.file_version_id, annotation_id).await;

        if self.context.lifecycle.join(&self.destroyed).is_destroyed() {
            log::debug!("dropping delete result for a destroyed thread");
            return Err(AnnotationError::Destroyed);
        }

        match result {
            Ok(()) | Err(StoreError::NotFound(_)) => {
                let (emptied, thread_id, page) = {
                    let mut inner = self.inner.borrow_mut();
                    inner.write_in_flight = false;
                    (inner.annotations.is_empty(), inner.id.clone(), inner.location.page)
                };

                if emptied {
                    log::debug!("last comment of thread {thread_id} deleted");
                    self.teardown();
                    self.events.emit(&ThreadEvent::Deleted { thread_id, page });
                    self.events.clear();
                } else {
                    self.refresh();
                    self.events.emit(&ThreadEvent::Updated { thread_id });
                }
                Ok(())
            }
            Err(error) => {
                let thread_id = {
                    let mut inner = self.inner.borrow_mut();
                    inner.write_in_flight = false;
                    inner.annotations.insert(position, removed);
                    inner.error = Some(error.to_string());
                    inner.id.clone()
                };

                log::warn!("deleting {annotation_id} from thread {thread_id} failed: {error}");
                self.refresh();
                self.events
                    .emit(&ThreadEvent::SaveFailed { thread_id, retryable: error.is_retryable() });
                Err(error.into())
            }
        }
    }

    /// Tear down drawing and listeners. Persisted data is left alone.
    pub fn destroy(&self) {
        if self.is_destroyed() {
            return;
        }
        self.teardown();
        self.events.clear();
    }

    /// Take the comments a fresh fetch returned for this thread. Ignored while
    /// a write is in flight, since that write settles the list itself, and
    /// for an empty list. Returns whether the comments were replaced.
    pub(crate) fn replace_annotations(&self, annotations: Vec<Annotation>) -> bool {
        if self.is_destroyed() || annotations.is_empty() {
            return false;
        }
        {
            let mut inner = self.inner.borrow_mut();
            if inner.write_in_flight {
                return false;
            }
            inner.annotations = annotations;
        }
        self.refresh();
        true
    }

    fn teardown(&self) {
        self.destroyed.destroy();
        self.hide();
    }

    fn refresh(&self) {
        if self.is_visible() {
            self.show();
        }
    }

    /// Where the indicator goes at the current scale, `None` if the page is
    /// not rendered.
    pub fn view(&self) -> Option<ThreadView> {
        self.views().map(|(view, _)| view)
    }

    fn views(&self) -> Option<(ThreadView, Option<DialogView>)> {
        let inner = self.inner.borrow();
        let rect = self.context.geometry.bounding_rect_for(inner.location.page)?;
        let document = DocumentPoint::new(inner.location.x, inner.location.y);

        let anchor = match to_screen_space(document, rect.height, inner.scale) {
            Ok(anchor) => anchor,
            Err(error) => {
                log::warn!("cannot place thread {}: {error}", inner.id);
                return None;
            }
        };

        let view = ThreadView {
            thread_id: inner.id.clone(),
            page: inner.location.page,
            anchor,
            client_anchor: ScreenPoint::new(rect.left + anchor.x, rect.top + anchor.y),
            state: inner.state,
            hovered: inner.hovered,
        };

        let dialog = matches!(inner.state, ThreadState::Pending | ThreadState::Active).then(|| {
            DialogView {
                annotations: inner.annotations.clone(),
                draft: inner.draft.clone(),
                error: inner.error.clone(),
                can_reply: self.context.can_annotate,
                saving: inner.write_in_flight,
            }
        });

        Some((view, dialog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{annotation, version, Fixture, GatedStore};
    use annotation_store::MemoryStore;
    use futures::executor::{block_on, LocalPool};
    use futures::task::LocalSpawnExt;

    fn recorder(thread: &AnnotationThread) -> Rc<RefCell<Vec<ThreadEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        thread.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        events
    }

    fn pending<S: AnnotationStore + 'static>(fixture: &Fixture<S>) -> AnnotationThread {
        AnnotationThread::new(
            fixture.thread_context(true),
            Location::new(10.0, 20.0, 1),
            AnnotationType::Point,
            Vec::new(),
        )
    }

    fn saved(fixture: &Fixture<MemoryStore>, annotations: Vec<Annotation>) -> AnnotationThread {
        let location = annotations[0].location;
        AnnotationThread::new(fixture.thread_context(true), location, AnnotationType::Point, annotations)
    }

    #[test]
    fn first_save_gives_the_thread_its_canonical_id() {
        let fixture = Fixture::new(MemoryStore::new());
        let thread = pending(&fixture);
        let events = recorder(&thread);
        let temporary = thread.id();
        assert!(temporary.is_temporary());
        assert!(thread.show());

        let stored = block_on(thread.add_annotation("  first note ")).expect("save should succeed");

        assert_eq!(stored.text, "first note");
        assert_eq!(thread.id(), stored.thread_id);
        assert!(!thread.id().is_temporary());
        assert_eq!(thread.state(), ThreadState::Active);
        assert_eq!(thread.draft(), "");
        assert_eq!(
            *events.borrow(),
            vec![ThreadEvent::Created {
                previous_id: temporary.clone(),
                thread_id: stored.thread_id.clone(),
                page: 1,
            }]
        );

        let surface = fixture.surface.borrow();
        assert!(surface.indicator(&temporary).is_none());
        assert!(surface.indicator(&stored.thread_id).is_some());
        assert_eq!(surface.dialog(&stored.thread_id).map(|d| d.annotations.len()), Some(1));
    }

    #[test]
    fn failed_first_save_keeps_the_thread_pending() {
        let fixture = Fixture::new(MemoryStore::new());
        fixture.store.set_available(false);
        let thread = pending(&fixture);
        let events = recorder(&thread);
        thread.show();

        let error = block_on(thread.add_annotation("note")).unwrap_err();
        assert!(error.is_retryable());
        assert!(thread.is_pending());
        assert!(thread.id().is_temporary());
        assert_eq!(thread.draft(), "note");
        assert!(thread.error().is_some());
        assert!(!thread.is_write_in_flight());
        assert!(matches!(
            events.borrow().as_slice(),
            [ThreadEvent::SaveFailed { retryable: true, .. }]
        ));

        let dialog = fixture.surface.borrow().dialog(&thread.id()).cloned();
        let dialog = dialog.expect("pending dialog stays open");
        assert_eq!(dialog.draft, "note");
        assert!(dialog.error.is_some());

        fixture.store.set_available(true);
        block_on(thread.add_annotation("note")).expect("retry should succeed");
        assert_eq!(thread.state(), ThreadState::Active);
        assert!(thread.error().is_none());
    }

    #[test]
    fn reply_replaces_the_optimistic_comment_with_the_stored_one() {
        let existing = annotation("a1", "t1", "hi", Location::new(10.0, 20.0, 1));
        let fixture = Fixture::new(MemoryStore::with_annotations(version(), [existing.clone()]));
        let thread = saved(&fixture, vec![existing.clone()]);
        let events = recorder(&thread);

        let reply = block_on(thread.add_annotation("reply")).expect("reply should succeed");

        assert_eq!(reply.thread_id, ThreadId::new("t1"));
        assert_eq!(thread.annotations(), vec![existing, reply]);
        assert_eq!(*events.borrow(), vec![ThreadEvent::Updated { thread_id: ThreadId::new("t1") }]);
        assert_eq!(fixture.store.len(&version()), 2);
    }

    #[test]
    fn failed_reply_rolls_back_the_optimistic_comment() {
        let existing = annotation("a1", "t1", "hi", Location::new(10.0, 20.0, 1));
        let fixture = Fixture::new(MemoryStore::new());
        let thread = saved(&fixture, vec![existing.clone()]);
        let events = recorder(&thread);
        fixture.store.set_available(false);

        let error = block_on(thread.add_annotation("reply")).unwrap_err();

        assert!(matches!(error, AnnotationError::Store(StoreError::Unavailable { .. })));
        assert_eq!(thread.annotations(), vec![existing]);
        assert_eq!(thread.draft(), "reply");
        assert_eq!(events.borrow().len(), 1);
    }

    #[test]
    fn blank_comments_are_rejected_without_a_store_call() {
        let fixture = Fixture::new(MemoryStore::new());
        let thread = pending(&fixture);

        let error = block_on(thread.add_annotation("   ")).unwrap_err();
        assert!(matches!(error, AnnotationError::EmptyComment));
        assert!(fixture.store.is_empty(&version()));
        assert!(thread.is_pending());
    }

    #[test]
    fn read_only_threads_refuse_writes() {
        let existing = annotation("a1", "t1", "hi", Location::new(10.0, 20.0, 1));
        let fixture = Fixture::new(MemoryStore::with_annotations(version(), [existing.clone()]));
        let thread = AnnotationThread::new(
            fixture.thread_context(false),
            existing.location,
            AnnotationType::Point,
            vec![existing.clone()],
        );

        assert!(matches!(block_on(thread.add_annotation("x")), Err(AnnotationError::ReadOnly)));
        assert!(matches!(
            block_on(thread.delete_annotation(&existing.id)),
            Err(AnnotationError::ReadOnly)
        ));
        assert_eq!(fixture.store.len(&version()), 1);
    }

    #[test]
    fn second_write_while_one_is_in_flight_is_rejected() {
        let fixture = Fixture::new(GatedStore::new(MemoryStore::new()));
        let thread = pending(&fixture);
        let release = fixture.store.hold();

        let mut pool = LocalPool::new();
        let outcome = Rc::new(RefCell::new(None));
        let (first, sink) = (thread.clone(), Rc::clone(&outcome));
        pool.spawner()
            .spawn_local(async move {
                *sink.borrow_mut() = Some(first.add_annotation("one").await);
            })
            .expect("spawn first save");
        pool.run_until_stalled();
        assert!(thread.is_write_in_flight());

        let second = block_on(thread.add_annotation("two"));
        assert!(matches!(second, Err(AnnotationError::WriteInProgress(_))));

        release.send(()).expect("gate still open");
        pool.run_until_stalled();
        assert!(matches!(outcome.borrow().as_ref(), Some(Ok(_))));
        assert_eq!(thread.annotation_count(), 1);
        assert!(!thread.is_write_in_flight());
    }

    #[test]
    fn result_arriving_after_destroy_is_dropped() {
        let fixture = Fixture::new(GatedStore::new(MemoryStore::new()));
        let thread = pending(&fixture);
        thread.show();
        let release = fixture.store.hold();

        let mut pool = LocalPool::new();
        let outcome = Rc::new(RefCell::new(None));
        let (first, sink) = (thread.clone(), Rc::clone(&outcome));
        pool.spawner()
            .spawn_local(async move {
                *sink.borrow_mut() = Some(first.add_annotation("one").await);
            })
            .expect("spawn save");
        pool.run_until_stalled();

        thread.destroy();
        release.send(()).expect("gate still open");
        pool.run_until_stalled();

        assert!(matches!(outcome.borrow().as_ref(), Some(Err(AnnotationError::Destroyed))));
        assert!(thread.id().is_temporary());
        assert_eq!(thread.annotation_count(), 0);
        assert_eq!(fixture.surface.borrow().indicators().count(), 0);
        assert_eq!(fixture.store.inner.len(&version()), 1);
    }

    #[test]
    fn deleting_the_last_comment_destroys_the_thread() {
        let existing = annotation("a1", "t1", "hi", Location::new(10.0, 20.0, 1));
        let fixture = Fixture::new(MemoryStore::with_annotations(version(), [existing.clone()]));
        let thread = saved(&fixture, vec![existing.clone()]);
        let events = recorder(&thread);
        thread.show();

        block_on(thread.delete_annotation(&existing.id)).expect("delete should succeed");

        assert!(thread.is_destroyed());
        assert_eq!(
            *events.borrow(),
            vec![ThreadEvent::Deleted { thread_id: ThreadId::new("t1"), page: 1 }]
        );
        assert!(fixture.surface.borrow().indicator(&ThreadId::new("t1")).is_none());
        assert!(fixture.store.is_empty(&version()));

        block_on(thread.delete_annotation(&existing.id)).expect("second delete is a no-op");
        assert_eq!(events.borrow().len(), 1);
    }

    #[test]
    fn deleting_a_comment_the_store_already_lost_still_succeeds() {
        let location = Location::new(10.0, 20.0, 1);
        let first = annotation("a1", "t1", "hi", location);
        let second = annotation("a2", "t1", "again", location);
        let fixture = Fixture::new(MemoryStore::new());
        let thread = saved(&fixture, vec![first.clone(), second.clone()]);
        let events = recorder(&thread);

        block_on(thread.delete_annotation(&first.id)).expect("missing comment counts as deleted");

        assert_eq!(thread.annotations(), vec![second]);
        assert!(!thread.is_destroyed());
        assert_eq!(*events.borrow(), vec![ThreadEvent::Updated { thread_id: ThreadId::new("t1") }]);
    }

    #[test]
    fn failed_delete_restores_the_comment_in_place() {
        let location = Location::new(10.0, 20.0, 1);
        let first = annotation("a1", "t1", "hi", location);
        let second = annotation("a2", "t1", "again", location);
        let fixture =
            Fixture::new(MemoryStore::with_annotations(version(), [first.clone(), second.clone()]));
        let thread = saved(&fixture, vec![first.clone(), second.clone()]);
        fixture.store.set_available(false);

        let error = block_on(thread.delete_annotation(&first.id)).unwrap_err();

        assert!(error.is_retryable());
        assert_eq!(thread.annotations(), vec![first, second]);
        assert!(thread.error().is_some());
        assert!(!thread.is_destroyed());
    }

    #[test]
    fn indicator_is_placed_from_document_coordinates() {
        let fixture = Fixture::new(MemoryStore::new());
        let existing = annotation("a1", "t1", "hi", Location::new(10.0, 20.0, 2));
        let thread = saved(&fixture, vec![existing]);

        assert!(thread.show());
        let view = fixture.surface.borrow().indicator(&thread.id()).cloned();
        let view = view.expect("indicator drawn");
        assert_eq!(view.anchor, ScreenPoint::new(10.0, 780.0));
        assert_eq!(view.client_anchor, ScreenPoint::new(10.0, 1280.0));

        thread.set_scale(2.0).expect("valid scale");
        let view = thread.view().expect("page 2 is rendered");
        assert_eq!(view.anchor, ScreenPoint::new(20.0, 760.0));
        assert!(thread.set_scale(0.0).is_err());
    }

    #[test]
    fn threads_on_unrendered_pages_are_not_shown() {
        let fixture = Fixture::new(MemoryStore::new());
        let existing = annotation("a1", "t1", "hi", Location::new(10.0, 20.0, 9));
        let thread = saved(&fixture, vec![existing]);

        assert!(!thread.show());
        assert!(!thread.is_visible());
        assert_eq!(fixture.surface.borrow().indicators().count(), 0);
    }

    #[test]
    fn dialog_follows_active_and_inactive_states() {
        let fixture = Fixture::new(MemoryStore::new());
        let existing = annotation("a1", "t1", "hi", Location::new(10.0, 20.0, 1));
        let thread = saved(&fixture, vec![existing]);
        let id = thread.id();

        thread.show();
        assert_eq!(thread.state(), ThreadState::Inactive);
        assert!(fixture.surface.borrow().dialog(&id).is_none());

        thread.open_dialog();
        assert_eq!(thread.state(), ThreadState::Active);
        assert!(fixture.surface.borrow().dialog(&id).is_some());

        thread.set_hovered(true);
        assert_eq!(fixture.surface.borrow().indicator(&id).map(|view| view.hovered), Some(true));

        thread.close_dialog();
        assert!(fixture.surface.borrow().dialog(&id).is_none());

        let draft = pending(&fixture);
        draft.close_dialog();
        assert!(draft.is_pending());
    }
}
