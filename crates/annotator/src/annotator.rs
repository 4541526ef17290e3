//! Document-level orchestration of annotation threads.
//!
//! The annotator owns the per-page index of saved threads and the single
//! pending thread, turns pointer input into thread creation or selection, and
//! forwards zoom and page-render notifications from the host renderer.

use crate::config::AnnotatorConfig;
use crate::coords::{
    check_scale, is_in_ui_region, locate_page, to_document_space, LocatedPage, PageGeometryProvider,
    ScreenPoint, UiMarker,
};
use crate::error::{AnnotationError, AnnotationResult};
use crate::event::{AnnotatorEvent, EventBus, SubscriptionId, ThreadEvent};
use crate::index::PageIndex;
use crate::lifecycle::DestroyToken;
use crate::surface::AnnotationSurface;
use crate::thread::{AnnotationThread, ThreadContext, ThreadState};
use annotation_model::{Annotation, AnnotationId, AnnotationType, Location, ThreadId, ThreadMap};
use annotation_store::AnnotationStore;
use log::{debug, trace, warn};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Host-provided collaborators.
pub struct AnnotatorContext {
    pub store: Rc<dyn AnnotationStore>,
    pub geometry: Rc<dyn PageGeometryProvider>,
    pub surface: Rc<RefCell<dyn AnnotationSurface>>,
}

/// Pointer input in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub client: ScreenPoint,
}

impl PointerEvent {
    pub fn at(client_x: f64, client_y: f64) -> Self {
        Self { client: ScreenPoint::new(client_x, client_y) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// `init` has not run yet.
    NotListening,
    /// The click missed every rendered page.
    OutsidePage,
    /// The click landed on annotation UI.
    UiRegion,
    Destroyed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Point mode: a new pending thread was created and shown.
    Created(ThreadId),
    /// Ordinary mode: the click hit a thread indicator and opened its dialog.
    Selected(ThreadId),
    /// Ordinary mode: the click hit bare page and closed open dialogs.
    Dismissed,
    Ignored(IgnoreReason),
}

#[derive(Debug)]
struct AnnotatorState {
    index: PageIndex,
    pending: Option<AnnotationThread>,
    scale: f64,
    point_mode: bool,
    initialized: bool,
    index_ready: bool,
}

impl AnnotatorState {
    fn threads(&self) -> Vec<AnnotationThread> {
        let mut threads = self.index.all();
        threads.extend(self.pending.clone());
        threads
    }

    fn find(&self, thread_id: &ThreadId) -> Option<AnnotationThread> {
        self.pending
            .as_ref()
            .filter(|pending| &pending.id() == thread_id)
            .or_else(|| self.index.get(thread_id))
            .cloned()
    }
}

/// Annotation controller for one document.
///
/// Methods take `&self`; state sits behind a `RefCell` that is never borrowed
/// across an await or while a thread method runs, so thread events can update
/// the index synchronously.
pub struct Annotator {
    config: AnnotatorConfig,
    context: Rc<ThreadContext>,
    state: Rc<RefCell<AnnotatorState>>,
    events: Rc<EventBus<AnnotatorEvent>>,
    lifecycle: DestroyToken,
}

impl std::fmt::Debug for Annotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Annotator")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("destroyed", &self.lifecycle.is_destroyed())
            .finish_non_exhaustive()
    }
}

impl Annotator {
    pub fn new(config: AnnotatorConfig, context: AnnotatorContext) -> Self {
        let lifecycle = DestroyToken::new();
        let thread_context = ThreadContext {
            store: context.store,
            geometry: context.geometry,
            surface: context.surface,
            file_version_id: config.file_version_id.clone(),
            author: config.author(),
            can_annotate: config.can_annotate,
            lifecycle: lifecycle.clone(),
        };

        let state = AnnotatorState {
            index: PageIndex::new(),
            pending: None,
            scale: 1.0,
            point_mode: false,
            initialized: false,
            index_ready: false,
        };

        Self {
            config,
            context: Rc::new(thread_context),
            state: Rc::new(RefCell::new(state)),
            events: Rc::new(EventBus::new()),
            lifecycle,
        }
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    /// Install controls, reset the scale to 1 and start accepting clicks.
    pub fn init(&self) {
        if self.lifecycle.is_destroyed() || self.state.borrow().initialized {
            return;
        }

        {
            let mut state = self.state.borrow_mut();
            state.initialized = true;
            state.scale = 1.0;
        }
        if !self.config.host_controls && self.config.can_annotate {
            self.context.surface.borrow_mut().install_controls();
        }
        debug!("annotator initialized for {}", self.config.file_version_id);
    }

    /// Tear down every thread and listener. Persisted data is untouched and
    /// store calls still in flight become no-ops.
    pub fn destroy(&self) {
        if self.lifecycle.is_destroyed() {
            return;
        }
        self.lifecycle.destroy();

        let (threads, point_mode, initialized) = {
            let mut state = self.state.borrow_mut();
            let mut threads = state.index.drain();
            threads.extend(state.pending.take());
            state.index_ready = false;
            let point_mode = std::mem::take(&mut state.point_mode);
            (threads, point_mode, state.initialized)
        };

        for thread in &threads {
            thread.destroy();
        }

        {
            let mut surface = self.context.surface.borrow_mut();
            if point_mode {
                surface.set_point_mode(false);
            }
            if initialized && !self.config.host_controls && self.config.can_annotate {
                surface.remove_controls();
            }
        }

        self.events.clear();
        debug!("annotator for {} destroyed ({} threads)", self.config.file_version_id, threads.len());
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle.is_destroyed()
    }

    /// Record a new zoom scale for every thread. Nothing is redrawn until the
    /// host calls one of the render methods.
    pub fn set_scale(&self, scale: f64) -> AnnotationResult<()> {
        check_scale(scale)?;

        let threads = {
            let mut state = self.state.borrow_mut();
            state.scale = scale;
            state.threads()
        };
        for thread in &threads {
            thread.set_scale(scale)?;
        }
        Ok(())
    }

    pub fn scale(&self) -> f64 {
        self.state.borrow().scale
    }

    /// Fetch the thread map, rebuild the index and show every thread.
    ///
    /// An unavailable store leaves the document without annotations instead
    /// of failing. Calling this again refetches: threads already indexed keep
    /// their handles and take the fetched comments, threads with a write in
    /// flight are left as they are, and threads the store no longer has are
    /// destroyed.
    pub async fn show_annotations(&self) {
        if self.lifecycle.is_destroyed() {
            return;
        }

        let fetched = self.context.store.get_thread_map(&self.config.file_version_id).await;
        if self.lifecycle.is_destroyed() {
            debug!("dropping thread map fetched after destroy");
            return;
        }

        let thread_map = fetched.unwrap_or_else(|error| {
            warn!(
                "could not load annotations for {}, showing none: {error}",
                self.config.file_version_id
            );
            ThreadMap::new()
        });

        self.rebuild_index(thread_map);
        self.render_annotations();
    }

    fn rebuild_index(&self, mut thread_map: ThreadMap) {
        let (previous, scale) = {
            let mut state = self.state.borrow_mut();
            (state.index.drain(), state.scale)
        };

        // known threads keep their handles so callers holding them stay valid
        let mut threads = Vec::with_capacity(thread_map.len());
        for thread in previous {
            let thread_id = thread.id();
            if thread.is_write_in_flight() {
                trace!("keeping thread {thread_id} while its write settles");
                thread_map.remove(&thread_id);
                threads.push(thread);
            } else if let Some(annotations) = thread_map.remove(&thread_id) {
                thread.replace_annotations(annotations);
                threads.push(thread);
            } else {
                debug!("thread {thread_id} is gone from the store");
                thread.destroy();
            }
        }

        for (thread_id, annotations) in thread_map {
            let Some(first) = annotations.first() else {
                trace!("skipping empty thread {thread_id}");
                continue;
            };
            let (location, kind) = (first.location, first.kind);
            let thread = AnnotationThread::new(self.context.clone(), location, kind, annotations);
            if let Err(error) = thread.set_scale(scale) {
                warn!("thread {thread_id}: {error}");
            }
            self.bind_thread(&thread);
            threads.push(thread);
        }

        let mut state = self.state.borrow_mut();
        debug!("indexed {} threads for {}", threads.len(), self.config.file_version_id);
        for thread in threads {
            state.index.insert(thread);
        }
        state.index_ready = true;
    }

    /// Redraw every known thread, pending one included.
    pub fn render_annotations(&self) {
        if self.lifecycle.is_destroyed() {
            return;
        }
        let threads = self.state.borrow().threads();
        for thread in &threads {
            thread.hide();
        }
        for thread in &threads {
            thread.show();
        }
    }

    /// Draw the threads of one freshly rendered page. A no-op until the first
    /// fetch has rebuilt the index.
    pub fn render_annotations_on_page(&self, page: u32) {
        if self.lifecycle.is_destroyed() || !self.state.borrow().index_ready {
            trace!("page {page} rendered before annotations were loaded");
            return;
        }
        for thread in self.threads_on_page(page) {
            thread.show();
        }
    }

    pub fn is_in_point_mode(&self) -> bool {
        self.state.borrow().point_mode
    }

    /// Flip point mode and return the new mode.
    pub fn toggle_point_mode(&self) -> AnnotationResult<bool> {
        if self.is_in_point_mode() {
            self.exit_point_mode()?;
            Ok(false)
        } else {
            self.enter_point_mode()?;
            Ok(true)
        }
    }

    pub fn enter_point_mode(&self) -> AnnotationResult<()> {
        if self.lifecycle.is_destroyed() {
            return Err(AnnotationError::Destroyed);
        }
        if !self.config.can_annotate {
            return Err(AnnotationError::ReadOnly);
        }
        {
            let mut state = self.state.borrow_mut();
            if state.point_mode {
                return Err(AnnotationError::PointModeConflict);
            }
            state.point_mode = true;
        }

        self.context.surface.borrow_mut().set_point_mode(true);
        self.events.emit(&AnnotatorEvent::PointModeEnter);
        Ok(())
    }

    /// Leave point mode. A pending thread stays open for its comment.
    pub fn exit_point_mode(&self) -> AnnotationResult<()> {
        if self.lifecycle.is_destroyed() {
            return Err(AnnotationError::Destroyed);
        }
        {
            let mut state = self.state.borrow_mut();
            if !state.point_mode {
                return Err(AnnotationError::PointModeConflict);
            }
            state.point_mode = false;
        }

        self.context.surface.borrow_mut().set_point_mode(false);
        self.events.emit(&AnnotatorEvent::PointModeExit);
        Ok(())
    }

    /// Route a click.
    ///
    /// In point mode a click on bare page replaces the pending thread with a
    /// new one at the click. Otherwise a click on an indicator opens that
    /// thread's dialog and a click on bare page closes open dialogs.
    pub fn handle_click(&self, event: PointerEvent) -> AnnotationResult<ClickOutcome> {
        if self.lifecycle.is_destroyed() {
            return Ok(ClickOutcome::Ignored(IgnoreReason::Destroyed));
        }
        let (initialized, point_mode) = {
            let state = self.state.borrow();
            (state.initialized, state.point_mode)
        };
        if !initialized {
            return Ok(ClickOutcome::Ignored(IgnoreReason::NotListening));
        }

        let Some(located) = locate_page(event.client, self.context.geometry.as_ref()) else {
            trace!("click at {:?} missed every page", event.client);
            return Ok(ClickOutcome::Ignored(IgnoreReason::OutsidePage));
        };
        let regions = self.context.surface.borrow().ui_regions();

        if point_mode {
            let markers = [UiMarker::AnnotationDialog, UiMarker::AnnotationThread, UiMarker::Controls];
            if is_in_ui_region(event.client, &regions, &markers) {
                trace!("point-mode click at {:?} landed on annotation UI", event.client);
                return Ok(ClickOutcome::Ignored(IgnoreReason::UiRegion));
            }
            return self.create_pending_thread(&located, event.client).map(ClickOutcome::Created);
        }

        if let Some(thread) = self.thread_at(located.page, event.client) {
            self.select(&thread);
            return Ok(ClickOutcome::Selected(thread.id()));
        }
        if is_in_ui_region(event.client, &regions, &[UiMarker::AnnotationDialog, UiMarker::Controls]) {
            return Ok(ClickOutcome::Ignored(IgnoreReason::UiRegion));
        }

        self.close_dialogs(None);
        Ok(ClickOutcome::Dismissed)
    }

    /// Mark the thread under the pointer as hovered and clear the others.
    pub fn handle_pointer_move(&self, event: PointerEvent) -> Option<ThreadId> {
        if self.lifecycle.is_destroyed() {
            return None;
        }
        let hit = locate_page(event.client, self.context.geometry.as_ref())
            .and_then(|located| self.thread_at(located.page, event.client));

        let threads = self.state.borrow().threads();
        for thread in &threads {
            thread.set_hovered(hit.as_ref().is_some_and(|hit| hit.same_thread(thread)));
        }
        hit.map(|thread| thread.id())
    }

    fn create_pending_thread(
        &self,
        located: &LocatedPage,
        client: ScreenPoint,
    ) -> AnnotationResult<ThreadId> {
        let scale = self.scale();
        let document = to_document_space(located.rect.relative(client), located.rect.height, scale)?;

        self.discard_pending();

        let location = Location::new(document.x, document.y, located.page);
        let thread = AnnotationThread::new(self.context.clone(), location, AnnotationType::Point, Vec::new());
        thread.set_scale(scale)?;
        self.bind_thread(&thread);
        self.state.borrow_mut().pending = Some(thread.clone());

        thread.show();
        let thread_id = thread.id();
        debug!("pending thread {thread_id} at ({}, {}) on page {}", location.x, location.y, location.page);
        Ok(thread_id)
    }

    /// Throw away the pending thread, if any. Returns whether one existed.
    pub fn discard_pending(&self) -> bool {
        let pending = self.state.borrow_mut().pending.take();
        match pending {
            Some(thread) => {
                debug!("discarding pending thread {}", thread.id());
                thread.destroy();
                true
            }
            None => false,
        }
    }

    fn thread_at(&self, page: u32, client: ScreenPoint) -> Option<AnnotationThread> {
        let radius = self.config.indicator_hit_radius;
        self.threads_on_page(page).into_iter().find(|thread| {
            thread.is_visible()
                && thread.view().is_some_and(|view| {
                    let (dx, dy) = (view.client_anchor.x - client.x, view.client_anchor.y - client.y);
                    dx * dx + dy * dy <= radius * radius
                })
        })
    }

    fn select(&self, thread: &AnnotationThread) {
        self.close_dialogs(Some(thread));
        thread.open_dialog();
    }

    fn close_dialogs(&self, except: Option<&AnnotationThread>) {
        let threads = self.state.borrow().index.all();
        for thread in threads {
            if thread.state() == ThreadState::Active
                && !except.is_some_and(|keep| keep.same_thread(&thread))
            {
                thread.close_dialog();
            }
        }
    }

    /// Keep the index in step with a thread's lifecycle.
    fn bind_thread(&self, thread: &AnnotationThread) {
        let state: Weak<RefCell<AnnotatorState>> = Rc::downgrade(&self.state);
        let events: Weak<EventBus<AnnotatorEvent>> = Rc::downgrade(&self.events);
        let lifecycle = self.lifecycle.clone();

        thread.subscribe(move |event| {
            if lifecycle.is_destroyed() {
                return;
            }
            let Some(state) = state.upgrade() else {
                return;
            };

            match event {
                ThreadEvent::Created { thread_id, page, .. } => {
                    let (pending, replaced) = {
                        let mut state = state.borrow_mut();
                        match state.pending.take() {
                            Some(pending) if &pending.id() == thread_id => {
                                debug!("indexing saved thread {thread_id} on page {page}");
                                let replaced = state.index.insert(pending.clone());
                                (pending, replaced)
                            }
                            other => {
                                state.pending = other;
                                return;
                            }
                        }
                    };

                    // a refetch during the save may already have indexed this id
                    if let Some(replaced) = replaced {
                        debug!("dropping fetched copy of thread {thread_id}");
                        replaced.destroy();
                        if pending.is_visible() {
                            pending.show();
                        }
                    }
                }
                ThreadEvent::Deleted { thread_id, page } => {
                    state.borrow_mut().index.remove(*page, thread_id);
                    if let Some(events) = events.upgrade() {
                        events.emit(&AnnotatorEvent::ThreadDeleted {
                            thread_id: thread_id.clone(),
                            page: *page,
                        });
                    }
                }
                ThreadEvent::Updated { .. } | ThreadEvent::SaveFailed { .. } => {}
            }
        });
    }

    /// Save a comment on a thread, pending or saved.
    pub async fn add_annotation(&self, thread_id: &ThreadId, text: &str) -> AnnotationResult<Annotation> {
        if self.lifecycle.is_destroyed() {
            return Err(AnnotationError::Destroyed);
        }
        let thread = self
            .thread(thread_id)
            .ok_or_else(|| AnnotationError::ThreadNotFound(thread_id.clone()))?;
        thread.add_annotation(text).await
    }

    /// Delete a comment. A thread that is already gone counts as done.
    pub async fn delete_annotation(
        &self,
        thread_id: &ThreadId,
        annotation_id: &AnnotationId,
    ) -> AnnotationResult<()> {
        if self.lifecycle.is_destroyed() {
            return Err(AnnotationError::Destroyed);
        }
        let Some(thread) = self.thread(thread_id) else {
            trace!("delete on unknown thread {thread_id}");
            return Ok(());
        };
        thread.delete_annotation(annotation_id).await
    }

    pub fn subscribe(&self, listener: impl FnMut(&AnnotatorEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Saved threads on a page plus the pending thread if it sits there.
    pub fn threads_on_page(&self, page: u32) -> Vec<AnnotationThread> {
        let state = self.state.borrow();
        let mut threads = state.index.page(page);
        threads.extend(state.pending.iter().filter(|pending| pending.page() == page).cloned());
        threads
    }

    pub fn thread(&self, thread_id: &ThreadId) -> Option<AnnotationThread> {
        self.state.borrow().find(thread_id)
    }

    pub fn pending_thread(&self) -> Option<AnnotationThread> {
        self.state.borrow().pending.clone()
    }

    /// Indexed threads plus the pending one.
    pub fn thread_count(&self) -> usize {
        let state = self.state.borrow();
        state.index.len() + usize::from(state.pending.is_some())
    }

    /// Pages that currently hold saved threads.
    pub fn indexed_pages(&self) -> Vec<u32> {
        self.state.borrow().index.pages().collect()
    }

    pub fn is_index_ready(&self) -> bool {
        self.state.borrow().index_ready
    }
}
