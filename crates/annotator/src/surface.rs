//! Drawing layer contract and a retained headless implementation.
//!
//! The annotator never draws. It tells an [`AnnotationSurface`] where thread
//! indicators and dialogs belong and asks it which screen areas are covered by
//! annotation UI.

use crate::coords::{Rect, ScreenPoint, UiMarker, UiRegion};
use crate::thread::ThreadState;
use annotation_model::{Annotation, ThreadId};
use std::collections::BTreeMap;

/// Placement of one thread's indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadView {
    pub thread_id: ThreadId,
    pub page: u32,
    /// Relative to the page's top-left corner.
    pub anchor: ScreenPoint,
    /// Same point in client coordinates.
    pub client_anchor: ScreenPoint,
    pub state: ThreadState,
    pub hovered: bool,
}

/// Contents of an open dialog.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DialogView {
    pub annotations: Vec<Annotation>,
    /// Unsaved comment text, kept across failed saves.
    pub draft: String,
    /// Inline, retryable error from the last save attempt.
    pub error: Option<String>,
    pub can_reply: bool,
    pub saving: bool,
}

/// Host drawing layer. Implementations must not call back into the annotator.
pub trait AnnotationSurface {
    fn show_indicator(&mut self, view: &ThreadView);
    fn show_dialog(&mut self, view: &ThreadView, dialog: &DialogView);
    fn hide_dialog(&mut self, thread_id: &ThreadId);
    /// Remove indicator and dialog.
    fn remove_thread(&mut self, thread_id: &ThreadId);
    fn install_controls(&mut self);
    fn remove_controls(&mut self);
    fn set_point_mode(&mut self, enabled: bool);
    /// Client-space areas covered by annotation UI.
    fn ui_regions(&self) -> Vec<UiRegion>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneSurfaceConfig {
    pub dialog_width: f64,
    pub dialog_height: f64,
    pub indicator_radius: f64,
    /// Where installed controls sit, `None` when the host places them.
    pub controls_rect: Option<Rect>,
}

impl Default for SceneSurfaceConfig {
    fn default() -> Self {
        Self { dialog_width: 282.0, dialog_height: 180.0, indicator_radius: 12.0, controls_rect: None }
    }
}

/// Headless surface that keeps what would be on screen.
#[derive(Debug, Default)]
pub struct SceneSurface {
    config: SceneSurfaceConfig,
    indicators: BTreeMap<ThreadId, ThreadView>,
    dialogs: BTreeMap<ThreadId, (ThreadView, DialogView)>,
    controls_installed: bool,
    point_mode: bool,
}

impl SceneSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SceneSurfaceConfig) -> Self {
        Self { config, ..Self::default() }
    }

    pub fn indicator(&self, thread_id: &ThreadId) -> Option<&ThreadView> {
        self.indicators.get(thread_id)
    }

    pub fn indicators(&self) -> impl Iterator<Item = &ThreadView> {
        self.indicators.values()
    }

    pub fn indicators_on_page(&self, page: u32) -> Vec<&ThreadView> {
        self.indicators.values().filter(|view| view.page == page).collect()
    }

    pub fn dialog(&self, thread_id: &ThreadId) -> Option<&DialogView> {
        self.dialogs.get(thread_id).map(|(_, dialog)| dialog)
    }

    pub fn open_dialogs(&self) -> usize {
        self.dialogs.len()
    }

    pub fn controls_installed(&self) -> bool {
        self.controls_installed
    }

    pub fn point_mode(&self) -> bool {
        self.point_mode
    }

    pub fn dialog_rect(&self, view: &ThreadView) -> Rect {
        let anchor = view.client_anchor;
        Rect::new(
            anchor.x - self.config.dialog_width / 2.0,
            anchor.y + self.config.indicator_radius,
            self.config.dialog_width,
            self.config.dialog_height,
        )
    }

    fn indicator_rect(&self, view: &ThreadView) -> Rect {
        let radius = self.config.indicator_radius;
        Rect::new(view.client_anchor.x - radius, view.client_anchor.y - radius, radius * 2.0, radius * 2.0)
    }
}

impl AnnotationSurface for SceneSurface {
    fn show_indicator(&mut self, view: &ThreadView) {
        self.indicators.insert(view.thread_id.clone(), view.clone());
    }

    fn show_dialog(&mut self, view: &ThreadView, dialog: &DialogView) {
        self.dialogs.insert(view.thread_id.clone(), (view.clone(), dialog.clone()));
    }

    fn hide_dialog(&mut self, thread_id: &ThreadId) {
        self.dialogs.remove(thread_id);
    }

    fn remove_thread(&mut self, thread_id: &ThreadId) {
        self.indicators.remove(thread_id);
        self.dialogs.remove(thread_id);
    }

    fn install_controls(&mut self) {
        self.controls_installed = true;
    }

    fn remove_controls(&mut self) {
        self.controls_installed = false;
    }

    fn set_point_mode(&mut self, enabled: bool) {
        self.point_mode = enabled;
    }

    fn ui_regions(&self) -> Vec<UiRegion> {
        let indicators = self
            .indicators
            .values()
            .map(|view| UiRegion { marker: UiMarker::AnnotationThread, rect: self.indicator_rect(view) });
        let dialogs = self
            .dialogs
            .values()
            .map(|(view, _)| UiRegion { marker: UiMarker::AnnotationDialog, rect: self.dialog_rect(view) });
        let controls = self
            .config
            .controls_rect
            .filter(|_| self.controls_installed)
            .map(|rect| UiRegion { marker: UiMarker::Controls, rect });

        indicators.chain(dialogs).chain(controls).collect()
    }
}
