//! Point Annotations Annotator Library
//!
//! Threaded point comments over a rendered, paginated document.
//!
//! The [`Annotator`] loads saved threads from an [`annotation_store::AnnotationStore`],
//! keeps them indexed by page, and turns clicks into new threads while point mode
//! is on. Page geometry comes from the host renderer through
//! [`PageGeometryProvider`]; drawing goes to an [`AnnotationSurface`].
//!
//! # Example
//!
//! ```
//! use annotation_store::MemoryStore;
//! use annotator::{
//!     Annotator, AnnotatorConfig, AnnotatorContext, ClickOutcome, PointerEvent, SceneSurface,
//!     StaticPageGeometry,
//! };
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let surface = Rc::new(RefCell::new(SceneSurface::new()));
//! let annotator = Annotator::new(
//!     AnnotatorConfig::new("v1"),
//!     AnnotatorContext {
//!         store: Rc::new(MemoryStore::new()),
//!         geometry: Rc::new(StaticPageGeometry::new(vec![(612.0, 792.0)])),
//!         surface: surface.clone(),
//!     },
//! );
//! annotator.init();
//! futures::executor::block_on(annotator.show_annotations());
//!
//! annotator.enter_point_mode()?;
//! if let ClickOutcome::Created(thread_id) = annotator.handle_click(PointerEvent::at(100.0, 100.0))? {
//!     let saved = futures::executor::block_on(annotator.add_annotation(&thread_id, "Check this figure"))?;
//!     assert_eq!(annotator.thread(&saved.thread_id).map(|t| t.annotation_count()), Some(1));
//! }
//! # Ok::<(), annotator::AnnotationError>(())
//! ```

pub mod annotator;
pub mod config;
pub mod coords;
pub mod error;
pub mod event;
pub mod index;
pub mod lifecycle;
pub mod surface;
pub mod thread;

#[cfg(test)]
mod test_support;

pub use annotator::{Annotator, AnnotatorContext, ClickOutcome, IgnoreReason, PointerEvent};
pub use config::AnnotatorConfig;
pub use coords::{
    is_in_ui_region, locate_page, to_document_space, to_screen_space, DocumentPoint, LocatedPage,
    PageGeometryProvider, Rect, ScreenPoint, StaticPageGeometry, UiMarker, UiRegion,
};
pub use error::{AnnotationError, AnnotationResult};
pub use event::{AnnotatorEvent, EventBus, SubscriptionId, ThreadEvent};
pub use index::PageIndex;
pub use lifecycle::DestroyToken;
pub use surface::{AnnotationSurface, DialogView, SceneSurface, SceneSurfaceConfig, ThreadView};
pub use thread::{AnnotationThread, ThreadContext, ThreadState};
