//! Screen pixels <-> document units.
//!
//! Screen points are relative to the top-left corner of a rendered page.
//! Document points are at scale 1 with the origin at the bottom-left corner.
//! Rotation is never applied here: the renderer reports the page height of the
//! page in its current orientation.

use crate::error::{AnnotationError, AnnotationResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentPoint {
    pub x: f64,
    pub y: f64,
}

impl DocumentPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in client pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Left and top edges are inside, right and bottom edges are not.
    pub fn contains(&self, point: ScreenPoint) -> bool {
        point.x >= self.left && point.x < self.right() && point.y >= self.top && point.y < self.bottom()
    }

    /// Offset of a client point from this rectangle's top-left corner.
    pub fn relative(&self, point: ScreenPoint) -> ScreenPoint {
        ScreenPoint::new(point.x - self.left, point.y - self.top)
    }
}

pub(crate) fn check_scale(scale: f64) -> AnnotationResult<()> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        Err(AnnotationError::InvalidArgument(format!("scale must be positive, got {scale}")))
    }
}

/// Undo zoom and flip the Y axis around the rendered page height.
pub fn to_document_space(
    screen: ScreenPoint,
    page_height_px: f64,
    scale: f64,
) -> AnnotationResult<DocumentPoint> {
    check_scale(scale)?;
    Ok(DocumentPoint::new(screen.x / scale, (page_height_px - screen.y) / scale))
}

/// Exact inverse of [`to_document_space`] for the same height and scale.
pub fn to_screen_space(
    document: DocumentPoint,
    page_height_px: f64,
    scale: f64,
) -> AnnotationResult<ScreenPoint> {
    check_scale(scale)?;
    Ok(ScreenPoint::new(document.x * scale, page_height_px - document.y * scale))
}

/// Geometry of the pages the document renderer currently has on screen.
pub trait PageGeometryProvider {
    fn page_count(&self) -> u32;

    /// Client-pixel rectangle of a rendered page, `None` if the page is not
    /// rendered.
    fn bounding_rect_for(&self, page: u32) -> Option<Rect>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocatedPage {
    pub page: u32,
    pub rect: Rect,
}

/// Rendered page under a client point, if any. Missing every page is a normal
/// outcome (clicks on toolbars, gaps between pages).
pub fn locate_page(point: ScreenPoint, geometry: &dyn PageGeometryProvider) -> Option<LocatedPage> {
    (1..=geometry.page_count()).find_map(|page| {
        let rect = geometry.bounding_rect_for(page)?;
        rect.contains(point).then_some(LocatedPage { page, rect })
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UiMarker {
    AnnotationDialog,
    AnnotationThread,
    Controls,
}

/// Screen area owned by annotation UI rather than the document surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UiRegion {
    pub marker: UiMarker,
    pub rect: Rect,
}

/// Whether `point` lands in a region tagged with one of `markers`.
pub fn is_in_ui_region(point: ScreenPoint, regions: &[UiRegion], markers: &[UiMarker]) -> bool {
    regions.iter().any(|region| markers.contains(&region.marker) && region.rect.contains(point))
}

/// Pages stacked vertically at a common scale, each centred on the widest.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticPageGeometry {
    /// Unscaled page sizes as `(width, height)`.
    pub page_sizes: Vec<(f64, f64)>,
    pub scale: f64,
    pub page_spacing_px: f64,
    pub origin: ScreenPoint,
}

impl StaticPageGeometry {
    pub fn new(page_sizes: Vec<(f64, f64)>) -> Self {
        Self { page_sizes, scale: 1.0, page_spacing_px: 0.0, origin: ScreenPoint::default() }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_spacing(mut self, page_spacing_px: f64) -> Self {
        self.page_spacing_px = page_spacing_px;
        self
    }

    pub fn with_origin(mut self, origin: ScreenPoint) -> Self {
        self.origin = origin;
        self
    }

    fn widest(&self) -> f64 {
        self.page_sizes.iter().map(|(width, _)| width * self.scale).fold(0.0, f64::max)
    }
}

impl PageGeometryProvider for StaticPageGeometry {
    fn page_count(&self) -> u32 {
        self.page_sizes.len() as u32
    }

    fn bounding_rect_for(&self, page: u32) -> Option<Rect> {
        let index = page.checked_sub(1)? as usize;
        let (width, height) = *self.page_sizes.get(index)?;

        let top = self.page_sizes[..index]
            .iter()
            .map(|(_, height)| height * self.scale + self.page_spacing_px)
            .sum::<f64>();
        let scaled_width = width * self.scale;
        let left = (self.widest() - scaled_width) / 2.0;

        Some(Rect::new(
            self.origin.x + left,
            self.origin.y + top,
            scaled_width,
            height * self.scale,
        ))
    }
}
