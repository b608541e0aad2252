//! Mapping between screen pixels and unscaled page points.

use crate::constants::{DEFAULT_ZOOM, MAX_ZOOM, MIN_ZOOM, ZOOM_STEP};

/// Offset from the top-left of the rendered page, in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Offset from the top-left of the page, in PDF points
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PdfPoint {
    pub x: f32,
    pub y: f32,
}

impl PdfPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    zoom: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { zoom: DEFAULT_ZOOM }
    }
}

impl Viewport {
    pub fn new(zoom: f32) -> Self {
        let mut viewport = Self::default();
        viewport.set_zoom(zoom);
        viewport
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Set the zoom, clamped to the supported range. NaN is ignored.
    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom.is_nan() {
            return;
        }
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn zoom_by(&mut self, delta: f32) {
        self.set_zoom(self.zoom + delta);
    }

    pub fn zoom_in(&mut self) {
        self.zoom_by(ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.zoom_by(-ZOOM_STEP);
    }

    pub fn to_screen(&self, point: PdfPoint) -> ScreenPoint {
        ScreenPoint {
            x: point.x * self.zoom,
            y: point.y * self.zoom,
        }
    }

    pub fn to_pdf(&self, point: ScreenPoint) -> PdfPoint {
        PdfPoint {
            x: point.x / self.zoom,
            y: point.y / self.zoom,
        }
    }

    pub fn to_screen_length(&self, length: f32) -> f32 {
        length * self.zoom
    }

    pub fn to_pdf_length(&self, length: f32) -> f32 {
        length / self.zoom
    }
}
