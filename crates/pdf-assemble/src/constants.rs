//! Shared constants for assembly, thumbnails and annotations

// =============================================================================
// Default Page Dimensions
// =============================================================================

/// Default page width in points (US Letter: 8.5" × 11")
pub const DEFAULT_PAGE_WIDTH_PT: f32 = 612.0;

/// Default page height in points (US Letter)
pub const DEFAULT_PAGE_HEIGHT_PT: f32 = 792.0;

/// Default page dimensions as tuple (width, height)
pub const DEFAULT_PAGE_DIMENSIONS: (f32, f32) = (DEFAULT_PAGE_WIDTH_PT, DEFAULT_PAGE_HEIGHT_PT);

// =============================================================================
// Live Preview
// =============================================================================

/// Quiet period before a preview recompile (milliseconds)
pub const DEFAULT_DEBOUNCE_MS: u64 = 800;

/// File name offered for the merged download
pub const DEFAULT_OUTPUT_NAME: &str = "merged.pdf";

// =============================================================================
// Thumbnails
// =============================================================================

/// Render scale for page thumbnails (1.0 = 72 dpi)
pub const DEFAULT_THUMBNAIL_SCALE: f32 = 0.4;

// =============================================================================
// Annotation Overlay
// =============================================================================

pub const MIN_ZOOM: f32 = 0.08;
pub const MAX_ZOOM: f32 = 6.0;
pub const DEFAULT_ZOOM: f32 = 1.5;

/// Zoom change per wheel notch
pub const ZOOM_STEP: f32 = 0.1;

/// Smallest width or height a resize can produce (points)
pub const MIN_ANNOTATION_SIZE: f32 = 30.0;

/// How long handles stay visible after the pointer leaves (milliseconds)
pub const DEFAULT_HOVER_TIMEOUT_MS: u64 = 1500;

pub const DEFAULT_TEXT_WIDTH: f32 = 150.0;
pub const DEFAULT_TEXT_HEIGHT: f32 = 50.0;
pub const DEFAULT_FONT_SIZE: f32 = 14.0;
pub const DEFAULT_TEXT: &str = "Insert text";
pub const DEFAULT_FONT_FAMILY: &str = "Arial";

pub const DEFAULT_SIGNATURE_WIDTH: f32 = 150.0;
pub const DEFAULT_SIGNATURE_HEIGHT: f32 = 60.0;

pub const DEFAULT_SHAPE_SIZE: f32 = 12.0;

// =============================================================================
// Flattening
// =============================================================================

/// Approximate character width ratio for the standard fonts
pub const HELVETICA_CHAR_WIDTH_RATIO: f32 = 0.5;

/// Line spacing as a multiple of the font size
pub const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// Stroke width for check and cross marks (points)
pub const SHAPE_STROKE_WIDTH: f32 = 2.0;

/// Check mark color (green)
pub const CHECK_COLOR: (f32, f32, f32) = (0.13, 0.77, 0.31);

/// Cross mark color (red)
pub const CROSS_COLOR: (f32, f32, f32) = (0.93, 0.27, 0.27);
