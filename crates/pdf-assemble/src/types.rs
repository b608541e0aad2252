use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentId),
    #[error("Page not found: {0}")]
    PageNotFound(PageId),
    #[error("Annotation not found: {0}")]
    AnnotationNotFound(AnnotationId),
    #[error("Index {index} out of bounds (length {len})")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("Cannot delete all pages")]
    CannotRemoveAllPages,
    #[error("Failed to render page {page}: {message}")]
    PageRender { page: u32, message: String },
    #[error("Compile failed: {0}")]
    CompileFailure(String),
    #[error("No pages to assemble")]
    NoPages,
    #[error("No gesture in progress")]
    NoGesture,
}

pub type Result<T> = std::result::Result<T, AssembleError>;

/// Handle to a source document in a [`crate::Collection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DocumentId(pub u64);

/// Globally unique page handle. Duplicates get their own id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnnotationId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc-{}", self.0)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page-{}", self.0)
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "annotation-{}", self.0)
    }
}

/// Clockwise page rotation, always one of 0, 90, 180 or 270 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "i64", into = "i64"))]
pub struct Rotation(u16);

impl Rotation {
    pub const NONE: Rotation = Rotation(0);
    pub const CW_90: Rotation = Rotation(90);
    pub const CW_180: Rotation = Rotation(180);
    pub const CW_270: Rotation = Rotation(270);

    /// Normalize any angle to a quarter turn in `[0, 360)`.
    ///
    /// Angles that are not multiples of 90 are truncated toward zero first,
    /// the same way PDF readers treat an invalid `/Rotate`.
    pub fn from_degrees(degrees: i64) -> Self {
        let quarter = (degrees / 90) * 90;
        Rotation(quarter.rem_euclid(360) as u16)
    }

    pub fn degrees(self) -> u16 {
        self.0
    }

    /// One quarter turn clockwise.
    pub fn rotated_cw(self) -> Self {
        self.compose(Rotation::CW_90)
    }

    /// Apply `other` after `self`.
    pub fn compose(self, other: Rotation) -> Self {
        Rotation((self.0 + other.0) % 360)
    }

    /// True for 90 and 270, where width and height swap.
    pub fn is_sideways(self) -> bool {
        self.0 == 90 || self.0 == 270
    }
}

impl From<i64> for Rotation {
    fn from(degrees: i64) -> Self {
        Rotation::from_degrees(degrees)
    }
}

impl From<Rotation> for i64 {
    fn from(rotation: Rotation) -> Self {
        rotation.0 as i64
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.0)
    }
}
