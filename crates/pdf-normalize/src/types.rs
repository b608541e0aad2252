use thiserror::Error;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Skipped {name}: {reason}")]
    UnsupportedFormat { name: String, reason: String },
    #[error("{name} is password protected and cannot be opened")]
    Encrypted { name: String },
    #[error("{name} is too large ({size} bytes). Maximum size is {limit} bytes")]
    FileTooLarge { name: String, size: usize, limit: usize },
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Malformed document: {0}")]
    Malformed(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl NormalizeError {
    /// True when the error is a skip notice rather than a processing failure.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, NormalizeError::UnsupportedFormat { .. })
    }
}

pub type Result<T> = std::result::Result<T, NormalizeError>;

/// Detected kind of an uploaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FileKind {
    Pdf,
    Jpeg,
    Png,
    /// Any other raster format; re-encoded as PNG before embedding
    OtherImage,
    /// Word `.docx`
    Word,
    /// Excel `.xlsx`
    Spreadsheet,
    /// PowerPoint `.ppt` / `.pptx`
    Presentation,
    Unsupported,
}

impl FileKind {
    pub fn is_image(self) -> bool {
        matches!(self, FileKind::Jpeg | FileKind::Png | FileKind::OtherImage)
    }
}

/// A file as received from the user
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }
}

/// Result of normalization: a PDF ready to be paged
#[derive(Debug, Clone)]
pub struct NormalizedPdf {
    /// Original file name with its extension replaced by `.pdf`
    pub name: String,
    pub bytes: Vec<u8>,
    pub source_kind: FileKind,
}
