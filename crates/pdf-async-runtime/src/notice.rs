use log::Level;
use pdf_assemble::AssembleError;
use pdf_normalize::NormalizeError;
use std::fmt;

/// What kind of trouble a [`Notice`] reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    /// An upload that could not be turned into pages; the file was skipped
    UnsupportedFormat,
    /// One page failed to render; the rest of the document carries on
    PageRenderFailure,
    /// A merge pass failed; the last good preview stays up
    CompileFailure,
    /// An upload too large to handle
    ResourceExhaustion,
}

/// A user-visible, non-blocking message about one item of a batch or one
/// background pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub level: Level,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, level: Level, message: impl Into<String>) -> Self {
        Self {
            kind,
            level,
            message: message.into(),
        }
    }

    pub fn warning(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self::new(kind, Level::Warn, message)
    }

    pub fn error(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self::new(kind, Level::Error, message)
    }

    /// Notice for an upload named `name` that failed to normalize.
    pub fn from_normalize_error(name: &str, error: &NormalizeError) -> Self {
        match error {
            NormalizeError::UnsupportedFormat { .. } | NormalizeError::Encrypted { .. } => {
                Self::warning(NoticeKind::UnsupportedFormat, error.to_string())
            }
            NormalizeError::FileTooLarge { .. } => {
                Self::warning(NoticeKind::ResourceExhaustion, error.to_string())
            }
            other => Self::warning(
                NoticeKind::UnsupportedFormat,
                format!("Skipped {}: {}", name, other),
            ),
        }
    }

    /// Notice for a failed merge pass.
    pub fn compile_failed(error: &AssembleError) -> Self {
        Self::error(
            NoticeKind::CompileFailure,
            format!("Preview could not be updated: {}", error),
        )
    }

    /// Emit through the `log` facade at this notice's level.
    pub fn log(&self) {
        log::log!(self.level, "{}", self.message);
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}
