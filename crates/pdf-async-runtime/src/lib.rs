//! Async side of an assembly session: the upload pipeline, the debounced
//! preview, cancellable page renders, and a command worker tying them
//! together behind a pair of channels.

use std::path::PathBuf;
use thiserror::Error;

pub mod debounce;
mod latest;
mod notice;
pub mod preview;
pub mod scheduler;
mod session;
mod worker;

pub use debounce::Debouncer;
pub use latest::LatestOnly;
pub use notice::{Notice, NoticeKind};
pub use preview::{PreviewResource, PreviewSlot};
pub use scheduler::{PreviewEvent, PreviewScheduler};
pub use session::{AssemblySession, PageSource, UploadReport};
pub use worker::worker_task;

// Re-export types from library crates
pub use pdf_assemble::annotation::Annotation;
pub use pdf_assemble::{AssemblyOptions, DocumentId, EditOp, PageId, Thumbnail};
pub use pdf_normalize::Upload;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Assemble(#[from] pdf_assemble::AssembleError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
    #[error("No preview has been published yet")]
    NoPreview,
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Commands sent from UI to worker
#[derive(Debug)]
pub enum PdfCommand {
    Upload {
        uploads: Vec<Upload>,
    },
    UploadFiles {
        paths: Vec<PathBuf>,
    },
    Edit {
        op: EditOp,
    },
    /// Render one page at `scale`. Supersedes any render still in flight.
    RenderPage {
        page: PageId,
        scale: f32,
    },
    /// Compile the preview now instead of waiting out the debounce window
    RefreshPreview,
    /// Save the published preview into `dir` under the configured file name
    Download {
        dir: PathBuf,
    },
    /// Compile the current order, burn `annotations` into it and save it
    ExportAnnotated {
        annotations: Vec<Annotation>,
        path: PathBuf,
    },
    #[cfg(feature = "serde")]
    LoadConfig {
        path: PathBuf,
    },
}

/// Updates sent from worker to UI
#[derive(Debug, Clone)]
pub enum PdfUpdate {
    Progress {
        operation: String,
        current: usize,
        total: usize,
    },
    UploadComplete {
        added: Vec<DocumentId>,
        skipped: usize,
    },
    /// The assembly order or a rotation changed
    OrderChanged {
        revision: u64,
        order: Vec<PageId>,
    },
    ThumbnailReady {
        page: PageId,
        thumbnail: Thumbnail,
    },
    PageRendered {
        page: PageId,
        width: u32,
        height: u32,
        rgba_data: Vec<u8>,
    },
    PreviewReady {
        revision: u64,
        path: PathBuf,
        page_count: usize,
    },
    PreviewCleared,
    Downloaded {
        path: PathBuf,
    },
    Exported {
        path: PathBuf,
        page_count: usize,
    },
    ConfigLoaded {
        options: AssemblyOptions,
    },
    /// Non-blocking problem with one item; work carried on
    Notice(Notice),
    /// A single requested operation failed
    Error {
        message: String,
    },
}
