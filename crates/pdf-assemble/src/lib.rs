//! Page-level assembly of normalized PDFs.
//!
//! A [`Collection`] holds the uploaded documents and the order their pages
//! appear in the output. Edits go through the collection (directly, through
//! a drag session, or as an [`EditOp`]); [`compile`] turns a snapshot of it
//! into one merged PDF.

pub mod annotation;
mod collection;
pub mod compile;
pub mod constants;
pub mod io;
mod options;
pub mod page_tree;
pub mod reorder;
pub mod thumbnail;
mod types;

pub use collection::{Collection, PageRef, PageSeed, SourceDocument};
pub use compile::{
    CompileInput, CompileReport, CompiledPdf, SkippedPage, compile, compile_async,
    compile_collection,
};
pub use options::*;
pub use reorder::{EditOp, FileDragSession, PageDragSession};
pub use thumbnail::{PageRasterizer, PlaceholderRasterizer, Thumbnail, ThumbnailBatch};
pub use types::*;
