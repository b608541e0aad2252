//! Drag sessions and positional edit operations over a [`Collection`]
//!
//! File-level and page-level dragging are separate session types so the
//! state of one can never be read as the other.

use crate::collection::Collection;
use crate::types::*;

// =============================================================================
// File drag
// =============================================================================

/// A file card being dragged over the file list.
///
/// Dropping reorders documents, which rebuilds the whole assembly order from
/// the document groupings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileDragSession {
    pub dragged: DocumentId,
    pub over: Option<DocumentId>,
}

impl FileDragSession {
    pub fn begin(collection: &Collection, dragged: DocumentId) -> Result<Self> {
        collection
            .document_index(dragged)
            .ok_or(AssembleError::DocumentNotFound(dragged))?;
        Ok(Self {
            dragged,
            over: None,
        })
    }

    pub fn hover(&mut self, target: DocumentId) {
        self.over = Some(target);
    }

    /// Move the dragged document into `target`'s slot.
    pub fn drop_on(self, target: DocumentId, collection: &mut Collection) -> Result<()> {
        if target == self.dragged {
            return Ok(());
        }
        let from = collection
            .document_index(self.dragged)
            .ok_or(AssembleError::DocumentNotFound(self.dragged))?;
        let to = collection
            .document_index(target)
            .ok_or(AssembleError::DocumentNotFound(target))?;
        log::debug!("Moving {} from {} to {}", self.dragged, from, to);
        collection.move_document(from, to)
    }

    pub fn cancel(self) {}
}

// =============================================================================
// Page drag
// =============================================================================

/// A page thumbnail being dragged within the assembly order.
///
/// Only the order changes; document groupings are left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDragSession {
    pub dragged_index: usize,
    pub over_index: Option<usize>,
}

impl PageDragSession {
    pub fn begin(collection: &Collection, dragged_index: usize) -> Result<Self> {
        let len = collection.page_count();
        if dragged_index >= len {
            return Err(AssembleError::IndexOutOfBounds {
                index: dragged_index,
                len,
            });
        }
        Ok(Self {
            dragged_index,
            over_index: None,
        })
    }

    pub fn hover(&mut self, index: usize) {
        self.over_index = Some(index);
    }

    pub fn drop_at(self, index: usize, collection: &mut Collection) -> Result<()> {
        if index == self.dragged_index {
            return Ok(());
        }
        collection.move_page(self.dragged_index, index)
    }

    pub fn cancel(self) {}
}

// =============================================================================
// Edit operations
// =============================================================================

/// One user edit, addressed by position so it can be written down ahead of
/// time (plan files) or sent across a channel.
///
/// `page` indexes the assembly order and `document` the document list, both
/// as they stand when the op is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "op", rename_all = "snake_case"))]
pub enum EditOp {
    MovePage { from: usize, to: usize },
    MoveDocument { from: usize, to: usize },
    RotatePage { page: usize },
    RotateDocument { document: usize },
    RotateAll,
    DuplicatePage { page: usize },
    RemovePage { page: usize },
    RemovePages { pages: Vec<usize> },
    RemoveDocument { document: usize },
}

impl EditOp {
    pub fn apply(&self, collection: &mut Collection) -> Result<()> {
        match self {
            EditOp::MovePage { from, to } => collection.move_page(*from, *to),
            EditOp::MoveDocument { from, to } => collection.move_document(*from, *to),
            EditOp::RotatePage { page } => {
                let id = page_at(collection, *page)?;
                collection.rotate_page(id).map(|_| ())
            }
            EditOp::RotateDocument { document } => {
                let id = document_at(collection, *document)?;
                collection.rotate_document(id)
            }
            EditOp::RotateAll => {
                collection.rotate_all();
                Ok(())
            }
            EditOp::DuplicatePage { page } => {
                let id = page_at(collection, *page)?;
                collection.duplicate_page(id).map(|_| ())
            }
            EditOp::RemovePage { page } => {
                let id = page_at(collection, *page)?;
                collection.remove_page(id).map(|_| ())
            }
            EditOp::RemovePages { pages } => {
                let ids = pages
                    .iter()
                    .map(|index| page_at(collection, *index))
                    .collect::<Result<Vec<_>>>()?;
                collection.remove_pages(&ids).map(|_| ())
            }
            EditOp::RemoveDocument { document } => {
                let id = document_at(collection, *document)?;
                collection.remove_document(id).map(|_| ())
            }
        }
    }
}

/// Apply ops in sequence, stopping at the first failure.
pub fn apply_all(ops: &[EditOp], collection: &mut Collection) -> Result<()> {
    for op in ops {
        op.apply(collection)?;
    }
    Ok(())
}

fn page_at(collection: &Collection, index: usize) -> Result<PageId> {
    let order = collection.assembly_order();
    order
        .get(index)
        .copied()
        .ok_or(AssembleError::IndexOutOfBounds {
            index,
            len: order.len(),
        })
}

fn document_at(collection: &Collection, index: usize) -> Result<DocumentId> {
    let documents = collection.documents();
    documents
        .get(index)
        .map(|d| d.id)
        .ok_or(AssembleError::IndexOutOfBounds {
            index,
            len: documents.len(),
        })
}
