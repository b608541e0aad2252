//! Documents, pages and their output order.
//!
//! [`Collection`] is the only owner of this state. Every mutation validates
//! its arguments first and leaves the collection untouched on error.
//!
//! Two orderings coexist:
//! - the assembly order, a flat list of page ids that decides output order;
//! - each document's page grouping, which keeps the pages of one source
//!   together. It starts in source order, duplicates are placed after their
//!   original and removed pages drop out.
//!
//! Moving a document rebuilds the assembly order from the groupings, so any
//! page-level reordering across documents is discarded at that point.

use crate::thumbnail::Thumbnail;
use crate::types::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A normalized upload. Pages refer to it by id; its bytes are never copied.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub id: DocumentId,
    pub name: String,
    pub raw: Arc<[u8]>,
    pages: Vec<PageId>,
}

impl SourceDocument {
    /// Live pages of this document in grouping order
    pub fn pages(&self) -> &[PageId] {
        &self.pages
    }

    pub fn size_bytes(&self) -> usize {
        self.raw.len()
    }
}

/// One entry in the assembly: a page of a source document plus the user's
/// rotation on top of the page's own.
#[derive(Debug, Clone)]
pub struct PageRef {
    pub id: PageId,
    pub document: DocumentId,
    /// 1-based page number in the source document
    pub source_page: u32,
    pub rotation: Rotation,
    pub thumbnail: Option<Thumbnail>,
}

impl PageRef {
    /// True when there is no thumbnail or it was drawn at another rotation.
    pub fn needs_thumbnail(&self) -> bool {
        self.thumbnail
            .as_ref()
            .map(|t| t.rotation != self.rotation)
            .unwrap_or(true)
    }
}

/// A page to create when a document is added
#[derive(Debug, Clone)]
pub struct PageSeed {
    pub source_page: u32,
    pub thumbnail: Option<Thumbnail>,
}

impl PageSeed {
    /// Seeds for pages `1..=count` without thumbnails.
    pub fn range(count: u32) -> Vec<PageSeed> {
        (1..=count)
            .map(|source_page| PageSeed {
                source_page,
                thumbnail: None,
            })
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct Collection {
    documents: Vec<SourceDocument>,
    pages: HashMap<PageId, PageRef>,
    order: Vec<PageId>,
    next_document: u64,
    next_page: u64,
    revision: u64,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn documents(&self) -> &[SourceDocument] {
        &self.documents
    }

    pub fn document(&self, id: DocumentId) -> Option<&SourceDocument> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn document_index(&self, id: DocumentId) -> Option<usize> {
        self.documents.iter().position(|d| d.id == id)
    }

    pub fn page(&self, id: PageId) -> Option<&PageRef> {
        self.pages.get(&id)
    }

    /// Output order
    pub fn assembly_order(&self) -> &[PageId] {
        &self.order
    }

    pub fn pages_in_order(&self) -> impl Iterator<Item = &PageRef> {
        self.order.iter().filter_map(|id| self.pages.get(id))
    }

    pub fn page_count(&self) -> usize {
        self.order.len()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn total_input_bytes(&self) -> usize {
        self.documents.iter().map(SourceDocument::size_bytes).sum()
    }

    /// Bumped by every successful mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Pages whose thumbnail is missing or stale
    pub fn pages_needing_thumbnails(&self) -> Vec<PageId> {
        self.pages_in_order()
            .filter(|p| p.needs_thumbnail())
            .map(|p| p.id)
            .collect()
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Append a document and its pages to the end of the assembly.
    pub fn add_document(
        &mut self,
        name: impl Into<String>,
        raw: impl Into<Arc<[u8]>>,
        seeds: Vec<PageSeed>,
    ) -> DocumentId {
        let id = DocumentId(self.next_document);
        self.next_document += 1;

        let mut page_ids = Vec::with_capacity(seeds.len());
        for seed in seeds {
            let page_id = self.allocate_page_id();
            self.pages.insert(
                page_id,
                PageRef {
                    id: page_id,
                    document: id,
                    source_page: seed.source_page,
                    rotation: Rotation::NONE,
                    thumbnail: seed.thumbnail,
                },
            );
            page_ids.push(page_id);
        }

        self.order.extend_from_slice(&page_ids);
        self.documents.push(SourceDocument {
            id,
            name: name.into(),
            raw: raw.into(),
            pages: page_ids,
        });
        self.touch();
        id
    }

    /// Remove a document and every page that references it.
    ///
    /// The returned document holds the last reference to its bytes unless a
    /// compile snapshot is still using them.
    pub fn remove_document(&mut self, id: DocumentId) -> Result<SourceDocument> {
        let index = self
            .document_index(id)
            .ok_or(AssembleError::DocumentNotFound(id))?;

        let document = self.documents.remove(index);
        self.pages.retain(|_, page| page.document != id);
        self.order.retain(|page_id| self.pages.contains_key(page_id));
        self.touch();
        Ok(document)
    }

    /// Move the document at `from` to position `to` and rebuild the assembly
    /// order from the document groupings.
    pub fn move_document(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.documents.len();
        check_index(from, len)?;
        check_index(to, len)?;

        let document = self.documents.remove(from);
        self.documents.insert(to, document);
        self.order = self
            .documents
            .iter()
            .flat_map(|d| d.pages.iter().copied())
            .collect();
        self.touch();
        Ok(())
    }

    /// Rotate every live page of a document a quarter turn clockwise.
    pub fn rotate_document(&mut self, id: DocumentId) -> Result<()> {
        let index = self
            .document_index(id)
            .ok_or(AssembleError::DocumentNotFound(id))?;
        let page_ids = self.documents[index].pages.clone();
        for page_id in page_ids {
            if let Some(page) = self.pages.get_mut(&page_id) {
                page.rotation = page.rotation.rotated_cw();
            }
        }
        self.touch();
        Ok(())
    }

    // =========================================================================
    // Pages
    // =========================================================================

    /// Rotate one page a quarter turn clockwise and return its new rotation.
    pub fn rotate_page(&mut self, id: PageId) -> Result<Rotation> {
        let page = self.pages.get_mut(&id).ok_or(AssembleError::PageNotFound(id))?;
        page.rotation = page.rotation.rotated_cw();
        let rotation = page.rotation;
        self.touch();
        Ok(rotation)
    }

    /// Rotate every page a quarter turn clockwise.
    pub fn rotate_all(&mut self) {
        for page in self.pages.values_mut() {
            page.rotation = page.rotation.rotated_cw();
        }
        self.touch();
    }

    /// Insert a copy of `id` right after it. The copy keeps the rotation and
    /// thumbnail but gets a fresh id; source bytes are shared.
    pub fn duplicate_page(&mut self, id: PageId) -> Result<PageId> {
        let original = self
            .pages
            .get(&id)
            .cloned()
            .ok_or(AssembleError::PageNotFound(id))?;
        let order_index = self.order_position(id)?;

        let copy_id = self.allocate_page_id();
        let document = original.document;
        self.pages.insert(
            copy_id,
            PageRef {
                id: copy_id,
                ..original
            },
        );
        self.order.insert(order_index + 1, copy_id);

        if let Some(doc) = self.documents.iter_mut().find(|d| d.id == document) {
            let group_index = doc
                .pages
                .iter()
                .position(|p| *p == id)
                .map(|i| i + 1)
                .unwrap_or(doc.pages.len());
            doc.pages.insert(group_index, copy_id);
        }
        self.touch();
        Ok(copy_id)
    }

    /// Move the page at assembly position `from` to position `to`.
    ///
    /// `to` indexes the order after the page has been taken out, which is the
    /// same as its final position.
    pub fn move_page(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.order.len();
        check_index(from, len)?;
        check_index(to, len)?;

        let page = self.order.remove(from);
        self.order.insert(to, page);
        self.touch();
        Ok(())
    }

    /// Remove a single page from the assembly and its document grouping.
    pub fn remove_page(&mut self, id: PageId) -> Result<PageRef> {
        let order_index = self.order_position(id)?;
        self.order.remove(order_index);
        let page = self
            .pages
            .remove(&id)
            .ok_or(AssembleError::PageNotFound(id))?;
        if let Some(doc) = self.documents.iter_mut().find(|d| d.id == page.document) {
            doc.pages.retain(|p| *p != id);
        }
        self.touch();
        Ok(page)
    }

    /// Remove several pages at once. Refuses to empty the assembly.
    pub fn remove_pages(&mut self, ids: &[PageId]) -> Result<Vec<PageRef>> {
        let unique: HashSet<PageId> = ids.iter().copied().collect();
        if let Some(missing) = unique.iter().find(|id| !self.pages.contains_key(id)) {
            return Err(AssembleError::PageNotFound(*missing));
        }
        if !self.order.is_empty() && unique.len() >= self.order.len() {
            return Err(AssembleError::CannotRemoveAllPages);
        }

        self.order.retain(|id| !unique.contains(id));
        for doc in &mut self.documents {
            doc.pages.retain(|id| !unique.contains(id));
        }
        let removed = ids
            .iter()
            .filter_map(|id| self.pages.remove(id))
            .collect();
        self.touch();
        Ok(removed)
    }

    /// Attach a freshly rendered thumbnail. Does not count as a mutation of
    /// the assembly, so the revision is unchanged.
    pub fn set_thumbnail(&mut self, id: PageId, thumbnail: Thumbnail) -> Result<()> {
        let page = self.pages.get_mut(&id).ok_or(AssembleError::PageNotFound(id))?;
        page.thumbnail = Some(thumbnail);
        Ok(())
    }

    // =========================================================================
    // Invariants
    // =========================================================================

    /// Verify the structural invariants. Used by tests and debug builds.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        if self.order.len() != self.pages.len() {
            return Err(format!(
                "order has {} entries but {} pages are live",
                self.order.len(),
                self.pages.len()
            ));
        }
        let mut seen = HashSet::new();
        for id in &self.order {
            if !seen.insert(*id) {
                return Err(format!("{id} appears twice in the assembly order"));
            }
            let page = self
                .pages
                .get(id)
                .ok_or_else(|| format!("{id} in order but not live"))?;
            if self.document(page.document).is_none() {
                return Err(format!("{id} references missing {}", page.document));
            }
            if page.rotation.degrees() % 90 != 0 || page.rotation.degrees() >= 360 {
                return Err(format!("{id} has invalid rotation {}", page.rotation));
            }
        }
        let grouped: usize = self.documents.iter().map(|d| d.pages.len()).sum();
        if grouped != self.pages.len() {
            return Err(format!(
                "groupings hold {grouped} pages but {} are live",
                self.pages.len()
            ));
        }
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn allocate_page_id(&mut self) -> PageId {
        let id = PageId(self.next_page);
        self.next_page += 1;
        id
    }

    fn order_position(&self, id: PageId) -> Result<usize> {
        self.order
            .iter()
            .position(|p| *p == id)
            .ok_or(AssembleError::PageNotFound(id))
    }

    fn touch(&mut self) {
        self.revision += 1;
        debug_assert!(self.check_invariants().is_ok(), "{:?}", self.check_invariants());
    }
}

fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(AssembleError::IndexOutOfBounds { index, len })
    }
}
