//! Merge compiler
//!
//! Produces a single PDF whose page *i* is a copy of the page referenced by
//! the *i*-th assembly entry, with the user's rotation composed onto the
//! page's own `/Rotate`. Works on a [`CompileInput`] snapshot so it can run
//! on the blocking pool while the collection keeps changing.

use crate::collection::Collection;
use crate::page_tree::{INHERITABLE_KEYS, copy_object_deep, inherited_attribute, intrinsic_rotation};
use crate::types::*;
use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One output page as seen at snapshot time
#[derive(Debug, Clone, PartialEq)]
pub struct CompilePage {
    pub page_id: PageId,
    pub document: DocumentId,
    pub source_page: u32,
    pub rotation: Rotation,
}

/// Everything the compiler needs, detached from the live collection
#[derive(Debug, Clone, Default)]
pub struct CompileInput {
    pub pages: Vec<CompilePage>,
    pub documents: Vec<(DocumentId, Arc<[u8]>)>,
    /// Collection revision the snapshot was taken at
    pub revision: u64,
}

impl CompileInput {
    pub fn from_collection(collection: &Collection) -> Self {
        Self {
            pages: collection
                .pages_in_order()
                .map(|p| CompilePage {
                    page_id: p.id,
                    document: p.document,
                    source_page: p.source_page,
                    rotation: p.rotation,
                })
                .collect(),
            documents: collection
                .documents()
                .iter()
                .map(|d| (d.id, d.raw.clone()))
                .collect(),
            revision: collection.revision(),
        }
    }
}

/// A page that was left out of the output
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPage {
    pub page_id: PageId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompileReport {
    /// Combined size of all source documents
    pub input_bytes: usize,
    pub output_bytes: usize,
    pub document_count: usize,
    pub page_count: usize,
}

#[derive(Debug, Clone)]
pub struct CompiledPdf {
    pub bytes: Vec<u8>,
    pub report: CompileReport,
    pub skipped: Vec<SkippedPage>,
    pub revision: u64,
}

struct LoadedSource {
    doc: Document,
    page_ids: BTreeMap<u32, ObjectId>,
    cache: HashMap<ObjectId, ObjectId>,
}

/// Compile the current state of a collection.
pub fn compile_collection(collection: &Collection) -> Result<CompiledPdf> {
    compile(&CompileInput::from_collection(collection))
}

/// Async wrapper running [`compile`] on the blocking pool.
pub async fn compile_async(input: CompileInput) -> Result<CompiledPdf> {
    tokio::task::spawn_blocking(move || compile(&input)).await?
}

pub fn compile(input: &CompileInput) -> Result<CompiledPdf> {
    if input.pages.is_empty() {
        return Err(AssembleError::NoPages);
    }

    let raw_by_id: HashMap<DocumentId, &Arc<[u8]>> =
        input.documents.iter().map(|(id, raw)| (*id, raw)).collect();

    let mut output = Document::with_version("1.7");
    let pages_id = output.new_object_id();
    let mut sources: HashMap<DocumentId, Option<LoadedSource>> = HashMap::new();
    let mut kids = Vec::with_capacity(input.pages.len());
    let mut skipped = Vec::new();

    for page in &input.pages {
        let Some(raw) = raw_by_id.get(&page.document) else {
            skipped.push(SkippedPage {
                page_id: page.page_id,
                reason: format!("{} is no longer available", page.document),
            });
            continue;
        };

        let source = sources
            .entry(page.document)
            .or_insert_with(|| match Document::load_mem(raw) {
                Ok(doc) => Some(LoadedSource {
                    page_ids: doc.get_pages(),
                    doc,
                    cache: HashMap::new(),
                }),
                Err(e) => {
                    log::warn!("Could not parse {}: {}", page.document, e);
                    None
                }
            });
        let Some(source) = source.as_mut() else {
            skipped.push(SkippedPage {
                page_id: page.page_id,
                reason: format!("{} could not be parsed", page.document),
            });
            continue;
        };
        let Some(&source_page_id) = source.page_ids.get(&page.source_page) else {
            skipped.push(SkippedPage {
                page_id: page.page_id,
                reason: format!(
                    "{} has no page {}",
                    page.document, page.source_page
                ),
            });
            continue;
        };

        match copy_page(
            &mut output,
            &source.doc,
            source_page_id,
            &mut source.cache,
            pages_id,
            page.rotation,
        ) {
            Ok(new_id) => kids.push(Object::Reference(new_id)),
            Err(e) => {
                log::warn!("Skipping {}: {}", page.page_id, e);
                skipped.push(SkippedPage {
                    page_id: page.page_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    if kids.is_empty() {
        return Err(AssembleError::CompileFailure(
            "Could not merge any pages".to_string(),
        ));
    }

    let page_count = kids.len();
    output.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );
    let catalog_id = output.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    output.trailer.set("Root", catalog_id);
    output.compress();

    let mut bytes = Vec::new();
    output.save_to(&mut bytes)?;

    let report = CompileReport {
        input_bytes: input.documents.iter().map(|(_, raw)| raw.len()).sum(),
        output_bytes: bytes.len(),
        document_count: input.documents.len(),
        page_count,
    };
    log::info!(
        "Merged {} pages from {} documents ({} skipped)",
        report.page_count,
        report.document_count,
        skipped.len()
    );

    Ok(CompiledPdf {
        bytes,
        report,
        skipped,
        revision: input.revision,
    })
}

/// Copy one page into `output` under `parent`, resolving inherited
/// attributes and composing `rotation` onto the page's own.
fn copy_page(
    output: &mut Document,
    source: &Document,
    page_id: ObjectId,
    cache: &mut HashMap<ObjectId, ObjectId>,
    parent: ObjectId,
    rotation: Rotation,
) -> Result<ObjectId> {
    let page_dict = source.get_dictionary(page_id)?;
    let new_page_id = output.new_object_id();
    // references back to this page (e.g. an annotation's /P) land on the copy
    cache.entry(page_id).or_insert(new_page_id);

    let mut new_dict = Dictionary::new();
    for (key, value) in page_dict.iter() {
        if key.as_slice() == b"Parent" {
            continue;
        }
        new_dict.set(key.clone(), copy_object_deep(output, source, value, cache)?);
    }
    for key in INHERITABLE_KEYS {
        if page_dict.get(key).is_ok() {
            continue;
        }
        if let Some(value) = inherited_attribute(source, page_id, key) {
            let value = value.clone();
            new_dict.set(key.to_vec(), copy_object_deep(output, source, &value, cache)?);
        }
    }

    let total = intrinsic_rotation(source, page_id).compose(rotation);
    new_dict.set("Rotate", Object::Integer(total.degrees() as i64));
    new_dict.set("Parent", Object::Reference(parent));

    output
        .objects
        .insert(new_page_id, Object::Dictionary(new_dict));
    Ok(new_page_id)
}
