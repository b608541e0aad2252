//! Page-level helpers over lopdf documents
//!
//! Attribute inheritance through the page tree, page geometry, and deep
//! copying of objects between documents.

use crate::constants::DEFAULT_PAGE_DIMENSIONS;
use crate::types::{Result, Rotation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;

/// Page attributes a page may inherit from its ancestors in the page tree
pub const INHERITABLE_KEYS: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Guard against malformed trees whose Parent links form a cycle
const MAX_TREE_DEPTH: usize = 64;

// =============================================================================
// Inheritance
// =============================================================================

/// Look up `key` on the page, then on each ancestor until found.
///
/// The returned object is as stored, so it may itself be a reference.
pub fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Follow a reference to the object it names, or return the object itself.
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// The page's own `/Rotate`, inherited if necessary.
pub fn intrinsic_rotation(doc: &Document, page_id: ObjectId) -> Rotation {
    inherited_attribute(doc, page_id, b"Rotate")
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_i64().ok())
        .map(Rotation::from_degrees)
        .unwrap_or_default()
}

// =============================================================================
// Page Dimensions
// =============================================================================

/// Unrotated page size (width, height) in points, taken from the MediaBox.
pub fn page_dimensions(doc: &Document, page_id: ObjectId) -> (f32, f32) {
    inherited_attribute(doc, page_id, b"MediaBox")
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_array().ok())
        .and_then(|mb| {
            if mb.len() < 4 {
                return None;
            }
            let x0 = extract_number(doc, &mb[0])?;
            let y0 = extract_number(doc, &mb[1])?;
            let x1 = extract_number(doc, &mb[2])?;
            let y1 = extract_number(doc, &mb[3])?;
            Some(((x1 - x0).abs(), (y1 - y0).abs()))
        })
        .unwrap_or(DEFAULT_PAGE_DIMENSIONS)
}

/// Lower-left corner of the MediaBox (usually the origin).
pub fn page_origin(doc: &Document, page_id: ObjectId) -> (f32, f32) {
    inherited_attribute(doc, page_id, b"MediaBox")
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_array().ok())
        .and_then(|mb| {
            let x0 = extract_number(doc, mb.first()?)?;
            let y0 = extract_number(doc, mb.get(1)?)?;
            let x1 = extract_number(doc, mb.get(2)?)?;
            let y1 = extract_number(doc, mb.get(3)?)?;
            Some((x0.min(x1), y0.min(y1)))
        })
        .unwrap_or((0.0, 0.0))
}

/// Extract numeric value from a PDF object
fn extract_number(doc: &Document, obj: &Object) -> Option<f32> {
    match resolve(doc, obj)? {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

// =============================================================================
// Deep Copy
// =============================================================================

/// Deep copy an object from source to output document, following references.
///
/// The cache maps source ids to output ids; the output id is reserved before
/// recursing so reference cycles terminate. `/Parent` links of page-tree
/// nodes are not followed, which keeps a single page from dragging in its
/// whole source tree.
pub fn copy_object_deep(
    output: &mut Document,
    source: &Document,
    obj: &Object,
    cache: &mut HashMap<ObjectId, ObjectId>,
) -> Result<Object> {
    match obj {
        Object::Reference(id) => {
            if let Some(&new_id) = cache.get(id) {
                return Ok(Object::Reference(new_id));
            }

            let referenced = match source.get_object(*id) {
                Ok(referenced) => referenced,
                // dangling references become null, as readers treat them
                Err(_) => return Ok(Object::Null),
            };

            let new_id = output.new_object_id();
            cache.insert(*id, new_id);
            let copied = copy_object_deep(output, source, referenced, cache)?;
            output.objects.insert(new_id, copied);

            Ok(Object::Reference(new_id))
        }
        Object::Dictionary(dict) => Ok(Object::Dictionary(copy_dictionary(
            output, source, dict, cache,
        )?)),
        Object::Array(arr) => {
            let new_arr: Result<Vec<_>> = arr
                .iter()
                .map(|item| copy_object_deep(output, source, item, cache))
                .collect();
            Ok(Object::Array(new_arr?))
        }
        Object::Stream(stream) => {
            let new_dict = copy_dictionary(output, source, &stream.dict, cache)?;
            Ok(Object::Stream(Stream {
                dict: new_dict,
                content: stream.content.clone(),
                allows_compression: stream.allows_compression,
                start_position: None,
            }))
        }
        // Primitive types: just clone
        _ => Ok(obj.clone()),
    }
}

fn copy_dictionary(
    output: &mut Document,
    source: &Document,
    dict: &Dictionary,
    cache: &mut HashMap<ObjectId, ObjectId>,
) -> Result<Dictionary> {
    let is_tree_node = dict
        .get(b"Type")
        .and_then(Object::as_name)
        .map(|name| name == b"Page" || name == b"Pages")
        .unwrap_or(false);

    let mut new_dict = Dictionary::new();
    for (key, value) in dict.iter() {
        if is_tree_node && key.as_slice() == b"Parent" {
            continue;
        }
        new_dict.set(key.clone(), copy_object_deep(output, source, value, cache)?);
    }
    Ok(new_dict)
}
