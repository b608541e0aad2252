//! Burn annotations into page content.
//!
//! The existing content of each touched page is wrapped in `q`/`Q` so the
//! appended drawing starts from the default graphics state. Annotation
//! coordinates are top-left based and get flipped against the MediaBox.

use super::model::*;
use crate::constants::*;
use crate::page_tree::{inherited_attribute, page_dimensions, page_origin};
use crate::types::*;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use std::collections::BTreeMap;

/// Draw `annotations` into `pdf` and return the new document bytes.
///
/// `page_index` is zero-based. An annotation on a page the document does not
/// have is an error; nothing is written in that case.
pub fn flatten_annotations(pdf: &[u8], annotations: &[Annotation]) -> Result<Vec<u8>> {
    if annotations.is_empty() {
        return Ok(pdf.to_vec());
    }

    let mut doc = Document::load_mem(pdf)?;
    let pages = doc.get_pages();

    let mut by_page: BTreeMap<usize, Vec<&Annotation>> = BTreeMap::new();
    for annotation in annotations {
        by_page
            .entry(annotation.page_index)
            .or_default()
            .push(annotation);
    }
    let mut targets = Vec::with_capacity(by_page.len());
    for (index, page_annotations) in by_page {
        let page_id = u32::try_from(index)
            .ok()
            .and_then(|i| i.checked_add(1))
            .and_then(|number| pages.get(&number))
            .ok_or(AssembleError::IndexOutOfBounds {
                index,
                len: pages.len(),
            })?;
        targets.push((index, *page_id, page_annotations));
    }

    for (index, page_id, page_annotations) in targets {
        flatten_page(&mut doc, page_id, &page_annotations)?;
        log::debug!(
            "Flattened {} annotations onto page {}",
            page_annotations.len(),
            index + 1
        );
    }

    doc.compress();
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

/// Resources added to one page while drawing
#[derive(Default)]
struct PageResources {
    fonts: Vec<(String, &'static str)>,
    images: Vec<(String, ObjectId)>,
}

impl PageResources {
    fn font(&mut self, base_font: &'static str) -> String {
        if let Some((name, _)) = self.fonts.iter().find(|(_, f)| *f == base_font) {
            return name.clone();
        }
        let name = format!("AnnF{}", self.fonts.len() + 1);
        self.fonts.push((name.clone(), base_font));
        name
    }

    fn image(&mut self, id: ObjectId) -> String {
        let name = format!("AnnIm{}", self.images.len() + 1);
        self.images.push((name.clone(), id));
        name
    }
}

fn flatten_page(doc: &mut Document, page_id: ObjectId, annotations: &[&Annotation]) -> Result<()> {
    let (_, page_height) = page_dimensions(doc, page_id);
    let (origin_x, origin_y) = page_origin(doc, page_id);
    let top = origin_y + page_height;

    let mut resources = PageResources::default();
    let mut ops = Vec::new();

    for annotation in annotations {
        let left = origin_x + annotation.x;
        let bottom = top - annotation.y - annotation.height();
        let (width, height) = (annotation.width(), annotation.height());

        ops.push(Operation::new("q", vec![]));
        if annotation.rotation.rem_euclid(360.0) != 0.0 {
            let center = (left + width / 2.0, bottom + height / 2.0);
            ops.push(rotation_about(center, annotation.rotation));
        }

        match &annotation.kind {
            AnnotationKind::Text { text, style, .. } => {
                let font = resources.font(standard_font(&style.font_family, style.bold, style.italic));
                text_ops(&mut ops, text, style, &font, left, top - annotation.y, width);
            }
            AnnotationKind::Signature { image_data, .. } => {
                let image_id = embed_png_data_uri(doc, image_data)?;
                let name = resources.image(image_id);
                ops.push(Operation::new(
                    "cm",
                    vec![
                        width.into(),
                        0.into(),
                        0.into(),
                        height.into(),
                        left.into(),
                        bottom.into(),
                    ],
                ));
                ops.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
            }
            AnnotationKind::Shape { shape, size } => {
                shape_ops(&mut ops, *shape, *size, left, top - annotation.y);
            }
        }
        ops.push(Operation::new("Q", vec![]));
    }

    let content = Content { operations: ops }.encode()?;
    add_resources(doc, page_id, &resources)?;
    wrap_and_append_content(doc, page_id, content)
}

/// `cm` rotating clockwise (as seen on screen) by `degrees` about `center`.
fn rotation_about((cx, cy): (f32, f32), degrees: f32) -> Operation {
    // clockwise on a y-down screen is negative in PDF space
    let radians = (-degrees).to_radians();
    let (sin, cos) = radians.sin_cos();
    Operation::new(
        "cm",
        vec![
            cos.into(),
            sin.into(),
            (-sin).into(),
            cos.into(),
            (cx - cos * cx + sin * cy).into(),
            (cy - sin * cx - cos * cy).into(),
        ],
    )
}

fn text_ops(
    ops: &mut Vec<Operation>,
    text: &str,
    style: &TextStyle,
    font: &str,
    left: f32,
    box_top: f32,
    box_width: f32,
) {
    let (r, g, b) = style.color.as_unit();
    let size = style.font_size;
    let line_height = size * LINE_HEIGHT_FACTOR;

    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "Tf",
        vec![Object::Name(font.as_bytes().to_vec()), size.into()],
    ));
    ops.push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));

    for (i, line) in text.lines().enumerate() {
        let line_width = line.chars().count() as f32 * size * HELVETICA_CHAR_WIDTH_RATIO;
        let x = match style.align {
            TextAlign::Left => left,
            TextAlign::Center => left + (box_width - line_width) / 2.0,
            TextAlign::Right => left + box_width - line_width,
        };
        let baseline = box_top - size - i as f32 * line_height;
        ops.push(Operation::new(
            "Tm",
            vec![1.into(), 0.into(), 0.into(), 1.into(), x.into(), baseline.into()],
        ));
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(win_ansi(line), StringFormat::Literal)],
        ));
    }
    ops.push(Operation::new("ET", vec![]));
}

/// Check and cross marks drawn inside a `size` square whose top-left is
/// `(left, box_top)` in PDF space.
fn shape_ops(ops: &mut Vec<Operation>, shape: ShapeKind, size: f32, left: f32, box_top: f32) {
    let (r, g, b) = match shape {
        ShapeKind::Check => CHECK_COLOR,
        ShapeKind::Cross => CROSS_COLOR,
    };
    ops.push(Operation::new("RG", vec![r.into(), g.into(), b.into()]));
    ops.push(Operation::new("w", vec![SHAPE_STROKE_WIDTH.into()]));
    ops.push(Operation::new("J", vec![1.into()]));

    let bottom = box_top - size;
    let mut line = |from: (f32, f32), to: (f32, f32)| {
        ops.push(Operation::new("m", vec![from.0.into(), from.1.into()]));
        ops.push(Operation::new("l", vec![to.0.into(), to.1.into()]));
        ops.push(Operation::new("S", vec![]));
    };
    match shape {
        ShapeKind::Check => {
            let elbow = (left + size * 0.3, bottom);
            line((left, box_top - size * 0.5), elbow);
            line(elbow, (left + size, box_top));
        }
        ShapeKind::Cross => {
            line((left, box_top), (left + size, bottom));
            line((left + size, box_top), (left, bottom));
        }
    }
}

/// Map a UI font family to one of the standard 14 fonts.
pub fn standard_font(family: &str, bold: bool, italic: bool) -> &'static str {
    let lower = family.to_lowercase();
    let serif = lower.contains("times") || lower.contains("georgia") || lower == "serif";
    let mono = lower.contains("courier") || lower.contains("mono");

    if serif {
        match (bold, italic) {
            (true, true) => "Times-BoldItalic",
            (true, false) => "Times-Bold",
            (false, true) => "Times-Italic",
            (false, false) => "Times-Roman",
        }
    } else if mono {
        match (bold, italic) {
            (true, true) => "Courier-BoldOblique",
            (true, false) => "Courier-Bold",
            (false, true) => "Courier-Oblique",
            (false, false) => "Courier",
        }
    } else {
        match (bold, italic) {
            (true, true) => "Helvetica-BoldOblique",
            (true, false) => "Helvetica-Bold",
            (false, true) => "Helvetica-Oblique",
            (false, false) => "Helvetica",
        }
    }
}

/// Encode for the standard fonts' WinAnsi encoding; anything outside
/// Latin-1 becomes `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            code @ 0x20..=0xFF => code as u8,
            _ => b'?',
        })
        .collect()
}

/// Decode a `data:image/...;base64,` URI (or bare base64) and add it as an
/// image XObject with a soft mask for alpha.
fn embed_png_data_uri(doc: &mut Document, data: &str) -> Result<ObjectId> {
    let encoded = match data.find("base64,") {
        Some(pos) => &data[pos + "base64,".len()..],
        None => data,
    };
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| AssembleError::Config(format!("invalid signature image data: {e}")))?;
    let image = image::load_from_memory(&bytes)?.to_rgba8();
    let (width, height) = image.dimensions();

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in image.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }

    let image_dict = |color_space: &str| {
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => Object::Name(color_space.as_bytes().to_vec()),
            "BitsPerComponent" => 8,
        }
    };
    let mask_id = doc.add_object(Stream::new(image_dict("DeviceGray"), alpha));
    let mut dict = image_dict("DeviceRGB");
    dict.set("SMask", Object::Reference(mask_id));
    Ok(doc.add_object(Stream::new(dict, rgb)))
}

/// Give the page its own Resources (resolving inheritance) with the added
/// fonts and images merged in.
fn add_resources(doc: &mut Document, page_id: ObjectId, added: &PageResources) -> Result<()> {
    let mut resources = inherited_attribute(doc, page_id, b"Resources")
        .and_then(|obj| resolve_dictionary(doc, obj))
        .unwrap_or_default();

    if !added.fonts.is_empty() {
        let mut fonts = resources
            .get(b"Font")
            .ok()
            .and_then(|obj| resolve_dictionary(doc, obj))
            .unwrap_or_default();
        for (name, base_font) in &added.fonts {
            fonts.set(
                name.as_bytes().to_vec(),
                dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
                    "Encoding" => "WinAnsiEncoding",
                },
            );
        }
        resources.set("Font", fonts);
    }

    if !added.images.is_empty() {
        let mut xobjects = resources
            .get(b"XObject")
            .ok()
            .and_then(|obj| resolve_dictionary(doc, obj))
            .unwrap_or_default();
        for (name, id) in &added.images {
            xobjects.set(name.as_bytes().to_vec(), Object::Reference(*id));
        }
        resources.set("XObject", xobjects);
    }

    doc.get_dictionary_mut(page_id)?.set("Resources", resources);
    Ok(())
}

fn resolve_dictionary(doc: &Document, obj: &Object) -> Option<Dictionary> {
    match obj {
        Object::Reference(id) => doc.get_dictionary(*id).ok().cloned(),
        Object::Dictionary(dict) => Some(dict.clone()),
        _ => None,
    }
}

fn wrap_and_append_content(doc: &mut Document, page_id: ObjectId, content: Vec<u8>) -> Result<()> {
    let existing = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let open = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let mut closing = b"\nQ\n".to_vec();
    closing.extend_from_slice(&content);
    let close = doc.add_object(Stream::new(Dictionary::new(), closing));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open));
    contents.extend(existing);
    contents.push(Object::Reference(close));
    doc.get_dictionary_mut(page_id)?.set("Contents", contents);
    Ok(())
}
