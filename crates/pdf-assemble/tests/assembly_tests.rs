use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use pdf_assemble::page_tree::intrinsic_rotation;
use pdf_assemble::*;
use pdf_normalize::{NormalizeOptions, Upload, normalize};
use pretty_assertions::assert_eq;
use std::io::Cursor;

/// Helper to create a test PDF whose pages show their own number
fn create_test_pdf(num_pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for n in 1..=num_pages {
        let content = format!("BT /F1 12 Tf 72 720 Td (page {n}) Tj ET");
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => Dictionary::new(),
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => num_pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn png_bytes() -> Vec<u8> {
    let image = image::RgbImage::from_pixel(20, 10, image::Rgb([200, 30, 30]));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Normalize an upload and add it the way an upload batch does
fn add_upload(collection: &mut Collection, name: &str, mime: &str, bytes: Vec<u8>) -> DocumentId {
    let normalized = normalize(&Upload::new(name, mime, bytes), &NormalizeOptions::default()).unwrap();
    let pages = pdf_normalize::page_count(&normalized.bytes).unwrap();
    collection.add_document(normalized.name, normalized.bytes, PageSeed::range(pages as u32))
}

fn page_texts(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|id| String::from_utf8_lossy(&doc.get_page_content(*id).unwrap()).into_owned())
        .collect()
}

#[test]
fn pdf_and_png_scenario() {
    let mut collection = Collection::new();
    let a = add_upload(&mut collection, "a.pdf", "application/pdf", create_test_pdf(2));
    let b = add_upload(&mut collection, "b.png", "image/png", png_bytes());
    assert_eq!(collection.page_count(), 3);

    let a_pages = collection.document(a).unwrap().pages().to_vec();
    let b_pages = collection.document(b).unwrap().pages().to_vec();
    assert_eq!(
        collection.assembly_order(),
        &[a_pages[0], a_pages[1], b_pages[0]]
    );

    // drag b.png's card onto a.pdf
    let mut drag = FileDragSession::begin(&collection, b).unwrap();
    drag.hover(a);
    drag.drop_on(a, &mut collection).unwrap();
    assert_eq!(
        collection.assembly_order(),
        &[b_pages[0], a_pages[0], a_pages[1]]
    );

    assert_eq!(collection.rotate_page(a_pages[0]).unwrap(), Rotation::CW_90);
    let copy = collection.duplicate_page(a_pages[1]).unwrap();
    assert_eq!(
        collection.assembly_order(),
        &[b_pages[0], a_pages[0], a_pages[1], copy]
    );

    let compiled = compile_collection(&collection).unwrap();
    assert_eq!(compiled.report.page_count, 4);
    assert_eq!(compiled.report.document_count, 2);

    let doc = Document::load_mem(&compiled.bytes).unwrap();
    let rotations: Vec<u16> = doc
        .get_pages()
        .values()
        .map(|id| intrinsic_rotation(&doc, *id).degrees())
        .collect();
    assert_eq!(rotations, vec![0, 90, 0, 0]);

    let texts = page_texts(&compiled.bytes);
    assert!(texts[1].contains("(page 1)"));
    assert!(texts[2].contains("(page 2)"));
    assert!(texts[3].contains("(page 2)"));
}

#[test]
fn duplicate_survives_deleting_original() {
    let mut collection = Collection::new();
    collection.add_document("a.pdf", create_test_pdf(2), PageSeed::range(2));
    let original = collection.assembly_order()[1];
    let before = page_texts(&compile_collection(&collection).unwrap().bytes)[1].clone();

    let copy = collection.duplicate_page(original).unwrap();
    collection.remove_page(original).unwrap();
    assert_eq!(collection.assembly_order()[1], copy);

    let after = page_texts(&compile_collection(&collection).unwrap().bytes);
    assert_eq!(after.len(), 2);
    assert_eq!(after[1], before);
}

#[test]
fn removing_a_document_drops_its_pages_from_output() {
    let mut collection = Collection::new();
    let a = collection.add_document("a.pdf", create_test_pdf(2), PageSeed::range(2));
    collection.add_document("b.pdf", create_test_pdf(3), PageSeed::range(3));

    let removed = collection.remove_document(a).unwrap();
    assert_eq!(removed.name, "a.pdf");
    assert_eq!(collection.total_input_bytes(), create_test_pdf(3).len());

    let compiled = compile_collection(&collection).unwrap();
    assert_eq!(compiled.report.page_count, 3);
}

#[test]
fn snapshot_with_removed_document_skips_its_pages() {
    let mut collection = Collection::new();
    let a = collection.add_document("a.pdf", create_test_pdf(1), PageSeed::range(1));
    collection.add_document("b.pdf", create_test_pdf(1), PageSeed::range(1));

    let mut snapshot = CompileInput::from_collection(&collection);
    // the document goes away while the compile is queued
    collection.remove_document(a).unwrap();
    snapshot.documents.retain(|(id, _)| *id != a);

    let compiled = compile(&snapshot).unwrap();
    assert_eq!(compiled.report.page_count, 1);
    assert_eq!(compiled.skipped.len(), 1);
}

#[test]
fn plan_ops_drive_the_same_model() {
    let mut collection = Collection::new();
    collection.add_document("a.pdf", create_test_pdf(2), PageSeed::range(2));
    collection.add_document("b.pdf", create_test_pdf(1), PageSeed::range(1));

    reorder::apply_all(
        &[
            EditOp::RotateAll,
            EditOp::RotateDocument { document: 1 },
            EditOp::RemovePage { page: 0 },
        ],
        &mut collection,
    )
    .unwrap();

    let rotations: Vec<u16> = collection
        .pages_in_order()
        .map(|p| p.rotation.degrees())
        .collect();
    assert_eq!(rotations, vec![90, 180]);
    assert!(collection.check_invariants().is_ok());
}

#[tokio::test]
async fn async_compile_matches_sync() {
    let mut collection = Collection::new();
    collection.add_document("a.pdf", create_test_pdf(3), PageSeed::range(3));
    collection.move_page(2, 0).unwrap();

    let snapshot = CompileInput::from_collection(&collection);
    let sync = compile(&snapshot).unwrap();
    let async_result = compile_async(snapshot).await.unwrap();
    assert_eq!(page_texts(&sync.bytes), page_texts(&async_result.bytes));
    assert_eq!(async_result.revision, collection.revision());
}

#[tokio::test]
async fn placeholder_thumbnails_seed_pages() {
    let pdf: std::sync::Arc<[u8]> = create_test_pdf(2).into();
    let batch = thumbnail::thumbnail_document(
        std::sync::Arc::new(PlaceholderRasterizer),
        pdf.clone(),
        0.4,
    )
    .await
    .unwrap();
    assert!(batch.failures.is_empty());

    let mut collection = Collection::new();
    collection.add_document("a.pdf", pdf, batch.pages);
    assert!(collection.pages_needing_thumbnails().is_empty());

    let first = collection.assembly_order()[0];
    collection.rotate_page(first).unwrap();
    assert_eq!(collection.pages_needing_thumbnails(), vec![first]);
}
