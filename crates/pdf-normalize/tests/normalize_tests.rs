use lopdf::{Dictionary, Document, Object, Stream};
use pdf_normalize::*;
use std::io::Write;

fn create_test_pdf(num_pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for _ in 0..num_pages {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), b"q Q".to_vec()));
        let page_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
            ("Resources", Object::Dictionary(Dictionary::new())),
            ("Contents", Object::Reference(content_id)),
        ]));
        kids.push(Object::Reference(page_id));
    }

    let pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Kids", Object::Array(kids)),
        ("Count", Object::Integer(num_pages as i64)),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

#[test]
fn pdf_passes_through_unchanged() {
    let bytes = create_test_pdf(3);
    let upload = Upload::new("a.pdf", "application/pdf", bytes.clone());
    let out = normalize(&upload, &NormalizeOptions::default()).unwrap();

    assert_eq!(out.name, "a.pdf");
    assert_eq!(out.bytes, bytes);
    assert_eq!(page_count(&out.bytes).unwrap(), 3);
}

#[tokio::test]
async fn normalize_file_guesses_type_from_extension() {
    let mut temp = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
    temp.write_all(&create_test_pdf(2)).unwrap();

    let out = normalize_file(temp.path(), &NormalizeOptions::default())
        .await
        .unwrap();
    assert_eq!(out.source_kind, FileKind::Pdf);
    assert_eq!(page_count(&out.bytes).unwrap(), 2);
}

#[tokio::test]
async fn normalize_file_rejects_unknown_extension() {
    let mut temp = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    temp.write_all(b"plain text").unwrap();

    let err = normalize_file(temp.path(), &NormalizeOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_unsupported());
}

#[tokio::test]
async fn options_round_trip_through_json() {
    let temp = tempfile::NamedTempFile::new().unwrap();
    let mut options = NormalizeOptions::default();
    options.document.max_line_chars = 72;

    options.save(temp.path()).await.unwrap();
    let loaded = NormalizeOptions::load(temp.path()).await.unwrap();
    assert_eq!(loaded, options);
}
