use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use pdf_async_runtime::*;
use std::io::Cursor;
use std::time::Duration;
use tokio::sync::mpsc;

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

struct Harness {
    commands: mpsc::UnboundedSender<PdfCommand>,
    updates: mpsc::UnboundedReceiver<PdfUpdate>,
}

impl Harness {
    fn start() -> Self {
        let options = AssemblyOptions {
            debounce_ms: 20,
            ..Default::default()
        };
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (update_tx, updates) = mpsc::unbounded_channel();
        tokio::spawn(worker_task(
            AssemblySession::with_placeholders(options),
            command_rx,
            update_tx,
        ));
        Self { commands, updates }
    }

    fn send(&self, cmd: PdfCommand) {
        self.commands.send(cmd).unwrap();
    }

    async fn next(&mut self) -> PdfUpdate {
        tokio::time::timeout(Duration::from_secs(30), self.updates.recv())
            .await
            .expect("worker timed out")
            .expect("worker stopped")
    }

    /// Skip updates until `pick` returns something.
    async fn wait_for<T>(&mut self, mut pick: impl FnMut(&PdfUpdate) -> Option<T>) -> T {
        loop {
            let update = self.next().await;
            if let Some(found) = pick(&update) {
                return found;
            }
        }
    }
}

fn page_count(bytes: &[u8]) -> usize {
    Document::load_mem(bytes).unwrap().get_pages().len()
}

#[tokio::test]
async fn upload_edit_preview_and_download() {
    let mut harness = Harness::start();
    harness.send(PdfCommand::Upload {
        uploads: vec![
            Upload::new("a.pdf", "application/pdf", create_test_pdf(2)),
            Upload::new("deck.pptx", "", vec![0; 32]),
            Upload::new("b.png", "image/png", png_bytes()),
        ],
    });

    let mut notices = Vec::new();
    let (added, skipped) = harness
        .wait_for(|update| match update {
            PdfUpdate::Notice(notice) => {
                notices.push(notice.clone());
                None
            }
            PdfUpdate::UploadComplete { added, skipped } => Some((added.clone(), *skipped)),
            _ => None,
        })
        .await;
    assert_eq!(added.len(), 2);
    assert_eq!(skipped, 1);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, NoticeKind::UnsupportedFormat);
    assert!(notices[0].message.contains("deck.pptx"));

    harness.send(PdfCommand::Edit {
        op: EditOp::MoveDocument { from: 1, to: 0 },
    });
    harness.send(PdfCommand::Edit {
        op: EditOp::RotatePage { page: 1 },
    });
    harness.send(PdfCommand::Edit {
        op: EditOp::DuplicatePage { page: 2 },
    });

    // upload plus three edits
    let mut last_revision = 0;
    let mut changes = 0;
    while changes < 4 {
        if let PdfUpdate::OrderChanged { revision, order } = harness.next().await {
            changes += 1;
            last_revision = revision;
            if changes == 4 {
                assert_eq!(order.len(), 4);
            }
        }
    }

    let (path, pages) = harness
        .wait_for(|update| match update {
            PdfUpdate::PreviewReady {
                revision,
                path,
                page_count,
            } if *revision == last_revision => Some((path.clone(), *page_count)),
            _ => None,
        })
        .await;
    assert_eq!(pages, 4);
    let preview = tokio::fs::read(&path).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    harness.send(PdfCommand::Download {
        dir: dir.path().to_path_buf(),
    });
    let downloaded = harness
        .wait_for(|update| match update {
            PdfUpdate::Downloaded { path } => Some(path.clone()),
            _ => None,
        })
        .await;
    assert_eq!(downloaded, dir.path().join("merged.pdf"));
    let bytes = tokio::fs::read(&downloaded).await.unwrap();
    assert_eq!(bytes, preview);
    assert_eq!(page_count(&bytes), 4);
}

#[tokio::test]
async fn rejected_edit_reports_an_error() {
    let mut harness = Harness::start();
    harness.send(PdfCommand::Edit {
        op: EditOp::RotatePage { page: 3 },
    });
    let message = harness
        .wait_for(|update| match update {
            PdfUpdate::Error { message } => Some(message.clone()),
            _ => None,
        })
        .await;
    assert!(message.contains("out of bounds"), "{message}");
}

#[tokio::test]
async fn queued_renders_collapse_to_the_latest() {
    let mut harness = Harness::start();
    harness.send(PdfCommand::Upload {
        uploads: vec![Upload::new("a.pdf", "application/pdf", create_test_pdf(1))],
    });
    let page = harness
        .wait_for(|update| match update {
            PdfUpdate::OrderChanged { order, .. } => Some(order[0]),
            _ => None,
        })
        .await;

    harness.send(PdfCommand::RenderPage { page, scale: 0.5 });
    harness.send(PdfCommand::RenderPage { page, scale: 1.0 });
    let width = harness
        .wait_for(|update| match update {
            PdfUpdate::PageRendered { width, .. } => Some(*width),
            _ => None,
        })
        .await;
    assert_eq!(width, 612);

    // nothing else is rendered
    let extra = tokio::time::timeout(Duration::from_millis(300), async {
        harness
            .wait_for(|update| match update {
                PdfUpdate::PageRendered { .. } => Some(()),
                _ => None,
            })
            .await
    })
    .await;
    assert!(extra.is_err());
}

#[tokio::test]
async fn download_before_any_preview_fails() {
    let mut harness = Harness::start();
    let dir = tempfile::tempdir().unwrap();
    harness.send(PdfCommand::Download {
        dir: dir.path().to_path_buf(),
    });
    let message = harness
        .wait_for(|update| match update {
            PdfUpdate::Error { message } => Some(message.clone()),
            _ => None,
        })
        .await;
    assert!(message.contains("No preview"));
}

#[tokio::test]
async fn export_burns_annotations_into_the_output() {
    use pdf_assemble::annotation::{AnnotationKind, AnnotationStore, ShapeKind};

    let mut harness = Harness::start();
    harness.send(PdfCommand::Upload {
        uploads: vec![Upload::new("a.pdf", "application/pdf", create_test_pdf(2))],
    });
    harness
        .wait_for(|update| match update {
            PdfUpdate::UploadComplete { .. } => Some(()),
            _ => None,
        })
        .await;

    let mut store = AnnotationStore::new();
    store.add(
        1,
        100.0,
        100.0,
        AnnotationKind::Shape {
            shape: ShapeKind::Check,
            size: 12.0,
        },
    );
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("signed.pdf");
    harness.send(PdfCommand::ExportAnnotated {
        annotations: store.all().to_vec(),
        path: path.clone(),
    });
    let pages = harness
        .wait_for(|update| match update {
            PdfUpdate::Exported { page_count, .. } => Some(*page_count),
            _ => None,
        })
        .await;
    assert_eq!(pages, 2);

    let doc = Document::load_mem(&tokio::fs::read(&path).await.unwrap()).unwrap();
    let second = *doc.get_pages().get(&2).unwrap();
    let content = String::from_utf8_lossy(&doc.get_page_content(second).unwrap()).into_owned();
    assert!(content.contains("RG"));
}
