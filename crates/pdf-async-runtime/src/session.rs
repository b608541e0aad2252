//! One editing session: the collection plus the upload pipeline feeding it.
//!
//! Uploads go through normalize → thumbnail → collection one file at a time.
//! A file that fails at any step becomes a [`Notice`] and the batch moves on.

use crate::Result;
use crate::notice::{Notice, NoticeKind};
use pdf_assemble::annotation::{AnnotationOverlay, AnnotationStore};
use pdf_assemble::thumbnail::{render_thumbnail, thumbnail_document};
use pdf_assemble::{
    AssemblyOptions, Collection, CompileInput, DocumentId, EditOp, PageId, PageRasterizer,
    PlaceholderRasterizer, Rotation, Thumbnail,
};
use pdf_normalize::{NormalizedPdf, Upload, normalize_async, normalize_file};
use std::path::PathBuf;
use std::sync::Arc;

/// Outcome of an upload batch
#[derive(Debug, Clone, Default)]
pub struct UploadReport {
    /// Documents added, in upload order
    pub added: Vec<DocumentId>,
    pub notices: Vec<Notice>,
}

impl UploadReport {
    /// Number of files that did not make it into the collection
    pub fn skipped(&self) -> usize {
        self.notices
            .iter()
            .filter(|n| n.kind != NoticeKind::PageRenderFailure)
            .count()
    }
}

/// Everything needed to draw one page at some scale
#[derive(Debug, Clone)]
pub struct PageSource {
    pub page: PageId,
    pub pdf: Arc<[u8]>,
    pub source_page: u32,
    pub rotation: Rotation,
}

pub struct AssemblySession {
    collection: Collection,
    options: AssemblyOptions,
    rasterizer: Arc<dyn PageRasterizer>,
}

impl AssemblySession {
    pub fn new(options: AssemblyOptions, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        Self {
            collection: Collection::new(),
            options,
            rasterizer,
        }
    }

    /// Session whose thumbnails are blank page cards
    pub fn with_placeholders(options: AssemblyOptions) -> Self {
        Self::new(options, Arc::new(PlaceholderRasterizer))
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn options(&self) -> &AssemblyOptions {
        &self.options
    }

    /// Replace the options after validating them.
    pub fn set_options(&mut self, options: AssemblyOptions) -> Result<()> {
        options.validate()?;
        self.options = options;
        Ok(())
    }

    pub fn rasterizer(&self) -> Arc<dyn PageRasterizer> {
        self.rasterizer.clone()
    }

    /// Annotation editor for a page view, using the session's hover timeout
    pub fn annotation_overlay(&self, store: AnnotationStore) -> AnnotationOverlay {
        AnnotationOverlay::with_options(store, &self.options)
    }

    /// Snapshot for the compiler
    pub fn snapshot(&self) -> CompileInput {
        CompileInput::from_collection(&self.collection)
    }

    /// Apply one edit. Failures are returned, not turned into notices.
    pub fn apply(&mut self, op: &EditOp) -> Result<()> {
        op.apply(&mut self.collection)?;
        Ok(())
    }

    /// Add in-memory uploads. `progress` is called with (done, total) after
    /// each file.
    pub async fn upload<F>(&mut self, uploads: Vec<Upload>, mut progress: F) -> UploadReport
    where
        F: FnMut(usize, usize),
    {
        let total = uploads.len();
        let mut report = UploadReport::default();
        for (i, upload) in uploads.into_iter().enumerate() {
            let name = upload.name.clone();
            match normalize_async(upload, self.options.normalize.clone()).await {
                Ok(normalized) => self.add_normalized(normalized, &mut report).await,
                Err(e) => report.notices.push(Notice::from_normalize_error(&name, &e)),
            }
            progress(i + 1, total);
        }
        log_report(&report);
        report
    }

    /// Add files from disk, reading each one only when its turn comes.
    pub async fn upload_files<F>(&mut self, paths: &[PathBuf], mut progress: F) -> UploadReport
    where
        F: FnMut(usize, usize),
    {
        let mut report = UploadReport::default();
        for (i, path) in paths.iter().enumerate() {
            match normalize_file(path, &self.options.normalize).await {
                Ok(normalized) => self.add_normalized(normalized, &mut report).await,
                Err(e) => {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string());
                    report.notices.push(Notice::from_normalize_error(&name, &e));
                }
            }
            progress(i + 1, paths.len());
        }
        log_report(&report);
        report
    }

    async fn add_normalized(&mut self, normalized: NormalizedPdf, report: &mut UploadReport) {
        let NormalizedPdf { name, bytes, .. } = normalized;
        let pdf: Arc<[u8]> = bytes.into();
        let batch = match thumbnail_document(
            self.rasterizer.clone(),
            pdf.clone(),
            self.options.thumbnail_scale,
        )
        .await
        {
            Ok(batch) => batch,
            Err(e) => {
                report.notices.push(Notice::warning(
                    NoticeKind::UnsupportedFormat,
                    format!("Skipped {}: {}", name, e),
                ));
                return;
            }
        };

        for failure in &batch.failures {
            report.notices.push(Notice::warning(
                NoticeKind::PageRenderFailure,
                format!(
                    "Page {} of {} could not be rendered: {}",
                    failure.page_number, name, failure.message
                ),
            ));
        }
        if batch.pages.is_empty() {
            report.notices.push(Notice::warning(
                NoticeKind::UnsupportedFormat,
                format!("Skipped {}: no pages could be rendered", name),
            ));
            return;
        }

        let id = self.collection.add_document(name, pdf, batch.pages);
        report.added.push(id);
    }

    /// Where to find the content of `page`.
    pub fn page_source(&self, page: PageId) -> Result<PageSource> {
        let page_ref = self
            .collection
            .page(page)
            .ok_or(pdf_assemble::AssembleError::PageNotFound(page))?;
        let document = self
            .collection
            .document(page_ref.document)
            .ok_or(pdf_assemble::AssembleError::DocumentNotFound(page_ref.document))?;
        Ok(PageSource {
            page,
            pdf: document.raw.clone(),
            source_page: page_ref.source_page,
            rotation: page_ref.rotation,
        })
    }

    /// Re-render thumbnails that no longer match their page's rotation.
    ///
    /// Pages that fail keep their old thumbnail and produce a notice.
    pub async fn refresh_thumbnails(&mut self) -> (Vec<(PageId, Thumbnail)>, Vec<Notice>) {
        let mut updated = Vec::new();
        let mut notices = Vec::new();
        for page in self.collection.pages_needing_thumbnails() {
            let source = match self.page_source(page) {
                Ok(source) => source,
                Err(e) => {
                    log::debug!("Page vanished before its thumbnail was drawn: {}", e);
                    continue;
                }
            };
            let rendered = render_thumbnail(
                self.rasterizer.clone(),
                source.pdf,
                source.source_page,
                self.options.thumbnail_scale,
                source.rotation,
            )
            .await;
            match rendered.and_then(|t| {
                self.collection.set_thumbnail(page, t.clone())?;
                Ok(t)
            }) {
                Ok(thumbnail) => updated.push((page, thumbnail)),
                Err(e) => notices.push(Notice::warning(
                    NoticeKind::PageRenderFailure,
                    format!("Thumbnail for {} could not be rendered: {}", page, e),
                )),
            }
            tokio::task::yield_now().await;
        }
        (updated, notices)
    }
}

fn log_report(report: &UploadReport) {
    for notice in &report.notices {
        notice.log();
    }
    log::info!(
        "Upload finished: {} added, {} skipped",
        report.added.len(),
        report.skipped()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use pdf_assemble::AssembleError;

    fn png_bytes() -> Vec<u8> {
        let image = image::RgbImage::from_pixel(8, 8, image::Rgb([0, 0, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        image.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    struct FailingRasterizer;

    impl PageRasterizer for FailingRasterizer {
        fn render_page(
            &self,
            _pdf: &[u8],
            page_number: u32,
            _scale: f32,
            _rotation: Rotation,
        ) -> pdf_assemble::Result<RgbaImage> {
            Err(AssembleError::PageRender {
                page: page_number,
                message: "no renderer".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn presentation_is_skipped_and_the_rest_continue() {
        let mut session = AssemblySession::with_placeholders(AssemblyOptions::default());
        let mut calls = Vec::new();
        let report = session
            .upload(
                vec![
                    Upload::new("deck.pptx", "", vec![1, 2, 3]),
                    Upload::new("b.png", "image/png", png_bytes()),
                ],
                |done, total| calls.push((done, total)),
            )
            .await;

        assert_eq!(report.added.len(), 1);
        assert_eq!(report.notices.len(), 1);
        assert_eq!(report.notices[0].kind, NoticeKind::UnsupportedFormat);
        assert!(report.notices[0].message.contains("deck.pptx"));
        assert_eq!(calls, vec![(1, 2), (2, 2)]);
        assert_eq!(session.collection().page_count(), 1);
        assert_eq!(session.collection().documents()[0].name, "b.pdf");
    }

    #[tokio::test]
    async fn document_with_no_renderable_pages_is_not_added() {
        let mut session =
            AssemblySession::new(AssemblyOptions::default(), Arc::new(FailingRasterizer));
        let report = session
            .upload(vec![Upload::new("b.png", "image/png", png_bytes())], |_, _| {})
            .await;

        assert!(report.added.is_empty());
        let kinds: Vec<_> = report.notices.iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![NoticeKind::PageRenderFailure, NoticeKind::UnsupportedFormat]
        );
        assert!(session.collection().is_empty());
    }

    #[tokio::test]
    async fn rotation_triggers_one_thumbnail_refresh() {
        let mut session = AssemblySession::with_placeholders(AssemblyOptions::default());
        session
            .upload(vec![Upload::new("b.png", "image/png", png_bytes())], |_, _| {})
            .await;
        let page = session.collection().assembly_order()[0];
        let before = session.collection().page(page).unwrap().thumbnail.clone().unwrap();

        session.apply(&EditOp::RotatePage { page: 0 }).unwrap();
        let (updated, notices) = session.refresh_thumbnails().await;
        assert!(notices.is_empty());
        assert_eq!(updated.len(), 1);
        let after = &updated[0].1;
        assert_eq!(after.rotation, Rotation::CW_90);
        assert_eq!((after.width, after.height), (before.height, before.width));

        let (again, _) = session.refresh_thumbnails().await;
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn missing_file_becomes_a_notice() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = AssemblySession::with_placeholders(AssemblyOptions::default());
        let report = session
            .upload_files(&[dir.path().join("gone.pdf")], |_, _| {})
            .await;
        assert!(report.added.is_empty());
        assert!(report.notices[0].message.contains("gone.pdf"));
    }

    #[test]
    fn invalid_options_are_rejected() {
        let mut session = AssemblySession::with_placeholders(AssemblyOptions::default());
        let options = AssemblyOptions {
            output_file_name: "merged.txt".to_string(),
            ..Default::default()
        };
        assert!(session.set_options(options).is_err());
        assert_eq!(session.options().output_file_name, "merged.pdf");
    }

    #[test]
    fn overlay_uses_session_hover_timeout() {
        use pdf_assemble::annotation::{AnnotationKind, ShapeKind};
        use std::time::{Duration, Instant};

        let session = AssemblySession::with_placeholders(AssemblyOptions {
            hover_timeout_ms: 200,
            ..Default::default()
        });
        let mut store = AnnotationStore::new();
        let id = store.add(
            0,
            10.0,
            10.0,
            AnnotationKind::Shape {
                shape: ShapeKind::Check,
                size: 12.0,
            },
        );
        let mut overlay = session.annotation_overlay(store);

        let t0 = Instant::now();
        overlay.hover(id, t0).unwrap();
        assert!(overlay.handles_visible(id, t0 + Duration::from_millis(100)));
        assert!(!overlay.handles_visible(id, t0 + Duration::from_millis(300)));
    }
}
