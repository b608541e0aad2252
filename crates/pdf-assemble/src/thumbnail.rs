//! Page thumbnails
//!
//! Pages are rendered one after another at a low scale and handed out as PNG
//! data URIs. A page that fails to render is skipped and reported; the rest of
//! the document carries on.

use crate::collection::PageSeed;
use crate::page_tree::{intrinsic_rotation, page_dimensions};
use crate::types::*;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, Rgba, RgbaImage};
use lopdf::{Document, ObjectId};
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

/// Encoded thumbnail of one page, rendered at `rotation`
#[derive(Clone, PartialEq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub png: Arc<[u8]>,
    pub rotation: Rotation,
}

impl Thumbnail {
    pub fn from_image(image: &RgbaImage, rotation: Rotation) -> Result<Self> {
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png)?;
        Ok(Self {
            width: image.width(),
            height: image.height(),
            png: out.into_inner().into(),
            rotation,
        })
    }

    /// `data:image/png;base64,...` for inline display
    pub fn data_uri(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }
}

impl fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thumbnail")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("png_bytes", &self.png.len())
            .field("rotation", &self.rotation)
            .finish()
    }
}

/// Rasterizes single pages of a PDF.
///
/// `page_number` is 1-based. `rotation` is applied on top of the page's own
/// `/Rotate`.
pub trait PageRasterizer: Send + Sync {
    fn render_page(
        &self,
        pdf: &[u8],
        page_number: u32,
        scale: f32,
        rotation: Rotation,
    ) -> Result<RgbaImage>;

    /// Rasterize every page in order, unrotated, handing each result to
    /// `sink`. Fails only if the document cannot be opened.
    ///
    /// The default goes through `render_page` one page at a time.
    /// Implementations that can keep a parsed document open should override it.
    fn render_pages(
        &self,
        pdf: &[u8],
        scale: f32,
        sink: &mut dyn FnMut(u32, Result<RgbaImage>),
    ) -> Result<()> {
        for page_number in 1..=count_pages(pdf)? {
            sink(page_number, self.render_page(pdf, page_number, scale, Rotation::NONE));
        }
        Ok(())
    }
}

/// Draws blank page-shaped cards sized from the MediaBox.
///
/// Used where no rendering library is available, and for documents that can
/// be paged but not drawn.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRasterizer;

impl PlaceholderRasterizer {
    fn card(doc: &Document, page_id: ObjectId, scale: f32, rotation: Rotation) -> RgbaImage {
        let (w, h) = page_dimensions(doc, page_id);
        let total = intrinsic_rotation(doc, page_id).compose(rotation);
        let (w, h) = if total.is_sideways() { (h, w) } else { (w, h) };

        let width = ((w * scale).round() as u32).max(1);
        let height = ((h * scale).round() as u32).max(1);
        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        let border = Rgba([200, 200, 200, 255]);
        for x in 0..width {
            image.put_pixel(x, 0, border);
            image.put_pixel(x, height - 1, border);
        }
        for y in 0..height {
            image.put_pixel(0, y, border);
            image.put_pixel(width - 1, y, border);
        }
        image
    }
}

impl PageRasterizer for PlaceholderRasterizer {
    fn render_page(
        &self,
        pdf: &[u8],
        page_number: u32,
        scale: f32,
        rotation: Rotation,
    ) -> Result<RgbaImage> {
        let doc = Document::load_mem(pdf)?;
        let page_id = *doc
            .get_pages()
            .get(&page_number)
            .ok_or_else(|| AssembleError::PageRender {
                page: page_number,
                message: "page does not exist".to_string(),
            })?;
        Ok(Self::card(&doc, page_id, scale, rotation))
    }

    fn render_pages(
        &self,
        pdf: &[u8],
        scale: f32,
        sink: &mut dyn FnMut(u32, Result<RgbaImage>),
    ) -> Result<()> {
        let doc = Document::load_mem(pdf)?;
        for (page_number, page_id) in doc.get_pages() {
            sink(page_number, Ok(Self::card(&doc, page_id, scale, Rotation::NONE)));
        }
        Ok(())
    }
}

/// A page that could not be thumbnailed
#[derive(Debug, Clone, PartialEq)]
pub struct PageRenderFailure {
    pub page_number: u32,
    pub message: String,
}

/// Result of thumbnailing a whole document
#[derive(Debug, Clone, Default)]
pub struct ThumbnailBatch {
    /// Successfully rendered pages, in page order
    pub pages: Vec<PageSeed>,
    pub failures: Vec<PageRenderFailure>,
}

/// Number of pages in a PDF.
pub fn count_pages(pdf: &[u8]) -> Result<u32> {
    Ok(Document::load_mem(pdf)?.get_pages().len() as u32)
}

/// Render one thumbnail on the blocking pool.
pub async fn render_thumbnail(
    rasterizer: Arc<dyn PageRasterizer>,
    pdf: Arc<[u8]>,
    page_number: u32,
    scale: f32,
    rotation: Rotation,
) -> Result<Thumbnail> {
    tokio::task::spawn_blocking(move || {
        let image = rasterizer.render_page(&pdf, page_number, scale, rotation)?;
        Thumbnail::from_image(&image, rotation)
    })
    .await?
}

/// Thumbnail every page of `pdf`, yielding to the runtime between pages.
///
/// The document is opened once on the blocking pool and pages are streamed
/// back as they are drawn. Fails only if the document cannot be opened at all.
pub async fn thumbnail_document(
    rasterizer: Arc<dyn PageRasterizer>,
    pdf: Arc<[u8]>,
    scale: f32,
) -> Result<ThumbnailBatch> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let render = tokio::task::spawn_blocking(move || {
        rasterizer.render_pages(&pdf, scale, &mut |page_number: u32, result: Result<RgbaImage>| {
            let thumbnail = result.and_then(|image| Thumbnail::from_image(&image, Rotation::NONE));
            // receiver only goes away if the caller gave up on the batch
            let _ = tx.send((page_number, thumbnail));
        })
    });

    let mut batch = ThumbnailBatch::default();
    while let Some((page_number, thumbnail)) = rx.recv().await {
        match thumbnail {
            Ok(thumbnail) => batch.pages.push(PageSeed {
                source_page: page_number,
                thumbnail: Some(thumbnail),
            }),
            Err(e) => {
                log::warn!("Skipping thumbnail for page {}: {}", page_number, e);
                batch.failures.push(PageRenderFailure {
                    page_number,
                    message: e.to_string(),
                });
            }
        }
        tokio::task::yield_now().await;
    }
    render.await??;

    Ok(batch)
}

// =============================================================================
// pdfium
// =============================================================================

#[cfg(feature = "pdfium")]
pub use self::pdfium::{PdfiumRasterizer, init_pdfium};

#[cfg(feature = "pdfium")]
mod pdfium {
    use super::*;
    use pdfium_render::prelude::*;

    /// Bind pdfium, preferring a copy under `vendor/pdfium/lib`.
    pub fn init_pdfium() -> std::result::Result<Pdfium, PdfiumError> {
        let vendor_path = std::env::current_dir().ok().and_then(|mut p| {
            p.push("vendor/pdfium/lib");
            if p.exists() { Some(p) } else { None }
        });

        if let Some(vendor_path) = vendor_path {
            if let Ok(binding) =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&vendor_path))
            {
                return Ok(Pdfium::new(binding));
            }
        }

        Pdfium::bind_to_system_library().map(Pdfium::new)
    }

    #[derive(Debug, Clone, Copy, Default)]
    pub struct PdfiumRasterizer;

    fn render_error(page_number: u32) -> impl Fn(PdfiumError) -> AssembleError {
        move |e| AssembleError::PageRender {
            page: page_number,
            message: e.to_string(),
        }
    }

    fn draw(page: &PdfPage, page_number: u32, scale: f32, rotation: Rotation) -> Result<RgbaImage> {
        let render_rotation = match rotation.degrees() {
            90 => PdfPageRenderRotation::Degrees90,
            180 => PdfPageRenderRotation::Degrees180,
            270 => PdfPageRenderRotation::Degrees270,
            _ => PdfPageRenderRotation::None,
        };
        let config = PdfRenderConfig::new()
            .scale_page_by_factor(scale)
            .rotate(render_rotation, true);

        let bitmap = page
            .render_with_config(&config)
            .map_err(render_error(page_number))?;
        let width = bitmap.width() as u32;
        let height = bitmap.height() as u32;
        let rgba = bitmap.as_rgba_bytes().to_vec();

        RgbaImage::from_raw(width, height, rgba).ok_or_else(|| AssembleError::PageRender {
            page: page_number,
            message: "bitmap size mismatch".to_string(),
        })
    }

    impl PageRasterizer for PdfiumRasterizer {
        fn render_page(
            &self,
            pdf: &[u8],
            page_number: u32,
            scale: f32,
            rotation: Rotation,
        ) -> Result<RgbaImage> {
            let pdfium = init_pdfium().map_err(render_error(page_number))?;
            let document = pdfium
                .load_pdf_from_byte_slice(pdf, None)
                .map_err(render_error(page_number))?;
            let index = page_number
                .checked_sub(1)
                .and_then(|i| u16::try_from(i).ok())
                .ok_or_else(|| AssembleError::PageRender {
                    page: page_number,
                    message: "page number out of range".to_string(),
                })?;
            let page = document
                .pages()
                .get(index)
                .map_err(render_error(page_number))?;
            draw(&page, page_number, scale, rotation)
        }

        fn render_pages(
            &self,
            pdf: &[u8],
            scale: f32,
            sink: &mut dyn FnMut(u32, Result<RgbaImage>),
        ) -> Result<()> {
            let pdfium = init_pdfium().map_err(render_error(0))?;
            let document = pdfium
                .load_pdf_from_byte_slice(pdf, None)
                .map_err(render_error(0))?;
            for (i, page) in document.pages().iter().enumerate() {
                let page_number = i as u32 + 1;
                sink(page_number, draw(&page, page_number, scale, Rotation::NONE));
            }
            Ok(())
        }
    }
}
