//! Turn heterogeneous uploads (PDF, raster images, Word, Excel) into PDF bytes.

mod csv;
pub mod detect;
mod docx;
mod raster;
pub mod layout;
mod options;
mod pdf;
mod types;
mod xlsx;

pub use detect::{detect_kind, mime_from_extension, pdf_file_name};
pub use options::*;
pub use pdf::page_count;
pub use types::*;
pub use xlsx::Sheet;

use std::path::Path;

/// Normalize a single upload into a PDF.
///
/// PDFs are passed through byte for byte after checking that they open.
/// Presentations and unknown types fail with
/// [`NormalizeError::UnsupportedFormat`], which callers surface as a skip
/// notice naming the file.
pub fn normalize(upload: &Upload, options: &NormalizeOptions) -> Result<NormalizedPdf> {
    if upload.bytes.len() > options.max_upload_bytes {
        return Err(NormalizeError::FileTooLarge {
            name: upload.name.clone(),
            size: upload.bytes.len(),
            limit: options.max_upload_bytes,
        });
    }

    let kind = detect_kind(&upload.name, &upload.mime);
    log::debug!("Normalizing {} as {:?}", upload.name, kind);

    let bytes = match kind {
        FileKind::Pdf => {
            check_pdf(&upload.name, &upload.bytes)?;
            return Ok(NormalizedPdf {
                name: upload.name.clone(),
                bytes: upload.bytes.clone(),
                source_kind: kind,
            });
        }
        FileKind::Jpeg => raster::jpeg_to_pdf(&upload.bytes)?,
        FileKind::Png => raster::png_to_pdf(&upload.bytes)?,
        FileKind::OtherImage => raster::other_image_to_pdf(&upload.bytes)?,
        FileKind::Word => {
            let text = docx::extract_text(&upload.bytes)?;
            let pages = layout::layout_document(&text, &options.document);
            pdf::render_text_pages(&upload.name, &pages, &options.document)
        }
        FileKind::Spreadsheet => {
            let sheets = xlsx::read_workbook(&upload.bytes)?
                .into_iter()
                .map(|sheet| Ok((sheet.name, csv::rows_to_lines(&sheet.rows)?)))
                .collect::<Result<Vec<_>>>()?;
            let pages = layout::layout_sheets(
                &sheets,
                &options.spreadsheet,
                options.sheet_heading_size_pt,
                options.sheet_heading_gap_pt,
            );
            pdf::render_text_pages(&upload.name, &pages, &options.spreadsheet)
        }
        FileKind::Presentation => {
            return Err(NormalizeError::UnsupportedFormat {
                name: upload.name.clone(),
                reason: "PowerPoint presentations are not supported".to_string(),
            });
        }
        FileKind::Unsupported => {
            return Err(NormalizeError::UnsupportedFormat {
                name: upload.name.clone(),
                reason: format!("unsupported file type '{}'", upload.mime),
            });
        }
    };

    Ok(NormalizedPdf {
        name: pdf_file_name(&upload.name),
        bytes,
        source_kind: kind,
    })
}

/// Async wrapper running [`normalize`] on the blocking pool.
pub async fn normalize_async(upload: Upload, options: NormalizeOptions) -> Result<NormalizedPdf> {
    tokio::task::spawn_blocking(move || normalize(&upload, &options)).await?
}

/// Read a file from disk, guess its MIME from the extension, and normalize it.
pub async fn normalize_file(
    path: impl AsRef<Path>,
    options: &NormalizeOptions,
) -> Result<NormalizedPdf> {
    let path = path.as_ref().to_owned();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let metadata = tokio::fs::metadata(&path).await?;
    if metadata.len() > options.max_upload_bytes as u64 {
        return Err(NormalizeError::FileTooLarge {
            name,
            size: metadata.len() as usize,
            limit: options.max_upload_bytes,
        });
    }

    let bytes = tokio::fs::read(&path).await?;
    let upload = Upload::new(name.clone(), mime_from_extension(&name), bytes);
    normalize_async(upload, options.clone()).await
}

fn check_pdf(name: &str, bytes: &[u8]) -> Result<()> {
    match lopdf::Document::load_mem(bytes) {
        Ok(_) => Ok(()),
        Err(_) if contains(bytes, b"/Encrypt") => Err(NormalizeError::Encrypted {
            name: name.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
