//! File kind detection from the declared MIME type, with an extension fallback
//! for uploads whose browser or OS did not provide one.

use crate::types::FileKind;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_PPT: &str = "application/vnd.ms-powerpoint";

pub fn detect_kind(name: &str, mime: &str) -> FileKind {
    let mime = mime.trim().to_ascii_lowercase();
    if mime.is_empty() || mime == "application/octet-stream" {
        return kind_from_extension(name);
    }

    match mime.as_str() {
        MIME_PDF => FileKind::Pdf,
        "image/jpeg" | "image/jpg" | "image/pjpeg" => FileKind::Jpeg,
        "image/png" => FileKind::Png,
        MIME_DOCX => FileKind::Word,
        MIME_XLSX => FileKind::Spreadsheet,
        MIME_PPTX | MIME_PPT => FileKind::Presentation,
        m if m.starts_with("image/") => FileKind::OtherImage,
        _ => FileKind::Unsupported,
    }
}

/// Guess a MIME type from the file name, for callers that only have a path.
pub fn mime_from_extension(name: &str) -> &'static str {
    match kind_from_extension(name) {
        FileKind::Pdf => MIME_PDF,
        FileKind::Jpeg => "image/jpeg",
        FileKind::Png => "image/png",
        FileKind::OtherImage => match extension(name).as_deref() {
            Some("gif") => "image/gif",
            Some("bmp") => "image/bmp",
            Some("webp") => "image/webp",
            Some("tif") | Some("tiff") => "image/tiff",
            _ => "image/*",
        },
        FileKind::Word => MIME_DOCX,
        FileKind::Spreadsheet => MIME_XLSX,
        FileKind::Presentation => MIME_PPTX,
        FileKind::Unsupported => "application/octet-stream",
    }
}

fn kind_from_extension(name: &str) -> FileKind {
    match extension(name).as_deref() {
        Some("pdf") => FileKind::Pdf,
        Some("jpg") | Some("jpeg") => FileKind::Jpeg,
        Some("png") => FileKind::Png,
        Some("gif") | Some("bmp") | Some("webp") | Some("tif") | Some("tiff") => {
            FileKind::OtherImage
        }
        Some("docx") => FileKind::Word,
        Some("xlsx") => FileKind::Spreadsheet,
        Some("ppt") | Some("pptx") => FileKind::Presentation,
        _ => FileKind::Unsupported,
    }
}

fn extension(name: &str) -> Option<String> {
    std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Replace the final extension of `name` with `.pdf`.
pub fn pdf_file_name(name: &str) -> String {
    let stem = match name.rfind('.') {
        Some(dot) if dot > 0 && !name[dot..].contains('/') => &name[..dot],
        _ => name,
    };
    format!("{stem}.pdf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_takes_precedence() {
        assert_eq!(detect_kind("scan.bin", "image/png"), FileKind::Png);
        assert_eq!(detect_kind("a.pdf", MIME_PDF), FileKind::Pdf);
        assert_eq!(detect_kind("photo.webp", "image/webp"), FileKind::OtherImage);
        assert_eq!(detect_kind("deck.pptx", MIME_PPTX), FileKind::Presentation);
        assert_eq!(detect_kind("notes.txt", "text/plain"), FileKind::Unsupported);
    }

    #[test]
    fn extension_fallback_for_missing_mime() {
        assert_eq!(detect_kind("Report.DOCX", ""), FileKind::Word);
        assert_eq!(
            detect_kind("book.xlsx", "application/octet-stream"),
            FileKind::Spreadsheet
        );
        assert_eq!(detect_kind("slides.ppt", ""), FileKind::Presentation);
        assert_eq!(detect_kind("README", ""), FileKind::Unsupported);
    }

    #[test]
    fn pdf_name_replaces_last_extension() {
        assert_eq!(pdf_file_name("b.png"), "b.pdf");
        assert_eq!(pdf_file_name("my.report.docx"), "my.report.pdf");
        assert_eq!(pdf_file_name("noext"), "noext.pdf");
    }
}
