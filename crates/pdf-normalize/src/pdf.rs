use crate::layout::TextPage;
use crate::options::TextLayout;
use crate::types::*;
use printpdf::*;

/// Render laid-out pages with the built-in Helvetica font.
pub fn render_text_pages(title: &str, pages: &[TextPage], layout: &TextLayout) -> Vec<u8> {
    let mut doc = PdfDocument::new(title);

    let width = Mm::from(Pt(layout.page_width_pt));
    let height = Mm::from(Pt(layout.page_height_pt));

    doc.pages = pages
        .iter()
        .map(|page| {
            let mut ops = Vec::with_capacity(page.lines.len() * 5);
            for line in page.lines.iter().filter(|l| !l.text.is_empty()) {
                ops.push(Op::StartTextSection);
                ops.push(Op::SetTextCursor {
                    pos: Point {
                        x: Pt(line.x),
                        y: Pt(line.y),
                    },
                });
                ops.push(Op::SetFontSizeBuiltinFont {
                    font: BuiltinFont::Helvetica,
                    size: Pt(line.size),
                });
                ops.push(Op::WriteTextBuiltinFont {
                    items: vec![TextItem::Text(line.text.clone())],
                    font: BuiltinFont::Helvetica,
                });
                ops.push(Op::EndTextSection);
            }
            PdfPage::new(width, height, ops)
        })
        .collect();

    let mut warnings = Vec::new();
    let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
    if !warnings.is_empty() {
        log::debug!("{} warning(s) while writing {}", warnings.len(), title);
    }
    bytes
}

/// Number of pages in a PDF, used to sanity-check generated output.
pub fn page_count(bytes: &[u8]) -> Result<usize> {
    Ok(lopdf::Document::load_mem(bytes)?.get_pages().len())
}
