//! Line placement for text rendered from office documents.
//!
//! Lines are placed top to bottom starting one margin below the top edge. A
//! new page starts as soon as the cursor has fallen below the bottom margin.
//! Long lines are truncated, never wrapped.

use crate::options::TextLayout;

/// A single line of text at an absolute baseline position (PDF points,
/// bottom-left origin)
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextPage {
    pub lines: Vec<PlacedLine>,
}

/// Accumulates pages while tracking the write cursor
pub struct Paginator<'a> {
    layout: &'a TextLayout,
    pages: Vec<TextPage>,
    y: f32,
}

impl<'a> Paginator<'a> {
    pub fn new(layout: &'a TextLayout) -> Self {
        Self {
            layout,
            pages: Vec::new(),
            y: layout.top(),
        }
    }

    /// Start a fresh page and reset the cursor.
    pub fn new_page(&mut self) {
        self.pages.push(TextPage::default());
        self.y = self.layout.top();
    }

    /// Place a line at the cursor with an explicit size, then move down by
    /// `advance`.
    pub fn place(&mut self, text: &str, size: f32, advance: f32) {
        if self.pages.is_empty() || self.y < self.layout.margin_pt {
            self.new_page();
        }
        let text = fit_line(text, self.layout.max_line_chars);
        let line = PlacedLine {
            text,
            x: self.layout.margin_pt,
            y: self.y,
            size,
        };
        if let Some(page) = self.pages.last_mut() {
            page.lines.push(line);
        }
        self.y -= advance;
    }

    /// Place a body line using the layout's font size and line height.
    pub fn line(&mut self, text: &str) {
        self.place(text, self.layout.font_size_pt, self.layout.line_height_pt);
    }

    pub fn finish(mut self) -> Vec<TextPage> {
        if self.pages.is_empty() {
            self.new_page();
        }
        self.pages
    }
}

/// Strip characters the standard fonts cannot encode and cut to `max_chars`.
pub fn fit_line(text: &str, max_chars: usize) -> String {
    text.chars()
        .filter(|c| c.is_ascii() && (!c.is_ascii_control() || *c == '\t'))
        .map(|c| if c == '\t' { ' ' } else { c })
        .take(max_chars)
        .collect()
}

/// Paginate free-flowing document text.
pub fn layout_document(text: &str, layout: &TextLayout) -> Vec<TextPage> {
    let normalized = text.replace("\r\n", "\n");
    let mut paginator = Paginator::new(layout);
    for line in normalized.split('\n') {
        paginator.line(line);
    }
    paginator.finish()
}

/// Paginate sheets: every sheet opens a new page with a heading, followed by
/// its non-blank lines.
pub fn layout_sheets(
    sheets: &[(String, Vec<String>)],
    layout: &TextLayout,
    heading_size: f32,
    heading_gap: f32,
) -> Vec<TextPage> {
    let mut paginator = Paginator::new(layout);
    for (name, lines) in sheets {
        paginator.new_page();
        paginator.place(&format!("Sheet: {name}"), heading_size, heading_gap);
        for line in lines.iter().filter(|l| !l.trim().is_empty()) {
            paginator.line(line);
        }
    }
    paginator.finish()
}
