//! Raw text extraction from Word `.docx` packages.
//!
//! Only the body text survives: each paragraph becomes its text followed by a
//! blank line, tabs become spaces and explicit breaks become newlines. Styles,
//! images and tables' structure are dropped.

use crate::types::*;
use roxmltree::Node;
use std::io::{Cursor, Read};

const WORD_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

pub fn extract_text(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")?
        .read_to_string(&mut xml)?;

    let doc = roxmltree::Document::parse(&xml)?;
    let body = doc
        .descendants()
        .find(|n| n.has_tag_name((WORD_NS, "body")))
        .ok_or_else(|| NormalizeError::Malformed("word/document.xml has no body".to_string()))?;

    let mut out = String::new();
    collect_paragraphs(body, &mut out);
    Ok(out)
}

fn collect_paragraphs(node: Node, out: &mut String) {
    for child in node.children().filter(Node::is_element) {
        if child.has_tag_name((WORD_NS, "p")) {
            let mut paragraph = String::new();
            collect_runs(child, &mut paragraph, out);
            out.push_str(&paragraph);
            out.push_str("\n\n");
        } else {
            collect_paragraphs(child, out);
        }
    }
}

/// Append run text of `node` to `paragraph`. Paragraphs nested in text boxes
/// are flushed to `out` on their own.
fn collect_runs(node: Node, paragraph: &mut String, out: &mut String) {
    for child in node.children().filter(Node::is_element) {
        let tag = child.tag_name();
        if tag.namespace() != Some(WORD_NS) {
            collect_runs(child, paragraph, out);
            continue;
        }
        match tag.name() {
            "t" => paragraph.push_str(child.text().unwrap_or_default()),
            "tab" => paragraph.push(' '),
            "br" | "cr" => paragraph.push('\n'),
            "p" => {
                let mut nested = String::new();
                collect_runs(child, &mut nested, out);
                out.push_str(&nested);
                out.push_str("\n\n");
            }
            // deleted revisions and field instructions are not visible text
            "del" | "instrText" => {}
            _ => collect_runs(child, paragraph, out),
        }
    }
}
