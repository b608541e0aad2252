//! Cell values from Excel `.xlsx` workbooks.
//!
//! Values are read as stored: shared and inline strings, booleans as
//! `TRUE`/`FALSE`, numbers and formula results as their raw text. Number
//! formats are not applied.

use crate::types::*;
use roxmltree::{Document, Node};
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Columns per sheet in Excel (`A` through `XFD`)
const MAX_COLUMNS: usize = 16_384;

/// One worksheet: its tab name and a dense grid of cell text
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

pub fn read_workbook(bytes: &[u8]) -> Result<Vec<Sheet>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;

    let workbook_xml = read_part(&mut archive, "xl/workbook.xml")?;
    let rels_xml = read_part(&mut archive, "xl/_rels/workbook.xml.rels")?;
    let shared = match read_part(&mut archive, "xl/sharedStrings.xml") {
        Ok(xml) => shared_strings(&xml)?,
        Err(NormalizeError::Archive(zip::result::ZipError::FileNotFound)) => Vec::new(),
        Err(e) => return Err(e),
    };

    let targets = relationship_targets(&rels_xml)?;
    let workbook = Document::parse(&workbook_xml)?;

    let mut sheets = Vec::new();
    for sheet in workbook
        .descendants()
        .filter(|n| n.has_tag_name((MAIN_NS, "sheet")))
    {
        let name = sheet.attribute("name").unwrap_or("Sheet").to_string();
        let Some(target) = sheet
            .attribute((REL_NS, "id"))
            .and_then(|id| targets.get(id))
        else {
            log::warn!("Sheet {name} has no worksheet part, skipping");
            continue;
        };
        let xml = read_part(&mut archive, &resolve_target(target))?;
        sheets.push(Sheet {
            name,
            rows: sheet_rows(&xml, &shared)?,
        });
    }

    Ok(sheets)
}

fn read_part<R: Read + Seek>(archive: &mut zip::ZipArchive<R>, name: &str) -> Result<String> {
    let mut xml = String::new();
    archive.by_name(name)?.read_to_string(&mut xml)?;
    Ok(xml)
}

/// Worksheet targets are relative to `xl/` unless absolute.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target.trim_start_matches("./")),
    }
}

fn relationship_targets(xml: &str) -> Result<HashMap<String, String>> {
    let doc = Document::parse(xml)?;
    Ok(doc
        .descendants()
        .filter(|n| n.has_tag_name((PKG_REL_NS, "Relationship")))
        .filter_map(|n| Some((n.attribute("Id")?.to_string(), n.attribute("Target")?.to_string())))
        .collect())
}

fn shared_strings(xml: &str) -> Result<Vec<String>> {
    let doc = Document::parse(xml)?;
    Ok(doc
        .descendants()
        .filter(|n| n.has_tag_name((MAIN_NS, "si")))
        .map(rich_text)
        .collect())
}

/// Concatenate all `<t>` runs, ignoring phonetic hints.
fn rich_text(node: Node) -> String {
    node.descendants()
        .filter(|n| n.has_tag_name((MAIN_NS, "t")))
        .filter(|n| !n.ancestors().any(|a| a.has_tag_name((MAIN_NS, "rPh"))))
        .filter_map(|n| n.text())
        .collect()
}

fn sheet_rows(xml: &str, shared: &[String]) -> Result<Vec<Vec<String>>> {
    let doc = Document::parse(xml)?;
    let mut rows: Vec<Vec<String>> = Vec::new();

    for row in doc
        .descendants()
        .filter(|n| n.has_tag_name((MAIN_NS, "row")))
    {
        let mut cells: Vec<String> = Vec::new();
        for cell in row.children().filter(|n| n.has_tag_name((MAIN_NS, "c"))) {
            let column = match cell.attribute("r") {
                Some(reference) => column_index(reference)?,
                None => None,
            }
            .unwrap_or(cells.len());
            if column >= MAX_COLUMNS {
                return Err(NormalizeError::Malformed(format!(
                    "row has more than {MAX_COLUMNS} columns"
                )));
            }
            if cells.len() <= column {
                cells.resize(column + 1, String::new());
            }
            cells[column] = cell_text(cell, shared);
        }
        rows.push(cells);
    }

    // pad to a rectangle so every row has the same number of fields
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut rows {
        row.resize(width, String::new());
    }
    Ok(rows)
}

fn cell_text(cell: Node, shared: &[String]) -> String {
    let value = cell
        .children()
        .find(|n| n.has_tag_name((MAIN_NS, "v")))
        .and_then(|v| v.text())
        .unwrap_or_default();

    match cell.attribute("t") {
        Some("s") => value
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared.get(i).cloned())
            .unwrap_or_default(),
        Some("inlineStr") => cell
            .children()
            .find(|n| n.has_tag_name((MAIN_NS, "is")))
            .map(rich_text)
            .unwrap_or_default(),
        Some("b") => (if value.trim() == "1" { "TRUE" } else { "FALSE" }).to_string(),
        _ => value.to_string(),
    }
}

/// Zero-based column index of a cell reference such as `AB12`, or `None`
/// when the reference has no column letters. Columns past `XFD` are rejected.
fn column_index(reference: &str) -> Result<Option<usize>> {
    let letters: Vec<char> = reference
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return Ok(None);
    }
    letters
        .iter()
        .try_fold(0usize, |index, c| {
            let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
            index.checked_mul(26)?.checked_add(digit)
        })
        .filter(|index| *index <= MAX_COLUMNS)
        .map(|index| Some(index - 1))
        .ok_or_else(|| {
            NormalizeError::Malformed(format!("cell reference {reference} is beyond column XFD"))
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Build a minimal workbook. Each sheet is `(name, rows)` and every cell
    /// is written as an inline string, except cells that parse as numbers.
    pub(crate) fn build_xlsx(sheets: &[(&str, Vec<Vec<&str>>)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default();

        let sheet_entries: String = sheets
            .iter()
            .enumerate()
            .map(|(i, (name, _))| {
                format!("<sheet name=\"{name}\" sheetId=\"{}\" r:id=\"rId{}\"/>", i + 1, i + 1)
            })
            .collect();
        let workbook = format!(
            "<workbook xmlns=\"{MAIN_NS}\" xmlns:r=\"{REL_NS}\"><sheets>{sheet_entries}</sheets></workbook>"
        );
        writer.start_file("xl/workbook.xml", opts).unwrap();
        writer.write_all(workbook.as_bytes()).unwrap();

        let rels: String = (1..=sheets.len())
            .map(|i| {
                format!(
                    "<Relationship Id=\"rId{i}\" Type=\"worksheet\" Target=\"worksheets/sheet{i}.xml\"/>"
                )
            })
            .collect();
        writer.start_file("xl/_rels/workbook.xml.rels", opts).unwrap();
        writer
            .write_all(format!("<Relationships xmlns=\"{PKG_REL_NS}\">{rels}</Relationships>").as_bytes())
            .unwrap();

        for (i, (_, rows)) in sheets.iter().enumerate() {
            let mut data = String::new();
            for (r, row) in rows.iter().enumerate() {
                data.push_str(&format!("<row r=\"{}\">", r + 1));
                for (c, value) in row.iter().enumerate() {
                    if value.is_empty() {
                        continue;
                    }
                    let col = (b'A' + c as u8) as char;
                    if value.parse::<f64>().is_ok() {
                        data.push_str(&format!("<c r=\"{col}{}\"><v>{value}</v></c>", r + 1));
                    } else {
                        data.push_str(&format!(
                            "<c r=\"{col}{}\" t=\"inlineStr\"><is><t>{value}</t></is></c>",
                            r + 1
                        ));
                    }
                }
                data.push_str("</row>");
            }
            writer
                .start_file(format!("xl/worksheets/sheet{}.xml", i + 1), opts)
                .unwrap();
            writer
                .write_all(
                    format!("<worksheet xmlns=\"{MAIN_NS}\"><sheetData>{data}</sheetData></worksheet>")
                        .as_bytes(),
                )
                .unwrap();
        }

        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_index("A1").unwrap(), Some(0));
        assert_eq!(column_index("Z9").unwrap(), Some(25));
        assert_eq!(column_index("AA10").unwrap(), Some(26));
        assert_eq!(column_index("XFD1").unwrap(), Some(16_383));
        assert_eq!(column_index("12").unwrap(), None);
    }

    #[test]
    fn columns_past_xfd_are_rejected() {
        assert!(matches!(column_index("XFE1"), Err(NormalizeError::Malformed(_))));
        assert!(matches!(column_index("ZZZZZZZ1"), Err(NormalizeError::Malformed(_))));
        assert!(matches!(
            column_index("ZZZZZZZZZZZZZZZZ1"),
            Err(NormalizeError::Malformed(_))
        ));

        let result = sheet_rows(
            &format!(
                "<worksheet xmlns=\"{MAIN_NS}\"><sheetData><row r=\"1\">\
                 <c r=\"A1\" t=\"inlineStr\"><is><t>ok</t></is></c>\
                 <c r=\"ZZZZZZZ1\"><v>1</v></c>\
                 </row></sheetData></worksheet>"
            ),
            &[],
        );
        assert!(matches!(result, Err(NormalizeError::Malformed(_))));
    }

    #[test]
    fn reads_sheets_in_workbook_order() {
        let bytes = build_xlsx(&[
            ("Budget", vec![vec!["Item", "Cost"], vec!["Rent", "1200"]]),
            ("Notes", vec![vec!["hello"]]),
        ]);
        let sheets = read_workbook(&bytes).unwrap();
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].name, "Budget");
        assert_eq!(sheets[0].rows, vec![vec!["Item", "Cost"], vec!["Rent", "1200"]]);
        assert_eq!(sheets[1].rows, vec![vec!["hello"]]);
    }

    #[test]
    fn sparse_cells_are_padded() {
        let bytes = build_xlsx(&[("S", vec![vec!["a", "", "c"], vec!["x"]])]);
        let sheets = read_workbook(&bytes).unwrap();
        assert_eq!(sheets[0].rows, vec![vec!["a", "", "c"], vec!["x", "", ""]]);
    }

    #[test]
    fn shared_strings_and_booleans() {
        let shared = shared_strings(&format!(
            "<sst xmlns=\"{MAIN_NS}\"><si><t>zero</t></si><si><r><t>o</t></r><r><t>ne</t></r></si></sst>"
        ))
        .unwrap();
        assert_eq!(shared, vec!["zero", "one"]);

        let rows = sheet_rows(
            &format!(
                "<worksheet xmlns=\"{MAIN_NS}\"><sheetData><row r=\"1\">\
                 <c r=\"A1\" t=\"s\"><v>1</v></c><c r=\"B1\" t=\"b\"><v>1</v></c>\
                 </row></sheetData></worksheet>"
            ),
            &shared,
        )
        .unwrap();
        assert_eq!(rows, vec![vec!["one", "TRUE"]]);
    }

    #[test]
    fn absolute_targets() {
        assert_eq!(resolve_target("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("/xl/worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
    }
}
