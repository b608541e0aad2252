use crate::types::Result;

/// Serialize rows as comma-delimited text, one output line per `\n`.
///
/// Fields are quoted only when needed, so a quoted field containing a newline
/// spans two output lines. A row with no values becomes bare separators.
pub fn rows_to_lines(rows: &[Vec<String>]) -> Result<Vec<String>> {
    let mut lines = Vec::with_capacity(rows.len());

    for row in rows {
        if row.iter().all(String::is_empty) {
            lines.push(",".repeat(row.len().saturating_sub(1)));
            continue;
        }

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        writer.write_record(row)?;
        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        lines.extend(String::from_utf8_lossy(&bytes).lines().map(str::to_string));
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn quotes_when_needed() {
        let lines = rows_to_lines(&[row(&["a", "b,c", "say \"hi\""])]).unwrap();
        assert_eq!(lines, vec![r#"a,"b,c","say ""hi""""#]);
    }

    #[test]
    fn blank_rows_become_separators_only() {
        let lines = rows_to_lines(&[row(&["x", "y"]), row(&["", ""]), row(&["z", ""])]).unwrap();
        assert_eq!(lines, vec!["x,y", ",", "z,"]);
    }

    #[test]
    fn embedded_newline_spans_lines() {
        let lines = rows_to_lines(&[row(&["two\nlines", "b"])]).unwrap();
        assert_eq!(lines, vec!["\"two", "lines\",b"]);
    }
}
