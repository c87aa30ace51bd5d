//! Workbook access: calamine for reading, edit_xlsx for appending rows so the
//! template's formatting, styles and formulas survive.

use calamine::{open_workbook_auto, Data, DataType, Range, Reader, Sheets};
use edit_xlsx::{FormatAlignType, WorkSheetRow, Write};
use regex::Regex;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read, Write as IoWrite};
use std::path::Path;
use zip::read::ZipArchive;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::SheetError;
use crate::mapping::fingerprint::{column_letter_to_index, fingerprint};
use crate::types::RowCell;

pub const SAMPLE_ROWS: usize = 5;
const MAX_LAST_ROW_SCAN: usize = 2000;
const DATA_ROW_HEIGHT: f64 = 96.0;

/// Spreadsheet collaborator used by the write path. Header rows are 1-based.
pub trait SpreadsheetIo: Send + Sync {
    fn read_headers(&self, path: &Path, sheet: &str, header_row: u32) -> Result<Vec<String>, SheetError>;

    /// Values below the header row, as columns × rows with empty cells dropped.
    fn read_column_samples(
        &self,
        path: &Path,
        sheet: &str,
        header_row: u32,
        max_rows: usize,
    ) -> Result<Vec<Vec<String>>, SheetError>;

    /// Write `cells` into the first row after the last used one.
    fn append_row(&self, path: &Path, sheet: &str, cells: &[RowCell]) -> Result<(), SheetError>;

    fn sheet_names(&self, path: &Path) -> Result<Vec<String>, SheetError>;
}

/// `.xlsx` files on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxWorkbook;

/// Everything the mapping engine needs from one sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSnapshot {
    pub sheet_name: String,
    pub headers: Vec<String>,
    pub samples: Vec<Vec<String>>,
    /// 1-based; equals the header row when the sheet has no data yet.
    pub last_data_row: u32,
    pub schema_hash: String,
}

impl SpreadsheetIo for XlsxWorkbook {
    fn read_headers(&self, path: &Path, sheet: &str, header_row: u32) -> Result<Vec<String>, SheetError> {
        let range = open_range(path, sheet)?;
        Ok(row_values(&range, header_row.saturating_sub(1) as usize))
    }

    fn read_column_samples(
        &self,
        path: &Path,
        sheet: &str,
        header_row: u32,
        max_rows: usize,
    ) -> Result<Vec<Vec<String>>, SheetError> {
        let range = open_range(path, sheet)?;
        Ok(column_samples(&range, header_row.saturating_sub(1) as usize, max_rows))
    }

    fn append_row(&self, path: &Path, sheet: &str, cells: &[RowCell]) -> Result<(), SheetError> {
        if !path.exists() {
            return Err(SheetError::NotFound);
        }
        let mut workbook = edit_xlsx::Workbook::from_path(path).map_err(|e| {
            let msg = e.to_string();
            if msg.contains("Could not open") || msg.to_lowercase().contains("permission") {
                SheetError::Locked
            } else {
                SheetError::Open(msg)
            }
        })?;
        let worksheet = workbook
            .get_worksheet_mut_by_name(sheet)
            .map_err(|_| SheetError::SheetMissing(sheet.to_string()))?;

        let new_row = worksheet.max_row() + 1;
        let format = data_cell_format();
        for cell in cells {
            let letter = cell.column.trim().to_uppercase();
            if column_letter_to_index(&letter).is_none() {
                return Err(SheetError::Write(format!("invalid column '{}'", cell.column)));
            }
            worksheet
                .write_string_with_format(&format!("{}{}", letter, new_row), sanitize_cell(&cell.value), &format)
                .map_err(|e| SheetError::Write(e.to_string()))?;
        }
        // Tall rows keep multi-line descriptions readable at 9pt.
        if let Err(e) = worksheet.set_row_height_with_format(new_row, DATA_ROW_HEIGHT, &format) {
            tracing::warn!(row = new_row, error = %e, "could not set data row height");
        }

        workbook.save_as(path).map_err(|e| {
            let msg = e.to_string();
            if msg.contains("Permission denied") || msg.contains("being used") {
                SheetError::Locked
            } else {
                SheetError::Write(msg)
            }
        })?;
        strip_drawings(path)?;
        tracing::info!(path = %path.display(), sheet, row = new_row, cells = cells.len(), "appended row");
        Ok(())
    }

    fn sheet_names(&self, path: &Path) -> Result<Vec<String>, SheetError> {
        Ok(open(path)?.sheet_names().to_vec())
    }
}

/// Headers (trailing blanks trimmed), first [`SAMPLE_ROWS`] sample rows, last
/// data row and schema fingerprint of one sheet, from a single read.
pub fn analyze_sheet(path: &Path, sheet: &str, header_row: u32) -> Result<SheetSnapshot, SheetError> {
    let range = open_range(path, sheet)?;
    let header_idx = header_row.saturating_sub(1) as usize;

    let mut headers = row_values(&range, header_idx);
    while headers.last().is_some_and(|h| h.trim().is_empty()) {
        headers.pop();
    }
    let mut samples = column_samples(&range, header_idx, SAMPLE_ROWS);
    samples.truncate(headers.len());

    let mut last_data_row = header_idx as u32 + 1;
    for offset in 1..=MAX_LAST_ROW_SCAN {
        let row = header_idx + offset;
        if range.start().is_some_and(|(start, _)| row >= start as usize + range.height()) {
            break;
        }
        if row_values(&range, row).iter().any(|v| !v.trim().is_empty()) {
            last_data_row = row as u32 + 1;
        }
    }

    let schema_hash = fingerprint(&headers);
    tracing::debug!(sheet, columns = headers.len(), last_data_row, schema_hash = %schema_hash, "analyzed sheet");
    Ok(SheetSnapshot {
        sheet_name: sheet.to_string(),
        headers,
        samples,
        last_data_row,
        schema_hash,
    })
}

fn open(path: &Path) -> Result<Sheets<BufReader<File>>, SheetError> {
    if !path.exists() {
        return Err(SheetError::NotFound);
    }
    open_workbook_auto(path).map_err(|e| SheetError::Open(e.to_string()))
}

fn open_range(path: &Path, sheet: &str) -> Result<Range<Data>, SheetError> {
    let mut workbook = open(path)?;
    if !workbook.sheet_names().iter().any(|n| n == sheet) {
        return Err(SheetError::SheetMissing(sheet.to_string()));
    }
    workbook
        .worksheet_range(sheet)
        .map_err(|e| SheetError::Open(e.to_string()))
}

/// Cell text of absolute 0-based `row`, starting at column A.
///
/// calamine ranges start at the first used cell, so leading empty rows and
/// columns are not part of the range and are padded back here.
fn row_values(range: &Range<Data>, row: usize) -> Vec<String> {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };
    let Some(relative) = row.checked_sub(start_row as usize) else {
        return Vec::new();
    };
    let Some(cells) = range.rows().nth(relative) else {
        return Vec::new();
    };
    let mut out = vec![String::new(); start_col as usize];
    out.extend(cells.iter().map(|c| c.as_string().unwrap_or_default()));
    out
}

fn column_samples(range: &Range<Data>, header_idx: usize, max_rows: usize) -> Vec<Vec<String>> {
    let rows: Vec<Vec<String>> = (header_idx + 1..header_idx + 1 + max_rows)
        .map(|r| row_values(range, r))
        .collect();
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut columns = vec![Vec::<String>::new(); width];
    for row in rows {
        for (col, value) in row.into_iter().enumerate() {
            if !value.is_empty() {
                columns[col].push(value);
            }
        }
    }
    columns
}

/// Data row format: 9pt, top-left aligned.
fn data_cell_format() -> edit_xlsx::Format {
    edit_xlsx::Format::default()
        .set_size(9)
        .set_align(FormatAlignType::Top)
        .set_align(FormatAlignType::Left)
}

/// Text that cannot break the sheet XML: control characters (other than tab,
/// newline and CR) are dropped, `&` becomes " and ", `<` and `>` become spaces.
pub fn sanitize_cell(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        let u = c as u32;
        match c {
            '\t' | '\n' | '\r' => out.push(c),
            _ if u < 0x20 || u == 0x7F || u == 0xFFFE || u == 0xFFFF => {}
            '&' => out.push_str(" and "),
            '<' | '>' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}

/// Remove drawing and media parts after a save so Excel does not offer to
/// repair the file. Worksheet XML is copied untouched.
fn strip_drawings(path: &Path) -> Result<(), SheetError> {
    let file = File::open(path).map_err(|e| write_err(&e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| write_err(&e))?;
    if !archive
        .file_names()
        .any(|n| n.starts_with("xl/drawings/") || n.starts_with("xl/media/"))
    {
        return Ok(());
    }

    let temp_path = path.with_extension("tmp.xlsx");
    let copied = copy_without_drawings(&mut archive, &temp_path);
    drop(archive);
    let replaced = copied.and_then(|()| std::fs::rename(&temp_path, path).map_err(|e| write_err(&e)));
    if replaced.is_err() && temp_path.exists() {
        if let Err(e) = std::fs::remove_file(&temp_path) {
            tracing::warn!(path = %temp_path.display(), error = %e, "could not remove temporary workbook");
        }
    }
    replaced
}

fn copy_without_drawings(archive: &mut ZipArchive<File>, temp_path: &Path) -> Result<(), SheetError> {
    let rel_drawing = Regex::new(r#"<Relationship[^>]*drawing[^>]*/>"#).map_err(|e| write_err(&e))?;
    let ct_parts =
        Regex::new(r#"<Override\s+PartName="/xl/(?:drawings|media)/[^"]*"[^>]*/>"#).map_err(|e| write_err(&e))?;

    let mut writer = ZipWriter::new(File::create(temp_path).map_err(|e| write_err(&e))?);
    let opts = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| write_err(&e))?;
        let name = entry.name().replace('\\', "/");
        if name.starts_with("xl/drawings/") || name.starts_with("xl/media/") {
            continue;
        }
        let mut data = Vec::new();
        entry.read_to_end(&mut data).map_err(|e| write_err(&e))?;
        let data = if name == "[Content_Types].xml" {
            ct_parts.replace_all(&String::from_utf8_lossy(&data), "").into_owned().into_bytes()
        } else if name.contains("worksheets/_rels/") && name.ends_with(".rels") {
            rel_drawing.replace_all(&String::from_utf8_lossy(&data), "").into_owned().into_bytes()
        } else {
            data
        };
        writer.start_file(name.as_str(), opts).map_err(|e| write_err(&e))?;
        writer.write_all(&data).map_err(|e| write_err(&e))?;
    }
    writer.finish().map_err(|e| write_err(&e))?;
    Ok(())
}

fn write_err(e: &dyn std::fmt::Display) -> SheetError {
    SheetError::Write(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_text_and_whitespace() {
        assert_eq!(sanitize_cell("Фактура бр. 12\nред 2\tтаб"), "Фактура бр. 12\nред 2\tтаб");
    }

    #[test]
    fn sanitize_drops_controls_and_markup() {
        assert_eq!(sanitize_cell("A&B"), "A and B");
        assert_eq!(sanitize_cell("<x>"), " x ");
        assert_eq!(sanitize_cell("a\u{0}b\u{7f}c\u{1b}"), "abc");
    }

    #[test]
    fn failed_drawing_strip_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.start_file("xl/media/image1.png", stored).unwrap();
        writer.write_all(b"png").unwrap();
        writer.start_file("xl/worksheets/sheet1.xml", stored).unwrap();
        writer.write_all(b"<worksheet>original sheet body</worksheet>").unwrap();
        writer.finish().unwrap();

        // flip one stored byte so the entry fails its checksum on read
        let mut bytes = std::fs::read(&path).unwrap();
        let at = bytes
            .windows(13)
            .position(|w| w == b"original shee")
            .unwrap();
        bytes[at] = b'O';
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(strip_drawings(&path), Err(SheetError::Write(_))));
        assert!(!path.with_extension("tmp.xlsx").exists());
        assert_eq!(std::fs::read(&path).unwrap(), bytes);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = XlsxWorkbook
            .read_headers(Path::new("/definitely/not/here.xlsx"), "Sheet1", 1)
            .unwrap_err();
        assert!(matches!(err, SheetError::NotFound));
        assert!(matches!(
            XlsxWorkbook.append_row(Path::new("/definitely/not/here.xlsx"), "Sheet1", &[]),
            Err(SheetError::NotFound)
        ));
    }
}
