//! Write path: turn a confirmed mapping plus extracted invoice fields into one
//! appended row, then feed the outcome back to the learning store.

use crate::error::WriteError;
use crate::excel::SpreadsheetIo;
use crate::learning::LearningStore;
use crate::mapping::normalizer::parse_amount;
use crate::mapping::record_outcome;
use crate::models::{MappingAction, MappingResult};
use crate::types::{InvoiceData, RowCell};
use std::path::Path;

/// Where a row goes and which fingerprint its mapping was learned under.
#[derive(Debug, Clone, Copy)]
pub struct RowTarget<'a> {
    pub path: &'a Path,
    pub sheet: &'a str,
    pub schema_hash: &'a str,
}

/// One cell per mapped column that has an extracted value, in column order.
///
/// Amount fields are rewritten as `27,826.17`; values that do not parse as a
/// number are written as extracted.
pub fn build_row(mapping: &MappingResult, invoice: &InvoiceData) -> Vec<RowCell> {
    mapping
        .mapping
        .iter()
        .filter_map(|(column, &field)| {
            let raw = invoice.value(field)?;
            let value = if field.is_amount() {
                parse_amount(raw).map(format_amount).unwrap_or_else(|| raw.to_string())
            } else {
                raw.to_string()
            };
            Some(RowCell {
                column: column.clone(),
                value,
            })
        })
        .collect()
}

/// Append the row, then record `action` for every mapped column.
///
/// Learning failures never fail the write; returns the number of cells written.
pub fn commit_row(
    io: &dyn SpreadsheetIo,
    store: &dyn LearningStore,
    target: RowTarget<'_>,
    mapping: &MappingResult,
    invoice: &InvoiceData,
    action: MappingAction,
) -> Result<usize, WriteError> {
    let cells = build_row(mapping, invoice);
    if cells.is_empty() {
        return Err(WriteError::EmptyRow);
    }
    io.append_row(target.path, target.sheet, &cells)?;
    let learned = record_outcome(store, target.schema_hash, mapping, action);
    tracing::info!(
        sheet = target.sheet,
        cells = cells.len(),
        learned,
        source = invoice.source_file.as_deref().unwrap_or("-"),
        "committed invoice row"
    );
    Ok(cells.len())
}

/// Thousands separator and two decimals (27826.17 -> "27,826.17").
pub fn format_amount(n: f64) -> String {
    let s = format!("{:.2}", n);
    let (int_part, dec_part) = s.split_at(s.find('.').unwrap_or(s.len()));
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(d) => ("-", d),
        None => ("", int_part),
    };
    let mut out = String::from(sign);
    let len = digits.len();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out.push_str(dec_part);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SheetError, StoreError};
    use crate::models::{FieldKey, LearnedMapping};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSheet {
        rows: Mutex<Vec<Vec<RowCell>>>,
        locked: bool,
    }

    impl SpreadsheetIo for RecordingSheet {
        fn read_headers(&self, _: &Path, _: &str, _: u32) -> Result<Vec<String>, SheetError> {
            Ok(vec![])
        }

        fn read_column_samples(&self, _: &Path, _: &str, _: u32, _: usize) -> Result<Vec<Vec<String>>, SheetError> {
            Ok(vec![])
        }

        fn append_row(&self, _: &Path, _: &str, cells: &[RowCell]) -> Result<(), SheetError> {
            if self.locked {
                return Err(SheetError::Locked);
            }
            self.rows.lock().unwrap().push(cells.to_vec());
            Ok(())
        }

        fn sheet_names(&self, _: &Path) -> Result<Vec<String>, SheetError> {
            Ok(vec!["Sheet1".into()])
        }
    }

    #[derive(Default)]
    struct CountingStore {
        upserts: Mutex<Vec<(FieldKey, String)>>,
    }

    impl LearningStore for CountingStore {
        fn get_learned_mapping(&self, _: &str, _: FieldKey) -> Result<Option<LearnedMapping>, StoreError> {
            Ok(None)
        }

        fn upsert_learned_mapping(
            &self,
            _: &str,
            field: FieldKey,
            _: usize,
            column_letter: &str,
            _: MappingAction,
        ) -> Result<(), StoreError> {
            self.upserts.lock().unwrap().push((field, column_letter.to_string()));
            Ok(())
        }
    }

    fn mapping() -> MappingResult {
        let mut m = MappingResult::default();
        m.insert("A", FieldKey::InvoiceNumber, 0.95, vec![]);
        m.insert("B", FieldKey::TotalAmount, 0.95, vec![]);
        m.insert("C", FieldKey::Description, 0.95, vec![]);
        m
    }

    fn invoice() -> InvoiceData {
        let mut invoice = InvoiceData::default();
        invoice.set(FieldKey::InvoiceNumber, "12/2025", Some(0.9));
        invoice.set(FieldKey::TotalAmount, "27826.17", None);
        invoice.set(FieldKey::Date, "2025-01-22", None);
        invoice
    }

    fn target() -> RowTarget<'static> {
        RowTarget {
            path: Path::new("book.xlsx"),
            sheet: "Sheet1",
            schema_hash: "abc",
        }
    }

    #[test]
    fn formats_amounts() {
        assert_eq!(format_amount(27826.17), "27,826.17");
        assert_eq!(format_amount(0.5), "0.50");
        assert_eq!(format_amount(-1234567.0), "-1,234,567.00");
        assert_eq!(format_amount(999.999), "1,000.00");
    }

    #[test]
    fn builds_cells_for_mapped_fields_with_values() {
        let cells = build_row(&mapping(), &invoice());
        assert_eq!(
            cells,
            vec![
                RowCell { column: "A".into(), value: "12/2025".into() },
                RowCell { column: "B".into(), value: "27,826.17".into() },
            ]
        );
    }

    #[test]
    fn ocr_amount_with_three_decimals_is_written_rounded() {
        let result = serde_json::json!({
            "documents": [{"fields": {
                "InvoiceTotal": {"type": "currency", "valueCurrency": {"amount": 5.126}}
            }}]
        });
        let invoice = crate::ocr::invoice_from_analyze_result(&result, None).unwrap();
        let cells = build_row(&mapping(), &invoice);
        assert_eq!(cells, vec![RowCell { column: "B".into(), value: "5.13".into() }]);
    }

    #[test]
    fn unparseable_amount_is_kept() {
        let mut invoice = invoice();
        invoice.set(FieldKey::TotalAmount, "n/a", None);
        let cells = build_row(&mapping(), &invoice);
        assert_eq!(cells[1].value, "n/a");
    }

    #[test]
    fn commit_appends_then_learns_every_mapped_column() {
        let sheet = RecordingSheet::default();
        let store = CountingStore::default();
        let written = commit_row(&sheet, &store, target(), &mapping(), &invoice(), MappingAction::Accept).unwrap();
        assert_eq!(written, 2);
        assert_eq!(sheet.rows.lock().unwrap().len(), 1);
        assert_eq!(store.upserts.lock().unwrap().len(), 3);
    }

    #[test]
    fn failed_write_learns_nothing() {
        let sheet = RecordingSheet {
            locked: true,
            ..RecordingSheet::default()
        };
        let store = CountingStore::default();
        let err = commit_row(&sheet, &store, target(), &mapping(), &invoice(), MappingAction::Accept).unwrap_err();
        assert!(matches!(err, WriteError::Sheet(SheetError::Locked)));
        assert_eq!(err.to_string(), "Please close the file in Excel first.");
        assert!(store.upserts.lock().unwrap().is_empty());
    }

    #[test]
    fn nothing_to_write_is_an_error() {
        let sheet = RecordingSheet::default();
        let store = CountingStore::default();
        let err = commit_row(&sheet, &store, target(), &mapping(), &InvoiceData::default(), MappingAction::Accept)
            .unwrap_err();
        assert!(matches!(err, WriteError::EmptyRow));
        assert!(sheet.rows.lock().unwrap().is_empty());
    }
}
