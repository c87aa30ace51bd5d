use crate::models::FieldKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One cell of a row to append: column letter and text value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowCell {
    pub column: String,
    pub value: String,
}

/// Single extracted field (value + optional OCR confidence).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceFieldValue {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Structured invoice data keyed by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceData {
    pub fields: BTreeMap<FieldKey, InvoiceFieldValue>,
    /// Original document filename.
    #[serde(default)]
    pub source_file: Option<String>,
}

impl InvoiceData {
    /// Trimmed value of `field`, if present and non-blank.
    pub fn value(&self, field: FieldKey) -> Option<&str> {
        self.fields
            .get(&field)
            .map(|f| f.value.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, field: FieldKey, value: impl Into<String>, confidence: Option<f64>) {
        self.fields.insert(
            field,
            InvoiceFieldValue {
                value: value.into(),
                confidence,
            },
        );
    }
}
