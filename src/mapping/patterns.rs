//! Regex signatures of sample values, per field.

use crate::models::{FieldKey, UnknownFieldKey};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;

const DATE_ISO: &str = r"^\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2})?)?$";
const DATE_DMY: &str = r"^\d{1,2}[./-]\d{1,2}[./-](?:\d{4}|\d{2})\.?$";
const DATE_WORDS: &str = r"^\d{1,2}\.?\s+\p{L}{3,}\.?\s+\d{4}\.?$";
const AMOUNT_GROUPED: &str = r"^-?\d{1,3}(?:[.,\s]\d{3})+(?:[.,]\d{1,2})?$";
const AMOUNT_PLAIN: &str = r"^-?\d+[.,]\d{1,2}$";
const AMOUNT_WITH_CURRENCY: &str =
    r"(?i)^-?[\d.,\s]*\d\s?(?:ден|мкд|mkd|eur|€|usd|\$)\.?$";
const TAX_ID_MK: &str = r"^(?:MK|МК)?\s?\d{13}$";
const TAX_ID_EU: &str = r"^[A-Z]{2}\d{8,12}$";
const LEGAL_FORM: &str =
    r"(?i)(?:^|\s)(?:дооел|доо|ад|тп|dooel|doo|ad|ltd|gmbh|llc|inc|s\.r\.l)\.?(?:\s|$|,)";

const PATTERN_LIBRARY: &[(FieldKey, &[(&str, f64)])] = &[
    (
        FieldKey::InvoiceNumber,
        &[
            (r"(?i)^(?:inv|фа|фак|ф)[-\s/.]?\d+", 0.9),
            (r"^[A-Za-zА-Ша-ш]{0,5}[-\s]?\d{1,6}[-/]\d{2,4}$", 0.85),
            (r"^\d{4,12}$", 0.5),
        ],
    ),
    (FieldKey::Date, &[(DATE_ISO, 0.9), (DATE_DMY, 0.9), (DATE_WORDS, 0.7)]),
    (FieldKey::DueDate, &[(DATE_ISO, 0.6), (DATE_DMY, 0.6), (DATE_WORDS, 0.5)]),
    (FieldKey::SellerName, &[(LEGAL_FORM, 0.7)]),
    (FieldKey::SellerTaxId, &[(TAX_ID_MK, 0.9), (TAX_ID_EU, 0.8)]),
    (FieldKey::BuyerName, &[(LEGAL_FORM, 0.7)]),
    (FieldKey::BuyerTaxId, &[(TAX_ID_MK, 0.8), (TAX_ID_EU, 0.7)]),
    (
        FieldKey::NetAmount,
        &[(AMOUNT_WITH_CURRENCY, 0.7), (AMOUNT_GROUPED, 0.65), (AMOUNT_PLAIN, 0.6)],
    ),
    (
        FieldKey::TaxAmount,
        &[(AMOUNT_WITH_CURRENCY, 0.65), (AMOUNT_GROUPED, 0.6), (AMOUNT_PLAIN, 0.55)],
    ),
    (
        FieldKey::TotalAmount,
        &[(AMOUNT_WITH_CURRENCY, 0.75), (AMOUNT_GROUPED, 0.7), (AMOUNT_PLAIN, 0.65)],
    ),
    (
        FieldKey::Currency,
        &[
            (r"(?i)^(?:mkd|eur|usd|chf|gbp|ден|мкд|денари)\.?$", 0.95),
            (r"^[A-Z]{3}$", 0.6),
        ],
    ),
    (FieldKey::Description, &[(r"(?s)^.{40,}$", 0.5)]),
    (
        FieldKey::DocumentType,
        &[(
            r"(?i)^(?:фактура|профактура|профоктура|книжно одобрение|книжно задолжување|пресметка|сметка|invoice|proforma|credit note|debit note)",
            0.9,
        )],
    ),
];

/// One compiled signature.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub regex: Regex,
    pub weight: f64,
}

/// Ordered patterns per field; the first matching pattern decides a sample's weight.
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    patterns: BTreeMap<FieldKey, Vec<Pattern>>,
}

#[derive(Deserialize)]
struct PatternDef {
    regex: String,
    weight: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum PatternLibraryError {
    #[error("Invalid pattern table: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid pattern for {field}: {source}")]
    Regex {
        field: FieldKey,
        #[source]
        source: regex::Error,
    },
    #[error(transparent)]
    Field(#[from] UnknownFieldKey),
}

impl Default for PatternLibrary {
    fn default() -> Self {
        let patterns = PATTERN_LIBRARY
            .iter()
            .map(|(field, specs)| {
                let compiled = specs
                    .iter()
                    .map(|(re, weight)| Pattern {
                        regex: Regex::new(re).expect("built-in pattern"),
                        weight: *weight,
                    })
                    .collect();
                (*field, compiled)
            })
            .collect();
        Self { patterns }
    }
}

impl PatternLibrary {
    pub fn new(patterns: BTreeMap<FieldKey, Vec<Pattern>>) -> Self {
        Self { patterns }
    }

    /// Load `{"date": [{"regex": "...", "weight": 0.9}, ...], ...}`; order is kept.
    pub fn from_json_str(json: &str) -> Result<Self, PatternLibraryError> {
        let raw: BTreeMap<String, Vec<PatternDef>> = serde_json::from_str(json)?;
        let mut patterns = BTreeMap::new();
        for (key, defs) in raw {
            let field = key.parse::<FieldKey>()?;
            let mut compiled = Vec::with_capacity(defs.len());
            for def in defs {
                let regex = Regex::new(&def.regex)
                    .map_err(|source| PatternLibraryError::Regex { field, source })?;
                compiled.push(Pattern {
                    regex,
                    weight: def.weight,
                });
            }
            patterns.insert(field, compiled);
        }
        Ok(Self { patterns })
    }

    pub fn patterns(&self, field: FieldKey) -> &[Pattern] {
        self.patterns.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Index of the first pattern of `field` that matches `value`.
    pub fn first_match(&self, field: FieldKey, value: &str) -> Option<usize> {
        self.patterns(field)
            .iter()
            .position(|p| p.regex.is_match(value))
    }
}
