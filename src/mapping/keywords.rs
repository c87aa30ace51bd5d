//! Header keyword table, display labels and label aliases per field.
//!
//! Keywords are matched after normalization, so case and punctuation do not
//! matter. A keyword hits at full score when it contains the header or the
//! header contains it, so a keyword must never contain another field's
//! keyword, label or alias: "tax id" as a keyword would claim a bare "Tax"
//! header. Phrases that embed another field's term ("vendor vat id",
//! "рок на плаќање") are aliases instead. Aliases score like the label: 1.0
//! when equal to the header, 0.9 when one contains the other.

use crate::models::{FieldKey, UnknownFieldKey};
use serde::Deserialize;
use std::collections::BTreeMap;

const HEADER_KEYWORDS: &[(FieldKey, &[&str])] = &[
    (
        FieldKey::InvoiceNumber,
        &[
            "број на документ", "број на фактура", "фактура број", "број", "бр фактура",
            "invoice number", "invoice no", "invoice id", "document number", "number", "broj",
        ],
    ),
    (
        FieldKey::Date,
        &[
            "дата на документ", "дата на фактура", "дата на издавање", "датум на фактура",
            "invoice date", "issue date", "document date", "datum fakture",
        ],
    ),
    (FieldKey::DueDate, &["рок", "доспевање", "доспева", "dospevanje"]),
    (
        FieldKey::SellerName,
        &["продавач", "добавувач", "издавач", "seller", "vendor", "supplier", "prodavac"],
    ),
    (FieldKey::SellerTaxId, &["едб", "даночен", "edb"]),
    (FieldKey::SellerAddress, &["седиште"]),
    (
        FieldKey::BuyerName,
        &["купувач", "клиент", "примач", "buyer", "customer", "client", "kupuvac"],
    ),
    (
        FieldKey::NetAmount,
        &["нето", "нето износ", "основица", "net", "net amount", "neto"],
    ),
    // no bare "vat"/"tax": those headers still hit through containment
    (
        FieldKey::TaxAmount,
        &["ддв", "износ на ддв", "данок", "tax amount", "vat amount", "ddv"],
    ),
    (
        FieldKey::TotalAmount,
        &[
            "бруто", "бруто износ", "вкупно", "вкупен износ", "total", "total amount",
            "grand total", "bruto", "vkupno",
        ],
    ),
    (
        FieldKey::Currency,
        &["валута", "currency", "curr", "valuta"],
    ),
    (
        FieldKey::Description,
        &["опис", "опис на услуга", "назив", "артикл", "предмет", "description", "desc", "item", "opis"],
    ),
    (
        FieldKey::DocumentType,
        &["тип", "тип на документ", "вид на документ", "вид", "document type", "doc type", "type", "tip"],
    ),
    (
        FieldKey::PaymentMethod,
        &["начин на плаќање", "payment method", "payment terms", "način plaćanja"],
    ),
    (
        FieldKey::Reference,
        &["референца", "нарачка", "reference", "purchase order"],
    ),
];

const FIELD_LABELS: &[(FieldKey, &str)] = &[
    (FieldKey::InvoiceNumber, "Invoice Number"),
    (FieldKey::Date, "Invoice Date"),
    (FieldKey::DueDate, "Due Date"),
    (FieldKey::SellerName, "Seller"),
    (FieldKey::SellerTaxId, "Seller Tax ID"),
    (FieldKey::SellerAddress, "Seller Address"),
    (FieldKey::BuyerName, "Buyer"),
    (FieldKey::BuyerTaxId, "Buyer Tax ID"),
    (FieldKey::BuyerAddress, "Buyer Address"),
    (FieldKey::NetAmount, "Net Amount"),
    (FieldKey::TaxAmount, "Tax Amount"),
    (FieldKey::TotalAmount, "Total Amount"),
    (FieldKey::Currency, "Currency"),
    (FieldKey::Description, "Description"),
    (FieldKey::DocumentType, "Document Type"),
    (FieldKey::PaymentMethod, "Payment Method"),
    (FieldKey::Reference, "Reference"),
];

const LABEL_ALIASES: &[(FieldKey, &[&str])] = &[
    (FieldKey::DueDate, &["рок на плаќање", "due date", "payment due"]),
    (
        FieldKey::SellerTaxId,
        &[
            "даночен број", "едб на продавач", "seller tax id", "vendor tax id", "supplier tax id",
            "seller vat id", "vendor vat id", "supplier vat id", "tax id", "vat id", "vat number",
        ],
    ),
    (
        FieldKey::SellerAddress,
        &["адреса", "address", "seller address", "vendor address", "supplier address"],
    ),
    (
        FieldKey::BuyerTaxId,
        &[
            "едб на купувач", "buyer tax id", "customer tax id", "client tax id", "buyer vat id",
            "customer vat id",
        ],
    ),
    (
        FieldKey::BuyerAddress,
        &["адреса на купувач", "buyer address", "customer address", "billing address"],
    ),
    (FieldKey::NetAmount, &["износ без ддв", "subtotal"]),
    (FieldKey::TotalAmount, &["вкупно за плаќање", "amount due"]),
    (FieldKey::Reference, &["po number"]),
];

/// Keyword lists, display labels and label aliases per field. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordTable {
    keywords: BTreeMap<FieldKey, Vec<String>>,
    labels: BTreeMap<FieldKey, String>,
    aliases: BTreeMap<FieldKey, Vec<String>>,
}

#[derive(Deserialize)]
struct KeywordTableFile {
    #[serde(default)]
    keywords: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    labels: BTreeMap<String, String>,
    #[serde(default)]
    aliases: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum KeywordTableError {
    #[error("Invalid keyword table: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Field(#[from] UnknownFieldKey),
}

impl Default for KeywordTable {
    fn default() -> Self {
        let keywords = HEADER_KEYWORDS
            .iter()
            .map(|(field, kws)| (*field, kws.iter().map(|k| k.to_string()).collect()))
            .collect();
        let labels = FIELD_LABELS
            .iter()
            .map(|(field, label)| (*field, label.to_string()))
            .collect();
        let aliases = LABEL_ALIASES
            .iter()
            .map(|(field, phrases)| (*field, phrases.iter().map(|p| p.to_string()).collect()))
            .collect();
        Self {
            keywords,
            labels,
            aliases,
        }
    }
}

impl KeywordTable {
    pub fn new(keywords: BTreeMap<FieldKey, Vec<String>>, labels: BTreeMap<FieldKey, String>) -> Self {
        Self {
            keywords,
            labels,
            aliases: BTreeMap::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: BTreeMap<FieldKey, Vec<String>>) -> Self {
        self.aliases = aliases;
        self
    }

    /// Load a locale/tenant table:
    /// `{"keywords": {"invoice_number": ["..."]}, "labels": {"invoice_number": "..."},
    /// "aliases": {"invoice_number": ["..."]}}`.
    pub fn from_json_str(json: &str) -> Result<Self, KeywordTableError> {
        let file: KeywordTableFile = serde_json::from_str(json)?;
        let mut keywords = BTreeMap::new();
        for (key, kws) in file.keywords {
            keywords.insert(key.parse::<FieldKey>()?, kws);
        }
        let mut labels = BTreeMap::new();
        for (key, label) in file.labels {
            labels.insert(key.parse::<FieldKey>()?, label);
        }
        let mut aliases = BTreeMap::new();
        for (key, phrases) in file.aliases {
            aliases.insert(key.parse::<FieldKey>()?, phrases);
        }
        Ok(Self {
            keywords,
            labels,
            aliases,
        })
    }

    pub fn keywords(&self, field: FieldKey) -> &[String] {
        self.keywords.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn label(&self, field: FieldKey) -> Option<&str> {
        self.labels.get(&field).map(String::as_str)
    }

    pub fn aliases(&self, field: FieldKey) -> &[String] {
        self.aliases.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }
}
