use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic invoice field that a spreadsheet column can hold.
///
/// The set is closed: OCR output, keyword tables, pattern tables and learned
/// mappings all key on these names (`invoice_number`, `total_amount`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    InvoiceNumber,
    Date,
    DueDate,
    SellerName,
    SellerTaxId,
    SellerAddress,
    BuyerName,
    BuyerTaxId,
    BuyerAddress,
    NetAmount,
    TaxAmount,
    TotalAmount,
    Currency,
    Description,
    DocumentType,
    PaymentMethod,
    Reference,
}

impl FieldKey {
    pub const ALL: [FieldKey; 17] = [
        FieldKey::InvoiceNumber,
        FieldKey::Date,
        FieldKey::DueDate,
        FieldKey::SellerName,
        FieldKey::SellerTaxId,
        FieldKey::SellerAddress,
        FieldKey::BuyerName,
        FieldKey::BuyerTaxId,
        FieldKey::BuyerAddress,
        FieldKey::NetAmount,
        FieldKey::TaxAmount,
        FieldKey::TotalAmount,
        FieldKey::Currency,
        FieldKey::Description,
        FieldKey::DocumentType,
        FieldKey::PaymentMethod,
        FieldKey::Reference,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKey::InvoiceNumber => "invoice_number",
            FieldKey::Date => "date",
            FieldKey::DueDate => "due_date",
            FieldKey::SellerName => "seller_name",
            FieldKey::SellerTaxId => "seller_tax_id",
            FieldKey::SellerAddress => "seller_address",
            FieldKey::BuyerName => "buyer_name",
            FieldKey::BuyerTaxId => "buyer_tax_id",
            FieldKey::BuyerAddress => "buyer_address",
            FieldKey::NetAmount => "net_amount",
            FieldKey::TaxAmount => "tax_amount",
            FieldKey::TotalAmount => "total_amount",
            FieldKey::Currency => "currency",
            FieldKey::Description => "description",
            FieldKey::DocumentType => "document_type",
            FieldKey::PaymentMethod => "payment_method",
            FieldKey::Reference => "reference",
        }
    }

    /// Money fields are written as formatted amounts rather than raw text.
    pub fn is_amount(self) -> bool {
        matches!(
            self,
            FieldKey::NetAmount | FieldKey::TaxAmount | FieldKey::TotalAmount
        )
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFieldKey(pub String);

impl fmt::Display for UnknownFieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown field key '{}'", self.0)
    }
}

impl std::error::Error for UnknownFieldKey {}

impl FromStr for FieldKey {
    type Err = UnknownFieldKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        FieldKey::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == key)
            .ok_or_else(|| UnknownFieldKey(key.to_string()))
    }
}
