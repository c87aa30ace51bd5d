//! Invoice field extraction through Azure Document Intelligence (prebuilt-invoice).

use crate::config::AzureConfig;
use crate::error::OcrError;
use crate::models::FieldKey;
use crate::types::InvoiceData;
use futures::future::join_all;
use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const MAX_DOCUMENT_BYTES: u64 = 50 * 1024 * 1024;
const BATCH_CONCURRENCY: usize = 5;
pub const DEFAULT_DOCUMENT_TYPE: &str = "Фактура";

/// OCR collaborator: turns one document into extracted invoice fields.
pub trait InvoiceExtractor: Send + Sync {
    fn extract(&self, path: &Path, document_type_hint: Option<&str>) -> Result<InvoiceData, OcrError>;
}

/// A document that could not be scanned, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a batch scan; one document failing never drops the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchScan {
    pub successes: Vec<InvoiceData>,
    pub failures: Vec<ScanFailure>,
}

/// Scan `paths` on the blocking pool, at most five documents at a time.
/// Successes and failures each keep the input order.
pub async fn scan_batch(extractor: Arc<dyn InvoiceExtractor>, paths: Vec<PathBuf>, hint: Option<String>) -> BatchScan {
    let mut batch = BatchScan::default();
    for chunk in paths.chunks(BATCH_CONCURRENCY) {
        let handles: Vec<_> = chunk
            .iter()
            .map(|path| {
                let extractor = Arc::clone(&extractor);
                let path = path.clone();
                let hint = hint.clone();
                tokio::task::spawn_blocking(move || extractor.extract(&path, hint.as_deref()))
            })
            .collect();

        for (path, joined) in chunk.iter().zip(join_all(handles).await) {
            let error = match joined {
                Ok(Ok(invoice)) => {
                    batch.successes.push(invoice);
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(e) => format!("scan task failed: {}", e),
            };
            tracing::warn!(path = %path.display(), error = %error, "document scan failed");
            batch.failures.push(ScanFailure {
                path: path.clone(),
                error,
            });
        }
    }
    tracing::info!(
        scanned = batch.successes.len(),
        failed = batch.failures.len(),
        "batch scan finished"
    );
    batch
}

/// Azure prebuilt-invoice field name -> field key.
const AZURE_TO_FIELD: &[(&str, FieldKey)] = &[
    ("InvoiceId", FieldKey::InvoiceNumber),
    ("InvoiceDate", FieldKey::Date),
    ("DueDate", FieldKey::DueDate),
    ("VendorAddress", FieldKey::SellerAddress),
    ("VendorTaxId", FieldKey::SellerTaxId),
    ("CustomerAddress", FieldKey::BuyerAddress),
    ("CustomerTaxId", FieldKey::BuyerTaxId),
    ("InvoiceTotal", FieldKey::TotalAmount),
    ("SubTotal", FieldKey::NetAmount),
    ("TotalTax", FieldKey::TaxAmount),
    ("CurrencyCode", FieldKey::Currency),
    ("PaymentTerm", FieldKey::PaymentMethod),
    ("PurchaseOrder", FieldKey::Reference),
];

/// Check that `path` is a readable PDF within the size limit and return its bytes.
pub fn validate_document(path: &Path) -> Result<Vec<u8>, OcrError> {
    let metadata = fs::metadata(path)?;
    if metadata.len() > MAX_DOCUMENT_BYTES {
        return Err(OcrError::TooLarge);
    }
    let mut header = [0u8; 5];
    let mut file = fs::File::open(path)?;
    if file.read_exact(&mut header).is_err() || &header != b"%PDF-" {
        return Err(OcrError::InvalidFormat);
    }
    Ok(fs::read(path)?)
}

pub struct AzureInvoiceClient {
    config: AzureConfig,
    client: Client,
}

impl AzureInvoiceClient {
    pub fn new(config: AzureConfig) -> Result<Self, OcrError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| OcrError::Service(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self, OcrError> {
        Self::new(AzureConfig::from_env()?)
    }

    /// Submit the document and poll until the analysis finishes.
    fn analyze(&self, bytes: Vec<u8>) -> Result<Value, OcrError> {
        let response = self
            .client
            .post(self.config.invoice_analyze_url())
            .header("Ocp-Apim-Subscription-Key", &self.config.key)
            .header("Content-Type", "application/octet-stream")
            .body(bytes)
            .send()
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(error_for_status(status.as_u16(), &body));
        }
        let result_url = response
            .headers()
            .get("Operation-Location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| OcrError::Service("No Operation-Location in response".to_string()))?
            .to_string();

        for attempt in 1..=self.config.max_polls {
            std::thread::sleep(self.config.poll_interval);
            let poll: Value = self
                .client
                .get(&result_url)
                .header("Ocp-Apim-Subscription-Key", &self.config.key)
                .send()
                .map_err(map_transport_error)?
                .json()
                .map_err(|e| OcrError::Service(format!("Invalid JSON: {}", e)))?;
            match poll.get("status").and_then(Value::as_str).unwrap_or("") {
                "succeeded" => {
                    tracing::info!(attempt, "invoice analysis finished");
                    return poll
                        .get("analyzeResult")
                        .cloned()
                        .ok_or_else(|| OcrError::Service("No analyzeResult".to_string()));
                }
                "failed" => {
                    let message = poll
                        .pointer("/error/message")
                        .and_then(Value::as_str)
                        .unwrap_or("Unknown error");
                    return Err(OcrError::Service(message.to_string()));
                }
                status => tracing::debug!(attempt, status, "invoice analysis pending"),
            }
        }
        Err(OcrError::Timeout)
    }
}

impl InvoiceExtractor for AzureInvoiceClient {
    fn extract(&self, path: &Path, document_type_hint: Option<&str>) -> Result<InvoiceData, OcrError> {
        let bytes = validate_document(path)?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "submitting invoice for analysis");
        let result = self.analyze(bytes)?;
        let mut invoice = invoice_from_analyze_result(&result, document_type_hint)?;
        invoice.source_file = path.file_name().map(|n| n.to_string_lossy().into_owned());
        Ok(invoice)
    }
}

fn map_transport_error(e: reqwest::Error) -> OcrError {
    if e.is_connect() || e.is_timeout() {
        OcrError::Network
    } else {
        OcrError::Service(e.to_string())
    }
}

/// Error for a non-success HTTP status from the analyze call.
pub fn error_for_status(status: u16, body: &str) -> OcrError {
    match status {
        401 | 403 => OcrError::Auth,
        413 => OcrError::TooLarge,
        400 | 415 => OcrError::InvalidFormat,
        _ if body.trim().is_empty() => OcrError::Service(format!("HTTP {}", status)),
        _ => OcrError::Service(format!("HTTP {}: {}", status, body.trim())),
    }
}

/// Map a finished `analyzeResult` to invoice fields.
///
/// Party names are picked from several candidate fields; line-item
/// descriptions are joined into `description`, falling back to the full page
/// content. `document_type` comes from the hint (default "Фактура").
pub fn invoice_from_analyze_result(result: &Value, document_type_hint: Option<&str>) -> Result<InvoiceData, OcrError> {
    let fields = result
        .get("documents")
        .and_then(Value::as_array)
        .and_then(|docs| docs.first())
        .and_then(|doc| doc.get("fields"))
        .and_then(Value::as_object)
        .ok_or_else(|| OcrError::Service("No invoice fields in result".to_string()))?;

    let mut invoice = InvoiceData::default();
    for (azure_key, field) in AZURE_TO_FIELD {
        if let Some(obj) = fields.get(*azure_key) {
            let value = field_value(obj);
            if !value.is_empty() {
                invoice.set(*field, value, confidence(obj));
            }
        }
    }

    if let Some((name, conf)) = best_seller_name(fields) {
        invoice.set(FieldKey::SellerName, name, conf);
    }
    if let Some((name, conf)) = best_buyer_name(fields) {
        let same_as_seller = invoice
            .value(FieldKey::SellerName)
            .is_some_and(|seller| seller.eq_ignore_ascii_case(&name));
        if !same_as_seller {
            invoice.set(FieldKey::BuyerName, name, conf);
        }
    }

    let (description, desc_conf) = line_items_description(fields);
    if !description.is_empty() {
        invoice.set(FieldKey::Description, description, desc_conf);
    } else if let Some(content) = result.get("content").and_then(Value::as_str).map(str::trim) {
        if !content.is_empty() {
            invoice.set(FieldKey::Description, content, None);
        }
    }

    if invoice.value(FieldKey::Currency).is_none() {
        let code = ["InvoiceTotal", "SubTotal", "TotalTax"].iter().find_map(|key| {
            let obj = fields.get(*key)?;
            let code = obj.pointer("/valueCurrency/currencyCode").and_then(Value::as_str)?;
            Some((code.to_string(), confidence(obj)))
        });
        if let Some((code, conf)) = code {
            invoice.set(FieldKey::Currency, code, conf);
        }
    }

    let document_type = document_type_hint
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .unwrap_or(DEFAULT_DOCUMENT_TYPE);
    invoice.set(FieldKey::DocumentType, document_type, Some(1.0));

    tracing::debug!(fields = invoice.fields.len(), "mapped invoice fields");
    Ok(invoice)
}

fn confidence(obj: &Value) -> Option<f64> {
    obj.get("confidence").and_then(Value::as_f64)
}

fn trimmed(obj: &Value, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Typed value of an Azure field, then generic `value*` fallbacks, then raw content.
/// Numbers and currency amounts come out with two decimals.
pub fn field_value(obj: &Value) -> String {
    let typed = match obj.get("type").and_then(Value::as_str) {
        Some("string") => trimmed(obj, "valueString"),
        Some("address") => obj.get("valueAddress").and_then(|a| trimmed(a, "streetAddress")),
        Some("date") => trimmed(obj, "valueDate"),
        Some("time") => trimmed(obj, "valueTime"),
        Some("integer") => obj.get("valueNumber").and_then(Value::as_f64).map(|n| n.to_string()),
        Some("number") => obj.get("valueNumber").and_then(Value::as_f64).map(two_decimals),
        Some("currency") => obj
            .pointer("/valueCurrency/amount")
            .and_then(|a| a.as_f64().or_else(|| a.as_str().and_then(|s| s.trim().parse().ok())))
            .map(two_decimals),
        _ => None,
    };
    typed
        .or_else(|| trimmed(obj, "valueString"))
        .or_else(|| obj.get("valueNumber").and_then(Value::as_f64).map(two_decimals))
        .or_else(|| trimmed(obj, "valueDate"))
        .or_else(|| trimmed(obj, "valueTime"))
        .or_else(|| trimmed(obj, "content"))
        .unwrap_or_default()
}

// parse_amount reads a lone "." before three digits as grouping: "5.126" is 5126
fn two_decimals(amount: f64) -> String {
    format!("{:.2}", amount)
}

fn is_legal_form_token(token: &str) -> bool {
    let t = token.trim().trim_end_matches(['.', ',']).to_lowercase();
    matches!(
        t.as_str(),
        "doo" | "dooel" | "doel" | "доо" | "дооел" | "ад" | "ad" | "a.d" | "ood" | "gmbh" | "shpk" | "ltd"
    )
}

/// First non-blank line with whitespace collapsed.
fn clean_company_name(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

fn score_name_candidate(name: &str, confidence: Option<f64>) -> f64 {
    let mut score = confidence.unwrap_or(0.5);
    if name.split_whitespace().any(is_legal_form_token) {
        score += 0.1;
    }
    if name.chars().filter(|c| !c.is_whitespace()).count() > 15 {
        score += 0.05;
    }
    score
}

/// Highest-scoring seller name among the legal-name query field, VendorName
/// and the vendor address recipient.
fn best_seller_name(fields: &Map<String, Value>) -> Option<(String, Option<f64>)> {
    ["SellerLegalName", "VendorName", "VendorAddressRecipient"]
        .iter()
        .filter_map(|key| {
            let obj = fields.get(*key)?;
            let name = clean_company_name(&field_value(obj));
            (!name.is_empty()).then(|| (name, confidence(obj)))
        })
        .max_by(|a, b| score_name_candidate(&a.0, a.1).total_cmp(&score_name_candidate(&b.0, b.1)))
}

/// Buyer name by priority: CustomerName, address recipient, first address line.
fn best_buyer_name(fields: &Map<String, Value>) -> Option<(String, Option<f64>)> {
    ["BuyerLegalName", "CustomerName", "CustomerAddressRecipient", "CustomerAddress"]
        .iter()
        .find_map(|key| {
            let obj = fields.get(*key)?;
            let name = clean_company_name(&field_value(obj));
            (!name.is_empty() && !looks_like_street(&name)).then(|| (name, confidence(obj)))
        })
}

fn looks_like_street(line: &str) -> bool {
    let lower = line.to_lowercase();
    ["ул.", "ul.", "бул.", "bul.", "street", "str."]
        .iter()
        .any(|p| lower.starts_with(p))
}

/// Line-item descriptions joined one per line, with the Items confidence.
fn line_items_description(fields: &Map<String, Value>) -> (String, Option<f64>) {
    let Some(items) = fields.get("Items") else {
        return (String::new(), None);
    };
    let descriptions: Vec<String> = items
        .get("valueArray")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|item| item.get("valueObject")?.get("Description"))
                .filter_map(|d| trimmed(d, "valueString").or_else(|| trimmed(d, "content")))
                .collect()
        })
        .unwrap_or_default();
    (descriptions.join("\n"), confidence(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn sample_result() -> Value {
        json!({
            "content": "ФАКТУРА\nцела страница",
            "documents": [{
                "fields": {
                    "InvoiceId": {"type": "string", "valueString": " 12/2025 ", "confidence": 0.97},
                    "InvoiceDate": {"type": "date", "valueDate": "2025-01-22", "content": "22.01.2025"},
                    "VendorName": {"type": "string", "valueString": "Пример\nул. Нова 1", "confidence": 0.8},
                    "SellerLegalName": {"type": "string", "valueString": "Пример Трејд ДООЕЛ Скопје", "confidence": 0.75},
                    "CustomerName": {"type": "string", "content": "Купувач АД"},
                    "VendorAddress": {"type": "address", "valueAddress": {"streetAddress": "ул. Нова 1"}},
                    "InvoiceTotal": {"type": "currency", "valueCurrency": {"amount": 1180.0, "currencyCode": "MKD"}, "confidence": 0.9},
                    "TotalTax": {"type": "currency", "valueCurrency": {"amount": "180.5"}},
                    "Items": {
                        "confidence": 0.6,
                        "valueArray": [
                            {"valueObject": {"Description": {"valueString": "Транспорт"}}},
                            {"valueObject": {"Description": {"content": "Царинење"}}},
                            {"valueObject": {"Quantity": {"valueNumber": 1}}}
                        ]
                    }
                }
            }]
        })
    }

    #[test]
    fn maps_typed_fields() {
        let invoice = invoice_from_analyze_result(&sample_result(), None).unwrap();
        assert_eq!(invoice.value(FieldKey::InvoiceNumber), Some("12/2025"));
        assert_eq!(invoice.fields[&FieldKey::InvoiceNumber].confidence, Some(0.97));
        assert_eq!(invoice.value(FieldKey::Date), Some("2025-01-22"));
        assert_eq!(invoice.value(FieldKey::SellerAddress), Some("ул. Нова 1"));
        assert_eq!(invoice.value(FieldKey::TotalAmount), Some("1180.00"));
        assert_eq!(invoice.value(FieldKey::TaxAmount), Some("180.50"));
        assert_eq!(invoice.value(FieldKey::Currency), Some("MKD"));
        assert_eq!(invoice.value(FieldKey::Description), Some("Транспорт\nЦаринење"));
        assert_eq!(invoice.value(FieldKey::DocumentType), Some("Фактура"));
    }

    #[test]
    fn amounts_are_rounded_to_two_decimals() {
        let three_places = json!({"type": "currency", "valueCurrency": {"amount": 5.126}});
        assert_eq!(field_value(&three_places), "5.13");
        assert_eq!(crate::mapping::normalizer::parse_amount(&field_value(&three_places)), Some(5.13));
        assert_eq!(field_value(&json!({"type": "number", "valueNumber": 1234.5})), "1234.50");
        assert_eq!(field_value(&json!({"type": "integer", "valueNumber": 3})), "3");
    }

    #[test]
    fn picks_the_most_complete_seller_name() {
        let invoice = invoice_from_analyze_result(&sample_result(), Some("Профактура")).unwrap();
        assert_eq!(invoice.value(FieldKey::SellerName), Some("Пример Трејд ДООЕЛ Скопје"));
        assert_eq!(invoice.value(FieldKey::BuyerName), Some("Купувач АД"));
        assert_eq!(invoice.value(FieldKey::DocumentType), Some("Профактура"));
    }

    #[test]
    fn description_falls_back_to_page_content() {
        let result = json!({
            "content": "  цела страница  ",
            "documents": [{"fields": {"InvoiceId": {"content": "7"}}}]
        });
        let invoice = invoice_from_analyze_result(&result, None).unwrap();
        assert_eq!(invoice.value(FieldKey::InvoiceNumber), Some("7"));
        assert_eq!(invoice.value(FieldKey::Description), Some("цела страница"));
    }

    #[test]
    fn missing_documents_is_a_service_error() {
        let err = invoice_from_analyze_result(&json!({"documents": []}), None).unwrap_err();
        assert!(matches!(err, OcrError::Service(_)));
    }

    #[test]
    fn status_codes_map_to_error_kinds() {
        assert!(matches!(error_for_status(401, ""), OcrError::Auth));
        assert!(matches!(error_for_status(403, "denied"), OcrError::Auth));
        assert!(matches!(error_for_status(413, ""), OcrError::TooLarge));
        assert!(matches!(error_for_status(415, ""), OcrError::InvalidFormat));
        assert!(matches!(error_for_status(500, "boom"), OcrError::Service(m) if m.contains("boom")));
    }

    struct FakeExtractor;

    impl InvoiceExtractor for FakeExtractor {
        fn extract(&self, path: &Path, document_type_hint: Option<&str>) -> Result<InvoiceData, OcrError> {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if name.starts_with("bad") {
                return Err(OcrError::InvalidFormat);
            }
            let mut invoice = InvoiceData::default();
            invoice.set(FieldKey::InvoiceNumber, name, None);
            invoice.set(FieldKey::DocumentType, document_type_hint.unwrap_or(DEFAULT_DOCUMENT_TYPE), None);
            Ok(invoice)
        }
    }

    #[tokio::test]
    async fn batch_keeps_going_past_failures() {
        let paths: Vec<PathBuf> = ["a1.pdf", "bad1.pdf", "a2.pdf", "a3.pdf", "a4.pdf", "a5.pdf", "bad2.pdf", "a6.pdf"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let batch = scan_batch(Arc::new(FakeExtractor), paths, Some("Профактура".to_string())).await;

        let numbers: Vec<&str> = batch
            .successes
            .iter()
            .filter_map(|inv| inv.value(FieldKey::InvoiceNumber))
            .collect();
        assert_eq!(numbers, ["a1.pdf", "a2.pdf", "a3.pdf", "a4.pdf", "a5.pdf", "a6.pdf"]);
        assert!(batch
            .successes
            .iter()
            .all(|inv| inv.value(FieldKey::DocumentType) == Some("Профактура")));
        let failed: Vec<&Path> = batch.failures.iter().map(|f| f.path.as_path()).collect();
        assert_eq!(failed, [Path::new("bad1.pdf"), Path::new("bad2.pdf")]);
        assert_eq!(batch.failures[0].error, OcrError::InvalidFormat.to_string());
    }

    #[tokio::test]
    async fn empty_batch_is_empty() {
        let batch = scan_batch(Arc::new(FakeExtractor), Vec::new(), None).await;
        assert_eq!(batch, BatchScan::default());
    }

    #[test]
    fn validates_pdf_header() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("a.pdf");
        fs::File::create(&pdf).unwrap().write_all(b"%PDF-1.7\n...").unwrap();
        assert_eq!(validate_document(&pdf).unwrap().len(), 12);

        let txt = dir.path().join("a.txt");
        fs::write(&txt, b"hello world").unwrap();
        assert!(matches!(validate_document(&txt), Err(OcrError::InvalidFormat)));

        let short = dir.path().join("short.pdf");
        fs::write(&short, b"%P").unwrap();
        assert!(matches!(validate_document(&short), Err(OcrError::InvalidFormat)));

        assert!(matches!(validate_document(&dir.path().join("missing.pdf")), Err(OcrError::Io(_))));
    }
}
