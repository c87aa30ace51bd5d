//! Invoice header-to-field mapping engine with its learning store, workbook
//! and OCR collaborators.

pub mod config;
pub mod db;
pub mod error;
pub mod excel;
pub mod learning;
pub mod mapping;
pub mod models;
pub mod ocr;
pub mod services;
pub mod types;

pub use config::{AzureConfig, MappingConfig, StrategyWeights};
pub use db::Db;
pub use error::{OcrError, SheetError, StoreError, WriteError};
pub use excel::{analyze_sheet, SheetSnapshot, SpreadsheetIo, XlsxWorkbook};
pub use learning::{fetch_learned_mappings, LearningStore};
pub use mapping::{record_outcome, MappingEngine, SheetMapping};
pub use models::{AggregatedMatch, FieldKey, LearnedMapping, MappingAction, MappingResult, StrategyId, StrategyResult};
pub use ocr::{scan_batch, AzureInvoiceClient, BatchScan, InvoiceExtractor, ScanFailure};
pub use types::{InvoiceData, InvoiceFieldValue, RowCell};
