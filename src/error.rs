//! Errors raised by the collaborators around the mapping core.
//!
//! The core itself never fails; these cover the learning store, workbook
//! access, OCR, and the write path. Messages are shown to the user as-is.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Could not create database folder: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("File not found. Browse to select again.")]
    NotFound,
    #[error("Could not open Excel file: {0}")]
    Open(String),
    #[error("Sheet '{0}' not found.")]
    SheetMissing(String),
    #[error("Please close the file in Excel first.")]
    Locked,
    #[error("Cannot write to file: {0}")]
    Write(String),
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Check your internet connection and try again.")]
    Network,
    #[error("OCR service rejected the credentials. Check AZURE_OCR_KEY and AZURE_OCR_ENDPOINT.")]
    Auth,
    #[error("File too large (max 50MB).")]
    TooLarge,
    #[error("Not a valid PDF file.")]
    InvalidFormat,
    #[error("OCR timed out. Try again.")]
    Timeout,
    #[error("OCR failed: {0}")]
    Service(String),
    #[error("{0}")]
    Config(String),
    #[error("Could not read file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Sheet(#[from] SheetError),
    #[error("Nothing to write: no column is mapped to an extracted field.")]
    EmptyRow,
}
