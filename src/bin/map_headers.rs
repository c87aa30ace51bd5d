//! Suggest a column mapping for one sheet of a workbook and print it as JSON.
//!
//! Run `map_headers --help` for the arguments.

use clap::Parser;
use invoice_mapper::{analyze_sheet, Db, LearningStore, MappingEngine};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Suggest a field mapping for the header row of one worksheet.")]
struct Cli {
    /// Workbook to read (.xlsx).
    workbook: PathBuf,

    /// Worksheet name.
    sheet: String,

    /// 1-based row holding the column headers.
    #[arg(default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    header_row: u32,

    /// Learning database; defaults to the app data folder.
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,
}

/// App data folder; a `.env` placed there is loaded too.
fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("invoice-mapper")
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();

    let data_dir = app_data_dir();
    let env_path = data_dir.join(".env");
    if env_path.exists() {
        let _ = dotenvy::from_path(&env_path);
    }
    let db_path = args.db.unwrap_or_else(|| data_dir.join("invoice_scanner.db"));
    let store: Arc<dyn LearningStore> = match Db::open(&db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            tracing::error!(path = %db_path.display(), error = %e, "could not open learning database");
            return ExitCode::FAILURE;
        }
    };

    let snapshot = match analyze_sheet(&args.workbook, &args.sheet, args.header_row) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::error!(path = %args.workbook.display(), error = %e, "could not read sheet");
            return ExitCode::FAILURE;
        }
    };

    let engine = MappingEngine::default();
    let suggestion = engine.suggest(store, &snapshot.headers, &snapshot.samples).await;
    let output = serde_json::json!({
        "schemaHash": suggestion.schema_hash,
        "headers": snapshot.headers,
        "mapping": suggestion.result.mapping,
        "confidence": suggestion.result.confidence,
        "evidence": suggestion.result.evidence,
    });
    match serde_json::to_string_pretty(&output) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "could not serialize mapping");
            ExitCode::FAILURE
        }
    }
}
