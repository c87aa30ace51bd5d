pub mod row_writer;

pub use row_writer::{build_row, commit_row, format_amount, RowTarget};
