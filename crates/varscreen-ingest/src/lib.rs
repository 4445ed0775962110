//! Survey table ingestion utilities.
//!
//! This crate loads delimited survey tables into Polars DataFrames and
//! exposes their columns as parsed [`RawValue`](varscreen_model::RawValue)
//! cells.
//!
//! # Features
//!
//! - **CSV Loading**: Read tables with every column kept as text
//! - **Column Access**: Trimmed text or parsed cell values per column
//! - **Domain Discovery**: List the CSV files of a domain directory
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use varscreen_ingest::{SourceFrame, list_csv_files_matching};
//!
//! for path in list_csv_files_matching(Path::new("data/core/mental-health"), Some("_p_"))? {
//!     let frame = SourceFrame::load(&path)?;
//!     let subjects = frame.text_column("src_subject_id")?;
//! }
//! ```

mod discovery;
mod error;
mod frame;
mod reader;

// === Error Types ===
pub use error::{IngestError, Result};

// === CSV Reading ===
pub use frame::SourceFrame;
pub use reader::{read_csv_table, write_csv_table};

// === File Discovery ===
pub use discovery::{list_csv_files, list_csv_files_matching};
