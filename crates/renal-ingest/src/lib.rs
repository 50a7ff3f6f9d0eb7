//! Registry data ingestion.
//!
//! This crate reads the long-format registry CSV tables into Polars
//! DataFrames, merges per-center exports into one deduplicated dataset, and
//! converts the merged tables into the typed records of `renal-model`.
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use renal_ingest::{discover_center_dirs, merge_centers, write_merged_tables, load_dataset};
//!
//! let centers = discover_center_dirs(Path::new("centers"))?;
//! let merged = merge_centers(&centers)?;
//! write_merged_tables(&merged, Path::new("data"))?;
//!
//! let dataset = load_dataset(Path::new("data"))?;
//! ```

mod csv_table;
mod discovery;
mod error;
mod loader;
mod merge;
mod parse;
mod polars_utils;
mod records;
mod tables;

// === Error Types ===
pub use error::{IngestError, Result};

// === CSV Reading ===
pub use csv_table::{has_column, read_csv_frame, require_columns};

// === Center Discovery ===
pub use discovery::discover_center_dirs;

// === Loading ===
pub use loader::load_dataset;
pub use records::{
    event_records, lab_records, medication_records, patient_records, variant_records,
    visit_records,
};

// === Merge ===
pub use merge::{
    CenterSummary, DuplicateGroup, MergeReport, MergedTables, PatientCollision, merge_centers,
    write_merged_tables,
};

// === Parsing ===
pub use parse::{parse_date, parse_number, parse_year};
pub use polars_utils::{any_to_string, column_strings};

// === Table Definitions ===
pub use tables::TableKind;
