//! Multi-center merge with first-occurrence deduplication.
//!
//! Each center exports the same six tables. Merging unions their columns,
//! drops repeated records by each table's dedup key, sorts, and collects the
//! QC findings (missing files, duplicates, cross-center code collisions)
//! into a [`MergeReport`] instead of failing.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use polars::prelude::{
    BooleanChunked, Column, CsvWriter, DataFrame, DataType, NewChunkedArray, SerWriter,
    SortMultipleOptions,
};

use crate::csv_table::{has_column, read_csv_frame};
use crate::error::{IngestError, Result};
use crate::polars_utils::column_strings;
use crate::tables::TableKind;

/// Per-center row counts as loaded, before deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CenterSummary {
    pub directory: PathBuf,
    /// The center codes found in the center's patients table, or the
    /// directory path when there are none.
    pub center_code: String,
    pub patients_n: usize,
    pub visits_n: usize,
}

/// One key that occurred more than once in a merged table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub table: TableKind,
    /// (column, value) pairs of the dedup key.
    pub key: Vec<(String, String)>,
    /// Rows of the table involved in any duplicate group.
    pub duplicate_rows: usize,
}

/// A patient code used by more than one center.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientCollision {
    pub patient_code: String,
    pub center_codes: Vec<String>,
}

impl PatientCollision {
    pub fn n_centers(&self) -> usize {
        self.center_codes.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    pub centers: Vec<CenterSummary>,
    pub warnings: Vec<String>,
    pub duplicates: Vec<DuplicateGroup>,
    pub collisions: Vec<PatientCollision>,
    pub row_counts: Vec<(TableKind, usize)>,
}

#[derive(Debug, Clone, Default)]
pub struct MergedTables {
    pub tables: BTreeMap<TableKind, DataFrame>,
    pub report: MergeReport,
}

impl MergedTables {
    pub fn table(&self, table: TableKind) -> Option<&DataFrame> {
        self.tables.get(&table)
    }

    pub fn row_count(&self, table: TableKind) -> usize {
        self.table(table).map_or(0, DataFrame::height)
    }

    /// Distinct non-blank center codes in the merged patients table.
    pub fn center_code_count(&self) -> usize {
        self.table(TableKind::Patients)
            .map(|df| {
                column_strings(df, "center_code")
                    .into_iter()
                    .flatten()
                    .collect::<BTreeSet<_>>()
                    .len()
            })
            .unwrap_or(0)
    }
}

/// Merges the tables of every center directory, in the order given.
pub fn merge_centers(center_dirs: &[PathBuf]) -> Result<MergedTables> {
    let mut report = MergeReport::default();
    let mut raw: BTreeMap<TableKind, Vec<DataFrame>> = BTreeMap::new();

    for dir in center_dirs {
        let span = tracing::info_span!("center", dir = %dir.display());
        let _guard = span.enter();

        if !dir.is_dir() {
            warn(&mut report, format!("[SKIP] Directory not found: {}", dir.display()));
            continue;
        }

        let mut summary = CenterSummary {
            directory: dir.clone(),
            center_code: dir.display().to_string(),
            patients_n: 0,
            visits_n: 0,
        };

        for table in TableKind::ALL {
            let Some(df) = load_center_table(dir, table, &mut report) else {
                continue;
            };
            tracing::debug!(table = %table, rows = df.height(), "center table loaded");
            match table {
                TableKind::Patients => {
                    summary.patients_n = df.height();
                    if let Some(label) = center_label(&df) {
                        summary.center_code = label;
                    }
                }
                TableKind::Visits => summary.visits_n = df.height(),
                _ => {}
            }
            raw.entry(table).or_default().push(df);
        }
        report.centers.push(summary);
    }

    let mut tables = BTreeMap::new();
    for table in TableKind::ALL {
        let frames = raw.remove(&table).unwrap_or_default();
        if frames.is_empty() {
            if table.required_for_merge() {
                tracing::warn!(table = %table, "no data from any center");
            } else {
                tracing::info!(table = %table, "optional table absent from every center");
            }
            report.row_counts.push((table, 0));
            tables.insert(table, DataFrame::empty());
            continue;
        }

        let combined = concat_union(frames)?;
        let before = combined.height();
        let (deduped, groups) = dedupe_table(&combined, table)?;
        let merged = sort_table(deduped, table)?;
        tracing::info!(
            table = %table,
            rows = merged.height(),
            dropped = before - merged.height(),
            "table merged"
        );
        report.duplicates.extend(groups);
        report.row_counts.push((table, merged.height()));
        tables.insert(table, merged);
    }

    if let Some(patients) = tables.get(&TableKind::Patients) {
        report.collisions = patient_collisions(patients);
    }
    if !report.collisions.is_empty() {
        let message = format!(
            "[WARN] {} patient_code(s) appear in >1 center_code; confirm these are truly different patients.",
            report.collisions.len()
        );
        warn(&mut report, message);
    }

    Ok(MergedTables { tables, report })
}

fn warn(report: &mut MergeReport, message: String) {
    tracing::warn!("{message}");
    report.warnings.push(message);
}

/// Reads one center table, recording why it was left out when it is.
fn load_center_table(dir: &Path, table: TableKind, report: &mut MergeReport) -> Option<DataFrame> {
    let path = dir.join(table.file_name());
    if !path.is_file() {
        if table.required_for_merge() {
            warn(
                report,
                format!(
                    "[WARN] {}: required file '{}' not found.",
                    dir.display(),
                    table.file_name()
                ),
            );
        } else {
            tracing::debug!(table = %table, "optional table not present");
        }
        return None;
    }

    let df = match read_csv_frame(&path) {
        Ok(df) => df,
        Err(err) => {
            warn(report, format!("[SKIP] {}: {err}", path.display()));
            return None;
        }
    };

    if let Some(missing) = table
        .required_columns()
        .iter()
        .find(|column| !has_column(&df, column))
    {
        warn(
            report,
            format!(
                "[SKIP] {}: required column '{missing}' missing; file excluded.",
                path.display()
            ),
        );
        return None;
    }

    let blank = column_strings(&df, "center_code")
        .iter()
        .filter(|value| value.is_none())
        .count();
    if blank > 0 {
        warn(
            report,
            format!(
                "[WARN] {}: {blank} rows have blank center_code; kept but flagged.",
                path.display()
            ),
        );
    }
    Some(df)
}

fn center_label(patients: &DataFrame) -> Option<String> {
    let mut codes: Vec<String> = Vec::new();
    for code in column_strings(patients, "center_code").into_iter().flatten() {
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    if codes.is_empty() {
        None
    } else {
        Some(codes.join(", "))
    }
}

/// Stacks frames with the union of their columns, in first-seen order.
fn concat_union(frames: Vec<DataFrame>) -> Result<DataFrame> {
    let mut columns: Vec<String> = Vec::new();
    for df in &frames {
        for name in df.get_column_names() {
            if !columns.iter().any(|c| c == name.as_str()) {
                columns.push(name.to_string());
            }
        }
    }

    let mut iter = frames.into_iter();
    let Some(first) = iter.next() else {
        return Ok(DataFrame::empty());
    };
    let mut combined = align_columns(&first, &columns)?;
    for df in iter {
        combined.vstack_mut(&align_columns(&df, &columns)?)?;
    }
    Ok(combined)
}

fn align_columns(df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
    let aligned: Vec<Column> = columns
        .iter()
        .map(|name| match df.column(name) {
            Ok(column) => column.clone(),
            Err(_) => Column::full_null(name.as_str().into(), df.height(), &DataType::String),
        })
        .collect();
    Ok(DataFrame::new(aligned)?)
}

/// Keeps the first row of every dedup key present in the frame.
///
/// Rows whose whole key is blank cannot be matched and are always kept.
fn dedupe_table(df: &DataFrame, table: TableKind) -> Result<(DataFrame, Vec<DuplicateGroup>)> {
    let key_columns: Vec<&str> = table
        .dedup_key()
        .iter()
        .copied()
        .filter(|column| has_column(df, column))
        .collect();
    if key_columns.is_empty() || df.height() == 0 {
        return Ok((df.clone(), Vec::new()));
    }

    let values: Vec<Vec<Option<String>>> = key_columns
        .iter()
        .map(|column| column_strings(df, column))
        .collect();
    let composites: Vec<Option<Vec<&str>>> = (0..df.height())
        .map(|idx| {
            let parts: Vec<&str> = values
                .iter()
                .map(|column| column[idx].as_deref().unwrap_or(""))
                .collect();
            if parts.iter().all(|part| part.is_empty()) {
                None
            } else {
                Some(parts)
            }
        })
        .collect();

    let mut counts: BTreeMap<&[&str], usize> = BTreeMap::new();
    for composite in composites.iter().flatten() {
        *counts.entry(composite.as_slice()).or_default() += 1;
    }
    let duplicate_rows: usize = counts.values().filter(|n| **n > 1).sum();

    let mut seen: BTreeSet<&[&str]> = BTreeSet::new();
    let mut keep = Vec::with_capacity(df.height());
    let mut groups = Vec::new();
    for (idx, composite) in composites.iter().enumerate() {
        let Some(composite) = composite else {
            keep.push(true);
            continue;
        };
        let first = seen.insert(composite.as_slice());
        if first && counts.get(composite.as_slice()).copied().unwrap_or(0) > 1 {
            groups.push(DuplicateGroup {
                table,
                key: key_columns
                    .iter()
                    .zip(&values)
                    .map(|(name, column)| {
                        ((*name).to_string(), column[idx].clone().unwrap_or_default())
                    })
                    .collect(),
                duplicate_rows,
            });
        }
        keep.push(first);
    }

    let mask = BooleanChunked::from_slice("dedupe".into(), &keep);
    Ok((df.filter(&mask)?, groups))
}

fn sort_table(df: DataFrame, table: TableKind) -> Result<DataFrame> {
    let by: Vec<&str> = table
        .sort_columns()
        .iter()
        .copied()
        .filter(|column| has_column(&df, column))
        .collect();
    if by.is_empty() {
        return Ok(df);
    }
    let options = SortMultipleOptions::default()
        .with_maintain_order(true)
        .with_nulls_last(true);
    Ok(df.sort(by, options)?)
}

fn patient_collisions(patients: &DataFrame) -> Vec<PatientCollision> {
    let centers = column_strings(patients, "center_code");
    let codes = column_strings(patients, "patient_code");

    let mut by_code: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (center, code) in centers.into_iter().zip(codes) {
        let (Some(center), Some(code)) = (center, code) else {
            continue;
        };
        let entry = by_code.entry(code).or_default();
        if !entry.contains(&center) {
            entry.push(center);
        }
    }

    by_code
        .into_iter()
        .filter(|(_, centers)| centers.len() > 1)
        .map(|(patient_code, center_codes)| PatientCollision {
            patient_code,
            center_codes,
        })
        .collect()
}

/// Writes every non-empty merged table as CSV into `out_dir`.
///
/// Returns the written paths in table order.
pub fn write_merged_tables(merged: &MergedTables, out_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir).map_err(|e| IngestError::FileWrite {
        path: out_dir.to_path_buf(),
        source: e,
    })?;

    let mut written = Vec::new();
    for (table, df) in &merged.tables {
        if df.height() == 0 {
            continue;
        }
        let path = out_dir.join(table.file_name());
        let mut file = File::create(&path).map_err(|e| IngestError::FileWrite {
            path: path.clone(),
            source: e,
        })?;
        let mut df = df.clone();
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)?;
        tracing::debug!(path = %path.display(), rows = df.height(), "merged table written");
        written.push(path);
    }
    Ok(written)
}
