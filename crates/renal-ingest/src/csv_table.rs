//! CSV table reading.

use std::path::Path;

use polars::prelude::{CsvReadOptions, DataFrame, SerReader};

use crate::error::{IngestError, Result};

/// Reads a registry CSV into a DataFrame with every column as text.
///
/// Header names are trimmed and a leading UTF-8 BOM is dropped. Empty cells
/// become nulls; typing happens later, per column, in the record converters.
pub fn read_csv_frame(path: &Path) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(IngestError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| IngestError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .finish()
        .map_err(|e| IngestError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    normalize_headers(&mut df)?;
    tracing::debug!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "loaded table"
    );
    Ok(df)
}

fn normalize_headers(df: &mut DataFrame) -> Result<()> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    for name in names {
        let cleaned = name.trim_start_matches('\u{feff}').trim();
        if cleaned != name {
            df.rename(&name, cleaned.into())?;
        }
    }
    Ok(())
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

/// Fails on the first of `columns` the frame lacks.
pub fn require_columns(df: &DataFrame, columns: &[&str], path: &Path) -> Result<()> {
    for column in columns {
        if !has_column(df, column) {
            return Err(IngestError::MissingColumn {
                column: (*column).to_string(),
                path: path.to_path_buf(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_reads_all_columns_as_text() {
        let file = create_temp_csv("center_code,patient_code,egfr\nC1,001,45.5\nC1,002,\n");
        let df = read_csv_frame(file.path()).unwrap();

        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 3);
        let egfr = df.column("egfr").unwrap();
        assert_eq!(egfr.dtype(), &polars::prelude::DataType::String);
        assert_eq!(egfr.null_count(), 1);
        // Leading zeros survive because nothing is inferred as numeric.
        let codes = crate::column_strings(&df, "patient_code");
        assert_eq!(codes[0].as_deref(), Some("001"));
    }

    #[test]
    fn test_header_bom_and_whitespace_removed() {
        let file = create_temp_csv("\u{feff}center_code, patient_code \nC1,P1\n");
        let df = read_csv_frame(file.path()).unwrap();

        assert!(has_column(&df, "center_code"));
        assert!(has_column(&df, "patient_code"));
    }

    #[test]
    fn test_missing_file() {
        let result = read_csv_frame(Path::new("/nonexistent/patients_baseline.csv"));
        assert!(matches!(result, Err(IngestError::FileNotFound { .. })));
    }

    #[test]
    fn test_require_columns_reports_first_missing() {
        let file = create_temp_csv("center_code,patient_code\nC1,P1\n");
        let df = read_csv_frame(file.path()).unwrap();

        let err = require_columns(&df, &["center_code", "module", "patient_code"], file.path())
            .unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn { ref column, .. } if column == "module"));
    }
}
