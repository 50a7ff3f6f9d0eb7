//! Polars AnyValue helpers.

use polars::prelude::{AnyValue, DataFrame};

/// Text of a cell; null reads as empty.
///
/// Registry frames are read as all-text, so only string cells occur in
/// practice.
pub fn any_to_string(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        other => other.to_string(),
    }
}

/// All values of a column as trimmed, non-blank strings.
///
/// A column the frame does not have yields one `None` per row.
pub fn column_strings(df: &DataFrame, name: &str) -> Vec<Option<String>> {
    let Ok(column) = df.column(name) else {
        return vec![None; df.height()];
    };
    (0..df.height())
        .map(|idx| {
            let value = any_to_string(column.get(idx).unwrap_or(AnyValue::Null));
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{Column, NamedFrom};

    #[test]
    fn test_any_to_string() {
        assert_eq!(any_to_string(AnyValue::Null), "");
        assert_eq!(any_to_string(AnyValue::String("abc")), "abc");
    }

    #[test]
    fn test_column_strings_blank_and_missing() {
        let df = DataFrame::new(vec![Column::new(
            "sex".into(),
            &[Some(" F "), Some(""), None],
        )])
        .unwrap();

        assert_eq!(
            column_strings(&df, "sex"),
            vec![Some("F".to_string()), None, None]
        );
        assert_eq!(column_strings(&df, "module"), vec![None, None, None]);
    }

    #[test]
    fn test_numeric_text_is_kept_verbatim() {
        let df = DataFrame::new(vec![Column::new(
            "baseline_scr".into(),
            &[Some("88.40"), Some("0120")],
        )])
        .unwrap();

        assert_eq!(
            column_strings(&df, "baseline_scr"),
            vec![Some("88.40".to_string()), Some("0120".to_string())]
        );
    }
}
