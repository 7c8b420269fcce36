//! Delimited numeric table loading
//!
//! Files are comma separated when the first non-empty line has a comma;
//! otherwise columns are split on any run of spaces or tabs. `NaN` entries
//! are kept and left for the consumers to handle.

use crate::structs::{ConcordError, Result};
use csv::{ReaderBuilder, Trim};
use ndarray::Array2;
use std::fs;
use std::path::{Path, PathBuf};

/// A parsed numeric table with its optional header line
#[derive(Debug, Clone)]
pub struct NumericTable {
    pub headers: Option<Vec<String>>,
    pub data: Array2<f64>,
}

/// Optional header cells plus the cells of each data row
type Rows = (Option<Vec<String>>, Vec<Vec<String>>);

fn is_comma_separated(text: &str) -> bool {
    text.lines()
        .find(|l| !l.trim().is_empty())
        .is_some_and(|l| l.contains(','))
}

/// Header and data rows of a comma separated file
fn comma_rows(text: &str, has_header: bool) -> Result<Rows> {
    let mut reader = ReaderBuilder::new()
        .has_headers(has_header)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers = if has_header {
        Some(
            reader
                .headers()?
                .iter()
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    } else {
        None
    };

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(
            record
                .iter()
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        );
    }
    Ok((headers, rows))
}

/// Header and data rows of a file split on any run of whitespace
fn whitespace_rows(text: &str, has_header: bool) -> Rows {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let headers = if has_header {
        Some(
            lines
                .next()
                .map(|l| l.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
        )
    } else {
        None
    };
    let rows = lines
        .map(|l| l.split_whitespace().map(str::to_string).collect())
        .collect();
    (headers, rows)
}

/// Parse a numeric table, optionally skipping a header line
///
/// # Errors
/// `Io`/`Csv` for unreadable files, `Precondition` for ragged rows or
/// non-numeric cells, `EmptyInput` for a file without data rows
pub fn load_table(path: &Path, has_header: bool) -> Result<NumericTable> {
    let text = fs::read_to_string(path)?;
    let (headers, records) = if is_comma_separated(&text) {
        comma_rows(&text, has_header)?
    } else {
        whitespace_rows(&text, has_header)
    };

    let mut values = Vec::new();
    let mut width: Option<usize> = None;
    let mut rows = 0;

    for (r, fields) in records.iter().enumerate() {
        if fields.is_empty() {
            continue;
        }

        match width {
            None => width = Some(fields.len()),
            Some(w) if w != fields.len() => {
                return Err(ConcordError::Precondition(format!(
                    "{}: row {} has {} columns, expected {w}",
                    path.display(),
                    r + 1,
                    fields.len()
                )));
            }
            Some(_) => {}
        }

        for (c, field) in fields.iter().enumerate() {
            let value = field.parse::<f64>().map_err(|_| {
                ConcordError::Precondition(format!(
                    "{}: row {}, column {}: '{field}' is not a number",
                    path.display(),
                    r + 1,
                    c + 1
                ))
            })?;
            values.push(value);
        }
        rows += 1;
    }

    let Some(cols) = width else {
        return Err(ConcordError::EmptyInput(format!(
            "{}: no data rows",
            path.display()
        )));
    };

    let data = Array2::from_shape_vec((rows, cols), values)
        .map_err(|e| ConcordError::Precondition(format!("{}: {e}", path.display())))?;

    Ok(NumericTable { headers, data })
}

/// Parse a header-less numeric matrix
///
/// # Errors
/// See [`load_table`]
pub fn load_matrix(path: &Path) -> Result<Array2<f64>> {
    load_table(path, false).map(|t| t.data)
}

/// Files in `dir` whose name ends with `suffix`, sorted by name
///
/// # Errors
/// Returns `Io` if the directory cannot be read
pub fn list_files(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(suffix));
        if path.is_file() && matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Subject identifier of a file: its name without `suffix`
#[must_use]
pub fn subject_id(path: &Path, suffix: &str) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    name.strip_suffix(suffix).unwrap_or(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn create_test_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write");
        file
    }

    #[test]
    fn test_comma_matrix() {
        let file = create_test_file("0,1.5,NaN\n1.5,0,2\nnan,2,0\n");
        let m = load_matrix(file.path()).expect("matrix");
        assert_eq!(m.dim(), (3, 3));
        assert!((m[[0, 1]] - 1.5).abs() < 1e-12);
        assert!(m[[0, 2]].is_nan());
        assert!(m[[2, 0]].is_nan());
    }

    #[test]
    fn test_whitespace_matrix() {
        let file = create_test_file("  0   1\t\n1    0  \n\n");
        let m = load_matrix(file.path()).expect("matrix");
        assert_eq!(m, ndarray::array![[0.0, 1.0], [1.0, 0.0]]);
    }

    #[test]
    fn test_mixed_tabs_and_spaces() {
        let file = create_test_file("0\t1   2\n1 0\t\t3\n2   3 0\n");
        let m = load_matrix(file.path()).expect("matrix");
        assert_eq!(
            m,
            ndarray::array![[0.0, 1.0, 2.0], [1.0, 0.0, 3.0], [2.0, 3.0, 0.0]]
        );
    }

    #[test]
    fn test_tab_table_with_header() {
        let file = create_test_file("area\tthickness\n1.0\t2.5\n3.0\t4.5\n");
        let table = load_table(file.path(), true).expect("table");
        assert_eq!(
            table.headers,
            Some(vec!["area".to_string(), "thickness".to_string()])
        );
        assert_eq!(table.data.dim(), (2, 2));
    }

    #[test]
    fn test_ragged_and_bad_cells() {
        let ragged = create_test_file("1,2,3\n4,5\n");
        let err = load_matrix(ragged.path()).expect_err("ragged");
        assert!(err.to_string().contains("row 2 has 2 columns"));

        let text = create_test_file("1,2\n3,abc\n");
        let err = load_matrix(text.path()).expect_err("bad cell");
        assert!(err.to_string().contains("'abc' is not a number"));

        let empty = create_test_file("\n\n");
        assert!(matches!(
            load_matrix(empty.path()),
            Err(ConcordError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_list_files_and_ids() {
        let dir = TempDir::new().expect("temp dir");
        for name in ["sub-02_conn.csv", "sub-01_conn.csv", "notes.txt"] {
            fs::write(dir.path().join(name), "0").expect("write");
        }

        let files = list_files(dir.path(), "_conn.csv").expect("list");
        assert_eq!(files.len(), 2);
        assert_eq!(subject_id(&files[0], "_conn.csv"), "sub-01");
        assert_eq!(subject_id(&files[1], "_conn.csv"), "sub-02");
    }
}
