//! CSV voltage batches in, CSV occupations out.

use crate::error::{CliError, Result};
use ndarray::{Array2, ArrayView2};
use std::path::Path;
use tracing::debug;

fn parsing_error(path: &Path, message: String) -> CliError {
    CliError::FileParsing {
        path: path.to_path_buf(),
        source: anyhow::anyhow!(message),
    }
}

/// Reads one gate-voltage vector per row. Lines starting with `#` are comments, and a
/// leading row that is not numeric is taken as a header and skipped.
pub fn read_voltages(path: &Path) -> Result<Array2<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;

    let mut values = Vec::new();
    let mut n_rows = 0;
    let mut n_cols = None;

    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        let parsed: std::result::Result<Vec<f64>, _> =
            record.iter().map(str::parse::<f64>).collect();
        let row = match parsed {
            Ok(row) => row,
            Err(_) if line == 0 => {
                debug!("Skipping header row of {:?}", path);
                continue;
            }
            Err(e) => {
                return Err(parsing_error(path, format!("row {}: {}", line + 1, e)));
            }
        };

        match n_cols {
            None => n_cols = Some(row.len()),
            Some(expected) if expected != row.len() => {
                return Err(parsing_error(
                    path,
                    format!(
                        "row {} has {} columns, expected {}",
                        line + 1,
                        row.len(),
                        expected
                    ),
                ));
            }
            Some(_) => {}
        }
        values.extend(row);
        n_rows += 1;
    }

    let n_cols =
        n_cols.ok_or_else(|| parsing_error(path, "file contains no voltage rows".to_string()))?;
    debug!(rows = n_rows, columns = n_cols, "Read voltage batch.");
    Array2::from_shape_vec((n_rows, n_cols), values).map_err(|e| parsing_error(path, e.to_string()))
}

/// Writes one occupation vector per row under an `n0,n1,...` header.
pub fn write_occupations(path: &Path, occupations: ArrayView2<f64>) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })?;

    let header: Vec<String> = (0..occupations.ncols()).map(|i| format!("n{i}")).collect();
    let to_parsing_error = |e: csv::Error| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    };
    writer.write_record(&header).map_err(to_parsing_error)?;
    for row in occupations.rows() {
        writer
            .write_record(row.iter().map(|n| n.to_string()))
            .map_err(to_parsing_error)?;
    }
    writer.flush()?;
    Ok(())
}
