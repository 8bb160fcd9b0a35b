//! Numeric CSV input
//!
//! Comma separated `f64` values, one sample per line. Blank lines and lines
//! starting with `#` are skipped; a first line that does not parse as numbers
//! is taken as a header.

use std::path::Path;

use anyhow::{bail, Context, Result};
use pipekit_core::Matrix;

pub fn read_matrix(path: &Path) -> Result<Matrix> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_matrix(&content).with_context(|| format!("invalid data in {}", path.display()))
}

pub fn parse_matrix(content: &str) -> Result<Matrix> {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut header_allowed = true;

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_row(line) {
            Ok(row) => rows.push(row),
            Err(_) if header_allowed => {}
            Err(e) => return Err(e.context(format!("line {}", index + 1))),
        }
        header_allowed = false;
    }

    if rows.is_empty() {
        bail!("no data rows");
    }
    Ok(Matrix::from_rows(&rows)?)
}

fn parse_row(line: &str) -> Result<Vec<f64>> {
    line.split(',')
        .map(|field| {
            let field = field.trim();
            field
                .parse::<f64>()
                .with_context(|| format!("'{}' is not a number", field))
        })
        .collect()
}

/// Split off the last `targets` columns as `y`
pub fn split_targets(data: &Matrix, targets: usize) -> Result<(Matrix, Matrix)> {
    if targets == 0 || targets >= data.cols() {
        bail!(
            "--targets must be between 1 and {} for {}-column data",
            data.cols().saturating_sub(1),
            data.cols()
        );
    }
    Ok(data.split_columns(data.cols() - targets)?)
}

/// One line per row, values comma separated
pub fn format_rows(m: &Matrix) -> String {
    m.iter_rows()
        .map(|row| {
            row.iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_header_and_comments() {
        let m = parse_matrix("a,b,y\n# comment\n1,2,3\n\n4, 5 ,6\n").unwrap();
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.row(1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_bad_field_after_header() {
        let err = parse_matrix("x,y\n1,2\n3,oops\n").unwrap_err();
        assert!(format!("{:#}", err).contains("line 3"));
    }

    #[test]
    fn test_ragged_rows() {
        assert!(parse_matrix("1,2\n3\n").is_err());
    }

    #[test]
    fn test_header_only() {
        assert!(parse_matrix("x,y\n").is_err());
    }

    #[test]
    fn test_split_targets() {
        let m = parse_matrix("1,2,3\n4,5,6\n").unwrap();
        let (x, y) = split_targets(&m, 1).unwrap();
        assert_eq!(x.shape(), (2, 2));
        assert_eq!(y.data(), &[3.0, 6.0]);
        assert!(split_targets(&m, 3).is_err());
        assert!(split_targets(&m, 0).is_err());
    }

    #[test]
    fn test_format_rows() {
        let m = parse_matrix("1.5,2\n-3,0\n").unwrap();
        assert_eq!(format_rows(&m), "1.5,2\n-3,0");
    }
}
