//! # Dense Matrices
//!
//! Row-major `f64` matrices: rows are samples, columns are features.
//!
//! ## Operations
//!
//! | Operation | Description |
//! |-----------|-------------|
//! | `project` | `X · Wᵗ + b` (linear layer) |
//! | `row_products` | Row-wise product of all columns |
//! | `add` | Element-wise sum |
//! | `hstack` | Column-wise concatenation |
//! | `scatter_columns` | Place columns into a wider zero matrix |
//!
//! Shapes are validated on construction, including deserialization.

use serde::{Deserialize, Serialize};

use crate::error::{PipeError, Result};

/// Dense row-major matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMatrix")]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

#[derive(Deserialize)]
struct RawMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl TryFrom<RawMatrix> for Matrix {
    type Error = PipeError;

    fn try_from(raw: RawMatrix) -> Result<Self> {
        Matrix::new(raw.rows, raw.cols, raw.data)
    }
}

impl Matrix {
    /// Create matrix from row-major data
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        let len = Self::checked_len(rows, cols)?;
        if data.len() != len {
            return Err(PipeError::InvalidInput(format!(
                "{}x{} matrix needs {} values, got {}",
                rows,
                cols,
                len,
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Element count of a `rows x cols` matrix, rejecting overflow
    pub fn checked_len(rows: usize, cols: usize) -> Result<usize> {
        rows.checked_mul(cols).ok_or_else(|| {
            PipeError::InvalidInput(format!("{}x{} matrix is too large", rows, cols))
        })
    }

    /// Zero matrix
    ///
    /// # Panics
    ///
    /// If `rows * cols` overflows `usize`; see [`Matrix::try_filled`].
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 0.0)
    }

    /// Constant matrix
    ///
    /// # Panics
    ///
    /// If `rows * cols` overflows `usize`; see [`Matrix::try_filled`].
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        match Self::try_filled(rows, cols, value) {
            Ok(m) => m,
            Err(e) => panic!("{}", e),
        }
    }

    /// Constant matrix with an overflow-checked size
    pub fn try_filled(rows: usize, cols: usize, value: f64) -> Result<Self> {
        let len = Self::checked_len(rows, cols)?;
        Ok(Self {
            rows,
            cols,
            data: vec![value; len],
        })
    }

    /// Create matrix from a list of rows; all rows must share a width
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(PipeError::InvalidInput(format!(
                    "row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    cols
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Single-column matrix
    pub fn column(values: Vec<f64>) -> Self {
        Self {
            rows: values.len(),
            cols: 1,
            data: values,
        }
    }

    /// Single-row matrix
    pub fn row_vector(values: Vec<f64>) -> Self {
        Self {
            rows: 1,
            cols: values.len(),
            data: values,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    /// Borrow one row
    pub fn row(&self, index: usize) -> &[f64] {
        let start = index * self.cols;
        &self.data[start..start + self.cols]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact(0) panics, zero-width matrices yield empty rows instead
        let width = self.cols.max(1);
        let empty = self.cols == 0;
        (0..self.rows).map(move |i| {
            if empty {
                &self.data[0..0]
            } else {
                &self.data[i * width..(i + 1) * width]
            }
        })
    }

    /// Linear projection: `self · weightᵗ + bias`
    ///
    /// `weight` is `(out, in)`, `bias` is `(1, out)`.
    pub fn project(&self, weight: &Matrix, bias: Option<&Matrix>) -> Result<Matrix> {
        if weight.cols != self.cols {
            return Err(PipeError::shape((weight.rows, self.cols), weight.shape()));
        }
        if let Some(b) = bias {
            if b.shape() != (1, weight.rows) {
                return Err(PipeError::shape((1, weight.rows), b.shape()));
            }
        }

        let out = weight.rows;
        let mut result = Matrix::zeros(self.rows, out);
        for i in 0..self.rows {
            let x = self.row(i);
            for j in 0..out {
                let w = weight.row(j);
                let mut sum: f64 = x.iter().zip(w).map(|(a, b)| a * b).sum();
                if let Some(b) = bias {
                    sum += b.data[j];
                }
                result.data[i * out + j] = sum;
            }
        }
        Ok(result)
    }

    /// Row-wise product of all columns, as a column vector
    pub fn row_products(&self) -> Matrix {
        Matrix::column(self.iter_rows().map(|r| r.iter().product()).collect())
    }

    /// Element-wise sum
    pub fn add(&self, other: &Matrix) -> Result<Matrix> {
        let mut result = self.clone();
        result.add_assign(other)?;
        Ok(result)
    }

    /// In-place element-wise sum
    pub fn add_assign(&mut self, other: &Matrix) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(PipeError::shape(self.shape(), other.shape()));
        }
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += b;
        }
        Ok(())
    }

    /// Apply `f` to every element
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Matrix {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Column-wise concatenation; all parts must have the same row count
    pub fn hstack(parts: &[Matrix]) -> Result<Matrix> {
        let rows = parts.first().map_or(0, |p| p.rows);
        if let Some(bad) = parts.iter().find(|p| p.rows != rows) {
            return Err(PipeError::shape((rows, bad.cols), bad.shape()));
        }

        let cols: usize = parts.iter().map(|p| p.cols).sum();
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for part in parts {
                data.extend_from_slice(part.row(i));
            }
        }
        Ok(Matrix { rows, cols, data })
    }

    /// Place this matrix's columns at `offset` inside a zero matrix of `width` columns
    pub fn scatter_columns(&self, width: usize, offset: usize) -> Result<Matrix> {
        if offset + self.cols > width {
            return Err(PipeError::InvalidInput(format!(
                "cannot place {} columns at offset {} in width {}",
                self.cols, offset, width
            )));
        }
        let mut result = Matrix::zeros(self.rows, width);
        for i in 0..self.rows {
            let start = i * width + offset;
            result.data[start..start + self.cols].copy_from_slice(self.row(i));
        }
        Ok(result)
    }

    /// Split columns into `[0, at)` and `[at, cols)`
    pub fn split_columns(&self, at: usize) -> Result<(Matrix, Matrix)> {
        if at > self.cols {
            return Err(PipeError::InvalidInput(format!(
                "split at column {} exceeds width {}",
                at, self.cols
            )));
        }
        let right_cols = self.cols - at;
        let mut left = Vec::with_capacity(self.rows * at);
        let mut right = Vec::with_capacity(self.rows * right_cols);
        for row in self.iter_rows() {
            left.extend_from_slice(&row[..at]);
            right.extend_from_slice(&row[at..]);
        }
        Ok((
            Matrix {
                rows: self.rows,
                cols: at,
                data: left,
            },
            Matrix {
                rows: self.rows,
                cols: right_cols,
                data: right,
            },
        ))
    }

    /// Per-column mean
    pub fn column_means(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.cols];
        for row in self.iter_rows() {
            for (s, v) in sums.iter_mut().zip(row) {
                *s += v;
            }
        }
        let n = self.rows.max(1) as f64;
        sums.into_iter().map(|s| s / n).collect()
    }

    /// Per-column population standard deviation
    pub fn column_stds(&self) -> Vec<f64> {
        let means = self.column_means();
        let mut sq = vec![0.0; self.cols];
        for row in self.iter_rows() {
            for ((s, v), m) in sq.iter_mut().zip(row).zip(&means) {
                let d = v - m;
                *s += d * d;
            }
        }
        let n = self.rows.max(1) as f64;
        sq.into_iter().map(|s| (s / n).sqrt()).collect()
    }

    /// Index of the largest value in each row (first wins on ties)
    pub fn argmax_rows(&self) -> Vec<usize> {
        self.iter_rows()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (i, &v)| {
                        if v > best.1 { (i, v) } else { best }
                    })
                    .0
            })
            .collect()
    }

    /// Max absolute element-wise difference
    pub fn max_abs_diff(&self, other: &Matrix) -> Result<f64> {
        if self.shape() != other.shape() {
            return Err(PipeError::shape(self.shape(), other.shape()));
        }
        Ok(self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_length() {
        assert!(Matrix::new(2, 2, vec![1.0, 2.0, 3.0]).is_err());
        assert!(Matrix::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).is_ok());
    }

    #[test]
    fn test_from_rows_ragged() {
        let result = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]);
        assert!(result.is_err());
    }

    #[test]
    fn test_project_sum_weights() {
        let x = Matrix::from_rows(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap();
        let w = Matrix::from_rows(&[[1.0, 1.0, 1.0]]).unwrap();
        let b = Matrix::row_vector(vec![0.5]);

        let y = x.project(&w, Some(&b)).unwrap();
        assert_eq!(y.shape(), (2, 1));
        assert_eq!(y.data(), &[6.5, 15.5]);
    }

    #[test]
    fn test_project_rejects_width() {
        let x = Matrix::zeros(1, 3);
        let w = Matrix::zeros(1, 2);
        assert!(matches!(
            x.project(&w, None),
            Err(PipeError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_row_products() {
        let x = Matrix::from_rows(&[[2.0, 3.0, 4.0], [1.0, -1.0, 0.5]]).unwrap();
        let p = x.row_products();
        assert_eq!(p.shape(), (2, 1));
        assert_eq!(p.data(), &[24.0, -0.5]);
    }

    #[test]
    fn test_hstack_and_scatter() {
        let a = Matrix::column(vec![1.0, 2.0]);
        let b = Matrix::column(vec![3.0, 4.0]);
        let s = Matrix::hstack(&[a.clone(), b]).unwrap();
        assert_eq!(s.data(), &[1.0, 3.0, 2.0, 4.0]);

        let wide = a.scatter_columns(3, 1).unwrap();
        assert_eq!(wide.data(), &[0.0, 1.0, 0.0, 0.0, 2.0, 0.0]);
        assert!(a.scatter_columns(1, 1).is_err());
    }

    #[test]
    fn test_split_columns() {
        let m = Matrix::from_rows(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap();
        let (x, y) = m.split_columns(2).unwrap();
        assert_eq!(x.data(), &[1.0, 2.0, 4.0, 5.0]);
        assert_eq!(y.data(), &[3.0, 6.0]);
    }

    #[test]
    fn test_column_stats() {
        let m = Matrix::from_rows(&[[1.0, 10.0], [3.0, 10.0]]).unwrap();
        assert_eq!(m.column_means(), vec![2.0, 10.0]);
        assert_eq!(m.column_stds(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_argmax_rows() {
        let m = Matrix::from_rows(&[[0.1, 0.9], [0.7, 0.3], [0.5, 0.5]]).unwrap();
        assert_eq!(m.argmax_rows(), vec![1, 0, 0]);
    }

    #[test]
    fn test_deserialize_validates() {
        let bad = r#"{"rows":2,"cols":2,"data":[1.0]}"#;
        assert!(serde_json::from_str::<Matrix>(bad).is_err());

        let good = r#"{"rows":1,"cols":2,"data":[1.0,2.0]}"#;
        let m: Matrix = serde_json::from_str(good).unwrap();
        assert_eq!(m.shape(), (1, 2));
    }

    #[test]
    fn test_oversized_shape_rejected() {
        let huge = r#"{"rows":4611686018427387904,"cols":4,"data":[]}"#;
        assert!(serde_json::from_str::<Matrix>(huge).is_err());

        assert!(matches!(
            Matrix::new(usize::MAX, 2, Vec::new()),
            Err(PipeError::InvalidInput(_))
        ));
        assert!(Matrix::try_filled(usize::MAX, 2, 0.0).is_err());
        assert_eq!(Matrix::checked_len(3, 4).unwrap(), 12);
    }
}
