//! Built-in extractors

use pipekit_core::prelude::*;

/// Returns its input unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityExtractor {
    dim: usize,
}

impl IdentityExtractor {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Extractor for IdentityExtractor {
    fn kind(&self) -> &str {
        "identity"
    }

    fn out_dim(&self) -> usize {
        self.dim
    }

    fn transform(&self, input: &Matrix) -> Result<Matrix> {
        check_width(input, self.dim)?;
        Ok(input.clone())
    }
}

/// Row-wise product of all input columns, as a single column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductExtractor {
    in_dim: usize,
}

impl ProductExtractor {
    pub fn new(in_dim: usize) -> Self {
        Self { in_dim }
    }
}

impl Extractor for ProductExtractor {
    fn kind(&self) -> &str {
        "product"
    }

    fn out_dim(&self) -> usize {
        1
    }

    fn transform(&self, input: &Matrix) -> Result<Matrix> {
        check_width(input, self.in_dim)?;
        Ok(input.row_products())
    }
}

fn check_width(input: &Matrix, expected: usize) -> Result<()> {
    if input.cols() != expected {
        return Err(PipeError::shape((input.rows(), expected), input.shape()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_returns_input() {
        let x = Matrix::from_rows(&[[1.5, -2.0, 0.0], [3.0, 4.0, 5.0]]).unwrap();
        let extractor = IdentityExtractor::new(3);

        assert_eq!(extractor.out_dim(), 3);
        assert_eq!(extractor.transform(&x).unwrap(), x);
    }

    #[test]
    fn test_product_single_row() {
        let x = Matrix::from_rows(&[[2.0, 3.0, 4.0]]).unwrap();
        let extractor = ProductExtractor::new(3);

        assert_eq!(extractor.out_dim(), 1);
        let out = extractor.transform(&x).unwrap();
        assert_eq!(out, Matrix::from_rows(&[[24.0]]).unwrap());
    }

    #[test]
    fn test_product_keeps_column_shape() {
        let x = Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0], [-1.0, 0.5]]).unwrap();
        let out = ProductExtractor::new(2).transform(&x).unwrap();
        assert_eq!(out.shape(), (3, 1));
        assert_eq!(out.data(), &[2.0, 12.0, -0.5]);
    }

    #[test]
    fn test_width_checked() {
        let x = Matrix::zeros(2, 4);
        assert!(IdentityExtractor::new(3).transform(&x).is_err());
        assert!(ProductExtractor::new(3).transform(&x).is_err());
    }
}
