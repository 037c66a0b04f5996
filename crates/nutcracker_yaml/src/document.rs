//! The document model of the persistent operator format, and its conversion
//! to and from operator sites.

use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use nutcracker_core::{NutError, Result};
use nutcracker_tensor::OperatorSite;

use crate::complex::YamlComplex;

/// One transition matrix: 1-based bond endpoints plus flat row-major data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixDocument {
    pub from: i64,
    pub to: i64,
    pub data: Vec<YamlComplex>,
}

impl MatrixDocument {
    /// Parses the flat data as a square matrix of unknown dimension.
    pub fn matrix(&self) -> Result<Array2<Complex64>> {
        let length = self.data.len();
        let dimension = (length as f64).sqrt().round() as usize;
        if dimension * dimension != length {
            return Err(NutError::NonSquareMatrix(length));
        }
        Ok(Array2::from_shape_vec(
            (dimension, dimension),
            self.data.iter().map(|z| z.0).collect(),
        )
        .expect("length was checked against the shape"))
    }
}

/// One operator site map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorSiteDocument {
    #[serde(rename = "physical dimension")]
    pub physical_dimension: usize,
    #[serde(rename = "left dimension")]
    pub left_dimension: usize,
    #[serde(rename = "right dimension")]
    pub right_dimension: usize,
    pub matrices: Vec<MatrixDocument>,
}

impl OperatorSiteDocument {
    pub fn to_operator_site(&self) -> Result<OperatorSite> {
        let matrix_length = self.physical_dimension * self.physical_dimension;
        let mut entries = Vec::with_capacity(self.matrices.len());
        for matrix in &self.matrices {
            if matrix.from < 1 {
                return Err(NutError::index_too_low("from", matrix.from));
            }
            if matrix.from as usize > self.left_dimension {
                return Err(NutError::index_too_high(
                    "from",
                    matrix.from as usize,
                    self.left_dimension,
                ));
            }
            if matrix.to < 1 {
                return Err(NutError::index_too_low("to", matrix.to));
            }
            if matrix.to as usize > self.right_dimension {
                return Err(NutError::index_too_high(
                    "to",
                    matrix.to as usize,
                    self.right_dimension,
                ));
            }
            if matrix.data.len() != matrix_length {
                return Err(NutError::WrongDataLength {
                    length: matrix.data.len(),
                    correct_length: matrix_length,
                });
            }
            let data = Array2::from_shape_vec(
                (self.physical_dimension, self.physical_dimension),
                matrix.data.iter().map(|z| z.0).collect(),
            )
            .expect("length was checked against the shape");
            entries.push((matrix.from as u32, matrix.to as u32, data));
        }
        OperatorSite::new(
            self.physical_dimension,
            self.left_dimension,
            self.right_dimension,
            entries,
        )
    }

    pub fn from_operator_site(site: &OperatorSite) -> Self {
        let matrices = (0..site.number_of_matrices())
            .map(|k| {
                let (from, to) = site.indices()[k];
                MatrixDocument {
                    from: from as i64,
                    to: to as i64,
                    data: site.matrix(k).iter().map(|&z| YamlComplex(z)).collect(),
                }
            })
            .collect();
        Self {
            physical_dimension: site.physical_dimension(),
            left_dimension: site.left_dimension(),
            right_dimension: site.right_dimension(),
            matrices,
        }
    }
}

/// The top-level document: a sequence of 1-based site-type indices plus the
/// distinct site types they select from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorDocument {
    pub sequence: Vec<i64>,
    pub sites: Vec<OperatorSiteDocument>,
}

impl OperatorDocument {
    /// Resolves the sequence into the chain of operator sites and validates
    /// the bond chaining.
    pub fn to_operator_sites(&self) -> Result<Vec<OperatorSite>> {
        let parsed: Vec<OperatorSite> = self
            .sites
            .iter()
            .map(|site| site.to_operator_site())
            .collect::<Result<_>>()?;
        let mut sites = Vec::with_capacity(self.sequence.len());
        for &index in &self.sequence {
            if index < 1 {
                return Err(NutError::index_too_low("sequence", index));
            }
            if index as usize > parsed.len() {
                return Err(NutError::index_too_high(
                    "sequence",
                    index as usize,
                    parsed.len(),
                ));
            }
            sites.push(parsed[index as usize - 1].clone());
        }
        Ok(sites)
    }

    /// Writes each chain position as its own site type, in order.
    pub fn from_operator_sites(sites: &[OperatorSite]) -> Self {
        Self {
            sequence: (1..=sites.len() as i64).collect(),
            sites: sites
                .iter()
                .map(OperatorSiteDocument::from_operator_site)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nutcracker_core::{c, ONE, ZERO};

    fn z_site_document() -> OperatorSiteDocument {
        OperatorSiteDocument {
            physical_dimension: 2,
            left_dimension: 1,
            right_dimension: 1,
            matrices: vec![MatrixDocument {
                from: 1,
                to: 1,
                data: vec![
                    YamlComplex(ONE),
                    YamlComplex(ZERO),
                    YamlComplex(ZERO),
                    YamlComplex(c(-1.0, 0.0)),
                ],
            }],
        }
    }

    #[test]
    fn test_site_document_conversion() {
        let site = z_site_document().to_operator_site().unwrap();
        assert_eq!(site.physical_dimension(), 2);
        assert_eq!(site.number_of_matrices(), 1);
        assert_eq!(site.matrix(0)[[1, 1]], c(-1.0, 0.0));
    }

    #[test]
    fn test_index_bounds_are_validated() {
        let mut document = z_site_document();
        document.matrices[0].from = 0;
        assert!(matches!(
            document.to_operator_site().unwrap_err(),
            NutError::IndexTooLow { .. }
        ));

        let mut document = z_site_document();
        document.matrices[0].to = 2;
        assert!(matches!(
            document.to_operator_site().unwrap_err(),
            NutError::IndexTooHigh { .. }
        ));
    }

    #[test]
    fn test_wrong_data_length_is_caught() {
        let mut document = z_site_document();
        document.matrices[0].data.pop();
        assert!(matches!(
            document.to_operator_site().unwrap_err(),
            NutError::WrongDataLength {
                length: 3,
                correct_length: 4
            }
        ));
    }

    #[test]
    fn test_non_square_standalone_matrix() {
        let matrix = MatrixDocument {
            from: 1,
            to: 1,
            data: vec![YamlComplex(ONE); 3],
        };
        assert!(matches!(
            matrix.matrix().unwrap_err(),
            NutError::NonSquareMatrix(3)
        ));
    }

    #[test]
    fn test_sequence_resolution() {
        let document = OperatorDocument {
            sequence: vec![1, 1, 1],
            sites: vec![z_site_document()],
        };
        let sites = document.to_operator_sites().unwrap();
        assert_eq!(sites.len(), 3);

        let bad = OperatorDocument {
            sequence: vec![2],
            sites: vec![z_site_document()],
        };
        assert!(matches!(
            bad.to_operator_sites().unwrap_err(),
            NutError::IndexTooHigh { .. }
        ));
    }
}
