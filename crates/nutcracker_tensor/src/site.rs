//! Site tensors: state, overlap, and operator sites.

use ndarray::{Array2, Array3, ArrayView2, Axis};
use num_complex::Complex64;
use nutcracker_core::{NutError, Result};
use std::fmt;

/// Which end of the chain a boundary or stack is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// The opposite side. Total: a cursor can only move left or right.
    pub fn other(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Normalization tag carried by state and overlap sites.
///
/// - `Left`: reshaped to (physical*left, right) the tensor is an isometry
///   from the right bond
/// - `Right`: reshaped to (left, physical*right) the tensor is a co-isometry
///   onto the left bond
/// - `Middle`: unit Frobenius norm, no isometry constraint
/// - `None`: no guarantee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    Left,
    Middle,
    Right,
    None,
}

impl From<Side> for Normalization {
    fn from(side: Side) -> Self {
        match side {
            Side::Left => Normalization::Left,
            Side::Right => Normalization::Right,
        }
    }
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Normalization::Left => write!(f, "left"),
            Normalization::Middle => write!(f, "middle"),
            Normalization::Right => write!(f, "right"),
            Normalization::None => write!(f, "none"),
        }
    }
}

/// One MPS tensor of shape (physical, left, right), row-major.
#[derive(Debug, Clone)]
pub struct StateSite {
    data: Array3<Complex64>,
    normalization: Normalization,
}

impl StateSite {
    /// Builds a state site from flat row-major data.
    pub fn new(
        normalization: Normalization,
        physical: usize,
        left: usize,
        right: usize,
        data: Vec<Complex64>,
    ) -> Result<Self> {
        let correct_length = physical * left * right;
        if data.len() != correct_length {
            return Err(NutError::WrongDataLength {
                length: data.len(),
                correct_length,
            });
        }
        let data = Array3::from_shape_vec((physical, left, right), data)
            .expect("length was checked against the shape");
        Self::from_array(normalization, data)
    }

    /// Builds a state site from an already shaped array.
    pub fn from_array(normalization: Normalization, data: Array3<Complex64>) -> Result<Self> {
        let (physical, left, right) = data.dim();
        match normalization {
            Normalization::Left if left > physical * right => {
                return Err(NutError::NotEnoughDegreesOfFreedomToNormalize {
                    name_a: "left".into(),
                    size_a: left,
                    name_b: "physical*right".into(),
                    size_b: physical * right,
                })
            }
            Normalization::Right if right > physical * left => {
                return Err(NutError::NotEnoughDegreesOfFreedomToNormalize {
                    name_a: "right".into(),
                    size_a: right,
                    name_b: "physical*left".into(),
                    size_b: physical * left,
                })
            }
            _ => {}
        }
        Ok(Self {
            data,
            normalization,
        })
    }

    /// The trivial site: all dimensions one, single entry 1.
    pub fn trivial(normalization: Normalization) -> Self {
        let mut data = Array3::zeros((1, 1, 1));
        data[[0, 0, 0]] = Complex64::new(1.0, 0.0);
        Self {
            data,
            normalization,
        }
    }

    pub fn physical_dimension(&self) -> usize {
        self.data.dim().0
    }

    pub fn left_dimension(&self) -> usize {
        self.data.dim().1
    }

    pub fn right_dimension(&self) -> usize {
        self.data.dim().2
    }

    /// Number of complex entries.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    pub fn data(&self) -> &Array3<Complex64> {
        &self.data
    }

    /// Frobenius norm.
    pub fn norm(&self) -> f64 {
        self.data.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt()
    }

    /// The (left x right) transition matrix selected by one observed qudit
    /// value.
    pub fn transition_matrix_for_observation(
        &self,
        observation: usize,
    ) -> Result<ArrayView2<'_, Complex64>> {
        if observation >= self.physical_dimension() {
            return Err(NutError::index_too_high(
                "observation",
                observation + 1,
                self.physical_dimension(),
            ));
        }
        Ok(self.data.index_axis(Axis(0), observation))
    }

    /// Fails unless this site carries one of the expected tags.
    pub fn assert_normalization(&self, expected: &[Normalization]) -> Result<()> {
        if expected.contains(&self.normalization) {
            Ok(())
        } else {
            Err(NutError::WrongTensorNormalization {
                expected: expected
                    .iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join(" or "),
                observed: self.normalization.to_string(),
            })
        }
    }

    pub(crate) fn into_data(self) -> Array3<Complex64> {
        self.data
    }

    /// Re-tags the site without touching the data. Internal: callers are
    /// responsible for the invariant the new tag claims.
    pub(crate) fn retagged(self, normalization: Normalization) -> Self {
        Self {
            data: self.data,
            normalization,
        }
    }
}

/// The element-wise conjugate of a reference state site, shape
/// (physical, left, right). Acts as the bra side in overlap contractions.
#[derive(Debug, Clone)]
pub struct OverlapSite {
    data: Array3<Complex64>,
    normalization: Normalization,
}

impl OverlapSite {
    /// Conjugates a state site, keeping its tag.
    pub fn from_state_site(site: &StateSite) -> Self {
        Self {
            data: site.data().mapv(|z| z.conj()),
            normalization: site.normalization(),
        }
    }

    /// Conjugates a state site and claims the given tag for the result.
    pub(crate) fn from_state_site_as(site: &StateSite, normalization: Normalization) -> Self {
        Self {
            data: site.data().mapv(|z| z.conj()),
            normalization,
        }
    }

    pub fn physical_dimension(&self) -> usize {
        self.data.dim().0
    }

    pub fn left_dimension(&self) -> usize {
        self.data.dim().1
    }

    pub fn right_dimension(&self) -> usize {
        self.data.dim().2
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    pub fn data(&self) -> &Array3<Complex64> {
        &self.data
    }
}

/// Sparse MPO tensor: a set of dense (physical x physical) transition
/// matrices, each wired between one left and one right bond entry.
///
/// Matrix storage is row-major with element `[bra, ket]`, so a stored matrix
/// acts on kets the way it reads on paper.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorSite {
    physical_dimension: usize,
    left_dimension: usize,
    right_dimension: usize,
    /// 1-based (from, to) bond indices, one pair per matrix.
    indices: Vec<(u32, u32)>,
    matrices: Vec<Array2<Complex64>>,
}

impl OperatorSite {
    /// Builds an operator site, validating index ranges and matrix shapes.
    pub fn new(
        physical_dimension: usize,
        left_dimension: usize,
        right_dimension: usize,
        entries: Vec<(u32, u32, Array2<Complex64>)>,
    ) -> Result<Self> {
        let mut indices = Vec::with_capacity(entries.len());
        let mut matrices = Vec::with_capacity(entries.len());
        for (from, to, matrix) in entries {
            if from < 1 {
                return Err(NutError::index_too_low("from", from as i64));
            }
            if from as usize > left_dimension {
                return Err(NutError::index_too_high("from", from as usize, left_dimension));
            }
            if to < 1 {
                return Err(NutError::index_too_low("to", to as i64));
            }
            if to as usize > right_dimension {
                return Err(NutError::index_too_high("to", to as usize, right_dimension));
            }
            let (rows, cols) = matrix.dim();
            if rows != cols {
                return Err(NutError::NonSquareMatrix(rows * cols));
            }
            if rows != physical_dimension {
                return Err(NutError::WrongDataLength {
                    length: rows * cols,
                    correct_length: physical_dimension * physical_dimension,
                });
            }
            indices.push((from, to));
            matrices.push(matrix);
        }
        Ok(Self {
            physical_dimension,
            left_dimension,
            right_dimension,
            indices,
            matrices,
        })
    }

    pub fn physical_dimension(&self) -> usize {
        self.physical_dimension
    }

    pub fn left_dimension(&self) -> usize {
        self.left_dimension
    }

    pub fn right_dimension(&self) -> usize {
        self.right_dimension
    }

    pub fn number_of_matrices(&self) -> usize {
        self.matrices.len()
    }

    /// The k-th transition matrix.
    pub fn matrix(&self, k: usize) -> &Array2<Complex64> {
        &self.matrices[k]
    }

    /// The k-th (from, to) bond pair, 0-based.
    pub fn link(&self, k: usize) -> (usize, usize) {
        let (from, to) = self.indices[k];
        (from as usize - 1, to as usize - 1)
    }

    /// The raw 1-based (from, to) pairs.
    pub fn indices(&self) -> &[(u32, u32)] {
        &self.indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nutcracker_core::{c, ONE, ZERO};

    #[test]
    fn test_side_other() {
        assert_eq!(Side::Left.other(), Side::Right);
        assert_eq!(Side::Right.other(), Side::Left);
    }

    #[test]
    fn test_state_site_wrong_data_length() {
        let err = StateSite::new(Normalization::None, 2, 1, 1, vec![ONE]).unwrap_err();
        match err {
            NutError::WrongDataLength {
                length,
                correct_length,
            } => {
                assert_eq!(length, 1);
                assert_eq!(correct_length, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_state_site_degrees_of_freedom() {
        // left 4 > physical*right 2 cannot be an isometry
        let err = StateSite::new(
            Normalization::Left,
            2,
            4,
            1,
            vec![ZERO; 8],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            NutError::NotEnoughDegreesOfFreedomToNormalize { .. }
        ));
        // but it is a perfectly fine unconstrained tensor
        StateSite::new(Normalization::None, 2, 4, 1, vec![ZERO; 8]).unwrap();
    }

    #[test]
    fn test_transition_matrix_slice() {
        let site = StateSite::new(
            Normalization::None,
            2,
            1,
            2,
            vec![c(1.0, 0.0), c(2.0, 0.0), c(3.0, 0.0), c(4.0, 0.0)],
        )
        .unwrap();
        let matrix = site.transition_matrix_for_observation(1).unwrap();
        assert_eq!(matrix[[0, 0]], c(3.0, 0.0));
        assert_eq!(matrix[[0, 1]], c(4.0, 0.0));
        assert!(site.transition_matrix_for_observation(2).is_err());
    }

    #[test]
    fn test_overlap_site_conjugates() {
        let site =
            StateSite::new(Normalization::Middle, 1, 1, 1, vec![c(0.6, 0.8)]).unwrap();
        let overlap = OverlapSite::from_state_site(&site);
        assert_eq!(overlap.data()[[0, 0, 0]], c(0.6, -0.8));
        assert_eq!(overlap.normalization(), Normalization::Middle);
    }

    #[test]
    fn test_operator_site_index_validation() {
        let z = Array2::from_shape_vec((2, 2), vec![ONE, ZERO, ZERO, -ONE]).unwrap();
        assert!(matches!(
            OperatorSite::new(2, 1, 1, vec![(0, 1, z.clone())]).unwrap_err(),
            NutError::IndexTooLow { .. }
        ));
        assert!(matches!(
            OperatorSite::new(2, 1, 1, vec![(1, 2, z.clone())]).unwrap_err(),
            NutError::IndexTooHigh { .. }
        ));
        let site = OperatorSite::new(2, 1, 1, vec![(1, 1, z)]).unwrap();
        assert_eq!(site.number_of_matrices(), 1);
        assert_eq!(site.link(0), (0, 0));
    }
}
