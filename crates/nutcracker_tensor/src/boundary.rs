//! Environment boundaries.

use ndarray::{Array2, Array3};
use num_complex::Complex64;
use nutcracker_core::{NutError, Result};

use crate::site::Side;

/// Partial contraction of (state, operator, conjugate state) from one end of
/// the chain up to the working site. Shape (operator, state, state), the
/// second index on the ket side and the third on the bra side.
#[derive(Debug, Clone)]
pub struct ExpectationBoundary {
    data: Array3<Complex64>,
    side: Side,
}

impl ExpectationBoundary {
    /// The trivial boundary: all dimensions one, single entry 1.
    pub fn trivial(side: Side) -> Self {
        let mut data = Array3::zeros((1, 1, 1));
        data[[0, 0, 0]] = Complex64::new(1.0, 0.0);
        Self { data, side }
    }

    /// Wraps an already contracted boundary, checking that the two state
    /// bonds agree.
    pub fn new(side: Side, data: Array3<Complex64>) -> Result<Self> {
        let (_, ket, bra) = data.dim();
        if ket != bra {
            return Err(NutError::dimension_mismatch(
                "boundary ket state",
                ket,
                "boundary bra state",
                bra,
            ));
        }
        Ok(Self { data, side })
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn operator_dimension(&self) -> usize {
        self.data.dim().0
    }

    pub fn state_dimension(&self) -> usize {
        self.data.dim().1
    }

    pub fn data(&self) -> &Array3<Complex64> {
        &self.data
    }
}

/// Partial inner product between a reference state (conjugated) and the
/// current state. Shape (overlap, state).
#[derive(Debug, Clone)]
pub struct OverlapBoundary {
    data: Array2<Complex64>,
    side: Side,
}

impl OverlapBoundary {
    /// The trivial boundary: both dimensions one, single entry 1.
    pub fn trivial(side: Side) -> Self {
        let mut data = Array2::zeros((1, 1));
        data[[0, 0]] = Complex64::new(1.0, 0.0);
        Self { data, side }
    }

    pub fn new(side: Side, data: Array2<Complex64>) -> Self {
        Self { data, side }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn overlap_dimension(&self) -> usize {
        self.data.dim().0
    }

    pub fn state_dimension(&self) -> usize {
        self.data.dim().1
    }

    pub fn data(&self) -> &Array2<Complex64> {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nutcracker_core::ONE;

    #[test]
    fn test_trivial_boundaries() {
        let eb = ExpectationBoundary::trivial(Side::Left);
        assert_eq!(eb.operator_dimension(), 1);
        assert_eq!(eb.state_dimension(), 1);
        assert_eq!(eb.data()[[0, 0, 0]], ONE);

        let ob = OverlapBoundary::trivial(Side::Right);
        assert_eq!(ob.overlap_dimension(), 1);
        assert_eq!(ob.state_dimension(), 1);
        assert_eq!(ob.data()[[0, 0]], ONE);
    }

    #[test]
    fn test_mismatched_state_bonds_rejected() {
        let data = Array3::zeros((1, 2, 3));
        assert!(ExpectationBoundary::new(Side::Left, data).is_err());
    }
}
