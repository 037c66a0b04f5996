//! Relative tolerance comparisons.

use num_complex::Complex64;

/// Returns true when `a` and `b` differ by more than `tolerance`, relative to
/// the larger magnitude of the two (and at least absolutely).
pub fn outside_tolerance(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() > tolerance * a.abs().max(b.abs()).max(1.0)
}

/// Complex counterpart of [`outside_tolerance`].
pub fn outside_tolerance_complex(a: Complex64, b: Complex64, tolerance: f64) -> bool {
    (a - b).norm() > tolerance * a.norm().max(b.norm()).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::c;

    #[test]
    fn test_within_tolerance() {
        assert!(!outside_tolerance(1.0, 1.0 + 1e-13, 1e-12));
        assert!(!outside_tolerance(-8.0, -8.0 - 1e-12, 1e-12));
    }

    #[test]
    fn test_outside_tolerance() {
        assert!(outside_tolerance(1.0, 1.1, 1e-12));
        assert!(outside_tolerance(0.0, 1e-6, 1e-12));
    }

    #[test]
    fn test_complex() {
        assert!(!outside_tolerance_complex(
            c(1.0, 0.0),
            c(1.0, 1e-14),
            1e-12
        ));
        assert!(outside_tolerance_complex(c(1.0, 0.0), c(1.0, 1e-3), 1e-12));
    }
}
