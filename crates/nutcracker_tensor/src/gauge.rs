//! Gauge transfer: moving the orthogonality center across a bond.

use nalgebra::DMatrix;
use ndarray::Array3;
use num_complex::Complex64;
use nutcracker_core::{NutError, Result, ZERO};
use rand::Rng;
use rand_distr::StandardNormal;
use tracing::warn;

use crate::connector::connect_dimensions;
use crate::site::{Normalization, StateSite};

/// Relative threshold below which a QR diagonal entry counts as dependent.
const RANK_TOLERANCE: f64 = 1e-14;

/// Reshape (physical, left, right) to a (physical*left, right) matrix.
fn fused_left_matrix(data: &Array3<Complex64>) -> DMatrix<Complex64> {
    let (_, left, _) = data.dim();
    DMatrix::from_fn(data.dim().0 * left, data.dim().2, |row, col| {
        data[[row / left, row % left, col]]
    })
}

/// Reshape (physical, left, right) to a (left, physical*right) matrix.
fn fused_right_matrix(data: &Array3<Complex64>) -> DMatrix<Complex64> {
    let (_, left, right) = data.dim();
    DMatrix::from_fn(left, data.dim().0 * right, |row, col| {
        data[[col / right, row, col % right]]
    })
}

fn zero_dependent_rows(rfac: &mut DMatrix<Complex64>, columns: bool) {
    let n = rfac.nrows().min(rfac.ncols());
    let largest = (0..n)
        .map(|k| rfac[(k, k)].norm())
        .fold(0.0f64, f64::max);
    if largest == 0.0 {
        return;
    }
    for k in 0..n {
        if rfac[(k, k)].norm() < RANK_TOLERANCE * largest {
            warn!(
                index = k,
                "rank-deficient gauge transfer, zeroing the dependent degree of freedom"
            );
            if columns {
                for i in 0..rfac.nrows() {
                    rfac[(i, k)] = ZERO;
                }
            } else {
                for j in 0..rfac.ncols() {
                    rfac[(k, j)] = ZERO;
                }
            }
        }
    }
}

fn unit_frobenius(rfac: DMatrix<Complex64>) -> Result<DMatrix<Complex64>> {
    let norm = rfac.norm();
    if norm == 0.0 {
        return Err(NutError::invalid_tensor(
            "cannot renormalize a vanishing gauge factor",
        ));
    }
    Ok(rfac.unscale(norm))
}

/// Thin QR of a site fused as (physical*left, right): the isometric factor
/// becomes a left-normalized site, the square factor (renormalized to unit
/// Frobenius norm) is returned for absorption into the right neighbor.
pub(crate) fn qr_split(site: &StateSite) -> Result<(StateSite, DMatrix<Complex64>)> {
    let (physical, left, right) = site.data().dim();
    if right > physical * left {
        return Err(NutError::NotEnoughDegreesOfFreedomToNormalize {
            name_a: "right".into(),
            size_a: right,
            name_b: "physical*left".into(),
            size_b: physical * left,
        });
    }
    let qr = fused_left_matrix(site.data()).qr();
    let q = qr.q();
    let mut rfac = qr.r();
    zero_dependent_rows(&mut rfac, false);
    let rfac = unit_frobenius(rfac)?;

    let mut data = Array3::zeros((physical, left, right));
    for row in 0..physical * left {
        for col in 0..right {
            data[[row / left, row % left, col]] = q[(row, col)];
        }
    }
    Ok((StateSite::from_array(Normalization::Left, data)?, rfac))
}

/// RQ counterpart of [`qr_split`], via QR of the conjugate transpose: the
/// co-isometric factor becomes a right-normalized site.
pub(crate) fn rq_split(site: &StateSite) -> Result<(DMatrix<Complex64>, StateSite)> {
    let (physical, left, right) = site.data().dim();
    if left > physical * right {
        return Err(NutError::NotEnoughDegreesOfFreedomToNormalize {
            name_a: "left".into(),
            size_a: left,
            name_b: "physical*right".into(),
            size_b: physical * right,
        });
    }
    let qr = fused_right_matrix(site.data()).adjoint().qr();
    let q = qr.q();
    let mut rfac = qr.r().adjoint();
    zero_dependent_rows(&mut rfac, true);
    let rfac = unit_frobenius(rfac)?;

    let mut data = Array3::zeros((physical, left, right));
    for a in 0..left {
        for col in 0..physical * right {
            data[[col / right, a, col % right]] = q[(col, a)].conj();
        }
    }
    Ok((rfac, StateSite::from_array(Normalization::Right, data)?))
}

/// Multiplies a gauge factor into a site along its left bond.
pub(crate) fn absorb_left_factor(
    rfac: &DMatrix<Complex64>,
    site: &StateSite,
) -> Array3<Complex64> {
    let (physical, left, right) = site.data().dim();
    let data = site.data();
    let mut out = Array3::zeros((physical, rfac.nrows(), right));
    for p in 0..physical {
        for a in 0..rfac.nrows() {
            for r in 0..right {
                let mut sum = ZERO;
                for b in 0..left {
                    sum += rfac[(a, b)] * data[[p, b, r]];
                }
                out[[p, a, r]] = sum;
            }
        }
    }
    out
}

/// Multiplies a gauge factor into a site along its right bond.
pub(crate) fn absorb_right_factor(
    site: &StateSite,
    rfac: &DMatrix<Complex64>,
) -> Array3<Complex64> {
    let (physical, left, right) = site.data().dim();
    let data = site.data();
    let mut out = Array3::zeros((physical, left, rfac.ncols()));
    for p in 0..physical {
        for l in 0..left {
            for b in 0..rfac.ncols() {
                let mut sum = ZERO;
                for a in 0..right {
                    sum += data[[p, l, a]] * rfac[(a, b)];
                }
                out[[p, l, b]] = sum;
            }
        }
    }
    out
}

/// Moves the orthogonality center one site to the right: the middle site
/// becomes left-normalized and its gauge factor is absorbed into the
/// right-normalized neighbor, which becomes the new middle site.
pub fn move_site_cursor_right(
    middle_site: &StateSite,
    right_neighbor: &StateSite,
) -> Result<(StateSite, StateSite)> {
    middle_site.assert_normalization(&[Normalization::Middle])?;
    right_neighbor.assert_normalization(&[Normalization::Right])?;
    connect_dimensions(
        "middle site right",
        middle_site.right_dimension(),
        "right neighbor left",
        right_neighbor.left_dimension(),
    )?;
    let (left_site, rfac) = qr_split(middle_site)?;
    let new_middle = StateSite::from_array(
        Normalization::Middle,
        absorb_left_factor(&rfac, right_neighbor),
    )?;
    Ok((left_site, new_middle))
}

/// Mirror image of [`move_site_cursor_right`].
pub fn move_site_cursor_left(
    middle_site: &StateSite,
    left_neighbor: &StateSite,
) -> Result<(StateSite, StateSite)> {
    middle_site.assert_normalization(&[Normalization::Middle])?;
    left_neighbor.assert_normalization(&[Normalization::Left])?;
    connect_dimensions(
        "left neighbor right",
        left_neighbor.right_dimension(),
        "middle site left",
        middle_site.left_dimension(),
    )?;
    let (rfac, right_site) = rq_split(middle_site)?;
    let new_middle = StateSite::from_array(
        Normalization::Middle,
        absorb_right_factor(left_neighbor, &rfac),
    )?;
    Ok((new_middle, right_site))
}

fn random_array<R: Rng + ?Sized>(
    physical: usize,
    left: usize,
    right: usize,
    rng: &mut R,
) -> Array3<Complex64> {
    Array3::from_shape_fn((physical, left, right), |_| {
        Complex64::new(rng.sample(StandardNormal), rng.sample(StandardNormal))
    })
}

/// A random middle-normalized site: Gaussian entries scaled to unit
/// Frobenius norm.
pub fn random_state_site_middle<R: Rng + ?Sized>(
    physical: usize,
    left: usize,
    right: usize,
    rng: &mut R,
) -> Result<StateSite> {
    let mut data = random_array(physical, left, right, rng);
    let norm = data.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt();
    data.mapv_inplace(|z| z / norm);
    StateSite::from_array(Normalization::Middle, data)
}

/// A random right-normalized site: Gaussian entries with the left bond
/// orthonormalized.
pub fn random_state_site_right<R: Rng + ?Sized>(
    physical: usize,
    left: usize,
    right: usize,
    rng: &mut R,
) -> Result<StateSite> {
    if left > physical * right {
        return Err(NutError::NotEnoughDegreesOfFreedomToNormalize {
            name_a: "left".into(),
            size_a: left,
            name_b: "physical*right".into(),
            size_b: physical * right,
        });
    }
    let raw = random_array(physical, left, right, rng);
    let q = fused_right_matrix(&raw).adjoint().qr().q();
    let mut data = Array3::zeros((physical, left, right));
    for a in 0..left {
        for col in 0..physical * right {
            data[[col / right, a, col % right]] = q[(col, a)].conj();
        }
    }
    StateSite::from_array(Normalization::Right, data)
}

/// A random left-normalized site: Gaussian entries with the right bond
/// orthonormalized.
pub fn random_state_site_left<R: Rng + ?Sized>(
    physical: usize,
    left: usize,
    right: usize,
    rng: &mut R,
) -> Result<StateSite> {
    if right > physical * left {
        return Err(NutError::NotEnoughDegreesOfFreedomToNormalize {
            name_a: "right".into(),
            size_a: right,
            name_b: "physical*left".into(),
            size_b: physical * left,
        });
    }
    let raw = random_array(physical, left, right, rng);
    let q = fused_left_matrix(&raw).qr().q();
    let mut data = Array3::zeros((physical, left, right));
    for row in 0..physical * left {
        for col in 0..right {
            data[[row / left, row % left, col]] = q[(row, col)];
        }
    }
    StateSite::from_array(Normalization::Left, data)
}

/// Widens the bond between two adjacent sites to `new_dimension`.
///
/// The left site gains zero-filled columns, so the represented state is
/// unchanged, and a middle or right normalization tag survives. The right
/// site gains random rows orthonormalized against the existing ones, which
/// keeps it right-normalized while opening the new directions for the next
/// optimization pass.
pub fn increase_dimension_between<R: Rng + ?Sized>(
    new_dimension: usize,
    left_site: &StateSite,
    right_site: &StateSite,
    rng: &mut R,
) -> Result<(StateSite, StateSite)> {
    left_site.assert_normalization(&[
        Normalization::Middle,
        Normalization::Right,
        Normalization::None,
    ])?;
    right_site.assert_normalization(&[Normalization::Right])?;
    let old_dimension = connect_dimensions(
        "left site right",
        left_site.right_dimension(),
        "right site left",
        right_site.left_dimension(),
    )?;
    if new_dimension < old_dimension {
        return Err(NutError::invalid_tensor(
            "a bond dimension can only be increased",
        ));
    }
    if new_dimension == old_dimension {
        return Ok((left_site.clone(), right_site.clone()));
    }
    let (physical, _, right) = right_site.data().dim();
    if new_dimension > physical * right {
        return Err(NutError::NotEnoughDegreesOfFreedomToNormalize {
            name_a: "left".into(),
            size_a: new_dimension,
            name_b: "physical*right".into(),
            size_b: physical * right,
        });
    }

    // left site: zero columns
    let (lp, ll, _) = left_site.data().dim();
    let mut widened_left = Array3::zeros((lp, ll, new_dimension));
    for p in 0..lp {
        for l in 0..ll {
            for r in 0..old_dimension {
                widened_left[[p, l, r]] = left_site.data()[[p, l, r]];
            }
        }
    }

    // right site: fresh orthonormal rows
    let columns = physical * right;
    let mut rows: Vec<Vec<Complex64>> = (0..old_dimension)
        .map(|a| {
            (0..columns)
                .map(|col| right_site.data()[[col / right, a, col % right]])
                .collect()
        })
        .collect();
    while rows.len() < new_dimension {
        let mut candidate: Vec<Complex64> = (0..columns)
            .map(|_| Complex64::new(rng.sample(StandardNormal), rng.sample(StandardNormal)))
            .collect();
        for _ in 0..2 {
            for row in &rows {
                let overlap: Complex64 = row
                    .iter()
                    .zip(&candidate)
                    .map(|(a, b)| a.conj() * b)
                    .sum();
                for (c, a) in candidate.iter_mut().zip(row) {
                    *c -= overlap * a;
                }
            }
        }
        let norm = candidate
            .iter()
            .map(|z| z.norm_sqr())
            .sum::<f64>()
            .sqrt();
        if norm < 1e-6 {
            continue;
        }
        for value in &mut candidate {
            *value /= norm;
        }
        rows.push(candidate);
    }
    let mut widened_right = Array3::zeros((physical, new_dimension, right));
    for (a, row) in rows.iter().enumerate() {
        for (col, &value) in row.iter().enumerate() {
            widened_right[[col / right, a, col % right]] = value;
        }
    }

    let left_tag = match left_site.normalization() {
        Normalization::Left => Normalization::None,
        tag => tag,
    };
    Ok((
        StateSite::from_array(left_tag, widened_left)?,
        StateSite::from_array(Normalization::Right, widened_right)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn assert_left_normalized(site: &StateSite) {
        let m = fused_left_matrix(site.data());
        let gram = m.adjoint() * &m;
        for i in 0..gram.nrows() {
            for j in 0..gram.ncols() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!(
                    (gram[(i, j)] - Complex64::new(expected, 0.0)).norm() < 1e-12,
                    "gram[{i},{j}] = {}",
                    gram[(i, j)]
                );
            }
        }
    }

    fn assert_right_normalized(site: &StateSite) {
        let m = fused_right_matrix(site.data());
        let gram = &m * m.adjoint();
        for i in 0..gram.nrows() {
            for j in 0..gram.ncols() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!(
                    (gram[(i, j)] - Complex64::new(expected, 0.0)).norm() < 1e-12,
                    "gram[{i},{j}] = {}",
                    gram[(i, j)]
                );
            }
        }
    }

    #[test]
    fn test_random_sites_satisfy_their_isometries() {
        let mut rng = StdRng::seed_from_u64(0x9a);
        assert_left_normalized(&random_state_site_left(2, 3, 4, &mut rng).unwrap());
        assert_right_normalized(&random_state_site_right(2, 4, 3, &mut rng).unwrap());
        let middle = random_state_site_middle(2, 3, 3, &mut rng).unwrap();
        assert!((middle.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_degrees_of_freedom_guard() {
        let mut rng = StdRng::seed_from_u64(0x9b);
        assert!(random_state_site_right(2, 5, 2, &mut rng).is_err());
        assert!(random_state_site_left(2, 2, 5, &mut rng).is_err());
    }

    #[test]
    fn test_move_right_produces_valid_tags() {
        let mut rng = StdRng::seed_from_u64(0x9c);
        let middle = random_state_site_middle(2, 1, 2, &mut rng).unwrap();
        let right = random_state_site_right(2, 2, 1, &mut rng).unwrap();
        let (left_site, new_middle) = move_site_cursor_right(&middle, &right).unwrap();
        assert_eq!(left_site.normalization(), Normalization::Left);
        assert_eq!(new_middle.normalization(), Normalization::Middle);
        assert_left_normalized(&left_site);
        assert!((new_middle.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_move_left_produces_valid_tags() {
        let mut rng = StdRng::seed_from_u64(0x9d);
        let left = random_state_site_left(2, 1, 2, &mut rng).unwrap();
        let middle = random_state_site_middle(2, 2, 1, &mut rng).unwrap();
        let (new_middle, right_site) = move_site_cursor_left(&middle, &left).unwrap();
        assert_eq!(new_middle.normalization(), Normalization::Middle);
        assert_eq!(right_site.normalization(), Normalization::Right);
        assert_right_normalized(&right_site);
        assert!((new_middle.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_increase_dimension_keeps_isometries() {
        let mut rng = StdRng::seed_from_u64(0x9e);
        let middle = random_state_site_middle(2, 1, 2, &mut rng).unwrap();
        let right = random_state_site_right(2, 2, 1, &mut rng).unwrap();
        let (wide_middle, wide_right) =
            increase_dimension_between(4, &middle, &right, &mut rng).unwrap();
        assert_eq!(wide_middle.right_dimension(), 4);
        assert_eq!(wide_right.left_dimension(), 4);
        assert!((wide_middle.norm() - 1.0).abs() < 1e-12);
        assert_right_normalized(&wide_right);
    }

    #[test]
    fn test_increase_dimension_respects_available_space() {
        let mut rng = StdRng::seed_from_u64(0x9f);
        let middle = random_state_site_middle(2, 1, 2, &mut rng).unwrap();
        let right = random_state_site_right(2, 2, 1, &mut rng).unwrap();
        // physical*right of the right site is 2, so 3 rows cannot be orthonormal
        assert!(increase_dimension_between(3, &middle, &right, &mut rng).is_err());
    }
}
