//! Contraction kernels.
//!
//! Each kernel folds one site of the network into an environment boundary,
//! or evaluates the fully contracted network at the working site. Operator
//! matrices are applied with element `[bra, ket]`.

use nalgebra::DMatrix;
use ndarray::{Array2, Array3, Array4};
use num_complex::Complex64;
use nutcracker_core::{NutError, Result, ZERO};
use rayon::prelude::*;

use crate::boundary::{ExpectationBoundary, OverlapBoundary};
use crate::connector::connect_dimensions;
use crate::site::{Normalization, OperatorSite, OverlapSite, Side, StateSite};

fn expect_side(name: &str, observed: Side, expected: Side) -> Result<()> {
    if observed == expected {
        Ok(())
    } else {
        Err(NutError::invalid_tensor(format!(
            "{name} is a {observed} boundary, expected {expected}"
        )))
    }
}

/// Absorbs a state site and its operator site into a left expectation
/// boundary.
pub fn contract_sos_left(
    old_boundary: &ExpectationBoundary,
    state_site: &StateSite,
    operator_site: &OperatorSite,
) -> Result<ExpectationBoundary> {
    expect_side("old boundary", old_boundary.side(), Side::Left)?;
    state_site.assert_normalization(&[Normalization::Left, Normalization::Middle])?;
    let state_left = connect_dimensions(
        "left boundary state",
        old_boundary.state_dimension(),
        "state site left",
        state_site.left_dimension(),
    )?;
    connect_dimensions(
        "left boundary operator",
        old_boundary.operator_dimension(),
        "operator site left",
        operator_site.left_dimension(),
    )?;
    let physical = connect_dimensions(
        "operator site physical",
        operator_site.physical_dimension(),
        "state site physical",
        state_site.physical_dimension(),
    )?;

    let old = old_boundary.data();
    let state = state_site.data();
    let operator_left = operator_site.left_dimension();
    let operator_right = operator_site.right_dimension();
    let state_right = state_site.right_dimension();

    // half[o, l1, p, r] = sum_l old[o, l, l1] state[p, l, r]
    let mut half = Array4::<Complex64>::zeros((operator_left, state_left, physical, state_right));
    for o in 0..operator_left {
        for l1 in 0..state_left {
            for p in 0..physical {
                for r in 0..state_right {
                    let mut sum = ZERO;
                    for l in 0..state_left {
                        sum += old[[o, l, l1]] * state[[p, l, r]];
                    }
                    half[[o, l1, p, r]] = sum;
                }
            }
        }
    }

    let mut new = Array3::<Complex64>::zeros((operator_right, state_right, state_right));
    let mut weighted = Array3::<Complex64>::zeros((state_left, physical, state_right));
    for k in 0..operator_site.number_of_matrices() {
        let (from, to) = operator_site.link(k);
        let matrix = operator_site.matrix(k);
        // weighted[l1, p1, r] = sum_p matrix[p1, p] half[from, l1, p, r]
        for l1 in 0..state_left {
            for p1 in 0..physical {
                for r in 0..state_right {
                    let mut sum = ZERO;
                    for p in 0..physical {
                        sum += matrix[[p1, p]] * half[[from, l1, p, r]];
                    }
                    weighted[[l1, p1, r]] = sum;
                }
            }
        }
        // new[to, r, r1] += sum_{p1, l1} weighted[l1, p1, r] conj(state[p1, l1, r1])
        for r in 0..state_right {
            for r1 in 0..state_right {
                let mut sum = ZERO;
                for p1 in 0..physical {
                    for l1 in 0..state_left {
                        sum += weighted[[l1, p1, r]] * state[[p1, l1, r1]].conj();
                    }
                }
                new[[to, r, r1]] += sum;
            }
        }
    }

    ExpectationBoundary::new(Side::Left, new)
}

/// Absorbs a state site and its operator site into a right expectation
/// boundary.
pub fn contract_sos_right(
    old_boundary: &ExpectationBoundary,
    state_site: &StateSite,
    operator_site: &OperatorSite,
) -> Result<ExpectationBoundary> {
    expect_side("old boundary", old_boundary.side(), Side::Right)?;
    state_site.assert_normalization(&[Normalization::Right, Normalization::Middle])?;
    let state_right = connect_dimensions(
        "right boundary state",
        old_boundary.state_dimension(),
        "state site right",
        state_site.right_dimension(),
    )?;
    connect_dimensions(
        "right boundary operator",
        old_boundary.operator_dimension(),
        "operator site right",
        operator_site.right_dimension(),
    )?;
    let physical = connect_dimensions(
        "operator site physical",
        operator_site.physical_dimension(),
        "state site physical",
        state_site.physical_dimension(),
    )?;

    let old = old_boundary.data();
    let state = state_site.data();
    let operator_right = operator_site.right_dimension();
    let operator_left = operator_site.left_dimension();
    let state_left = state_site.left_dimension();

    // half[o, r1, p, l] = sum_r old[o, r, r1] state[p, l, r]
    let mut half = Array4::<Complex64>::zeros((operator_right, state_right, physical, state_left));
    for o in 0..operator_right {
        for r1 in 0..state_right {
            for p in 0..physical {
                for l in 0..state_left {
                    let mut sum = ZERO;
                    for r in 0..state_right {
                        sum += old[[o, r, r1]] * state[[p, l, r]];
                    }
                    half[[o, r1, p, l]] = sum;
                }
            }
        }
    }

    let mut new = Array3::<Complex64>::zeros((operator_left, state_left, state_left));
    let mut weighted = Array3::<Complex64>::zeros((state_right, physical, state_left));
    for k in 0..operator_site.number_of_matrices() {
        let (from, to) = operator_site.link(k);
        let matrix = operator_site.matrix(k);
        // weighted[r1, p1, l] = sum_p matrix[p1, p] half[to, r1, p, l]
        for r1 in 0..state_right {
            for p1 in 0..physical {
                for l in 0..state_left {
                    let mut sum = ZERO;
                    for p in 0..physical {
                        sum += matrix[[p1, p]] * half[[to, r1, p, l]];
                    }
                    weighted[[r1, p1, l]] = sum;
                }
            }
        }
        // new[from, l, l1] += sum_{p1, r1} weighted[r1, p1, l] conj(state[p1, l1, r1])
        for l in 0..state_left {
            for l1 in 0..state_left {
                let mut sum = ZERO;
                for p1 in 0..physical {
                    for r1 in 0..state_right {
                        sum += weighted[[r1, p1, l]] * state[[p1, l1, r1]].conj();
                    }
                }
                new[[from, l, l1]] += sum;
            }
        }
    }

    ExpectationBoundary::new(Side::Right, new)
}

/// Absorbs an overlap site (the conjugated reference) and a state site into
/// a left overlap boundary.
pub fn contract_vs_left(
    old_boundary: &OverlapBoundary,
    overlap_site: &OverlapSite,
    state_site: &StateSite,
) -> Result<OverlapBoundary> {
    expect_side("old boundary", old_boundary.side(), Side::Left)?;
    let overlap_left = connect_dimensions(
        "left boundary overlap",
        old_boundary.overlap_dimension(),
        "overlap site left",
        overlap_site.left_dimension(),
    )?;
    let state_left = connect_dimensions(
        "left boundary state",
        old_boundary.state_dimension(),
        "state site left",
        state_site.left_dimension(),
    )?;
    let physical = connect_dimensions(
        "overlap site physical",
        overlap_site.physical_dimension(),
        "state site physical",
        state_site.physical_dimension(),
    )?;

    let old = old_boundary.data();
    let overlap = overlap_site.data();
    let state = state_site.data();
    let overlap_right = overlap_site.right_dimension();
    let state_right = state_site.right_dimension();

    let mut new = Array2::<Complex64>::zeros((overlap_right, state_right));
    for vr in 0..overlap_right {
        for sr in 0..state_right {
            let mut sum = ZERO;
            for p in 0..physical {
                for vl in 0..overlap_left {
                    for sl in 0..state_left {
                        sum += old[[vl, sl]] * overlap[[p, vl, vr]] * state[[p, sl, sr]];
                    }
                }
            }
            new[[vr, sr]] = sum;
        }
    }

    Ok(OverlapBoundary::new(Side::Left, new))
}

/// Absorbs an overlap site and a state site into a right overlap boundary.
pub fn contract_vs_right(
    old_boundary: &OverlapBoundary,
    overlap_site: &OverlapSite,
    state_site: &StateSite,
) -> Result<OverlapBoundary> {
    expect_side("old boundary", old_boundary.side(), Side::Right)?;
    let overlap_right = connect_dimensions(
        "right boundary overlap",
        old_boundary.overlap_dimension(),
        "overlap site right",
        overlap_site.right_dimension(),
    )?;
    let state_right = connect_dimensions(
        "right boundary state",
        old_boundary.state_dimension(),
        "state site right",
        state_site.right_dimension(),
    )?;
    let physical = connect_dimensions(
        "overlap site physical",
        overlap_site.physical_dimension(),
        "state site physical",
        state_site.physical_dimension(),
    )?;

    let old = old_boundary.data();
    let overlap = overlap_site.data();
    let state = state_site.data();
    let overlap_left = overlap_site.left_dimension();
    let state_left = state_site.left_dimension();

    let mut new = Array2::<Complex64>::zeros((overlap_left, state_left));
    for vl in 0..overlap_left {
        for sl in 0..state_left {
            let mut sum = ZERO;
            for p in 0..physical {
                for vr in 0..overlap_right {
                    for sr in 0..state_right {
                        sum += old[[vr, sr]] * overlap[[p, vl, vr]] * state[[p, sl, sr]];
                    }
                }
            }
            new[[vl, sl]] = sum;
        }
    }

    Ok(OverlapBoundary::new(Side::Right, new))
}

/// Closes the network by contracting a left and a right expectation boundary
/// against each other.
pub fn contract_expectation_boundaries(
    left_boundary: &ExpectationBoundary,
    right_boundary: &ExpectationBoundary,
) -> Result<Complex64> {
    expect_side("left boundary", left_boundary.side(), Side::Left)?;
    expect_side("right boundary", right_boundary.side(), Side::Right)?;
    let state = connect_dimensions(
        "left boundary state",
        left_boundary.state_dimension(),
        "right boundary state",
        right_boundary.state_dimension(),
    )?;
    let operator = connect_dimensions(
        "left boundary operator",
        left_boundary.operator_dimension(),
        "right boundary operator",
        right_boundary.operator_dimension(),
    )?;

    let left = left_boundary.data();
    let right = right_boundary.data();
    let mut sum = ZERO;
    for o in 0..operator {
        for s in 0..state {
            for s1 in 0..state {
                sum += left[[o, s, s1]] * right[[o, s, s1]];
            }
        }
    }
    Ok(sum)
}

/// The fully contracted network at the working site: the Rayleigh quotient
/// numerator when the state site has unit norm.
pub fn compute_expectation_value_at_site(
    left_boundary: &ExpectationBoundary,
    state_site: &StateSite,
    operator_site: &OperatorSite,
    right_boundary: &ExpectationBoundary,
) -> Result<Complex64> {
    let absorbed = contract_sos_left(left_boundary, state_site, operator_site)?;
    contract_expectation_boundaries(&absorbed, right_boundary)
}

fn connect_effective_dimensions(
    left_boundary: &ExpectationBoundary,
    operator_site: &OperatorSite,
    right_boundary: &ExpectationBoundary,
) -> Result<(usize, usize, usize)> {
    expect_side("left boundary", left_boundary.side(), Side::Left)?;
    expect_side("right boundary", right_boundary.side(), Side::Right)?;
    connect_dimensions(
        "left boundary operator",
        left_boundary.operator_dimension(),
        "operator site left",
        operator_site.left_dimension(),
    )?;
    connect_dimensions(
        "right boundary operator",
        right_boundary.operator_dimension(),
        "operator site right",
        operator_site.right_dimension(),
    )?;
    Ok((
        operator_site.physical_dimension(),
        left_boundary.state_dimension(),
        right_boundary.state_dimension(),
    ))
}

/// Applies the effective Hamiltonian to a working-site tensor without ever
/// materializing the matrix.
pub fn apply_effective_hamiltonian(
    left_boundary: &ExpectationBoundary,
    operator_site: &OperatorSite,
    right_boundary: &ExpectationBoundary,
    input: &Array3<Complex64>,
) -> Result<Array3<Complex64>> {
    let (physical, state_left, state_right) =
        connect_effective_dimensions(left_boundary, operator_site, right_boundary)?;
    let (in_physical, in_left, in_right) = input.dim();
    connect_dimensions("input physical", in_physical, "operator physical", physical)?;
    connect_dimensions("input left", in_left, "left boundary state", state_left)?;
    connect_dimensions("input right", in_right, "right boundary state", state_right)?;

    let left = left_boundary.data();
    let right = right_boundary.data();
    let operator_left = operator_site.left_dimension();
    let operator_right = operator_site.right_dimension();

    // half[o, l1, p, r] = sum_l left[o, l, l1] input[p, l, r]
    let mut half = Array4::<Complex64>::zeros((operator_left, state_left, physical, state_right));
    for o in 0..operator_left {
        for l1 in 0..state_left {
            for p in 0..physical {
                for r in 0..state_right {
                    let mut sum = ZERO;
                    for l in 0..state_left {
                        sum += left[[o, l, l1]] * input[[p, l, r]];
                    }
                    half[[o, l1, p, r]] = sum;
                }
            }
        }
    }

    // bucket[o, p1, l1, r] accumulates the operator action per right bond entry
    let mut bucket =
        Array4::<Complex64>::zeros((operator_right, physical, state_left, state_right));
    for k in 0..operator_site.number_of_matrices() {
        let (from, to) = operator_site.link(k);
        let matrix = operator_site.matrix(k);
        for p1 in 0..physical {
            for l1 in 0..state_left {
                for r in 0..state_right {
                    let mut sum = ZERO;
                    for p in 0..physical {
                        sum += matrix[[p1, p]] * half[[from, l1, p, r]];
                    }
                    bucket[[to, p1, l1, r]] += sum;
                }
            }
        }
    }

    // output[p1, l1, r1] = sum_{o, r} bucket[o, p1, l1, r] right[o, r, r1]
    let mut output = Array3::<Complex64>::zeros((physical, state_left, state_right));
    for p1 in 0..physical {
        for l1 in 0..state_left {
            for r1 in 0..state_right {
                let mut sum = ZERO;
                for o in 0..operator_right {
                    for r in 0..state_right {
                        sum += bucket[[o, p1, l1, r]] * right[[o, r, r1]];
                    }
                }
                output[[p1, l1, r1]] = sum;
            }
        }
    }
    Ok(output)
}

/// Materializes the effective Hamiltonian as a dense Hermitian matrix of
/// dimension physical*left*right. Only sensible for small working blocks.
pub fn compute_optimization_matrix(
    left_boundary: &ExpectationBoundary,
    operator_site: &OperatorSite,
    right_boundary: &ExpectationBoundary,
) -> Result<DMatrix<Complex64>> {
    let (physical, state_left, state_right) =
        connect_effective_dimensions(left_boundary, operator_site, right_boundary)?;
    let dimension = physical * state_left * state_right;
    let left = left_boundary.data();
    let right = right_boundary.data();

    let mut entries = vec![ZERO; dimension * dimension];
    entries
        .par_chunks_mut(dimension)
        .enumerate()
        .for_each(|(row, out)| {
            let p1 = row / (state_left * state_right);
            let l1 = (row / state_right) % state_left;
            let r1 = row % state_right;
            for k in 0..operator_site.number_of_matrices() {
                let (from, to) = operator_site.link(k);
                let matrix = operator_site.matrix(k);
                for p in 0..physical {
                    let weight = matrix[[p1, p]];
                    if weight == ZERO {
                        continue;
                    }
                    for l in 0..state_left {
                        let partial = weight * left[[from, l, l1]];
                        for r in 0..state_right {
                            out[(p * state_left + l) * state_right + r] +=
                                partial * right[[to, r, r1]];
                        }
                    }
                }
            }
        });

    Ok(DMatrix::from_row_slice(dimension, dimension, &entries))
}
