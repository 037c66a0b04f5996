//! The local eigensolver: lowest eigenvalue of the projected effective
//! Hamiltonian at the working site.

use nalgebra::{DMatrix, DVector};
use ndarray::Array3;
use num_complex::Complex64;
use nutcracker_core::{c, outside_tolerance_complex, NutError, Result, ZERO};
use nutcracker_tensor::{
    apply_effective_hamiltonian, compute_expectation_value_at_site, compute_optimization_matrix,
    flatten_state_site, unflatten_state_site, ExpectationBoundary, OperatorSite, ProjectorMatrix,
    StateSite,
};

/// Below this working-block dimension the effective Hamiltonian is
/// materialized and solved densely; above it the solve is matrix-free.
const DENSE_DIMENSION_LIMIT: usize = 128;

/// Krylov block size between restarts of the iterative solve.
const LANCZOS_BLOCK: usize = 40;

/// A guess whose projected norm falls below this lies in the projector span.
const GUESS_PROJECTION_THRESHOLD: f64 = 1e-7;

/// Outcome of one local optimization.
#[derive(Debug)]
pub struct OptimizerResult {
    pub number_of_iterations: usize,
    pub eigenvalue: f64,
    pub state_site: StateSite,
}

/// Solves for the smallest-real eigenpair of the effective Hamiltonian
/// restricted to the orthogonal complement of the projector columns, then
/// validates the result against the sanity-check threshold.
#[allow(clippy::too_many_arguments)]
pub fn optimize_state_site(
    left_boundary: &ExpectationBoundary,
    current_state_site: &StateSite,
    operator_site: &OperatorSite,
    right_boundary: &ExpectationBoundary,
    projector_matrix: Option<&ProjectorMatrix>,
    convergence_threshold: f64,
    sanity_check_threshold: f64,
    maximum_number_of_iterations: usize,
) -> Result<OptimizerResult> {
    let physical = current_state_site.physical_dimension();
    let left = current_state_site.left_dimension();
    let right = current_state_site.right_dimension();
    let dimension = physical * left * right;

    if let Some(projector) = projector_matrix {
        if projector.number_of_projectors() >= dimension {
            return Err(NutError::OptimizerGivenTooManyProjectors {
                projectors: projector.number_of_projectors(),
                physical,
                left,
                right,
            });
        }
    }

    let guess = flatten_state_site(current_state_site);
    let start = match projector_matrix {
        Some(projector) => {
            let projected = projector.project_out(&guess);
            if projected.norm() < GUESS_PROJECTION_THRESHOLD {
                return Err(NutError::OptimizerGivenGuessInProjectorSpace);
            }
            projector.restrict(&projected)
        }
        None => guess,
    };

    let (eigenvalue, vector, number_of_iterations) = if dimension <= DENSE_DIMENSION_LIMIT {
        let (eigenvalue, vector) = solve_dense(
            left_boundary,
            operator_site,
            right_boundary,
            projector_matrix,
        )?;
        (eigenvalue, vector, 1)
    } else {
        let reduced_dimension = projector_matrix
            .map(|p| p.orthogonal_subspace_dimension())
            .unwrap_or(dimension);
        let matvec = |x: &DVector<Complex64>| -> Result<DVector<Complex64>> {
            let full = match projector_matrix {
                Some(projector) => projector.expand(x),
                None => x.clone(),
            };
            let tensor = Array3::from_shape_vec(
                (physical, left, right),
                full.iter().cloned().collect(),
            )
            .expect("the flat vector has the working-block length");
            let output =
                apply_effective_hamiltonian(left_boundary, operator_site, right_boundary, &tensor)?;
            let flat = DVector::from_column_slice(
                output.as_slice().expect("kernel output is contiguous"),
            );
            Ok(match projector_matrix {
                Some(projector) => projector.restrict(&flat),
                None => flat,
            })
        };
        let (eigenvalue, reduced, iterations) = lanczos_smallest(
            &matvec,
            reduced_dimension,
            start,
            convergence_threshold,
            maximum_number_of_iterations,
        )?;
        let full = match projector_matrix {
            Some(projector) => projector.expand(&reduced),
            None => reduced,
        };
        (eigenvalue, full, iterations)
    };

    let normal = vector.norm();
    if normal == 0.0 {
        return Err(NutError::OptimizerObtainedVanishingEigenvector(normal));
    }
    let normalized = vector.unscale(normal);
    let new_state_site = unflatten_state_site(physical, left, right, &normalized)?;

    let expectation_value = compute_expectation_value_at_site(
        left_boundary,
        &new_state_site,
        operator_site,
        right_boundary,
    )?;
    let overlap = projector_matrix
        .map(|projector| projector.overlap_with(&normalized))
        .unwrap_or(0.0);

    let eigenvalue_c = c(eigenvalue, 0.0);
    if outside_tolerance_complex(eigenvalue_c, expectation_value, sanity_check_threshold) {
        return Err(
            NutError::OptimizerObtainedEigenvalueDifferentFromExpectationValue {
                eigenvalue: eigenvalue_c,
                expected_value: expectation_value,
            },
        );
    }
    if expectation_value.norm() > sanity_check_threshold
        && expectation_value.im.abs() / expectation_value.norm() > sanity_check_threshold
    {
        return Err(NutError::OptimizerObtainedComplexEigenvalue(
            expectation_value,
        ));
    }
    if normal < 1.0 - sanity_check_threshold {
        return Err(NutError::OptimizerObtainedVanishingEigenvector(normal));
    }
    if overlap > sanity_check_threshold {
        return Err(NutError::OptimizerObtainedEigenvectorInProjectorSpace(
            overlap,
        ));
    }

    Ok(OptimizerResult {
        number_of_iterations,
        eigenvalue,
        state_site: new_state_site,
    })
}

/// Dense path: materialize the effective Hamiltonian, restrict it to the
/// orthogonal complement, and take the smallest eigenpair.
fn solve_dense(
    left_boundary: &ExpectationBoundary,
    operator_site: &OperatorSite,
    right_boundary: &ExpectationBoundary,
    projector_matrix: Option<&ProjectorMatrix>,
) -> Result<(f64, DVector<Complex64>)> {
    let hamiltonian = compute_optimization_matrix(left_boundary, operator_site, right_boundary)?;
    match projector_matrix {
        Some(projector) => {
            let dimension = projector.projector_length();
            let reduced_dimension = projector.orthogonal_subspace_dimension();
            let mut basis = DMatrix::from_element(dimension, reduced_dimension, ZERO);
            for k in 0..reduced_dimension {
                let mut unit = DVector::from_element(reduced_dimension, ZERO);
                unit[k] = Complex64::new(1.0, 0.0);
                basis.set_column(k, &projector.expand(&unit));
            }
            let restricted = basis.adjoint() * &hamiltonian * &basis;
            let (eigenvalue, reduced) = smallest_eigenpair(restricted);
            Ok((eigenvalue, basis * reduced))
        }
        None => {
            let (eigenvalue, vector) = smallest_eigenpair(hamiltonian);
            Ok((eigenvalue, vector))
        }
    }
}

/// Smallest eigenpair of a Hermitian matrix, scrubbing float asymmetry
/// first.
fn smallest_eigenpair(matrix: DMatrix<Complex64>) -> (f64, DVector<Complex64>) {
    let hermitian = (&matrix + matrix.adjoint()).scale(0.5);
    let decomposition = hermitian.symmetric_eigen();
    let mut best = 0;
    for i in 1..decomposition.eigenvalues.len() {
        if decomposition.eigenvalues[i] < decomposition.eigenvalues[best] {
            best = i;
        }
    }
    (
        decomposition.eigenvalues[best],
        decomposition.eigenvectors.column(best).into_owned(),
    )
}

/// Restarted Lanczos iteration with full reorthogonalization, converging on
/// the smallest Ritz value of a Hermitian operator.
fn lanczos_smallest<F>(
    apply: &F,
    dimension: usize,
    start: DVector<Complex64>,
    tolerance: f64,
    maximum_number_of_iterations: usize,
) -> Result<(f64, DVector<Complex64>, usize)>
where
    F: Fn(&DVector<Complex64>) -> Result<DVector<Complex64>>,
{
    let block = LANCZOS_BLOCK.min(dimension);
    let mut matvecs = 0usize;
    let mut v = start;
    let norm = v.norm();
    if norm == 0.0 {
        return Err(NutError::OptimizerObtainedVanishingEigenvector(0.0));
    }
    v = v.unscale(norm);

    loop {
        let mut basis: Vec<DVector<Complex64>> = vec![v.clone()];
        let mut alphas: Vec<f64> = Vec::with_capacity(block);
        let mut betas: Vec<f64> = Vec::with_capacity(block);

        for j in 0..block {
            if matvecs >= maximum_number_of_iterations {
                return Err(NutError::OptimizerUnableToConverge(matvecs));
            }
            let mut w = apply(&basis[j])?;
            matvecs += 1;
            let alpha = basis[j].dotc(&w).re;
            alphas.push(alpha);

            // full reorthogonalization, two passes
            for _ in 0..2 {
                for u in &basis {
                    let overlap = u.dotc(&w);
                    w -= u * overlap;
                }
            }
            let beta = w.norm();

            let t_dim = alphas.len();
            let tridiagonal = DMatrix::<f64>::from_fn(t_dim, t_dim, |row, col| {
                if row == col {
                    alphas[row]
                } else if row + 1 == col {
                    betas[row]
                } else if col + 1 == row {
                    betas[col]
                } else {
                    0.0
                }
            });
            let decomposition = tridiagonal.symmetric_eigen();
            let mut best = 0;
            for i in 1..t_dim {
                if decomposition.eigenvalues[i] < decomposition.eigenvalues[best] {
                    best = i;
                }
            }
            let theta = decomposition.eigenvalues[best];
            let weights: Vec<f64> = (0..t_dim)
                .map(|i| decomposition.eigenvectors[(i, best)])
                .collect();
            let residual = beta * weights[t_dim - 1].abs();

            if residual <= tolerance * theta.abs().max(1.0) || beta < 1e-14 {
                return Ok((theta, assemble_ritz_vector(&basis, &weights, dimension), matvecs));
            }

            if j + 1 < block {
                basis.push(w.unscale(beta));
                betas.push(beta);
            } else {
                // restart from the best Ritz vector so far
                v = assemble_ritz_vector(&basis, &weights, dimension);
            }
        }
    }
}

fn assemble_ritz_vector(
    basis: &[DVector<Complex64>],
    weights: &[f64],
    dimension: usize,
) -> DVector<Complex64> {
    let mut ritz = DVector::from_element(dimension, ZERO);
    for (vector, &weight) in basis.iter().zip(weights) {
        ritz += vector * c(weight, 0.0);
    }
    let norm = ritz.norm();
    ritz.unscale(norm)
}
