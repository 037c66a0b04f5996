//! End-to-end DMRG scenarios, checked against dense diagonalization of the
//! same operators.

use nalgebra::DMatrix;
use ndarray::Array2;
use num_complex::Complex64;
use nutcracker_chain::Chain;
use nutcracker_core::{c, ChainOptions, NutError, ONE, ZERO};
use nutcracker_tensor::{compute_state_overlap, compute_state_vector, OperatorSite};

// ============================================================================
// Operator builders
// ============================================================================

fn identity2() -> Array2<Complex64> {
    Array2::from_shape_vec((2, 2), vec![ONE, ZERO, ZERO, ONE]).unwrap()
}

fn pauli_x() -> Array2<Complex64> {
    Array2::from_shape_vec((2, 2), vec![ZERO, ONE, ONE, ZERO]).unwrap()
}

fn pauli_z() -> Array2<Complex64> {
    Array2::from_shape_vec((2, 2), vec![ONE, ZERO, ZERO, -ONE]).unwrap()
}

fn scaled(matrix: &Array2<Complex64>, factor: f64) -> Array2<Complex64> {
    matrix.mapv(|z| z * c(factor, 0.0))
}

/// H = -sum_i Z_i as a bandwidth-2 MPO.
fn field_operator(number_of_sites: usize) -> Vec<OperatorSite> {
    let minus_z = scaled(&pauli_z(), -1.0);
    if number_of_sites == 1 {
        return vec![OperatorSite::new(2, 1, 1, vec![(1, 1, minus_z)]).unwrap()];
    }
    let mut sites = Vec::with_capacity(number_of_sites);
    sites.push(
        OperatorSite::new(2, 1, 2, vec![(1, 1, minus_z.clone()), (1, 2, identity2())]).unwrap(),
    );
    for _ in 1..number_of_sites - 1 {
        sites.push(
            OperatorSite::new(
                2,
                2,
                2,
                vec![
                    (1, 1, identity2()),
                    (2, 1, minus_z.clone()),
                    (2, 2, identity2()),
                ],
            )
            .unwrap(),
        );
    }
    sites.push(OperatorSite::new(2, 2, 1, vec![(1, 1, identity2()), (2, 1, minus_z)]).unwrap());
    sites
}

/// The transverse-field Ising model H = -J sum Z_i Z_{i+1} - h sum X_i as a
/// bandwidth-3 MPO with open boundaries.
fn transverse_field_ising_operator(
    number_of_sites: usize,
    coupling: f64,
    field: f64,
) -> Vec<OperatorSite> {
    assert!(number_of_sites >= 2);
    let field_term = scaled(&pauli_x(), -field);
    let coupling_term = scaled(&pauli_z(), -coupling);
    let mut sites = Vec::with_capacity(number_of_sites);
    sites.push(
        OperatorSite::new(
            2,
            1,
            3,
            vec![
                (1, 1, field_term.clone()),
                (1, 2, coupling_term.clone()),
                (1, 3, identity2()),
            ],
        )
        .unwrap(),
    );
    for _ in 1..number_of_sites - 1 {
        sites.push(
            OperatorSite::new(
                2,
                3,
                3,
                vec![
                    (1, 1, identity2()),
                    (2, 1, pauli_z()),
                    (3, 1, field_term.clone()),
                    (3, 2, coupling_term.clone()),
                    (3, 3, identity2()),
                ],
            )
            .unwrap(),
        );
    }
    sites.push(
        OperatorSite::new(
            2,
            3,
            1,
            vec![(1, 1, identity2()), (2, 1, pauli_z()), (3, 1, field_term)],
        )
        .unwrap(),
    );
    sites
}

// ============================================================================
// Dense reference solutions
// ============================================================================

fn kronecker(a: &DMatrix<Complex64>, b: &Array2<Complex64>) -> DMatrix<Complex64> {
    let (ar, ac) = (a.nrows(), a.ncols());
    let (br, bc) = b.dim();
    DMatrix::from_fn(ar * br, ac * bc, |row, col| {
        a[(row / br, col / bc)] * b[[row % br, col % bc]]
    })
}

/// Flattens an MPO into the dense matrix it represents.
fn operator_matrix(sites: &[OperatorSite]) -> DMatrix<Complex64> {
    let mut carriers: Vec<DMatrix<Complex64>> = vec![DMatrix::from_element(1, 1, ONE)];
    for site in sites {
        let physical = site.physical_dimension();
        let grown = carriers[0].nrows() * physical;
        let mut next: Vec<DMatrix<Complex64>> =
            vec![DMatrix::from_element(grown, grown, ZERO); site.right_dimension()];
        for k in 0..site.number_of_matrices() {
            let (from, to) = site.link(k);
            next[to] += kronecker(&carriers[from], site.matrix(k));
        }
        carriers = next;
    }
    assert_eq!(carriers.len(), 1);
    carriers.pop().unwrap()
}

fn exact_ground_energy(sites: &[OperatorSite]) -> f64 {
    let matrix = operator_matrix(sites);
    let hermitian = (&matrix + matrix.adjoint()).scale(0.5);
    let eigenvalues = hermitian.symmetric_eigen().eigenvalues;
    eigenvalues.iter().cloned().fold(f64::INFINITY, f64::min)
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_trivial_single_site_chain() {
    let scalar = Array2::from_shape_vec((1, 1), vec![c(2.5, 0.0)]).unwrap();
    let operator = vec![OperatorSite::new(1, 1, 1, vec![(1, 1, scalar)]).unwrap()];
    let mut chain = Chain::with_seed(operator, 1, ChainOptions::default(), 1).unwrap();
    chain.optimize_chain().unwrap();
    assert!((chain.energy() - 2.5).abs() < 1e-12);
}

#[test]
fn test_external_field_ground_state_at_bandwidth_one() {
    // S1: H = -sum Z on four spins; ground state |0000> with energy -4
    let mut chain = Chain::with_seed(field_operator(4), 1, ChainOptions::default(), 42).unwrap();
    chain.sweep_until_converged().unwrap();
    assert!((chain.energy() - (-4.0)).abs() < 1e-10);

    let state = chain.make_copy_of_state().unwrap();
    let vector = compute_state_vector(state.sites()).unwrap();
    assert!((vector[0].norm() - 1.0).abs() < 1e-8);
    for amplitude in &vector[1..] {
        assert!(amplitude.norm() < 1e-6);
    }
}

#[test]
fn test_two_site_ising_matches_the_closed_form() {
    let operator = transverse_field_ising_operator(2, 1.0, 0.5);
    let exact = exact_ground_energy(&operator);
    // E0 = -sqrt(J^2 + 4 h^2) for two sites
    assert!((exact - (-(1.0f64 + 4.0 * 0.25).sqrt())).abs() < 1e-12);

    let mut chain = Chain::with_seed(operator, 2, ChainOptions::default(), 5).unwrap();
    chain.optimize_chain().unwrap();
    assert!((chain.energy() - exact).abs() < 1e-10);
}

#[test]
fn test_ising_chain_against_exact_diagonalization() {
    // S2: TFIM with J=1, h=0.5 on eight sites
    let operator = transverse_field_ising_operator(8, 1.0, 0.5);
    let exact = exact_ground_energy(&operator);

    let options = ChainOptions {
        sweep_convergence_threshold: 1e-10,
        chain_convergence_threshold: 1e-9,
        ..ChainOptions::default()
    };
    let mut chain = Chain::with_seed(operator, 8, options, 12).unwrap();
    chain.optimize_chain().unwrap();
    assert!(
        (chain.energy() - exact).abs() < 1e-4,
        "dmrg {} vs exact {exact}",
        chain.energy()
    );
}

#[test]
fn test_orthogonal_second_level() {
    // S3: project out the ground state of -sum Z and find the next level
    let mut chain = Chain::with_seed(field_operator(4), 1, ChainOptions::default(), 77).unwrap();
    chain.optimize_chain().unwrap();
    let ground_energy = chain.energy();
    assert!((ground_energy - (-4.0)).abs() < 1e-10);

    let ground_state = chain.make_copy_of_state().unwrap();
    chain.add_projector(ground_state.clone()).unwrap();
    assert_eq!(chain.number_of_projectors(), 1);
    chain.optimize_chain().unwrap();

    assert!(chain.energy() > ground_energy + 1.0);
    assert!((chain.energy() - (-2.0)).abs() < 1e-8);

    let excited_state = chain.make_copy_of_state().unwrap();
    let overlap = compute_state_overlap(&ground_state, &excited_state).unwrap();
    assert!(overlap.norm() <= 1e-10, "overlap {}", overlap.norm());
}

#[test]
fn test_bandwidth_cap_boundary() {
    // S4: six qubits support bandwidth 8 = 2^3 and nothing more
    let mut chain = Chain::with_seed(field_operator(6), 1, ChainOptions::default(), 3).unwrap();
    chain.increase_bandwidth_dimension(8).unwrap();
    assert_eq!(chain.bandwidth_dimension(), 8);
    let err = chain.increase_bandwidth_dimension(9).unwrap_err();
    assert!(matches!(
        err,
        NutError::RequestedBandwidthDimensionTooLarge {
            requested: 9,
            maximum: 8
        }
    ));
}

#[test]
fn test_restart_invariance_across_seeds() {
    // S5: two different seeds must agree on the converged energy
    let operator = transverse_field_ising_operator(6, 1.0, 1.5);
    let exact = exact_ground_energy(&operator);
    let options = ChainOptions {
        sweep_convergence_threshold: 1e-11,
        chain_convergence_threshold: 1e-10,
        ..ChainOptions::default()
    };

    let mut first = Chain::with_seed(operator.clone(), 4, options.clone(), 100).unwrap();
    first.optimize_chain().unwrap();
    let mut second = Chain::with_seed(operator, 4, options, 200).unwrap();
    second.optimize_chain().unwrap();

    assert!(
        (first.energy() - second.energy()).abs() < 1e-6,
        "seeds disagree: {} vs {}",
        first.energy(),
        second.energy()
    );
    assert!((first.energy() - exact).abs() < 1e-6);
}

#[test]
fn test_callbacks_fire_in_order() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let events = Rc::new(RefCell::new(Vec::new()));
    let mut chain = Chain::with_seed(field_operator(3), 1, ChainOptions::default(), 9).unwrap();

    let log = Rc::clone(&events);
    chain.on_sweep_performed(move |_| log.borrow_mut().push("sweep"));
    let log = Rc::clone(&events);
    chain.on_sweeps_converged(move |_| log.borrow_mut().push("converged"));
    let log = Rc::clone(&events);
    chain.on_chain_optimized(move |_| log.borrow_mut().push("optimized"));

    chain.optimize_chain().unwrap();

    let events = events.borrow();
    assert!(events.contains(&"sweep"));
    assert!(events.contains(&"converged"));
    assert_eq!(events.last(), Some(&"optimized"));
    let first_converged = events.iter().position(|&e| e == "converged").unwrap();
    assert!(events[..first_converged].contains(&"sweep"));
}
