//! Cross-module invariants on randomly generated states.

use num_complex::Complex64;
use nutcracker_core::{c, ONE};
use nutcracker_tensor::{
    compute_state_overlap, compute_state_vector, move_site_cursor_left, move_site_cursor_right,
    random_state_site_middle, random_state_site_right, State, StateSite,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// A random right-canonical MPS over qubit sites with bandwidth capped by
/// the chain geometry.
fn random_state(rng: &mut StdRng, number_of_sites: usize, bandwidth: usize) -> State {
    let dims: Vec<usize> = (0..=number_of_sites)
        .map(|bond| {
            let prefix = 1usize << bond.min(30);
            let suffix = 1usize << (number_of_sites - bond).min(30);
            bandwidth.min(prefix).min(suffix)
        })
        .collect();
    let first = random_state_site_middle(2, dims[0], dims[1], rng).unwrap();
    let rest: Vec<StateSite> = (1..number_of_sites)
        .map(|site| random_state_site_right(2, dims[site], dims[site + 1], rng).unwrap())
        .collect();
    State::new(first, rest).unwrap()
}

fn inner_product(a: &[Complex64], b: &[Complex64]) -> Complex64 {
    a.iter().zip(b).map(|(x, y)| x.conj() * y).sum()
}

#[test]
fn test_self_overlap_is_one() {
    let mut rng = StdRng::seed_from_u64(0x50);
    for _ in 0..10 {
        let number_of_sites = rng.gen_range(1..=6);
        let state = random_state(&mut rng, number_of_sites, 4);
        let overlap = compute_state_overlap(&state, &state).unwrap();
        assert!(
            (overlap - ONE).norm() < 1e-13,
            "self overlap was {overlap}"
        );
    }
}

#[test]
fn test_state_overlap_matches_dense_inner_product() {
    let mut rng = StdRng::seed_from_u64(0x51);
    for _ in 0..5 {
        let number_of_sites = rng.gen_range(2..=5);
        let bra = random_state(&mut rng, number_of_sites, 3);
        let ket = random_state(&mut rng, number_of_sites, 3);
        let overlap = compute_state_overlap(&bra, &ket).unwrap();
        let dense = inner_product(
            &compute_state_vector(bra.sites()).unwrap(),
            &compute_state_vector(ket.sites()).unwrap(),
        );
        assert!((overlap - dense).norm() < 1e-12);
    }
}

#[test]
fn test_cursor_moves_preserve_the_state() {
    let mut rng = StdRng::seed_from_u64(0x52);
    for _ in 0..5 {
        let state = random_state(&mut rng, 5, 4);
        let reference = compute_state_vector(state.sites()).unwrap();

        // sweep the center all the way right, flattening at every step
        let mut sites: Vec<StateSite> = state.sites().cloned().collect();
        for position in 0..sites.len() - 1 {
            let (left_site, new_middle) =
                move_site_cursor_right(&sites[position], &sites[position + 1]).unwrap();
            sites[position] = left_site;
            sites[position + 1] = new_middle;
            let vector = compute_state_vector(sites.iter()).unwrap();
            let drift: f64 = vector
                .iter()
                .zip(&reference)
                .map(|(a, b)| (a - b).norm_sqr())
                .sum::<f64>()
                .sqrt();
            assert!(drift < 1e-12, "state drifted by {drift}");
        }

        // and back again
        for position in (1..sites.len()).rev() {
            let (new_middle, right_site) =
                move_site_cursor_left(&sites[position], &sites[position - 1]).unwrap();
            sites[position] = right_site;
            sites[position - 1] = new_middle;
        }
        let vector = compute_state_vector(sites.iter()).unwrap();
        let drift: f64 = vector
            .iter()
            .zip(&reference)
            .map(|(a, b)| (a - b).norm_sqr())
            .sum::<f64>()
            .sqrt();
        assert!(drift < 1e-12, "round trip drifted by {drift}");
    }
}

#[test]
fn test_unit_norm_follows_the_cursor() {
    let mut rng = StdRng::seed_from_u64(0x53);
    let state = random_state(&mut rng, 4, 4);
    let mut sites: Vec<StateSite> = state.sites().cloned().collect();
    for position in 0..sites.len() - 1 {
        let (left_site, new_middle) =
            move_site_cursor_right(&sites[position], &sites[position + 1]).unwrap();
        sites[position] = left_site;
        sites[position + 1] = new_middle;
        assert!((sites[position + 1].norm() - 1.0).abs() < 1e-12);
    }
}

#[test]
fn test_phase_rotation_shows_in_overlap() {
    let mut rng = StdRng::seed_from_u64(0x54);
    let state = random_state(&mut rng, 3, 2);
    let phase = c(0.0, 1.0);
    let rotated_first = StateSite::new(
        nutcracker_tensor::Normalization::Middle,
        state.first_site().physical_dimension(),
        state.first_site().left_dimension(),
        state.first_site().right_dimension(),
        state.first_site().data().iter().map(|z| z * phase).collect(),
    )
    .unwrap();
    let rotated = State::new(rotated_first, state.rest_sites().to_vec()).unwrap();
    let overlap = compute_state_overlap(&state, &rotated).unwrap();
    assert!((overlap - phase).norm() < 1e-13);
}
