//! Flat representations of matrix product states.

use ndarray::Array2;
use num_complex::Complex64;
use nutcracker_core::{flat_index_to_tensor_index, NutError, Result, ONE, ZERO};

use crate::connector::connect_dimensions;
use crate::site::StateSite;

/// Intermediate result of flattening a state: the qudits folded so far fused
/// into one physical index, plus the bond to the rest of the chain.
#[derive(Debug, Clone)]
pub struct StateVectorFragment {
    data: Array2<Complex64>,
}

impl StateVectorFragment {
    /// The trivial fragment: both dimensions one, single entry 1.
    pub fn trivial() -> Self {
        let mut data = Array2::zeros((1, 1));
        data[[0, 0]] = ONE;
        Self { data }
    }

    pub fn physical_dimension(&self) -> usize {
        self.data.dim().0
    }

    pub fn right_dimension(&self) -> usize {
        self.data.dim().1
    }

    /// Casts the fragment to a dense vector once the chain is exhausted.
    pub fn into_vector(self) -> Result<Vec<Complex64>> {
        if self.right_dimension() != 1 {
            return Err(NutError::dimension_mismatch(
                "fragment right",
                self.right_dimension(),
                "chain boundary",
                1,
            ));
        }
        Ok(self.data.into_raw_vec())
    }
}

/// Folds one more site into a fragment. The new site's physical index
/// becomes the least significant digit of the fused index.
pub fn extend_state_vector_fragment(
    fragment: &StateVectorFragment,
    state_site: &StateSite,
) -> Result<StateVectorFragment> {
    let bond = connect_dimensions(
        "fragment right",
        fragment.right_dimension(),
        "state site left",
        state_site.left_dimension(),
    )?;
    let fused = fragment.physical_dimension();
    let physical = state_site.physical_dimension();
    let right = state_site.right_dimension();
    let old = &fragment.data;
    let site = state_site.data();

    let mut data = Array2::zeros((fused * physical, right));
    for q in 0..fused {
        for b in 0..bond {
            let weight = old[[q, b]];
            if weight == ZERO {
                continue;
            }
            for p in 0..physical {
                for r in 0..right {
                    data[[q * physical + p, r]] += weight * site[[p, b, r]];
                }
            }
        }
    }
    Ok(StateVectorFragment { data })
}

/// Contracts a full chain of state sites to a dense state vector. Runs in
/// time exponential in the chain length.
pub fn compute_state_vector<'a>(
    state_sites: impl IntoIterator<Item = &'a StateSite>,
) -> Result<Vec<Complex64>> {
    let mut fragment = StateVectorFragment::trivial();
    for state_site in state_sites {
        fragment = extend_state_vector_fragment(&fragment, state_site)?;
    }
    fragment.into_vector()
}

/// The number of components of the flat representation.
pub fn compute_state_vector_length<'a>(
    state_sites: impl IntoIterator<Item = &'a StateSite>,
) -> u64 {
    state_sites
        .into_iter()
        .map(|s| s.physical_dimension() as u64)
        .product()
}

/// One amplitude of the state, selected by the observed value of every
/// qudit: a left fold of row vectors through the per-observation transition
/// matrices.
pub fn compute_state_vector_component_for_observation<'a>(
    state_sites: impl IntoIterator<Item = &'a StateSite>,
    observed_values: &[usize],
) -> Result<Complex64> {
    let mut row = vec![ONE];
    let mut observations = observed_values.iter();
    for state_site in state_sites {
        let observation = *observations.next().ok_or_else(|| {
            NutError::invalid_tensor("fewer observed values than state sites")
        })?;
        let matrix = state_site.transition_matrix_for_observation(observation)?;
        connect_dimensions(
            "running bond",
            row.len(),
            "state site left",
            state_site.left_dimension(),
        )?;
        let right = state_site.right_dimension();
        let mut next = vec![ZERO; right];
        for (l, &weight) in row.iter().enumerate() {
            for (r, slot) in next.iter_mut().enumerate() {
                *slot += weight * matrix[[l, r]];
            }
        }
        row = next;
    }
    if observations.next().is_some() {
        return Err(NutError::invalid_tensor(
            "more observed values than state sites",
        ));
    }
    connect_dimensions("running bond", row.len(), "chain boundary", 1)?;
    Ok(row[0])
}

/// One amplitude of the state, selected by its index in the flat
/// representation (row-major, leftmost site most significant).
pub fn compute_state_vector_component<'a>(
    state_sites: impl IntoIterator<Item = &'a StateSite> + Clone,
    component: u64,
) -> Result<Complex64> {
    let dimensions: Vec<usize> = state_sites
        .clone()
        .into_iter()
        .map(|s| s.physical_dimension())
        .collect();
    let observed_values = flat_index_to_tensor_index(&dimensions, component);
    compute_state_vector_component_for_observation(state_sites, &observed_values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gauge::{random_state_site_middle, random_state_site_right};
    use crate::site::Normalization;
    use nutcracker_core::c;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_single_site_flattening() {
        let site = StateSite::new(
            Normalization::Middle,
            2,
            1,
            1,
            vec![c(0.6, 0.0), c(0.0, 0.8)],
        )
        .unwrap();
        let vector = compute_state_vector([&site]).unwrap();
        assert_eq!(vector.len(), 2);
        assert!((vector[0] - c(0.6, 0.0)).norm() < 1e-15);
        assert!((vector[1] - c(0.0, 0.8)).norm() < 1e-15);
    }

    #[test]
    fn test_component_matches_full_vector() {
        let mut rng = StdRng::seed_from_u64(0xf1);
        let sites = vec![
            random_state_site_middle(2, 1, 2, &mut rng).unwrap(),
            random_state_site_right(3, 2, 2, &mut rng).unwrap(),
            random_state_site_right(2, 2, 1, &mut rng).unwrap(),
        ];
        let vector = compute_state_vector(sites.iter()).unwrap();
        assert_eq!(vector.len() as u64, compute_state_vector_length(sites.iter()));
        for component in 0..vector.len() as u64 {
            let amplitude =
                compute_state_vector_component(sites.iter(), component).unwrap();
            assert!((amplitude - vector[component as usize]).norm() < 1e-13);
        }
    }

    #[test]
    fn test_observation_out_of_range() {
        let site = StateSite::new(Normalization::Middle, 2, 1, 1, vec![ONE, ZERO]).unwrap();
        assert!(
            compute_state_vector_component_for_observation([&site], &[2]).is_err()
        );
    }
}
