//! Bandwidth planning.

use nutcracker_core::{NutError, Result};

fn clamped_product(dimensions: &[usize]) -> usize {
    let mut product: u128 = 1;
    for &dimension in dimensions {
        product = product.saturating_mul(dimension as u128);
        if product > usize::MAX as u128 {
            return usize::MAX;
        }
    }
    product as usize
}

/// The largest bandwidth dimension any bond of the chain can usefully reach:
/// the Hilbert-space dimension of the smaller half at the most balanced
/// bond.
pub fn maximum_bandwidth_dimension(physical_dimensions: &[usize]) -> usize {
    let number_of_sites = physical_dimensions.len();
    if number_of_sites <= 1 {
        return 1;
    }
    (1..number_of_sites)
        .map(|bond| {
            let prefix = clamped_product(&physical_dimensions[..bond]);
            let suffix = clamped_product(&physical_dimensions[bond..]);
            prefix.max(suffix)
        })
        .min()
        .expect("a multi-site chain has at least one interior bond")
}

/// The per-bond dimension sequence for a requested bandwidth: outer bonds
/// are one, interior bonds are capped by the requested bandwidth and by the
/// Hilbert-space dimension on either side.
pub fn compute_bandwidth_dimension_sequence(
    requested_bandwidth_dimension: usize,
    physical_dimensions: &[usize],
) -> Result<Vec<usize>> {
    if requested_bandwidth_dimension < 1 {
        return Err(NutError::index_too_low("requested bandwidth dimension", 0));
    }
    let maximum = maximum_bandwidth_dimension(physical_dimensions);
    if requested_bandwidth_dimension > maximum {
        return Err(NutError::RequestedBandwidthDimensionTooLarge {
            requested: requested_bandwidth_dimension,
            maximum,
        });
    }
    let number_of_sites = physical_dimensions.len();
    let sequence = (0..=number_of_sites)
        .map(|bond| {
            let prefix = clamped_product(&physical_dimensions[..bond]);
            let suffix = clamped_product(&physical_dimensions[bond..]);
            requested_bandwidth_dimension.min(prefix).min(suffix)
        })
        .collect();
    Ok(sequence)
}
