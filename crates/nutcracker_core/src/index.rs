//! Flat / tensor index conversions.
//!
//! The convention is row-major: the leftmost entry of a tensor index is the
//! most significant digit of the flat index.

/// Converts a multi-index into the corresponding flat index.
pub fn tensor_index_to_flat_index(dimensions: &[usize], tensor_index: &[usize]) -> u64 {
    debug_assert_eq!(dimensions.len(), tensor_index.len());
    let mut flat: u64 = 0;
    for (&dimension, &entry) in dimensions.iter().zip(tensor_index) {
        debug_assert!(entry < dimension);
        flat = flat * dimension as u64 + entry as u64;
    }
    flat
}

/// Converts a flat index into the corresponding multi-index.
pub fn flat_index_to_tensor_index(dimensions: &[usize], flat_index: u64) -> Vec<usize> {
    let mut remaining = flat_index;
    let mut tensor_index = vec![0usize; dimensions.len()];
    for (entry, &dimension) in tensor_index.iter_mut().zip(dimensions).rev() {
        *entry = (remaining % dimension as u64) as usize;
        remaining /= dimension as u64;
    }
    debug_assert_eq!(remaining, 0);
    tensor_index
}
