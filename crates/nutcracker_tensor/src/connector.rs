//! Bond-dimension connector.

use nutcracker_core::{NutError, Result};

/// Checks that two named bond endpoints carry the same dimension and returns
/// it. Every kernel connects its arguments before contracting.
pub fn connect_dimensions(name_a: &str, size_a: usize, name_b: &str, size_b: usize) -> Result<usize> {
    if size_a == size_b {
        Ok(size_a)
    } else {
        Err(NutError::dimension_mismatch(name_a, size_a, name_b, size_b))
    }
}
