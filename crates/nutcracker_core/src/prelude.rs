//! Convenience re-exports.

pub use crate::config::{BandwidthGrowthRule, ChainOptions};
pub use crate::error::{NutError, Result};
pub use crate::index::{flat_index_to_tensor_index, tensor_index_to_flat_index};
pub use crate::scalar::{c, C64, I, ONE, ZERO};
pub use crate::tolerance::{outside_tolerance, outside_tolerance_complex};
