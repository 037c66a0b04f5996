//! # Nutcracker Core
//!
//! Core types and utilities shared across the Nutcracker DMRG engine.
//!
//! This crate provides:
//! - `NutError`: the unified error taxonomy of the engine
//! - `ChainOptions`: convergence thresholds and iteration limits
//! - Flat / tensor index conversions for row-major multi-index data
//! - Relative tolerance comparisons used by every convergence check
//! - Complex scalar helpers
//!
//! ## Example
//!
//! ```rust
//! use nutcracker_core::prelude::*;
//!
//! let options = ChainOptions::default();
//! assert_eq!(options.maximum_number_of_iterations, 10_000);
//!
//! let flat = tensor_index_to_flat_index(&[2, 3, 2], &[1, 2, 0]);
//! assert_eq!(flat_index_to_tensor_index(&[2, 3, 2], flat), vec![1, 2, 0]);
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod prelude;
pub mod scalar;
pub mod tolerance;

pub use config::{BandwidthGrowthRule, ChainOptions};
pub use error::{NutError, Result};
pub use index::{flat_index_to_tensor_index, tensor_index_to_flat_index};
pub use scalar::{c, C64, I, ONE, ZERO};
pub use tolerance::{outside_tolerance, outside_tolerance_complex};
