//! # Nutcracker Chain
//!
//! The DMRG optimization chain: a cursor sweeping along a matrix product
//! state, solving one local eigenproblem per site against cached environment
//! boundaries, transferring the gauge between sites, and growing the bond
//! dimension until the energy stops improving.
//!
//! ## Example
//!
//! ```rust,ignore
//! use nutcracker_chain::Chain;
//! use nutcracker_core::ChainOptions;
//!
//! let mut chain = Chain::new(operator_sites, 2, ChainOptions::default())?;
//! chain.optimize_chain()?;
//! println!("ground state energy: {}", chain.energy());
//! ```

pub mod bandwidth;
pub mod chain;
pub mod optimizer;

pub use bandwidth::{compute_bandwidth_dimension_sequence, maximum_bandwidth_dimension};
pub use chain::{Chain, ChainCallbacks, ChainStatus};
pub use optimizer::{optimize_state_site, OptimizerResult};
