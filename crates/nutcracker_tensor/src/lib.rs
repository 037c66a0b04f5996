//! # Nutcracker Tensor
//!
//! Tensor primitives for matrix product states and operators, together with
//! the contraction kernels, gauge transfer, projector machinery, and
//! flattening routines the DMRG sweep is built from.
//!
//! Tensors own their data; ordinary assignment moves, copying is an explicit
//! `clone()`. Every public kernel validates bond-dimension agreement through
//! [`connect_dimensions`] before touching the data.

pub mod boundary;
pub mod connector;
pub mod contract;
pub mod flat;
pub mod gauge;
pub mod projector;
pub mod site;
pub mod state;

pub use boundary::{ExpectationBoundary, OverlapBoundary};
pub use connector::connect_dimensions;
pub use contract::{
    apply_effective_hamiltonian, compute_expectation_value_at_site, compute_optimization_matrix,
    contract_expectation_boundaries, contract_sos_left, contract_sos_right, contract_vs_left,
    contract_vs_right,
};
pub use flat::{
    compute_state_vector, compute_state_vector_component,
    compute_state_vector_component_for_observation, compute_state_vector_length,
    extend_state_vector_fragment, StateVectorFragment,
};
pub use gauge::{
    increase_dimension_between, move_site_cursor_left, move_site_cursor_right,
    random_state_site_left, random_state_site_middle, random_state_site_right,
};
pub use projector::{
    compute_overlap_site_trios, compute_projector_vector, compute_state_overlap,
    flatten_state_site, unflatten_state_site, OverlapSiteTrio, ProjectorMatrix,
};
pub use site::{Normalization, OperatorSite, OverlapSite, Side, StateSite};
pub use state::State;
