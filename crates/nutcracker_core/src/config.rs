//! Chain configuration.

use serde::{Deserialize, Serialize};

/// Rule computing the next bandwidth dimension from the current one.
pub type BandwidthGrowthRule = fn(usize) -> usize;

fn grow_by_one(old: usize) -> usize {
    old + 1
}

fn default_growth_rule() -> BandwidthGrowthRule {
    grow_by_one
}

/// Options fixed at chain construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainOptions {
    /// Cap on matrix-vector products per local eigensolve
    pub maximum_number_of_iterations: usize,
    /// Residual tolerance of the local eigensolve
    pub site_convergence_threshold: f64,
    /// Relative energy tolerance between consecutive sweeps
    pub sweep_convergence_threshold: f64,
    /// Relative energy tolerance across bandwidth growth steps
    pub chain_convergence_threshold: f64,
    /// Tolerance of the post-solve validation checks
    pub sanity_check_threshold: f64,
    /// Maps the current bandwidth dimension to the next one
    #[serde(skip, default = "default_growth_rule")]
    pub bandwidth_growth_rule: BandwidthGrowthRule,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            maximum_number_of_iterations: 10_000,
            site_convergence_threshold: 1e-12,
            sweep_convergence_threshold: 1e-12,
            chain_convergence_threshold: 1e-12,
            sanity_check_threshold: 1e-12,
            bandwidth_growth_rule: grow_by_one,
        }
    }
}

impl ChainOptions {
    /// Creates options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads options from a JSON string.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(Into::into)
    }

    /// Serializes options to a JSON string.
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }
}
