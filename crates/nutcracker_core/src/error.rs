//! Error types for Nutcracker.

use num_complex::Complex64;
use thiserror::Error;

/// Unified error type for Nutcracker operations.
#[derive(Error, Debug)]
pub enum NutError {
    // ============ Validation Errors ============
    /// Two bond endpoints that must agree do not
    #[error("dimension mismatch: {name_a} ({size_a}) != {name_b} ({size_b})")]
    DimensionMismatch {
        name_a: String,
        size_a: usize,
        name_b: String,
        size_b: usize,
    },

    /// Matrix data whose length is not a perfect square
    #[error("matrix data length {0} is not a square")]
    NonSquareMatrix(usize),

    /// A 1-based index below its lower bound
    #[error("the '{name}' index is too low ({index} < 1)")]
    IndexTooLow { name: String, index: i64 },

    /// A 1-based index above the dimension it selects into
    #[error("the '{name}' index is too high ({index} > {dimension})")]
    IndexTooHigh {
        name: String,
        index: usize,
        dimension: usize,
    },

    /// Tensor data of the wrong length for the declared dimensions
    #[error("the length of the data ({length}) does not match the correct length ({correct_length})")]
    WrongDataLength { length: usize, correct_length: usize },

    /// An isometry was requested on a bond larger than the available space
    #[error(
        "not enough degrees of freedom to normalize: {name_a} ({size_a}) > {name_b} ({size_b})"
    )]
    NotEnoughDegreesOfFreedomToNormalize {
        name_a: String,
        size_a: usize,
        name_b: String,
        size_b: usize,
    },

    /// Requested bandwidth exceeds what the physical dimensions support
    #[error("requested bandwidth dimension {requested} is too large; the highest possible with the given physical dimensions is {maximum}")]
    RequestedBandwidthDimensionTooLarge { requested: usize, maximum: usize },

    // ============ Invariant Violations ============
    /// A tensor carried the wrong normalization tag for an operation
    #[error("wrong tensor normalization: expected {expected}, observed {observed}")]
    WrongTensorNormalization { expected: String, observed: String },

    /// An operation was attempted on state that is no longer usable
    #[error("invalid tensor: {0}")]
    InvalidTensor(String),

    // ============ Optimizer Errors ============
    /// Iteration budget exhausted before the residual converged
    #[error("optimizer failed to converge after {0} iterations")]
    OptimizerUnableToConverge(usize),

    /// Converged eigenvalue disagrees with the recomputed expectation value
    #[error("optimizer obtained eigenvalue different from the final expectation value ({eigenvalue} != {expected_value})")]
    OptimizerObtainedEigenvalueDifferentFromExpectationValue {
        eigenvalue: Complex64,
        expected_value: Complex64,
    },

    /// Eigenvalue with a non-negligible imaginary part
    #[error("optimizer obtained complex eigenvalue ({0})")]
    OptimizerObtainedComplexEigenvalue(Complex64),

    /// A local solve raised the energy instead of lowering it
    #[error("optimizer obtained an eigenvalue that was greater than the old eigenvalue ({new} > {old})")]
    OptimizerObtainedGreaterEigenvalue { old: f64, new: f64 },

    /// Converged eigenvector with vanishing norm
    #[error("optimizer obtained vanishing eigenvector (norm = {0})")]
    OptimizerObtainedVanishingEigenvector(f64),

    /// Converged eigenvector leaking into the forbidden subspace
    #[error("optimizer obtained eigenvector overlapping with the forbidden orthogonal space (overlap = {0})")]
    OptimizerObtainedEigenvectorInProjectorSpace(f64),

    /// More orthogonality constraints than local degrees of freedom
    #[error("optimizer was given too many projectors ({projectors} >= {physical}*{left}*{right})")]
    OptimizerGivenTooManyProjectors {
        projectors: usize,
        physical: usize,
        left: usize,
        right: usize,
    },

    /// Starting guess lies entirely within the forbidden subspace
    #[error("optimizer was given a guess within the forbidden orthogonal space")]
    OptimizerGivenGuessInProjectorSpace,

    /// Failure mode without a dedicated variant
    #[error("optimizer failed with an unknown error code: {0}")]
    OptimizerUnknownFailure(i32),

    // ============ Initialization Errors ============
    /// The freshly seeded chain has a complex expectation value
    #[error("the initial chain energy is not real (energy = {0})")]
    InitialChainEnergyNotReal(Complex64),

    // ============ I/O Errors ============
    /// A slash-delimited location missing from a container document
    #[error("no such location: {0}")]
    NoSuchLocation(String),

    /// Refusing to clobber an existing output file
    #[error("output file already exists: {0}")]
    OutputFileAlreadyExists(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse or emit error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for Nutcracker operations.
pub type Result<T> = std::result::Result<T, NutError>;

impl NutError {
    /// Creates a dimension mismatch error between two named bond endpoints.
    pub fn dimension_mismatch(
        name_a: impl Into<String>,
        size_a: usize,
        name_b: impl Into<String>,
        size_b: usize,
    ) -> Self {
        Self::DimensionMismatch {
            name_a: name_a.into(),
            size_a,
            name_b: name_b.into(),
            size_b,
        }
    }

    /// Creates an index-too-low error for the given 1-based index.
    pub fn index_too_low(name: impl Into<String>, index: i64) -> Self {
        Self::IndexTooLow {
            name: name.into(),
            index,
        }
    }

    /// Creates an index-too-high error for the given 1-based index.
    pub fn index_too_high(name: impl Into<String>, index: usize, dimension: usize) -> Self {
        Self::IndexTooHigh {
            name: name.into(),
            index,
            dimension,
        }
    }

    /// Creates an invalid tensor error with the given context.
    pub fn invalid_tensor(msg: impl Into<String>) -> Self {
        Self::InvalidTensor(msg.into())
    }
}
