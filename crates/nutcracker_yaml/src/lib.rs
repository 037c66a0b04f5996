//! # Nutcracker YAML
//!
//! The persistent operator format: a deliberately simple YAML layout with a
//! `sequence` of 1-based site-type indices and a `sites` array of operator
//! site maps. Complex numbers are written as `[re, im]`, or as a plain
//! scalar when the imaginary part vanishes.
//!
//! ```yaml
//! sequence: [1, 2, 2, 3]
//! sites:
//!   - physical dimension: 2
//!     left dimension: 1
//!     right dimension: 3
//!     matrices:
//!       - from: 1
//!         to: 1
//!         data: [0, 1, 1, 0]
//! ```

pub mod complex;
pub mod document;
pub mod io;

pub use complex::YamlComplex;
pub use document::{MatrixDocument, OperatorDocument, OperatorSiteDocument};
pub use io::{
    insert_at_location, lookup_location, read_operator_from_file, read_operator_from_str,
    write_operator_to_file, write_operator_to_string,
};
