//! # tandem-shared
//!
//! Domain vocabulary shared by every Tandem crate: identifier and enum
//! types for partnership matching, the caller identity handed over by the
//! surrounding application, and workspace-wide constants.
//!
//! Every enum round-trips through a stable lowercase string so the store
//! can persist it as TEXT and route handlers can accept it in JSON.

pub mod constants;
pub mod types;

mod error;

pub use error::ParseEnumError;
pub use types::*;
