//! # tandem-engine
//!
//! The partnership matching workflow engine: transactional create / respond /
//! cancel over partnership requests, plus the capacity coordinator that keeps
//! a project's co-supervisor slot and that supervisor's capacity counter
//! consistent.
//!
//! Route handlers stay thin: they hand the engine a validated pair of
//! identifiers and get back a typed result. Everything that must hold under
//! concurrent racing requests happens inside a single store transaction that
//! re-reads authoritative state before mutating it; losers of a race observe
//! a changed precondition and get a typed conflict error instead of
//! corrupting an invariant.

pub mod capacity;
pub mod workflow;

mod error;

pub use error::{EngineError, ErrorClass, Result};
pub use workflow::PartnershipEngine;
