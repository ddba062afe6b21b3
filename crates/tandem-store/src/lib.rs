//! # tandem-store
//!
//! Persistence layer for the partnership matching engine, backed by SQLite.
//!
//! The crate exposes a [`Database`] handle that wraps a
//! `rusqlite::Connection`, guarantees migrations run before any other
//! operation, and provides [`Database::transaction`] -- the serializable,
//! conflict-retrying unit of work every invariant-bearing mutation goes
//! through.
//!
//! Typed CRUD helpers are free functions over `&rusqlite::Connection` so the
//! same helpers compose both standalone (via [`Database::conn`]) and inside
//! a transaction closure (`Transaction` derefs to `Connection`). No business
//! rules live here; the workflow engine owns those.

pub mod applications;
pub mod database;
pub mod migrations;
pub mod models;
pub mod projects;
pub mod requests;
pub mod students;
pub mod supervisors;

mod convert;
mod error;

pub use database::{Database, TxError};
pub use error::{Result, StoreError};
pub use models::*;
