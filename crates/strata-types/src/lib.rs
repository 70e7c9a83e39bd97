//! Foundation types for the Strata object store.
//!
//! Strata is the immutable-object storage tier of a ledger node: every piece
//! of ledger state -- ledger headers, account-state nodes, transaction nodes --
//! is stored as an immutable object identified by its 256-bit content hash.
//! This crate provides the types shared by the cache and store crates.
//!
//! # Key Types
//!
//! - [`ObjectHash`] — Content-addressed identifier (BLAKE3, domain-separated
//!   by object type)
//! - [`ObjectType`] — Tag describing what kind of ledger data an object holds
//! - [`NodeObject`] — An immutable (type, hash, payload) triple, the unit of
//!   storage

pub mod error;
pub mod hash;
pub mod object;

pub use error::TypeError;
pub use hash::ObjectHash;
pub use object::{NodeObject, ObjectType};
