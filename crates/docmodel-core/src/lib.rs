//! Core types and contracts for DocModel Rust.
//!
//! `docmodel-core` is the **foundation layer** for the workspace. It defines the
//! data types and policy enums that every other crate builds on.
//!
//! # Role In The Architecture
//!
//! - **Data model**: [`Document`] is the JSON-shaped persisted representation of
//!   an entity; [`identity_key`] turns an identifier value into the string key
//!   used by the session's identity table.
//! - **Policy**: [`PropertyFlags`] drives cascade/graph traversal decisions,
//!   [`ChangeTracking`] selects how a persister detects modifications.
//! - **Errors**: one [`Error`] enum shared by the mapping and session layers.
//! - **Structured concurrency**: re-exports `Cx` and `Outcome` from asupersync
//!   so every I/O-capable operation is cancel-correct.
//!
//! # Who Uses This Crate
//!
//! - `docmodel-mapping` builds entity metadata and document readers/writers on
//!   these types.
//! - `docmodel-session` depends on them for unit-of-work flows.
//!
//! Most applications should use the `docmodel` facade; reach for
//! `docmodel-core` directly when implementing persisters or store adapters.

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod document;
pub mod error;
pub mod flags;
pub mod tracking;

pub use document::{Document, ID_FIELD, diff_documents, identity_key};
pub use error::{Error, Result};
pub use flags::PropertyFlags;
pub use tracking::ChangeTracking;
