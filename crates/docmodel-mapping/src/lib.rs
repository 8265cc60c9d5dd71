//! Entity metadata and the dynamic object model for DocModel Rust.
//!
//! This crate is the **mapping subsystem**: it describes how application
//! types relate to collections and how their properties behave, and it
//! provides the runtime object model the session layer manages.
//!
//! # Role In The Architecture
//!
//! - [`EntityMapping`] and [`PropertyMapping`] carry per-type metadata:
//!   collection name, identity generation, property flags and edge targets.
//! - [`MappingRegistry`] resolves types to mappings; an object whose type is
//!   not registered is *unmapped* and rejected by the session.
//! - [`Entity`] is a dynamic, shared-ownership object: a mapping plus a field
//!   map. Object graphs may be cyclic; handles compare by pointer identity.
//! - [`Reference`] is the lazy stand-in for an unloaded entity: either
//!   resolved to a live object or an `(mapping, id)` pair awaiting a load.
//! - The [`serializer`] module converts between entities and their persisted
//!   [`Document`](docmodel_core::Document) form.
//!
//! Sessions run on a single logical executor, so the object model is
//! `Rc`-based and not `Send`.

pub mod entity;
pub mod identity;
pub mod mapping;
pub mod registry;
pub mod reference;
pub mod serializer;

pub use entity::{Entity, FieldValue};
pub use identity::{IdentityGenerator, ObjectIdGenerator, SequentialIdGenerator};
pub use mapping::{EntityMapping, MappingKind, PropertyMapping, PropertyTarget};
pub use reference::Reference;
pub use registry::MappingRegistry;
pub use serializer::{apply_document, read_entity, write_entity};
