//! DocModel Rust: document databases with a unit-of-work session.
//!
//! `docmodel` is the facade crate. It re-exports the public surface of the
//! workspace so applications depend on one crate:
//!
//! - `docmodel-core`: documents, property flags, change tracking, errors.
//! - `docmodel-mapping`: entity metadata, identity generation, the dynamic
//!   object model, references and document hydration.
//! - `docmodel-session`: the session itself: identity table, task queue,
//!   cascade walker, flush planner.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::prelude::*;
//!
//! let session = Session::new(registry, provider, executor);
//!
//! let person = Entity::new(&mapping);
//! person.set("first", "Bob");
//! person.set("last", "Jones");
//!
//! session.save(&cx, &person).await?;
//! session.flush(&cx).await?;
//!
//! let reloaded = session.find(&cx, "Person", &session.get_id(&person).unwrap()).await?;
//! ```

pub mod prelude;
pub mod session;

pub use docmodel_core::{
    ChangeTracking, Cx, Document, Error, ID_FIELD, Outcome, PropertyFlags, Result,
    diff_documents, identity_key,
};
pub use docmodel_mapping::{
    Entity, EntityMapping, FieldValue, IdentityGenerator, MappingKind, MappingRegistry,
    ObjectIdGenerator, PropertyMapping, PropertyTarget, Reference, SequentialIdGenerator,
    apply_document, read_entity, write_entity,
};
pub use docmodel_session::{
    Batch, BatchExecutor, DeleteOp, InsertOp, Loaded, Persister, PersisterProvider, Session,
    SessionConfig, SessionDebugInfo, TaskAction, UpdateOp,
};
