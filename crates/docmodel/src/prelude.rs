//! Convenience re-exports for applications.
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```

pub use docmodel_core::{
    ChangeTracking, Cx, Document, Error, Outcome, PropertyFlags, Result,
};
pub use docmodel_mapping::{
    Entity, EntityMapping, FieldValue, IdentityGenerator, MappingRegistry, PropertyMapping,
    Reference,
};
pub use docmodel_session::{
    Batch, BatchExecutor, Loaded, Persister, PersisterProvider, Session, SessionConfig,
};
