//! Session re-exports.
//!
//! `docmodel::Session` is the unit-of-work session: identity map, lifecycle
//! state machine, cascade walking and batched flush.
//!
//! The implementation lives in the separate `docmodel-session` crate. This
//! module exists so the `docmodel` facade can expose the session without
//! forcing users to depend on sub-crates directly.

pub use docmodel_session::{
    Batch, BatchExecutor, LinkState, ObjectLink, ObjectLinks, ScheduledOperation, Session,
    SessionConfig, SessionDebugInfo, TaskAction, TaskQueue,
};
