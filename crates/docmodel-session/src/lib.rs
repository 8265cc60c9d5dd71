//! Unit-of-work session for DocModel Rust.
//!
//! The session mediates between in-memory entity graphs and a
//! collection-per-type document store. It is built from five pieces:
//!
//! - [`links`]: the identity table, one [`ObjectLink`] per associated
//!   entity, holding lifecycle state, the scheduled write, the live object,
//!   the persisted snapshot, and the bound persister.
//! - [`queue`]: the task queue, a FIFO with per-action exclusion masks that
//!   serializes user-facing operations and keeps conflicting ones from
//!   overlapping.
//! - [`walker`]: cascade traversal over entity graphs, collecting entities,
//!   embedded values and unresolved references.
//! - [`flush`]: the planner that materializes scheduled work into one
//!   kind-grouped [`Batch`] and reconciles link state after execution.
//! - [`session`]: the [`Session`] itself, driving all of the above through
//!   the [`Persister`] / [`BatchExecutor`] seams a store driver implements.
//!
//! Sessions are single-threaded: one logical executor owns all state, and
//! operations interleave only at I/O suspension points.

pub mod flush;
pub mod links;
pub mod persister;
pub mod queue;
pub mod session;
pub mod walker;

pub use flush::{Batch, BatchExecutor, DeleteOp, InsertOp, UpdateOp};
pub use links::{LinkHandle, LinkState, ObjectLink, ObjectLinks, ScheduledOperation};
pub use persister::{Loaded, PersistFuture, Persister, PersisterProvider};
pub use queue::{Acquire, ActionMask, TaskAction, TaskPermit, TaskQueue};
pub use session::{Session, SessionConfig, SessionDebugInfo};
pub use walker::{GraphWalker, WalkOutcome};
