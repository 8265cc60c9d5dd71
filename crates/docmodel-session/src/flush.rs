//! Flush planning: materializing scheduled work into one kind-grouped batch.
//!
//! The planner makes three passes over a stable snapshot of the identity
//! table (dirty checks, then inserts, then deletes), so the batch never
//! interleaves kinds: updates precede inserts, and inserts never follow a
//! delete for the same identity. Nothing on any link is mutated while the
//! batch is assembled or executed; reconciliation applies only after the
//! executor reports success.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use docmodel_core::{ChangeTracking, Cx, Document, Error, Outcome, Result, identity_key};

use crate::links::{LinkHandle, LinkState, ObjectLinks, ScheduledOperation};

/// An insert staged for bulk submission.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOp {
    /// Target collection.
    pub collection: String,
    /// The full document to insert.
    pub document: Document,
}

/// An update staged for bulk submission.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOp {
    /// Target collection.
    pub collection: String,
    /// Identifier of the document to update.
    pub id: Document,
    /// Changed fields (with null tombstones for removals).
    pub changes: Document,
}

/// A delete staged for bulk submission.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOp {
    /// Target collection.
    pub collection: String,
    /// Identifier of the document to delete.
    pub id: Document,
}

/// One bulk submission, grouped by operation kind.
#[derive(Debug, Default)]
pub struct Batch {
    inserts: Vec<InsertOp>,
    updates: Vec<UpdateOp>,
    deletes: Vec<DeleteOp>,
}

impl Batch {
    /// Create an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an insert.
    pub fn push_insert(&mut self, collection: impl Into<String>, document: Document) {
        self.inserts.push(InsertOp {
            collection: collection.into(),
            document,
        });
    }

    /// Stage an update.
    pub fn push_update(&mut self, collection: impl Into<String>, id: Document, changes: Document) {
        self.updates.push(UpdateOp {
            collection: collection.into(),
            id,
            changes,
        });
    }

    /// Stage a delete.
    pub fn push_delete(&mut self, collection: impl Into<String>, id: Document) {
        self.deletes.push(DeleteOp {
            collection: collection.into(),
            id,
        });
    }

    /// Staged inserts.
    #[must_use]
    pub fn inserts(&self) -> &[InsertOp] {
        &self.inserts
    }

    /// Staged updates.
    #[must_use]
    pub fn updates(&self) -> &[UpdateOp] {
        &self.updates
    }

    /// Staged deletes.
    #[must_use]
    pub fn deletes(&self) -> &[DeleteOp] {
        &self.deletes
    }

    /// Total number of staged operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inserts.len() + self.updates.len() + self.deletes.len()
    }

    /// True when nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Executes one batch against the store as a single bulk submission.
pub trait BatchExecutor {
    /// Submit the batch.
    fn execute<'a>(
        &'a self,
        cx: &'a Cx,
        batch: &'a Batch,
    ) -> Pin<Box<dyn Future<Output = Outcome<(), Error>> + 'a>>;
}

/// A state change staged during planning and applied after the batch
/// succeeds.
pub(crate) enum Reconcile {
    /// Store the new snapshot and reset the scheduled operation.
    Commit {
        link: LinkHandle,
        snapshot: Document,
    },
    /// Drop the link from the table (deletes); unlinking clears the identity.
    Unlink { key: String },
}

/// The batch plus the deferred link updates it implies.
pub(crate) struct FlushPlan {
    pub(crate) batch: Batch,
    pub(crate) reconcile: Vec<Reconcile>,
}

/// Run the three planning passes over a stable link snapshot.
pub(crate) fn build_flush_plan(links: &[LinkHandle]) -> Result<FlushPlan> {
    let mut batch = Batch::new();
    let mut reconcile = Vec::new();

    // Pass 1: dirty checks. Explicit DirtyCheck schedules plus implicitly
    // tracked managed links with nothing scheduled.
    for link in links {
        let (state, scheduled, tracking) = {
            let inner = link.borrow();
            (inner.state, inner.scheduled, inner.persister.change_tracking())
        };
        let due = scheduled == ScheduledOperation::DirtyCheck
            || (state == LinkState::Managed
                && scheduled == ScheduledOperation::None
                && tracking == ChangeTracking::DeferredImplicit);
        if !due {
            continue;
        }
        let (entity, original, persister) = {
            let inner = link.borrow();
            (
                inner.object.clone(),
                inner.original.clone(),
                Rc::clone(&inner.persister),
            )
        };
        let Some(original) = original else {
            continue;
        };
        let snapshot = persister.dirty_check(&mut batch, &entity, &original)?;
        reconcile.push(Reconcile::Commit {
            link: Rc::clone(link),
            snapshot,
        });
    }

    // Pass 2: inserts.
    for link in links {
        let due = link.borrow().scheduled == ScheduledOperation::Insert;
        if !due {
            continue;
        }
        let (entity, persister) = {
            let inner = link.borrow();
            (inner.object.clone(), Rc::clone(&inner.persister))
        };
        let snapshot = persister.insert(&mut batch, &entity)?;
        reconcile.push(Reconcile::Commit {
            link: Rc::clone(link),
            snapshot,
        });
    }

    // Pass 3: deletes.
    for link in links {
        let due = link.borrow().scheduled == ScheduledOperation::Delete;
        if !due {
            continue;
        }
        let (entity, persister) = {
            let inner = link.borrow();
            (inner.object.clone(), Rc::clone(&inner.persister))
        };
        persister.remove(&mut batch, &entity)?;
        let key = entity.id().map(|id| identity_key(&id)).unwrap_or_default();
        reconcile.push(Reconcile::Unlink { key });
    }

    Ok(FlushPlan { batch, reconcile })
}

/// Apply the staged link updates after a successful batch execution.
pub(crate) fn reconcile_links(links: &mut ObjectLinks, staged: Vec<Reconcile>) {
    for change in staged {
        match change {
            Reconcile::Commit { link, snapshot } => {
                let mut inner = link.borrow_mut();
                inner.original = Some(snapshot);
                inner.scheduled = ScheduledOperation::None;
            }
            Reconcile::Unlink { key } => {
                links.unlink(&key);
            }
        }
    }
}
