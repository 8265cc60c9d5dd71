//! The session: a unit of work over a collection-per-type document store.
//!
//! The session tracks every associated entity by identity, moves entities
//! through their lifecycle (new → managed → removed → detached) honoring
//! cascade rules, and flushes scheduled work as one kind-grouped batch.
//!
//! # Design Philosophy
//!
//! - **Explicit over implicit**: nothing is written until `flush`.
//! - **Single logical executor**: the session is single-threaded; user
//!   operations interleave only at I/O suspension points, gated by the task
//!   queue's exclusion lattice.
//! - **Uniform async semantics**: every operation yields to the scheduler
//!   before completing, even on purely synchronous paths, and reports errors
//!   through its `Outcome` rather than panicking.
//! - **Fail-fast after a bad flush**: a failed batch poisons the session
//!   (configurable); later operations return immediately.
//!
//! # Example
//!
//! ```ignore
//! let session = Session::new(registry, provider, executor);
//!
//! // New entities are linked for insert along the save cascade
//! session.save(&cx, &person).await?;
//!
//! // Load by identifier (identity table consulted first)
//! let found = session.find(&cx, "Person", &id).await?;
//!
//! // Schedule deletion, then write everything out as one batch
//! session.remove(&cx, &person).await?;
//! session.flush(&cx).await?;
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use docmodel_core::{
    ChangeTracking, Cx, Document, Error, Outcome, PropertyFlags, Result, identity_key,
};
use docmodel_mapping::{Entity, EntityMapping, FieldValue, MappingRegistry, Reference};

use crate::flush::{BatchExecutor, build_flush_plan, reconcile_links};
use crate::links::{LinkState, ObjectLinks, ScheduledOperation};
use crate::persister::{Persister, PersisterProvider};
use crate::queue::{TaskAction, TaskQueue};
use crate::walker::{GraphWalker, WalkOutcome};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Whether a failed batch execution poisons the session.
    pub poison_on_flush_error: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poison_on_flush_error: true,
        }
    }
}

/// Snapshot of session state for diagnostics.
#[derive(Debug, Clone)]
pub struct SessionDebugInfo {
    /// Entities currently linked.
    pub tracked: usize,
    /// Links scheduled for insert.
    pub pending_inserts: usize,
    /// Links scheduled for delete.
    pub pending_deletes: usize,
    /// Links scheduled for an explicit dirty check.
    pub pending_dirty_checks: usize,
    /// Whether the session is poisoned.
    pub poisoned: bool,
}

// ============================================================================
// Session
// ============================================================================

struct SessionState {
    links: ObjectLinks,
    persisters: HashMap<u32, Rc<dyn Persister>>,
    poison: Option<Error>,
}

/// The unit-of-work session.
pub struct Session {
    registry: Rc<MappingRegistry>,
    provider: Rc<dyn PersisterProvider>,
    executor: Rc<dyn BatchExecutor>,
    queue: TaskQueue,
    state: RefCell<SessionState>,
    config: SessionConfig,
}

impl Session {
    /// Create a session with default configuration.
    #[must_use]
    pub fn new(
        registry: Rc<MappingRegistry>,
        provider: Rc<dyn PersisterProvider>,
        executor: Rc<dyn BatchExecutor>,
    ) -> Self {
        Self::with_config(registry, provider, executor, SessionConfig::default())
    }

    /// Create a session with custom configuration.
    #[must_use]
    pub fn with_config(
        registry: Rc<MappingRegistry>,
        provider: Rc<dyn PersisterProvider>,
        executor: Rc<dyn BatchExecutor>,
        config: SessionConfig,
    ) -> Self {
        Self {
            registry,
            provider,
            executor,
            queue: TaskQueue::new(),
            state: RefCell::new(SessionState {
                links: ObjectLinks::new(),
                persisters: HashMap::new(),
                poison: None,
            }),
            config,
        }
    }

    /// The mapping registry this session resolves types against.
    #[must_use]
    pub fn registry(&self) -> &Rc<MappingRegistry> {
        &self.registry
    }

    /// The session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ========================================================================
    // Lifecycle operations
    // ========================================================================

    /// Schedule `entity` (and everything reachable along save-cascade edges)
    /// for persistence.
    #[tracing::instrument(level = "debug", skip(self, cx, entity))]
    pub async fn save(&self, cx: &Cx, entity: &Entity) -> Outcome<(), Error> {
        let _permit = self.queue.acquire(TaskAction::Save).await;
        if let Some(err) = self.poison_error() {
            return Outcome::Err(err);
        }

        let walk = match self
            .walk_resolving(cx, entity, PropertyFlags::CASCADE_SAVE)
            .await
        {
            Outcome::Ok(walk) => walk,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        tracing::debug!(
            entities = walk.entities.len(),
            embedded = walk.embedded.len(),
            "save cascade computed"
        );

        for target in &walk.entities {
            if let Err(e) = self.apply_save(target) {
                return Outcome::Err(e);
            }
        }
        Outcome::Ok(())
    }

    /// Schedule `entity` (and everything reachable along remove-cascade and
    /// dereference edges) for deletion. Applied leaves-first.
    #[tracing::instrument(level = "debug", skip(self, cx, entity))]
    pub async fn remove(&self, cx: &Cx, entity: &Entity) -> Outcome<(), Error> {
        let _permit = self.queue.acquire(TaskAction::Remove).await;
        if let Some(err) = self.poison_error() {
            return Outcome::Err(err);
        }

        let flags = PropertyFlags::CASCADE_REMOVE | PropertyFlags::DEREFERENCE;
        let walk = match self.walk_resolving(cx, entity, flags).await {
            Outcome::Ok(walk) => walk,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        for target in walk.entities.iter().rev() {
            if let Err(e) = self.apply_remove(target) {
                return Outcome::Err(e);
            }
        }
        Outcome::Ok(())
    }

    /// Unlink `entity` (and everything reachable along detach-cascade edges)
    /// from the session. Identities are preserved.
    #[tracing::instrument(level = "debug", skip(self, cx, entity))]
    pub async fn detach(&self, cx: &Cx, entity: &Entity) -> Outcome<(), Error> {
        let _permit = self.queue.acquire(TaskAction::Detach).await;
        if let Some(err) = self.poison_error() {
            return Outcome::Err(err);
        }

        let walk = match self
            .walk_resolving(cx, entity, PropertyFlags::CASCADE_DETACH)
            .await
        {
            Outcome::Ok(walk) => walk,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        for target in &walk.entities {
            let Some(id) = target.id() else { continue };
            let key = identity_key(&id);
            let linked = {
                let state = self.state.borrow();
                state.links.get_for_entity(target).is_some()
            };
            if linked {
                self.state.borrow_mut().links.unlink(&key);
            }
        }
        Outcome::Ok(())
    }

    /// Reload every managed entity reachable along refresh-cascade edges,
    /// replacing link snapshots; non-managed entities in the set fail the
    /// operation.
    #[tracing::instrument(level = "debug", skip(self, cx, entity))]
    pub async fn refresh(&self, cx: &Cx, entity: &Entity) -> Outcome<(), Error> {
        let _permit = self.queue.acquire(TaskAction::Refresh).await;
        if let Some(err) = self.poison_error() {
            return Outcome::Err(err);
        }

        let walk = match self
            .walk_resolving(cx, entity, PropertyFlags::CASCADE_REFRESH)
            .await
        {
            Outcome::Ok(walk) => walk,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        for target in &walk.entities {
            let key = target.id().map(|id| identity_key(&id)).unwrap_or_default();
            let link = {
                let state = self.state.borrow();
                state.links.get_for_entity(target)
            };
            let Some(link) = link else {
                return Outcome::Err(Error::detached(key));
            };
            let (state, persister) = {
                let inner = link.borrow();
                (inner.state, Rc::clone(&inner.persister))
            };
            if state != LinkState::Managed {
                return Outcome::Err(Error::detached(key));
            }
            let document = match persister.refresh(cx, target).await {
                Outcome::Ok(document) => document,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            };
            link.borrow_mut().original = Some(document);
        }
        Outcome::Ok(())
    }

    /// Discard the entire identity table. Pending writes are lost; no flush
    /// is implied.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn clear(&self, _cx: &Cx) -> Outcome<(), Error> {
        let _permit = self.queue.acquire(TaskAction::Clear).await;
        if let Some(err) = self.poison_error() {
            return Outcome::Err(err);
        }

        let dropped = {
            let mut state = self.state.borrow_mut();
            let dropped = state.links.len();
            state.links.clear();
            dropped
        };
        tracing::debug!(dropped, "session cleared");
        Outcome::Ok(())
    }

    /// Write all scheduled work to the store as one kind-grouped batch and
    /// reconcile link state on success.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn flush(&self, cx: &Cx) -> Outcome<(), Error> {
        let _permit = self.queue.acquire(TaskAction::Flush).await;
        if let Some(err) = self.poison_error() {
            return Outcome::Err(err);
        }

        let start = std::time::Instant::now();
        let links = self.state.borrow().links.snapshot();
        let plan = match build_flush_plan(&links) {
            Ok(plan) => plan,
            Err(e) => return Outcome::Err(e),
        };

        tracing::info!(
            inserts = plan.batch.inserts().len(),
            updates = plan.batch.updates().len(),
            deletes = plan.batch.deletes().len(),
            "flush planned"
        );

        if !plan.batch.is_empty() {
            match self.executor.execute(cx, &plan.batch).await {
                Outcome::Ok(()) => {}
                Outcome::Err(e) => {
                    if self.config.poison_on_flush_error {
                        self.state.borrow_mut().poison = Some(e.clone());
                        tracing::warn!(error = %e, "flush failed; session poisoned");
                    } else {
                        tracing::warn!(error = %e, "flush failed");
                    }
                    return Outcome::Err(e);
                }
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }

        {
            let mut state = self.state.borrow_mut();
            reconcile_links(&mut state.links, plan.reconcile);
        }

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis(),
            "flush complete"
        );
        Outcome::Ok(())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Load one entity of the mapped type `type_name` by identifier.
    ///
    /// The identity table is consulted first (an entity scheduled for
    /// deletion reads as absent). Store hits are linked as managed with their
    /// source document as the snapshot.
    #[tracing::instrument(level = "debug", skip(self, cx, id))]
    pub async fn find(
        &self,
        cx: &Cx,
        type_name: &str,
        id: &Document,
    ) -> Outcome<Option<Entity>, Error> {
        let _permit = self.queue.acquire(TaskAction::Find).await;
        if let Some(err) = self.poison_error() {
            return Outcome::Err(err);
        }

        let (mapping, id) = match self.identify(type_name, id) {
            Ok(pair) => pair,
            Err(e) => return Outcome::Err(e),
        };
        let key = identity_key(&id);

        let managed = {
            let state = self.state.borrow();
            state.links.get(&key).map(|link| {
                let inner = link.borrow();
                (inner.state, inner.object.clone())
            })
        };
        if let Some((state, object)) = managed {
            return Outcome::Ok((state != LinkState::Removed).then_some(object));
        }

        let persister = match self.persister_for(&mapping) {
            Ok(persister) => persister,
            Err(e) => return Outcome::Err(e),
        };
        let loaded = match persister.find_one_by_id(cx, &id).await {
            Outcome::Ok(loaded) => loaded,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let Some(loaded) = loaded else {
            return Outcome::Ok(None);
        };

        if loaded.entity.id().is_none() {
            loaded.entity.set_id(id.clone());
        }
        let link_result = self.state.borrow_mut().links.link(
            &loaded.entity,
            persister,
            ScheduledOperation::None,
            Some(loaded.document),
        );
        if let Err(e) = link_result {
            return Outcome::Err(e);
        }
        tracing::debug!(collection = mapping.collection_name(), %key, "entity loaded and linked");
        Outcome::Ok(Some(loaded.entity))
    }

    /// Resolve `target` to a live entity, then dereference each dotted path
    /// on the result (loading references along the way). An empty path list
    /// leaves the entity untouched.
    #[tracing::instrument(level = "debug", skip(self, cx, target))]
    pub async fn fetch(
        &self,
        cx: &Cx,
        target: &Reference,
        paths: &[&str],
    ) -> Outcome<Entity, Error> {
        let _permit = self.queue.acquire(TaskAction::Fetch).await;
        if let Some(err) = self.poison_error() {
            return Outcome::Err(err);
        }

        let entity = match self.resolve_reference(cx, target).await {
            Outcome::Ok(entity) => entity,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        for path in paths {
            match self.fetch_path(cx, &entity, path).await {
                Outcome::Ok(()) => {}
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        Outcome::Ok(entity)
    }

    /// The managed entity with this identity, or an unresolved reference to
    /// it. Never performs I/O.
    pub fn get_reference(&self, type_name: &str, id: &Document) -> Result<Reference> {
        let (mapping, id) = self.identify(type_name, id)?;
        let key = identity_key(&id);
        let managed = {
            let state = self.state.borrow();
            state.links.get(&key).and_then(|link| {
                let inner = link.borrow();
                (inner.state != LinkState::Removed).then(|| inner.object.clone())
            })
        };
        Ok(match managed {
            Some(object) => Reference::resolved(&object),
            None => Reference::unresolved(&mapping, id),
        })
    }

    /// True when the entity is linked and not scheduled for deletion.
    #[must_use]
    pub fn contains(&self, entity: &Entity) -> bool {
        let state = self.state.borrow();
        state
            .links
            .get_for_entity(entity)
            .is_some_and(|link| link.borrow().state != LinkState::Removed)
    }

    /// The entity's identity, when stamped.
    #[must_use]
    pub fn get_id(&self, entity: &Entity) -> Option<Document> {
        entity.id()
    }

    /// Whether a failed flush has poisoned this session.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.state.borrow().poison.is_some()
    }

    /// Snapshot counters for diagnostics.
    #[must_use]
    pub fn debug_state(&self) -> SessionDebugInfo {
        let state = self.state.borrow();
        let mut info = SessionDebugInfo {
            tracked: state.links.len(),
            pending_inserts: 0,
            pending_deletes: 0,
            pending_dirty_checks: 0,
            poisoned: state.poison.is_some(),
        };
        for link in state.links.snapshot() {
            match link.borrow().scheduled {
                ScheduledOperation::Insert => info.pending_inserts += 1,
                ScheduledOperation::Delete => info.pending_deletes += 1,
                ScheduledOperation::DirtyCheck => info.pending_dirty_checks += 1,
                ScheduledOperation::None | ScheduledOperation::Update => {}
            }
        }
        info
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn poison_error(&self) -> Option<Error> {
        self.state.borrow().poison.as_ref().map(|e| Error::Poisoned {
            message: e.to_string(),
        })
    }

    /// Resolve a mapping and normalize an identifier for it: string inputs
    /// are parsed by the mapping's generator, others must already be valid.
    fn identify(&self, type_name: &str, id: &Document) -> Result<(Rc<EntityMapping>, Document)> {
        let Some(mapping) = self.registry.mapping_for_name(type_name) else {
            return Err(Error::unmapped(type_name));
        };
        let Some(generator) = mapping.identity() else {
            return Err(Error::unmapped(type_name));
        };
        let id = match id {
            Document::String(raw) => generator.from_string(raw)?,
            other => {
                if !generator.is_identifier(other) {
                    return Err(Error::InvalidIdentifier {
                        value: other.to_string(),
                    });
                }
                other.clone()
            }
        };
        Ok((mapping, id))
    }

    fn persister_for(&self, mapping: &Rc<EntityMapping>) -> Result<Rc<dyn Persister>> {
        {
            let state = self.state.borrow();
            if let Some(persister) = state.persisters.get(&mapping.id()) {
                return Ok(Rc::clone(persister));
            }
        }
        let Some(persister) = self.provider.persister_for(mapping) else {
            return Err(Error::unmapped(mapping.name()));
        };
        self.state
            .borrow_mut()
            .persisters
            .insert(mapping.id(), Rc::clone(&persister));
        Ok(persister)
    }

    /// Walk from `root`, resolving unresolved references between passes so
    /// traversal continues through their targets.
    async fn walk_resolving(
        &self,
        cx: &Cx,
        root: &Entity,
        flags: PropertyFlags,
    ) -> Outcome<WalkOutcome, Error> {
        loop {
            let outcome = GraphWalker::new(flags).walk(root);
            if outcome.references.is_empty() {
                return Outcome::Ok(outcome);
            }
            for reference in &outcome.references {
                match self.resolve_reference(cx, reference).await {
                    Outcome::Ok(_) => {}
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                }
            }
        }
    }

    /// Resolve a reference: already-resolved → its target; identity-table hit
    /// → the managed entity; otherwise load through the persister and link.
    async fn resolve_reference(&self, cx: &Cx, reference: &Reference) -> Outcome<Entity, Error> {
        if let Some(entity) = reference.entity() {
            return Outcome::Ok(entity);
        }

        let mapping = reference.mapping();
        let id = reference.id();
        let key = identity_key(&id);

        let managed = {
            let state = self.state.borrow();
            state.links.get(&key).map(|link| {
                let inner = link.borrow();
                (inner.state, inner.object.clone())
            })
        };
        if let Some((state, object)) = managed {
            if state == LinkState::Removed {
                return Outcome::Err(Error::ReferenceResolution {
                    type_name: mapping.name().to_string(),
                    key,
                });
            }
            reference.resolve_with(&object);
            return Outcome::Ok(object);
        }

        let persister = match self.persister_for(&mapping) {
            Ok(persister) => persister,
            Err(e) => return Outcome::Err(e),
        };
        let loaded = match persister.find_one_by_id(cx, &id).await {
            Outcome::Ok(loaded) => loaded,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let Some(loaded) = loaded else {
            return Outcome::Err(Error::ReferenceResolution {
                type_name: mapping.name().to_string(),
                key,
            });
        };

        if loaded.entity.id().is_none() {
            loaded.entity.set_id(id.clone());
        }
        let link_result = self.state.borrow_mut().links.link(
            &loaded.entity,
            persister,
            ScheduledOperation::None,
            Some(loaded.document),
        );
        if let Err(e) = link_result {
            return Outcome::Err(e);
        }
        reference.resolve_with(&loaded.entity);
        tracing::debug!(type_name = mapping.name(), %key, "reference resolved");
        Outcome::Ok(loaded.entity)
    }

    /// Apply the save transition to one reached entity.
    fn apply_save(&self, entity: &Entity) -> Result<()> {
        let link = {
            let state = self.state.borrow();
            state.links.get_for_entity(entity)
        };
        if let Some(link) = link {
            let mut inner = link.borrow_mut();
            match inner.state {
                LinkState::Removed => {
                    // Cancel the pending delete.
                    inner.state = LinkState::Managed;
                    inner.scheduled = ScheduledOperation::None;
                }
                LinkState::Managed => {
                    if inner.scheduled == ScheduledOperation::None
                        && inner.persister.change_tracking() == ChangeTracking::DeferredExplicit
                    {
                        inner.scheduled = ScheduledOperation::DirtyCheck;
                    }
                }
                LinkState::Detached => {
                    return Err(Error::detached(
                        entity.id().map(|id| identity_key(&id)).unwrap_or_default(),
                    ));
                }
            }
            return Ok(());
        }

        if let Some(id) = entity.id() {
            return Err(Error::detached(identity_key(&id)));
        }

        let Some(mapping) = self.registry.mapping_for_object(entity) else {
            return Err(Error::unmapped(entity.type_name()));
        };
        let persister = self.persister_for(&mapping)?;
        entity.set_id(persister.identity().generate());
        self.state.borrow_mut().links.link(
            entity,
            persister,
            ScheduledOperation::Insert,
            None,
        )?;
        tracing::debug!(type_name = %entity.type_name(), "new entity linked for insert");
        Ok(())
    }

    /// Apply the remove transition to one reached entity.
    fn apply_remove(&self, entity: &Entity) -> Result<()> {
        let link = {
            let state = self.state.borrow();
            state.links.get_for_entity(entity)
        };
        if let Some(link) = link {
            let (state, scheduled) = {
                let inner = link.borrow();
                (inner.state, inner.scheduled)
            };
            match (state, scheduled) {
                (LinkState::Managed, ScheduledOperation::Insert) => {
                    // Never persisted: no delete needed, identity is cleared.
                    let key = entity.id().map(|id| identity_key(&id)).unwrap_or_default();
                    self.state.borrow_mut().links.unlink(&key);
                }
                (LinkState::Managed, _) => {
                    let mut inner = link.borrow_mut();
                    inner.state = LinkState::Removed;
                    inner.scheduled = ScheduledOperation::Delete;
                }
                (LinkState::Removed, _) => {}
                (LinkState::Detached, _) => {
                    return Err(Error::detached(
                        entity.id().map(|id| identity_key(&id)).unwrap_or_default(),
                    ));
                }
            }
            return Ok(());
        }

        if let Some(id) = entity.id() {
            return Err(Error::detached(identity_key(&id)));
        }
        Ok(())
    }

    /// Dereference one dotted path from `root`, resolving references at each
    /// step. Arrays fan out; scalar leaves end the traversal.
    async fn fetch_path(&self, cx: &Cx, root: &Entity, path: &str) -> Outcome<(), Error> {
        let mut frontier = vec![root.clone()];
        for segment in path.split('.') {
            let mut next = Vec::new();
            for entity in &frontier {
                let Some(value) = entity.get(segment) else {
                    continue;
                };
                match self.collect_targets(cx, value, &mut next).await {
                    Outcome::Ok(()) => {}
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                }
            }
            frontier = next;
            if frontier.is_empty() {
                break;
            }
        }
        Outcome::Ok(())
    }

    /// Collect the entities a field value leads to, resolving references.
    async fn collect_targets(
        &self,
        cx: &Cx,
        value: FieldValue,
        out: &mut Vec<Entity>,
    ) -> Outcome<(), Error> {
        let mut stack = vec![value];
        while let Some(value) = stack.pop() {
            match value {
                FieldValue::Entity(entity) => out.push(entity),
                FieldValue::Reference(reference) => {
                    match self.resolve_reference(cx, &reference).await {
                        Outcome::Ok(entity) => out.push(entity),
                        Outcome::Err(e) => return Outcome::Err(e),
                        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                        Outcome::Panicked(p) => return Outcome::Panicked(p),
                    }
                }
                FieldValue::Array(items) => stack.extend(items),
                FieldValue::Value(_) => {}
            }
        }
        Outcome::Ok(())
    }
}
