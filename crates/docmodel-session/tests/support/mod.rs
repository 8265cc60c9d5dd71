//! In-memory store, persister and executor used by the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use docmodel_core::{
    ChangeTracking, Cx, Document, Error, ID_FIELD, Outcome, PropertyFlags, diff_documents,
    identity_key,
};
use docmodel_mapping::{
    Entity, EntityMapping, IdentityGenerator, MappingRegistry, PropertyMapping,
    SequentialIdGenerator, apply_document, read_entity, write_entity,
};
use docmodel_session::{
    Batch, BatchExecutor, Loaded, PersistFuture, Persister, PersisterProvider, Session,
    SessionConfig,
};

/// Counts of one executed batch: (inserts, updates, deletes).
pub type ExecutedBatch = (usize, usize, usize);

/// A collection-per-type store held in memory.
#[derive(Default)]
pub struct MemoryStore {
    collections: RefCell<HashMap<String, BTreeMap<String, Document>>>,
    pub find_calls: Cell<usize>,
    pub executions: RefCell<Vec<ExecutedBatch>>,
    pub fail_next_execute: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn seed(&self, collection: &str, doc: Document) {
        let key = doc
            .get(ID_FIELD)
            .map(identity_key)
            .expect("seeded document needs an _id");
        self.collections
            .borrow_mut()
            .entry(collection.to_string())
            .or_default()
            .insert(key, doc);
    }

    pub fn get(&self, collection: &str, key: &str) -> Option<Document> {
        self.collections
            .borrow()
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned()
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .borrow()
            .get(collection)
            .map_or(0, BTreeMap::len)
    }
}

/// Persister over [`MemoryStore`] using the mapping layer's readers/writers.
pub struct MemoryPersister {
    mapping: Rc<EntityMapping>,
    registry: Rc<MappingRegistry>,
    store: Rc<MemoryStore>,
    tracking: ChangeTracking,
    identity: Rc<dyn IdentityGenerator>,
}

impl Persister for MemoryPersister {
    fn change_tracking(&self) -> ChangeTracking {
        self.tracking
    }

    fn identity(&self) -> Rc<dyn IdentityGenerator> {
        Rc::clone(&self.identity)
    }

    fn find_one_by_id<'a>(
        &'a self,
        _cx: &'a Cx,
        id: &'a Document,
    ) -> PersistFuture<'a, Option<Loaded>> {
        Box::pin(async move {
            self.store.find_calls.set(self.store.find_calls.get() + 1);
            let key = identity_key(id);
            let Some(document) = self.store.get(self.mapping.collection_name(), &key) else {
                return Outcome::Ok(None);
            };
            match read_entity(&self.registry, &self.mapping, &document) {
                Ok(entity) => Outcome::Ok(Some(Loaded { entity, document })),
                Err(e) => Outcome::Err(e),
            }
        })
    }

    fn refresh<'a>(&'a self, _cx: &'a Cx, entity: &'a Entity) -> PersistFuture<'a, Document> {
        Box::pin(async move {
            let Some(id) = entity.id() else {
                return Outcome::Err(Error::persister("cannot refresh an entity without identity"));
            };
            let key = identity_key(&id);
            let Some(document) = self.store.get(self.mapping.collection_name(), &key) else {
                return Outcome::Err(Error::persister(format!(
                    "document '{key}' no longer exists"
                )));
            };
            if let Err(e) = apply_document(&self.registry, entity, &document) {
                return Outcome::Err(e);
            }
            Outcome::Ok(document)
        })
    }

    fn dirty_check(
        &self,
        batch: &mut Batch,
        entity: &Entity,
        original: &Document,
    ) -> Result<Document, Error> {
        let current = write_entity(entity)?;
        if let Some(changes) = diff_documents(original, &current) {
            let id = entity.id().unwrap_or(Document::Null);
            batch.push_update(self.mapping.collection_name(), id, changes);
        }
        Ok(current)
    }

    fn insert(&self, batch: &mut Batch, entity: &Entity) -> Result<Document, Error> {
        let document = write_entity(entity)?;
        batch.push_insert(self.mapping.collection_name(), document.clone());
        Ok(document)
    }

    fn remove(&self, batch: &mut Batch, entity: &Entity) -> Result<(), Error> {
        let id = entity
            .id()
            .ok_or_else(|| Error::persister("cannot delete an entity without identity"))?;
        batch.push_delete(self.mapping.collection_name(), id);
        Ok(())
    }
}

/// Provider building one [`MemoryPersister`] per entity mapping.
pub struct MemoryProvider {
    registry: Rc<MappingRegistry>,
    store: Rc<MemoryStore>,
    tracking: ChangeTracking,
}

impl PersisterProvider for MemoryProvider {
    fn persister_for(&self, mapping: &Rc<EntityMapping>) -> Option<Rc<dyn Persister>> {
        if !mapping.is_entity() {
            return None;
        }
        let identity = mapping.identity()?;
        Some(Rc::new(MemoryPersister {
            mapping: Rc::clone(mapping),
            registry: Rc::clone(&self.registry),
            store: Rc::clone(&self.store),
            tracking: self.tracking,
            identity,
        }))
    }
}

/// Executor applying batches to the store, with optional injected failure.
pub struct MemoryExecutor {
    store: Rc<MemoryStore>,
}

impl BatchExecutor for MemoryExecutor {
    fn execute<'a>(
        &'a self,
        _cx: &'a Cx,
        batch: &'a Batch,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Outcome<(), Error>> + 'a>> {
        Box::pin(async move {
            if self.store.fail_next_execute.replace(false) {
                return Outcome::Err(Error::batch("injected executor failure"));
            }

            let mut collections = self.store.collections.borrow_mut();
            for op in batch.inserts() {
                let Some(id) = op.document.get(ID_FIELD) else {
                    return Outcome::Err(Error::batch("insert without _id"));
                };
                collections
                    .entry(op.collection.clone())
                    .or_default()
                    .insert(identity_key(id), op.document.clone());
            }
            for op in batch.updates() {
                let key = identity_key(&op.id);
                let Some(doc) = collections
                    .get_mut(&op.collection)
                    .and_then(|docs| docs.get_mut(&key))
                else {
                    return Outcome::Err(Error::batch(format!("update of missing '{key}'")));
                };
                if let (Some(target), Some(changes)) = (doc.as_object_mut(), op.changes.as_object())
                {
                    for (name, value) in changes {
                        if value.is_null() {
                            target.remove(name);
                        } else {
                            target.insert(name.clone(), value.clone());
                        }
                    }
                }
            }
            for op in batch.deletes() {
                let key = identity_key(&op.id);
                if let Some(docs) = collections.get_mut(&op.collection) {
                    docs.remove(&key);
                }
            }
            drop(collections);

            self.store.executions.borrow_mut().push((
                batch.inserts().len(),
                batch.updates().len(),
                batch.deletes().len(),
            ));
            Outcome::Ok(())
        })
    }
}

/// Everything a test needs to drive a session against the in-memory store.
pub struct Harness {
    pub registry: Rc<MappingRegistry>,
    pub store: Rc<MemoryStore>,
    provider: Rc<MemoryProvider>,
    executor: Rc<MemoryExecutor>,
}

impl Harness {
    pub fn session(&self) -> Session {
        Session::new(
            Rc::clone(&self.registry),
            Rc::clone(&self.provider) as Rc<dyn PersisterProvider>,
            Rc::clone(&self.executor) as Rc<dyn BatchExecutor>,
        )
    }

    pub fn session_with_config(&self, config: SessionConfig) -> Session {
        Session::with_config(
            Rc::clone(&self.registry),
            Rc::clone(&self.provider) as Rc<dyn PersisterProvider>,
            Rc::clone(&self.executor) as Rc<dyn BatchExecutor>,
            config,
        )
    }

    pub fn person(&self, first: &str, last: &str) -> Entity {
        let mapping = self.registry.mapping_for_name("Person").expect("mapped");
        let person = Entity::new(&mapping);
        person.set("first", first);
        person.set("last", last);
        person
    }
}

/// People reference each other (`partner`, `children`) and embed an address;
/// identifiers are sequential integers starting at 100.
pub fn harness() -> Harness {
    harness_with_tracking(ChangeTracking::DeferredExplicit)
}

pub fn harness_with_tracking(tracking: ChangeTracking) -> Harness {
    let mut registry = MappingRegistry::new();
    registry
        .register(
            EntityMapping::entity(1, "Person")
                .collection("people")
                .identity_generator(SequentialIdGenerator::starting_at(100))
                .property(PropertyMapping::new("first"))
                .property(PropertyMapping::new("last"))
                .property(
                    PropertyMapping::new("partner")
                        .flags(PropertyFlags::CASCADE_ALL)
                        .references("Person"),
                )
                .property(
                    PropertyMapping::new("children")
                        .flags(PropertyFlags::CASCADE_SAVE | PropertyFlags::CASCADE_REMOVE)
                        .references("Person"),
                )
                .property(
                    PropertyMapping::new("address")
                        .flags(PropertyFlags::CASCADE_SAVE)
                        .embeds("Address"),
                ),
        )
        .expect("register Person");
    registry
        .register(EntityMapping::embedded(2, "Address").property(PropertyMapping::new("city")))
        .expect("register Address");

    let registry = Rc::new(registry);
    let store = MemoryStore::new();
    let provider = Rc::new(MemoryProvider {
        registry: Rc::clone(&registry),
        store: Rc::clone(&store),
        tracking,
    });
    let executor = Rc::new(MemoryExecutor {
        store: Rc::clone(&store),
    });

    Harness {
        registry,
        store,
        provider,
        executor,
    }
}

/// Unwrap an `Outcome`, panicking on anything but `Ok`.
pub fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(value) => value,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

/// Unwrap the error of an `Outcome`, panicking on anything but `Err`.
pub fn unwrap_err<T>(outcome: Outcome<T, Error>) -> Error {
    match outcome {
        Outcome::Ok(_) => panic!("expected an error"),
        Outcome::Err(e) => e,
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}
