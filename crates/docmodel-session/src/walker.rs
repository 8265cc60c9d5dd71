//! Cascade graph traversal.
//!
//! Given a root entity and a set of cascade flags, the walker produces the
//! ordered set of objects an operation applies to: entities (with identity),
//! embedded values (without), and any unresolved references encountered on
//! the way. Traversal is breadth-first, so parents precede their children and
//! `remove` can apply in reverse to reach leaves first. Cycles break on a
//! pointer-identity visited set.
//!
//! The walker itself performs no I/O: unresolved references are reported to
//! the caller, which loads them and walks again so traversal continues
//! through the freshly resolved targets.

use std::collections::{HashSet, VecDeque};

use docmodel_core::PropertyFlags;
use docmodel_mapping::{Entity, FieldValue, Reference};

/// The objects reached by one walk.
pub struct WalkOutcome {
    /// Reached entities, parents before children.
    pub entities: Vec<Entity>,
    /// Reached embedded values.
    pub embedded: Vec<Entity>,
    /// Unresolved references encountered on followed edges.
    pub references: Vec<Reference>,
}

/// Walks an entity graph along edges whose flags intersect a cascade set.
pub struct GraphWalker {
    flags: PropertyFlags,
    visited: HashSet<usize>,
    seen_references: HashSet<usize>,
    entities: Vec<Entity>,
    embedded: Vec<Entity>,
    references: Vec<Reference>,
}

impl GraphWalker {
    /// Create a walker following edges that intersect `flags`.
    #[must_use]
    pub fn new(flags: PropertyFlags) -> Self {
        Self {
            flags,
            visited: HashSet::new(),
            seen_references: HashSet::new(),
            entities: Vec::new(),
            embedded: Vec::new(),
            references: Vec::new(),
        }
    }

    /// Traverse from `root` and collect everything reachable.
    #[must_use]
    pub fn walk(mut self, root: &Entity) -> WalkOutcome {
        let mut queue = VecDeque::new();
        self.visited.insert(root.addr());
        queue.push_back(root.clone());

        while let Some(entity) = queue.pop_front() {
            let mapping = entity.mapping();
            if mapping.is_entity() {
                self.entities.push(entity.clone());
            } else {
                self.embedded.push(entity.clone());
            }

            for property in mapping.properties() {
                if property.flags.contains(PropertyFlags::IGNORED) {
                    continue;
                }
                if !property.flags.intersects(self.flags) {
                    continue;
                }
                if let Some(value) = entity.get(&property.name) {
                    self.follow(&value, &mut queue);
                }
            }
        }

        WalkOutcome {
            entities: self.entities,
            embedded: self.embedded,
            references: self.references,
        }
    }

    fn follow(&mut self, value: &FieldValue, queue: &mut VecDeque<Entity>) {
        match value {
            FieldValue::Entity(entity) => {
                if self.visited.insert(entity.addr()) {
                    queue.push_back(entity.clone());
                }
            }
            FieldValue::Reference(reference) => {
                if let Some(entity) = reference.entity() {
                    if self.visited.insert(entity.addr()) {
                        queue.push_back(entity);
                    }
                } else if self.seen_references.insert(reference.addr()) {
                    self.references.push(reference.clone());
                }
            }
            FieldValue::Array(items) => {
                for item in items {
                    self.follow(item, queue);
                }
            }
            FieldValue::Value(_) => {}
        }
    }
}
