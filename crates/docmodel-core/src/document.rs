//! Documents: the persisted representation of entities.
//!
//! A collection-per-type store speaks JSON-shaped documents. This module fixes
//! the document type used across the workspace and provides the two low-level
//! helpers the session layer is built on: identity-key stringification and
//! shallow document diffing for deferred dirty checks.

use serde_json::Value;

/// The persisted representation of an entity, and the type of identifier
/// values (identifiers are scalar documents: strings or numbers).
pub type Document = Value;

/// The well-known attribute carrying an entity's identity, both on live
/// entities and in persisted documents.
pub const ID_FIELD: &str = "_id";

/// Stringify an identifier value into an identity-table key.
///
/// String identifiers are used verbatim; anything else uses its canonical
/// JSON rendering, so `7` and `"7"` produce distinct keys.
#[must_use]
pub fn identity_key(id: &Document) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Shallow field-wise diff of two documents.
///
/// Returns the fields of `current` that differ from `original`, plus a `null`
/// tombstone for each field of `original` that `current` no longer carries.
/// The identity field is never part of a diff. Returns `None` when nothing
/// changed.
///
/// Non-object documents are compared wholesale: a change yields `current`
/// itself.
#[must_use]
pub fn diff_documents(original: &Document, current: &Document) -> Option<Document> {
    let (Some(original), Some(current)) = (original.as_object(), current.as_object()) else {
        return (original != current).then(|| current.clone());
    };

    let mut changes = serde_json::Map::new();
    for (name, value) in current {
        if name == ID_FIELD {
            continue;
        }
        if original.get(name) != Some(value) {
            changes.insert(name.clone(), value.clone());
        }
    }
    for name in original.keys() {
        if name != ID_FIELD && !current.contains_key(name) {
            changes.insert(name.clone(), Value::Null);
        }
    }

    if changes.is_empty() {
        None
    } else {
        Some(Value::Object(changes))
    }
}
