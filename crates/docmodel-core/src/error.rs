//! Error types shared by the mapping and session layers.
//!
//! Errors surface through an operation's `Outcome`; they are never thrown
//! across asynchronous boundaries. Synchronous failures inside an async
//! operation are wrapped and delivered through the same channel so callers
//! observe uniform semantics.

/// Convenience alias for fallible operations across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure kinds produced by the mapping and session layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An operation targeted an object whose type has no registered mapping.
    Unmapped {
        /// The unmapped type name.
        type_name: String,
    },
    /// save/remove/refresh encountered an entity that carries an identity but
    /// is not linked to this session.
    Detached {
        /// The stringified identity of the detached entity.
        key: String,
    },
    /// Programmer error: two entities with the same identity linked in one
    /// session.
    DuplicateLink {
        /// The colliding identity key.
        key: String,
    },
    /// Programmer error: two mappings registered under one name or id.
    DuplicateMapping {
        /// The colliding mapping name.
        name: String,
    },
    /// A value could not be used as an identifier for the target mapping.
    InvalidIdentifier {
        /// Rendering of the rejected value.
        value: String,
    },
    /// Propagated from a persister call; aborts the current operation.
    Persister {
        /// The persister's failure message.
        message: String,
    },
    /// Propagated from batch execution; aborts the flush and poisons the
    /// session.
    Batch {
        /// The executor's failure message.
        message: String,
    },
    /// The target of a reference could not be loaded.
    ReferenceResolution {
        /// The referenced type name.
        type_name: String,
        /// The stringified identity that failed to resolve.
        key: String,
    },
    /// The session was poisoned by an earlier flush failure; the operation
    /// failed fast.
    Poisoned {
        /// Rendering of the original failure.
        message: String,
    },
}

impl Error {
    /// Build an [`Error::Unmapped`] for a type name.
    pub fn unmapped(type_name: impl Into<String>) -> Self {
        Error::Unmapped {
            type_name: type_name.into(),
        }
    }

    /// Build an [`Error::Detached`] for an identity key.
    pub fn detached(key: impl Into<String>) -> Self {
        Error::Detached { key: key.into() }
    }

    /// Build an [`Error::Persister`] from a message.
    pub fn persister(message: impl Into<String>) -> Self {
        Error::Persister {
            message: message.into(),
        }
    }

    /// Build an [`Error::Batch`] from a message.
    pub fn batch(message: impl Into<String>) -> Self {
        Error::Batch {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Unmapped { type_name } => {
                write!(f, "no mapping registered for type '{type_name}'")
            }
            Error::Detached { key } => {
                write!(f, "entity '{key}' is detached from the session")
            }
            Error::DuplicateLink { key } => {
                write!(f, "an entity with identity '{key}' is already linked")
            }
            Error::DuplicateMapping { name } => {
                write!(f, "a mapping named '{name}' is already registered")
            }
            Error::InvalidIdentifier { value } => {
                write!(f, "'{value}' is not a valid identifier")
            }
            Error::Persister { message } => write!(f, "persister error: {message}"),
            Error::Batch { message } => write!(f, "batch execution failed: {message}"),
            Error::ReferenceResolution { type_name, key } => {
                write!(f, "could not resolve reference to {type_name} '{key}'")
            }
            Error::Poisoned { message } => {
                write!(f, "session poisoned by earlier flush failure: {message}")
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_unmapped() {
        let err = Error::unmapped("Person");
        assert_eq!(err.to_string(), "no mapping registered for type 'Person'");
    }

    #[test]
    fn test_display_detached_carries_key() {
        let err = Error::detached("42");
        assert!(err.to_string().contains("'42'"));
    }

    #[test]
    fn test_display_reference_resolution() {
        let err = Error::ReferenceResolution {
            type_name: "Person".to_string(),
            key: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "could not resolve reference to Person 'abc'");
    }

    #[test]
    fn test_errors_are_comparable() {
        assert_eq!(Error::batch("boom"), Error::batch("boom"));
        assert_ne!(Error::batch("boom"), Error::persister("boom"));
    }
}
