//! Identity generation.
//!
//! Identifiers are opaque to the session: it only needs to create them,
//! parse them from strings, and recognize them. Each entity mapping carries
//! one generator; persisters expose the same generator for their mapping.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use docmodel_core::{Document, Error, Result};
use regex::Regex;

/// Produces, parses and recognizes identifier values for one mapping.
pub trait IdentityGenerator {
    /// Produce a fresh identifier.
    fn generate(&self) -> Document;

    /// Parse an identifier from its string rendering.
    fn from_string(&self, raw: &str) -> Result<Document>;

    /// Whether `value` is a well-formed identifier for this generator.
    fn is_identifier(&self, value: &Document) -> bool;
}

// ============================================================================
// ObjectId-style generator
// ============================================================================

/// 12-byte hex identifiers in the classic document-store layout: a 4-byte
/// timestamp, 5 process-derived bytes and a 3-byte counter.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectIdGenerator;

impl ObjectIdGenerator {
    /// Create a generator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn hex_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("^[0-9a-f]{24}$").expect("hex identifier pattern"))
}

impl IdentityGenerator for ObjectIdGenerator {
    fn generate(&self) -> Document {
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let secs = now.as_secs() as u32;
        let process = std::process::id();
        let count = COUNTER.fetch_add(1, Ordering::Relaxed);

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..8].copy_from_slice(&process.to_be_bytes());
        bytes[8] = (now.subsec_nanos() & 0xff) as u8;
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);

        let mut hex = String::with_capacity(24);
        for byte in bytes {
            hex.push_str(&format!("{byte:02x}"));
        }
        Document::String(hex)
    }

    fn from_string(&self, raw: &str) -> Result<Document> {
        if hex_id_pattern().is_match(raw) {
            Ok(Document::String(raw.to_string()))
        } else {
            Err(Error::InvalidIdentifier {
                value: raw.to_string(),
            })
        }
    }

    fn is_identifier(&self, value: &Document) -> bool {
        value
            .as_str()
            .is_some_and(|raw| hex_id_pattern().is_match(raw))
    }
}

// ============================================================================
// Sequential generator
// ============================================================================

/// Monotonically increasing integer identifiers.
///
/// Handy for tests and for stores with natural integer keys.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    next: AtomicI64,
}

impl SequentialIdGenerator {
    /// Create a generator starting at 1.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Create a generator starting at `first`.
    #[must_use]
    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityGenerator for SequentialIdGenerator {
    fn generate(&self) -> Document {
        Document::from(self.next.fetch_add(1, Ordering::Relaxed))
    }

    fn from_string(&self, raw: &str) -> Result<Document> {
        raw.parse::<i64>()
            .map(Document::from)
            .map_err(|_| Error::InvalidIdentifier {
                value: raw.to_string(),
            })
    }

    fn is_identifier(&self, value: &Document) -> bool {
        value.as_i64().is_some()
    }
}
