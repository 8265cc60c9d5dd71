//! Property flags: the per-edge policy bits consulted by the graph walker and
//! cascade logic.
//!
//! A compact hand-rolled bit set; the flag vocabulary is fixed, so there is no
//! need for a general bitflags dependency.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bit set of per-property policies.
///
/// Cascade bits direct a session operation to propagate along the property
/// edge; the remaining bits describe the property itself.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PropertyFlags(u32);

impl PropertyFlags {
    /// No policy.
    pub const NONE: Self = Self(0);
    /// The property is skipped entirely by traversal and persistence.
    pub const IGNORED: Self = Self(1);
    /// `save` propagates along this edge.
    pub const CASCADE_SAVE: Self = Self(1 << 1);
    /// `remove` propagates along this edge.
    pub const CASCADE_REMOVE: Self = Self(1 << 2);
    /// `detach` propagates along this edge.
    pub const CASCADE_DETACH: Self = Self(1 << 3);
    /// `refresh` propagates along this edge.
    pub const CASCADE_REFRESH: Self = Self(1 << 4);
    /// `merge` propagates along this edge.
    pub const CASCADE_MERGE: Self = Self(1 << 5);
    /// The property is the inverse side of a bidirectional association.
    pub const INVERSE_SIDE: Self = Self(1 << 6);
    /// The property accepts null.
    pub const NULLABLE: Self = Self(1 << 7);
    /// Removing the owner removes orphaned targets.
    pub const ORPHAN_REMOVAL: Self = Self(1 << 8);
    /// The edge is followed (and its reference loaded) when the owner is
    /// removed.
    pub const DEREFERENCE: Self = Self(1 << 9);

    /// Union of the five cascade bits.
    pub const CASCADE_ALL: Self = Self(
        Self::CASCADE_SAVE.0
            | Self::CASCADE_REMOVE.0
            | Self::CASCADE_DETACH.0
            | Self::CASCADE_REFRESH.0
            | Self::CASCADE_MERGE.0,
    );

    /// True when every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when `self` and `other` share at least one bit.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// True when no bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The union of two flag sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for PropertyFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for PropertyFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl fmt::Debug for PropertyFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: &[(PropertyFlags, &str)] = &[
            (PropertyFlags::IGNORED, "IGNORED"),
            (PropertyFlags::CASCADE_SAVE, "CASCADE_SAVE"),
            (PropertyFlags::CASCADE_REMOVE, "CASCADE_REMOVE"),
            (PropertyFlags::CASCADE_DETACH, "CASCADE_DETACH"),
            (PropertyFlags::CASCADE_REFRESH, "CASCADE_REFRESH"),
            (PropertyFlags::CASCADE_MERGE, "CASCADE_MERGE"),
            (PropertyFlags::INVERSE_SIDE, "INVERSE_SIDE"),
            (PropertyFlags::NULLABLE, "NULLABLE"),
            (PropertyFlags::ORPHAN_REMOVAL, "ORPHAN_REMOVAL"),
            (PropertyFlags::DEREFERENCE, "DEREFERENCE"),
        ];

        if self.is_empty() {
            return f.write_str("NONE");
        }
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(*flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}
