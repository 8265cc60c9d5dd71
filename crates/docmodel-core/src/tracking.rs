//! Change-tracking policy.
//!
//! Tracking mode is a per-persister policy, not a session-wide toggle. The
//! session only checks which mode applies to a link when deciding whether to
//! schedule a dirty check.

/// How a persister detects modifications to managed entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeTracking {
    /// Every managed entity is diffed against its snapshot on flush.
    DeferredImplicit,
    /// Only entities explicitly passed to `save` again are diffed on flush.
    DeferredExplicit,
    /// The persister observes mutations itself; the session never schedules
    /// dirty checks.
    Observe,
}
