//! The task queue: one serialization point for user-facing session
//! operations.
//!
//! Every operation acquires a permit before touching session state. Tasks
//! carry an action tag and an `invalidates` mask; a task dispatches only when
//! it conflicts with no in-flight task and no earlier pending task, so
//! conflicting operations are strictly ordered by enqueue time while disjoint
//! ones (reads) may overlap. Acquisition always yields to the scheduler at
//! least once, which keeps even synchronous-completion paths asynchronous
//! from the caller's point of view.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

/// The kind of a user-facing session operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskAction {
    /// Schedule inserts / dirty checks along the save cascade.
    Save,
    /// Schedule deletes along the remove cascade.
    Remove,
    /// Unlink along the detach cascade.
    Detach,
    /// Write scheduled work to the store.
    Flush,
    /// Discard the identity table.
    Clear,
    /// Load one entity by identifier.
    Find,
    /// Reload managed entities from the store.
    Refresh,
    /// Merge a detached object's state into the session.
    Merge,
    /// Resolve a reference and dereference paths.
    Fetch,
}

impl TaskAction {
    /// Every action, in declaration order.
    pub const ALL: [TaskAction; 9] = [
        TaskAction::Save,
        TaskAction::Remove,
        TaskAction::Detach,
        TaskAction::Flush,
        TaskAction::Clear,
        TaskAction::Find,
        TaskAction::Refresh,
        TaskAction::Merge,
        TaskAction::Fetch,
    ];

    const fn bit(self) -> u16 {
        match self {
            TaskAction::Save => 1,
            TaskAction::Remove => 1 << 1,
            TaskAction::Detach => 1 << 2,
            TaskAction::Flush => 1 << 3,
            TaskAction::Clear => 1 << 4,
            TaskAction::Find => 1 << 5,
            TaskAction::Refresh => 1 << 6,
            TaskAction::Merge => 1 << 7,
            TaskAction::Fetch => 1 << 8,
        }
    }

    /// The action kinds this action must not run concurrently with.
    ///
    /// Writes exclude everything but more of themselves; flush and clear are
    /// global barriers; find and fetch are reads and may overlap each other.
    #[must_use]
    pub const fn invalidates(self) -> ActionMask {
        match self {
            TaskAction::Save => ActionMask::ALL.without(TaskAction::Save),
            TaskAction::Remove => ActionMask::ALL.without(TaskAction::Remove),
            TaskAction::Detach => ActionMask::ALL.without(TaskAction::Detach),
            TaskAction::Refresh => ActionMask::ALL.without(TaskAction::Refresh),
            TaskAction::Merge => ActionMask::ALL.without(TaskAction::Merge),
            TaskAction::Flush | TaskAction::Clear => ActionMask::ALL,
            TaskAction::Find | TaskAction::Fetch => ActionMask::ALL
                .without(TaskAction::Find)
                .without(TaskAction::Fetch),
        }
    }
}

/// A bit set over [`TaskAction`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionMask(u16);

impl ActionMask {
    /// The empty mask.
    pub const NONE: Self = Self(0);
    /// Every action.
    pub const ALL: Self = Self((1 << 9) - 1);

    /// This mask plus one action.
    #[must_use]
    pub const fn with(self, action: TaskAction) -> Self {
        Self(self.0 | action.bit())
    }

    /// This mask minus one action.
    #[must_use]
    pub const fn without(self, action: TaskAction) -> Self {
        Self(self.0 & !action.bit())
    }

    /// Whether the mask holds `action`.
    #[must_use]
    pub const fn contains(self, action: TaskAction) -> bool {
        self.0 & action.bit() != 0
    }
}

/// Whether two tasks may not overlap: either one invalidates the other.
fn conflicts(a: (TaskAction, ActionMask), b: (TaskAction, ActionMask)) -> bool {
    a.1.contains(b.0) || b.1.contains(a.0)
}

struct PendingTicket {
    id: u64,
    action: TaskAction,
    mask: ActionMask,
    yielded: bool,
    waker: Option<Waker>,
}

struct RunningTicket {
    id: u64,
    action: TaskAction,
    mask: ActionMask,
}

#[derive(Default)]
struct QueueState {
    next: u64,
    pending: Vec<PendingTicket>,
    running: Vec<RunningTicket>,
}

fn wake_pending(state: &mut QueueState) {
    for ticket in &mut state.pending {
        if let Some(waker) = ticket.waker.take() {
            waker.wake();
        }
    }
}

/// FIFO of pending operations plus the set of in-flight ones.
#[derive(Default)]
pub struct TaskQueue {
    state: RefCell<QueueState>,
}

impl TaskQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an operation of the given kind. The returned future resolves
    /// to a permit once the operation may run; dropping the permit releases
    /// the slot and re-dispatches waiters.
    pub fn acquire(&self, action: TaskAction) -> Acquire<'_> {
        Acquire {
            queue: self,
            action,
            ticket: None,
            acquired: false,
        }
    }

    /// Number of operations currently in flight.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.state.borrow().running.len()
    }

    /// Number of operations waiting to dispatch.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.borrow().pending.len()
    }

    fn finish(&self, id: u64) {
        let mut state = self.state.borrow_mut();
        state.running.retain(|t| t.id != id);
        wake_pending(&mut state);
    }

    fn cancel_pending(&self, id: u64) {
        let mut state = self.state.borrow_mut();
        state.pending.retain(|t| t.id != id);
        wake_pending(&mut state);
    }
}

/// Future returned by [`TaskQueue::acquire`].
pub struct Acquire<'q> {
    queue: &'q TaskQueue,
    action: TaskAction,
    ticket: Option<u64>,
    acquired: bool,
}

impl<'q> Future for Acquire<'q> {
    type Output = TaskPermit<'q>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut state = this.queue.state.borrow_mut();

        let id = match this.ticket {
            Some(id) => id,
            None => {
                let id = state.next;
                state.next += 1;
                state.pending.push(PendingTicket {
                    id,
                    action: this.action,
                    mask: this.action.invalidates(),
                    yielded: false,
                    waker: None,
                });
                this.ticket = Some(id);
                id
            }
        };

        let index = state
            .pending
            .iter()
            .position(|t| t.id == id)
            .expect("pending ticket registered");

        // Mandatory yield: never dispatch on the poll that enqueued us.
        if !state.pending[index].yielded {
            state.pending[index].yielded = true;
            state.pending[index].waker = Some(cx.waker().clone());
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }

        let me = (state.pending[index].action, state.pending[index].mask);
        let blocked = state
            .running
            .iter()
            .any(|t| conflicts(me, (t.action, t.mask)))
            || state.pending[..index]
                .iter()
                .any(|t| conflicts(me, (t.action, t.mask)));
        if blocked {
            state.pending[index].waker = Some(cx.waker().clone());
            return Poll::Pending;
        }

        let ticket = state.pending.remove(index);
        state.running.push(RunningTicket {
            id: ticket.id,
            action: ticket.action,
            mask: ticket.mask,
        });
        this.acquired = true;
        Poll::Ready(TaskPermit {
            queue: this.queue,
            id,
        })
    }
}

impl Drop for Acquire<'_> {
    fn drop(&mut self) {
        if !self.acquired {
            if let Some(id) = self.ticket {
                self.queue.cancel_pending(id);
            }
        }
    }
}

/// Proof that an operation has been dispatched; holds its running slot.
pub struct TaskPermit<'q> {
    queue: &'q TaskQueue,
    id: u64,
}

impl Drop for TaskPermit<'_> {
    fn drop(&mut self) {
        self.queue.finish(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::pin;

    fn poll_once<'q>(acquire: &mut Pin<&mut Acquire<'q>>) -> Poll<TaskPermit<'q>> {
        let mut cx = Context::from_waker(Waker::noop());
        acquire.as_mut().poll(&mut cx)
    }

    fn acquire_now<'q>(queue: &'q TaskQueue, action: TaskAction) -> TaskPermit<'q> {
        let mut acquire = Box::pin(queue.acquire(action));
        let mut cx = Context::from_waker(Waker::noop());
        assert!(acquire.as_mut().poll(&mut cx).is_pending());
        match acquire.as_mut().poll(&mut cx) {
            Poll::Ready(permit) => permit,
            Poll::Pending => panic!("expected {action:?} to dispatch"),
        }
    }

    #[test]
    fn test_first_poll_always_yields() {
        let queue = TaskQueue::new();
        let mut acquire = pin!(queue.acquire(TaskAction::Save));
        assert!(poll_once(&mut acquire).is_pending());
        assert!(poll_once(&mut acquire).is_ready());
    }

    #[test]
    fn test_writes_are_mutually_exclusive() {
        let queue = TaskQueue::new();
        let save = acquire_now(&queue, TaskAction::Save);

        let mut remove = pin!(queue.acquire(TaskAction::Remove));
        assert!(poll_once(&mut remove).is_pending());
        assert!(poll_once(&mut remove).is_pending());

        drop(save);
        assert!(poll_once(&mut remove).is_ready());
    }

    #[test]
    fn test_same_kind_writes_may_overlap() {
        let queue = TaskQueue::new();
        let _first = acquire_now(&queue, TaskAction::Save);
        let _second = acquire_now(&queue, TaskAction::Save);
        assert_eq!(queue.running_count(), 2);
    }

    #[test]
    fn test_reads_may_overlap() {
        let queue = TaskQueue::new();
        let _find = acquire_now(&queue, TaskAction::Find);
        let _fetch = acquire_now(&queue, TaskAction::Fetch);
        assert_eq!(queue.running_count(), 2);
    }

    #[test]
    fn test_flush_is_a_global_barrier() {
        let queue = TaskQueue::new();
        let flush = acquire_now(&queue, TaskAction::Flush);

        let mut find = pin!(queue.acquire(TaskAction::Find));
        assert!(poll_once(&mut find).is_pending());
        assert!(poll_once(&mut find).is_pending());

        drop(flush);
        assert!(poll_once(&mut find).is_ready());
    }

    #[test]
    fn test_fifo_order_is_not_overtaken() {
        let queue = TaskQueue::new();
        let flush = acquire_now(&queue, TaskAction::Flush);

        // Remove waits on flush; a later save conflicts with the queued
        // remove and must not overtake it.
        let mut remove = pin!(queue.acquire(TaskAction::Remove));
        assert!(poll_once(&mut remove).is_pending());
        assert!(poll_once(&mut remove).is_pending());
        let mut save = pin!(queue.acquire(TaskAction::Save));
        assert!(poll_once(&mut save).is_pending());
        assert!(poll_once(&mut save).is_pending());

        drop(flush);
        assert!(poll_once(&mut save).is_pending());
        assert!(poll_once(&mut remove).is_ready());
        assert!(poll_once(&mut save).is_pending());
    }

    #[test]
    fn test_dropping_pending_acquire_deregisters() {
        let queue = TaskQueue::new();
        let flush = acquire_now(&queue, TaskAction::Flush);
        {
            let mut clear = pin!(queue.acquire(TaskAction::Clear));
            assert!(poll_once(&mut clear).is_pending());
            assert_eq!(queue.pending_count(), 1);
        }
        assert_eq!(queue.pending_count(), 0);
        drop(flush);
        assert_eq!(queue.running_count(), 0);
    }

    #[test]
    fn test_invalidates_masks_match_policy() {
        // Save excludes every other action but not itself.
        let save = TaskAction::Save.invalidates();
        assert!(!save.contains(TaskAction::Save));
        for action in TaskAction::ALL {
            if action != TaskAction::Save {
                assert!(save.contains(action), "save should exclude {action:?}");
            }
        }

        // Flush and clear exclude everything, themselves included.
        assert_eq!(TaskAction::Flush.invalidates(), ActionMask::ALL);
        assert_eq!(TaskAction::Clear.invalidates(), ActionMask::ALL);

        // The two reads exclude each other in neither direction.
        let find = TaskAction::Find.invalidates();
        let fetch = TaskAction::Fetch.invalidates();
        assert!(!find.contains(TaskAction::Fetch));
        assert!(!fetch.contains(TaskAction::Find));
        assert!(find.contains(TaskAction::Save));
        assert!(fetch.contains(TaskAction::Flush));
    }

    #[test]
    fn test_mask_with_without() {
        let mask = ActionMask::NONE
            .with(TaskAction::Save)
            .with(TaskAction::Merge);
        assert!(mask.contains(TaskAction::Save));
        assert!(mask.contains(TaskAction::Merge));
        assert!(!mask.contains(TaskAction::Find));
        assert!(!mask.without(TaskAction::Merge).contains(TaskAction::Merge));
    }
}
