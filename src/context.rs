//! The host-facing capability the sequencer runs on.

use std::{fmt, sync::Arc};

use crate::{
    builder::SequenceBuilder,
    directive::{Tick, Yield},
    error::TaskResult,
    sans::Sans,
};

/// A cooperatively scheduled unit of work, stepped by the host once per resume.
pub type Routine = Box<dyn Sans<Tick, Yield, Return = TaskResult> + Send>;

/// Opaque handle to a task started on an [`ExecutionContext`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskHandle(u64);

impl TaskHandle {
    /// Wrap a host-assigned id.
    pub const fn from_raw(raw: u64) -> Self {
        TaskHandle(raw)
    }

    /// The host-assigned id.
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// The host entity allowed to start and cancel cooperative tasks.
///
/// Implementations own the tick loop. The contract the sequencer relies on:
///
/// - `start` only registers the routine. The host's tick loop steps it, never
///   `start` itself.
/// - `cancel` drops the routine. Unknown or already finished handles are ignored.
///   Cancelling the task that is currently being stepped takes effect as soon as
///   that step returns.
/// - Routines are dropped without any host lock held, since dropping one may
///   cancel further tasks.
/// - Every [`Directive`](crate::Directive) must be honoured. In particular
///   `Directive::Task(handle)` resumes the yielder once `handle` is no longer
///   alive, whether it finished, failed or was cancelled. Sub-sequence steps
///   wait on it.
/// - A routine may yield `Yield::Run(nested)`; the host steps `nested` to
///   completion and then resumes the yielder.
pub trait ExecutionContext: Send + Sync {
    /// Register `routine` as a new task and return its handle.
    fn start(&self, routine: Routine) -> TaskHandle;

    /// Stop the task behind `handle` and drop its routine.
    fn cancel(&self, handle: TaskHandle);
}

/// Fluent entry point on a shared context.
///
/// ```rust
/// use std::sync::Arc;
/// use fluent_routine::{ContextExt, TickScheduler};
///
/// let host = Arc::new(TickScheduler::new());
/// let greeting = host.sequence().then(|| println!("hello")).finalize();
/// assert!(!greeting.is_executing());
/// ```
pub trait ContextExt {
    fn sequence(&self) -> SequenceBuilder;
}

impl<C> ContextExt for Arc<C>
where
    C: ExecutionContext + 'static,
{
    fn sequence(&self) -> SequenceBuilder {
        SequenceBuilder::new(Arc::clone(self) as Arc<dyn ExecutionContext>)
    }
}
