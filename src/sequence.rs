//! Composed sequences and the driver that executes them.
//!
//! A [`ComposedSequence`] owns a frozen instruction list and a LIFO stack of the
//! tasks it currently has running on its [`ExecutionContext`]: one entry per
//! driver run, plus one per nested sub-sequence that run is waiting on. The
//! sequence is executing exactly when that stack is non-empty.
//!
//! ```text
//!  execute() ──► context.start(driver) ──► push(run, handle)
//!                                              │
//!   tick ─► driver.next() ─► Action ... Action ─► Suspend ──► host waits
//!                             SubSequence ─► context.start(sub) ─► push(run, sub)
//!                                              │        sub done ─► pop
//!                             end of list ────► pop own entry
//!
//!  stop() ──► drain stack, cancel innermost first
//! ```

use std::{
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::{
    Sans,
    builder::SequenceBuilder,
    context::{ExecutionContext, Routine, TaskHandle},
    directive::{Directive, Tick, Yield},
    error::{TaskError, TaskResult},
    instruction::{Instruction, Payload},
    pool::InstructionPool,
    step::Step,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RunId(u64);

#[derive(Debug, Clone, Copy)]
struct ActiveTask {
    run: RunId,
    handle: TaskHandle,
}

#[derive(Debug, Default)]
struct ActiveStack(Vec<ActiveTask>);

impl ActiveStack {
    fn push(&mut self, run: RunId, handle: TaskHandle) {
        self.0.push(ActiveTask { run, handle });
    }

    fn remove(&mut self, run: RunId, handle: TaskHandle) {
        if let Some(pos) = self
            .0
            .iter()
            .rposition(|t| t.run == run && t.handle == handle)
        {
            self.0.remove(pos);
        }
    }

    fn contains_run(&self, run: RunId) -> bool {
        self.0.iter().any(|t| t.run == run)
    }

    /// Entries belonging to `run`, outermost first.
    fn drain_run(&mut self, run: RunId) -> Vec<ActiveTask> {
        let (mine, rest): (Vec<_>, Vec<_>) = self.0.drain(..).partition(|t| t.run == run);
        self.0 = rest;
        mine
    }

    fn drain_all(&mut self) -> Vec<ActiveTask> {
        std::mem::take(&mut self.0)
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

struct Shared {
    /// Held weakly: the host owns the drivers, and drivers own this.
    context: Weak<dyn ExecutionContext>,
    instructions: Vec<Instruction>,
    active: Mutex<ActiveStack>,
    next_run: AtomicU64,
}

impl Shared {
    fn is_executing(&self) -> bool {
        self.active.lock().len() > 0
    }

    fn cancel_all(&self, tasks: Vec<ActiveTask>) {
        let Some(context) = self.context.upgrade() else {
            return;
        };
        for task in tasks.into_iter().rev() {
            trace!(handle = ?task.handle, run = task.run.0, "cancelling task");
            context.cancel(task.handle);
        }
    }
}

/// A finalized, re-executable sequence of steps.
///
/// Cloning is cheap and yields another handle to the same sequence and the same
/// execution state. The execution context is held weakly; once it is gone,
/// `execute` and `stop` do nothing.
///
/// ```rust
/// use std::{sync::Arc, time::Duration};
/// use fluent_routine::{ContextExt, TickScheduler};
///
/// let host = Arc::new(TickScheduler::new());
/// let blink = host
///     .sequence()
///     .then(|| println!("on"))
///     .wait_seconds(Duration::from_millis(50))
///     .then(|| println!("off"))
///     .finalize();
///
/// blink.execute();
/// assert!(blink.is_executing());
/// host.run_until_idle(100);
/// assert!(!blink.is_executing());
/// ```
#[derive(Clone)]
pub struct ComposedSequence {
    shared: Arc<Shared>,
}

impl ComposedSequence {
    pub(crate) fn from_parts(
        context: Arc<dyn ExecutionContext>,
        instructions: Vec<Instruction>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                context: Arc::downgrade(&context),
                instructions,
                active: Mutex::new(ActiveStack::default()),
                next_run: AtomicU64::new(0),
            }),
        }
    }

    /// Freeze a builder's steps into a new sequence bound to the same context.
    pub fn finalize(builder: SequenceBuilder) -> Self {
        let (context, instructions) = builder.into_parts();
        Self::from_parts(context, instructions)
    }

    /// A sequence with no steps. Executing it only warns and completes.
    pub fn empty(context: Arc<dyn ExecutionContext>) -> Self {
        Self::from_parts(context, Vec::new())
    }

    /// The frozen steps, in execution order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.shared.instructions
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.shared.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.instructions.is_empty()
    }

    /// `true` while any run, or any sub-sequence a run is waiting on, is active.
    pub fn is_executing(&self) -> bool {
        self.shared.is_executing()
    }

    /// Number of tasks currently tracked for cancellation.
    pub fn active_tasks(&self) -> usize {
        self.shared.active.lock().len()
    }

    /// Start a new run on the execution context.
    ///
    /// Calling this while already executing starts a second, independent run;
    /// check [`is_executing`](Self::is_executing) first if that is unwanted.
    pub fn execute(&self) -> &Self {
        self.execute_run();
        self
    }

    /// Start a run and return its identity, or `None` if the context is gone.
    fn execute_run(&self) -> Option<(RunId, TaskHandle)> {
        if self.shared.instructions.is_empty() {
            warn!("executing a composed sequence with no instructions");
        }
        let Some(context) = self.shared.context.upgrade() else {
            warn!("execution context dropped; sequence not started");
            return None;
        };

        let run = RunId(self.shared.next_run.fetch_add(1, Ordering::Relaxed));
        let driver = Driver {
            shared: Arc::clone(&self.shared),
            run,
            cursor: 0,
            awaiting: None,
            done: false,
        };

        // Held across `start` so a host on another thread cannot step the
        // driver before its entry exists.
        let mut active = self.shared.active.lock();
        let handle = context.start(driver.into_routine());
        active.push(run, handle);
        drop(active);

        debug!(?handle, run = run.0, steps = self.len(), "sequence started");
        Some((run, handle))
    }

    /// Cancel every active task, innermost first. A no-op when idle.
    pub fn stop(&self) -> &Self {
        let drained = self.shared.active.lock().drain_all();
        if !drained.is_empty() {
            debug!(tasks = drained.len(), "stopping sequence");
        }
        self.shared.cancel_all(drained);
        self
    }

    /// Cancel one run and the sub-sequences it is waiting on. Other runs
    /// keep going.
    fn stop_run(&self, run: RunId) {
        let drained = self.shared.active.lock().drain_run(run);
        if !drained.is_empty() {
            debug!(run = run.0, tasks = drained.len(), "stopping run");
        }
        self.shared.cancel_all(drained);
    }

    /// A directive that holds while this sequence is executing.
    ///
    /// Yielding it from another routine waits for the whole sequence to finish.
    pub fn completion(&self) -> Directive {
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        Directive::While(Arc::new(move || {
            shared.upgrade().is_some_and(|s| s.is_executing())
        }))
    }

    /// A routine that starts a run of this sequence and completes when that
    /// run finishes. Other runs of the sequence are neither awaited nor touched.
    ///
    /// If the routine is dropped before then, for example because its own task
    /// was cancelled, the run it started is stopped.
    pub fn routine(&self) -> Routine {
        Nested {
            sequence: self.clone(),
            run: None,
            finished: false,
        }
        .into_routine()
    }

    /// Return the instructions to `pool` if this is the last handle to the
    /// sequence and no run still holds it. Otherwise hands the sequence back.
    pub fn release_into(self, pool: &InstructionPool) -> Result<(), Self> {
        match Arc::try_unwrap(self.shared) {
            Ok(shared) => {
                pool.release_all(shared.instructions);
                Ok(())
            }
            Err(shared) => Err(Self { shared }),
        }
    }
}

impl From<SequenceBuilder> for ComposedSequence {
    fn from(builder: SequenceBuilder) -> Self {
        Self::finalize(builder)
    }
}

impl From<&ComposedSequence> for Directive {
    fn from(sequence: &ComposedSequence) -> Self {
        sequence.completion()
    }
}

impl fmt::Debug for ComposedSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedSequence")
            .field("instructions", &self.shared.instructions)
            .field("active", &*self.shared.active.lock())
            .finish()
    }
}

/// One run of a sequence, stepped by the host.
struct Driver {
    shared: Arc<Shared>,
    run: RunId,
    cursor: usize,
    awaiting: Option<TaskHandle>,
    done: bool,
}

impl Driver {
    /// Drop this run's entries without cancelling anything; the run is
    /// finishing from inside its own step.
    fn finish(&mut self) {
        self.done = true;
        self.shared.active.lock().drain_run(self.run);
    }

    fn stopped(&self) -> bool {
        !self.shared.active.lock().contains_run(self.run)
    }
}

impl Sans<Tick, Yield> for Driver {
    type Return = TaskResult;

    fn next(&mut self, tick: Tick) -> Step<Yield, Self::Return> {
        if let Some(handle) = self.awaiting.take() {
            self.shared.active.lock().remove(self.run, handle);
        }

        let shared = Arc::clone(&self.shared);
        loop {
            if self.stopped() {
                trace!(run = self.run.0, "run was stopped");
                self.done = true;
                return Step::Complete(Ok(()));
            }

            let index = self.cursor;
            let Some(instr) = shared.instructions.get(index) else {
                break;
            };
            self.cursor += 1;

            match instr.payload() {
                Payload::None => {
                    warn!(index, "skipping sequence instruction with no kind");
                }
                Payload::Suspend(directive) => return Step::wait(directive.clone()),
                Payload::CustomSuspend(factory) => return Step::Yielded(factory()),
                Payload::Action(action) => {
                    if let Err(source) = action() {
                        self.finish();
                        return Step::Complete(Err(TaskError::Step { index, source }));
                    }
                }
                Payload::SubSequence(factory) => {
                    let Some(context) = shared.context.upgrade() else {
                        self.finish();
                        return Step::Complete(Ok(()));
                    };
                    let routine = factory();
                    let mut active = shared.active.lock();
                    let handle = context.start(routine);
                    active.push(self.run, handle);
                    drop(active);

                    trace!(?handle, index, frame = tick.frame, "sub-sequence started");
                    self.awaiting = Some(handle);
                    return Step::wait(Directive::Task(handle));
                }
            }
        }

        self.finish();
        debug!(run = self.run.0, frame = tick.frame, "sequence finished");
        Step::Complete(Ok(()))
    }
}

impl Drop for Driver {
    // Cancelled by the host without going through `stop`: take any
    // sub-sequences this run started down with it.
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let orphans = self.shared.active.lock().drain_run(self.run);
        self.shared.cancel_all(orphans);
    }
}

struct Nested {
    sequence: ComposedSequence,
    run: Option<RunId>,
    finished: bool,
}

impl Sans<Tick, Yield> for Nested {
    type Return = TaskResult;

    fn next(&mut self, _tick: Tick) -> Step<Yield, Self::Return> {
        if self.run.is_none() && !self.finished {
            if let Some((run, handle)) = self.sequence.execute_run() {
                self.run = Some(run);
                return Step::wait(Directive::Task(handle));
            }
        }
        self.finished = true;
        Step::Complete(Ok(()))
    }
}

impl Drop for Nested {
    fn drop(&mut self) {
        if let (Some(run), false) = (self.run, self.finished) {
            self.sequence.stop_run(run);
        }
    }
}
