//! Fluent accumulation of sequence steps.

use std::{fmt, sync::Arc, time::Duration};

use crate::{
    context::{ExecutionContext, Routine},
    directive::{Directive, Predicate, Yield},
    error::BoxError,
    instruction::Instruction,
    pool::InstructionPool,
    sequence::ComposedSequence,
};

/// Collects steps in call order. Nothing runs until the sequence is finalized
/// and executed.
///
/// Every append is always available; by convention a chain starts right after
/// [`ContextExt::sequence`](crate::ContextExt::sequence) or [`SequenceBuilder::new`]
/// and ends with [`finalize`](Self::finalize) or [`execute`](Self::execute).
///
/// ```rust
/// use std::{sync::Arc, time::Duration};
/// use fluent_routine::{ContextExt, TickScheduler};
///
/// let host = Arc::new(TickScheduler::new());
/// let intro = host
///     .sequence()
///     .then(|| println!("Hello"))
///     .wait_seconds(Duration::from_millis(500))
///     .then(|| println!("world"))
///     .finalize();
/// assert_eq!(intro.len(), 3);
/// ```
pub struct SequenceBuilder {
    context: Arc<dyn ExecutionContext>,
    instructions: Vec<Instruction>,
    pool: Option<Arc<InstructionPool>>,
}

impl SequenceBuilder {
    /// An empty builder bound to `context`.
    pub fn new(context: Arc<dyn ExecutionContext>) -> Self {
        Self {
            context,
            instructions: Vec::new(),
            pool: None,
        }
    }

    /// Like [`new`](Self::new), but records are drawn from `pool`.
    pub fn with_pool(context: Arc<dyn ExecutionContext>, pool: Arc<InstructionPool>) -> Self {
        Self {
            context,
            instructions: Vec::new(),
            pool: Some(pool),
        }
    }

    pub fn context(&self) -> &Arc<dyn ExecutionContext> {
        &self.context
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    fn acquire(&self) -> Instruction {
        self.pool
            .as_ref()
            .map(|pool| pool.acquire())
            .unwrap_or_default()
    }

    fn append(mut self, load: impl FnOnce(&mut Instruction)) -> Self {
        let mut instr = self.acquire();
        load(&mut instr);
        self.instructions.push(instr);
        self
    }

    /// Run `action` synchronously, without suspending.
    pub fn then<F>(self, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.append(|instr| {
            instr.load_action(Arc::new(move || {
                action();
                Ok(())
            }))
        })
    }

    /// Run a fallible `action`. An error ends the run and is reported to the
    /// host as the task's failure.
    pub fn try_then<F, E>(self, action: F) -> Self
    where
        F: Fn() -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.append(|instr| instr.load_action(Arc::new(move || action().map_err(Into::into))))
    }

    /// Start the routine `factory` produces as a nested task and wait for it.
    ///
    /// The factory is called again on every execution, so each run gets a
    /// fresh routine.
    pub fn then_run<F>(self, factory: F) -> Self
    where
        F: Fn() -> Routine + Send + Sync + 'static,
    {
        self.append(|instr| instr.load_subsequence(Arc::new(factory)))
    }

    /// Execute `sequence` as a nested step and wait for it to finish.
    ///
    /// Stopping the outer sequence while this step is active stops `sequence` too.
    pub fn then_sequence(self, sequence: &ComposedSequence) -> Self {
        let sequence = sequence.clone();
        self.then_run(move || sequence.routine())
    }

    /// Wait on scaled time, so a host time scale of `0.0` holds the sequence here.
    pub fn wait_seconds(self, duration: Duration) -> Self {
        self.yield_directive(Directive::Seconds(duration))
    }

    /// Wait on real time, unaffected by the host's time scale.
    pub fn wait_realtime_seconds(self, duration: Duration) -> Self {
        self.yield_directive(Directive::RealtimeSeconds(duration))
    }

    /// Wait until `predicate` returns `true`. It is evaluated by the host on
    /// each check, not when the builder runs.
    pub fn wait_until<F>(self, predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        let predicate: Predicate = Arc::new(predicate);
        self.append(move |instr| {
            instr.load_custom_suspend(Arc::new(move || {
                Yield::Wait(Directive::Until(Arc::clone(&predicate)))
            }))
        })
    }

    /// Wait while `predicate` returns `true`.
    pub fn wait_while<F>(self, predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        let predicate: Predicate = Arc::new(predicate);
        self.append(move |instr| {
            instr.load_custom_suspend(Arc::new(move || {
                Yield::Wait(Directive::While(Arc::clone(&predicate)))
            }))
        })
    }

    /// Wait until `sequence` is no longer executing, without starting it.
    pub fn wait_for(self, sequence: &ComposedSequence) -> Self {
        let sequence = sequence.clone();
        self.append(move |instr| {
            instr.load_custom_suspend(Arc::new(move || Yield::Wait(sequence.completion())))
        })
    }

    /// Resume on the next host tick.
    pub fn wait_one_tick(self) -> Self {
        self.yield_directive(Directive::NextTick)
    }

    /// Append `count` single-tick waits. Zero appends nothing.
    pub fn wait_ticks(self, count: u32) -> Self {
        (0..count).fold(self, |builder, _| builder.wait_one_tick())
    }

    /// Append a raw host directive.
    pub fn yield_directive(self, directive: Directive) -> Self {
        self.append(|instr| instr.load_suspend(directive))
    }

    /// Append a generator-shaped step: the host runs the routine inline and
    /// resumes this sequence when it completes. Unlike [`then_run`](Self::then_run)
    /// it is not tracked for cancellation as a separate task.
    pub fn yield_routine<F>(self, factory: F) -> Self
    where
        F: Fn() -> Routine + Send + Sync + 'static,
    {
        self.append(|instr| instr.load_custom_suspend(Arc::new(move || Yield::Run(factory()))))
    }

    /// Append a prebuilt instruction as is.
    pub fn push(mut self, instr: Instruction) -> Self {
        self.instructions.push(instr);
        self
    }

    /// Freeze the steps into a [`ComposedSequence`] without running it.
    pub fn finalize(self) -> ComposedSequence {
        ComposedSequence::finalize(self)
    }

    /// Finalize and execute in one go.
    ///
    /// Every call builds a new sequence; keep the returned one to run it again.
    pub fn execute(self) -> ComposedSequence {
        let sequence = self.finalize();
        sequence.execute();
        sequence
    }

    pub(crate) fn into_parts(self) -> (Arc<dyn ExecutionContext>, Vec<Instruction>) {
        (self.context, self.instructions)
    }
}

impl fmt::Debug for SequenceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceBuilder")
            .field("instructions", &self.instructions)
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ContextExt,
        build::waits,
        host::TickScheduler,
        instruction::{InstructionKind, Payload},
        sans::Sans,
    };
    use rstest::rstest;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn host() -> Arc<TickScheduler> {
        Arc::new(TickScheduler::new())
    }

    #[test]
    fn test_each_append_adds_one_instruction_in_order() {
        let builder = host()
            .sequence()
            .then(|| {})
            .wait_seconds(Duration::from_secs(1))
            .wait_realtime_seconds(Duration::from_secs(1))
            .wait_until(|| true)
            .wait_while(|| false)
            .wait_one_tick()
            .yield_directive(Directive::NextTick)
            .yield_routine(|| waits([Directive::NextTick]).into_routine())
            .then_run(|| waits(Vec::new()).into_routine());

        let kinds: Vec<_> = builder.instructions().iter().map(Instruction::kind).collect();
        assert_eq!(
            kinds,
            vec![
                InstructionKind::Action,
                InstructionKind::Suspend,
                InstructionKind::Suspend,
                InstructionKind::CustomSuspend,
                InstructionKind::CustomSuspend,
                InstructionKind::Suspend,
                InstructionKind::Suspend,
                InstructionKind::CustomSuspend,
                InstructionKind::SubSequence,
            ]
        );
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(3)]
    #[case(16)]
    fn test_wait_ticks_appends_single_tick_waits(#[case] count: u32) {
        let seq = host().sequence().wait_ticks(count).finalize();

        assert_eq!(seq.len(), count as usize);
        for instr in seq.instructions() {
            assert_eq!(instr.kind(), InstructionKind::Suspend);
            assert!(matches!(instr.directive(), Some(Directive::NextTick)));
        }
    }

    #[test]
    fn test_wait_until_predicate_is_evaluated_lazily() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ready = Arc::new(AtomicBool::new(false));
        let builder = host().sequence().wait_until({
            let calls = Arc::clone(&calls);
            let ready = Arc::clone(&ready);
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                ready.load(Ordering::SeqCst)
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let Payload::CustomSuspend(factory) = builder.instructions()[0].payload() else {
            panic!("expected a custom suspend");
        };
        let Yield::Wait(Directive::Until(pred)) = factory() else {
            panic!("expected an Until directive");
        };
        assert!(!pred());
        ready.store(true, Ordering::SeqCst);
        assert!(pred());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_pooled_builder_reuses_released_records() {
        let pool = Arc::new(InstructionPool::new());
        pool.release_all((0..3).map(|_| Instruction::empty()));

        let seq = SequenceBuilder::with_pool(host(), Arc::clone(&pool))
            .then(|| {})
            .wait_one_tick()
            .finalize();
        assert_eq!(pool.idle(), 1);

        seq.release_into(&pool).expect("sole handle");
        assert_eq!(pool.idle(), 3);
    }

    #[test]
    fn test_builder_execute_finalizes_and_runs() {
        let host = host();
        let hit = Arc::new(AtomicBool::new(false));
        let seq = host
            .sequence()
            .then({
                let hit = Arc::clone(&hit);
                move || hit.store(true, Ordering::SeqCst)
            })
            .execute();

        assert!(seq.is_executing());
        host.tick();
        assert!(hit.load(Ordering::SeqCst));
        assert!(!seq.is_executing());
    }
}
