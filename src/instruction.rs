//! The tagged record describing one step of a sequence.

use std::{fmt, sync::Arc};

use crate::{
    context::Routine,
    directive::{Directive, Yield},
    error::BoxError,
};

/// Synchronous step. Runs to completion without suspending.
pub type ActionFn = Arc<dyn Fn() -> Result<(), BoxError> + Send + Sync>;

/// Produces a fresh suspension every time the step is reached.
pub type SuspendFactory = Arc<dyn Fn() -> Yield + Send + Sync>;

/// Produces a fresh nested task every time the step is reached.
pub type TaskFactory = Arc<dyn Fn() -> Routine + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    /// Cleared record. Skipped with a warning if it is ever executed.
    #[default]
    None,
    /// Yield a stored directive.
    Suspend,
    /// Yield whatever a factory produces.
    CustomSuspend,
    /// Call a procedure, no suspension.
    Action,
    /// Start a nested task and wait for it.
    SubSequence,
}

#[derive(Clone, Default)]
pub(crate) enum Payload {
    #[default]
    None,
    Suspend(Directive),
    CustomSuspend(SuspendFactory),
    Action(ActionFn),
    SubSequence(TaskFactory),
}

/// One step of a composed sequence.
///
/// The payload is a single tagged value, so at most one of directive, factory
/// or procedure is ever populated. Records are immutable once appended and are
/// shared by every execution of the sequence that owns them.
#[derive(Clone, Default)]
pub struct Instruction {
    payload: Payload,
}

impl Instruction {
    /// An unpopulated record of kind [`InstructionKind::None`].
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn suspend(directive: Directive) -> Self {
        let mut instr = Self::empty();
        instr.load_suspend(directive);
        instr
    }

    pub fn custom_suspend<F>(factory: F) -> Self
    where
        F: Fn() -> Yield + Send + Sync + 'static,
    {
        let mut instr = Self::empty();
        instr.load_custom_suspend(Arc::new(factory));
        instr
    }

    pub fn action<F>(action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut instr = Self::empty();
        instr.load_action(Arc::new(move || {
            action();
            Ok(())
        }));
        instr
    }

    pub fn try_action<F, E>(action: F) -> Self
    where
        F: Fn() -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let mut instr = Self::empty();
        instr.load_action(Arc::new(move || action().map_err(Into::into)));
        instr
    }

    pub fn subsequence<F>(factory: F) -> Self
    where
        F: Fn() -> Routine + Send + Sync + 'static,
    {
        let mut instr = Self::empty();
        instr.load_subsequence(Arc::new(factory));
        instr
    }

    pub fn kind(&self) -> InstructionKind {
        match self.payload {
            Payload::None => InstructionKind::None,
            Payload::Suspend(_) => InstructionKind::Suspend,
            Payload::CustomSuspend(_) => InstructionKind::CustomSuspend,
            Payload::Action(_) => InstructionKind::Action,
            Payload::SubSequence(_) => InstructionKind::SubSequence,
        }
    }

    /// `true` when kind is `None` and nothing is held.
    pub fn is_clear(&self) -> bool {
        matches!(self.payload, Payload::None)
    }

    /// The stored directive of a `Suspend` record.
    pub fn directive(&self) -> Option<&Directive> {
        match &self.payload {
            Payload::Suspend(d) => Some(d),
            _ => None,
        }
    }

    pub(crate) fn payload(&self) -> &Payload {
        &self.payload
    }

    pub(crate) fn load_suspend(&mut self, directive: Directive) {
        self.payload = Payload::Suspend(directive);
    }

    pub(crate) fn load_custom_suspend(&mut self, factory: SuspendFactory) {
        self.payload = Payload::CustomSuspend(factory);
    }

    pub(crate) fn load_action(&mut self, action: ActionFn) {
        self.payload = Payload::Action(action);
    }

    pub(crate) fn load_subsequence(&mut self, factory: TaskFactory) {
        self.payload = Payload::SubSequence(factory);
    }

    /// Drop the payload and reset the kind to `None`.
    pub fn clear(&mut self) {
        self.payload = Payload::None;
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Instruction");
        s.field("kind", &self.kind());
        if let Some(d) = self.directive() {
            s.field("directive", d);
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::waits;
    use rstest::rstest;
    use std::time::Duration;

    fn populated(kind: InstructionKind) -> Instruction {
        match kind {
            InstructionKind::None => Instruction::empty(),
            InstructionKind::Suspend => Instruction::suspend(Directive::NextTick),
            InstructionKind::CustomSuspend => {
                Instruction::custom_suspend(|| Yield::Wait(Directive::NextTick))
            }
            InstructionKind::Action => Instruction::action(|| {}),
            InstructionKind::SubSequence => {
                Instruction::subsequence(|| Box::new(waits([Directive::NextTick])))
            }
        }
    }

    #[rstest]
    #[case(InstructionKind::None)]
    #[case(InstructionKind::Suspend)]
    #[case(InstructionKind::CustomSuspend)]
    #[case(InstructionKind::Action)]
    #[case(InstructionKind::SubSequence)]
    fn test_clear_resets_every_kind(#[case] kind: InstructionKind) {
        let mut instr = populated(kind);
        assert_eq!(instr.kind(), kind);

        instr.clear();
        assert_eq!(instr.kind(), InstructionKind::None);
        assert!(instr.is_clear());
        assert!(instr.directive().is_none());
    }

    #[test]
    fn test_reloading_replaces_previous_payload() {
        let mut instr = Instruction::suspend(Directive::Seconds(Duration::from_secs(1)));
        instr.load_action(Arc::new(|| Ok(())));

        assert_eq!(instr.kind(), InstructionKind::Action);
        assert!(instr.directive().is_none());
    }

    #[test]
    fn test_try_action_surfaces_error() {
        let instr = Instruction::try_action(|| Err::<(), _>("nope"));
        let Payload::Action(action) = instr.payload() else {
            panic!("expected an action payload");
        };
        assert_eq!(action().unwrap_err().to_string(), "nope");
    }
}
