//! Suspend directives understood by the host scheduler.
//!
//! A routine suspends by yielding a [`Yield`]: either a [`Directive`] the host
//! evaluates on later ticks, or a nested routine the host runs inline. The host
//! resumes the routine with a [`Tick`] describing the frame it is resumed on.

use std::{fmt, sync::Arc, time::Duration};

use crate::context::{Routine, TaskHandle};

/// Live condition evaluated by the host each time it checks a wait.
pub type Predicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Condition under which a suspended routine becomes runnable again.
///
/// Directives are cheap to clone so one stored directive can be yielded by
/// every execution of a sequence.
#[derive(Clone)]
pub enum Directive {
    /// Resume on the next tick.
    NextTick,
    /// Resume once this much scaled time has elapsed.
    Seconds(Duration),
    /// Resume once this much real (unscaled) time has elapsed.
    RealtimeSeconds(Duration),
    /// Resume on the first check where the predicate returns `true`.
    Until(Predicate),
    /// Resume on the first check where the predicate returns `false`.
    While(Predicate),
    /// Resume once the task is no longer alive.
    Task(TaskHandle),
}

impl Directive {
    /// Resume on the next tick.
    pub fn next_tick() -> Self {
        Directive::NextTick
    }

    /// Resume after `duration` of scaled time.
    pub fn after_seconds(duration: Duration) -> Self {
        Directive::Seconds(duration)
    }

    /// Resume after `duration` of real time.
    pub fn after_realtime_seconds(duration: Duration) -> Self {
        Directive::RealtimeSeconds(duration)
    }

    /// Resume once `predicate` returns `true`.
    pub fn until<F>(predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Directive::Until(Arc::new(predicate))
    }

    /// Resume once `predicate` returns `false`.
    pub fn while_true<F>(predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Directive::While(Arc::new(predicate))
    }
}

impl fmt::Debug for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::NextTick => write!(f, "NextTick"),
            Directive::Seconds(d) => f.debug_tuple("Seconds").field(d).finish(),
            Directive::RealtimeSeconds(d) => f.debug_tuple("RealtimeSeconds").field(d).finish(),
            Directive::Until(_) => write!(f, "Until(..)"),
            Directive::While(_) => write!(f, "While(..)"),
            Directive::Task(h) => f.debug_tuple("Task").field(h).finish(),
        }
    }
}

/// What a routine hands to the host when it suspends.
pub enum Yield {
    /// Wait on a directive.
    Wait(Directive),
    /// Run a nested routine to completion, then resume the yielder.
    Run(Routine),
}

impl From<Directive> for Yield {
    fn from(directive: Directive) -> Self {
        Yield::Wait(directive)
    }
}

impl fmt::Debug for Yield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Yield::Wait(d) => f.debug_tuple("Wait").field(d).finish(),
            Yield::Run(_) => write!(f, "Run(..)"),
        }
    }
}

/// Resume input: the host frame a routine is being stepped on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tick {
    /// Zero-based frame counter.
    pub frame: u64,
    /// Scaled time since the host started.
    pub time: Duration,
    /// Real time since the host started.
    pub realtime: Duration,
    /// Scaled time advanced by the previous tick.
    pub delta: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_predicate_directives_are_live() {
        let flag = Arc::new(AtomicBool::new(false));
        let until = Directive::until({
            let flag = Arc::clone(&flag);
            move || flag.load(Ordering::SeqCst)
        });
        let Directive::Until(pred) = until.clone() else {
            panic!("expected Until");
        };

        assert!(!pred());
        flag.store(true, Ordering::SeqCst);
        assert!(pred());
    }

    #[test]
    fn test_debug_hides_closures() {
        let d = Directive::while_true(|| true);
        assert_eq!(format!("{d:?}"), "While(..)");
        assert_eq!(
            format!("{:?}", Yield::from(Directive::after_seconds(Duration::from_secs(2)))),
            "Wait(Seconds(2s))"
        );
    }
}
