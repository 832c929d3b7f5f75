use crate::{
    context::Routine,
    directive::{Directive, Yield},
};

/// Outcome of resuming a routine: suspend again, or finish.
///
/// `Step` is what [`Sans::next`](crate::Sans::next) hands back to the host scheduler.
/// A `Yielded` value tells the host what to wait on before the next resume; a
/// `Complete` value ends the task.
///
/// # Examples
///
/// ```rust
/// use fluent_routine::{Directive, Step, Yield};
///
/// let pause: Step<Yield, ()> = Step::wait(Directive::NextTick);
/// assert!(pause.is_yielded());
///
/// let done: Step<Yield, ()> = Step::Complete(());
/// assert!(done.is_complete());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step<Y, D> {
    /// Suspend with an intermediate value
    Yielded(Y),
    /// Finish with a final value
    Complete(D),
}

impl<Y, D> Step<Y, D> {
    /// Returns `true` if the step is `Yielded`.
    #[inline]
    pub const fn is_yielded(&self) -> bool {
        matches!(self, Step::Yielded(_))
    }

    /// Returns `true` if the step is `Complete`.
    #[inline]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Step::Complete(_))
    }

    /// Converts from `Step<Y, D>` to `Option<D>`, discarding a yielded value.
    #[inline]
    pub fn complete_value(self) -> Option<D> {
        match self {
            Step::Yielded(_) => None,
            Step::Complete(d) => Some(d),
        }
    }

    /// Maps the final value, leaving a suspension untouched.
    ///
    /// ```rust
    /// use fluent_routine::Step;
    ///
    /// let failed: Step<u8, Result<(), &str>> = Step::Complete(Err("boom"));
    /// assert_eq!(failed.map_complete(|r| r.is_ok()), Step::Complete(false));
    /// ```
    #[inline]
    pub fn map_complete<D2, F>(self, f: F) -> Step<Y, D2>
    where
        F: FnOnce(D) -> D2,
    {
        match self {
            Step::Yielded(y) => Step::Yielded(y),
            Step::Complete(d) => Step::Complete(f(d)),
        }
    }

    /// Returns the contained `Yielded` value.
    ///
    /// # Panics
    ///
    /// Panics if the step is `Complete`.
    #[inline]
    pub fn unwrap_yielded(self) -> Y {
        match self {
            Step::Yielded(y) => y,
            Step::Complete(_) => panic!("called `Step::unwrap_yielded()` on a `Complete` value"),
        }
    }

    /// Returns the contained `Complete` value.
    ///
    /// # Panics
    ///
    /// Panics if the step is `Yielded`.
    #[inline]
    pub fn unwrap_complete(self) -> D {
        match self {
            Step::Yielded(_) => panic!("called `Step::unwrap_complete()` on a `Yielded` value"),
            Step::Complete(d) => d,
        }
    }
}

impl<D> Step<Yield, D> {
    /// Suspend until the host reports `directive` satisfied.
    #[inline]
    pub fn wait(directive: Directive) -> Self {
        Step::Yielded(Yield::Wait(directive))
    }

    /// Suspend while the host runs `routine` inline to completion.
    #[inline]
    pub fn run(routine: Routine) -> Self {
        Step::Yielded(Yield::Run(routine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_wait_wraps_directive() {
        let step: Step<Yield, ()> = Step::wait(Directive::Seconds(Duration::from_millis(250)));
        match step.unwrap_yielded() {
            Yield::Wait(Directive::Seconds(d)) => assert_eq!(d, Duration::from_millis(250)),
            other => panic!("unexpected yield: {other:?}"),
        }
    }

    #[test]
    fn test_complete_value_and_map() {
        let pending: Step<i32, &str> = Step::Yielded(7);
        let done: Step<i32, &str> = Step::Complete("done");

        assert_eq!(done.complete_value(), Some("done"));
        assert_eq!(done.map_complete(str::len), Step::Complete(4));
        assert_eq!(pending.map_complete(str::len), Step::Yielded(7));
        assert_eq!(pending.complete_value(), None);
    }

    #[test]
    #[should_panic(expected = "called `Step::unwrap_complete()` on a `Yielded` value")]
    fn test_unwrap_complete_panics_on_suspension() {
        let step: Step<Yield, ()> = Step::wait(Directive::NextTick);
        step.unwrap_complete();
    }
}
