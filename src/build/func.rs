use crate::{
    Sans,
    directive::{Directive, Tick, Yield},
    error::TaskResult,
    step::Step,
};

pub struct FromFn<F>(F);

impl<A, Y, D, F> Sans<A, Y> for FromFn<F>
where
    F: FnMut(A) -> Step<Y, D>,
{
    type Return = D;
    fn next(&mut self, input: A) -> Step<Y, Self::Return> {
        (self.0)(input)
    }
}

/// Create a routine from a closure called once per resume.
///
/// ```rust
/// use fluent_routine::prelude::*;
///
/// let mut blink = from_fn(|tick: Tick| -> Step<Yield, TaskResult> {
///     if tick.frame < 2 { Step::wait(Directive::NextTick) } else { Step::Complete(Ok(())) }
/// });
/// assert!(blink.next(Tick::default()).is_yielded());
/// assert!(blink.next(Tick { frame: 2, ..Tick::default() }).is_complete());
/// ```
pub fn from_fn<F>(f: F) -> FromFn<F> {
    FromFn(f)
}

/// Yields each directive in turn, then completes successfully.
///
/// Created via [`waits`].
pub struct Waits<I>(I);

/// Create a routine that waits on each directive in order.
///
/// ```rust
/// use std::time::Duration;
/// use fluent_routine::prelude::*;
///
/// let mut pause = waits([Directive::NextTick, Directive::after_seconds(Duration::from_secs(1))]);
/// assert!(pause.next(Tick::default()).is_yielded());
/// assert!(pause.next(Tick::default()).is_yielded());
/// assert!(pause.next(Tick::default()).unwrap_complete().is_ok());
/// ```
pub fn waits<I>(directives: I) -> Waits<I::IntoIter>
where
    I: IntoIterator<Item = Directive>,
{
    Waits(directives.into_iter())
}

impl<I> Sans<Tick, Yield> for Waits<I>
where
    I: Iterator<Item = Directive>,
{
    type Return = TaskResult;
    fn next(&mut self, _tick: Tick) -> Step<Yield, Self::Return> {
        match self.0.next() {
            Some(directive) => Step::wait(directive),
            None => Step::Complete(Ok(())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;

    #[test]
    fn test_from_fn_sees_every_tick() {
        let mut frames = Vec::new();
        let mut stage = from_fn(|tick: Tick| {
            frames.push(tick.frame);
            if tick.frame == 1 {
                Step::Complete(Err::<(), _>(TaskError::routine("stopped at frame 1")))
            } else {
                Step::wait(Directive::NextTick)
            }
        });

        assert!(stage.next(Tick::default()).is_yielded());
        let done = stage.next(Tick { frame: 1, ..Tick::default() });
        assert!(done.unwrap_complete().is_err());
        drop(stage);
        assert_eq!(frames, vec![0, 1]);
    }

    #[test]
    fn test_waits_empty_completes_at_once() {
        let mut stage = waits(Vec::new());
        assert!(stage.next(Tick::default()).unwrap_complete().is_ok());
    }
}
