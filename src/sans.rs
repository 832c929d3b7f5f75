//! Core trait for resumable computations.
//!
//! [`Sans<I, O>`] is a computation that:
//! - is resumed with input of type `I`
//! - suspends by yielding values of type `O`
//! - eventually completes with a value of type `Return`
//!
//! The sequencer's drivers and every caller-supplied routine are `Sans<Tick, Yield>`
//! values; the host scheduler owns the loop that resumes them.
//!
//! # Examples
//!
//! ```rust
//! use fluent_routine::prelude::*;
//!
//! let mut left = 2;
//! let mut countdown = from_fn(move |_tick: Tick| -> Step<Yield, TaskResult> {
//!     if left == 0 {
//!         return Step::Complete(Ok(()));
//!     }
//!     left -= 1;
//!     Step::wait(Directive::NextTick)
//! });
//!
//! assert!(countdown.next(Tick::default()).is_yielded());
//! assert!(countdown.next(Tick::default()).is_yielded());
//! assert!(countdown.next(Tick::default()).unwrap_complete().is_ok());
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    context::Routine,
    directive::{Tick, Yield},
    error::TaskResult,
    step::Step,
};

/// A stateful computation resumed with input and suspended with output.
pub trait Sans<I, O> {
    /// Final result when the computation completes
    type Return;

    /// Resume with `input`, returning `Yielded` to suspend or `Complete` to finish.
    fn next(&mut self, input: I) -> Step<O, Self::Return>;

    /// Erase into the [`Routine`] shape the host schedules.
    fn into_routine(self) -> Routine
    where
        Self: Sized + Sans<Tick, Yield, Return = TaskResult> + Send + 'static,
    {
        Box::new(self)
    }
}

impl<I, O, C> Sans<I, O> for Arc<Mutex<C>>
where
    C: Sans<I, O>,
{
    type Return = C::Return;
    fn next(&mut self, input: I) -> Step<O, Self::Return> {
        self.lock().next(input)
    }
}

impl<I, O, C> Sans<I, O> for Option<C>
where
    C: Sans<I, O>,
{
    type Return = Option<C::Return>;
    fn next(&mut self, input: I) -> Step<O, Self::Return> {
        match self {
            Some(c) => c.next(input).map_complete(Some),
            None => Step::Complete(None),
        }
    }
}

impl<I, O, L, R> Sans<I, O> for either::Either<L, R>
where
    L: Sans<I, O>,
    R: Sans<I, O, Return = L::Return>,
{
    type Return = L::Return;
    fn next(&mut self, input: I) -> Step<O, Self::Return> {
        match self {
            either::Either::Left(l) => l.next(input),
            either::Either::Right(r) => r.next(input),
        }
    }
}

impl<I, O, D> Sans<I, O> for Box<dyn Sans<I, O, Return = D> + Send> {
    type Return = D;

    fn next(&mut self, input: I) -> Step<O, Self::Return> {
        (**self).next(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        build::{Waits, from_fn, waits},
        directive::Directive,
    };

    #[test]
    fn test_either_dispatches_to_active_branch() {
        let mut branch: either::Either<_, Routine> =
            either::Either::Left(waits([Directive::NextTick]));

        assert!(Sans::next(&mut branch, Tick::default()).is_yielded());
        assert!(Sans::next(&mut branch, Tick::default()).unwrap_complete().is_ok());

        let finished = from_fn(|_: Tick| Step::<Yield, TaskResult>::Complete(Ok(())));
        let mut branch: either::Either<Waits<std::vec::IntoIter<Directive>>, Routine> =
            either::Either::Right(finished.into_routine());
        assert!(Sans::next(&mut branch, Tick::default()).is_complete());
    }

    #[test]
    fn test_shared_routine_resumes_through_lock() {
        let mut shared = Arc::new(Mutex::new(waits(vec![
            Directive::NextTick,
            Directive::NextTick,
        ])));
        let mut handle = Arc::clone(&shared);

        assert!(handle.next(Tick::default()).is_yielded());
        assert!(shared.next(Tick::default()).is_yielded());
        assert!(handle.next(Tick::default()).is_complete());
    }

    #[test]
    fn test_option_none_completes_immediately() {
        let mut missing: Option<Routine> = None;
        assert!(matches!(missing.next(Tick::default()), Step::Complete(None)));
    }
}
