//! Building routines by hand
//!
//! Most callers compose steps with [`SequenceBuilder`](crate::SequenceBuilder); these
//! helpers cover routines that need their own control flow.

mod func;

pub use func::{FromFn, Waits, from_fn, waits};
