//! Commonly used imports
//!
//! Use `use fluent_routine::prelude::*;` for quick access to the most common types and functions.

// Core types
pub use crate::{Sans, Step};

// Host interaction
pub use crate::{ContextExt, Directive, ExecutionContext, Routine, TaskHandle, Tick, Yield};

// Sequences
pub use crate::{ComposedSequence, SequenceBuilder};

// Routine constructors
pub use crate::build::{from_fn, waits};

// Results
pub use crate::{TaskError, TaskResult};

// Reference host
pub use crate::TickScheduler;
