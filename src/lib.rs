//! # Fluent Routine: Cancellable Step Sequences
//!
//! Describe a timed series of steps with a fluent builder, freeze it into a
//! re-executable [`ComposedSequence`], and let a cooperative host scheduler
//! drive it frame by frame.
//!
//! ## Core Traits
//!
//! - **[`Sans<I, O>`]**: Resumable computations; every routine the host steps is a
//!   `Sans<Tick, Yield>`
//! - **[`ExecutionContext`]**: The host capability to start and cancel routines
//!
//! ## Key Features
//!
//! - **Declarative**: Chain `.then()`, `.wait_seconds()`, `.wait_until()` and friends
//! - **Re-executable**: A finalized sequence can be executed again and again
//! - **Cancellable**: `.stop()` tears down the run and any nested sub-sequences
//! - **Deterministic**: [`TickScheduler`] steps tasks on a simulated clock
//!
//! ## Example
//!
//! ```
//! use std::{sync::{Arc, Mutex}, time::Duration};
//! use fluent_routine::{ContextExt, TickScheduler};
//!
//! let host = Arc::new(TickScheduler::new());
//! let text = Arc::new(Mutex::new(String::new()));
//!
//! let intro = host
//!     .sequence()
//!     .then({
//!         let text = Arc::clone(&text);
//!         move || *text.lock().unwrap() = "Hello".into()
//!     })
//!     .wait_seconds(Duration::from_millis(500))
//!     .then({
//!         let text = Arc::clone(&text);
//!         move || text.lock().unwrap().clear()
//!     })
//!     .finalize();
//!
//! intro.execute();
//! host.tick();
//! assert_eq!(*text.lock().unwrap(), "Hello");
//!
//! host.run_until_idle(1_000);
//! assert!(text.lock().unwrap().is_empty());
//! assert!(!intro.is_executing());
//! ```
//!
//! ## Common Functions
//!
//! **Building Sequences:**
//! - [`ContextExt::sequence`] - Start a builder on a shared context
//! - [`SequenceBuilder::finalize`] - Freeze the steps into a [`ComposedSequence`]
//! - [`SequenceBuilder::execute`] - Finalize and run in one go
//!
//! **Building Routines:**
//! - [`from_fn(f)`] - Routine from a closure called once per resume
//! - [`waits(directives)`] - Routine that waits on each directive in turn
//!
//! **Execution:**
//! - [`ComposedSequence::execute`] / [`ComposedSequence::stop`]
//! - [`TickScheduler::tick`] - Advance the reference host by one frame

pub mod build;
pub mod builder;
pub mod config;
pub mod context;
pub mod directive;
pub mod error;
pub mod host;
pub mod instruction;
pub mod logging;
pub mod pool;
pub mod prelude;
pub mod sans;
pub mod sequence;
pub mod step;

pub use build::{from_fn, waits};
pub use builder::SequenceBuilder;
pub use config::{Config, HostConfig, PoolConfig};
pub use context::{ContextExt, ExecutionContext, Routine, TaskHandle};
pub use directive::{Directive, Predicate, Tick, Yield};
pub use error::{BoxError, ConfigError, TaskError, TaskResult};
pub use host::TickScheduler;
pub use instruction::{Instruction, InstructionKind};
pub use pool::InstructionPool;
pub use sans::Sans;
pub use sequence::ComposedSequence;
pub use step::Step;
