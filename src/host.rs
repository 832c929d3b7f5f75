//! A deterministic frame-stepped host.
//!
//! [`TickScheduler`] is the reference [`ExecutionContext`]: it owns a simulated
//! clock that only moves when [`tick`](TickScheduler::tick) is called, which makes
//! it suitable both for tests and for embedding in a loop that already has a
//! frame callback.
//!
//! Scheduling rules:
//! - Each tick visits live tasks in start order. Tasks started during a tick are
//!   visited in that same tick.
//! - A directive yielded on frame N is first checked on frame N+1.
//! - `Yield::Run` steps the nested routine immediately; when it completes the
//!   yielding routine is resumed in the same tick.
//! - After all tasks are visited the clock advances: real time by the tick
//!   length, scaled time by the tick length times the time scale.

use std::{
    collections::{BTreeMap, VecDeque},
    ops::Bound::{Excluded, Unbounded},
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{error, trace};

use crate::{
    config::HostConfig,
    context::{ExecutionContext, Routine, TaskHandle},
    directive::{Directive, Predicate, Tick, Yield},
    error::TaskError,
    step::Step,
};

enum Wait {
    Ready,
    Time(Duration),
    Realtime(Duration),
    Until(Predicate),
    While(Predicate),
    Task(TaskHandle),
}

struct Task {
    routine: Routine,
    /// Routines suspended on `Yield::Run`, outermost first.
    parents: Vec<Routine>,
    wait: Wait,
    /// First frame on which `wait` may be checked.
    from_frame: u64,
}

enum Outcome {
    Suspended(Directive),
    Finished,
    Failed(TaskError),
    Cancelled,
}

struct HostState {
    tick: Duration,
    time_scale: f64,
    next_handle: u64,
    now: Tick,
    tasks: BTreeMap<TaskHandle, Task>,
    running: Option<TaskHandle>,
    cancel_running: bool,
    cancelled: usize,
    failures: VecDeque<(TaskHandle, TaskError)>,
    max_failures: usize,
}

impl HostState {
    fn wait_for(&self, directive: Directive) -> Wait {
        match directive {
            Directive::NextTick => Wait::Ready,
            Directive::Seconds(d) => Wait::Time(self.now.time.saturating_add(d)),
            Directive::RealtimeSeconds(d) => Wait::Realtime(self.now.realtime.saturating_add(d)),
            Directive::Until(p) => Wait::Until(p),
            Directive::While(p) => Wait::While(p),
            Directive::Task(h) => Wait::Task(h),
        }
    }
}

/// Frame-stepped scheduler with a simulated clock.
pub struct TickScheduler {
    state: Mutex<HostState>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::with_config(&HostConfig::default())
    }

    pub fn with_config(config: &HostConfig) -> Self {
        Self {
            state: Mutex::new(HostState {
                tick: config.tick(),
                time_scale: config.time_scale,
                next_handle: 0,
                now: Tick::default(),
                tasks: BTreeMap::new(),
                running: None,
                cancel_running: false,
                cancelled: 0,
                failures: VecDeque::new(),
                max_failures: config.max_failures,
            }),
        }
    }

    /// The frame the next `tick` will run.
    pub fn now(&self) -> Tick {
        self.state.lock().now
    }

    pub fn frame(&self) -> u64 {
        self.state.lock().now.frame
    }

    pub fn set_time_scale(&self, scale: f64) {
        self.state.lock().time_scale = scale;
    }

    pub fn is_alive(&self, handle: TaskHandle) -> bool {
        let state = self.state.lock();
        state.running == Some(handle) || state.tasks.contains_key(&handle)
    }

    pub fn live_tasks(&self) -> usize {
        let state = self.state.lock();
        state.tasks.len() + usize::from(state.running.is_some())
    }

    /// Number of live tasks cancelled so far.
    pub fn cancelled(&self) -> usize {
        self.state.lock().cancelled
    }

    /// Failures recorded since the last call, oldest first.
    ///
    /// At most `max_failures` are kept between calls; older ones are dropped.
    pub fn take_failures(&self) -> Vec<(TaskHandle, TaskError)> {
        self.state.lock().failures.drain(..).collect()
    }

    /// Run one frame using the configured tick length.
    pub fn tick(&self) {
        let delta = self.state.lock().tick;
        self.tick_by(delta);
    }

    /// Run one frame, then advance the clock by `delta` of real time.
    pub fn tick_by(&self, delta: Duration) {
        let now = self.now();
        let mut cursor: Option<TaskHandle> = None;

        loop {
            let mut state = self.state.lock();
            let next = match cursor {
                None => state.tasks.keys().next().copied(),
                Some(last) => state
                    .tasks
                    .range((Excluded(last), Unbounded))
                    .next()
                    .map(|(h, _)| *h),
            };
            let Some(handle) = next else {
                break;
            };
            cursor = Some(handle);

            let Some(mut task) = state.tasks.remove(&handle) else {
                continue;
            };
            if task.from_frame > now.frame {
                state.tasks.insert(handle, task);
                continue;
            }
            state.running = Some(handle);
            state.cancel_running = false;
            drop(state);

            let outcome = if self.ready(&task.wait, &now) {
                Some(self.drive(&mut task, now))
            } else {
                None
            };

            let mut state = self.state.lock();
            state.running = None;
            let cancelled = std::mem::take(&mut state.cancel_running);
            let finished = match outcome {
                _ if cancelled => Some(task),
                Some(Outcome::Cancelled) => Some(task),
                None => {
                    state.tasks.insert(handle, task);
                    None
                }
                Some(Outcome::Suspended(directive)) => {
                    task.wait = state.wait_for(directive);
                    task.from_frame = now.frame + 1;
                    state.tasks.insert(handle, task);
                    None
                }
                Some(Outcome::Finished) => {
                    trace!(?handle, frame = now.frame, "task finished");
                    Some(task)
                }
                Some(Outcome::Failed(err)) => {
                    error!(?handle, frame = now.frame, error = %err, "task failed");
                    if state.max_failures > 0 {
                        if state.failures.len() == state.max_failures {
                            state.failures.pop_front();
                        }
                        state.failures.push_back((handle, err));
                    }
                    Some(task)
                }
            };
            drop(state);
            drop(finished);
        }

        let mut state = self.state.lock();
        let scaled = Duration::try_from_secs_f64(delta.as_secs_f64() * state.time_scale)
            .unwrap_or_default();
        state.now.frame += 1;
        state.now.realtime = state.now.realtime.saturating_add(delta);
        state.now.time = state.now.time.saturating_add(scaled);
        state.now.delta = scaled;
    }

    /// Tick until no task is alive or `max_ticks` have run. Returns the ticks run.
    pub fn run_until_idle(&self, max_ticks: usize) -> usize {
        let mut ticks = 0;
        while ticks < max_ticks && self.live_tasks() > 0 {
            self.tick();
            ticks += 1;
        }
        ticks
    }

    fn ready(&self, wait: &Wait, now: &Tick) -> bool {
        match wait {
            Wait::Ready => true,
            Wait::Time(at) => now.time >= *at,
            Wait::Realtime(at) => now.realtime >= *at,
            Wait::Until(p) => p(),
            Wait::While(p) => !p(),
            Wait::Task(h) => !self.is_alive(*h),
        }
    }

    fn drive(&self, task: &mut Task, now: Tick) -> Outcome {
        loop {
            let step = task.routine.next(now);
            if self.state.lock().cancel_running {
                return Outcome::Cancelled;
            }
            match step {
                Step::Yielded(Yield::Wait(directive)) => return Outcome::Suspended(directive),
                Step::Yielded(Yield::Run(nested)) => {
                    let parent = std::mem::replace(&mut task.routine, nested);
                    task.parents.push(parent);
                }
                Step::Complete(Ok(())) => match task.parents.pop() {
                    Some(parent) => task.routine = parent,
                    None => return Outcome::Finished,
                },
                Step::Complete(Err(err)) => return Outcome::Failed(err),
            }
        }
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext for TickScheduler {
    fn start(&self, routine: Routine) -> TaskHandle {
        let mut state = self.state.lock();
        state.next_handle += 1;
        let handle = TaskHandle::from_raw(state.next_handle);
        let from_frame = state.now.frame;
        state.tasks.insert(
            handle,
            Task {
                routine,
                parents: Vec::new(),
                wait: Wait::Ready,
                from_frame,
            },
        );
        trace!(?handle, frame = from_frame, "task started");
        handle
    }

    fn cancel(&self, handle: TaskHandle) {
        let removed = {
            let mut state = self.state.lock();
            if state.running == Some(handle) {
                if !state.cancel_running {
                    state.cancel_running = true;
                    state.cancelled += 1;
                }
                None
            } else {
                let removed = state.tasks.remove(&handle);
                if removed.is_some() {
                    state.cancelled += 1;
                }
                removed
            }
        };
        if removed.is_some() {
            trace!(?handle, "task cancelled");
        }
        drop(removed);
    }
}
