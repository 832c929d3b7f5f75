//! Reuse cache for [`Instruction`] records.
//!
//! The pool is an ordinary value: whichever scope creates builders owns one
//! (usually behind an `Arc`) and hands it to [`SequenceBuilder::with_pool`].
//! Acquire and release are safe from any thread.
//!
//! [`SequenceBuilder::with_pool`]: crate::SequenceBuilder::with_pool

use parking_lot::Mutex;

use crate::{config::PoolConfig, instruction::Instruction};

/// LIFO free list of cleared instructions.
///
/// `acquire` never fails; it falls back to a fresh record when the list is empty.
/// Reuse order is not observable because released records hold nothing.
#[derive(Debug)]
pub struct InstructionPool {
    free: Mutex<Vec<Instruction>>,
    max_retained: usize,
}

impl InstructionPool {
    /// An empty pool with default retention.
    pub fn new() -> Self {
        Self::with_config(&PoolConfig::default())
    }

    /// Creates a pool holding at most `config.max_retained` idle records,
    /// pre-filled with `config.prewarm` of them.
    pub fn with_config(config: &PoolConfig) -> Self {
        let prewarm = config.prewarm.min(config.max_retained);
        let free = (0..prewarm).map(|_| Instruction::empty()).collect();
        Self {
            free: Mutex::new(free),
            max_retained: config.max_retained,
        }
    }

    /// A clean record of kind `None`.
    pub fn acquire(&self) -> Instruction {
        self.free.lock().pop().unwrap_or_default()
    }

    /// Clear `instr` and keep it for reuse.
    ///
    /// Records past `max_retained` are dropped instead.
    pub fn release(&self, mut instr: Instruction) {
        instr.clear();
        let mut free = self.free.lock();
        if free.len() < self.max_retained {
            free.push(instr);
        }
    }

    /// Clear and keep every record in `instrs`, up to `max_retained` idle.
    pub fn release_all<I>(&self, instrs: I)
    where
        I: IntoIterator<Item = Instruction>,
    {
        let cleared: Vec<Instruction> = instrs
            .into_iter()
            .map(|mut instr| {
                instr.clear();
                instr
            })
            .collect();
        let mut free = self.free.lock();
        let room = self.max_retained.saturating_sub(free.len());
        free.extend(cleared.into_iter().take(room));
    }

    /// Number of idle records.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

impl Default for InstructionPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{directive::Directive, instruction::InstructionKind};
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        thread,
    };

    #[test]
    fn test_release_then_acquire_is_clean() {
        let pool = InstructionPool::new();
        pool.release(Instruction::action(|| {}));
        pool.release(Instruction::suspend(Directive::NextTick));
        assert_eq!(pool.idle(), 2);

        let instr = pool.acquire();
        assert_eq!(instr.kind(), InstructionKind::None);
        assert!(instr.is_clear());
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_acquire_on_empty_pool_allocates() {
        let pool = InstructionPool::new();
        assert_eq!(pool.idle(), 0);
        assert!(pool.acquire().is_clear());
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_retention_is_bounded() {
        let pool = InstructionPool::with_config(&PoolConfig {
            max_retained: 2,
            prewarm: 5,
        });
        assert_eq!(pool.idle(), 2);

        pool.release(Instruction::action(|| {}));
        pool.release_all((0..4).map(|_| Instruction::suspend(Directive::NextTick)));
        assert_eq!(pool.idle(), 2);
    }

    struct IdleOnDrop {
        pool: Arc<InstructionPool>,
        seen: Arc<AtomicUsize>,
    }

    impl Drop for IdleOnDrop {
        fn drop(&mut self) {
            self.seen.store(self.pool.idle(), Ordering::SeqCst);
        }
    }

    #[test]
    fn test_release_all_clears_outside_the_lock() {
        let pool = Arc::new(InstructionPool::new());
        pool.release(Instruction::empty());
        let seen = Arc::new(AtomicUsize::new(usize::MAX));
        let guard = IdleOnDrop {
            pool: Arc::clone(&pool),
            seen: Arc::clone(&seen),
        };
        let instr = Instruction::action(move || {
            let _ = &guard;
        });

        pool.release_all([instr, Instruction::suspend(Directive::NextTick)]);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle(), 3);
        assert_eq!(Arc::strong_count(&pool), 1);
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let pool = Arc::new(InstructionPool::new());
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for _ in 0..250 {
                        let mut instr = pool.acquire();
                        assert!(instr.is_clear());
                        instr = Instruction::suspend(Directive::NextTick);
                        pool.release(instr);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker panicked");
        }

        assert!(pool.idle() >= 1 && pool.idle() <= 4);
    }
}
