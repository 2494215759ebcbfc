//! # chan-sync — Cooperative Concurrency Primitives
//!
//! The replication core serializes every mutation of one channel's state
//! onto a single logical critical section. This crate provides the pieces
//! that make that possible on a tokio runtime:
//!
//! - [`ChannelMutex`]: async mutual exclusion with a FIFO waiter queue.
//!   Waiters are granted the lock strictly in call order.
//! - [`PassBarrier`]: admission control. `try_pass` waits for an
//!   `allow_one`; an `allow_one` with nobody waiting is banked as credit.
//! - [`retry_with_backoff`]: bounded retry with fixed or exponential delay
//!   and a per-attempt callback, for transient failures.
//! - [`Scheduler`]: deferred one-shot tasks (handshake expiry, escalation
//!   timers), cancellable individually or all at once.
//!
//! Both primitives are cancellation-safe: dropping a pending `lock()` or
//! `try_pass()` future never loses a grant. A grant that raced with the
//! drop is handed to the next waiter.

pub mod barrier;
pub mod mutex;
pub mod retry;
pub mod scheduler;

pub use barrier::PassBarrier;
pub use mutex::{ChannelMutex, ChannelMutexGuard};
pub use retry::{retry, retry_if, retry_with_backoff, Backoff, RetryError, RetryPolicy};
pub use scheduler::{ScheduledTask, Scheduler};
