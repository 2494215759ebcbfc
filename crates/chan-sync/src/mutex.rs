//! # FIFO Channel Mutex
//!
//! `lock()` returns immediately if the mutex is free. Otherwise the caller
//! parks on a oneshot receiver appended to the waiter queue. Releasing the
//! guard hands ownership directly to the head of the queue (the `locked`
//! flag stays set), or clears the flag when nobody is waiting. Ownership
//! passes waiter to waiter, so a late `lock()` call can never overtake a
//! queued one.
//!
//! The internal state sits behind a `parking_lot::Mutex` that is never held
//! across an `.await`.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

#[derive(Debug, Default)]
struct LockState {
    locked: bool,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// Cooperative mutual exclusion with FIFO fairness.
///
/// Cloning yields another handle to the same mutex.
#[derive(Debug, Clone, Default)]
pub struct ChannelMutex {
    state: Arc<Mutex<LockState>>,
}

/// Exclusive access to the critical section. Unlocks on drop.
#[must_use = "the mutex unlocks as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ChannelMutexGuard {
    state: Arc<Mutex<LockState>>,
}

impl Drop for ChannelMutexGuard {
    fn drop(&mut self) {
        release(&self.state);
    }
}

/// A queued `lock()` call. If dropped before completing, gives back a grant
/// that may already have been sent.
struct Waiter {
    rx: oneshot::Receiver<()>,
    state: Arc<Mutex<LockState>>,
    done: bool,
}

impl Drop for Waiter {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        self.rx.close();
        if self.rx.try_recv().is_ok() {
            release(&self.state);
        }
    }
}

fn release(state: &Mutex<LockState>) {
    let mut st = state.lock();
    while let Some(tx) = st.waiters.pop_front() {
        if tx.send(()).is_ok() {
            return;
        }
    }
    st.locked = false;
}

impl ChannelMutex {
    /// A new, unlocked mutex.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until exclusive access is granted.
    pub async fn lock(&self) -> ChannelMutexGuard {
        let rx = {
            let mut st = self.state.lock();
            if !st.locked {
                st.locked = true;
                return self.guard();
            }
            let (tx, rx) = oneshot::channel();
            st.waiters.push_back(tx);
            rx
        };

        let mut waiter = Waiter {
            rx,
            state: Arc::clone(&self.state),
            done: false,
        };
        // Senders live in the queue until `release` pops and fires them, and
        // the waiter keeps the queue alive, so the receive cannot fail.
        let _ = (&mut waiter.rx).await;
        waiter.done = true;
        self.guard()
    }

    /// Take the lock only if it is free right now.
    pub fn try_lock(&self) -> Option<ChannelMutexGuard> {
        let mut st = self.state.lock();
        if st.locked {
            return None;
        }
        st.locked = true;
        drop(st);
        Some(self.guard())
    }

    /// Release the lock held by `guard`. Same as dropping it.
    pub fn unlock(guard: ChannelMutexGuard) {
        drop(guard);
    }

    /// Whether some caller currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.state.lock().locked
    }

    /// Number of callers parked in the queue.
    pub fn waiting(&self) -> usize {
        self.state.lock().waiters.len()
    }

    fn guard(&self) -> ChannelMutexGuard {
        ChannelMutexGuard {
            state: Arc::clone(&self.state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn uncontended_lock_is_immediate() {
        let m = ChannelMutex::new();
        let g = m.lock().await;
        assert!(m.is_locked());
        assert!(m.try_lock().is_none());
        ChannelMutex::unlock(g);
        assert!(!m.is_locked());
        assert!(m.try_lock().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_are_granted_in_fifo_order() {
        let m = ChannelMutex::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let first = m.lock().await;

        let mut handles = Vec::new();
        for i in 0..5 {
            let m = m.clone();
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let _g = m.lock().await;
                order.lock().push(i);
                tokio::time::sleep(Duration::from_millis(1)).await;
            }));
            // Let the task reach the queue before spawning the next.
            tokio::task::yield_now().await;
        }
        assert_eq!(m.waiting(), 5);

        drop(first);
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
        assert!(!m.is_locked());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waiter_does_not_stall_the_queue() {
        let m = ChannelMutex::new();
        let held = m.lock().await;

        let cancelled = {
            let m = m.clone();
            tokio::spawn(async move {
                let _g = m.lock().await;
            })
        };
        tokio::task::yield_now().await;
        let survivor = {
            let m = m.clone();
            tokio::spawn(async move {
                let _g = m.lock().await;
            })
        };
        tokio::task::yield_now().await;
        assert_eq!(m.waiting(), 2);

        cancelled.abort();
        let _ = cancelled.await;
        drop(held);
        survivor.await.unwrap();
        assert!(!m.is_locked());
    }

    #[tokio::test]
    async fn timeout_race_leaves_mutex_consistent() {
        let m = ChannelMutex::new();
        let held = m.lock().await;
        let timed_out = tokio::time::timeout(Duration::from_millis(5), m.lock()).await;
        assert!(timed_out.is_err());
        drop(held);
        assert!(!m.is_locked());
        assert_eq!(m.waiting(), 0);
    }
}
