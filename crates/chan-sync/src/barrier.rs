//! # Pass Barrier
//!
//! Admission control for multi-step protocols: `try_pass()` parks until an
//! `allow_one()` is available; `allow_one()` wakes the longest-waiting
//! caller or, if nobody waits, banks one credit for a future `try_pass()`.
//!
//! Not a counting semaphore: waiters are released strictly in arrival
//! order, and credits only accumulate while the queue is empty.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

#[derive(Debug, Default)]
struct BarrierState {
    credits: u64,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// One-at-a-time admission barrier with credit banking.
#[derive(Debug, Clone, Default)]
pub struct PassBarrier {
    state: Arc<Mutex<BarrierState>>,
}

struct Pass {
    rx: oneshot::Receiver<()>,
    state: Arc<Mutex<BarrierState>>,
    done: bool,
}

impl Drop for Pass {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        self.rx.close();
        if self.rx.try_recv().is_ok() {
            admit(&self.state);
        }
    }
}

fn admit(state: &Mutex<BarrierState>) {
    let mut st = state.lock();
    while let Some(tx) = st.waiters.pop_front() {
        if tx.send(()).is_ok() {
            return;
        }
    }
    st.credits = st.credits.saturating_add(1);
}

impl PassBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until one admission is available and consume it.
    pub async fn try_pass(&self) {
        let rx = {
            let mut st = self.state.lock();
            if st.credits > 0 {
                st.credits -= 1;
                return;
            }
            let (tx, rx) = oneshot::channel();
            st.waiters.push_back(tx);
            rx
        };
        let mut pass = Pass {
            rx,
            state: Arc::clone(&self.state),
            done: false,
        };
        let _ = (&mut pass.rx).await;
        pass.done = true;
    }

    /// Admit the longest-waiting caller, or bank a credit.
    pub fn allow_one(&self) {
        admit(&self.state);
    }

    /// Banked admissions not yet consumed.
    pub fn credits(&self) -> u64 {
        self.state.lock().credits
    }

    /// Callers currently parked.
    pub fn waiting(&self) -> usize {
        self.state.lock().waiters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn banked_credit_passes_immediately() {
        let b = PassBarrier::new();
        b.allow_one();
        b.allow_one();
        assert_eq!(b.credits(), 2);
        b.try_pass().await;
        b.try_pass().await;
        assert_eq!(b.credits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn allow_one_wakes_exactly_one_waiter_in_order() {
        let b = PassBarrier::new();
        let passed = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for i in 0..3 {
            let b = b.clone();
            let passed = Arc::clone(&passed);
            handles.push(tokio::spawn(async move {
                b.try_pass().await;
                passed.lock().push(i);
            }));
            tokio::task::yield_now().await;
        }
        assert_eq!(b.waiting(), 3);

        b.allow_one();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(*passed.lock(), vec![0]);
        assert_eq!(b.credits(), 0);

        b.allow_one();
        b.allow_one();
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*passed.lock(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn abandoned_pass_keeps_its_credit() {
        let b = PassBarrier::new();
        let gave_up = tokio::time::timeout(Duration::from_millis(5), b.try_pass()).await;
        assert!(gave_up.is_err());
        b.allow_one();
        // The dead waiter is skipped and the admission is banked.
        assert_eq!(b.credits(), 1);
        assert_eq!(b.waiting(), 0);
    }
}
