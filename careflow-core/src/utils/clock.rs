use std::thread;
use std::time::Duration;

use careflow_common::prelude::*;
use chrono::Utc;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

/// Time source for leases and polling. All instants are epoch millis.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;

    /// Blocks the calling thread. Non-positive durations return immediately.
    fn sleep(&self, millis: i64);

    /// Blocks up to `millis`, or until every sender of `wake` is gone. Returns whether it was
    /// woken early.
    fn sleep_or_wake(&self, millis: i64, wake: &Receiver<()>) -> bool {
        !matches!(
            wake.recv_timeout(Duration::from_millis(millis.max(0) as u64)),
            Err(RecvTimeoutError::Timeout)
        )
    }
}

pub type SharedClock = Arc<dyn Clock>;

pub struct SystemClock;

impl SystemClock {
    pub fn shared() -> SharedClock {
        Arc::new(SystemClock)
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn sleep(&self, millis: i64) {
        if millis > 0 {
            thread::sleep(Duration::from_millis(millis as u64));
        }
    }
}

/// Clock that only moves when told to; `sleep` advances it instantly.
pub struct ManualClock {
    now: AtomicI64,
    slept: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
            slept: AtomicI64::new(0),
        }
    }

    pub fn shared(start_millis: i64) -> Arc<ManualClock> {
        Arc::new(Self::new(start_millis))
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, AtomicOrdering::SeqCst);
    }

    /// Total time spent in `sleep`.
    pub fn slept_millis(&self) -> i64 {
        self.slept.load(AtomicOrdering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(AtomicOrdering::SeqCst)
    }

    fn sleep(&self, millis: i64) {
        if millis > 0 {
            self.slept.fetch_add(millis, AtomicOrdering::SeqCst);
            self.advance(millis);
        }
    }

    fn sleep_or_wake(&self, millis: i64, wake: &Receiver<()>) -> bool {
        if let Err(TryRecvError::Disconnected) = wake.try_recv() {
            return true;
        }
        self.sleep(millis);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_on_sleep() {
        let clock = ManualClock::new(1_000);
        clock.sleep(5_000);
        clock.sleep(-1);
        clock.advance(10);
        assert_eq!(clock.now_millis(), 6_010);
        assert_eq!(clock.slept_millis(), 5_000);
    }

    #[test]
    fn manual_clock_skips_the_sleep_once_woken() {
        let clock = ManualClock::new(0);
        let (sender, receiver) = crossbeam_channel::bounded::<()>(0);
        assert!(!clock.sleep_or_wake(2_000, &receiver));
        drop(sender);
        assert!(clock.sleep_or_wake(2_000, &receiver));
        assert_eq!(clock.now_millis(), 2_000);
    }
}
