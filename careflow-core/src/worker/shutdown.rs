use careflow_common::prelude::*;
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::utils::Clock;

/// Cooperative stop flag shared by every loop of a worker fleet. Raising it wakes loops that are
/// sleeping through an idle interval.
#[derive(Clone)]
pub struct ShutdownSignal {
    raised: Arc<AtomicBool>,
    // dropped on raise, which disconnects every receiver at once
    sender: Arc<Mutex<Option<Sender<()>>>>,
    receiver: Receiver<()>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(0);
        Self {
            raised: Arc::new(AtomicBool::new(false)),
            sender: Arc::new(Mutex::new(Some(sender))),
            receiver,
        }
    }

    pub fn raise(&self) {
        if !self.raised.swap(true, AtomicOrdering::SeqCst) {
            info!("Shutdown requested");
        }
        self.sender.lock().take();
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(AtomicOrdering::SeqCst)
    }

    /// Sleeps up to `millis` on `clock`; returns true as soon as the signal is raised.
    pub fn wait(&self, clock: &dyn Clock, millis: i64) -> bool {
        if self.is_raised() {
            return true;
        }
        clock.sleep_or_wake(millis, &self.receiver) || self.is_raised()
    }
}
