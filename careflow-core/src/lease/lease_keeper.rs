use careflow_common::prelude::*;
use careflow_common::Task;

use super::TaskLeaseClient;

/// Lease that must be left over once the caller wakes up again.
const RENEW_MARGIN_MS: i64 = 1_000;

/// Keeps the lease of one task alive while its handler waits on something slow.
///
/// `keep_alive` is cheap to call often: it only talks to the broker once less than half of
/// `extension_ms` is left on the lease, or once the lease would not outlast the caller's next
/// sleep. After the broker refused an extension the keeper stops trying, since the lease is
/// gone for good.
pub struct LeaseKeeper<'a> {
    client: &'a TaskLeaseClient,
    task: &'a mut Task,
    extension_ms: i64,
    lost: bool,
}

impl<'a> LeaseKeeper<'a> {
    pub fn new(client: &'a TaskLeaseClient, task: &'a mut Task, extension_ms: i64) -> Self {
        Self {
            client,
            task,
            extension_ms,
            lost: false,
        }
    }

    /// Extends the lease when it runs low. Returns whether the lease is still believed held.
    pub fn keep_alive(&mut self) -> bool {
        self.keep_alive_for(0)
    }

    /// Like `keep_alive`, for a caller about to sleep `upcoming_sleep_ms`: the lease is also
    /// extended when it would run out before the caller gets to call again.
    pub fn keep_alive_for(&mut self, upcoming_sleep_ms: i64) -> bool {
        if self.lost || self.extension_ms <= 0 {
            return !self.lost;
        }
        let now = self.client.clock().now_millis();
        let threshold = (self.extension_ms / 2).max(upcoming_sleep_ms.max(0) + RENEW_MARGIN_MS);
        if self.task.remaining_lease_millis(now) >= threshold {
            return true;
        }
        match self.client.extend_lease(self.task, self.extension_ms) {
            Ok(()) => true,
            Err(e) => {
                if e.is_lease_expired() {
                    warn!(
                        "Lease of task {} is lost, its outcome will be rejected",
                        self.task.id
                    );
                    self.lost = true;
                }
                !self.lost
            }
        }
    }

    pub fn is_lost(&self) -> bool {
        self.lost
    }

    pub fn task(&self) -> &Task {
        &*self.task
    }
}
