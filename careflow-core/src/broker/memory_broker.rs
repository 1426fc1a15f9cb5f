use careflow_common::prelude::*;
use careflow_common::Task;
use dashmap::DashMap;

use super::{TaskBroker, TopicRequest};
use crate::utils::{IdGenerator, SharedClock};

/// In-process broker with the same lease rules as the engine: exclusive claims, expiry,
/// retry bookkeeping and incidents. Backs local runs and tests.
pub struct InMemoryBroker {
    clock: SharedClock,
    state: Mutex<BrokerState>,
    fetch_requests: DashMap<InlineStr, usize>,
}

#[derive(Default)]
struct BrokerState {
    /// Claim order per topic. May hold ids that are no longer pending; those are skipped.
    queues: HashMap<InlineStr, VecDeque<InlineStr>>,
    tasks: HashMap<InlineStr, StoredTask>,
}

struct StoredTask {
    topic: InlineStr,
    variables: HashMap<InlineStr, Object>,
    retries: Option<i32>,
    /// Not claimable before this instant (retry back-off).
    available_at: i64,
    state: StoredState,
}

#[derive(Clone, Debug)]
enum StoredState {
    Pending,
    Locked { worker_id: InlineStr, expiry: i64 },
    Completed { variables: HashMap<InlineStr, Object> },
    Incident { message: InlineStr, details: InlineStr },
}

impl InMemoryBroker {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            state: Mutex::new(BrokerState::default()),
            fetch_requests: DashMap::new(),
        }
    }

    /// Makes a new task claimable on `topic`, returns its id.
    pub fn publish(&self, topic: &str, variables: HashMap<InlineStr, Object>) -> InlineStr {
        self.publish_with_retries(topic, variables, None)
    }

    pub fn publish_with_retries(
        &self,
        topic: &str,
        variables: HashMap<InlineStr, Object>,
        retries: Option<i32>,
    ) -> InlineStr {
        let id = IdGenerator::generate();
        let mut state = self.state.lock();
        state.tasks.insert(
            id.clone(),
            StoredTask {
                topic: topic.into(),
                variables,
                retries,
                available_at: 0,
                state: StoredState::Pending,
            },
        );
        state
            .queues
            .entry(topic.into())
            .or_default()
            .push_back(id.clone());
        id
    }

    /// Number of fetch-and-lock requests that asked for `topic`.
    pub fn fetch_requests(&self, topic: &str) -> usize {
        self.fetch_requests.get(topic).map(|x| *x.value()).unwrap_or(0)
    }

    pub fn pending_count(&self, topic: &str) -> usize {
        let state = self.state.lock();
        state
            .tasks
            .values()
            .filter(|x| x.topic.as_str() == topic && matches!(x.state, StoredState::Pending))
            .count()
    }

    pub fn completed_variables(&self, task_id: &str) -> Option<HashMap<InlineStr, Object>> {
        match self.state.lock().tasks.get(task_id).map(|x| &x.state) {
            Some(StoredState::Completed { variables }) => Some(variables.clone()),
            _ => None,
        }
    }

    /// `(message, details)` of the incident raised for the task, if any.
    pub fn incident(&self, task_id: &str) -> Option<(InlineStr, InlineStr)> {
        match self.state.lock().tasks.get(task_id).map(|x| &x.state) {
            Some(StoredState::Incident { message, details }) => {
                Some((message.clone(), details.clone()))
            }
            _ => None,
        }
    }

    pub fn retries(&self, task_id: &str) -> Option<i32> {
        self.state.lock().tasks.get(task_id).and_then(|x| x.retries)
    }

    pub fn is_pending(&self, task_id: &str) -> bool {
        matches!(
            self.state.lock().tasks.get(task_id).map(|x| &x.state),
            Some(StoredState::Pending)
        )
    }

    pub fn lock_expiry(&self, task_id: &str) -> Option<i64> {
        match self.state.lock().tasks.get(task_id).map(|x| &x.state) {
            Some(StoredState::Locked { expiry, .. }) => Some(*expiry),
            _ => None,
        }
    }

    /// Returns expired leases to the pool. A task whose retry budget runs out this way becomes
    /// an incident.
    fn reclaim_expired(state: &mut BrokerState, now: i64) {
        let BrokerState { queues, tasks } = state;
        for (id, task) in tasks.iter_mut() {
            let (worker_id, expiry) = match &task.state {
                StoredState::Locked { worker_id, expiry } if *expiry <= now => {
                    (worker_id.clone(), *expiry)
                }
                _ => continue,
            };

            warn!(
                "Lease of task {} held by {} expired at {}, returning it to topic {}",
                id, worker_id, expiry, task.topic
            );
            match task.retries {
                Some(retries) if retries <= 1 => {
                    task.retries = Some(0);
                    task.state = StoredState::Incident {
                        message: "lease expired with no retries left".into(),
                        details: format!("last held by worker {}", worker_id).into(),
                    };
                }
                retries => {
                    task.retries = retries.map(|x| x - 1);
                    task.state = StoredState::Pending;
                    queues
                        .entry(task.topic.clone())
                        .or_default()
                        .push_back(id.clone());
                }
            }
        }
    }

    /// The task, provided `worker_id` still holds a live lease on it.
    fn leased<'s>(
        state: &'s mut BrokerState,
        worker_id: &str,
        task_id: &str,
        now: i64,
    ) -> CareResult<&'s mut StoredTask> {
        let task = match state.tasks.get_mut(task_id) {
            Some(task) => task,
            None => return fmt_err!(NotFound, "task {} does not exist", task_id),
        };
        let rejection = match &task.state {
            StoredState::Completed { .. } | StoredState::Incident { .. } => Some(
                ErrorCode::AlreadyReported(format!("task {} already has an outcome", task_id)),
            ),
            StoredState::Pending => Some(ErrorCode::LeaseExpired(format!(
                "task {} is not locked, its lease expired and it was returned to the pool",
                task_id
            ))),
            StoredState::Locked {
                worker_id: holder, ..
            } if holder.as_str() != worker_id => Some(ErrorCode::LeaseExpired(format!(
                "task {} is locked by worker {}, not {}",
                task_id, holder, worker_id
            ))),
            StoredState::Locked { expiry, .. } if *expiry <= now => {
                Some(ErrorCode::LeaseExpired(format!(
                    "lock of task {} expired at {}, now {}",
                    task_id, expiry, now
                )))
            }
            StoredState::Locked { .. } => None,
        };
        match rejection {
            Some(e) => Err(e),
            None => Ok(task),
        }
    }

    fn next_claimable(state: &mut BrokerState, topic: &str, now: i64) -> Option<InlineStr> {
        let BrokerState { queues, tasks } = state;
        let queue = queues.get_mut(topic)?;
        let mut deferred = VecDeque::new();
        let mut found = None;
        while let Some(id) = queue.pop_front() {
            match tasks.get(&id) {
                Some(task) if matches!(task.state, StoredState::Pending) => {
                    if task.available_at <= now {
                        found = Some(id);
                        break;
                    }
                    deferred.push_back(id);
                }
                // claimed elsewhere or finished, the queue entry is stale
                _ => {}
            }
        }
        while let Some(id) = deferred.pop_back() {
            queue.push_front(id);
        }
        found
    }
}

impl TaskBroker for InMemoryBroker {
    fn fetch_and_lock(
        &self,
        worker_id: &str,
        max_tasks: i32,
        topics: &[TopicRequest],
    ) -> CareResult<Vec<Task>> {
        let now = self.clock.now_millis();
        for topic in topics {
            *self
                .fetch_requests
                .entry(topic.topic_name.clone())
                .or_insert(0) += 1;
        }

        let mut state = self.state.lock();
        Self::reclaim_expired(&mut state, now);

        let mut locked = Vec::new();
        let wanted = max_tasks.max(0) as usize;
        // round robin over the requested topics so one busy topic cannot fill the batch
        let mut exhausted = vec![false; topics.len()];
        while locked.len() < wanted && exhausted.iter().any(|x| !x) {
            for (i, topic) in topics.iter().enumerate() {
                if locked.len() >= wanted {
                    break;
                }
                if exhausted[i] {
                    continue;
                }
                let id = match Self::next_claimable(&mut state, &topic.topic_name, now) {
                    Some(id) => id,
                    None => {
                        exhausted[i] = true;
                        continue;
                    }
                };
                let expiry = now + topic.lock_duration_ms;
                if let Some(stored) = state.tasks.get_mut(&id) {
                    stored.state = StoredState::Locked {
                        worker_id: worker_id.into(),
                        expiry,
                    };
                    let mut task = Task::new(
                        id.clone(),
                        stored.topic.clone(),
                        worker_id.into(),
                        stored.variables.clone(),
                        expiry,
                    );
                    task.retries = stored.retries;
                    locked.push(task);
                }
            }
        }

        trace!(
            "Worker {} locked {} tasks for {:?}",
            worker_id,
            locked.len(),
            topics.iter().map(|x| &x.topic_name).collect::<Vec<_>>()
        );
        Ok(locked)
    }

    fn complete(
        &self,
        worker_id: &str,
        task_id: &str,
        variables: &HashMap<InlineStr, Object>,
    ) -> CareResult<()> {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        let task = Self::leased(&mut state, worker_id, task_id, now)?;
        task.state = StoredState::Completed {
            variables: variables.clone(),
        };
        Ok(())
    }

    fn failure(
        &self,
        worker_id: &str,
        task_id: &str,
        error_message: &str,
        error_details: &str,
        retries: i32,
        retry_timeout_ms: i64,
    ) -> CareResult<()> {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        let task = Self::leased(&mut state, worker_id, task_id, now)?;
        task.retries = Some(retries.max(0));
        if retries <= 0 {
            task.state = StoredState::Incident {
                message: error_message.into(),
                details: error_details.into(),
            };
            return Ok(());
        }

        task.state = StoredState::Pending;
        task.available_at = now + retry_timeout_ms.max(0);
        let topic = task.topic.clone();
        state
            .queues
            .entry(topic)
            .or_default()
            .push_back(task_id.into());
        Ok(())
    }

    fn extend_lock(
        &self,
        worker_id: &str,
        task_id: &str,
        new_duration_ms: i64,
    ) -> CareResult<()> {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        let task = Self::leased(&mut state, worker_id, task_id, now)?;
        task.state = StoredState::Locked {
            worker_id: worker_id.into(),
            expiry: now + new_duration_ms,
        };
        Ok(())
    }
}
