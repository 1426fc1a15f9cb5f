use std::sync::Arc;

use careflow_common::prelude::*;
use careflow_core::{
    Clock, InMemoryBroker, JobPoller, JobPollerProperties, JobState, LeaseKeeper, ManualClock,
    RemoteJobClient, RemoteJobStatus, ResultExtractor, ResultField, StatusMapper,
    TaskLeaseClient, WorkerProperties,
};
use serde_json::{json, Value};

fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}

/// Remote runner whose status answers follow a script; the last answer repeats forever.
struct ScriptedRunner {
    clock: Arc<ManualClock>,
    script: Mutex<VecDeque<(&'static str, Value)>>,
    last: (&'static str, Value),
    polled_at: Mutex<Vec<i64>>,
}

impl ScriptedRunner {
    fn new(clock: &Arc<ManualClock>, script: Vec<(&'static str, Value)>) -> Self {
        let last = script
            .last()
            .cloned()
            .unwrap_or(("RUNNING", Value::Null));
        Self {
            clock: clock.clone(),
            script: Mutex::new(script.into_iter().collect()),
            last,
            polled_at: Mutex::new(Vec::new()),
        }
    }

    fn polls(&self) -> Vec<i64> {
        self.polled_at.lock().clone()
    }
}

impl RemoteJobClient for ScriptedRunner {
    fn start(&self, _: &str, _: &Value) -> CareResult<InlineStr> {
        Ok("instance-1".into())
    }

    fn status(&self, _: &str) -> CareResult<RemoteJobStatus> {
        self.polled_at.lock().push(self.clock.now_millis());
        let (status, payload) = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.last.clone());
        Ok(RemoteJobStatus::new(status, payload))
    }
}

fn authorization_fields() -> ResultExtractor {
    ResultExtractor::new(vec![
        ResultField::text("status_autorizacao", &["status_autorizacao", "statusAutorizacao"]),
        ResultField::identifier(
            "nr_guia_requisicao",
            &["nr_guia_requisicao", "nrGuiaRequisicao", "guia_requisicao"],
        ),
        ResultField::text(
            "numero_autorizacao",
            &["numero_autorizacao", "numeroAutorizacao", "nr_autorizacao"],
        ),
    ])
}

fn properties(poll_interval_ms: i64, timeout_ms: i64) -> JobPollerProperties {
    JobPollerProperties {
        poll_interval_ms,
        timeout_ms,
        lease_extension_ms: 0,
    }
}

#[test]
fn never_terminal_job_times_out_at_the_budget() {
    init_logger();
    let clock = ManualClock::shared(0);
    let runner = ScriptedRunner::new(&clock, vec![("PROCESSING", json!({}))]);
    let poller = JobPoller::new(&runner, clock.clone(), properties(5_000, 30_000), authorization_fields());

    let mut job = poller.start("autorizacao", json!({})).unwrap();
    let outcome = poller.wait(&mut job, None);

    assert_eq!(outcome.state, JobState::TimedOut);
    assert!(outcome.elapsed_ms >= 30_000);
    // no poll at or after the budget
    assert!(runner.polls().iter().all(|x| *x < 30_000));
    assert_eq!(runner.polls().len(), 6);
    assert!(outcome.result.values().all(|x| x.is_none()));
}

#[test]
fn success_on_third_poll_ends_the_wait() {
    init_logger();
    let clock = ManualClock::shared(0);
    let runner = ScriptedRunner::new(
        &clock,
        vec![
            ("RUNNING", json!({})),
            ("RUNNING", json!({})),
            (
                "DONE",
                json!({"outputs": {"statusAutorizacao": "Autorizado", "nrGuiaRequisicao": 95687.0}}),
            ),
            ("FAILED", json!({})),
        ],
    );
    let poller = JobPoller::new(&runner, clock.clone(), properties(5_000, 30_000), authorization_fields());

    let mut job = poller.start("autorizacao", json!({})).unwrap();
    let outcome = poller.wait(&mut job, None);

    assert_eq!(outcome.state, JobState::Succeeded);
    assert_eq!(outcome.polls, 3);
    assert_eq!(runner.polls(), vec![0, 5_000, 10_000]);
    assert!(outcome.elapsed_ms >= 10_000 && outcome.elapsed_ms <= 15_000);
    assert_eq!(outcome.result["status_autorizacao"], Some(Object::from("Autorizado")));
    assert_eq!(outcome.result["nr_guia_requisicao"], Some(Object::from("95687")));
    assert_eq!(outcome.result["numero_autorizacao"], None);
    assert_eq!(job.state(), JobState::Succeeded);
}

#[test]
fn unknown_status_keeps_polling() {
    init_logger();
    let clock = ManualClock::shared(0);
    let runner = ScriptedRunner::new(
        &clock,
        vec![
            ("AUTORIZADO", json!({})),
            ("autorizado", json!({})),
            ("CONCLUIDO", json!({"variables": [{"name": "numero_autorizacao", "value": "A-77"}]})),
        ],
    );
    let poller = JobPoller::new(&runner, clock.clone(), properties(1_000, 30_000), authorization_fields());

    assert_eq!(StatusMapper::map("AUTORIZADO"), StatusMapper::map("autorizado"));
    let mut job = poller.start("autorizacao", json!({})).unwrap();
    let outcome = poller.wait(&mut job, None);
    assert_eq!(outcome.state, JobState::Succeeded);
    assert_eq!(outcome.polls, 3);
    assert_eq!(outcome.result["numero_autorizacao"], Some(Object::from("A-77")));
}

#[test]
fn lease_is_kept_alive_while_waiting() {
    init_logger();
    let clock = ManualClock::shared(0);
    let broker = Arc::new(InMemoryBroker::new(clock.clone()));
    let client = TaskLeaseClient::new(broker.clone(), clock.clone(), WorkerProperties::default());
    broker.publish("ibm-rpa-autorizacao", HashMap::new());
    let mut task = client
        .poll(&["ibm-rpa-autorizacao"], 1, 20_000)
        .unwrap()
        .remove(0);

    // the job outlives the initial lease three times over
    let mut script = vec![("RUNNING", json!({})); 12];
    script.push(("DONE", json!({})));
    let runner = ScriptedRunner::new(&clock, script);
    let poller = JobPoller::new(
        &runner,
        clock.clone(),
        properties(5_000, 300_000),
        authorization_fields(),
    );
    let mut job = poller.start("autorizacao", json!({})).unwrap();
    let outcome = {
        let mut keeper = LeaseKeeper::new(&client, &mut task, 20_000);
        poller.wait(&mut job, Some(&mut keeper))
    };

    assert_eq!(outcome.state, JobState::Succeeded);
    assert_eq!(clock.now_millis(), 60_000);
    assert!(task.lease_expiry > clock.now_millis());
    client.complete(&task, &HashMap::new()).unwrap();
}

#[test]
fn lease_outlasts_a_poll_interval_longer_than_half_the_extension() {
    init_logger();
    let clock = ManualClock::shared(0);
    let broker = Arc::new(InMemoryBroker::new(clock.clone()));
    let client = TaskLeaseClient::new(broker.clone(), clock.clone(), WorkerProperties::default());
    let id = broker.publish("ibm-rpa-autorizacao", HashMap::new());
    let mut task = client
        .poll(&["ibm-rpa-autorizacao"], 1, 30_000)
        .unwrap()
        .remove(0);

    let runner = ScriptedRunner::new(
        &clock,
        vec![
            ("RUNNING", json!({})),
            ("RUNNING", json!({})),
            ("RUNNING", json!({})),
            ("DONE", json!({})),
        ],
    );
    let poller = JobPoller::new(
        &runner,
        clock.clone(),
        JobPollerProperties {
            poll_interval_ms: 15_000,
            timeout_ms: 300_000,
            lease_extension_ms: 20_000,
        },
        authorization_fields(),
    );
    let mut job = poller.start("autorizacao", json!({})).unwrap();
    let (outcome, lost) = {
        let mut keeper = LeaseKeeper::new(&client, &mut task, 20_000);
        let outcome = poller.wait(&mut job, Some(&mut keeper));
        (outcome, keeper.is_lost())
    };

    assert_eq!(outcome.state, JobState::Succeeded);
    assert!(!lost);
    assert_eq!(clock.now_millis(), 45_000);
    assert!(task.lease_expiry > clock.now_millis());
    client.complete(&task, &HashMap::new()).unwrap();
    assert!(broker.completed_variables(&id).is_some());
}
