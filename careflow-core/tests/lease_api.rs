use std::sync::Arc;

use careflow_common::prelude::*;
use careflow_core::{InMemoryBroker, ManualClock, TaskLeaseClient, WorkerProperties};

fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}

fn setup() -> (Arc<ManualClock>, Arc<InMemoryBroker>, TaskLeaseClient) {
    init_logger();
    let clock = ManualClock::shared(1_700_000_000_000);
    let broker = Arc::new(InMemoryBroker::new(clock.clone()));
    let client = TaskLeaseClient::new(
        broker.clone(),
        clock.clone(),
        WorkerProperties {
            worker_id: "lease-test".to_string(),
            ..WorkerProperties::default()
        },
    );
    (clock, broker, client)
}

#[test]
fn complete_after_lease_expiry_is_rejected() {
    let (clock, broker, client) = setup();
    broker.publish("ml-estratificar-risco", HashMap::new());
    let tasks = client.poll(&["ml-estratificar-risco"], 1, 30_000).unwrap();
    assert_eq!(tasks.len(), 1);

    clock.advance(30_001);
    let e = client.complete(&tasks[0], &HashMap::new()).unwrap_err();
    assert!(e.is_lease_expired());
}

#[test]
fn completed_task_cannot_be_reported_again() {
    let (_, broker, client) = setup();
    let mut variables = HashMap::new();
    variables.insert(InlineStr::from("idade"), Object::Int(42));
    let id = broker.publish("ml-estratificar-risco", variables);

    let task = client
        .poll(&["ml-estratificar-risco"], 1, 30_000)
        .unwrap()
        .remove(0);
    assert_eq!(task.id, id);
    assert_eq!(task.variable("idade"), Some(&Object::Int(42)));

    let mut result = HashMap::new();
    result.insert(InlineStr::from("nivel_risco"), Object::from("BAIXO"));
    client.complete(&task, &result).unwrap();
    assert!(client.complete(&task, &result).is_err());
    assert!(client.fail(&task, "late failure", 1, 0).is_err());
    assert_eq!(
        broker.completed_variables(&id).unwrap()["nivel_risco"],
        Object::from("BAIXO")
    );
}

#[test]
fn business_failure_counts_down_to_an_incident() {
    let (clock, broker, client) = setup();
    let id = broker.publish("api-consulta-paciente", HashMap::new());

    // first failure hands out the configured budget, later ones count it down
    let mut budgets = Vec::new();
    loop {
        let tasks = client.poll(&["api-consulta-paciente"], 1, 30_000).unwrap();
        let task = match tasks.into_iter().next() {
            Some(task) => task,
            None => break,
        };
        let retries = client.next_retries(&task);
        budgets.push(retries);
        client.fail(&task, "patient api unavailable", retries, 1_000).unwrap();
        clock.advance(1_000);
    }

    assert_eq!(budgets, vec![3, 2, 1, 0]);
    let (message, _) = broker.incident(&id).unwrap();
    assert_eq!(message.as_str(), "patient api unavailable");
}

#[test]
fn zero_retries_is_an_immediate_incident() {
    let (_, broker, client) = setup();
    let id = broker.publish("ibm-rpa-autorizacao", HashMap::new());
    let task = client
        .poll(&["ibm-rpa-autorizacao"], 1, 30_000)
        .unwrap()
        .remove(0);
    client.fail(&task, "not configured", 0, 5_000).unwrap();
    assert!(broker.incident(&id).is_some());
    assert_eq!(broker.pending_count("ibm-rpa-autorizacao"), 0);
}
