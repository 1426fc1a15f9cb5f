use std::sync::Arc;

use careflow_common::prelude::*;
use careflow_core::{
    InMemoryBroker, ManualClock, ScopedResource, ShutdownSignal, TaskLeaseClient, WorkerLoop,
    WorkerProperties,
};
use careflow_worker::{
    CareflowConfig, Fleet, MessageGateway, MessageKind, MessageReceipt, MessageSender,
    MessagingHandler, MessagingProperties, WorkerKind,
};
use mockito::{Matcher, Server};
use serde_json::json;

fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}

fn variables(pairs: &[(&str, Object)]) -> HashMap<InlineStr, Object> {
    pairs
        .iter()
        .map(|(k, v)| (InlineStr::from(*k), v.clone()))
        .collect()
}

/// What the recording sender was asked to send: phone, template or text, parameters.
type Sent = (String, String, Vec<String>);

#[derive(Default)]
struct Recorder {
    connected: AtomicUsize,
    released: AtomicUsize,
    sent: Mutex<Vec<Sent>>,
    refuse: bool,
}

struct RecordingSession {
    recorder: Arc<Recorder>,
}

impl ScopedResource for RecordingSession {
    fn release(&mut self) {
        self.recorder.released.fetch_add(1, AtomicOrdering::SeqCst);
    }
}

impl RecordingSession {
    fn record(&self, phone: &str, body: &str, parameters: &[InlineStr]) -> CareResult<MessageReceipt> {
        if self.recorder.refuse {
            return str_err!(RemoteJobException, "messaging api returned 400: invalid recipient");
        }
        let mut sent = self.recorder.sent.lock();
        sent.push((
            phone.to_string(),
            body.to_string(),
            parameters.iter().map(|x| x.to_string()).collect(),
        ));
        Ok(MessageReceipt {
            message_id: Some(format!("wamid.{}", sent.len()).into()),
            phone: phone.into(),
        })
    }
}

impl MessageSender for RecordingSession {
    fn send_template(
        &mut self,
        phone: &str,
        template: &str,
        parameters: &[InlineStr],
    ) -> CareResult<MessageReceipt> {
        self.record(phone, template, parameters)
    }

    fn send_text(&mut self, phone: &str, text: &str) -> CareResult<MessageReceipt> {
        self.record(phone, text, &[])
    }
}

struct RecordingGateway(Arc<Recorder>);

impl MessageGateway for RecordingGateway {
    fn connect(&self) -> CareResult<Box<dyn MessageSender>> {
        self.0.connected.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(Box::new(RecordingSession {
            recorder: self.0.clone(),
        }))
    }
}

fn worker(
    kind: MessageKind,
    recorder: &Arc<Recorder>,
    broker: &Arc<InMemoryBroker>,
    clock: &Arc<ManualClock>,
) -> WorkerLoop {
    let client = TaskLeaseClient::new(broker.clone(), clock.clone(), WorkerProperties::default());
    let mut worker = WorkerLoop::new(client, ShutdownSignal::new());
    worker
        .subscribe(Arc::new(MessagingHandler::new(
            kind.topic(),
            kind,
            Arc::new(RecordingGateway(recorder.clone())),
            MessagingProperties::default(),
        )))
        .unwrap();
    worker
}

#[test]
fn welcome_message_uses_the_welcome_template() {
    init_logger();
    let clock = ManualClock::shared(1_700_000_000_000);
    let broker = Arc::new(InMemoryBroker::new(clock.clone()));
    let recorder = Arc::new(Recorder::default());
    let worker = worker(MessageKind::Welcome, &recorder, &broker, &clock);
    let id = broker.publish(
        MessageKind::Welcome.topic(),
        variables(&[
            ("beneficiario_nome", Object::from("Maria")),
            ("beneficiario_telefone", Object::from("(17) 98187-2857")),
        ]),
    );

    assert_eq!(worker.run_once(), 1);
    let completed = broker.completed_variables(&id).unwrap();
    assert_eq!(completed["whatsapp_status"], Object::from("ENVIADO"));
    assert_eq!(completed["whatsapp_message_id"], Object::from("wamid.1"));
    assert_eq!(
        completed["whatsapp_data_envio"],
        Object::from("2023-11-14T22:13:20.000Z")
    );
    assert_eq!(
        recorder.sent.lock().clone(),
        vec![(
            "(17) 98187-2857".to_string(),
            "boas_vindas_beneficiario".to_string(),
            vec!["Maria".to_string()]
        )]
    );
    assert_eq!(recorder.connected.load(AtomicOrdering::SeqCst), 1);
    assert_eq!(recorder.released.load(AtomicOrdering::SeqCst), 1);
}

#[test]
fn proactive_message_follows_its_trigger() {
    init_logger();
    let clock = ManualClock::shared(0);
    let broker = Arc::new(InMemoryBroker::new(clock.clone()));
    let recorder = Arc::new(Recorder::default());
    let worker = worker(MessageKind::Proactive, &recorder, &broker, &clock);
    let id = broker.publish(
        MessageKind::Proactive.topic(),
        variables(&[
            ("beneficiario_telefone", Object::from("17981872857")),
            ("tipo_gatilho", Object::from("RESULTADO_DISPONIVEL")),
            ("dados_gatilho", Object::Json(json!({"exame": "Hemograma"}))),
        ]),
    );

    assert_eq!(worker.run_once(), 1);
    let completed = broker.completed_variables(&id).unwrap();
    assert_eq!(completed["tipo_comunicacao"], Object::from("RESULTADO_DISPONIVEL"));
    let sent = recorder.sent.lock().clone();
    assert_eq!(sent[0].1, "resultado_exame_disponivel");
    assert_eq!(sent[0].2, vec!["Beneficiario".to_string(), "Hemograma".to_string()]);
}

#[test]
fn status_update_is_free_text() {
    init_logger();
    let clock = ManualClock::shared(0);
    let broker = Arc::new(InMemoryBroker::new(clock.clone()));
    let recorder = Arc::new(Recorder::default());
    let worker = worker(MessageKind::StatusUpdate, &recorder, &broker, &clock);
    broker.publish(
        MessageKind::StatusUpdate.topic(),
        variables(&[
            ("beneficiario_nome", Object::from("Joao")),
            ("beneficiario_telefone", Object::from("17981872857")),
            ("mensagem_status", Object::from("Sua guia foi autorizada.")),
            ("etapa_atual", Object::from("Agendamento")),
        ]),
    );

    assert_eq!(worker.run_once(), 1);
    let sent = recorder.sent.lock().clone();
    assert_eq!(
        sent[0].1,
        "Ola Joao! Sua guia foi autorizada.\n\nEtapa atual: Agendamento"
    );
    assert!(sent[0].2.is_empty());
}

#[test]
fn refused_message_is_a_result_and_the_session_is_released() {
    init_logger();
    let clock = ManualClock::shared(0);
    let broker = Arc::new(InMemoryBroker::new(clock.clone()));
    let recorder = Arc::new(Recorder {
        refuse: true,
        ..Recorder::default()
    });
    let worker = worker(MessageKind::Welcome, &recorder, &broker, &clock);
    let id = broker.publish(
        MessageKind::Welcome.topic(),
        variables(&[("beneficiario_telefone", Object::from("17981872857"))]),
    );

    assert_eq!(worker.run_once(), 1);
    let completed = broker.completed_variables(&id).unwrap();
    assert_eq!(completed["whatsapp_status"], Object::from("ERRO"));
    assert_eq!(completed["whatsapp_message_id"], Object::from(""));
    assert!(completed.contains_key("whatsapp_mensagem_erro"));
    assert_eq!(recorder.released.load(AtomicOrdering::SeqCst), 1);
}

#[test]
fn missing_phone_is_an_incident_without_a_session() {
    init_logger();
    let clock = ManualClock::shared(0);
    let broker = Arc::new(InMemoryBroker::new(clock.clone()));
    let recorder = Arc::new(Recorder::default());
    let worker = worker(MessageKind::Welcome, &recorder, &broker, &clock);
    let id = broker.publish(
        MessageKind::Welcome.topic(),
        variables(&[("beneficiario_nome", Object::from("Maria"))]),
    );

    assert_eq!(worker.run_once(), 1);
    let (message, _) = broker.incident(&id).unwrap();
    assert_eq!(message.as_str(), "beneficiario_telefone is required");
    assert_eq!(recorder.connected.load(AtomicOrdering::SeqCst), 0);
    assert_eq!(recorder.released.load(AtomicOrdering::SeqCst), 0);
}

#[test]
fn fleet_sends_through_the_messaging_api() {
    init_logger();
    let mut server = Server::new();
    let send = server
        .mock("POST", "/phone-1/messages")
        .match_header("authorization", "Bearer wa-token")
        .match_body(Matcher::PartialJson(json!({
            "messaging_product": "whatsapp",
            "to": "5517981872857",
            "type": "template",
            "template": {
                "name": "boas_vindas_beneficiario",
                "language": {"code": "pt_BR"},
                "components": [{"type": "body", "parameters": [{"type": "text", "text": "Maria"}]}]
            }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"messages": [{"id": "wamid.HBgN"}]}).to_string())
        .expect(1)
        .create();

    let mut config = CareflowConfig::default();
    config.messaging.api_url = server.url();
    config.messaging.api_token = "wa-token".to_string();
    config.messaging.phone_number_id = "phone-1".to_string();
    config.messaging.request_timeout_ms = 5_000;

    let clock = ManualClock::shared(0);
    let broker = Arc::new(InMemoryBroker::new(clock.clone()));
    let worker = Fleet::build(
        WorkerKind::Messaging,
        &config,
        broker.clone(),
        clock.clone(),
        ShutdownSignal::new(),
    )
    .unwrap();
    assert_eq!(worker.subscriptions().len(), 3);
    let id = broker.publish(
        MessageKind::Welcome.topic(),
        variables(&[
            ("beneficiario_nome", Object::from("Maria")),
            ("beneficiario_telefone", Object::from("17981872857")),
        ]),
    );

    assert_eq!(worker.run_once(), 1);
    send.assert();
    let completed = broker.completed_variables(&id).unwrap();
    assert_eq!(completed["whatsapp_status"], Object::from("ENVIADO"));
    assert_eq!(completed["whatsapp_message_id"], Object::from("wamid.HBgN"));
}
