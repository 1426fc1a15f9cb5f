use careflow_common::prelude::*;
use careflow_core::{
    ShutdownSignal, SharedClock, TaskBroker, TaskHandler, TaskLeaseClient, WorkerHandle,
    WorkerLoop, WorkerProperties,
};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::config::CareflowConfig;
use crate::handlers::{
    AuthorizationRecordHandler, DemandClassificationHandler, MessageKind, MessagingHandler,
    PatientLookupHandler, RiskStratificationHandler, RpaAuthorizationHandler,
};
use crate::services::{
    HttpPatientLookup, KeywordClassifier, RestProcedureGateway, RuleBasedRiskModel,
    WhatsAppGateway,
};

const MESSAGE_KINDS: [MessageKind; 3] = [
    MessageKind::Welcome,
    MessageKind::Proactive,
    MessageKind::StatusUpdate,
];

/// The workers this binary knows how to run. Each runs one loop; messaging serves one topic
/// per message kind, the others a single topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, AsRefStr, Display, EnumIter, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum WorkerKind {
    Risk,
    Rpa,
    Patient,
    Classification,
    Messaging,
    Oracle,
}

impl WorkerKind {
    pub fn all() -> Vec<WorkerKind> {
        WorkerKind::iter().collect()
    }

    /// The first topic the worker serves.
    pub fn topic(&self) -> &'static str {
        match self {
            WorkerKind::Risk => RiskStratificationHandler::TOPIC,
            WorkerKind::Rpa => RpaAuthorizationHandler::TOPIC,
            WorkerKind::Patient => PatientLookupHandler::TOPIC,
            WorkerKind::Classification => DemandClassificationHandler::TOPIC,
            WorkerKind::Messaging => MESSAGE_KINDS[0].topic(),
            WorkerKind::Oracle => AuthorizationRecordHandler::TOPIC,
        }
    }

    pub fn topics(&self) -> Vec<&'static str> {
        match self {
            WorkerKind::Messaging => MESSAGE_KINDS.iter().map(|x| x.topic()).collect(),
            _ => vec![self.topic()],
        }
    }

    pub fn properties<'a>(&self, config: &'a CareflowConfig) -> &'a WorkerProperties {
        match self {
            WorkerKind::Risk => &config.workers.risk,
            WorkerKind::Rpa => &config.workers.rpa,
            WorkerKind::Patient => &config.workers.patient,
            WorkerKind::Classification => &config.workers.classification,
            WorkerKind::Messaging => &config.workers.messaging,
            WorkerKind::Oracle => &config.workers.oracle,
        }
    }
}

/// Wires handlers to their downstream services and starts their loops.
pub struct Fleet;

impl Fleet {
    pub fn handlers(
        kind: WorkerKind,
        config: &CareflowConfig,
    ) -> CareResult<Vec<Arc<dyn TaskHandler>>> {
        let lock_duration_ms = kind.properties(config).lock_duration_ms;
        let handler: Arc<dyn TaskHandler> = match kind {
            WorkerKind::Risk => Arc::new(RiskStratificationHandler::new(
                kind.topic(),
                lock_duration_ms,
                Arc::new(RuleBasedRiskModel::new(config.risk.model_version.as_str())),
                config.risk.clone(),
            )),
            WorkerKind::Rpa => Arc::new(RpaAuthorizationHandler::new(
                kind.topic(),
                lock_duration_ms,
                config.rpa.clone(),
                config.job_poller.clone(),
            )),
            WorkerKind::Patient => Arc::new(PatientLookupHandler::new(
                kind.topic(),
                Arc::new(HttpPatientLookup::new(config.patient_api.clone())?),
            )),
            WorkerKind::Classification => Arc::new(DemandClassificationHandler::new(
                kind.topic(),
                Arc::new(KeywordClassifier),
            )),
            WorkerKind::Messaging => {
                let gateway = Arc::new(WhatsAppGateway::new(config.messaging.clone())?);
                return Ok(MESSAGE_KINDS
                    .iter()
                    .map(|x| {
                        Arc::new(MessagingHandler::new(
                            x.topic(),
                            *x,
                            gateway.clone(),
                            config.messaging.clone(),
                        )) as Arc<dyn TaskHandler>
                    })
                    .collect());
            }
            WorkerKind::Oracle => Arc::new(AuthorizationRecordHandler::new(
                kind.topic(),
                Arc::new(RestProcedureGateway::new(config.database.clone())?),
                config.database.clone(),
            )),
        };
        Ok(vec![handler])
    }

    pub fn build(
        kind: WorkerKind,
        config: &CareflowConfig,
        broker: Arc<dyn TaskBroker>,
        clock: SharedClock,
        shutdown: ShutdownSignal,
    ) -> CareResult<WorkerLoop> {
        let client = TaskLeaseClient::new(broker, clock, kind.properties(config).clone());
        let mut worker = WorkerLoop::new(client, shutdown);
        for handler in Self::handlers(kind, config)? {
            worker.subscribe(handler)?;
        }
        Ok(worker)
    }

    /// Starts one loop thread per kind. Loops already started keep running if a later one
    /// fails to build; the caller raises `shutdown` to stop them.
    pub fn start(
        kinds: &[WorkerKind],
        config: &CareflowConfig,
        broker: Arc<dyn TaskBroker>,
        clock: SharedClock,
        shutdown: &ShutdownSignal,
    ) -> CareResult<Vec<WorkerHandle>> {
        let mut handles = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let worker = Self::build(*kind, config, broker.clone(), clock.clone(), shutdown.clone())?;
            handles.push(worker.spawn()?);
            info!("Worker {} started on {:?}", kind, kind.topics());
        }
        Ok(handles)
    }
}
