mod cli;
mod config;
mod fleet;
mod handlers;
mod services;

pub use cli::Cli;
pub use config::{
    CareflowConfig, DatabaseProperties, MessagingProperties, PatientApiProperties,
    RiskProperties, RpaProperties, WorkersConfig,
};
pub use fleet::{Fleet, WorkerKind};
pub use handlers::{
    AuthorizationRecordHandler, DemandClassificationHandler, MessageKind, MessagingHandler,
    PatientLookupHandler, RiskStratificationHandler, RpaAuthorizationHandler,
};
pub use services::{
    international_phone, DemandClassification, DemandClassifier, HttpPatientLookup,
    KeywordClassifier, MessageGateway, MessageReceipt, MessageSender, Patient, PatientLookup,
    ProcedureGateway, RestProcedureGateway, RiskFeatures, RiskLevel, RiskModel, RpaSession,
    RuleBasedRiskModel, StoredProcedure, WhatsAppGateway,
};
