mod demand_classifier;
mod messaging;
mod patient_api;
mod procedures;
mod risk_model;
mod rpa_client;

pub use demand_classifier::{DemandClassification, DemandClassifier, KeywordClassifier};
pub use messaging::{
    international_phone, MessageGateway, MessageReceipt, MessageSender, WhatsAppGateway,
};
pub use patient_api::{HttpPatientLookup, Patient, PatientLookup};
pub use procedures::{ProcedureGateway, RestProcedureGateway, StoredProcedure};
pub use risk_model::{RiskFeatures, RiskLevel, RiskModel, RuleBasedRiskModel};
pub use rpa_client::RpaSession;
