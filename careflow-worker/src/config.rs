use std::path::Path;

use careflow_common::prelude::*;
use careflow_core::{BrokerProperties, JobPollerProperties, WorkerProperties};
use serde::Deserialize;

/// Everything the worker fleet needs, loaded once at startup and handed to constructors.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CareflowConfig {
    pub broker: BrokerProperties,
    pub workers: WorkersConfig,
    pub job_poller: JobPollerProperties,
    pub rpa: RpaProperties,
    pub patient_api: PatientApiProperties,
    pub risk: RiskProperties,
    pub messaging: MessagingProperties,
    pub database: DatabaseProperties,
}

/// Claim settings per worker of the fleet.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub risk: WorkerProperties,
    pub rpa: WorkerProperties,
    pub patient: WorkerProperties,
    pub classification: WorkerProperties,
    pub messaging: WorkerProperties,
    pub oracle: WorkerProperties,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            risk: WorkerProperties {
                worker_id: "worker-ml-estratificacao".to_string(),
                lock_duration_ms: 600_000,
                ..WorkerProperties::default()
            },
            // robots may run for minutes
            rpa: WorkerProperties {
                worker_id: "ibm-rpa-worker-001".to_string(),
                lock_duration_ms: 600_000,
                retries: 2,
                retry_timeout_ms: 30_000,
                ..WorkerProperties::default()
            },
            patient: WorkerProperties {
                worker_id: "api-consulta-paciente-worker".to_string(),
                ..WorkerProperties::default()
            },
            classification: WorkerProperties {
                worker_id: "worker-ia-classificacao".to_string(),
                ..WorkerProperties::default()
            },
            messaging: WorkerProperties {
                worker_id: "worker-whatsapp-comunicacao".to_string(),
                ..WorkerProperties::default()
            },
            oracle: WorkerProperties {
                worker_id: "oracle-autorizacao-worker".to_string(),
                ..WorkerProperties::default()
            },
        }
    }
}

/// IBM RPA process-management API.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RpaProperties {
    pub api_url: String,
    pub workspace_id: String,
    pub tenant_id: String,
    pub username: String,
    pub password: String,
    /// Robot process to start. Empty means the RPA worker is not configured.
    pub process_id: String,
    pub request_timeout_ms: u64,
}

impl Default for RpaProperties {
    fn default() -> Self {
        Self {
            api_url: "https://br1api.rpa.ibm.com".to_string(),
            workspace_id: String::new(),
            tenant_id: String::new(),
            username: String::new(),
            password: String::new(),
            process_id: String::new(),
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PatientApiProperties {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for PatientApiProperties {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/autorizacao/cirurgia".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// Score cut-offs of the risk levels, highest first: COMPLEXO, ALTO, MODERADO, else BAIXO.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RiskProperties {
    pub complex_threshold: f64,
    pub high_threshold: f64,
    pub medium_threshold: f64,
    pub model_version: String,
}

impl Default for RiskProperties {
    fn default() -> Self {
        Self {
            complex_threshold: 0.85,
            high_threshold: 0.70,
            medium_threshold: 0.40,
            model_version: "1.0.0".to_string(),
        }
    }
}

/// WhatsApp Business messaging API and the approved templates used per message kind.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MessagingProperties {
    pub api_url: String,
    pub api_token: String,
    pub phone_number_id: String,
    pub language: String,
    pub request_timeout_ms: u64,
    pub template_welcome: String,
    pub template_reminder: String,
    pub template_exam_result: String,
    pub template_authorization: String,
}

impl Default for MessagingProperties {
    fn default() -> Self {
        Self {
            api_url: "https://graph.facebook.com/v19.0".to_string(),
            api_token: String::new(),
            phone_number_id: String::new(),
            language: "pt_BR".to_string(),
            request_timeout_ms: 30_000,
            template_welcome: "boas_vindas_beneficiario".to_string(),
            template_reminder: "lembrete_consulta".to_string(),
            template_exam_result: "resultado_exame_disponivel".to_string(),
            template_authorization: "status_autorizacao".to_string(),
        }
    }
}

/// Hospital database, reached through its REST data service. Procedures are addressed as
/// `{base_url}/{schema}/{procedure}/`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseProperties {
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Recorded as the author of every change made through procedures.
    pub application_user: String,
    pub request_timeout_ms: u64,
}

impl Default for DatabaseProperties {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/ords".to_string(),
            username: String::new(),
            password: String::new(),
            application_user: "automacaotasy".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

impl CareflowConfig {
    /// Reads a TOML file; sections and fields left out keep their defaults.
    pub fn from_file(path: &Path) -> CareResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ErrorCode::ConfigurationException(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> CareResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn validate(&self) -> CareResult<()> {
        for worker in [
            &self.workers.risk,
            &self.workers.rpa,
            &self.workers.patient,
            &self.workers.classification,
            &self.workers.messaging,
            &self.workers.oracle,
        ] {
            worker.validate()?;
        }
        self.job_poller.validate()?;

        let risk = &self.risk;
        if !(0.0 <= risk.medium_threshold
            && risk.medium_threshold <= risk.high_threshold
            && risk.high_threshold <= risk.complex_threshold
            && risk.complex_threshold <= 1.0)
        {
            return fmt_err!(
                ConfigurationException,
                "risk thresholds must satisfy 0 <= medium <= high <= complex <= 1, got {} {} {}",
                risk.medium_threshold,
                risk.high_threshold,
                risk.complex_threshold
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = CareflowConfig::from_toml(
            r#"
            [broker]
            base_url = "http://camunda:8080/engine-rest"

            [rpa]
            process_id = "0f3c"

            [risk]
            high_threshold = 0.75
            "#,
        )
        .unwrap();
        assert_eq!(config.broker.base_url, "http://camunda:8080/engine-rest");
        assert_eq!(config.broker.request_timeout_ms, 30_000);
        assert_eq!(config.rpa.process_id, "0f3c");
        assert_eq!(config.rpa.api_url, "https://br1api.rpa.ibm.com");
        assert_eq!(config.risk.high_threshold, 0.75);
        assert_eq!(config.risk.medium_threshold, 0.40);
        assert_eq!(config.workers.rpa.worker_id, "ibm-rpa-worker-001");
        assert_eq!(config.workers.oracle.worker_id, "oracle-autorizacao-worker");
        assert_eq!(config.messaging.language, "pt_BR");
        assert_eq!(config.database.application_user, "automacaotasy");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let mut config = CareflowConfig::default();
        config.risk.medium_threshold = 0.8;
        let e = config.validate().unwrap_err();
        assert_eq!(e.code(), ErrorCode::configuration_exception_code());
    }

    #[test]
    fn malformed_toml_is_a_configuration_error() {
        let e = CareflowConfig::from_toml("[broker\nbase_url = 1").unwrap_err();
        assert_eq!(e.code(), ErrorCode::configuration_exception_code());
    }
}
