use std::path::PathBuf;
use std::str::FromStr;

use careflow_common::prelude::*;
use clap::Parser;

use crate::config::CareflowConfig;
use crate::fleet::WorkerKind;

/// External-task workers of the care journeys.
///
/// Settings come from the TOML file first; every option given here or through its environment
/// variable replaces the file value.
#[derive(Debug, Parser)]
#[clap(name = "careflow-worker", version)]
pub struct Cli {
    /// TOML configuration file
    #[clap(short, long, env = "CAREFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Worker to run (risk, rpa, patient, classification, messaging, oracle); repeatable
    #[clap(short, long = "worker", value_parser = parse_worker_kind)]
    pub workers: Vec<WorkerKind>,

    /// Run every worker
    #[clap(long)]
    pub all: bool,

    #[clap(long, env = "CAMUNDA_URL")]
    pub camunda_url: Option<String>,
    #[clap(long, env = "CAMUNDA_USERNAME")]
    pub camunda_username: Option<String>,
    #[clap(long, env = "CAMUNDA_PASSWORD", hide_env_values = true)]
    pub camunda_password: Option<String>,

    #[clap(long, env = "IBM_RPA_API_URL")]
    pub rpa_api_url: Option<String>,
    #[clap(long, env = "IBM_RPA_WORKSPACE_ID")]
    pub rpa_workspace_id: Option<String>,
    #[clap(long, env = "IBM_RPA_TENANT_ID")]
    pub rpa_tenant_id: Option<String>,
    #[clap(long, env = "IBM_RPA_USERNAME")]
    pub rpa_username: Option<String>,
    #[clap(long, env = "IBM_RPA_PASSWORD", hide_env_values = true)]
    pub rpa_password: Option<String>,
    #[clap(long, env = "IBM_RPA_PROCESS_ID")]
    pub rpa_process_id: Option<String>,
    /// Time budget of one robot run, in seconds
    #[clap(long, env = "IBM_RPA_TIMEOUT_SECONDS", value_parser)]
    pub rpa_timeout_seconds: Option<i64>,
    /// Pause between robot status queries, in seconds
    #[clap(long, env = "IBM_RPA_POLL_INTERVAL_SECONDS", value_parser)]
    pub rpa_poll_interval_seconds: Option<i64>,

    #[clap(long, env = "API_PACIENTE_URL")]
    pub patient_api_url: Option<String>,

    #[clap(long, env = "ML_THRESHOLD_ALTO_RISCO", value_parser)]
    pub high_risk_threshold: Option<f64>,
    #[clap(long, env = "ML_THRESHOLD_MEDIO_RISCO", value_parser)]
    pub medium_risk_threshold: Option<f64>,

    #[clap(long, env = "WHATSAPP_API_URL")]
    pub whatsapp_api_url: Option<String>,
    #[clap(long, env = "WHATSAPP_API_TOKEN", hide_env_values = true)]
    pub whatsapp_api_token: Option<String>,
    #[clap(long, env = "WHATSAPP_PHONE_NUMBER_ID")]
    pub whatsapp_phone_number_id: Option<String>,

    /// REST data service of the hospital database
    #[clap(long, env = "ORACLE_REST_URL")]
    pub oracle_rest_url: Option<String>,
    #[clap(long, env = "ORACLE_USER")]
    pub oracle_user: Option<String>,
    #[clap(long, env = "ORACLE_PASSWORD", hide_env_values = true)]
    pub oracle_password: Option<String>,
}

fn parse_worker_kind(name: &str) -> Result<WorkerKind, String> {
    WorkerKind::from_str(name).map_err(|_| {
        format!(
            "unknown worker '{}', expected one of {:?}",
            name,
            WorkerKind::all().iter().map(|x| x.to_string()).collect::<Vec<_>>()
        )
    })
}

impl Cli {
    /// File settings with the command line applied on top, validated.
    pub fn load_config(&self) -> CareResult<CareflowConfig> {
        let mut config = match &self.config {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                CareflowConfig::from_file(path)?
            }
            None => CareflowConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Workers to start, in the order given; everything when none is named.
    pub fn selected_workers(&self) -> Vec<WorkerKind> {
        if self.all || self.workers.is_empty() {
            return WorkerKind::all();
        }
        let mut selected = Vec::new();
        for kind in &self.workers {
            if !selected.contains(kind) {
                selected.push(*kind);
            }
        }
        selected
    }

    fn apply(&self, config: &mut CareflowConfig) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut config.broker.base_url, &self.camunda_url);
        set(&mut config.broker.username, &self.camunda_username);
        set(&mut config.broker.password, &self.camunda_password);

        set(&mut config.rpa.api_url, &self.rpa_api_url);
        set(&mut config.rpa.workspace_id, &self.rpa_workspace_id);
        set(&mut config.rpa.tenant_id, &self.rpa_tenant_id);
        set(&mut config.rpa.username, &self.rpa_username);
        set(&mut config.rpa.password, &self.rpa_password);
        set(&mut config.rpa.process_id, &self.rpa_process_id);
        if let Some(seconds) = self.rpa_timeout_seconds {
            config.job_poller.timeout_ms = seconds * 1000;
        }
        if let Some(seconds) = self.rpa_poll_interval_seconds {
            config.job_poller.poll_interval_ms = seconds * 1000;
        }

        set(&mut config.patient_api.base_url, &self.patient_api_url);

        set(&mut config.risk.high_threshold, &self.high_risk_threshold);
        set(&mut config.risk.medium_threshold, &self.medium_risk_threshold);

        set(&mut config.messaging.api_url, &self.whatsapp_api_url);
        set(&mut config.messaging.api_token, &self.whatsapp_api_token);
        set(&mut config.messaging.phone_number_id, &self.whatsapp_phone_number_id);

        set(&mut config.database.base_url, &self.oracle_rest_url);
        set(&mut config.database.username, &self.oracle_user);
        set(&mut config.database.password, &self.oracle_password);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workers_are_selected_by_name() {
        let cli = Cli::try_parse_from([
            "careflow-worker",
            "--worker",
            "rpa",
            "-w",
            "risk",
            "--worker",
            "rpa",
        ])
        .unwrap();
        assert_eq!(cli.selected_workers(), vec![WorkerKind::Rpa, WorkerKind::Risk]);
    }

    #[test]
    fn all_wins_over_a_selection() {
        let cli = Cli::try_parse_from(["careflow-worker", "-w", "patient", "--all"]).unwrap();
        assert_eq!(cli.selected_workers(), WorkerKind::all());
    }

    #[test]
    fn unknown_worker_is_rejected() {
        assert!(Cli::try_parse_from(["careflow-worker", "--worker", "tasy"]).is_err());
    }

    #[test]
    fn options_override_defaults() {
        let cli = Cli::try_parse_from([
            "careflow-worker",
            "--camunda-url",
            "http://camunda:8080/engine-rest",
            "--rpa-process-id",
            "0f3c",
            "--rpa-timeout-seconds",
            "120",
            "--rpa-poll-interval-seconds",
            "15",
            "--high-risk-threshold",
            "0.75",
            "--oracle-rest-url",
            "http://tasy:8080/ords",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.broker.base_url, "http://camunda:8080/engine-rest");
        assert_eq!(config.rpa.process_id, "0f3c");
        assert_eq!(config.job_poller.timeout_ms, 120_000);
        assert_eq!(config.job_poller.poll_interval_ms, 15_000);
        assert_eq!(config.risk.high_threshold, 0.75);
        assert_eq!(config.risk.medium_threshold, 0.40);
        assert_eq!(config.database.base_url, "http://tasy:8080/ords");
    }

    #[test]
    fn overrides_are_validated() {
        let cli = Cli::try_parse_from(["careflow-worker", "--medium-risk-threshold", "0.9"]).unwrap();
        let e = cli.load_config().unwrap_err();
        assert_eq!(e.code(), ErrorCode::configuration_exception_code());
    }
}
