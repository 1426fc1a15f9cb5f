use std::time::Duration;

use careflow_common::prelude::*;
use reqwest::blocking::Client;
use serde_json::Value;

use crate::config::PatientApiProperties;

/// A patient record as the registry returns it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Patient {
    pub id: Option<InlineStr>,
    pub nome: Option<InlineStr>,
    pub cpf: Option<InlineStr>,
    pub data_nascimento: Option<InlineStr>,
    pub idade: Option<InlineStr>,
    pub sexo: Option<InlineStr>,
    pub telefone: Option<InlineStr>,
}

pub trait PatientLookup: Send + Sync {
    /// `Ok(None)` when the registry has no patient with this CPF.
    fn find_by_cpf(&self, cpf: &str) -> CareResult<Option<Patient>>;
}

/// Patient registry over HTTP: `GET {base}/paciente?cpf=...`.
pub struct HttpPatientLookup {
    client: Client,
    properties: PatientApiProperties,
}

impl HttpPatientLookup {
    pub fn new(properties: PatientApiProperties) -> CareResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(properties.timeout_ms))
            .build()?;
        Ok(Self { client, properties })
    }

    /// Field as text; the registry sends codes both as numbers and as strings.
    fn text(record: &Value, key: &str) -> Option<InlineStr> {
        match record.get(key) {
            Some(Value::String(v)) => Some(v.trim().into()),
            Some(Value::Number(v)) => Some(v.to_string().into()),
            _ => None,
        }
    }

    fn parse(response: &Value) -> Option<Patient> {
        if !response.get("success").and_then(|x| x.as_bool()).unwrap_or(false) {
            return None;
        }
        let record = response.get("data")?.as_array()?.first()?;
        Some(Patient {
            id: Self::text(record, "CD_PESSOA_FISICA"),
            nome: Self::text(record, "NM_PESSOA_FISICA"),
            cpf: Self::text(record, "NR_CPF"),
            data_nascimento: Self::text(record, "DT_NASCIMENTO"),
            idade: Self::text(record, "QT_IDADE"),
            sexo: Self::text(record, "DESC_SEXO"),
            telefone: Self::text(record, "TELEFONE"),
        })
    }
}

impl PatientLookup for HttpPatientLookup {
    fn find_by_cpf(&self, cpf: &str) -> CareResult<Option<Patient>> {
        let url = format!("{}/paciente", self.properties.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .query(&[("cpf", cpf)])
            .send()?
            .error_for_status()?;
        let body: Value = response.json()?;
        Ok(Self::parse(&body))
    }
}
