use std::time::Duration;

use careflow_common::prelude::*;
use careflow_core::ScopedResource;
use reqwest::blocking::Client;
use serde_json::{Map, Value};

use crate::config::DatabaseProperties;

/// An open database session that can run stored procedures.
///
/// Every call commits on its own; a failed call leaves nothing behind.
pub trait StoredProcedure: ScopedResource + Send {
    /// Runs `procedure` (`SCHEMA.NAME`) with named arguments.
    fn call(&mut self, procedure: &str, arguments: &[(&str, Object)]) -> CareResult<()>;
}

/// Opens database sessions, one per handler invocation.
pub trait ProcedureGateway: Send + Sync {
    fn connect(&self) -> CareResult<Box<dyn StoredProcedure>>;
}

/// Stored procedures over the database's REST data service.
pub struct RestProcedureGateway {
    client: Client,
    properties: DatabaseProperties,
}

impl RestProcedureGateway {
    pub fn new(properties: DatabaseProperties) -> CareResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(properties.request_timeout_ms))
            .build()?;
        Ok(Self { client, properties })
    }
}

impl ProcedureGateway for RestProcedureGateway {
    fn connect(&self) -> CareResult<Box<dyn StoredProcedure>> {
        Ok(Box::new(RestProcedureSession {
            client: Some(self.client.clone()),
            properties: self.properties.clone(),
        }))
    }
}

pub struct RestProcedureSession {
    client: Option<Client>,
    properties: DatabaseProperties,
}

impl RestProcedureSession {
    /// `SCHEMA.NAME` as the service path `schema/name/`.
    fn path(procedure: &str) -> CareResult<String> {
        match procedure.split_once('.') {
            Some((schema, name)) if !schema.is_empty() && !name.is_empty() => Ok(format!(
                "{}/{}/",
                schema.to_lowercase(),
                name.to_lowercase()
            )),
            _ => fmt_err!(
                IllegalArgument,
                "procedure {} is not qualified with its schema",
                procedure
            ),
        }
    }

    fn body(arguments: &[(&str, Object)]) -> Value {
        let mut body = Map::new();
        for (name, value) in arguments {
            body.insert(name.to_lowercase(), value.to_json());
        }
        Value::Object(body)
    }
}

impl StoredProcedure for RestProcedureSession {
    fn call(&mut self, procedure: &str, arguments: &[(&str, Object)]) -> CareResult<()> {
        let client = match self.client.as_ref() {
            Some(client) => client,
            None => return str_err!(RemoteJobException, "database session was released"),
        };
        let url = format!(
            "{}/{}",
            self.properties.base_url.trim_end_matches('/'),
            Self::path(procedure)?
        );
        debug!("Calling {} with {} arguments", procedure, arguments.len());
        let mut request = client.post(url).json(&Self::body(arguments));
        if !self.properties.username.is_empty() {
            request = request.basic_auth(&self.properties.username, Some(&self.properties.password));
        }
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return fmt_err!(
                RemoteJobException,
                "procedure {} returned {}: {}",
                procedure,
                status,
                body
            );
        }
        info!("Procedure {} executed", procedure);
        Ok(())
    }
}

impl ScopedResource for RestProcedureSession {
    fn release(&mut self) {
        self.client = None;
        debug!("Database session on {} closed", self.properties.base_url);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn procedures_must_name_their_schema() {
        assert_eq!(
            RestProcedureSession::path("TASY.ATUALIZAR_AUTORIZACAO_CONVENIO").unwrap(),
            "tasy/atualizar_autorizacao_convenio/"
        );
        let e = RestProcedureSession::path("ATUALIZAR_AUTORIZACAO_CONVENIO").unwrap_err();
        assert_eq!(e.code(), ErrorCode::illegal_argument_code());
    }

    #[test]
    fn arguments_become_lowercase_fields() {
        let body = RestProcedureSession::body(&[
            ("P_NR_SEQUENCIA", Object::Long(1234)),
            ("p_nm_usuario", Object::from("automacaotasy")),
            ("p_dt_validade_guia", Object::Null),
        ]);
        assert_eq!(
            body,
            json!({
                "p_nr_sequencia": 1234,
                "p_nm_usuario": "automacaotasy",
                "p_dt_validade_guia": null
            })
        );
    }
}
