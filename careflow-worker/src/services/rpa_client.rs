use std::time::Duration;

use careflow_common::prelude::*;
use careflow_core::{RemoteJobClient, RemoteJobStatus, ScopedResource};
use reqwest::blocking::{Client, Response};
use serde_json::{json, Value};

use crate::config::RpaProperties;

/// An authenticated session against the IBM RPA process-management API.
///
/// Robot instances are addressed below their process, so the session remembers which process
/// every instance it started belongs to.
pub struct RpaSession {
    client: Client,
    properties: RpaProperties,
    access_token: Option<String>,
    processes: Mutex<HashMap<InlineStr, InlineStr>>,
}

impl RpaSession {
    /// Builds an HTTP client and trades the configured credentials for an access token.
    pub fn open(properties: &RpaProperties) -> CareResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(properties.request_timeout_ms))
            .build()?;
        let mut session = Self {
            client,
            properties: properties.clone(),
            access_token: None,
            processes: Mutex::new(HashMap::new()),
        };
        session.authenticate()?;
        Ok(session)
    }

    fn authenticate(&mut self) -> CareResult<()> {
        let response = self
            .client
            .post(self.url("/v1.0/token"))
            .header("tenantId", &self.properties.tenant_id)
            .form(&[
                ("grant_type", "password"),
                ("username", self.properties.username.as_str()),
                ("password", self.properties.password.as_str()),
                ("culture", "en-US"),
            ])
            .send()?;
        let body = Self::accepted("token", response)?;
        match body.get("access_token").and_then(|x| x.as_str()) {
            Some(token) => {
                info!("Authenticated against RPA tenant {}", self.properties.tenant_id);
                self.access_token = Some(token.to_string());
                Ok(())
            }
            None => str_err!(RemoteJobException, "token response carries no access_token"),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.properties.api_url.trim_end_matches('/'), path)
    }

    fn instances_url(&self, process_id: &str) -> String {
        self.url(&format!(
            "/v2.0/workspace/{}/process/{}/instance",
            self.properties.workspace_id, process_id
        ))
    }

    fn token(&self) -> CareResult<&str> {
        match self.access_token.as_deref() {
            Some(token) => Ok(token),
            None => str_err!(RemoteJobException, "RPA session was released"),
        }
    }

    fn accepted(operation: &str, response: Response) -> CareResult<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return fmt_err!(
                RemoteJobException,
                "RPA {} returned {}: {}",
                operation,
                status,
                body
            );
        }
        Ok(response.json()?)
    }
}

impl RemoteJobClient for RpaSession {
    fn start(&self, job_definition_id: &str, payload: &Value) -> CareResult<InlineStr> {
        let response = self
            .client
            .post(self.instances_url(job_definition_id))
            .bearer_auth(self.token()?)
            .json(&json!({ "payload": payload }))
            .send()?;
        let body = Self::accepted("start", response)?;
        let instance_id: InlineStr = match body.get("id").and_then(|x| x.as_str()) {
            Some(id) => id.into(),
            None => return str_err!(RemoteJobException, "start response carries no instance id"),
        };
        self.processes
            .lock()
            .insert(instance_id.clone(), job_definition_id.into());
        Ok(instance_id)
    }

    fn status(&self, job_id: &str) -> CareResult<RemoteJobStatus> {
        let process_id = self
            .processes
            .lock()
            .get(job_id)
            .cloned()
            .unwrap_or_else(|| self.properties.process_id.as_str().into());
        let response = self
            .client
            .get(format!("{}/{}", self.instances_url(&process_id), job_id))
            .bearer_auth(self.token()?)
            .send()?;
        let body = Self::accepted("status", response)?;

        let status = body
            .get("status")
            .and_then(|x| x.as_str())
            .unwrap_or_default()
            .to_string();
        let error_message = ["errorMessage", "error"]
            .iter()
            .filter_map(|key| body.get(*key).and_then(|x| x.as_str()))
            .find(|x| !x.is_empty())
            .map(InlineStr::from);
        Ok(RemoteJobStatus {
            status: status.into(),
            payload: body,
            error_message,
        })
    }
}

impl ScopedResource for RpaSession {
    fn release(&mut self) {
        self.access_token = None;
        self.processes.lock().clear();
        debug!("RPA token of tenant {} discarded", self.properties.tenant_id);
    }
}
