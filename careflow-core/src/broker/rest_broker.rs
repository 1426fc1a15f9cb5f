use std::time::Duration;

use careflow_common::prelude::*;
use careflow_common::Task;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde_json::{json, Value};

use super::{TaskBroker, TopicRequest};
use crate::config::BrokerProperties;

/// External-task adapter for the engine REST API (`/external-task/...`).
pub struct RestBroker {
    client: Client,
    properties: BrokerProperties,
}

impl RestBroker {
    pub fn new(properties: BrokerProperties) -> CareResult<Self> {
        // a long-polling fetch is held open by the engine for up to async_response_timeout_ms
        let timeout = properties.request_timeout_ms + properties.async_response_timeout_ms;
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout))
            .build()?;
        info!(
            "Engine REST broker at {} (timeout {}ms)",
            properties.base_url, timeout
        );
        Ok(Self { client, properties })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.properties.base_url.trim_end_matches('/'), path)
    }

    fn post(&self, path: &str, body: &Value) -> RequestBuilder {
        let request = self.client.post(self.url(path)).json(body);
        if self.properties.username.is_empty() {
            request
        } else {
            request.basic_auth(&self.properties.username, Some(&self.properties.password))
        }
    }

    fn send(&self, path: &str, body: &Value) -> CareResult<Response> {
        let response = self.post(path, body).send()?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::rejection(path, response))
        }
    }

    /// Maps an engine error response onto the error kinds the lease client distinguishes.
    fn rejection(path: &str, response: Response) -> ErrorCode {
        let status = response.status();
        let body = response.text().unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|x| x.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or(body);
        let text = format!("{} returned {}: {}", path, status, message);

        match status {
            StatusCode::NOT_FOUND => ErrorCode::NotFound(text),
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
                ErrorCode::BrokerUnavailable(text)
            }
            _ if message.to_ascii_lowercase().contains("lock") => ErrorCode::LeaseExpired(text),
            _ => ErrorCode::UnknownException(text),
        }
    }
}

impl TaskBroker for RestBroker {
    fn fetch_and_lock(
        &self,
        worker_id: &str,
        max_tasks: i32,
        topics: &[TopicRequest],
    ) -> CareResult<Vec<Task>> {
        let topics = topics
            .iter()
            .map(|x| json!({ "topicName": x.topic_name.as_str(), "lockDuration": x.lock_duration_ms }))
            .collect::<Vec<_>>();
        let mut body = json!({
            "workerId": worker_id,
            "maxTasks": max_tasks,
            "usePriority": true,
            "topics": topics,
        });
        if self.properties.async_response_timeout_ms > 0 {
            body["asyncResponseTimeout"] = json!(self.properties.async_response_timeout_ms);
        }

        let response: Value = self.send("/external-task/fetchAndLock", &body)?.json()?;
        let tasks = response
            .as_array()
            .ok_or_else(|| ErrorCode::IllegalArgument("fetchAndLock did not return a list"))?;
        tasks.iter().map(|x| Task::try_from(x)).collect()
    }

    fn complete(
        &self,
        worker_id: &str,
        task_id: &str,
        variables: &HashMap<InlineStr, Object>,
    ) -> CareResult<()> {
        let body = json!({
            "workerId": worker_id,
            "variables": Object::typed_variables_to_json(variables),
        });
        self.send(&format!("/external-task/{}/complete", task_id), &body)?;
        Ok(())
    }

    fn failure(
        &self,
        worker_id: &str,
        task_id: &str,
        error_message: &str,
        error_details: &str,
        retries: i32,
        retry_timeout_ms: i64,
    ) -> CareResult<()> {
        let body = json!({
            "workerId": worker_id,
            "errorMessage": error_message,
            "errorDetails": error_details,
            "retries": retries,
            "retryTimeout": retry_timeout_ms,
        });
        self.send(&format!("/external-task/{}/failure", task_id), &body)?;
        Ok(())
    }

    fn extend_lock(&self, worker_id: &str, task_id: &str, new_duration_ms: i64) -> CareResult<()> {
        let body = json!({ "workerId": worker_id, "newDuration": new_duration_ms });
        self.send(&format!("/external-task/{}/extendLock", task_id), &body)?;
        Ok(())
    }
}
