use chrono::{DateTime, Utc};

use crate::prelude::*;

/// A unit of work leased from the broker.
///
/// Variables are fixed at claim time; only the lease expiry moves, when the worker extends it.
#[derive(Clone, Debug)]
pub struct Task {
    pub id: InlineStr,
    /// Name of the kind of work, selects the handler
    pub topic: InlineStr,
    /// Worker that holds the lease
    pub worker_id: InlineStr,
    /// Absolute lease expiry, epoch millis
    pub lease_expiry: i64,
    /// Remaining retry budget; `None` until the task failed once
    pub retries: Option<i32>,
    pub process_instance_id: InlineStr,
    pub business_key: Option<InlineStr>,
    variables: HashMap<InlineStr, Object>,
}

impl Task {
    pub fn new(
        id: InlineStr,
        topic: InlineStr,
        worker_id: InlineStr,
        variables: HashMap<InlineStr, Object>,
        lease_expiry: i64,
    ) -> Self {
        Self {
            id,
            topic,
            worker_id,
            lease_expiry,
            retries: None,
            process_instance_id: InlineStr::new(),
            business_key: None,
            variables,
        }
    }

    pub fn variables(&self) -> &HashMap<InlineStr, Object> {
        &self.variables
    }

    /// A variable that is present and not null.
    pub fn variable(&self, name: &str) -> Option<&Object> {
        self.variables.get(name).filter(|x| !x.is_null())
    }

    /// A required variable; absence is a modelling error, not a business outcome.
    pub fn required_variable(&self, name: &str) -> CareResult<&Object> {
        self.variable(name).ok_or_else(|| {
            ErrorCode::IllegalArgument(format!(
                "task {} on topic {} is missing required variable '{}'",
                self.id, self.topic, name
            ))
        })
    }

    pub fn remaining_lease_millis(&self, now_millis: i64) -> i64 {
        self.lease_expiry - now_millis
    }

    pub fn is_lease_expired(&self, now_millis: i64) -> bool {
        now_millis >= self.lease_expiry
    }
}

/// Parses the engine timestamp format (`2015-10-06T16:34:42.000+0200`) or RFC 3339 into epoch
/// millis.
pub(crate) fn parse_engine_timestamp(value: &str) -> CareResult<i64> {
    let parsed = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(value))?;
    Ok(parsed.with_timezone(&Utc).timestamp_millis())
}

/// Decodes one element of a fetch-and-lock response.
impl TryFrom<&serde_json::Value> for Task {
    type Error = ErrorCode;
    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        let id = value
            .get("id")
            .and_then(|x| x.as_str())
            .ok_or_else(|| ErrorCode::IllegalArgument("locked task has no id"))?;
        let topic = value
            .get("topicName")
            .and_then(|x| x.as_str())
            .ok_or_else(|| ErrorCode::IllegalArgument("locked task has no topicName"))?;

        let lease_expiry = match value.get("lockExpirationTime").and_then(|x| x.as_str()) {
            Some(ts) => parse_engine_timestamp(ts)?,
            None => return str_err!(IllegalArgument, "locked task has no lockExpirationTime"),
        };

        let variables = match value.get("variables") {
            Some(json) => Object::typed_variables_from_json(json)?,
            None => HashMap::default(),
        };

        let mut task = Task::new(
            id.into(),
            topic.into(),
            value
                .get("workerId")
                .and_then(|x| x.as_str())
                .unwrap_or_default()
                .into(),
            variables,
            lease_expiry,
        );
        task.retries = value
            .get("retries")
            .and_then(|x| x.as_i64())
            .map(|x| x as i32);
        task.process_instance_id = value
            .get("processInstanceId")
            .and_then(|x| x.as_str())
            .unwrap_or_default()
            .into();
        task.business_key = value
            .get("businessKey")
            .and_then(|x| x.as_str())
            .map(InlineStr::from);
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn decode_locked_task() {
        let json = json!({
            "id": "anExternalTaskId",
            "workerId": "worker-ml-estratificacao",
            "topicName": "ml-estratificar-risco",
            "lockExpirationTime": "2015-10-06T16:34:42.000+0200",
            "processInstanceId": "aProcessInstanceId",
            "businessKey": null,
            "retries": null,
            "variables": {
                "idade": {"type": "Integer", "value": 80, "valueInfo": {}},
                "beneficiario_id": {"type": "String", "value": "B-1", "valueInfo": {}},
                "dados_saude": {"type": "Json", "value": "{\"fumante\":true}", "valueInfo": {}}
            }
        });

        let task = Task::try_from(&json).unwrap();
        assert_eq!(task.id.as_str(), "anExternalTaskId");
        assert_eq!(task.topic.as_str(), "ml-estratificar-risco");
        assert_eq!(task.lease_expiry, 1444142082000);
        assert_eq!(task.retries, None);
        assert_eq!(task.business_key, None);
        assert_matches!(task.variable("idade"), Some(Object::Int(80)));
        assert_matches!(task.variable("dados_saude"), Some(Object::Json(v)) if v["fumante"] == true);
    }

    #[test]
    fn missing_required_variable_names_it() {
        let task = Task::new("t".into(), "topic".into(), "w".into(), HashMap::new(), 0);
        let e = task.required_variable("beneficiario_id").unwrap_err();
        assert!(e.display_text().contains("beneficiario_id"));
    }

    #[test]
    fn rfc3339_expiry_is_accepted() {
        assert_eq!(
            parse_engine_timestamp("2015-10-06T14:34:42Z").unwrap(),
            1444142082000
        );
    }
}
