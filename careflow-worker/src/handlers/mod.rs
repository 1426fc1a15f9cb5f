mod authorization_record;
mod demand_classification;
mod messaging;
mod patient_lookup;
mod risk_stratification;
mod rpa_authorization;

use careflow_common::prelude::*;
use careflow_common::Task;
use chrono::{SecondsFormat, TimeZone, Utc};
use serde_json::Value;

pub use authorization_record::AuthorizationRecordHandler;
pub use demand_classification::DemandClassificationHandler;
pub use messaging::{MessageKind, MessagingHandler};
pub use patient_lookup::PatientLookupHandler;
pub use risk_stratification::RiskStratificationHandler;
pub use rpa_authorization::RpaAuthorizationHandler;

/// Epoch millis as an RFC 3339 UTC timestamp variable.
pub(crate) fn iso_timestamp(millis: i64) -> Object {
    match Utc.timestamp_millis_opt(millis).single() {
        Some(at) => Object::String(at.to_rfc3339_opts(SecondsFormat::Millis, true).into()),
        None => Object::Null,
    }
}

/// Structured view of an optional document variable; missing and null read as `{}`.
pub(crate) fn document_variable(task: &Task, name: &str) -> Value {
    match task.variable(name) {
        None | Some(Object::Null) => Value::Object(Default::default()),
        Some(value) => value.as_json(),
    }
}

/// Integral variable, `0` when missing or not a number.
pub(crate) fn int_variable(task: &Task, name: &str) -> i64 {
    task.variable(name)
        .and_then(|x| x.as_i64().ok())
        .unwrap_or(0)
}

/// Text variable, `None` when missing or null.
pub(crate) fn text_variable(task: &Task, name: &str) -> Option<InlineStr> {
    match task.variable(name) {
        None | Some(Object::Null) => None,
        Some(value) => Some(value.to_string()),
    }
}

/// Optional text as a variable value, typed Null when absent.
pub(crate) fn optional(value: Option<InlineStr>) -> Object {
    value.map(Object::String).unwrap_or(Object::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_utc_with_millis() {
        assert_eq!(
            iso_timestamp(1_444_142_082_123),
            Object::from("2015-10-06T14:34:42.123Z")
        );
    }

    #[test]
    fn missing_documents_read_as_empty() {
        let mut variables = HashMap::new();
        variables.insert(InlineStr::from("dados_saude"), Object::Null);
        variables.insert(InlineStr::from("convenio_codigo"), Object::from("42"));
        let task = Task::new("t".into(), "topic".into(), "w".into(), variables, 0);
        assert_eq!(document_variable(&task, "dados_saude"), serde_json::json!({}));
        assert_eq!(document_variable(&task, "dados_utilizacao"), serde_json::json!({}));
        assert_eq!(int_variable(&task, "convenio_codigo"), 42);
        assert_eq!(int_variable(&task, "medico_crm"), 0);
        assert_eq!(text_variable(&task, "dados_saude"), None);
    }
}
