use strum_macros::{AsRefStr, Display};

use crate::prelude::*;

/// What a handler decided for one claimed task. Exactly one outcome is reported per claim.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskOutcome {
    /// Operation completed, variables are merged into the process state.
    Success {
        result_variables: HashMap<InlineStr, Object>,
    },
    /// Operation did not complete but the broker may retry it. Once the retry budget is spent the
    /// broker raises an incident.
    BusinessFailure {
        message: InlineStr,
        retries_remaining: i32,
        retry_delay_ms: i64,
    },
    /// Needs operator attention, never retried automatically.
    Incident { message: InlineStr, details: InlineStr },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TaskOutcomeKind {
    Success,
    BusinessFailure,
    Incident,
}

impl TaskOutcome {
    pub fn success(result_variables: HashMap<InlineStr, Object>) -> Self {
        TaskOutcome::Success { result_variables }
    }

    pub fn business_failure(
        message: impl Into<InlineStr>,
        retries_remaining: i32,
        retry_delay_ms: i64,
    ) -> Self {
        TaskOutcome::BusinessFailure {
            message: message.into(),
            retries_remaining,
            retry_delay_ms,
        }
    }

    pub fn incident(message: impl Into<InlineStr>, details: impl Into<InlineStr>) -> Self {
        TaskOutcome::Incident {
            message: message.into(),
            details: details.into(),
        }
    }

    /// An error that escaped a handler. Carries the code so operators can tell misconfiguration
    /// from a broken dependency.
    pub fn from_error(error: &ErrorCode) -> Self {
        TaskOutcome::Incident {
            message: error.display_text().into(),
            details: format!("code {}: {}", error.code(), error.message()).into(),
        }
    }

    pub fn kind(&self) -> TaskOutcomeKind {
        match self {
            TaskOutcome::Success { .. } => TaskOutcomeKind::Success,
            TaskOutcome::BusinessFailure { .. } => TaskOutcomeKind::BusinessFailure,
            TaskOutcome::Incident { .. } => TaskOutcomeKind::Incident,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn error_becomes_incident_with_code() {
        let outcome = TaskOutcome::from_error(&ErrorCode::ConfigurationException(
            "process id not configured",
        ));
        assert_eq!(outcome.kind(), TaskOutcomeKind::Incident);
        assert_matches!(outcome, TaskOutcome::Incident { message, details } => {
            assert_eq!(message.as_str(), "process id not configured");
            assert!(details.starts_with("code 1014"));
        });
    }

    #[test]
    fn kinds_label_as_snake_case() {
        assert_eq!(TaskOutcomeKind::BusinessFailure.as_ref(), "business_failure");
        assert_eq!(
            TaskOutcome::business_failure("api down", 2, 30_000).kind(),
            TaskOutcomeKind::BusinessFailure
        );
    }
}
