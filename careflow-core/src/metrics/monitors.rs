use careflow_common::TaskOutcomeKind;
use metrics::{histogram, increment_counter};

use crate::job::JobState;

/// Worker-side counters. Without an installed recorder every call is a no-op.
pub struct Monitors;

impl Monitors {
    pub fn record_task_poll(topic: &str) {
        increment_counter!("careflow_task_poll_total", "topic" => topic.to_string());
    }

    pub fn record_task_poll_error(topic: &str) {
        increment_counter!("careflow_task_poll_error_total", "topic" => topic.to_string());
    }

    pub fn record_task_poll_count(topic: &str, count: usize) {
        metrics::counter!("careflow_task_claimed_total", count as u64, "topic" => topic.to_string());
    }

    pub fn record_task_outcome(topic: &str, kind: TaskOutcomeKind) {
        increment_counter!(
            "careflow_task_outcome_total",
            "topic" => topic.to_string(),
            "outcome" => kind.as_ref().to_string()
        );
    }

    pub fn record_task_report_error(topic: &str, kind: TaskOutcomeKind) {
        increment_counter!(
            "careflow_task_report_error_total",
            "topic" => topic.to_string(),
            "outcome" => kind.as_ref().to_string()
        );
    }

    pub fn record_task_execution_time(topic: &str, duration_ms: i64) {
        histogram!(
            "careflow_task_execution_ms",
            duration_ms as f64,
            "topic" => topic.to_string()
        );
    }

    pub fn record_task_extend_lease(topic: &str) {
        increment_counter!("careflow_task_extend_lease_total", "topic" => topic.to_string());
    }

    pub fn record_handler_panic(topic: &str) {
        increment_counter!("careflow_handler_panic_total", "topic" => topic.to_string());
    }

    pub fn record_job_poll(job_definition_id: &str) {
        increment_counter!("careflow_job_poll_total", "job" => job_definition_id.to_string());
    }

    pub fn record_job_poll_error(job_definition_id: &str) {
        increment_counter!("careflow_job_poll_error_total", "job" => job_definition_id.to_string());
    }

    pub fn record_unmapped_status(raw_status: &str) {
        increment_counter!("careflow_job_unmapped_status_total", "status" => raw_status.to_string());
    }

    pub fn record_job_terminal(job_definition_id: &str, state: JobState, elapsed_ms: i64) {
        increment_counter!(
            "careflow_job_terminal_total",
            "job" => job_definition_id.to_string(),
            "state" => state.as_ref().to_string()
        );
        histogram!(
            "careflow_job_elapsed_ms",
            elapsed_ms as f64,
            "job" => job_definition_id.to_string()
        );
    }
}
