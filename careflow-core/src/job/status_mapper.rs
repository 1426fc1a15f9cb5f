use careflow_common::prelude::*;

use super::JobState;

static STATUS_VOCABULARY: Lazy<HashMap<&'static str, JobState>> = Lazy::new(|| {
    let mut table = HashMap::new();
    for raw in [
        "NEW",
        "QUEUED",
        "PROCESSING",
        "RUNNING",
        "PENDING",
        "STARTED",
        "IN_PROGRESS",
        "PENDENTE",
        "EM_EXECUCAO",
        "EXECUTANDO",
        "AGUARDANDO",
    ] {
        table.insert(raw, JobState::Running);
    }
    for raw in [
        "DONE",
        "COMPLETED",
        "SUCCESS",
        "SUCCEEDED",
        "FINISHED",
        "SUCESSO",
        "CONCLUIDO",
        "FINALIZADO",
    ] {
        table.insert(raw, JobState::Succeeded);
    }
    for raw in [
        "FAILED",
        "CANCELED",
        "CANCELLED",
        "ERROR",
        "ABORTED",
        "ERRO",
        "FALHA",
        "CANCELADO",
    ] {
        table.insert(raw, JobState::Failed);
    }
    table
});

/// Reconciles the status strings of remote job runners with `JobState`.
///
/// Never yields `TimedOut`, which only the poller's budget can decide.
pub struct StatusMapper;

impl StatusMapper {
    /// The state a raw status maps to, `None` when the vocabulary does not know it.
    pub fn lookup(raw_status: &str) -> Option<JobState> {
        let normalized = raw_status.trim().to_ascii_uppercase();
        STATUS_VOCABULARY.get(normalized.as_str()).copied()
    }

    /// Unknown statuses count as `Running`: the job keeps being polled until it reports a known
    /// terminal status or the budget runs out.
    pub fn map(raw_status: &str) -> JobState {
        match Self::lookup(raw_status) {
            Some(state) => state,
            None => {
                warn!("Unmapped remote job status '{}', treating it as running", raw_status);
                JobState::Running
            }
        }
    }
}
