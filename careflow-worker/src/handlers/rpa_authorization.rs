use careflow_common::prelude::*;
use careflow_common::TaskOutcome;
use careflow_core::{
    JobOutcome, JobPoller, JobPollerProperties, JobState, ResultExtractor, ResultField,
    SessionScope, TaskContext, TaskHandler,
};
use serde_json::json;

use super::{int_variable, iso_timestamp, text_variable};
use crate::config::RpaProperties;
use crate::services::RpaSession;

/// Runs the authorization robot for a surgery request and waits for its verdict.
///
/// `rpa_status` only says whether the robot ran (SUCESSO, ERRO or TIMEOUT); the authorization
/// itself is in `status_autorizacao`. A robot that could not be started is still a successful
/// task so the process can route it.
pub struct RpaAuthorizationHandler {
    topic: InlineStr,
    lock_duration_ms: i64,
    rpa: RpaProperties,
    poller: JobPollerProperties,
}

impl RpaAuthorizationHandler {
    pub const TOPIC: &'static str = "ibm-rpa-autorizacao";

    pub fn new(
        topic: &str,
        lock_duration_ms: i64,
        rpa: RpaProperties,
        poller: JobPollerProperties,
    ) -> Self {
        Self {
            topic: topic.into(),
            lock_duration_ms,
            rpa,
            poller,
        }
    }

    /// Robot outputs, under every name the robot scripts have used for them.
    pub fn result_extractor() -> ResultExtractor {
        ResultExtractor::new(vec![
            ResultField::text(
                "numero_autorizacao",
                &["numero_autorizacao", "numeroAutorizacao", "nr_autorizacao"],
            ),
            ResultField::text(
                "status_autorizacao",
                &["status_autorizacao", "statusAutorizacao"],
            ),
            ResultField::identifier(
                "nr_guia_requisicao",
                &["nr_guia_requisicao", "nrGuiaRequisicao", "guia_requisicao"],
            ),
        ])
    }

    fn finished(
        &self,
        ctx: &TaskContext<'_>,
        instance_id: &InlineStr,
        outcome: &JobOutcome,
    ) -> HashMap<InlineStr, Object> {
        let (status, message) = match outcome.state {
            JobState::Succeeded => ("SUCESSO", "robot finished".to_string()),
            JobState::TimedOut => (
                "TIMEOUT",
                format!(
                    "robot timed out: {}",
                    outcome.message.as_deref().unwrap_or_default()
                ),
            ),
            JobState::Failed | JobState::Running => (
                "ERRO",
                format!(
                    "robot failed: {}",
                    outcome.message.as_deref().unwrap_or("unknown error")
                ),
            ),
        };
        let mut variables = ResultExtractor::to_variables(&outcome.result);
        variables.insert("rpa_status".into(), Object::from(status));
        variables.insert("rpa_instance_id".into(), Object::from(instance_id));
        variables.insert("rpa_mensagem".into(), Object::from(message));
        variables.insert(
            "rpa_data_execucao".into(),
            iso_timestamp(ctx.clock().now_millis()),
        );
        variables
    }

    /// The robot never ran; every robot output is a typed null.
    fn not_started(&self, ctx: &TaskContext<'_>, error: &ErrorCode) -> HashMap<InlineStr, Object> {
        let mut variables = ResultExtractor::to_variables(&Self::result_extractor().absent());
        variables.insert("rpa_status".into(), Object::from("ERRO"));
        variables.insert("rpa_instance_id".into(), Object::Null);
        variables.insert(
            "rpa_mensagem".into(),
            Object::from(format!("technical error: {}", error.display_text())),
        );
        variables.insert(
            "rpa_data_execucao".into(),
            iso_timestamp(ctx.clock().now_millis()),
        );
        variables
    }
}

impl TaskHandler for RpaAuthorizationHandler {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn lock_duration_ms(&self) -> Option<i64> {
        Some(self.lock_duration_ms)
    }

    fn handle(&self, ctx: &mut TaskContext<'_>) -> CareResult<TaskOutcome> {
        if self.rpa.process_id.is_empty() {
            error!("No RPA process configured for task {}", ctx.task().id);
            return Ok(TaskOutcome::incident(
                "RPA process not configured",
                "rpa.process_id (IBM_RPA_PROCESS_ID) is empty",
            ));
        }

        let task = ctx.task();
        let payload = json!({
            "paciente_nome": text_variable(task, "paciente_nome")
                .map(|x| x.to_string())
                .unwrap_or_default(),
            "convenio_codigo": int_variable(task, "convenio_codigo"),
            "procedimento_codigo": int_variable(task, "procedimento_codigo"),
            "medico_crm": int_variable(task, "medico_crm"),
            "guia_solicitacao": int_variable(task, "guia_solicitacao"),
        });
        info!(
            "Starting RPA process {} for task {} (convenio {})",
            self.rpa.process_id, task.id, payload["convenio_codigo"]
        );

        let mut scope = SessionScope::new("rpa", || RpaSession::open(&self.rpa));
        let session = match scope.get() {
            Ok(session) => session,
            Err(e) => {
                error!("RPA authentication for task {} failed: {}", ctx.task().id, e);
                return Ok(TaskOutcome::success(self.not_started(ctx, &e)));
            }
        };

        let poller = JobPoller::new(
            &*session,
            ctx.clock().clone(),
            self.poller.clone(),
            Self::result_extractor(),
        );
        let mut job = match poller.start(&self.rpa.process_id, payload) {
            Ok(job) => job,
            Err(e) => {
                error!("RPA start for task {} failed: {}", ctx.task().id, e);
                return Ok(TaskOutcome::success(self.not_started(ctx, &e)));
            }
        };

        let outcome = {
            let mut keeper = ctx.lease_keeper(self.poller.lease_extension_ms);
            let outcome = poller.wait(&mut job, Some(&mut keeper));
            if keeper.is_lost() {
                warn!(
                    "Lease of task {} was lost while robot {} ran",
                    keeper.task().id,
                    job.job_id
                );
            }
            outcome
        };
        info!(
            "RPA instance {} for task {} ended {}",
            job.job_id,
            ctx.task().id,
            outcome.state
        );
        Ok(TaskOutcome::success(self.finished(ctx, &job.job_id, &outcome)))
    }
}
