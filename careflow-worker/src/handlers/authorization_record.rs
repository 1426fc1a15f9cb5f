use careflow_common::prelude::*;
use careflow_common::TaskOutcome;
use careflow_core::{SessionScope, TaskContext, TaskHandler};

use super::{iso_timestamp, text_variable};
use crate::config::DatabaseProperties;
use crate::services::{ProcedureGateway, StoredProcedure};

const UPDATE_GUIDE: &str = "TASY.RPA_ATUALIZA_AUTORIZACAO_CONV";
const UPDATE_STAGE: &str = "TASY.ATUALIZAR_AUTORIZACAO_CONVENIO";
const GUIDE_VALIDITY_MS: i64 = 24 * 60 * 60 * 1000;

/// Records the robot's authorization verdict in the hospital database.
///
/// Two procedures run in order: the guide numbers when the robot returned a guide, then the
/// authorization stage when it returned a status. A failing procedure does not stop the other;
/// both are summed up in `oracle_status` and `oracle_mensagem`.
pub struct AuthorizationRecordHandler {
    topic: InlineStr,
    gateway: Arc<dyn ProcedureGateway>,
    database: DatabaseProperties,
}

impl AuthorizationRecordHandler {
    pub const TOPIC: &'static str = "oracle-registrar-autorizacao";

    pub fn new(topic: &str, gateway: Arc<dyn ProcedureGateway>, database: DatabaseProperties) -> Self {
        Self {
            topic: topic.into(),
            gateway,
            database,
        }
    }

    /// Database stage of an authorization status; anything unknown is still under analysis.
    pub fn stage(status: &str) -> i32 {
        match status.trim().to_uppercase().as_str() {
            "AUTORIZADO" | "APROVADO" => 2,
            "ANALISE" => 6,
            "AUDITORIA" => 29,
            "NEGADO" | "RECUSADO" => 7,
            _ => 6,
        }
    }

    fn call(
        scope: &mut SessionScope<'_, Box<dyn StoredProcedure>>,
        procedure: &str,
        arguments: &[(&str, Object)],
    ) -> CareResult<()> {
        scope.get()?.call(procedure, arguments)
    }
}

impl TaskHandler for AuthorizationRecordHandler {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn handle(&self, ctx: &mut TaskContext<'_>) -> CareResult<TaskOutcome> {
        let task = ctx.task();
        let sequence = match task.variable("nr_sequencia") {
            None | Some(Object::Null) => {
                error!("Task {} has no nr_sequencia", task.id);
                return Ok(TaskOutcome::incident(
                    "nr_sequencia is required",
                    "nr_sequencia must be given when the process starts",
                ));
            }
            Some(value) => match value.as_i64() {
                Ok(sequence) => sequence,
                Err(_) => {
                    return Ok(TaskOutcome::incident(
                        format!("invalid nr_sequencia: {}", value.to_string()),
                        "nr_sequencia must be an integer",
                    ));
                }
            },
        };
        let guide = text_variable(task, "nr_guia_requisicao").filter(|x| !x.is_empty());
        let status = text_variable(task, "status_autorizacao").filter(|x| !x.is_empty());
        info!(
            "Recording authorization {} for task {}: guide {:?}, status {:?}",
            sequence, task.id, guide, status
        );

        let mut failed = false;
        let mut messages = Vec::new();
        let mut stage = Object::Null;
        let mut scope = SessionScope::new("database", || self.gateway.connect());

        match &guide {
            Some(guide) => {
                let valid_until = iso_timestamp(ctx.clock().now_millis() + GUIDE_VALIDITY_MS);
                let arguments = [
                    ("p_nr_sequencia", Object::Long(sequence)),
                    ("p_nm_usuario", Object::from(self.database.application_user.as_str())),
                    ("p_cd_senha", Object::from(guide)),
                    ("p_cd_autorizacao_prest", Object::from(guide)),
                    ("p_cd_autorizacao", Object::from(guide)),
                    ("p_dt_validade_guia", valid_until),
                ];
                match Self::call(&mut scope, UPDATE_GUIDE, &arguments) {
                    Ok(()) => messages.push("Guia atualizada".to_string()),
                    Err(e) => {
                        error!("{} for task {} failed: {}", UPDATE_GUIDE, ctx.task().id, e);
                        failed = true;
                        messages.push(format!("Guia: {}", e.display_text()));
                    }
                }
            }
            None => messages.push("Guia nao informada (ignorado)".to_string()),
        }

        match &status {
            Some(status) => {
                let next = Self::stage(status);
                let arguments = [
                    ("p_nr_sequencia", Object::Long(sequence)),
                    ("p_nm_usuario", Object::from(self.database.application_user.as_str())),
                    ("p_nr_seq_estagio", Object::Int(next)),
                    ("p_ie_conta_particular", Object::from("N")),
                    ("p_ie_conta_convenio", Object::from("N")),
                    ("p_ie_commit", Object::from("S")),
                ];
                match Self::call(&mut scope, UPDATE_STAGE, &arguments) {
                    Ok(()) => {
                        stage = Object::Int(next);
                        messages.push(format!("Estagio: {}", next));
                    }
                    Err(e) => {
                        error!("{} for task {} failed: {}", UPDATE_STAGE, ctx.task().id, e);
                        failed = true;
                        messages.push(format!("Estagio: {}", e.display_text()));
                    }
                }
            }
            None => messages.push("Status nao informado (ignorado)".to_string()),
        }
        drop(scope);

        let mut variables = HashMap::new();
        variables.insert(
            "oracle_status".into(),
            Object::from(if failed { "ERRO" } else { "SUCESSO" }),
        );
        variables.insert("oracle_mensagem".into(), Object::from(messages.join(" | ")));
        variables.insert("nr_seq_estagio".into(), stage);
        Ok(TaskOutcome::success(variables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_stages() {
        assert_eq!(AuthorizationRecordHandler::stage("Autorizado"), 2);
        assert_eq!(AuthorizationRecordHandler::stage(" APROVADO "), 2);
        assert_eq!(AuthorizationRecordHandler::stage("Auditoria"), 29);
        assert_eq!(AuthorizationRecordHandler::stage("Recusado"), 7);
        assert_eq!(AuthorizationRecordHandler::stage("Pendente"), 6);
    }
}
