use careflow_common::prelude::*;
use careflow_common::TaskOutcome;
use careflow_core::{TaskContext, TaskHandler};

use super::{document_variable, iso_timestamp};
use crate::config::RiskProperties;
use crate::services::{RiskFeatures, RiskLevel, RiskModel};

/// Scores a beneficiary and classifies the risk level.
///
/// A failing model does not fail the task: the process receives `ml_status = ERRO` with a
/// moderate fallback level and decides itself what to do with it.
pub struct RiskStratificationHandler {
    topic: InlineStr,
    lock_duration_ms: i64,
    model: Arc<dyn RiskModel>,
    thresholds: RiskProperties,
}

impl RiskStratificationHandler {
    pub const TOPIC: &'static str = "ml-estratificar-risco";
    const FALLBACK_SCORE: f64 = 0.5;

    pub fn new(
        topic: &str,
        lock_duration_ms: i64,
        model: Arc<dyn RiskModel>,
        thresholds: RiskProperties,
    ) -> Self {
        Self {
            topic: topic.into(),
            lock_duration_ms,
            model,
            thresholds,
        }
    }
}

impl TaskHandler for RiskStratificationHandler {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn lock_duration_ms(&self) -> Option<i64> {
        Some(self.lock_duration_ms)
    }

    fn handle(&self, ctx: &mut TaskContext<'_>) -> CareResult<TaskOutcome> {
        let task = ctx.task();
        let beneficiario = task.required_variable("beneficiario_id")?.to_string();
        let idade = task.variable("idade").and_then(|x| x.as_i64().ok());
        let features = RiskFeatures::from_documents(
            idade,
            &document_variable(task, "dados_saude"),
            &document_variable(task, "dados_utilizacao"),
        );

        let mut variables = HashMap::new();
        variables.insert("ml_data_calculo".into(), iso_timestamp(ctx.clock().now_millis()));
        match self.model.score(&features) {
            Ok(score) => {
                let level = RiskLevel::classify(score, &self.thresholds);
                info!(
                    "Beneficiary {} scored {:.4} ({}) by model {}",
                    beneficiario,
                    score,
                    level,
                    self.model.version()
                );
                variables.insert("ml_status".into(), Object::from("SUCESSO"));
                variables.insert(
                    "score_risco".into(),
                    Object::Double((score * 10_000.0).round() / 10_000.0),
                );
                variables.insert("nivel_risco".into(), Object::from(level.as_ref()));
                variables.insert("ml_modelo_versao".into(), Object::from(self.model.version()));
            }
            Err(e) => {
                error!("Risk model failed for beneficiary {}: {}", beneficiario, e);
                variables.insert("ml_status".into(), Object::from("ERRO"));
                variables.insert("ml_mensagem_erro".into(), Object::from(e.display_text()));
                variables.insert("nivel_risco".into(), Object::from(RiskLevel::Moderado.as_ref()));
                variables.insert("score_risco".into(), Object::Double(Self::FALLBACK_SCORE));
            }
        }
        Ok(TaskOutcome::success(variables))
    }
}
