use careflow_common::prelude::*;
use careflow_common::TaskOutcome;
use careflow_core::{TaskContext, TaskHandler};

use crate::services::DemandClassifier;

/// Classifies the free-text request of a beneficiary.
pub struct DemandClassificationHandler {
    topic: InlineStr,
    classifier: Arc<dyn DemandClassifier>,
}

impl DemandClassificationHandler {
    pub const TOPIC: &'static str = "ia-classificar-demanda";

    pub fn new(topic: &str, classifier: Arc<dyn DemandClassifier>) -> Self {
        Self {
            topic: topic.into(),
            classifier,
        }
    }
}

impl TaskHandler for DemandClassificationHandler {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn handle(&self, ctx: &mut TaskContext<'_>) -> CareResult<TaskOutcome> {
        let message = ctx.task().required_variable("mensagem")?.to_string();

        let classification = match self.classifier.classify(&message) {
            Ok(classification) => classification,
            Err(e) => {
                warn!("Classification of task {} failed: {}", ctx.task().id, e);
                return Ok(ctx.business_failure(format!("classification failed: {}", e.display_text())));
            }
        };
        debug!(
            "Task {} classified as {} / {} / {}",
            ctx.task().id,
            classification.tipo_demanda,
            classification.urgencia,
            classification.intencao
        );

        let mut variables = HashMap::new();
        variables.insert("tipo_demanda".into(), Object::from(classification.tipo_demanda));
        variables.insert("urgencia".into(), Object::from(classification.urgencia));
        variables.insert("complexidade".into(), Object::from(classification.complexidade));
        variables.insert("intencao".into(), Object::from(classification.intencao));
        variables.insert("confianca".into(), Object::Double(classification.confianca));
        variables.insert(
            "classificado_por".into(),
            Object::from(classification.classificado_por),
        );
        Ok(TaskOutcome::success(variables))
    }
}
