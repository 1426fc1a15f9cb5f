use careflow_common::prelude::*;
use careflow_common::TaskOutcome;
use careflow_core::{TaskContext, TaskHandler};

use super::{iso_timestamp, optional};
use crate::services::PatientLookup;

/// Looks a patient up by CPF in the hospital registry.
///
/// Not finding the patient is a regular answer for the process; an unreachable registry is a
/// business failure retried by the broker.
pub struct PatientLookupHandler {
    topic: InlineStr,
    lookup: Arc<dyn PatientLookup>,
}

impl PatientLookupHandler {
    pub const TOPIC: &'static str = "api-consulta-paciente";

    pub fn new(topic: &str, lookup: Arc<dyn PatientLookup>) -> Self {
        Self {
            topic: topic.into(),
            lookup,
        }
    }
}

impl TaskHandler for PatientLookupHandler {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn handle(&self, ctx: &mut TaskContext<'_>) -> CareResult<TaskOutcome> {
        let cpf = ctx.task().required_variable("cpf_paciente")?.to_string();
        // passed through as requested
        let convenio = ctx
            .task()
            .variable("convenio_codigo")
            .cloned()
            .unwrap_or(Object::Null);

        let patient = match self.lookup.find_by_cpf(&cpf) {
            Ok(patient) => patient,
            Err(e) => {
                error!("Patient registry lookup for task {} failed: {}", ctx.task().id, e);
                return Ok(ctx.business_failure(format!(
                    "patient registry unavailable: {}",
                    e.display_text()
                )));
            }
        };

        let mut variables = HashMap::new();
        variables.insert("convenio_codigo".into(), convenio.clone());
        variables.insert(
            "consulta_timestamp".into(),
            iso_timestamp(ctx.clock().now_millis()),
        );
        match patient {
            Some(patient) => {
                info!("Patient {:?} found for task {}", patient.id, ctx.task().id);
                variables.insert("paciente_encontrado".into(), Object::Boolean(true));
                variables.insert("paciente_id".into(), optional(patient.id));
                variables.insert("paciente_nome".into(), optional(patient.nome));
                variables.insert("convenio_nome".into(), convenio);
                variables.insert("plano_ativo".into(), Object::Boolean(true));
                variables.insert("paciente_telefone".into(), optional(patient.telefone));
            }
            None => {
                info!("No patient registered for the CPF of task {}", ctx.task().id);
                variables.insert("paciente_encontrado".into(), Object::Boolean(false));
                variables.insert("paciente_id".into(), Object::Null);
                variables.insert("paciente_nome".into(), Object::Null);
                variables.insert("convenio_nome".into(), Object::Null);
                variables.insert("plano_ativo".into(), Object::Boolean(false));
                variables.insert("paciente_telefone".into(), Object::Null);
            }
        }
        Ok(TaskOutcome::success(variables))
    }
}
