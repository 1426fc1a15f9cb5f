use careflow_common::prelude::*;
use careflow_common::TaskOutcome;
use careflow_core::{SessionScope, TaskContext, TaskHandler};
use serde_json::Value;
use strum_macros::{AsRefStr, Display};

use super::{document_variable, iso_timestamp, text_variable};
use crate::config::MessagingProperties;
use crate::services::{MessageGateway, MessageReceipt, MessageSender};

/// The messages the fleet sends to beneficiaries, one topic each.
#[derive(Clone, Copy, Debug, PartialEq, Eq, AsRefStr, Display)]
pub enum MessageKind {
    /// Welcome template after enrollment.
    Welcome,
    /// Template chosen by the event that triggered the contact.
    Proactive,
    /// Free text about the current step of the beneficiary's request.
    StatusUpdate,
}

impl MessageKind {
    pub fn topic(&self) -> &'static str {
        match self {
            MessageKind::Welcome => "whatsapp-enviar-boas-vindas",
            MessageKind::Proactive => "whatsapp-comunicacao-proativa",
            MessageKind::StatusUpdate => "whatsapp-comunicar-tempo-real",
        }
    }
}

/// Sends one message to a beneficiary.
///
/// A missing phone number is an incident. A message the provider did not take is a regular
/// result with `whatsapp_status = ERRO`, so the process decides what to do about it.
pub struct MessagingHandler {
    topic: InlineStr,
    kind: MessageKind,
    gateway: Arc<dyn MessageGateway>,
    properties: MessagingProperties,
}

impl MessagingHandler {
    pub fn new(
        topic: &str,
        kind: MessageKind,
        gateway: Arc<dyn MessageGateway>,
        properties: MessagingProperties,
    ) -> Self {
        Self {
            topic: topic.into(),
            kind,
            gateway,
            properties,
        }
    }

    /// Template for a proactive contact; unknown triggers get the reminder.
    pub fn trigger_template<'p>(properties: &'p MessagingProperties, trigger: &str) -> &'p str {
        match trigger {
            "RESULTADO_DISPONIVEL" => &properties.template_exam_result,
            "AUTORIZACAO_ATUALIZADA" => &properties.template_authorization,
            _ => &properties.template_reminder,
        }
    }

    fn send(
        &self,
        ctx: &TaskContext<'_>,
        sender: &mut dyn MessageSender,
        phone: &str,
        name: &str,
    ) -> CareResult<MessageReceipt> {
        let task = ctx.task();
        match self.kind {
            MessageKind::Welcome => {
                sender.send_template(phone, &self.properties.template_welcome, &[name.into()])
            }
            MessageKind::Proactive => {
                let trigger = text_variable(task, "tipo_gatilho").unwrap_or_else(|| "GERAL".into());
                let mut parameters = vec![InlineStr::from(name)];
                if let Value::Object(data) = document_variable(task, "dados_gatilho") {
                    parameters.extend(data.values().map(|x| match x {
                        Value::String(text) => InlineStr::from(text.as_str()),
                        other => other.to_string().into(),
                    }));
                }
                let template = Self::trigger_template(&self.properties, &trigger);
                sender.send_template(phone, template, &parameters)
            }
            MessageKind::StatusUpdate => {
                let status = text_variable(task, "mensagem_status").unwrap_or_default();
                let mut text = format!("Ola {}! {}", name, status);
                if let Some(step) = text_variable(task, "etapa_atual").filter(|x| !x.is_empty()) {
                    text.push_str(&format!("\n\nEtapa atual: {}", step));
                }
                sender.send_text(phone, &text)
            }
        }
    }
}

impl TaskHandler for MessagingHandler {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn handle(&self, ctx: &mut TaskContext<'_>) -> CareResult<TaskOutcome> {
        let phone = match text_variable(ctx.task(), "beneficiario_telefone").filter(|x| !x.is_empty())
        {
            Some(phone) => phone,
            None => {
                error!("Task {} has no beneficiary phone", ctx.task().id);
                return Ok(TaskOutcome::incident(
                    "beneficiario_telefone is required",
                    "the beneficiary phone number must be given",
                ));
            }
        };
        let name =
            text_variable(ctx.task(), "beneficiario_nome").unwrap_or_else(|| "Beneficiario".into());

        let sent = {
            let mut scope = SessionScope::new("messaging", || self.gateway.connect());
            match scope.get() {
                Ok(sender) => self.send(ctx, &mut **sender, &phone, &name),
                Err(e) => Err(e),
            }
        };

        let mut variables = HashMap::new();
        variables.insert(
            "whatsapp_data_envio".into(),
            iso_timestamp(ctx.clock().now_millis()),
        );
        if self.kind == MessageKind::Proactive {
            let trigger = text_variable(ctx.task(), "tipo_gatilho").unwrap_or_else(|| "GERAL".into());
            variables.insert("tipo_comunicacao".into(), Object::String(trigger));
        }
        match sent {
            Ok(receipt) => {
                info!(
                    "{} message for task {} sent as {:?}",
                    self.kind,
                    ctx.task().id,
                    receipt.message_id
                );
                variables.insert("whatsapp_status".into(), Object::from("ENVIADO"));
                variables.insert(
                    "whatsapp_message_id".into(),
                    Object::String(receipt.message_id.unwrap_or_default()),
                );
            }
            Err(e) => {
                error!("{} message for task {} not sent: {}", self.kind, ctx.task().id, e);
                variables.insert("whatsapp_status".into(), Object::from("ERRO"));
                variables.insert("whatsapp_message_id".into(), Object::from(""));
                variables.insert(
                    "whatsapp_mensagem_erro".into(),
                    Object::from(e.display_text()),
                );
            }
        }
        Ok(TaskOutcome::success(variables))
    }
}
