use std::time::Duration;

use careflow_common::prelude::*;
use careflow_core::ScopedResource;
use reqwest::blocking::{Client, Response};
use serde_json::{json, Value};

use crate::config::MessagingProperties;

/// What the messaging provider acknowledged for one message.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageReceipt {
    pub message_id: Option<InlineStr>,
    /// Recipient in international format, as the message was addressed.
    pub phone: InlineStr,
}

/// An open session with a messaging provider.
pub trait MessageSender: ScopedResource + Send {
    /// Sends a pre-approved template; `parameters` fill its body placeholders in order.
    fn send_template(
        &mut self,
        phone: &str,
        template: &str,
        parameters: &[InlineStr],
    ) -> CareResult<MessageReceipt>;

    fn send_text(&mut self, phone: &str, text: &str) -> CareResult<MessageReceipt>;
}

/// Opens messaging sessions, one per handler invocation.
pub trait MessageGateway: Send + Sync {
    fn connect(&self) -> CareResult<Box<dyn MessageSender>>;
}

/// Digits only, with the Brazilian country code added to bare area-code numbers.
pub fn international_phone(phone: &str) -> InlineStr {
    let digits = phone.chars().filter(|x| x.is_ascii_digit()).collect::<String>();
    match digits.len() {
        10 | 11 => format!("55{}", digits).into(),
        _ => digits.into(),
    }
}

/// WhatsApp Business Cloud API: `POST {api_url}/{phone_number_id}/messages`.
pub struct WhatsAppGateway {
    client: Client,
    properties: MessagingProperties,
}

impl WhatsAppGateway {
    pub fn new(properties: MessagingProperties) -> CareResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(properties.request_timeout_ms))
            .build()?;
        Ok(Self { client, properties })
    }
}

impl MessageGateway for WhatsAppGateway {
    fn connect(&self) -> CareResult<Box<dyn MessageSender>> {
        if self.properties.api_token.is_empty() || self.properties.phone_number_id.is_empty() {
            return str_err!(
                ConfigurationException,
                "messaging api_token and phone_number_id must be set"
            );
        }
        Ok(Box::new(WhatsAppSession {
            client: self.client.clone(),
            properties: self.properties.clone(),
            api_token: Some(self.properties.api_token.clone()),
        }))
    }
}

pub struct WhatsAppSession {
    client: Client,
    properties: MessagingProperties,
    api_token: Option<String>,
}

impl WhatsAppSession {
    fn post(&self, message: Value) -> CareResult<Value> {
        let token = match self.api_token.as_deref() {
            Some(token) => token,
            None => return str_err!(RemoteJobException, "messaging session was released"),
        };
        let url = format!(
            "{}/{}/messages",
            self.properties.api_url.trim_end_matches('/'),
            self.properties.phone_number_id
        );
        let response = self.client.post(url).bearer_auth(token).json(&message).send()?;
        Self::accepted(response)
    }

    fn accepted(response: Response) -> CareResult<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return fmt_err!(RemoteJobException, "messaging api returned {}: {}", status, body);
        }
        Ok(response.json()?)
    }

    fn receipt(body: &Value, phone: InlineStr) -> MessageReceipt {
        let message_id = body
            .get("messages")
            .and_then(|x| x.get(0))
            .and_then(|x| x.get("id"))
            .and_then(|x| x.as_str())
            .map(InlineStr::from);
        MessageReceipt { message_id, phone }
    }
}

impl MessageSender for WhatsAppSession {
    fn send_template(
        &mut self,
        phone: &str,
        template: &str,
        parameters: &[InlineStr],
    ) -> CareResult<MessageReceipt> {
        let to = international_phone(phone);
        let components = if parameters.is_empty() {
            json!([])
        } else {
            let parameters = parameters
                .iter()
                .map(|x| json!({"type": "text", "text": x.as_str()}))
                .collect::<Vec<_>>();
            json!([{"type": "body", "parameters": parameters}])
        };
        info!("Sending template {} to {}", template, to);
        let body = self.post(json!({
            "messaging_product": "whatsapp",
            "to": to.as_str(),
            "type": "template",
            "template": {
                "name": template,
                "language": {"code": self.properties.language},
                "components": components,
            },
        }))?;
        Ok(Self::receipt(&body, to))
    }

    fn send_text(&mut self, phone: &str, text: &str) -> CareResult<MessageReceipt> {
        let to = international_phone(phone);
        info!("Sending text message to {}", to);
        let body = self.post(json!({
            "messaging_product": "whatsapp",
            "to": to.as_str(),
            "type": "text",
            "text": {"body": text},
        }))?;
        Ok(Self::receipt(&body, to))
    }
}

impl ScopedResource for WhatsAppSession {
    fn release(&mut self) {
        self.api_token = None;
        debug!("Messaging session of {} closed", self.properties.phone_number_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_numbers_get_the_country_code() {
        assert_eq!(international_phone("(17) 98187-2857").as_str(), "5517981872857");
        assert_eq!(international_phone("1732345678").as_str(), "551732345678");
        assert_eq!(international_phone("+55 17 98187-2857").as_str(), "5517981872857");
    }

    #[test]
    fn receipt_takes_the_first_message_id() {
        let body = json!({"messages": [{"id": "wamid.1"}, {"id": "wamid.2"}]});
        let receipt = WhatsAppSession::receipt(&body, "5517981872857".into());
        assert_eq!(receipt.message_id.as_deref(), Some("wamid.1"));
        assert_eq!(WhatsAppSession::receipt(&json!({}), "55".into()).message_id, None);
    }

    #[test]
    fn unconfigured_gateway_does_not_connect() {
        let gateway = WhatsAppGateway::new(MessagingProperties::default()).unwrap();
        let e = gateway.connect().err().unwrap();
        assert_eq!(e.code(), ErrorCode::configuration_exception_code());
    }
}
