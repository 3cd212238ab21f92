use crate::models::GatewayCredentials;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("request to messaging gateway failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("messaging gateway answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Delivers a text message to a phone number on behalf of one tenant.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send_text(
        &self,
        credentials: &GatewayCredentials,
        phone: &str,
        message: &str,
    ) -> Result<(), GatewayError>;
}

#[derive(Debug, Serialize)]
struct SendTextRequest<'a> {
    phone: &'a str,
    message: &'a str,
}

/// Z-API WhatsApp gateway.
pub struct ZApiGateway {
    client: reqwest::Client,
    base_url: String,
}

impl ZApiGateway {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn send_text_url(&self, credentials: &GatewayCredentials) -> String {
        format!(
            "{}/instances/{}/token/{}/send-text",
            self.base_url, credentials.instance_id, credentials.token
        )
    }
}

#[async_trait]
impl MessagingGateway for ZApiGateway {
    #[instrument(skip_all, fields(instance_id = %credentials.instance_id))]
    async fn send_text(
        &self,
        credentials: &GatewayCredentials,
        phone: &str,
        message: &str,
    ) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(self.send_text_url(credentials))
            .header("Client-Token", &credentials.client_token)
            .json(&SendTextRequest { phone, message })
            .send()
            .await?;

        let status = response.status();
        debug!(status = status.as_u16(), "Messaging gateway response.");

        if status.is_success() {
            Ok(())
        } else {
            Err(GatewayError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::CapturedLogs;
    use httpmock::prelude::*;
    use serde_json::json;

    fn credentials() -> GatewayCredentials {
        GatewayCredentials {
            instance_id: "inst-42".to_string(),
            token: "tok-42".to_string(),
            client_token: "client-42".to_string(),
        }
    }

    #[tokio::test]
    async fn posts_phone_and_message_with_client_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/instances/inst-42/token/tok-42/send-text")
                .header("client-token", "client-42")
                .header("content-type", "application/json")
                .json_body(json!({"phone": "5511999990000", "message": "Olá Ana"}));
            then.status(200).json_body(json!({"messageId": "abc"}));
        });

        let gateway = ZApiGateway::new(reqwest::Client::new(), server.base_url());
        let result = gateway
            .send_text(&credentials(), "5511999990000", "Olá Ana")
            .await;

        assert!(result.is_ok(), "send failed: {:?}", result.err());
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn non_success_status_is_rejected() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/instances/inst-42/token/tok-42/send-text");
            then.status(400).json_body(json!({"error": "invalid phone"}));
        });

        let gateway = ZApiGateway::new(reqwest::Client::new(), format!("{}/", server.base_url()));
        let result = gateway.send_text(&credentials(), "123", "hi").await;

        match result {
            Err(GatewayError::Rejected { status, body }) => {
                assert_eq!(status, 400);
                assert!(body.contains("invalid phone"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn unreachable_gateway_is_a_transport_error() {
        let gateway = ZApiGateway::new(reqwest::Client::new(), "http://127.0.0.1:1");
        let result = gateway.send_text(&credentials(), "123", "hi").await;
        assert!(matches!(result, Err(GatewayError::Transport(_))));
    }

    #[tokio::test]
    async fn response_body_is_not_logged() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/instances/inst-42/token/tok-42/send-text");
            then.status(200).json_body(json!({"messageId": "msg-7f3a", "phone": "5511999990000"}));
        });
        let logs = CapturedLogs::default();
        let _guard = logs.install();

        let gateway = ZApiGateway::new(reqwest::Client::new(), server.base_url());
        gateway
            .send_text(&credentials(), "5511999990000", "hi")
            .await
            .unwrap();

        let output = logs.contents();
        assert!(output.contains("Messaging gateway response."));
        assert!(!output.contains("msg-7f3a"), "gateway body was logged: {output}");
    }
}
