//! Builder patterns for ergonomic construction of clients and messages.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::client::{BotClient, Transport, TransportConfig};
use crate::error::ClientResult;
use crate::types::{AttachmentRequest, Button, Intent, NewMessageBody};

/// Builder for a [`BotClient`].
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use tamtam_rs::builders::ClientBuilder;
///
/// # fn example() -> Result<(), tamtam_rs::error::ClientError> {
/// let client = ClientBuilder::new("my-token")
///     .with_timeout(Duration::from_secs(30))
///     .with_header("X-Trace", "on")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ClientBuilder {
    config: TransportConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}

impl ClientBuilder {
    /// Create a builder for the default endpoint with the given access token.
    pub fn new(token: impl Into<String>) -> Self {
        Self::from_config(TransportConfig::with_token(token))
    }

    /// Start from an existing configuration.
    pub fn from_config(config: TransportConfig) -> Self {
        Self {
            config,
            transport: None,
        }
    }

    /// Start from `TAMTAM_TOKEN` and `TAMTAM_BASE_URL`.
    pub fn from_env() -> ClientResult<Self> {
        Ok(Self::from_config(TransportConfig::from_env()?))
    }

    /// Set the API endpoint.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the default request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the upload timeout.
    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.config.upload_timeout = timeout;
        self
    }

    /// Set the `User-Agent` header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a custom HTTP header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.insert(key.into(), value.into());
        self
    }

    /// Add several HTTP headers.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.config.headers.extend(headers);
        self
    }

    /// Use a custom transport instead of the reqwest one. Transport settings
    /// of this builder are then ignored.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// The configuration built so far.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the HTTP client cannot be initialized.
    pub fn build(self) -> ClientResult<BotClient> {
        match self.transport {
            Some(transport) => Ok(BotClient::with_transport(transport)),
            None => BotClient::with_config(self.config),
        }
    }
}

/// Builder for an inline keyboard attachment.
///
/// # Example
///
/// ```
/// use tamtam_rs::builders::KeyboardBuilder;
/// use tamtam_rs::types::NewMessageBody;
///
/// let body = KeyboardBuilder::new()
///     .callback("Yes", "answer:yes")
///     .callback("No", "answer:no")
///     .row()
///     .link("Docs", "https://dev.tamtam.chat")
///     .attach_to(NewMessageBody::text("Continue?"));
///
/// assert_eq!(body.attachments.unwrap().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeyboardBuilder {
    rows: Vec<Vec<Button>>,
    current: Vec<Button>,
}

impl KeyboardBuilder {
    /// Start an empty keyboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a button to the current row.
    pub fn button(mut self, button: Button) -> Self {
        self.current.push(button);
        self
    }

    /// Append a callback button to the current row.
    pub fn callback(self, text: impl Into<String>, payload: impl Into<String>) -> Self {
        self.button(Button::callback(text, payload))
    }

    /// Append a callback button with an explicit intent.
    pub fn callback_with_intent(
        self,
        text: impl Into<String>,
        payload: impl Into<String>,
        intent: Intent,
    ) -> Self {
        self.button(Button::Callback {
            text: text.into(),
            payload: payload.into(),
            intent: Some(intent),
        })
    }

    /// Append a link button to the current row.
    pub fn link(self, text: impl Into<String>, url: impl Into<String>) -> Self {
        self.button(Button::link(text, url))
    }

    /// Close the current row. Empty rows are dropped.
    pub fn row(mut self) -> Self {
        if !self.current.is_empty() {
            self.rows.push(std::mem::take(&mut self.current));
        }
        self
    }

    /// Finish the keyboard.
    pub fn build(self) -> AttachmentRequest {
        let this = self.row();
        AttachmentRequest::inline_keyboard(this.rows)
    }

    /// Finish the keyboard and add it to `body`.
    pub fn attach_to(self, body: NewMessageBody) -> NewMessageBody {
        body.with_attachment(self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientResponse, TransportRequest, UploadRequest};
    use crate::error::TransportError;
    use async_trait::async_trait;

    #[test]
    fn client_builder_basic() {
        let builder = ClientBuilder::new("token-1")
            .with_base_url("http://localhost:9000")
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("echo-bot/1.0")
            .with_header("X-Custom", "value");

        let config = builder.config();
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.access_token.as_deref(), Some("token-1"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "echo-bot/1.0");
        assert_eq!(config.headers.get("X-Custom").map(String::as_str), Some("value"));
        assert!(builder.build().is_ok());
    }

    #[tokio::test]
    async fn client_builder_with_custom_transport() {
        struct Fixed;

        #[async_trait]
        impl Transport for Fixed {
            async fn send(&self, _: TransportRequest) -> Result<ClientResponse, TransportError> {
                Ok(ClientResponse::json(
                    200,
                    &serde_json::json!({"user_id": 1, "name": "bot"}),
                ))
            }

            async fn upload(&self, _: UploadRequest) -> Result<ClientResponse, TransportError> {
                Err(TransportError::io("not supported"))
            }
        }

        let client = ClientBuilder::new("ignored")
            .with_transport(Arc::new(Fixed))
            .build()
            .unwrap();
        let me = client.get_my_info().send().await.unwrap();
        assert_eq!(me.user_id, 1);
    }

    #[test]
    fn keyboard_builder_rows() {
        let attachment = KeyboardBuilder::new()
            .callback("A", "a")
            .callback("B", "b")
            .row()
            .row()
            .link("C", "https://example.com")
            .build();

        let value = serde_json::to_value(&attachment).unwrap();
        assert_eq!(value["type"], "inline_keyboard");
        let buttons = value["payload"]["buttons"].as_array().unwrap();
        assert_eq!(buttons.len(), 2);
        assert_eq!(buttons[0].as_array().unwrap().len(), 2);
        assert_eq!(buttons[1][0]["type"], "link");
    }

    #[test]
    fn keyboard_builder_intent() {
        let attachment = KeyboardBuilder::new()
            .callback_with_intent("Delete", "del", Intent::Negative)
            .build();
        let value = serde_json::to_value(&attachment).unwrap();
        assert_eq!(value["payload"]["buttons"][0][0]["intent"], "negative");
    }
}
