//! Typed bot API surface.
//!
//! [`BotClient`] has one constructor per endpoint. Each returns a [`Query`]
//! that is sent or executed by the caller; nothing touches the network until
//! then.

use std::sync::Arc;
use std::time::Duration;

use crate::error::ClientResult;
use crate::poller::{PollerConfig, UpdatePoller};
use crate::types::{
    ActionRequestBody, CallbackAnswer, Chat, ChatList, MessageList, NewMessageBody, PhotoTokens,
    SendMessageResult, SenderAction, SimpleQueryResult, UploadEndpoint, UploadType,
    UploadedFileInfo, UploadedInfo, User,
};
use crate::update::{RawUpdateList, UpdateList, UpdateType};

use super::query::{Query, Target};
use super::transport::{HttpMethod, ReqwestTransport, Transport, TransportConfig};
use super::upload::UploadSource;

/// Longest long-poll the server accepts, in seconds.
pub const MAX_POLL_TIMEOUT_SECS: u32 = 90;

/// Long-poll duration used when none is given, in seconds.
pub const DEFAULT_POLL_TIMEOUT_SECS: u32 = 30;

/// Largest batch the server returns from `GET /updates`.
pub const MAX_UPDATES_LIMIT: u32 = 1000;

/// Client-side slack on top of the server long-poll timeout.
pub const POLL_DEADLINE_MARGIN: Duration = Duration::from_secs(15);

// ============================================================================
// Options
// ============================================================================

/// Optional parameters of `GET /chats`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetChatsOptions {
    /// Number of chats requested.
    pub count: Option<u32>,
    /// Marker from the previous page.
    pub marker: Option<i64>,
}

/// Optional parameters of `GET /messages`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetMessagesOptions {
    pub chat_id: Option<i64>,
    /// Fetch these messages only.
    pub message_ids: Option<Vec<String>>,
    /// Start time (inclusive) for requested messages.
    pub from: Option<i64>,
    /// End time (inclusive) for requested messages.
    pub to: Option<i64>,
    pub count: Option<u32>,
}

/// Recipient and flags of `POST /messages`.
///
/// Exactly one of `chat_id` or `user_id` should be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendMessageOptions {
    pub chat_id: Option<i64>,
    pub user_id: Option<i64>,
    pub disable_link_preview: Option<bool>,
}

impl SendMessageOptions {
    /// Send to a chat.
    pub fn to_chat(chat_id: i64) -> Self {
        Self {
            chat_id: Some(chat_id),
            ..Self::default()
        }
    }

    /// Send to a dialog with a user.
    pub fn to_user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    /// Suppress link previews in the sent message.
    pub fn disable_link_preview(mut self, disable: bool) -> Self {
        self.disable_link_preview = Some(disable);
        self
    }
}

/// Optional parameters of `GET /updates`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetUpdatesOptions {
    /// Maximum number of updates (1 to 1000).
    pub limit: Option<u32>,
    /// Long-poll duration in seconds (0 to 90). Server default is 30.
    pub timeout: Option<u32>,
    /// Marker returned with the previous batch.
    pub marker: Option<i64>,
    /// Deliver only these update types.
    pub types: Option<Vec<UpdateType>>,
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

// ============================================================================
// BotClient
// ============================================================================

/// Entry point of the bot API.
///
/// Cheap to clone; clones share the transport and its connection pool.
///
/// # Example
///
/// ```no_run
/// use tamtam_rs::client::{BotClient, SendMessageOptions};
/// use tamtam_rs::types::NewMessageBody;
///
/// # async fn example() -> Result<(), tamtam_rs::error::ClientError> {
/// let client = BotClient::new("my-token")?;
/// let me = client.get_my_info().send().await?;
/// println!("running as {}", me.name);
///
/// client
///     .send_message(NewMessageBody::text("hello"), SendMessageOptions::to_chat(42))
///     .send()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BotClient {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for BotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotClient").finish_non_exhaustive()
    }
}

impl BotClient {
    /// Client for the default endpoint using `token`.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the HTTP client cannot be initialized.
    pub fn new(token: impl Into<String>) -> ClientResult<Self> {
        Self::with_config(TransportConfig::with_token(token))
    }

    /// Client over a [`ReqwestTransport`] built from `config`.
    pub fn with_config(config: TransportConfig) -> ClientResult<Self> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::with_transport(Arc::new(transport)))
    }

    /// Client over a custom transport.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Client configured from `TAMTAM_TOKEN` and `TAMTAM_BASE_URL`.
    pub fn from_env() -> ClientResult<Self> {
        Self::with_config(TransportConfig::from_env()?)
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Long-poll consumer bound to this client.
    pub fn poller(&self, config: PollerConfig) -> UpdatePoller {
        UpdatePoller::new(self.clone(), config)
    }

    fn query<R>(&self, method: HttpMethod, path: impl Into<String>) -> Query<R> {
        Query::new(self.transport.clone(), method, Target::Path(path.into()))
    }

    // ── Bot & chats ──

    /// `GET /me`: information about the current bot.
    pub fn get_my_info(&self) -> Query<User> {
        self.query(HttpMethod::Get, "/me")
    }

    /// `GET /chats`: chats the bot participates in, paginated by marker.
    pub fn get_chats(&self, options: GetChatsOptions) -> Query<ChatList> {
        self.query(HttpMethod::Get, "/chats")
            .param("count", options.count)
            .param("marker", options.marker)
    }

    /// `GET /chats/{chatId}`.
    pub fn get_chat(&self, chat_id: i64) -> Query<Chat> {
        self.query(HttpMethod::Get, format!("/chats/{chat_id}"))
    }

    /// `POST /chats/{chatId}/actions`: show a typing or sending indicator.
    pub fn send_action(&self, chat_id: i64, action: SenderAction) -> Query<SimpleQueryResult> {
        self.query(HttpMethod::Post, format!("/chats/{chat_id}/actions"))
            .body("action", Some(&ActionRequestBody { action }))
    }

    // ── Messages ──

    /// `GET /messages`: messages of a chat or by id.
    pub fn get_messages(&self, options: GetMessagesOptions) -> Query<MessageList> {
        let message_ids = options
            .message_ids
            .as_deref()
            .filter(|ids| !ids.is_empty())
            .map(join);
        self.query(HttpMethod::Get, "/messages")
            .param("chat_id", options.chat_id)
            .param("message_ids", message_ids)
            .param("from", options.from)
            .param("to", options.to)
            .param("count", options.count)
    }

    /// `POST /messages`: send a message to a chat or a user.
    pub fn send_message(
        &self,
        body: NewMessageBody,
        options: SendMessageOptions,
    ) -> Query<SendMessageResult> {
        let has_recipient = options.chat_id.is_some() || options.user_id.is_some();
        self.query(HttpMethod::Post, "/messages")
            .require_present("chat_id or user_id", has_recipient)
            .check(
                !(options.chat_id.is_some() && options.user_id.is_some()),
                || "only one of 'chat_id' and 'user_id' may be set".to_string(),
            )
            .param("chat_id", options.chat_id)
            .param("user_id", options.user_id)
            .param("disable_link_preview", options.disable_link_preview)
            .body("body", Some(&body))
    }

    /// `PUT /messages`: replace the content of a sent message.
    pub fn edit_message(
        &self,
        message_id: impl Into<String>,
        body: NewMessageBody,
    ) -> Query<SimpleQueryResult> {
        self.query(HttpMethod::Put, "/messages")
            .require("message_id", Some(message_id.into()))
            .body("body", Some(&body))
    }

    /// `DELETE /messages`.
    pub fn delete_message(&self, message_id: impl Into<String>) -> Query<SimpleQueryResult> {
        self.query(HttpMethod::Delete, "/messages")
            .require("message_id", Some(message_id.into()))
    }

    /// `POST /answers`: respond to a button press.
    pub fn answer_on_callback(
        &self,
        callback_id: impl Into<String>,
        answer: CallbackAnswer,
    ) -> Query<SimpleQueryResult> {
        let has_content = answer.message.is_some() || answer.notification.is_some();
        self.query(HttpMethod::Post, "/answers")
            .require("callback_id", Some(callback_id.into()))
            .check(has_content, || {
                "callback answer needs a message or a notification".to_string()
            })
            .body("body", Some(&answer))
    }

    // ── Updates ──

    /// `GET /updates`: long-poll for updates, strictly decoded.
    ///
    /// A single element with an unknown `update_type` fails the whole batch.
    /// [`UpdatePoller`] offers a lenient mode on top of
    /// [`get_updates_raw`](Self::get_updates_raw).
    pub fn get_updates(&self, options: GetUpdatesOptions) -> Query<UpdateList> {
        self.updates_query(options)
    }

    /// `GET /updates` with elements left as raw JSON.
    pub fn get_updates_raw(&self, options: GetUpdatesOptions) -> Query<RawUpdateList> {
        self.updates_query(options)
    }

    fn updates_query<R>(&self, options: GetUpdatesOptions) -> Query<R> {
        let poll_secs = options.timeout.unwrap_or(DEFAULT_POLL_TIMEOUT_SECS);
        let types = options
            .types
            .as_deref()
            .filter(|types| !types.is_empty())
            .map(join);

        self.query(HttpMethod::Get, "/updates")
            .check(poll_secs <= MAX_POLL_TIMEOUT_SECS, || {
                format!(
                    "'timeout' must be between 0 and {MAX_POLL_TIMEOUT_SECS} seconds, \
                     got {poll_secs}"
                )
            })
            .check(
                options.limit.map_or(true, |l| (1..=MAX_UPDATES_LIMIT).contains(&l)),
                || format!("'limit' must be between 1 and {MAX_UPDATES_LIMIT}"),
            )
            .param("limit", options.limit)
            .param("timeout", options.timeout)
            .param("marker", options.marker)
            .param("types", types)
            .timeout(Duration::from_secs(u64::from(poll_secs)) + POLL_DEADLINE_MARGIN)
    }

    // ── Uploads ──

    /// `POST /uploads`: obtain a URL to upload a file of the given type to.
    pub fn get_upload_url(&self, upload_type: UploadType) -> Query<UploadEndpoint> {
        self.query(HttpMethod::Post, "/uploads")
            .require("type", Some(upload_type.as_str().to_string()))
    }

    fn upload_query<R>(&self, url: impl Into<String>, source: UploadSource) -> Query<R> {
        Query::new(
            self.transport.clone(),
            HttpMethod::Post,
            Target::Url(url.into()),
        )
        .upload(source)
    }

    /// Upload a generic file to a URL from [`get_upload_url`](Self::get_upload_url).
    pub fn upload_file(
        &self,
        url: impl Into<String>,
        source: UploadSource,
    ) -> Query<UploadedFileInfo> {
        self.upload_query(url, source)
    }

    /// Upload an image; the result maps photo ids to tokens.
    pub fn upload_image(&self, url: impl Into<String>, source: UploadSource) -> Query<PhotoTokens> {
        self.upload_query(url, source)
    }

    /// Upload a video or audio file.
    pub fn upload_media(
        &self,
        url: impl Into<String>,
        source: UploadSource,
    ) -> Query<UploadedInfo> {
        self.upload_query(url, source)
    }
}
