//! Bot API data types: users, chats, messages, attachments and uploads.
//!
//! Field names follow the platform's snake_case JSON. Types received from the
//! server are lenient about optional fields so that schema additions do not
//! break decoding; request types serialize only what is set.
//!
//! Updates live in [`crate::update`] because they carry a strict decoding
//! contract of their own.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Enums
// ============================================================================

/// Kind of a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    /// One-to-one dialog between the bot and a user.
    Dialog,
    /// Group chat.
    Chat,
    /// Channel.
    Channel,
}

/// Membership status of the bot in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    /// Bot is an active participant.
    Active,
    /// Bot was removed from the chat.
    Removed,
    /// Bot left the chat.
    Left,
    /// Chat was closed.
    Closed,
    /// Bot is suspended in this chat.
    Suspended,
}

/// Action shown to chat participants ("bot is typing...").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderAction {
    TypingOn,
    SendingPhoto,
    SendingVideo,
    SendingAudio,
    SendingFile,
    MarkSeen,
}

/// Media kind requested from `POST /uploads`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadType {
    Photo,
    Video,
    Audio,
    File,
}

impl UploadType {
    /// Wire value used in the `type` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadType::Photo => "photo",
            UploadType::Video => "video",
            UploadType::Audio => "audio",
            UploadType::File => "file",
        }
    }
}

impl fmt::Display for UploadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "photo" => Ok(UploadType::Photo),
            "video" => Ok(UploadType::Video),
            "audio" => Ok(UploadType::Audio),
            "file" => Ok(UploadType::File),
            other => Err(format!("unknown upload type '{other}'")),
        }
    }
}

// ============================================================================
// Users & Chats
// ============================================================================

/// A platform user (or bot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Global user identifier.
    pub user_id: i64,

    /// Display name.
    pub name: String,

    /// Unique public name, if the user has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Avatar URL (returned by `GET /me` and membership updates).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    /// Bot description (only for `GET /me`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A chat the bot participates in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub chat_id: i64,

    #[serde(rename = "type")]
    pub chat_type: ChatType,

    pub status: ChatStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Time of the last event in the chat.
    #[serde(default)]
    pub last_event_time: i64,

    #[serde(default)]
    pub participants_count: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<i64>,

    #[serde(default)]
    pub is_public: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Page of chats returned by `GET /chats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatList {
    pub chats: Vec<Chat>,

    /// Marker for the next page, absent on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<i64>,
}

// ============================================================================
// Messages
// ============================================================================

/// Where a message was sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,

    pub chat_type: ChatType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

/// Content of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    /// Message identifier, e.g. `mid.0000000000a1b2c3`.
    pub mid: String,

    /// Sequence number within the chat.
    #[serde(default)]
    pub seq: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,

    /// Identifier of the message this one replies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

/// Message statistics (channels only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageStat {
    pub views: i64,
}

/// A message in a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author; absent for channel posts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<User>,

    pub recipient: Recipient,

    /// Unix time in seconds.
    pub timestamp: i64,

    pub body: MessageBody,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stat: Option<MessageStat>,
}

impl Message {
    /// The message identifier (`body.mid`).
    pub fn id(&self) -> &str {
        &self.body.mid
    }

    /// The message text, if any.
    pub fn text(&self) -> Option<&str> {
        self.body.text.as_deref()
    }
}

/// Messages returned by `GET /messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageList {
    pub messages: Vec<Message>,
}

/// Payload of an inline-keyboard button press.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Callback {
    pub timestamp: i64,

    /// Identifier to pass to `POST /answers`.
    pub callback_id: String,

    /// Payload attached to the pressed button.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,

    /// User who pressed the button.
    pub user: User,
}

// ============================================================================
// Attachments (received)
// ============================================================================

/// Media payload of a received attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Token that can be reused to resend the same media.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickerPayload {
    pub url: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcf_info: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tam_info: Option<User>,
}

/// Rows of buttons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyboard {
    pub buttons: Vec<Vec<Button>>,
}

/// Attachment of a received message, discriminated by `type`.
///
/// Attachment kinds this crate does not model decode as [`Attachment::Unknown`]
/// instead of failing the whole message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Attachment {
    Image { payload: MediaPayload },
    Video { payload: MediaPayload },
    Audio { payload: MediaPayload },
    File { payload: MediaPayload },
    Sticker { payload: StickerPayload },
    Contact { payload: ContactPayload },
    InlineKeyboard { payload: Keyboard },
    Location { latitude: f64, longitude: f64 },
    #[serde(other)]
    Unknown,
}

// ============================================================================
// Keyboard buttons
// ============================================================================

/// Intent of a callback button, affects its rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Positive,
    Negative,
    Default,
}

/// An inline keyboard button, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Button {
    /// Sends a `message_callback` update with `payload` when pressed.
    Callback {
        text: String,
        payload: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        intent: Option<Intent>,
    },
    /// Opens `url`.
    Link { text: String, url: String },
    /// Asks the user to share their contact.
    RequestContact { text: String },
    /// Asks the user to share their location.
    RequestGeoLocation {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quick: Option<bool>,
    },
}

impl Button {
    /// A callback button with the default intent.
    pub fn callback(text: impl Into<String>, payload: impl Into<String>) -> Self {
        Button::Callback {
            text: text.into(),
            payload: payload.into(),
            intent: None,
        }
    }

    /// A link button.
    pub fn link(text: impl Into<String>, url: impl Into<String>) -> Self {
        Button::Link {
            text: text.into(),
            url: url.into(),
        }
    }
}

// ============================================================================
// Attachments (outgoing)
// ============================================================================

/// Token of one uploaded photo size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoToken {
    pub token: String,
}

/// Result of uploading an image: one token per generated photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoTokens {
    pub photos: HashMap<String, PhotoToken>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoAttachmentRequestPayload {
    /// Public URL of an image to attach.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Token of a previously sent image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Tokens of a freshly uploaded image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photos: Option<HashMap<String, PhotoToken>>,
}

/// Result of uploading a video or audio (and of `POST /uploads` for those kinds).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadedInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Result of uploading a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadedFileInfo {
    #[serde(default, alias = "fileId", skip_serializing_if = "Option::is_none")]
    pub file_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickerAttachmentRequestPayload {
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactAttachmentRequestPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcf_info: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcf_phone: Option<String>,
}

/// Attachment of an outgoing message, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttachmentRequest {
    Image {
        payload: PhotoAttachmentRequestPayload,
    },
    Video {
        payload: UploadedInfo,
    },
    Audio {
        payload: UploadedInfo,
    },
    File {
        payload: UploadedFileInfo,
    },
    Sticker {
        payload: StickerAttachmentRequestPayload,
    },
    Contact {
        payload: ContactAttachmentRequestPayload,
    },
    InlineKeyboard {
        payload: Keyboard,
    },
    Location {
        latitude: f64,
        longitude: f64,
    },
}

impl AttachmentRequest {
    /// Attach an image from the tokens returned by an image upload.
    pub fn photo(tokens: PhotoTokens) -> Self {
        AttachmentRequest::Image {
            payload: PhotoAttachmentRequestPayload {
                photos: Some(tokens.photos),
                ..Default::default()
            },
        }
    }

    /// Attach a video from an upload result.
    pub fn video(info: UploadedInfo) -> Self {
        AttachmentRequest::Video { payload: info }
    }

    /// Attach an audio from an upload result.
    pub fn audio(info: UploadedInfo) -> Self {
        AttachmentRequest::Audio { payload: info }
    }

    /// Attach a file from an upload result.
    pub fn file(info: UploadedFileInfo) -> Self {
        AttachmentRequest::File { payload: info }
    }

    /// Attach an inline keyboard.
    pub fn inline_keyboard(buttons: Vec<Vec<Button>>) -> Self {
        AttachmentRequest::InlineKeyboard {
            payload: Keyboard { buttons },
        }
    }
}

// ============================================================================
// Request bodies & results
// ============================================================================

/// Body of `POST /messages` and `PUT /messages`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewMessageBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<AttachmentRequest>>,

    /// Whether participants are notified. Server default is `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify: Option<bool>,
}

impl NewMessageBody {
    /// A plain text message.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Add an attachment (builder-style).
    pub fn with_attachment(mut self, attachment: AttachmentRequest) -> Self {
        self.attachments.get_or_insert_with(Vec::new).push(attachment);
        self
    }

    /// Set the notify flag (builder-style).
    pub fn with_notify(mut self, notify: bool) -> Self {
        self.notify = Some(notify);
        self
    }
}

/// Result of `POST /messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessageResult {
    pub message: Message,
}

/// Generic result of mutating endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleQueryResult {
    pub success: bool,

    /// Explanation when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body of `POST /answers`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackAnswer {
    /// Replaces the message the keyboard belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<NewMessageBody>,

    /// One-time notification shown to the user who pressed the button.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<String>,
}

/// Body of `POST /chats/{chatId}/actions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequestBody {
    pub action: SenderAction,
}

/// Result of `POST /uploads`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadEndpoint {
    /// URL to upload the file to.
    pub url: String,

    /// Pre-issued token for video and audio uploads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}
