//! Server-pushed events ("updates").
//!
//! Every update carries a string discriminator (`update_type`) and a
//! `timestamp`. The set of variants is closed: decoding reads the tag first,
//! selects a decoder from a static tag table and decodes the rest of the
//! object with it. A tag that is not in the table is a decode error, never a generic
//! fallback value.
//!
//! Batches returned by `GET /updates` can be decoded strictly (an
//! [`UpdateList`] fails as a whole on any bad element) or leniently through
//! [`RawUpdateList::decode`] with a [`BatchPolicy`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{payload_snippet, ClientError, ClientResult};
use crate::types::{Callback, Message, User};

/// Name of the discriminator field.
pub const UPDATE_TYPE_FIELD: &str = "update_type";

// ============================================================================
// Tags
// ============================================================================

/// Discriminator of an [`Update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UpdateType {
    #[serde(rename = "message_created")]
    MessageCreated,
    #[serde(rename = "message_callback")]
    MessageCallback,
    #[serde(rename = "message_edited")]
    MessageEdited,
    #[serde(rename = "message_removed")]
    MessageRemoved,
    #[serde(rename = "message_restored")]
    MessageRestored,
    #[serde(rename = "bot_added")]
    BotAdded,
    #[serde(rename = "bot_removed")]
    BotRemoved,
    #[serde(rename = "user_added")]
    UserAdded,
    #[serde(rename = "user_removed")]
    UserRemoved,
}

impl UpdateType {
    /// Every known tag, in declaration order.
    pub const ALL: [UpdateType; 9] = [
        UpdateType::MessageCreated,
        UpdateType::MessageCallback,
        UpdateType::MessageEdited,
        UpdateType::MessageRemoved,
        UpdateType::MessageRestored,
        UpdateType::BotAdded,
        UpdateType::BotRemoved,
        UpdateType::UserAdded,
        UpdateType::UserRemoved,
    ];

    /// Wire value of this tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateType::MessageCreated => "message_created",
            UpdateType::MessageCallback => "message_callback",
            UpdateType::MessageEdited => "message_edited",
            UpdateType::MessageRemoved => "message_removed",
            UpdateType::MessageRestored => "message_restored",
            UpdateType::BotAdded => "bot_added",
            UpdateType::BotRemoved => "bot_removed",
            UpdateType::UserAdded => "user_added",
            UpdateType::UserRemoved => "user_removed",
        }
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateType {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UpdateType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ClientError::Decode {
                message: format!("unknown update type '{s}'"),
                payload: None,
            })
    }
}

// ============================================================================
// Variants
// ============================================================================

/// A new message was posted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageCreatedUpdate {
    pub timestamp: i64,
    pub message: Message,
}

/// A user pressed a callback button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageCallbackUpdate {
    pub timestamp: i64,
    pub callback: Callback,
    /// Message the keyboard belongs to. Absent if it was deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

/// A message was edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEditedUpdate {
    pub timestamp: i64,
    pub message: Message,
}

/// A message was removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRemovedUpdate {
    pub timestamp: i64,
    pub message_id: String,
}

/// A removed message was restored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRestoredUpdate {
    pub timestamp: i64,
    pub message_id: String,
}

/// The bot was added to a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotAddedToChatUpdate {
    pub timestamp: i64,
    pub chat_id: i64,
    /// User who added the bot.
    pub user: User,
}

/// The bot was removed from a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotRemovedFromChatUpdate {
    pub timestamp: i64,
    pub chat_id: i64,
    /// User who removed the bot.
    pub user: User,
}

/// A user joined or was added to a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAddedToChatUpdate {
    pub timestamp: i64,
    pub chat_id: i64,
    pub user: User,
    /// Who added the user; absent when the user joined by link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inviter_id: Option<i64>,
}

/// A user left or was removed from a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRemovedFromChatUpdate {
    pub timestamp: i64,
    pub chat_id: i64,
    pub user: User,
    /// Administrator who removed the user; absent when the user left.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<i64>,
}

/// An event that happened in a chat.
///
/// Serializes flat, with the `update_type` tag next to the variant fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "update_type")]
pub enum Update {
    #[serde(rename = "message_created")]
    MessageCreated(MessageCreatedUpdate),
    #[serde(rename = "message_callback")]
    MessageCallback(MessageCallbackUpdate),
    #[serde(rename = "message_edited")]
    MessageEdited(MessageEditedUpdate),
    #[serde(rename = "message_removed")]
    MessageRemoved(MessageRemovedUpdate),
    #[serde(rename = "message_restored")]
    MessageRestored(MessageRestoredUpdate),
    #[serde(rename = "bot_added")]
    BotAdded(BotAddedToChatUpdate),
    #[serde(rename = "bot_removed")]
    BotRemoved(BotRemovedFromChatUpdate),
    #[serde(rename = "user_added")]
    UserAdded(UserAddedToChatUpdate),
    #[serde(rename = "user_removed")]
    UserRemoved(UserRemovedFromChatUpdate),
}

impl Update {
    /// The discriminator of this update.
    pub fn update_type(&self) -> UpdateType {
        match self {
            Update::MessageCreated(_) => UpdateType::MessageCreated,
            Update::MessageCallback(_) => UpdateType::MessageCallback,
            Update::MessageEdited(_) => UpdateType::MessageEdited,
            Update::MessageRemoved(_) => UpdateType::MessageRemoved,
            Update::MessageRestored(_) => UpdateType::MessageRestored,
            Update::BotAdded(_) => UpdateType::BotAdded,
            Update::BotRemoved(_) => UpdateType::BotRemoved,
            Update::UserAdded(_) => UpdateType::UserAdded,
            Update::UserRemoved(_) => UpdateType::UserRemoved,
        }
    }

    /// Time the event occurred, in Unix seconds.
    pub fn timestamp(&self) -> i64 {
        match self {
            Update::MessageCreated(u) => u.timestamp,
            Update::MessageCallback(u) => u.timestamp,
            Update::MessageEdited(u) => u.timestamp,
            Update::MessageRemoved(u) => u.timestamp,
            Update::MessageRestored(u) => u.timestamp,
            Update::BotAdded(u) => u.timestamp,
            Update::BotRemoved(u) => u.timestamp,
            Update::UserAdded(u) => u.timestamp,
            Update::UserRemoved(u) => u.timestamp,
        }
    }

    /// [`Self::timestamp`] as a UTC date-time, if it is in range.
    pub fn time(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp(self.timestamp(), 0)
    }

    /// The chat the update belongs to, when the variant identifies one.
    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Update::MessageCreated(u) => u.message.recipient.chat_id,
            Update::MessageEdited(u) => u.message.recipient.chat_id,
            Update::MessageCallback(u) => u.message.as_ref().and_then(|m| m.recipient.chat_id),
            Update::BotAdded(u) => Some(u.chat_id),
            Update::BotRemoved(u) => Some(u.chat_id),
            Update::UserAdded(u) => Some(u.chat_id),
            Update::UserRemoved(u) => Some(u.chat_id),
            Update::MessageRemoved(_) | Update::MessageRestored(_) => None,
        }
    }

    /// Decode one raw update object.
    ///
    /// Reads `update_type` first and fails with [`ClientError::Decode`] when
    /// the tag is missing or unknown, or when the rest of the object does not
    /// match the variant selected by the tag.
    pub fn from_value(value: serde_json::Value) -> ClientResult<Update> {
        let tag = match value.get(UPDATE_TYPE_FIELD).and_then(|v| v.as_str()) {
            Some(tag) => tag.to_owned(),
            None => {
                return Err(decode_error(
                    format!("missing '{UPDATE_TYPE_FIELD}' field"),
                    &value,
                ))
            }
        };

        let decoder = match decoder_for(&tag) {
            Some(decoder) => decoder,
            None => {
                let expected: Vec<&str> = DECODERS.iter().map(|(t, _)| t.as_str()).collect();
                return Err(decode_error(
                    format!(
                        "unknown update type '{tag}', expected one of: {}",
                        expected.join(", ")
                    ),
                    &value,
                ));
            }
        };

        let snapshot = payload_snippet(value.to_string().as_bytes());
        decoder(value).map_err(|e| ClientError::Decode {
            message: format!("malformed '{tag}' update: {e}"),
            payload: Some(snapshot),
        })
    }
}

fn decode_error(message: String, value: &serde_json::Value) -> ClientError {
    ClientError::Decode {
        message,
        payload: Some(payload_snippet(value.to_string().as_bytes())),
    }
}

impl<'de> Deserialize<'de> for Update {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Update::from_value(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Tag -> decoder table
// ============================================================================

type Decoder = fn(serde_json::Value) -> Result<Update, serde_json::Error>;

/// One decoder per known tag. Extra fields (including the tag itself) are
/// ignored by the variant structs.
pub(crate) const DECODERS: [(UpdateType, Decoder); 9] = [
    (UpdateType::MessageCreated, |v| {
        serde_json::from_value(v).map(Update::MessageCreated)
    }),
    (UpdateType::MessageCallback, |v| {
        serde_json::from_value(v).map(Update::MessageCallback)
    }),
    (UpdateType::MessageEdited, |v| {
        serde_json::from_value(v).map(Update::MessageEdited)
    }),
    (UpdateType::MessageRemoved, |v| {
        serde_json::from_value(v).map(Update::MessageRemoved)
    }),
    (UpdateType::MessageRestored, |v| {
        serde_json::from_value(v).map(Update::MessageRestored)
    }),
    (UpdateType::BotAdded, |v| {
        serde_json::from_value(v).map(Update::BotAdded)
    }),
    (UpdateType::BotRemoved, |v| {
        serde_json::from_value(v).map(Update::BotRemoved)
    }),
    (UpdateType::UserAdded, |v| {
        serde_json::from_value(v).map(Update::UserAdded)
    }),
    (UpdateType::UserRemoved, |v| {
        serde_json::from_value(v).map(Update::UserRemoved)
    }),
];

fn decoder_for(tag: &str) -> Option<Decoder> {
    DECODERS
        .iter()
        .find(|(t, _)| t.as_str() == tag)
        .map(|(_, decoder)| *decoder)
}

// ============================================================================
// Batches
// ============================================================================

/// Ordered batch of updates returned by `GET /updates`.
///
/// Deserializing this type directly is strict: one malformed or unknown
/// element fails the whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateList {
    pub updates: Vec<Update>,

    /// Opaque continuation marker to send with the next poll.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<i64>,
}

/// What to do with an element of a batch that fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Fail the whole batch with the first decode error. Nothing from the
    /// batch is dispatched.
    #[default]
    FailBatch,
    /// Drop the offending element, report it, and keep the rest in order.
    SkipAndReport,
}

/// A batch element that was dropped under [`BatchPolicy::SkipAndReport`].
#[derive(Debug, Clone)]
pub struct RejectedUpdate {
    /// Position of the element in the server's batch.
    pub index: usize,
    /// Why it was rejected.
    pub error: ClientError,
}

/// A decoded batch together with the elements that were skipped.
#[derive(Debug, Clone)]
pub struct DecodedBatch {
    pub list: UpdateList,
    pub rejected: Vec<RejectedUpdate>,
}

/// Undecoded form of an [`UpdateList`]: elements are kept as raw JSON so the
/// caller can choose a [`BatchPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawUpdateList {
    pub updates: Vec<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<i64>,
}

impl RawUpdateList {
    /// Decode every element according to `policy`, preserving order.
    pub fn decode(self, policy: BatchPolicy) -> ClientResult<DecodedBatch> {
        let mut updates = Vec::with_capacity(self.updates.len());
        let mut rejected = Vec::new();

        for (index, raw) in self.updates.into_iter().enumerate() {
            match Update::from_value(raw) {
                Ok(update) => updates.push(update),
                Err(error) => match policy {
                    BatchPolicy::FailBatch => return Err(error),
                    BatchPolicy::SkipAndReport => {
                        warn!(index, error = %error, "Skipping update that failed to decode");
                        rejected.push(RejectedUpdate { index, error });
                    }
                },
            }
        }

        Ok(DecodedBatch {
            list: UpdateList {
                updates,
                marker: self.marker,
            },
            rejected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_json() -> serde_json::Value {
        json!({"user_id": 7, "name": "Alice"})
    }

    fn message_json(mid: &str) -> serde_json::Value {
        json!({
            "sender": user_json(),
            "recipient": {"chat_id": 100, "chat_type": "chat"},
            "timestamp": 1_560_000_000_i64,
            "body": {"mid": mid, "seq": 1, "text": "hi"}
        })
    }

    fn sample(tag: UpdateType) -> serde_json::Value {
        let mut value = match tag {
            UpdateType::MessageCreated | UpdateType::MessageEdited => {
                json!({"message": message_json("mid.1")})
            }
            UpdateType::MessageCallback => json!({
                "callback": {
                    "timestamp": 1,
                    "callback_id": "cb.1",
                    "payload": "yes",
                    "user": user_json()
                },
                "message": message_json("mid.1")
            }),
            UpdateType::MessageRemoved | UpdateType::MessageRestored => {
                json!({"message_id": "mid.1"})
            }
            UpdateType::BotAdded | UpdateType::BotRemoved => {
                json!({"chat_id": 100, "user": user_json()})
            }
            UpdateType::UserAdded => json!({"chat_id": 100, "user": user_json(), "inviter_id": 8}),
            UpdateType::UserRemoved => json!({"chat_id": 100, "user": user_json(), "admin_id": 9}),
        };
        value["update_type"] = json!(tag.as_str());
        value["timestamp"] = json!(1_700_000_000_i64);
        value
    }

    #[test]
    fn every_known_tag_decodes_to_its_variant() {
        for tag in UpdateType::ALL {
            let update = Update::from_value(sample(tag)).unwrap();
            assert_eq!(update.update_type(), tag);
            assert_eq!(update.timestamp(), 1_700_000_000);
        }
    }

    #[test]
    fn decoder_table_covers_every_tag_once() {
        for tag in UpdateType::ALL {
            assert_eq!(DECODERS.iter().filter(|(t, _)| *t == tag).count(), 1);
        }
    }

    #[test]
    fn variant_fields_match_payload() {
        match Update::from_value(sample(UpdateType::UserAdded)).unwrap() {
            Update::UserAdded(u) => {
                assert_eq!(u.chat_id, 100);
                assert_eq!(u.user.name, "Alice");
                assert_eq!(u.inviter_id, Some(8));
            }
            other => panic!("unexpected variant {other:?}"),
        }

        match Update::from_value(sample(UpdateType::MessageCallback)).unwrap() {
            Update::MessageCallback(u) => {
                assert_eq!(u.callback.callback_id, "cb.1");
                assert_eq!(u.callback.payload.as_deref(), Some("yes"));
                assert_eq!(u.message.unwrap().id(), "mid.1");
            }
            other => panic!("unexpected variant {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_is_decode_error() {
        let raw = json!({"update_type": "chat_title_changed", "timestamp": 1, "title": "x"});
        let err = Update::from_value(raw).unwrap_err();
        assert!(err.is_decode());
        assert!(err.to_string().contains("chat_title_changed"));
        assert!(err.payload().unwrap().contains("chat_title_changed"));
    }

    #[test]
    fn missing_tag_is_decode_error() {
        let err = Update::from_value(json!({"timestamp": 1})).unwrap_err();
        assert!(err.is_decode());
        assert!(err.to_string().contains("update_type"));
    }

    #[test]
    fn malformed_variant_is_decode_error() {
        let raw = json!({"update_type": "message_removed", "timestamp": 1});
        let err = Update::from_value(raw).unwrap_err();
        assert!(err.is_decode());
        assert!(err.to_string().contains("message_removed"));
    }

    #[test]
    fn serialize_then_deserialize_preserves_update() {
        for tag in UpdateType::ALL {
            let update = Update::from_value(sample(tag)).unwrap();
            let json = serde_json::to_value(&update).unwrap();
            assert_eq!(json["update_type"], tag.as_str());
            let back: Update = serde_json::from_value(json).unwrap();
            assert_eq!(back, update);
        }
    }

    #[test]
    fn strict_list_fails_on_unknown_element() {
        let raw = json!({"updates": [
            sample(UpdateType::MessageRemoved),
            {"update_type": "nope", "timestamp": 1}
        ]});
        assert!(serde_json::from_value::<UpdateList>(raw).is_err());
    }

    #[test]
    fn raw_list_fail_batch_policy() {
        let raw: RawUpdateList = serde_json::from_value(json!({
            "updates": [
                sample(UpdateType::MessageRemoved),
                {"update_type": "nope", "timestamp": 1}
            ],
            "marker": 5
        }))
        .unwrap();
        let err = raw.decode(BatchPolicy::FailBatch).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn raw_list_skip_policy_keeps_order_and_reports() {
        let raw: RawUpdateList = serde_json::from_value(json!({
            "updates": [
                sample(UpdateType::MessageRemoved),
                {"update_type": "nope", "timestamp": 1},
                sample(UpdateType::BotAdded)
            ],
            "marker": 5
        }))
        .unwrap();
        let batch = raw.decode(BatchPolicy::SkipAndReport).unwrap();
        let types: Vec<UpdateType> = batch.list.updates.iter().map(Update::update_type).collect();
        assert_eq!(types, vec![UpdateType::MessageRemoved, UpdateType::BotAdded]);
        assert_eq!(batch.list.marker, Some(5));
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].index, 1);
    }

    #[test]
    fn update_type_from_str() {
        assert_eq!("bot_added".parse::<UpdateType>().unwrap(), UpdateType::BotAdded);
        assert!("bot_joined".parse::<UpdateType>().unwrap_err().is_decode());
    }

    #[test]
    fn time_reads_unix_seconds() {
        let update = Update::from_value(sample(UpdateType::MessageRemoved)).unwrap();
        let time = update.time().unwrap();
        assert_eq!(time.timestamp(), 1_700_000_000);
        assert_eq!(time.to_rfc3339(), "2023-11-14T22:13:20+00:00");
    }

    #[test]
    fn chat_id_is_extracted_where_available() {
        let created = Update::from_value(sample(UpdateType::MessageCreated)).unwrap();
        assert_eq!(created.chat_id(), Some(100));
        let removed = Update::from_value(sample(UpdateType::MessageRemoved)).unwrap();
        assert_eq!(removed.chat_id(), None);
    }
}
