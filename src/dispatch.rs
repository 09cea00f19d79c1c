//! Routing of decoded updates to caller-supplied handlers.
//!
//! [`UpdateHandlers`] is a capability set: one optional handler per update
//! variant, an optional fallback for everything else and an
//! [`UnhandledPolicy`] that decides what happens when neither applies.
//! [`dispatch`] calls exactly one handler per update, or applies the policy.
//!
//! # Example
//!
//! ```
//! use tamtam_rs::dispatch::{dispatch, UpdateHandlers, UnhandledPolicy};
//! use tamtam_rs::update::Update;
//!
//! let mut handlers = UpdateHandlers::new()
//!     .on_message_created(|update| {
//!         println!("new message {}", update.message.id());
//!         Ok(())
//!     })
//!     .with_policy(UnhandledPolicy::Ignore);
//!
//! let raw = serde_json::json!({
//!     "update_type": "message_removed",
//!     "timestamp": 1,
//!     "message_id": "mid.1"
//! });
//! let update = Update::from_value(raw).unwrap();
//! dispatch(&update, &mut handlers).unwrap();
//! ```

use std::fmt;

use tracing::debug;

use crate::update::{
    BotAddedToChatUpdate, BotRemovedFromChatUpdate, MessageCallbackUpdate, MessageCreatedUpdate,
    MessageEditedUpdate, MessageRemovedUpdate, MessageRestoredUpdate, Update, UpdateType,
    UserAddedToChatUpdate, UserRemovedFromChatUpdate,
};

/// Error type handlers may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type of a handler.
pub type HandlerResult = Result<(), HandlerError>;

type Handler<T> = Box<dyn FnMut(&T) -> HandlerResult + Send>;

/// What [`dispatch`] does with an update that has neither a variant handler
/// nor a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnhandledPolicy {
    /// Drop the update silently (logged at debug level).
    Ignore,
    /// Fail with [`DispatchError::Unhandled`] naming the variant.
    #[default]
    Fail,
}

/// Errors produced by [`dispatch`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No handler covers this variant and the policy is [`UnhandledPolicy::Fail`].
    #[error("no handler registered for update type '{0}'")]
    Unhandled(UpdateType),

    /// The selected handler returned an error.
    #[error("handler for '{update_type}' failed: {source}")]
    Handler {
        update_type: UpdateType,
        #[source]
        source: HandlerError,
    },
}

/// How an update was consumed by [`dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// The variant-specific handler ran.
    Handled,
    /// The fallback handler ran.
    Fallback,
    /// Nothing ran; the policy is [`UnhandledPolicy::Ignore`].
    Ignored,
}

/// A set of handlers, at most one per update variant.
#[derive(Default)]
pub struct UpdateHandlers {
    message_created: Option<Handler<MessageCreatedUpdate>>,
    message_callback: Option<Handler<MessageCallbackUpdate>>,
    message_edited: Option<Handler<MessageEditedUpdate>>,
    message_removed: Option<Handler<MessageRemovedUpdate>>,
    message_restored: Option<Handler<MessageRestoredUpdate>>,
    bot_added: Option<Handler<BotAddedToChatUpdate>>,
    bot_removed: Option<Handler<BotRemovedFromChatUpdate>>,
    user_added: Option<Handler<UserAddedToChatUpdate>>,
    user_removed: Option<Handler<UserRemovedFromChatUpdate>>,
    fallback: Option<Handler<Update>>,
    policy: UnhandledPolicy,
}

impl fmt::Debug for UpdateHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handled: Vec<UpdateType> = UpdateType::ALL
            .into_iter()
            .filter(|t| self.handles(*t))
            .collect();
        f.debug_struct("UpdateHandlers")
            .field("handled", &handled)
            .field("fallback", &self.fallback.is_some())
            .field("policy", &self.policy)
            .finish()
    }
}

impl UpdateHandlers {
    /// An empty handler set with the [`UnhandledPolicy::Fail`] policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the policy for updates no handler covers.
    pub fn with_policy(mut self, policy: UnhandledPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Current policy.
    pub fn policy(&self) -> UnhandledPolicy {
        self.policy
    }

    /// Handle `message_created` updates.
    pub fn on_message_created<F>(mut self, f: F) -> Self
    where
        F: FnMut(&MessageCreatedUpdate) -> HandlerResult + Send + 'static,
    {
        self.message_created = Some(Box::new(f));
        self
    }

    /// Handle button presses (`message_callback`).
    pub fn on_message_callback<F>(mut self, f: F) -> Self
    where
        F: FnMut(&MessageCallbackUpdate) -> HandlerResult + Send + 'static,
    {
        self.message_callback = Some(Box::new(f));
        self
    }

    /// Handle `message_edited` updates.
    pub fn on_message_edited<F>(mut self, f: F) -> Self
    where
        F: FnMut(&MessageEditedUpdate) -> HandlerResult + Send + 'static,
    {
        self.message_edited = Some(Box::new(f));
        self
    }

    /// Handle `message_removed` updates.
    pub fn on_message_removed<F>(mut self, f: F) -> Self
    where
        F: FnMut(&MessageRemovedUpdate) -> HandlerResult + Send + 'static,
    {
        self.message_removed = Some(Box::new(f));
        self
    }

    /// Handle `message_restored` updates.
    pub fn on_message_restored<F>(mut self, f: F) -> Self
    where
        F: FnMut(&MessageRestoredUpdate) -> HandlerResult + Send + 'static,
    {
        self.message_restored = Some(Box::new(f));
        self
    }

    /// Handle the bot being added to a chat.
    pub fn on_bot_added<F>(mut self, f: F) -> Self
    where
        F: FnMut(&BotAddedToChatUpdate) -> HandlerResult + Send + 'static,
    {
        self.bot_added = Some(Box::new(f));
        self
    }

    /// Handle the bot being removed from a chat.
    pub fn on_bot_removed<F>(mut self, f: F) -> Self
    where
        F: FnMut(&BotRemovedFromChatUpdate) -> HandlerResult + Send + 'static,
    {
        self.bot_removed = Some(Box::new(f));
        self
    }

    /// Handle a user joining or being added to a chat.
    pub fn on_user_added<F>(mut self, f: F) -> Self
    where
        F: FnMut(&UserAddedToChatUpdate) -> HandlerResult + Send + 'static,
    {
        self.user_added = Some(Box::new(f));
        self
    }

    /// Handle a user leaving or being removed from a chat.
    pub fn on_user_removed<F>(mut self, f: F) -> Self
    where
        F: FnMut(&UserRemovedFromChatUpdate) -> HandlerResult + Send + 'static,
    {
        self.user_removed = Some(Box::new(f));
        self
    }

    /// Handler for every variant without a specific handler. Takes precedence
    /// over the [`UnhandledPolicy`].
    pub fn fallback<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Update) -> HandlerResult + Send + 'static,
    {
        self.fallback = Some(Box::new(f));
        self
    }

    /// Whether a variant-specific handler is registered for `update_type`.
    pub fn handles(&self, update_type: UpdateType) -> bool {
        match update_type {
            UpdateType::MessageCreated => self.message_created.is_some(),
            UpdateType::MessageCallback => self.message_callback.is_some(),
            UpdateType::MessageEdited => self.message_edited.is_some(),
            UpdateType::MessageRemoved => self.message_removed.is_some(),
            UpdateType::MessageRestored => self.message_restored.is_some(),
            UpdateType::BotAdded => self.bot_added.is_some(),
            UpdateType::BotRemoved => self.bot_removed.is_some(),
            UpdateType::UserAdded => self.user_added.is_some(),
            UpdateType::UserRemoved => self.user_removed.is_some(),
        }
    }

    /// Tags worth asking the server for: the handled variants, or `None`
    /// (everything) when a fallback is set or nothing is registered.
    pub fn subscribed_types(&self) -> Option<Vec<UpdateType>> {
        if self.fallback.is_some() {
            return None;
        }
        let types: Vec<UpdateType> = UpdateType::ALL
            .into_iter()
            .filter(|t| self.handles(*t))
            .collect();
        if types.is_empty() {
            None
        } else {
            Some(types)
        }
    }
}

/// Route `update` to exactly one handler in `handlers`.
///
/// Order: variant handler, then fallback, then the [`UnhandledPolicy`].
pub fn dispatch(
    update: &Update,
    handlers: &mut UpdateHandlers,
) -> Result<Dispatched, DispatchError> {
    let update_type = update.update_type();

    let outcome = match update {
        Update::MessageCreated(u) => handlers.message_created.as_mut().map(|h| h(u)),
        Update::MessageCallback(u) => handlers.message_callback.as_mut().map(|h| h(u)),
        Update::MessageEdited(u) => handlers.message_edited.as_mut().map(|h| h(u)),
        Update::MessageRemoved(u) => handlers.message_removed.as_mut().map(|h| h(u)),
        Update::MessageRestored(u) => handlers.message_restored.as_mut().map(|h| h(u)),
        Update::BotAdded(u) => handlers.bot_added.as_mut().map(|h| h(u)),
        Update::BotRemoved(u) => handlers.bot_removed.as_mut().map(|h| h(u)),
        Update::UserAdded(u) => handlers.user_added.as_mut().map(|h| h(u)),
        Update::UserRemoved(u) => handlers.user_removed.as_mut().map(|h| h(u)),
    };

    let (result, dispatched) = match outcome {
        Some(result) => (result, Dispatched::Handled),
        None => match handlers.fallback.as_mut() {
            Some(fallback) => (fallback(update), Dispatched::Fallback),
            None => {
                return match handlers.policy {
                    UnhandledPolicy::Ignore => {
                        debug!(update_type = %update_type, "Ignoring unhandled update");
                        Ok(Dispatched::Ignored)
                    }
                    UnhandledPolicy::Fail => Err(DispatchError::Unhandled(update_type)),
                }
            }
        },
    };

    result
        .map(|()| dispatched)
        .map_err(|source| DispatchError::Handler {
            update_type,
            source,
        })
}
