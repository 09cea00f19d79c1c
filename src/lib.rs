//! # tamtam-rs: Rust client for the TamTam Bot API
//!
//! This crate lets a bot talk to the
//! [TamTam Bot API](https://dev.tamtam.chat): it builds typed requests,
//! executes them over HTTP, decodes the platform's polymorphic JSON and runs
//! a long-polling loop that delivers updates to your handlers.
//!
//! ## Overview
//!
//! - **Queries** ([`client::Query`]): every API call is a single-use typed
//!   request. Required parameters are checked locally before anything goes on
//!   the wire, and every failure is classified into one [`error::ErrorKind`].
//!   There are no automatic retries.
//! - **Updates** ([`update::Update`]): a closed enum over the event kinds the
//!   server pushes, decoded by the `update_type` tag.
//! - **Dispatch** ([`dispatch::UpdateHandlers`]): one optional handler per
//!   update kind plus an explicit policy for unhandled ones.
//! - **Polling** ([`poller::UpdatePoller`]): long-polls `GET /updates`,
//!   dispatches in server order and advances the marker only after a batch
//!   is fully handled.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tamtam_rs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = BotClient::from_env()?;
//!     let replier = client.clone();
//!
//!     let mut handlers = UpdateHandlers::new()
//!         .on_message_created(move |update| {
//!             let Some(chat_id) = update.message.recipient.chat_id else {
//!                 return Ok(());
//!             };
//!             let text = update.message.text().unwrap_or("...").to_string();
//!             // Fire and forget; the handle resolves in the background.
//!             let _ = replier
//!                 .send_message(NewMessageBody::text(text), SendMessageOptions::to_chat(chat_id))
//!                 .execute();
//!             Ok(())
//!         })
//!         .with_policy(UnhandledPolicy::Ignore);
//!
//!     let mut poller = client.poller(PollerConfig::default());
//!     poller
//!         .run_until(&mut handlers, async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`client::BotClient`]: one constructor per API endpoint
//! - [`client::Transport`]: HTTP abstraction, [`client::ReqwestTransport`] by default
//! - [`client::QueryHandle`]: await, block on, poll or cancel a running query
//! - [`types`]: messages, chats, attachments and upload results
//! - [`builders`]: [`ClientBuilder`] and [`builders::KeyboardBuilder`]
//!
//! See `demos/echo_bot.rs` for a complete bot.

pub mod builders;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod poller;
pub mod types;
pub mod update;

/// Prelude module that re-exports commonly used types and traits.
///
/// ```
/// use tamtam_rs::prelude::*;
///
/// let body = NewMessageBody::text("hi");
/// assert_eq!(body.text.as_deref(), Some("hi"));
/// ```
pub mod prelude {
    pub use crate::builders::{ClientBuilder, KeyboardBuilder};
    pub use crate::client::{
        BotClient, GetChatsOptions, GetMessagesOptions, GetUpdatesOptions, Query, QueryHandle,
        SendMessageOptions, Transport, UploadSource,
    };
    pub use crate::dispatch::{dispatch, DispatchError, UnhandledPolicy, UpdateHandlers};
    pub use crate::error::{ClientError, ClientResult, ErrorKind};
    pub use crate::poller::{PollError, PollReport, PollerConfig, UpdatePoller};
    pub use crate::types::{
        AttachmentRequest, Button, Chat, Message, NewMessageBody, UploadType, User,
    };
    pub use crate::update::{BatchPolicy, Update, UpdateList, UpdateType};
}

pub use builders::ClientBuilder;
pub use client::BotClient;
pub use error::{ClientError, ClientResult};
