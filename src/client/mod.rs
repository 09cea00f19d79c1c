//! Bot API client: queries, transports and uploads.
//!
//! - [`BotClient`]: one typed constructor per API endpoint
//! - [`Query`] / [`QueryHandle`]: single-use request and its completion handle
//! - [`Transport`] / [`ReqwestTransport`]: pluggable HTTP layer
//! - [`UploadSource`]: file, reader or in-memory content for uploads
//!
//! # Quick Start
//!
//! ```no_run
//! use tamtam_rs::client::{BotClient, GetUpdatesOptions};
//!
//! # async fn example() -> Result<(), tamtam_rs::error::ClientError> {
//! let client = BotClient::from_env()?;
//!
//! // Inline:
//! let me = client.get_my_info().send().await?;
//!
//! // Spawned, with a handle that can be cancelled:
//! let handle = client.get_updates(GetUpdatesOptions::default()).execute();
//! let batch = handle.await?;
//! println!("{} got {} updates", me.name, batch.updates.len());
//! # Ok(())
//! # }
//! ```

mod bot_client;
mod query;
mod transport;
mod upload;

pub use bot_client::{
    BotClient, GetChatsOptions, GetMessagesOptions, GetUpdatesOptions, SendMessageOptions,
    DEFAULT_POLL_TIMEOUT_SECS, MAX_POLL_TIMEOUT_SECS, MAX_UPDATES_LIMIT, POLL_DEADLINE_MARGIN,
};
pub use query::{Query, QueryHandle, Target};
pub use transport::{
    ByteStream, ClientResponse, HttpMethod, ReqwestTransport, Transport, TransportConfig,
    TransportRequest, UploadRequest, BASE_URL_ENV, DEFAULT_BASE_URL, TOKEN_ENV,
};
pub use upload::{UploadSource, UPLOAD_BUFFER_SIZE, UPLOAD_CHUNK_SIZE};
