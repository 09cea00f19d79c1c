//! Long-poll update consumer.
//!
//! [`UpdatePoller`] repeatedly calls `GET /updates`, decodes each batch,
//! dispatches its updates in server order and only then advances the marker.
//! A failed cycle leaves the marker untouched, so the same batch is requested
//! again on the next poll: delivery is at-least-once for a single consumer.
//!
//! Polls are never pipelined: every method that talks to the server takes
//! `&mut self`, so the next request starts only after the previous batch has
//! been fully handled. Dropping a `poll_once` or `run_until` future aborts the
//! request it was waiting on.
//!
//! # Example
//!
//! ```no_run
//! use tamtam_rs::client::BotClient;
//! use tamtam_rs::dispatch::UpdateHandlers;
//! use tamtam_rs::poller::PollerConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = BotClient::from_env()?;
//! let mut poller = client.poller(PollerConfig::default());
//! let mut handlers = UpdateHandlers::new().on_message_created(|update| {
//!     println!("{:?}", update.message.text());
//!     Ok(())
//! });
//!
//! poller.run_until(&mut handlers, async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::client::{BotClient, GetUpdatesOptions, QueryHandle, DEFAULT_POLL_TIMEOUT_SECS};
use crate::dispatch::{dispatch, DispatchError, Dispatched, UpdateHandlers};
use crate::error::{ClientError, ClientResult};
use crate::update::{BatchPolicy, RawUpdateList, RejectedUpdate, UpdateType};

/// Errors that end a poll cycle.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The request failed or the batch could not be decoded.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A handler failed or an update had no handler.
    #[error("dispatch of update {index} failed: {source}")]
    Dispatch {
        /// Position of the update in the batch.
        index: usize,
        #[source]
        source: DispatchError,
    },
}

/// Configuration of an [`UpdatePoller`].
#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    /// How long the server holds a request open when there are no updates
    /// (0 to 90 seconds).
    pub timeout: Duration,
    /// Maximum batch size.
    pub limit: Option<u32>,
    /// Update types to receive. `None` means all types.
    pub types: Option<Vec<UpdateType>>,
    /// Handling of batch elements with an unknown or malformed shape.
    pub batch_policy: BatchPolicy,
    /// Marker to resume from, e.g. one persisted by a previous run.
    pub marker: Option<i64>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(u64::from(DEFAULT_POLL_TIMEOUT_SECS)),
            limit: None,
            types: None,
            batch_policy: BatchPolicy::default(),
            marker: None,
        }
    }
}

impl PollerConfig {
    /// Set the server-side long-poll timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum batch size.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Restrict polling to the given update types.
    pub fn with_types(mut self, types: Vec<UpdateType>) -> Self {
        self.types = Some(types);
        self
    }

    /// Set how malformed batch elements are handled.
    pub fn with_batch_policy(mut self, policy: BatchPolicy) -> Self {
        self.batch_policy = policy;
        self
    }

    /// Resume from a previously persisted marker.
    pub fn with_marker(mut self, marker: i64) -> Self {
        self.marker = Some(marker);
        self
    }
}

/// Whether a poll request is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// No request outstanding.
    Idle,
    /// Waiting for the server to answer a poll.
    Polling,
}

/// Outcome of one successful poll cycle.
#[derive(Debug, Clone, Default)]
pub struct PollReport {
    /// Updates received in this batch, after skipping rejected ones.
    pub received: usize,
    /// Updates consumed by a variant handler or the fallback.
    pub handled: usize,
    /// Updates dropped under [`UnhandledPolicy::Ignore`](crate::dispatch::UnhandledPolicy::Ignore).
    pub ignored: usize,
    /// Elements skipped under [`BatchPolicy::SkipAndReport`].
    pub rejected: Vec<RejectedUpdate>,
    /// Marker that the next poll will send.
    pub marker: Option<i64>,
}

/// A poll request owned by the poller for as long as it is outstanding.
///
/// Dropping it aborts the request and returns the poller to idle, so a
/// `poll_once` future dropped mid-flight never leaves a request behind.
struct InFlight<'a> {
    handle: QueryHandle<RawUpdateList>,
    state: &'a mut PollerState,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.handle.cancel();
        *self.state = PollerState::Idle;
    }
}

/// Long-poll consumer with its own marker and state.
#[derive(Debug)]
pub struct UpdatePoller {
    client: BotClient,
    config: PollerConfig,
    marker: Option<i64>,
    state: PollerState,
}

impl UpdatePoller {
    /// Create a poller starting from `config.marker`.
    pub fn new(client: BotClient, config: PollerConfig) -> Self {
        let marker = config.marker;
        Self {
            client,
            config,
            marker,
            state: PollerState::Idle,
        }
    }

    /// Marker sent with the next poll. Persist it to resume after a restart.
    pub fn marker(&self) -> Option<i64> {
        self.marker
    }

    /// Current state of the poller.
    pub fn state(&self) -> PollerState {
        self.state
    }

    /// Configuration this poller was created with.
    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    fn options(&self) -> GetUpdatesOptions {
        let secs = self.config.timeout.as_secs();
        GetUpdatesOptions {
            limit: self.config.limit,
            timeout: Some(u32::try_from(secs).unwrap_or(u32::MAX)),
            marker: self.marker,
            types: self.config.types.clone(),
        }
    }

    /// Issue the request for the next batch. Validation failures leave the
    /// poller idle.
    fn start(&mut self) -> ClientResult<QueryHandle<RawUpdateList>> {
        let query = self.client.get_updates_raw(self.options());
        query.validate()?;
        debug!(marker = ?self.marker, "Polling for updates");
        self.state = PollerState::Polling;
        Ok(query.execute())
    }

    /// Decode and dispatch a completed poll, then advance the marker.
    fn finish(
        &mut self,
        outcome: ClientResult<RawUpdateList>,
        handlers: &mut UpdateHandlers,
    ) -> Result<PollReport, PollError> {
        self.state = PollerState::Idle;

        let raw = outcome.map_err(|e| {
            warn!(error = %e, marker = ?self.marker, "Poll failed");
            e
        })?;
        let batch = raw.decode(self.config.batch_policy)?;

        let mut report = PollReport {
            received: batch.list.updates.len(),
            rejected: batch.rejected,
            ..PollReport::default()
        };

        for (index, update) in batch.list.updates.iter().enumerate() {
            match dispatch(update, handlers) {
                Ok(Dispatched::Handled | Dispatched::Fallback) => report.handled += 1,
                Ok(Dispatched::Ignored) => report.ignored += 1,
                Err(source) => {
                    warn!(
                        index,
                        update_type = %update.update_type(),
                        error = %source,
                        "Dispatch failed, marker not advanced"
                    );
                    return Err(PollError::Dispatch { index, source });
                }
            }
        }

        self.marker = batch.list.marker;
        report.marker = self.marker;
        debug!(
            count = report.received,
            rejected = report.rejected.len(),
            marker = ?self.marker,
            "Poll cycle completed"
        );
        Ok(report)
    }

    /// Run one poll cycle: request, decode, dispatch in order, advance marker.
    pub async fn poll_once(
        &mut self,
        handlers: &mut UpdateHandlers,
    ) -> Result<PollReport, PollError> {
        let handle = self.start()?;
        let mut in_flight = InFlight {
            handle,
            state: &mut self.state,
        };
        let outcome = (&mut in_flight.handle).await;
        drop(in_flight);
        self.finish(outcome, handlers)
    }

    /// Poll until `shutdown` resolves or a cycle fails.
    ///
    /// Shutdown cancels the in-flight request; the marker stays at the last
    /// fully dispatched batch.
    pub async fn run_until<F>(
        &mut self,
        handlers: &mut UpdateHandlers,
        shutdown: F,
    ) -> Result<(), PollError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let handle = self.start()?;
            let mut in_flight = InFlight {
                handle,
                state: &mut self.state,
            };
            let outcome = tokio::select! {
                _ = &mut shutdown => None,
                outcome = &mut in_flight.handle => Some(outcome),
            };
            drop(in_flight);

            match outcome {
                Some(outcome) => {
                    self.finish(outcome, handlers)?;
                }
                None => {
                    debug!(marker = ?self.marker, "Poller shut down");
                    return Ok(());
                }
            }
        }
    }
}
