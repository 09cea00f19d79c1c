//! Typed API requests and their completion handles.
//!
//! A [`Query`] is built by one of the [`BotClient`](super::BotClient)
//! constructors, then consumed by [`Query::send`] (inline) or
//! [`Query::execute`] (spawned, returning a [`QueryHandle`]). Both paths run
//! the same steps: local validation, request building, transport call and
//! response classification. A query makes exactly one attempt.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::transport::{ClientResponse, HttpMethod, Transport, TransportRequest, UploadRequest};
use super::upload::UploadSource;
use crate::error::{payload_snippet, ClientError, ClientResult};

/// Where a query is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Path relative to the configured API endpoint.
    Path(String),
    /// Absolute URL, used for upload endpoints handed out by the server.
    Url(String),
}

impl Target {
    /// The path or URL as sent.
    pub fn as_str(&self) -> &str {
        match self {
            Target::Path(p) | Target::Url(p) => p,
        }
    }
}

enum Payload {
    None,
    Json(serde_json::Value),
    Upload(UploadSource),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::None => f.write_str("None"),
            Payload::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Payload::Upload(source) => f.debug_tuple("Upload").field(source).finish(),
        }
    }
}

/// A required parameter and whether it was provided.
#[derive(Debug, Clone)]
struct Requirement {
    name: &'static str,
    present: bool,
}

/// A typed, single-use API request producing `R`.
///
/// Required parameters are checked before any network activity: an unset
/// or blank one fails the query with a validation error and the transport is
/// never called.
#[must_use = "a query does nothing until it is sent or executed"]
pub struct Query<R> {
    transport: Arc<dyn Transport>,
    method: HttpMethod,
    target: Target,
    required: Vec<Requirement>,
    /// Constraint violations found while building (bad ranges, unencodable bodies).
    invalid: Vec<String>,
    params: Vec<(String, String)>,
    payload: Payload,
    timeout: Option<Duration>,
    _result: PhantomData<fn() -> R>,
}

impl<R> fmt::Debug for Query<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("method", &self.method)
            .field("target", &self.target)
            .field("params", &self.params)
            .field("payload", &self.payload)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Whether a parameter value counts as set.
fn is_present(value: &str) -> bool {
    !value.trim().is_empty()
}

impl<R> Query<R> {
    pub(crate) fn new(transport: Arc<dyn Transport>, method: HttpMethod, target: Target) -> Self {
        Self {
            transport,
            method,
            target,
            required: Vec::new(),
            invalid: Vec::new(),
            params: Vec::new(),
            payload: Payload::None,
            timeout: None,
            _result: PhantomData,
        }
    }

    // ── Construction (crate-internal, queries are immutable once returned) ──

    /// Declare a required query-string parameter.
    pub(crate) fn require(mut self, name: &'static str, value: Option<String>) -> Self {
        let value = value.filter(|v| is_present(v));
        self.required.push(Requirement {
            name,
            present: value.is_some(),
        });
        if let Some(v) = value {
            self.params.push((name.to_string(), v));
        }
        self
    }

    /// Declare a required parameter carried outside the query string
    /// (path segment, body, upload source).
    pub(crate) fn require_present(mut self, name: &'static str, present: bool) -> Self {
        self.required.push(Requirement { name, present });
        self
    }

    /// Add an optional query-string parameter.
    pub(crate) fn param<V: ToString>(mut self, name: &str, value: Option<V>) -> Self {
        if let Some(v) = value {
            let v = v.to_string();
            if is_present(&v) {
                self.params.push((name.to_string(), v));
            }
        }
        self
    }

    /// Record a constraint violation unless `ok` holds.
    pub(crate) fn check(mut self, ok: bool, message: impl FnOnce() -> String) -> Self {
        if !ok {
            self.invalid.push(message());
        }
        self
    }

    /// Attach a JSON body. An absent body fails validation under `name`.
    pub(crate) fn body<B: Serialize>(mut self, name: &'static str, body: Option<&B>) -> Self {
        let encoded = match body.map(serde_json::to_value) {
            Some(Ok(value)) => Some(value),
            Some(Err(e)) => {
                self.invalid.push(format!("cannot encode '{name}': {e}"));
                None
            }
            None => None,
        };
        self.required.push(Requirement {
            name,
            present: encoded.is_some(),
        });
        if let Some(value) = encoded {
            self.payload = Payload::Json(value);
        }
        self
    }

    /// Attach an upload source.
    pub(crate) fn upload(mut self, source: UploadSource) -> Self {
        self.payload = Payload::Upload(source);
        self
    }

    /// Override the transport deadline for this query.
    pub(crate) fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    // ── Inspection ──

    /// HTTP method of the request.
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Where the request is sent.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Query-string parameters, in insertion order.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Value of the query-string parameter `name`, if set.
    pub fn param_value(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Transport deadline for this query, if it overrides the default.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Check required parameters and build-time constraints. No I/O.
    pub fn validate(&self) -> ClientResult<()> {
        if let Some(missing) = self.required.iter().find(|r| !r.present) {
            return Err(ClientError::missing_param(missing.name));
        }
        if let Some(message) = self.invalid.first() {
            return Err(ClientError::validation(message.clone()));
        }
        if let Target::Url(url) = &self.target {
            if !is_present(url) {
                return Err(ClientError::missing_param("url"));
            }
        }
        Ok(())
    }
}

impl<R> Query<R>
where
    R: DeserializeOwned + Send + 'static,
{
    /// Run the query on the current task.
    pub async fn send(self) -> ClientResult<R> {
        self.validate()?;
        self.run().await
    }

    /// Start the query in the background and return its completion handle.
    ///
    /// Validation happens before this returns; on failure the handle is
    /// already completed and nothing is spawned. Must be called from within
    /// a tokio runtime.
    pub fn execute(self) -> QueryHandle<R> {
        if let Err(e) = self.validate() {
            debug!(error = %e, "Query rejected before execution");
            return QueryHandle::completed(Err(e));
        }

        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let outcome = self.run().await;
            // The receiver may already be gone; the outcome is then unobserved.
            let _ = tx.send(outcome);
        });

        QueryHandle {
            rx,
            task: Some(task),
        }
    }

    async fn run(self) -> ClientResult<R> {
        let Query {
            transport,
            method,
            target,
            params,
            payload,
            timeout,
            ..
        } = self;

        let started = Instant::now();
        debug!(method = %method, target = %target.as_str(), "Sending query");

        let response = match (payload, &target) {
            (Payload::Upload(source), _) => {
                let (file_name, body) = source.open().await?;
                transport
                    .upload(UploadRequest {
                        url: target.as_str().to_string(),
                        file_name,
                        body,
                    })
                    .await
            }
            (payload, Target::Path(path)) => {
                let body = match payload {
                    Payload::Json(value) => Some(value),
                    _ => None,
                };
                transport
                    .send(TransportRequest {
                        method,
                        path: path.clone(),
                        query: params,
                        body,
                        timeout,
                    })
                    .await
            }
            (_, Target::Url(url)) => {
                return Err(ClientError::validation(format!(
                    "absolute target {url} is only valid for uploads"
                )));
            }
        };

        let response = response.map_err(|e| {
            warn!(method = %method, target = %target.as_str(), error = %e, "Transport failure");
            ClientError::from(e)
        })?;

        debug!(
            method = %method,
            target = %target.as_str(),
            status = response.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Query completed"
        );

        decode_response(response)
    }
}

/// Error body returned by the API on non-2xx statuses.
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Classify a raw response into the typed result or a [`ClientError`].
pub(crate) fn decode_response<R: DeserializeOwned>(response: ClientResponse) -> ClientResult<R> {
    if !response.is_success() {
        return Err(api_error(&response));
    }

    serde_json::from_slice(&response.body).map_err(|e| {
        warn!(status = response.status, error = %e, "Response did not match the expected shape");
        ClientError::decode(format!("unexpected response body: {e}"), &response.body)
    })
}

fn api_error(response: &ClientResponse) -> ClientError {
    match serde_json::from_slice::<ErrorPayload>(&response.body) {
        Ok(ErrorPayload {
            code,
            message: Some(message),
        }) => ClientError::api(response.status, code, message),
        Ok(ErrorPayload {
            code: Some(code), ..
        }) => ClientError::api(response.status, Some(code.clone()), code),
        _ => {
            let message = if response.body.is_empty() {
                format!("HTTP {}", response.status)
            } else {
                payload_snippet(&response.body)
            };
            ClientError::api(response.status, None, message)
        }
    }
}

/// Completion handle of an executing [`Query`].
///
/// Resolves exactly once. Await it from async code, or use
/// [`wait_blocking`](Self::wait_blocking) from a plain thread.
#[must_use = "dropping the handle leaves the query running unobserved"]
pub struct QueryHandle<R> {
    rx: oneshot::Receiver<ClientResult<R>>,
    task: Option<JoinHandle<()>>,
}

impl<R> fmt::Debug for QueryHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl<R> QueryHandle<R> {
    fn completed(outcome: ClientResult<R>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self { rx, task: None }
    }

    /// Whether the outcome is available.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Abort the in-flight call.
    ///
    /// The handle then resolves to [`ClientError::Cancelled`], unless the
    /// query had already produced its outcome, which is kept.
    pub fn cancel(&self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    /// Take the outcome if it is ready, otherwise give the handle back.
    pub fn try_result(mut self) -> Result<ClientResult<R>, Self> {
        match self.rx.try_recv() {
            Ok(outcome) => Ok(outcome),
            Err(oneshot::error::TryRecvError::Empty) => Err(self),
            Err(oneshot::error::TryRecvError::Closed) => Ok(Err(ClientError::Cancelled)),
        }
    }

    /// Block the current thread until the outcome is available.
    ///
    /// # Panics
    ///
    /// Panics when called from within an async execution context.
    pub fn wait_blocking(self) -> ClientResult<R> {
        self.rx
            .blocking_recv()
            .unwrap_or(Err(ClientError::Cancelled))
    }
}

impl<R> Future for QueryHandle<R> {
    type Output = ClientResult<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(ClientError::Cancelled)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::ByteStream;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CannedTransport {
        response: Option<ClientResponse>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl CannedTransport {
        fn replying(status: u16, body: serde_json::Value) -> Arc<Self> {
            Arc::new(Self {
                response: Some(ClientResponse::json(status, &body)),
                ..Self::default()
            })
        }

        fn raw(status: u16, body: &'static [u8]) -> Arc<Self> {
            Arc::new(Self {
                response: Some(ClientResponse {
                    status,
                    headers: vec![],
                    body: bytes::Bytes::from_static(body),
                }),
                ..Self::default()
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn reply(&self) -> Result<ClientResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.response
                .clone()
                .ok_or_else(|| TransportError::connect("connection refused"))
        }
    }

    #[async_trait]
    impl Transport for CannedTransport {
        async fn send(&self, _: TransportRequest) -> Result<ClientResponse, TransportError> {
            self.reply().await
        }

        async fn upload(&self, request: UploadRequest) -> Result<ClientResponse, TransportError> {
            let body: ByteStream = request.body;
            drop(body);
            self.reply().await
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pong {
        ok: bool,
    }

    fn get(transport: Arc<CannedTransport>) -> Query<Pong> {
        Query::new(transport, HttpMethod::Get, Target::Path("/ping".to_string()))
    }

    #[test]
    fn blank_required_param_fails_validation() {
        let transport = CannedTransport::replying(200, json!({"ok": true}));
        let query = get(transport).require("message_id", Some("   ".to_string()));
        let err = query.validate().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("message_id"));
    }

    #[test]
    fn optional_params_skip_none_and_blank() {
        let transport = CannedTransport::replying(200, json!({"ok": true}));
        let query = get(transport)
            .param("count", Some(5))
            .param::<i64>("marker", None)
            .param("text", Some(""));
        assert_eq!(query.params(), &[("count".to_string(), "5".to_string())]);
    }

    #[tokio::test]
    async fn execute_reports_validation_without_calling_transport() {
        let transport = CannedTransport::replying(200, json!({"ok": true}));
        let handle = get(transport.clone()).require("chat_id", None).execute();
        assert!(handle.is_finished());
        let err = handle.await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn success_is_decoded() {
        let transport = CannedTransport::replying(200, json!({"ok": true}));
        let pong = get(transport.clone()).execute().await.unwrap();
        assert_eq!(pong, Pong { ok: true });
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn error_payload_becomes_api_error() {
        let transport = CannedTransport::replying(
            400,
            json!({
                "code": "attachment.not.ready",
                "message": "Key: errors.process.attachment.file.not.processed"
            }),
        );
        let err = get(transport).send().await.unwrap_err();
        assert!(err.is_api());
        assert_eq!(err.code(), Some("attachment.not.ready"));
        assert!(matches!(err, ClientError::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn unparseable_error_body_is_still_api_error() {
        let err = get(CannedTransport::raw(502, b"<html>bad gateway</html>"))
            .send()
            .await
            .unwrap_err();
        match err {
            ClientError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 502);
                assert!(code.is_none());
                assert!(message.contains("bad gateway"));
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn shape_mismatch_is_decode_error_with_payload() {
        let err = get(CannedTransport::raw(200, br#"{"foo":"bar"}"#))
            .send()
            .await
            .unwrap_err();
        assert!(err.is_decode());
        assert_eq!(err.payload(), Some(r#"{"foo":"bar"}"#));
    }

    #[tokio::test]
    async fn transport_failure_is_classified() {
        let transport = Arc::new(CannedTransport::default());
        let err = get(transport).send().await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn cancel_resolves_to_cancelled() {
        let transport = Arc::new(CannedTransport {
            response: Some(ClientResponse::json(200, &json!({"ok": true}))),
            delay: Some(Duration::from_secs(30)),
            calls: AtomicUsize::new(0),
        });
        let handle = get(transport).execute();
        handle.cancel();
        let err = handle.await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_after_completion_keeps_outcome() {
        let transport = CannedTransport::replying(200, json!({"ok": true}));
        let handle = get(transport).execute();
        while !handle.is_finished() {
            tokio::task::yield_now().await;
        }
        handle.cancel();
        assert_eq!(handle.await.unwrap(), Pong { ok: true });
    }

    #[tokio::test]
    async fn try_result_returns_handle_while_pending() {
        let transport = Arc::new(CannedTransport {
            response: Some(ClientResponse::json(200, &json!({"ok": true}))),
            delay: Some(Duration::from_millis(50)),
            calls: AtomicUsize::new(0),
        });
        let handle = match get(transport).execute().try_result() {
            Err(handle) => handle,
            Ok(outcome) => panic!("resolved too early: {outcome:?}"),
        };
        assert_eq!(handle.await.unwrap(), Pong { ok: true });
    }

    #[test]
    fn wait_blocking_outside_runtime() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let transport = CannedTransport::replying(200, json!({"ok": true}));
        let handle = {
            let _guard = runtime.enter();
            get(transport).execute()
        };
        assert_eq!(handle.wait_blocking().unwrap(), Pong { ok: true });
    }

    #[tokio::test]
    async fn missing_upload_file_is_validation_error() {
        let transport = CannedTransport::replying(200, json!({"ok": true}));
        let query: Query<Pong> = Query::new(
            transport.clone(),
            HttpMethod::Post,
            Target::Url("http://upload.example/u".to_string()),
        )
        .upload(UploadSource::from_path("/no/such/file.jpg"));
        let err = query.execute().await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn upload_streams_through_transport() {
        let transport = CannedTransport::replying(200, json!({"ok": true}));
        let query: Query<Pong> = Query::new(
            transport.clone(),
            HttpMethod::Post,
            Target::Url("http://upload.example/u".to_string()),
        )
        .upload(UploadSource::from_bytes("a.txt", &b"abc"[..]));
        assert!(query.send().await.unwrap().ok);
        assert_eq!(transport.calls(), 1);
    }
}
