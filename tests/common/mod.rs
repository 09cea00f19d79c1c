//! Shared test utilities for integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::{json, Value};
use tamtam_rs::client::{
    BotClient, ClientResponse, Transport, TransportRequest, UploadRequest,
};
use tamtam_rs::error::TransportError;

// ============================================================================
// Mock transport
// ============================================================================

/// What the mock does for the next call.
#[derive(Debug, Clone)]
pub enum Reply {
    Response(ClientResponse),
    Fail(TransportError),
    /// Never completes; only cancellation ends the call.
    Hang,
}

/// An upload as seen by the transport.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub url: String,
    pub file_name: String,
    pub content: Vec<u8>,
}

/// Records every call and answers from a queue of scripted replies.
///
/// Once the queue is empty, calls hang forever.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<TransportRequest>>,
    uploads: Mutex<Vec<RecordedUpload>>,
    delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn client(self: &Arc<Self>) -> BotClient {
        BotClient::with_transport(self.clone())
    }

    pub fn reply_json(&self, status: u16, body: Value) -> &Self {
        self.push(Reply::Response(ClientResponse::json(status, &body)))
    }

    pub fn reply_raw(&self, status: u16, body: &str) -> &Self {
        self.push(Reply::Response(ClientResponse {
            status,
            headers: vec![],
            body: bytes::Bytes::from(body.to_string()),
        }))
    }

    pub fn reply_error(&self, error: TransportError) -> &Self {
        self.push(Reply::Fail(error))
    }

    pub fn push(&self, reply: Reply) -> &Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    /// Delay every answer, to widen windows for overlap detection.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }

    /// Total number of transport calls, API and upload.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len() + self.uploads.lock().unwrap().len()
    }

    /// Calls currently waiting for an answer.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn answer(&self) -> Result<ClientResponse, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.replies.lock().unwrap().pop_front();
        match reply.unwrap_or(Reply::Hang) {
            Reply::Response(response) => Ok(response),
            Reply::Fail(error) => Err(error),
            Reply::Hang => futures::future::pending().await,
        }
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<ClientResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.answer().await
    }

    async fn upload(&self, request: UploadRequest) -> Result<ClientResponse, TransportError> {
        let content: Vec<u8> = request
            .body
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
            .map_err(|e| TransportError::io(e.to_string()))?;
        self.uploads.lock().unwrap().push(RecordedUpload {
            url: request.url,
            file_name: request.file_name,
            content,
        });
        self.answer().await
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn user_json(user_id: i64, name: &str) -> Value {
    json!({"user_id": user_id, "name": name, "username": null})
}

pub fn message_json(mid: &str, chat_id: i64, text: &str) -> Value {
    json!({
        "sender": user_json(100, "alice"),
        "recipient": {"chat_id": chat_id, "chat_type": "dialog"},
        "timestamp": 1_700_000_000_i64,
        "body": {"mid": mid, "seq": 1, "text": text}
    })
}

pub fn message_created_json(mid: &str, text: &str) -> Value {
    json!({
        "update_type": "message_created",
        "timestamp": 1_700_000_000_i64,
        "message": message_json(mid, 42, text)
    })
}

/// One sample of every known update kind, in declaration order.
pub fn every_update_json() -> Vec<Value> {
    vec![
        message_created_json("mid.1", "hello"),
        json!({
            "update_type": "message_callback",
            "timestamp": 2,
            "callback": {
                "timestamp": 2,
                "callback_id": "cb.1",
                "payload": "yes",
                "user": user_json(100, "alice")
            },
            "message": message_json("mid.2", 42, "pick one")
        }),
        json!({
            "update_type": "message_edited",
            "timestamp": 3,
            "message": message_json("mid.3", 42, "edited")
        }),
        json!({"update_type": "message_removed", "timestamp": 4, "message_id": "mid.4"}),
        json!({"update_type": "message_restored", "timestamp": 5, "message_id": "mid.5"}),
        json!({
            "update_type": "bot_added",
            "timestamp": 6,
            "chat_id": 42,
            "user": user_json(100, "alice")
        }),
        json!({
            "update_type": "bot_removed",
            "timestamp": 7,
            "chat_id": 42,
            "user": user_json(100, "alice")
        }),
        json!({
            "update_type": "user_added",
            "timestamp": 8,
            "chat_id": 42,
            "user": user_json(101, "bob"),
            "inviter_id": 100
        }),
        json!({
            "update_type": "user_removed",
            "timestamp": 9,
            "chat_id": 42,
            "user": user_json(101, "bob"),
            "admin_id": 100
        }),
    ]
}

pub fn update_list_json(updates: Vec<Value>, marker: Option<i64>) -> Value {
    match marker {
        Some(marker) => json!({"updates": updates, "marker": marker}),
        None => json!({"updates": updates}),
    }
}

// ============================================================================
// Mock bot API server
// ============================================================================

/// Start a router on a random local port.
pub async fn start_test_server(app: axum::Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Brief wait for the server to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (base_url, handle)
}
