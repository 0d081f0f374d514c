use crate::config::IngestMode;
use crate::drain::{DrainHandle, DrainStatsSnapshot};
use crate::ingest::{IngestError, IngestFront, SubmitReceipt};
use crate::queue::{QueueError, QueueStatsSnapshot};
use crate::storage::{RotatingWriter, WriterStatsSnapshot};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Shared state for the HTTP ingress
#[derive(Clone)]
pub struct AppState {
    pub front: IngestFront,
    /// Local writer, absent when this process only forwards to a remote queue
    pub writer: Option<Arc<RotatingWriter>>,
    pub drain: Option<DrainHandle>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(front: IngestFront) -> Self {
        Self {
            front,
            writer: None,
            drain: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_writer(mut self, writer: Arc<RotatingWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn with_drain(mut self, drain: DrainHandle) -> Self {
        self.drain = Some(drain);
        self
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub status: SubmitReceipt,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub mode: IngestMode,
    pub uptime_seconds: u64,
    pub queue: Option<QueueStatsSnapshot>,
    pub writer: Option<WriterStatsSnapshot>,
    pub drain: Option<DrainStatsSnapshot>,
}

pub async fn health_check() -> &'static str {
    "OK"
}

/// POST /api/messages
///
/// Accepts a JSON string, an object with a string `message` field, or any
/// other JSON value, which is stored as its compact JSON text.
pub async fn submit_message(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let status = state.front.submit(message_content(body)).await?;
    Ok(Json(SubmitResponse { status }))
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let queue = match &state.front {
        IngestFront::Batched(queue) => Some(queue.stats()),
        _ => None,
    };

    Json(StatusResponse {
        mode: state.front.mode(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        queue,
        writer: state.writer.as_ref().map(|w| w.stats()),
        drain: state.drain.as_ref().map(|d| d.stats()),
    })
}

fn message_content(body: Value) -> String {
    match body {
        Value::String(text) => text,
        Value::Object(mut map) => match map.remove("message") {
            Some(Value::String(text)) => text,
            Some(other) => {
                map.insert("message".to_string(), other);
                Value::Object(map).to_string()
            }
            None => Value::Object(map).to_string(),
        },
        other => other.to_string(),
    }
}

// Error handling
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unavailable(String),
    TooManyRequests(String),
    InternalError(String),
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        let message = err.to_string();
        match err {
            IngestError::Validation(_) => ApiError::BadRequest(message),
            IngestError::Queue(QueueError::Closed) => ApiError::Unavailable(message),
            IngestError::Queue(QueueError::Full) => ApiError::TooManyRequests(message),
            IngestError::Storage(e) => {
                tracing::error!(error = %e, "Synchronous append failed");
                ApiError::InternalError(message)
            }
            IngestError::Remote(e) => {
                tracing::error!(error = %e, "Remote queue push failed");
                ApiError::InternalError(message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_content_shapes() {
        assert_eq!(message_content(json!("plain text")), "plain text");
        assert_eq!(message_content(json!({"message": "wrapped"})), "wrapped");
        assert_eq!(message_content(json!({"level": "info"})), r#"{"level":"info"}"#);
        assert_eq!(message_content(json!([1, 2])), "[1,2]");
        assert_eq!(message_content(json!({"message": 7})), r#"{"message":7}"#);
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (
                ApiError::from(IngestError::Validation("empty".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(IngestError::Queue(QueueError::Closed)),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::from(IngestError::Queue(QueueError::Full)),
                StatusCode::TOO_MANY_REQUESTS,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
