//! Loopback axum servers for client tests. Each records what it was sent.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::any;
use axum::Router;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One request as the stub saw it.
#[derive(Debug, Clone)]
pub(crate) struct SeenRequest {
    pub method: Method,
    pub query: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl SeenRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

pub(crate) type Seen = Arc<Mutex<Vec<SeenRequest>>>;

#[derive(Clone)]
struct Stub {
    status: StatusCode,
    body: &'static str,
    delay: Option<Duration>,
    seen: Seen,
}

async fn reply(
    State(stub): State<Stub>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> impl IntoResponse {
    stub.seen.lock().unwrap().push(SeenRequest {
        method,
        query,
        body: body.to_vec(),
    });
    if let Some(delay) = stub.delay {
        tokio::time::sleep(delay).await;
    }
    (
        stub.status,
        [(header::CONTENT_TYPE, "application/json")],
        stub.body,
    )
}

async fn spawn(path: &str, stub: Stub) -> String {
    let app = Router::new().route(path, any(reply)).with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{}", addr)
}

/// Answer every request on `path` with `status` and `body`.
/// Returns the base URL and the request log.
pub(crate) async fn serve(path: &str, status: u16, body: &'static str) -> (String, Seen) {
    let seen = Seen::default();
    let stub = Stub {
        status: StatusCode::from_u16(status).unwrap(),
        body,
        delay: None,
        seen: seen.clone(),
    };
    (spawn(path, stub).await, seen)
}

/// Like `serve`, but holds each answer back for `delay`.
pub(crate) async fn serve_slow(path: &str, delay: Duration) -> (String, Seen) {
    let seen = Seen::default();
    let stub = Stub {
        status: StatusCode::OK,
        body: "{}",
        delay: Some(delay),
        seen: seen.clone(),
    };
    (spawn(path, stub).await, seen)
}
