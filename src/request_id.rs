//! Per-request identifier plumbing.
//!
//! Every request gets an id (taken from `x-request-id` when the client sends
//! one, generated otherwise) that is scoped to the handling task so error
//! responses and log lines can reference it without threading it through
//! every call.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;

use axum::{extract::Request, middleware::Next, response::Response};
use http::Request as HttpRequest;
use tower_http::trace::MakeSpan;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct RequestId(pub String);

impl Default for RequestId {
    fn default() -> Self {
        RequestId(Uuid::new_v4().to_string())
    }
}

impl RequestId {
    pub fn new(value: impl Into<String>) -> Self {
        RequestId(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

tokio::task_local! {
    static CURRENT_REQUEST_ID: RefCell<Option<RequestId>>;
}

pub async fn scope_request_id<Fut, R>(request_id: RequestId, future: Fut) -> R
where
    Fut: Future<Output = R>,
{
    CURRENT_REQUEST_ID
        .scope(RefCell::new(Some(request_id)), future)
        .await
}

pub fn current_request_id() -> Option<RequestId> {
    CURRENT_REQUEST_ID
        .try_with(|cell| cell.borrow().clone())
        .ok()
        .flatten()
}

fn request_id_from<B>(request: &HttpRequest<B>) -> RequestId {
    request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(RequestId::new)
        .unwrap_or_default()
}

/// Axum middleware that scopes the request id around the rest of the stack.
pub async fn propagate_request_id(request: Request, next: Next) -> Response {
    let request_id = request_id_from(&request);
    scope_request_id(request_id, next.run(request)).await
}

/// Span maker for `tower_http::trace` that tags spans with the request id.
#[derive(Clone, Default)]
pub struct RequestSpanMaker;

impl<B> MakeSpan<B> for RequestSpanMaker {
    fn make_span(&mut self, request: &HttpRequest<B>) -> tracing::Span {
        let request_id = request_id_from(request);
        tracing::info_span!(
            "http.request",
            request_id = %request_id.as_str(),
            method = %request.method(),
            uri = %request.uri(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scoped_id_is_visible_inside_and_gone_outside() {
        assert!(current_request_id().is_none());
        scope_request_id(RequestId::new("abc"), async {
            assert_eq!(current_request_id().map(|r| r.0), Some("abc".to_string()));
        })
        .await;
        assert!(current_request_id().is_none());
    }
}
