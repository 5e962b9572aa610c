//! Per-request context
//!
//! Builds the [`RequestContext`] each handler receives: a fresh cancellation
//! token, a deadline from the configured request timeout and a span carrying
//! a request id. The token is cancelled when the response future is dropped,
//! so work for a disconnected client stops at its next await point.

use crate::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use core_library::RequestContext;
use std::time::Instant;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

pub async fn request_context(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!(
        "request",
        %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let ctx = RequestContext::background()
        .with_timeout(state.request_timeout)
        .with_span(span.clone());
    let _cancel_on_drop = ctx.token().clone().drop_guard();
    request.extensions_mut().insert(ctx);

    let started = Instant::now();
    async move {
        let response = next.run(request).await;
        info!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );
        response
    }
    .instrument(span)
    .await
}
