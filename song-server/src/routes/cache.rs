//! Cache maintenance

use crate::error::ApiResult;
use crate::AppState;
use axum::extract::State;
use axum::routing::post;
use axum::{Extension, Json, Router};
use core_library::RequestContext;
use serde::Serialize;
use tracing::info;

pub fn router() -> Router<AppState> {
    Router::new().route("/cache/recovery", post(recover))
}

#[derive(Debug, Serialize)]
pub struct RecoveryResponse {
    pub message: String,
    pub recovered: usize,
}

/// Rewrite every stored song into the cache
async fn recover(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<RecoveryResponse>> {
    let recovered = state.service.recover_cache(&ctx).await?;
    info!(recovered, "Cache recovery finished");
    Ok(Json(RecoveryResponse {
        message: "cache recovered".to_string(),
        recovered,
    }))
}
