use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Json, Response},
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::router::{InstituteRouter, RequestInstituteContext};

/// Header carrying the raw institute identifier. The upstream auth layer is
/// expected to copy the code out of its credential claims into this header.
pub const INSTITUTE_HEADER: &str = "x-institute-code";

/// Middleware that routes the request to its institute's database and injects
/// the resulting context. Every failure is forwarded typed to the client,
/// never swallowed.
pub async fn resolve_institute_middleware(
    State(router): State<Arc<InstituteRouter>>,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<serde_json::Value>)> {
    let raw = request
        .headers()
        .get(INSTITUTE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let context: RequestInstituteContext = router.route(raw).await.map_err(|e| {
        let api_error: ApiError = e.into();
        (
            StatusCode::from_u16(api_error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(api_error.to_json()),
        )
    })?;

    tracing::debug!(
        "Attached institute context: {} -> {}",
        context.institute_code,
        context.handle.db_name()
    );

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}
