//! Fan-out of every request that is not a registry operation

use axum::{
    extract::{Request, State},
    response::{IntoResponse, Response},
};
use http_body_util::Limited;
use regproxy_core::{CancelSignal, headers::relayed_headers};

use crate::error::ApiError;
use crate::state::AppState;

/// Forward the request to all upstreams and relay the selected response.
///
/// If the client disconnects, the handler future is dropped and the
/// dispatch with it; forwards already in flight finish on their own.
pub(crate) async fn proxy(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    let cancel = CancelSignal::with_timeout(state.dispatch_timeout);
    let request = request.map(|body| Limited::new(body, state.max_body_size));

    let upstream = state.dispatcher.dispatch(request, &cancel).await?;

    let mut response = (upstream.status, upstream.body).into_response();
    *response.headers_mut() = relayed_headers(&upstream.headers);

    Ok(response)
}
