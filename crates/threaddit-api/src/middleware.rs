use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use threaddit_types::api::Claims;

use crate::auth::verify_token;
use crate::error::ApiError;
use crate::state::AppState;

/// Identity of whoever is calling an optionally-authenticated route.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<Claims>);

impl Viewer {
    pub fn user_id(&self) -> Option<i64> {
        self.0.as_ref().map(|claims| claims.sub)
    }
}

/// Attach a [`Viewer`]. No `Authorization` header means anonymous; a header
/// carrying a bad token is rejected rather than silently downgraded.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let viewer = match bearer_token(&req) {
        None => Viewer(None),
        Some(token) => Viewer(Some(decode(&state, token?)?)),
    };

    req.extensions_mut().insert(viewer);
    Ok(next.run(req).await)
}

/// Require a valid bearer token and attach its [`Claims`].
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&req).ok_or(ApiError::Unauthorized)??;
    let claims = decode(&state, token)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// `None` when the header is absent, an error when it is malformed.
fn bearer_token(req: &Request) -> Option<Result<&str, ApiError>> {
    let value = req.headers().get(header::AUTHORIZATION)?;

    Some(
        value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::Unauthorized),
    )
}

fn decode(state: &AppState, token: &str) -> Result<Claims, ApiError> {
    verify_token(&state.jwt_secret, token).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        ApiError::Unauthorized
    })
}
