use tracing::warn;

use threaddit_types::api::Claims;
use threaddit_types::models::Role;

use crate::error::ApiError;
use crate::state::{AppState, with_db};

/// Roles allowed to manage a subpost.
pub const MANAGERS: &[Role] = &[Role::Admin, Role::Mod];

/// Fail with 403 unless the caller holds one of `allowed` for the subpost or
/// globally. Call at the top of a handler, before touching any input.
pub async fn require_role(
    state: &AppState,
    claims: &Claims,
    subpost_id: i64,
    allowed: &'static [Role],
) -> Result<(), ApiError> {
    let user_id = claims.sub;
    let permitted =
        with_db(state, move |db| db.has_any_role(user_id, allowed, Some(subpost_id))).await?;

    if permitted {
        Ok(())
    } else {
        warn!(
            "User {} lacks {:?} on subpost {}",
            claims.username, allowed, subpost_id
        );
        Err(ApiError::Forbidden)
    }
}

pub async fn is_admin(state: &AppState, claims: &Claims, subpost_id: i64) -> Result<bool, ApiError> {
    let user_id = claims.sub;
    with_db(state, move |db| db.has_any_role(user_id, &[Role::Admin], Some(subpost_id))).await
}
