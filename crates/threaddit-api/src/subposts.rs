use std::sync::LazyLock;

use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
};
use regex::Regex;
use tracing::info;

use threaddit_db::models::{NewSubpost, SubpostPatch};
use threaddit_db::query::{InfoFilter, InfoOrder, InfoQuery, Page};
use threaddit_types::api::{
    Claims, CreatedResponse, ListQuery, MessageResponse, PostData, SearchQuery, SubpostData,
    SubpostInfoView, SubpostListing, SubpostView, UpdatedResponse, overlay,
};
use threaddit_types::models::prefixed_name;

use crate::error::ApiError;
use crate::form::SubpostForm;
use crate::guards::{MANAGERS, is_admin, require_role};
use crate::middleware::Viewer;
use crate::state::{AppState, with_db};
use crate::views::{info_view, subpost_view};

/// Bare community names: at least three word characters.
static SUBPOST_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w{3,}$").expect("subpost name pattern is valid"));

pub fn is_valid_subpost_name(name: &str) -> bool {
    SUBPOST_NAME.is_match(name)
}

/// GET /subposts: the viewer's subscriptions plus member and post rankings,
/// each paginated on its own.
pub async fn get_subposts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<SubpostListing>, ApiError> {
    let page = Page::new(query.limit(), query.offset());
    let viewer_id = viewer.user_id();

    let listing = with_db(&state, move |db| {
        let subscribed = match viewer_id {
            Some(user_id) => db
                .subscribed_subposts(user_id, page)?
                .into_iter()
                .map(|row| subpost_view(db, row, Some(user_id)))
                .collect::<anyhow::Result<Vec<_>>>()?,
            None => vec![],
        };

        let all = db
            .query_subpost_info(&InfoQuery::by_members(page))?
            .into_iter()
            .map(info_view)
            .collect();
        let popular = db
            .query_subpost_info(&InfoQuery::by_posts(page))?
            .into_iter()
            .map(info_view)
            .collect();

        Ok(SubpostListing {
            subscribed,
            all,
            popular,
        })
    })
    .await?;

    Ok(Json(listing))
}

/// GET /subposts/search?name=
pub async fn subpost_search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SubpostInfoView>>, ApiError> {
    let query_spec = InfoQuery::new(InfoFilter::NameContains(query.name), InfoOrder::Name);
    let rows = with_db(&state, move |db| db.query_subpost_info(&query_spec)).await?;

    Ok(Json(rows.into_iter().map(info_view).collect()))
}

/// GET /subposts/get/all
pub async fn get_all_subposts(
    State(state): State<AppState>,
) -> Result<Json<Vec<SubpostView>>, ApiError> {
    let views = with_db(&state, |db| {
        db.list_subposts_by_name()?
            .into_iter()
            .map(|row| subpost_view(db, row, None))
            .collect::<anyhow::Result<Vec<_>>>()
    })
    .await?;

    Ok(Json(views))
}

/// GET /subposts/{post_name}: base record with its aggregate counters
/// laid over it.
pub async fn get_subpost_by_name(
    State(state): State<AppState>,
    Path(post_name): Path<String>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<PostData>, ApiError> {
    let name = prefixed_name(&post_name);
    let viewer_id = viewer.user_id();

    let merged = with_db(&state, move |db| {
        let Some(base) = db.get_subpost_by_name(&name)? else {
            return Ok(None);
        };
        let info = db.get_subpost_info_by_name(&name)?.map(info_view);
        let view = subpost_view(db, base, viewer_id)?;
        Ok(Some(overlay(&view, info.as_ref())?))
    })
    .await?
    .ok_or(ApiError::NotFound("Post not found"))?;

    Ok(Json(PostData { post_data: merged }))
}

/// POST /subposts/subscription/{tid}
pub async fn subscribe(
    State(state): State<AppState>,
    Path(tid): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MessageResponse>, ApiError> {
    let tid = parse_tid(&tid).ok_or(ApiError::BadRequest("Invalid Post"))?;
    let user_id = claims.sub;

    let subscribed = with_db(&state, move |db| {
        if db.get_subpost_by_id(tid)?.is_none() {
            return Ok(false);
        }
        db.subscribe(user_id, tid)?;
        Ok(true)
    })
    .await?;

    if !subscribed {
        return Err(ApiError::BadRequest("Invalid Post"));
    }

    info!("{} subscribed to subpost {}", claims.username, tid);
    Ok(Json(MessageResponse::new("Subscribed")))
}

/// DELETE /subposts/subscription/{tid}
pub async fn unsubscribe(
    State(state): State<AppState>,
    Path(tid): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MessageResponse>, ApiError> {
    let tid = parse_tid(&tid).ok_or(ApiError::BadRequest("Invalid Subscription"))?;
    let user_id = claims.sub;

    let removed = with_db(&state, move |db| db.unsubscribe(user_id, tid)).await?;
    if !removed {
        return Err(ApiError::BadRequest("Invalid Subscription"));
    }

    info!("{} unsubscribed from subpost {}", claims.username, tid);
    Ok(Json(MessageResponse::new("UnSubscribed")))
}

/// POST /subpost (multipart). Create a community; its creator becomes a
/// moderator.
pub async fn create_subpost(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<Json<CreatedResponse>, ApiError> {
    let form = SubpostForm::read(multipart).await?;

    let name = form
        .raw_field("name")
        .filter(|name| is_valid_subpost_name(name))
        .ok_or(ApiError::BadRequest("Post name is required"))?;

    let stored = match &form.media {
        Some(upload) => Some(state.media.store(upload).await?),
        None => None,
    };

    let new = NewSubpost {
        name: prefixed_name(name),
        description: form.owned_field("description"),
        logo: stored.clone().or_else(|| form.owned_field("content_url")),
        created_by: claims.sub,
    };
    let user_id = claims.sub;

    let created = with_db(&state, move |db| {
        let row = db.create_subpost(&new)?;
        subpost_view(db, row, Some(user_id))
    })
    .await;

    match created {
        Ok(view) => {
            info!("{} created {} (id {})", claims.username, view.name, view.id);
            Ok(Json(CreatedResponse {
                message: "Post has been created".to_string(),
                post_data: view,
            }))
        }
        Err(err) => {
            if let Some(url) = stored {
                state.media.discard(&url).await;
            }
            Err(err)
        }
    }
}

/// PATCH /subpost/{tid} (multipart). Partial update by a moderator or admin.
pub async fn update_subpost(
    State(state): State<AppState>,
    Path(tid): Path<String>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<Json<UpdatedResponse>, ApiError> {
    let tid = parse_tid(&tid).ok_or(ApiError::BadRequest("Invalid Post"))?;
    require_role(&state, &claims, tid, MANAGERS).await?;

    let form = SubpostForm::read(multipart).await?;
    let stored = match &form.media {
        Some(upload) => Some(state.media.store(upload).await?),
        None => None,
    };
    let patch = SubpostPatch {
        description: form.owned_field("description"),
        logo: stored.clone().or_else(|| form.owned_field("content_url")),
    };

    let user_id = claims.sub;
    let updated = with_db(&state, move |db| {
        let Some(previous) = db.get_subpost_by_id(tid)? else {
            return Ok(None);
        };
        let Some(row) = db.update_subpost(tid, &patch)? else {
            return Ok(None);
        };
        Ok(Some((previous.logo, subpost_view(db, row, Some(user_id))?)))
    })
    .await;

    let (previous_logo, view) = match updated {
        Ok(Some(found)) => found,
        outcome => {
            if let Some(url) = &stored {
                state.media.discard(url).await;
            }
            return Err(outcome.err().unwrap_or(ApiError::BadRequest("Invalid Post")));
        }
    };

    if let Some(old) = previous_logo.filter(|old| view.logo.as_ref() != Some(old)) {
        state.media.discard(&old).await;
    }

    info!("{} updated {}", claims.username, view.name);
    Ok(Json(UpdatedResponse {
        message: "Post updated".to_string(),
        new_data: SubpostData { post_data: view },
    }))
}

/// PUT /subpost/mod/{tid}/{username}
pub async fn add_moderator(
    State(state): State<AppState>,
    Path((tid, username)): Path<(String, String)>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MessageResponse>, ApiError> {
    let tid = parse_tid(&tid).ok_or(ApiError::BadRequest("Invalid Post"))?;
    require_role(&state, &claims, tid, MANAGERS).await?;

    let target = username.clone();
    with_db(&state, move |db| {
        let Some(user) = db.get_user_by_username(&target)? else {
            return Ok(Err(ApiError::BadRequest("Invalid User")));
        };
        if db.get_subpost_by_id(tid)?.is_none() {
            return Ok(Err(ApiError::BadRequest("Invalid Post")));
        }
        db.add_moderator(user.id, tid)?;
        Ok(Ok(()))
    })
    .await??;

    info!("{} made {} a moderator of subpost {}", claims.username, username, tid);
    Ok(Json(MessageResponse::new("Moderator added")))
}

/// DELETE /subpost/mod/{tid}/{username}. The creator can only be removed by
/// an admin.
pub async fn remove_moderator(
    State(state): State<AppState>,
    Path((tid, username)): Path<(String, String)>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MessageResponse>, ApiError> {
    let tid = parse_tid(&tid).ok_or(ApiError::BadRequest("Invalid User"))?;
    require_role(&state, &claims, tid, MANAGERS).await?;

    let target = username.clone();
    let resolved = with_db(&state, move |db| {
        let user = db.get_user_by_username(&target)?;
        let subpost = db.get_subpost_by_id(tid)?;
        Ok(user.zip(subpost))
    })
    .await?;
    let (user, subpost) = resolved.ok_or(ApiError::BadRequest("Invalid User"))?;

    if subpost.created_by == Some(user.id) && !is_admin(&state, &claims, tid).await? {
        return Err(ApiError::BadRequest("Cannot Remove Post Creator"));
    }

    let user_id = user.id;
    with_db(&state, move |db| db.remove_subpost_roles(user_id, tid)).await?;

    info!("{} removed {} as moderator of {}", claims.username, username, subpost.name);
    Ok(Json(MessageResponse::new("Moderator deleted")))
}

fn parse_tid(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subpost_names_need_three_word_characters() {
        assert!(is_valid_subpost_name("abc"));
        assert!(is_valid_subpost_name("rust_lang2"));
        assert!(is_valid_subpost_name("ünï"));
        assert!(!is_valid_subpost_name("ab"));
        assert!(!is_valid_subpost_name("has space"));
        assert!(!is_valid_subpost_name("t/rust"));
        assert!(!is_valid_subpost_name(""));
    }

    #[test]
    fn tids_must_be_integers() {
        assert_eq!(parse_tid("12"), Some(12));
        assert_eq!(parse_tid("twelve"), None);
    }
}
