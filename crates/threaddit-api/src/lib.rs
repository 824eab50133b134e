pub mod auth;
pub mod error;
pub mod form;
pub mod guards;
pub mod media;
pub mod middleware;
pub mod state;
pub mod subposts;
pub mod views;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, patch, post, put},
};

pub use crate::state::{AppState, AppStateInner};

use crate::media::MAX_MEDIA_SIZE;
use crate::middleware::{optional_auth, require_auth};

/// Room for the text fields and part headers around an uploaded image.
const FORM_OVERHEAD: usize = 64 * 1024;

/// All subpost routes, nested under `/api`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/subposts/search", get(subposts::subpost_search))
        .route("/subposts/get/all", get(subposts::get_all_subposts));

    let viewer_routes = Router::new()
        .route("/subposts", get(subposts::get_subposts))
        .route("/subposts/{post_name}", get(subposts::get_subpost_by_name))
        .layer(from_fn_with_state(state.clone(), optional_auth));

    let protected_routes = Router::new()
        .route(
            "/subposts/subscription/{tid}",
            post(subposts::subscribe).delete(subposts::unsubscribe),
        )
        .route("/subpost", post(subposts::create_subpost))
        .route("/subpost/{tid}", patch(subposts::update_subpost))
        .route(
            "/subpost/mod/{tid}/{username}",
            put(subposts::add_moderator).delete(subposts::remove_moderator),
        )
        .layer(DefaultBodyLimit::max(MAX_MEDIA_SIZE + FORM_OVERHEAD))
        .layer(from_fn_with_state(state.clone(), require_auth));

    let api = Router::new()
        .merge(public_routes)
        .merge(viewer_routes)
        .merge(protected_routes);

    Router::new().nest("/api", api).with_state(state)
}
