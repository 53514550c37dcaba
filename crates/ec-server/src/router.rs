use std::time::Duration;

use axum::routing::{delete, get, patch, post, put};
use axum::{middleware, Router};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth_middleware::{require_admin, require_auth};
use crate::handlers::{admin, auth, id, info, mark};
use crate::state::AppState;

/// Public/protected split mirrored from `form-state::api::app`: a
/// `public_api` router with no auth layer, a `protected_api` router
/// wrapped in `middleware::from_fn_with_state`, merged and given the
/// shared state last.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let public_api = Router::new()
        .route("/ping", get(info::ping))
        .route("/info", get(info::info))
        .route("/spec", get(info::spec))
        .route("/users/:user/token", post(auth::request_token))
        .route("/users/:user/token", delete(auth::clear_token));

    let protected_api = Router::new()
        .route("/ID/progress", get(id::progress))
        .route("/ID/tasks/available", get(id::claim_next))
        .route("/ID/tasks/done", get(id::list_done))
        .route("/ID/tasks/:paper", patch(id::return_identified))
        .route("/ID/tasks/:paper", delete(id::abandon))
        .route("/ID/tasks/:paper/images", get(id::read_images))
        .route("/MK/progress/:question/:version", get(mark::progress))
        .route("/MK/max_mark/:question/:version", get(mark::max_mark))
        .route(
            "/MK/tasks/available/:question/:version",
            get(mark::claim_next),
        )
        .route("/MK/tasks/done/:question/:version", get(mark::list_done))
        .route("/MK/tasks/:paper/:question/:version", patch(mark::return_mark))
        .route("/MK/tasks/:paper/:question/:version", delete(mark::abandon))
        .route(
            "/MK/tasks/:paper/:question/:version/tags",
            put(mark::set_tags),
        )
        .route(
            "/MK/tasks/:paper/:question/:version/images",
            get(mark::read_images),
        )
        .route("/MK/whole_paper/:paper", get(mark::whole_paper));

    // Admin routes carry a second layer on top of `require_auth`: every
    // caller must already be an authenticated, enabled user, but only
    // `is_admin` accounts may create/disable users, reset tasks, or
    // replace page images (spec.md §4.8).
    let admin_api = Router::new()
        .route("/admin/users", post(admin::create_or_update_user))
        .route("/admin/users/enable", post(admin::enable_user))
        .route("/admin/users/reload", post(admin::reload_user_list))
        .route("/admin/tasks/reset", post(admin::admin_reset_task))
        .route(
            "/admin/pages/:paper/:page/:version",
            put(admin::replace_page_image),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let protected_api = protected_api
        .merge(admin_api)
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_api)
        .merge(protected_api)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
