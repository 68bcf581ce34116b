use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{
    auth::{AdminUser, AuthenticatedUser},
    state::AppState,
};

pub mod admin;
pub mod auth;
pub mod content;
pub mod documents;
pub mod health;
pub mod notifications;

pub fn create_router(state: AppState) -> Router<()> {
    let allow_origin = match state.config.cors_allowed_origin.as_ref() {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|value| {
                    let trimmed = value.trim();
                    if trimmed.is_empty() {
                        return None;
                    }
                    match trimmed.parse::<HeaderValue>() {
                        Ok(header) => Some(header),
                        Err(err) => {
                            tracing::warn!(origin = %trimmed, error = %err, "ignoring invalid CORS origin");
                            None
                        }
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(tower_http::cors::AllowMethods::mirror_request())
        .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
        .allow_credentials(true);

    let public_auth_routes = Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh));

    let session_routes = Router::new()
        .route("/api/logout", post(auth::logout))
        .route("/api/auth/user", get(auth::current_user));

    let documents_routes = Router::new()
        .route(
            "/",
            get(documents::list_documents).post(documents::create_document),
        )
        .route("/preview", post(documents::preview_document))
        .route(
            "/:id",
            get(documents::get_document)
                .put(documents::update_document)
                .delete(documents::delete_document),
        )
        .route("/:id/download", get(documents::download_document));

    let notifications_routes = Router::new()
        .route("/", get(notifications::list_notifications))
        .route("/read-all", post(notifications::mark_all_read))
        .route("/:id/read", post(notifications::mark_read));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .merge(session_routes)
        .nest("/api/documents", documents_routes)
        .nest("/api/notifications", notifications_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/:id", put(admin::update_user))
        .route("/stats", get(admin::stats))
        .route("/documents", get(admin::list_all_documents))
        .route(
            "/templates",
            get(admin::list_templates).post(admin::create_template),
        )
        .route(
            "/templates/:id",
            put(admin::update_template).delete(admin::delete_template),
        )
        .route("/blog", get(admin::list_posts).post(admin::create_post))
        .route(
            "/blog/:id",
            put(admin::update_post).delete(admin::delete_post),
        )
        .route("/notifications", post(admin::broadcast_notification));

    let admin_state = state.clone();
    let admin_routes = Router::new()
        .nest("/api/admin", admin_routes)
        .layer(middleware::from_extractor_with_state::<AdminUser, _>(admin_state));

    let content_routes = Router::new()
        .route("/api/templates", get(content::list_templates))
        .route("/api/blog", get(content::list_posts))
        .route("/api/blog/:slug", get(content::get_post))
        .route("/api/pricing", get(content::pricing));

    Router::new()
        .merge(public_auth_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .merge(content_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024))
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}
