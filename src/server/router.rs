//! Route table

use crate::config::HttpConfig;
use crate::core::service::{Resource, ResourceService};
use crate::entities::{Configuration, Event, Settings, User};
use crate::server::handlers::{
    check_token, create_record, create_server_config, delete_record, delete_server_config,
    filter_records, filter_server_configs, get_record, get_server_config, health_check,
    issue_token, refresh_server, start_server, stop_server, update_record, update_server_config,
};
use crate::server::state::AppState;
use axum::extract::FromRef;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the full application router
///
/// For each generic resource:
/// - POST /{resource} - Create
/// - GET /{resource}/{id} - Get
/// - PATCH /{resource}/{id} - Partial update
/// - DELETE /{resource}/{id} - Delete (204)
/// - POST /{resource}/_filter - Filter, sort and paginate
///
/// Server configs additionally expose `_start`, `_stop` and `_refresh`.
pub fn build_router(state: AppState, http: &HttpConfig) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/token", post(issue_token))
        .route("/auth/token-check", post(check_token))
        .merge(resource_routes::<User>())
        .merge(resource_routes::<Configuration>())
        .merge(resource_routes::<Settings>())
        .merge(resource_routes::<Event>())
        .merge(server_config_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&http.cors_origins))
        .with_state(state)
}

fn resource_routes<T: Resource>() -> Router<AppState>
where
    Arc<ResourceService<T>>: FromRef<AppState>,
{
    let base = format!("/{}", T::resource_name());
    Router::new()
        .route(&base, post(create_record::<T>))
        .route(
            &format!("{}/{{id}}", base),
            get(get_record::<T>)
                .patch(update_record::<T>)
                .delete(delete_record::<T>),
        )
        .route(&format!("{}/_filter", base), post(filter_records::<T>))
}

fn server_config_routes() -> Router<AppState> {
    Router::new()
        .route("/server_config", post(create_server_config))
        .route(
            "/server_config/{id}",
            get(get_server_config)
                .patch(update_server_config)
                .delete(delete_server_config),
        )
        .route("/server_config/_filter", post(filter_server_configs))
        .route("/server_config/{id}/_start", post(start_server))
        .route("/server_config/{id}/_stop", post(stop_server))
        .route("/server_config/{id}/_refresh", post(refresh_server))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
