//! HTTP handlers
//!
//! Resource handlers are generic over [`Resource`]; one set of functions
//! serves users, configurations, settings and events. Server configs go
//! through the lifecycle controller so that edits and transitions share the
//! same per-record lock.

use crate::core::auth::{AuthContext, TokenService};
use crate::core::error::{ManagerError, ManagerResult};
use crate::core::extractors::{Validated, rejection_to_error};
use crate::core::query::{FilterRequest, FilterResponse};
use crate::core::service::{Resource, ResourceService};
use crate::entities::user::{self, User};
use crate::entities::{ServerConfig, ServerConfigCreate, ServerConfigUpdate, ServerConfigView};
use crate::lifecycle::LifecycleController;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Form, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

type JsonBody<T> = Result<Json<T>, JsonRejection>;

// ============================================================================
// Generic resources
// ============================================================================

pub async fn create_record<T: Resource>(
    State(service): State<Arc<ResourceService<T>>>,
    auth: AuthContext,
    payload: Result<Validated<T::Create>, ManagerError>,
) -> ManagerResult<(StatusCode, Json<T>)> {
    auth.authorize(T::SCOPE)?;
    let Validated(payload) = payload?;
    let record = service.create(payload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_record<T: Resource>(
    State(service): State<Arc<ResourceService<T>>>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> ManagerResult<Json<T>> {
    auth.authorize(T::SCOPE)?;
    Ok(Json(service.get(id).await?))
}

pub async fn update_record<T: Resource>(
    State(service): State<Arc<ResourceService<T>>>,
    auth: AuthContext,
    Path(id): Path<i64>,
    payload: Result<Validated<T::Update>, ManagerError>,
) -> ManagerResult<Json<T>> {
    auth.authorize(T::SCOPE)?;
    let Validated(payload) = payload?;
    Ok(Json(service.update(id, payload).await?))
}

pub async fn delete_record<T: Resource>(
    State(service): State<Arc<ResourceService<T>>>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> ManagerResult<StatusCode> {
    auth.authorize(T::SCOPE)?;
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn filter_records<T: Resource>(
    State(service): State<Arc<ResourceService<T>>>,
    auth: AuthContext,
    body: JsonBody<FilterRequest>,
) -> ManagerResult<Json<FilterResponse<T>>> {
    auth.authorize(T::SCOPE)?;
    let Json(request) = body.map_err(rejection_to_error)?;
    Ok(Json(service.filter(&request).await?))
}

// ============================================================================
// Server configs
// ============================================================================

pub async fn create_server_config(
    State(lifecycle): State<Arc<LifecycleController>>,
    auth: AuthContext,
    payload: Result<Validated<ServerConfigCreate>, ManagerError>,
) -> ManagerResult<(StatusCode, Json<ServerConfigView>)> {
    auth.authorize(ServerConfig::SCOPE)?;
    let Validated(payload) = payload?;
    let config = lifecycle.create(payload).await?;
    Ok((StatusCode::CREATED, Json(lifecycle.view(config).await?)))
}

pub async fn get_server_config(
    State(lifecycle): State<Arc<LifecycleController>>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> ManagerResult<Json<ServerConfigView>> {
    auth.authorize(ServerConfig::SCOPE)?;
    let config = lifecycle.get(id).await?;
    Ok(Json(lifecycle.view(config).await?))
}

pub async fn update_server_config(
    State(lifecycle): State<Arc<LifecycleController>>,
    auth: AuthContext,
    Path(id): Path<i64>,
    payload: Result<Validated<ServerConfigUpdate>, ManagerError>,
) -> ManagerResult<Json<ServerConfigView>> {
    auth.authorize(ServerConfig::SCOPE)?;
    let Validated(payload) = payload?;
    let config = lifecycle.update(id, payload).await?;
    Ok(Json(lifecycle.view(config).await?))
}

pub async fn delete_server_config(
    State(lifecycle): State<Arc<LifecycleController>>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> ManagerResult<StatusCode> {
    auth.authorize(ServerConfig::SCOPE)?;
    lifecycle.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn filter_server_configs(
    State(lifecycle): State<Arc<LifecycleController>>,
    auth: AuthContext,
    body: JsonBody<FilterRequest>,
) -> ManagerResult<Json<FilterResponse<ServerConfigView>>> {
    auth.authorize(ServerConfig::SCOPE)?;
    let Json(request) = body.map_err(rejection_to_error)?;
    let page = lifecycle.filter(&request).await?;

    let mut items = Vec::with_capacity(page.items.len());
    for config in page.items {
        items.push(lifecycle.view(config).await?);
    }
    Ok(Json(FilterResponse::new(page.total_count, items)))
}

pub async fn start_server(
    State(lifecycle): State<Arc<LifecycleController>>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> ManagerResult<Json<ServerConfigView>> {
    auth.authorize(ServerConfig::SCOPE)?;
    let config = lifecycle.start(id).await?;
    Ok(Json(lifecycle.view(config).await?))
}

pub async fn stop_server(
    State(lifecycle): State<Arc<LifecycleController>>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> ManagerResult<Json<ServerConfigView>> {
    auth.authorize(ServerConfig::SCOPE)?;
    let config = lifecycle.stop(id).await?;
    Ok(Json(lifecycle.view(config).await?))
}

pub async fn refresh_server(
    State(lifecycle): State<Arc<LifecycleController>>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> ManagerResult<Json<ServerConfigView>> {
    auth.authorize(ServerConfig::SCOPE)?;
    let config = lifecycle.refresh(id).await?;
    Ok(Json(lifecycle.view(config).await?))
}

// ============================================================================
// Auth
// ============================================================================

/// OAuth2 password form
#[derive(Debug, Deserialize)]
pub struct TokenForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token_type: String,
    pub access_token: String,
    pub scope: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenCheckResponse {
    pub status: String,
    pub access_token: String,
}

pub async fn issue_token(
    State(users): State<Arc<ResourceService<User>>>,
    State(tokens): State<Arc<TokenService>>,
    Form(form): Form<TokenForm>,
) -> ManagerResult<Json<TokenResponse>> {
    let Some(user) = user::login(&**users.store(), &form.username, &form.password).await? else {
        return Err(ManagerError::unauthorized("Incorrect username or password"));
    };

    let access_token = tokens.issue(user.id, &user.mail, &user.scope_set())?;
    tracing::info!(user_id = user.id, "issued access token");
    Ok(Json(TokenResponse {
        token_type: "bearer".to_string(),
        access_token,
        scope: user.scopes,
    }))
}

/// Re-issue a token if its user still exists under the same mail
pub async fn check_token(
    State(users): State<Arc<ResourceService<User>>>,
    State(tokens): State<Arc<TokenService>>,
    auth: AuthContext,
) -> ManagerResult<Json<TokenCheckResponse>> {
    let user = users
        .store()
        .get(auth.user_id)
        .await?
        .filter(|u| u.mail == auth.mail)
        .ok_or_else(|| ManagerError::unauthorized("User no longer exists"))?;

    Ok(Json(TokenCheckResponse {
        status: "authenticated".to_string(),
        access_token: tokens.issue(user.id, &user.mail, &user.scope_set())?,
    }))
}

// ============================================================================
// Health
// ============================================================================

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "acc-server-manager"
    }))
}
