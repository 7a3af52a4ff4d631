//! API Handlers

use super::auth::Caller;
use super::types::*;
use crate::config::GraphConfig;
use crate::connection::ConnectionManager;
use crate::metrics::Metrics;
use crate::store::{NewUser, ProfileUpdate, User, UserDirectory, UserId, UserProfile, UserStore};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Shared application state for handlers
#[derive(Clone)]
pub struct AppState {
    pub connections: Arc<ConnectionManager>,
    pub directory: Arc<UserDirectory>,
    pub metrics: Arc<Metrics>,
    pub start_time: SystemTime,
}

impl AppState {
    /// Wire the connection manager and directory over one store
    pub fn new(store: Arc<dyn UserStore>, graph: &GraphConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            connections: Arc::new(ConnectionManager::new(store.clone(), graph, metrics.clone())),
            directory: Arc::new(UserDirectory::new(store)),
            metrics,
            start_time: SystemTime::now(),
        }
    }
}

fn parse_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse::<UserId>()
        .map_err(|_| ApiError::BadRequest(format!("invalid user id: {}", raw)))
}

fn ack(message: &str) -> ApiResult<Ack> {
    Ok(Json(ApiResponse::success(Ack::new(message))))
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthStatus>> {
    let mut checks = HashMap::new();

    checks.insert(
        "server".to_string(),
        CheckResult {
            status: "healthy".to_string(),
            message: Some("Server is running".to_string()),
            duration_ms: 0,
        },
    );

    let started = Instant::now();
    let store_check = match state.directory.list_users().await {
        Ok(users) => CheckResult {
            status: "healthy".to_string(),
            message: Some(format!("{} users", users.len())),
            duration_ms: started.elapsed().as_millis() as u64,
        },
        Err(e) => CheckResult {
            status: "unhealthy".to_string(),
            message: Some(e.to_string()),
            duration_ms: started.elapsed().as_millis() as u64,
        },
    };
    checks.insert("store".to_string(), store_check);

    let overall_status = if checks.values().all(|c| c.status == "healthy") {
        "healthy"
    } else {
        "degraded"
    };

    Json(ApiResponse::success(HealthStatus {
        status: overall_status.to_string(),
        checks,
        timestamp: SystemTime::now(),
    }))
}

/// Prometheus text exposition
pub async fn export_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.export_prometheus(),
    )
}

/// Register a new user
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<NewUser>,
) -> ApiResult<User> {
    let user = state.directory.create_user(request).await?;
    Ok(Json(ApiResponse::success(user)))
}

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    let users = state.directory.list_users().await?;
    Ok(Json(ApiResponse::success(users)))
}

pub async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<User> {
    let user = state.directory.get_user(parse_id(&id)?).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// Update profile fields; relation lists in the body are ignored
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<User> {
    let user = state.directory.update_profile(parse_id(&id)?, update).await?;
    Ok(Json(ApiResponse::success(user)))
}

pub async fn delete_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Ack> {
    state.directory.delete_user(parse_id(&id)?).await?;
    ack("User deleted")
}

/// Connections of the caller
pub async fn list_connections(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<Vec<UserProfile>> {
    let profiles = state.connections.list_connections(caller).await?;
    Ok(Json(ApiResponse::success(profiles)))
}

/// Requests the caller has received
pub async fn list_pending_received(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<Vec<UserProfile>> {
    let profiles = state.connections.list_pending_received(caller).await?;
    Ok(Json(ApiResponse::success(profiles)))
}

/// Requests the caller has sent
pub async fn list_pending_sent(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<Vec<UserProfile>> {
    let profiles = state.connections.list_pending_sent(caller).await?;
    Ok(Json(ApiResponse::success(profiles)))
}

pub async fn pair_status(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(other_id): Path<String>,
) -> ApiResult<PairStatusResponse> {
    let other = parse_id(&other_id)?;
    let pair_state = state.connections.pair_status(caller, other).await?;

    Ok(Json(ApiResponse::success(PairStatusResponse {
        user_id: caller.to_string(),
        other_id: other.to_string(),
        state: pair_state,
    })))
}

pub async fn send_request(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(to_id): Path<String>,
) -> ApiResult<Ack> {
    state
        .connections
        .send_request(caller, parse_id(&to_id)?)
        .await?;
    ack("Connection request sent")
}

pub async fn accept_request(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(from_id): Path<String>,
) -> ApiResult<Ack> {
    state
        .connections
        .accept_request(caller, parse_id(&from_id)?)
        .await?;
    ack("Connection accepted")
}

pub async fn reject_request(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(from_id): Path<String>,
) -> ApiResult<Ack> {
    state
        .connections
        .reject_request(caller, parse_id(&from_id)?)
        .await?;
    ack("Connection request rejected")
}

pub async fn remove_connection(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(target_id): Path<String>,
) -> ApiResult<Ack> {
    state
        .connections
        .remove_connection(caller, parse_id(&target_id)?)
        .await?;
    ack("Connection removed")
}

pub async fn repair_pair(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(other_id): Path<String>,
) -> ApiResult<PairStatusResponse> {
    let other = parse_id(&other_id)?;
    let pair_state = state.connections.repair_pair(caller, other).await?;

    Ok(Json(ApiResponse::success(PairStatusResponse {
        user_id: caller.to_string(),
        other_id: other.to_string(),
        state: pair_state,
    })))
}
