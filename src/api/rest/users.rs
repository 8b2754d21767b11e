//! Auth endpoints delegating to the credential store collaborator. The
//! handlers only see the store's success/failure signal.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/user/status/:email", get(user_status))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "rider".to_string()
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub email: String,
    pub role: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let account = state
        .credentials
        .register(&payload.email, &payload.password, &payload.role)?;

    Ok(Json(SessionResponse {
        email: account.email,
        role: account.role,
    }))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    if !state.credentials.verify(&payload.email, &payload.password) {
        return Err(AppError::InvalidInput("invalid credentials".to_string()));
    }

    let account = state
        .credentials
        .get(&payload.email)
        .ok_or_else(|| AppError::Internal("verified account missing".to_string()))?;

    Ok(Json(SessionResponse {
        email: account.email,
        role: account.role,
    }))
}

async fn user_status(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let account = state
        .credentials
        .get(&email)
        .ok_or_else(|| AppError::NotFound(format!("user {email} not found")))?;

    Ok(Json(SessionResponse {
        email: account.email,
        role: account.role,
    }))
}
