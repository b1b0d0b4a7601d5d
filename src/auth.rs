use crate::error::{ApiError, ApiResult};
use crate::handlers::json_body;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

const SESSION_KEY: &str = "SESSION";

/// Credentials posted to the login route.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The user stored in the session after a successful login.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: SessionUser,
}

/// Log in with the demo account and store it in the session.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let credentials = json_body(payload)?;
    let demo = &state.demo_user;
    if credentials.email != demo.email || credentials.password != demo.password {
        tracing::warn!("Rejected login for {}", credentials.email);
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let user = SessionUser {
        id: demo.id.clone(),
        email: demo.email.clone(),
        first_name: demo.first_name.clone(),
        last_name: demo.last_name.clone(),
    };
    session
        .insert(SESSION_KEY, user.clone())
        .await
        .map_err(|e| ApiError::Internal(format!("Error inserting session: {}", e)))?;
    tracing::info!("Session inserted for {}", user.email);

    Ok(Json(LoginResponse {
        success: true,
        user,
    }))
}

/// Logout the user by dropping the session.
pub async fn logout(session: Session) -> ApiResult<Json<serde_json::Value>> {
    session
        .flush()
        .await
        .map_err(|e| ApiError::Internal(format!("Logout failed: {}", e)))?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Get user data from the session.
pub async fn get_user_data(session: Session) -> ApiResult<Json<SessionUser>> {
    validate_session(&session).await.map(Json)
}

/// Validate the session and return the user if one is logged in.
pub async fn validate_session(session: &Session) -> ApiResult<SessionUser> {
    let user: SessionUser = session
        .get(SESSION_KEY)
        .await
        .map_err(|e| ApiError::Internal(format!("Error reading session: {}", e)))?
        .unwrap_or_default();
    if user.id.is_empty() {
        return Err(ApiError::Unauthorized("Not authenticated".to_string()));
    }
    Ok(user)
}
