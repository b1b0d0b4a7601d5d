use crate::auth::validate_session;
use crate::error::{ApiError, ApiResult};
use crate::models::Alert;
use crate::AppState;
use axum::extract::{Path, State};
use axum::Json;
use tower_sessions::Session;

pub async fn list_alerts(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Json<Vec<Alert>>> {
    let user = validate_session(&session).await?;
    Ok(Json(state.service.list_alerts(&user.id)?))
}

pub async fn mark_alert_read(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    validate_session(&session).await?;
    if !state.service.mark_alert_read(&id)? {
        return Err(ApiError::NotFound(format!("Alert {} not found", id)));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}
