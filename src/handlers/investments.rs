use crate::auth::validate_session;
use crate::error::{ApiError, ApiResult};
use crate::handlers::json_body;
use crate::models::{Investment, InvestmentUpdate, NewInvestment, ValuatedInvestment};
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::{http::StatusCode, Json};
use tower_sessions::Session;

/// Lists the user's investments, revalued at current prices.
/// Every call also runs alert derivation for them.
pub async fn list_investments(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Json<Vec<ValuatedInvestment>>> {
    let user = validate_session(&session).await?;
    let investments = state.service.list_investments(&user.id)?;
    Ok(Json(investments))
}

/// Record a new investment. The body names the instrument with `investment_type`
/// plus `stock_id` or `forex_pair_id`.
pub async fn create_investment(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<NewInvestment>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Investment>)> {
    let user = validate_session(&session).await?;
    let new = json_body(payload)?;
    let investment = state.service.create_investment(&user.id, new)?;
    Ok((StatusCode::CREATED, Json(investment)))
}

pub async fn update_investment(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    payload: Result<Json<InvestmentUpdate>, JsonRejection>,
) -> ApiResult<Json<Investment>> {
    let user = validate_session(&session).await?;
    let update = json_body(payload)?;
    state
        .service
        .update_investment(&user.id, &id, update)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Investment {} not found", id)))
}

pub async fn delete_investment(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let user = validate_session(&session).await?;
    if state.service.delete_investment(&user.id, &id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Investment {} not found", id)))
    }
}
