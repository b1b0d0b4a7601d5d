use crate::error::{ApiError, ApiResult};
use crate::handlers::json_body;
use crate::models::{ForexPair, Instrument, InstrumentRef, PriceUpdate, Stock};
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;

fn not_found(reference: &InstrumentRef) -> ApiError {
    ApiError::NotFound(format!("{} not found", reference))
}

fn stock_ref(id: String) -> InstrumentRef {
    InstrumentRef::Stock { stock_id: id }
}

fn forex_ref(id: String) -> InstrumentRef {
    InstrumentRef::Forex { forex_pair_id: id }
}

pub async fn list_stocks(State(state): State<AppState>) -> ApiResult<Json<Vec<Stock>>> {
    Ok(Json(state.service.list_stocks()?))
}

pub async fn list_forex_pairs(State(state): State<AppState>) -> ApiResult<Json<Vec<ForexPair>>> {
    Ok(Json(state.service.list_forex_pairs()?))
}

pub async fn get_stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Instrument>> {
    let reference = stock_ref(id);
    state
        .service
        .get_instrument(&reference)?
        .map(Json)
        .ok_or_else(|| not_found(&reference))
}

pub async fn get_forex_pair(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Instrument>> {
    let reference = forex_ref(id);
    state
        .service
        .get_instrument(&reference)?
        .map(Json)
        .ok_or_else(|| not_found(&reference))
}

/// Move a mocked stock price. Investments pick it up on their next read.
pub async fn set_stock_price(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<PriceUpdate>, JsonRejection>,
) -> ApiResult<Json<Instrument>> {
    let update = json_body(payload)?;
    let reference = stock_ref(id);
    state
        .service
        .set_instrument_price(&reference, update.price)?
        .map(Json)
        .ok_or_else(|| not_found(&reference))
}

pub async fn set_forex_rate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<PriceUpdate>, JsonRejection>,
) -> ApiResult<Json<Instrument>> {
    let update = json_body(payload)?;
    let reference = forex_ref(id);
    state
        .service
        .set_instrument_price(&reference, update.price)?
        .map(Json)
        .ok_or_else(|| not_found(&reference))
}
