//! HTTP binding over the ledger. Thin handlers: parse, authorize, delegate.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::auth::{AuthUser, create_token};
use crate::api::error::ApiError;
use crate::error::LedgerError;
use crate::ledger::{Ledger, PerformanceReport};
use crate::types::order::TradeSide;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub jwt_secret: Vec<u8>,
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/trade", post(execute_trade))
        .route("/portfolio/{user_id}", get(get_portfolio))
        .route("/performance/{user_id}", get(get_performance))
        .route("/limit-order", post(place_limit_order))
        .route("/limit-order/{order_id}", delete(cancel_limit_order))
        .with_state(state)
}

async fn health() -> &'static str {
    "healthy"
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user_id = state
        .ledger
        .register(&req.username, &req.email, &req.password)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "user_id": user_id,
            "username": req.username.trim().to_lowercase(),
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let user_id = state.ledger.authenticate(&req.username, &req.password).await?;
    let token = create_token(&state.jwt_secret, user_id)?;
    Ok(Json(json!({ "token": token, "user_id": user_id })))
}

#[derive(Debug, Deserialize)]
struct TradeRequest {
    symbol: String,
    quantity: Decimal,
    side: TradeSide,
}

async fn execute_trade(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<TradeRequest>,
) -> Result<Json<Value>, ApiError> {
    let receipt = state
        .ledger
        .execute_trade(user.user_id, &req.symbol, req.quantity, req.side)
        .await?;
    Ok(Json(json!({
        "trade_id": receipt.trade_id,
        "price": receipt.price,
        "total_cost": receipt.total,
    })))
}

async fn get_portfolio(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    if user.user_id != user_id {
        return Err(LedgerError::Unauthorized.into());
    }
    let portfolio = state.ledger.portfolio_valuation(user_id).await?;
    Ok(Json(json!({ "portfolio": portfolio })))
}

async fn get_performance(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<PerformanceReport>, ApiError> {
    if user.user_id != user_id {
        return Err(LedgerError::Unauthorized.into());
    }
    let report = state.ledger.performance(user_id).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
struct LimitOrderRequest {
    symbol: String,
    quantity: Decimal,
    target_price: Decimal,
    side: TradeSide,
}

async fn place_limit_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<LimitOrderRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let order_id = state
        .ledger
        .place_limit_order(
            user.user_id,
            &req.symbol,
            req.quantity,
            req.target_price,
            req.side,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "order_id": order_id }))))
}

async fn cancel_limit_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    state.ledger.cancel_limit_order(user.user_id, order_id).await?;
    Ok(Json(json!({ "message": "limit order cancelled" })))
}
