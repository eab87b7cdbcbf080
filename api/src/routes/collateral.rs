//! Collateral Endpoints
//!
//! 담보 예치/인출 및 발행/상환 묶음 작업.
//! 각 요청은 엔진에서 하나의 원자적 작업으로 실행된다.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::{
    error::ApiError,
    routes::{run_operation, OperationResponse},
    types::{parse_address, parse_amount},
    AppState,
};

// ============ Request Types ============

/// 예치/인출 요청
#[derive(Debug, Deserialize)]
pub struct CollateralRequest {
    pub user: String,
    /// 심볼 또는 토큰 주소
    pub asset: String,
    /// 토큰 최소 단위
    pub amount: String,
}

/// 담보 + DSC 묶음 요청
#[derive(Debug, Deserialize)]
pub struct CollateralWithDscRequest {
    pub user: String,
    pub asset: String,
    pub collateral_amount: String,
    /// 18 decimals
    pub dsc_amount: String,
}

// ============ Handlers ============

/// POST /collateral/deposit
pub async fn deposit(
    State(state): State<AppState>,
    Json(req): Json<CollateralRequest>,
) -> Result<Json<OperationResponse>, ApiError> {
    let user = parse_address(&req.user)?;
    let token = state.protocol.token_address(&req.asset)?;
    let amount = parse_amount(&req.amount)?;

    run_operation(&state, "deposit_collateral", user, move |engine| {
        engine.deposit_collateral(user, token, amount)
    })
    .await
}

/// POST /collateral/redeem
///
/// 인출 후 건전성 비율이 1 미만이면 422 (HEALTH_FACTOR_BELOW_MINIMUM)
pub async fn redeem(
    State(state): State<AppState>,
    Json(req): Json<CollateralRequest>,
) -> Result<Json<OperationResponse>, ApiError> {
    let user = parse_address(&req.user)?;
    let token = state.protocol.token_address(&req.asset)?;
    let amount = parse_amount(&req.amount)?;

    run_operation(&state, "redeem_collateral", user, move |engine| {
        engine.redeem_collateral(user, token, amount)
    })
    .await
}

/// POST /collateral/deposit-and-mint
pub async fn deposit_and_mint(
    State(state): State<AppState>,
    Json(req): Json<CollateralWithDscRequest>,
) -> Result<Json<OperationResponse>, ApiError> {
    let user = parse_address(&req.user)?;
    let token = state.protocol.token_address(&req.asset)?;
    let collateral = parse_amount(&req.collateral_amount)?;
    let dsc = parse_amount(&req.dsc_amount)?;

    run_operation(&state, "deposit_collateral_and_mint_dsc", user, move |engine| {
        engine.deposit_collateral_and_mint_dsc(user, token, collateral, dsc)
    })
    .await
}

/// POST /collateral/redeem-for-dsc
///
/// DSC 상환 → 담보 인출 (한 번에)
pub async fn redeem_for_dsc(
    State(state): State<AppState>,
    Json(req): Json<CollateralWithDscRequest>,
) -> Result<Json<OperationResponse>, ApiError> {
    let user = parse_address(&req.user)?;
    let token = state.protocol.token_address(&req.asset)?;
    let collateral = parse_amount(&req.collateral_amount)?;
    let dsc = parse_amount(&req.dsc_amount)?;

    run_operation(&state, "redeem_collateral_for_dsc", user, move |engine| {
        engine.redeem_collateral_for_dsc(user, token, collateral, dsc)
    })
    .await
}
