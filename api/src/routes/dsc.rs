//! Debt Token Endpoints

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::{
    error::ApiError,
    routes::{run_operation, OperationResponse},
    types::{parse_address, parse_amount},
    AppState,
};

/// 발행/상환 요청 (18 decimals)
#[derive(Debug, Deserialize)]
pub struct DscRequest {
    pub user: String,
    pub amount: String,
}

/// POST /dsc/mint
pub async fn mint(
    State(state): State<AppState>,
    Json(req): Json<DscRequest>,
) -> Result<Json<OperationResponse>, ApiError> {
    let user = parse_address(&req.user)?;
    let amount = parse_amount(&req.amount)?;

    run_operation(&state, "mint_dsc", user, move |engine| {
        engine.mint_dsc(user, amount)
    })
    .await
}

/// POST /dsc/burn
///
/// 사용자 지갑의 DSC로 자기 부채 상환
pub async fn burn(
    State(state): State<AppState>,
    Json(req): Json<DscRequest>,
) -> Result<Json<OperationResponse>, ApiError> {
    let user = parse_address(&req.user)?;
    let amount = parse_amount(&req.amount)?;

    run_operation(&state, "burn_dsc", user, move |engine| {
        engine.burn_dsc(user, amount)
    })
    .await
}
