//! Faucet Endpoint
//!
//! 시뮬레이션 담보 토큰 지급 (엔진 밖의 지갑 잔액).

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    types::{hex_address, parse_address, parse_amount},
    AppState,
};

// ============ Request/Response Types ============

#[derive(Debug, Deserialize)]
pub struct FaucetRequest {
    /// 심볼 또는 토큰 주소
    pub asset: String,
    pub to: String,
    /// 토큰 최소 단위
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct FaucetResponse {
    pub asset: String,
    pub to: String,
    pub amount: String,
    pub balance: String,
}

// ============ Handlers ============

/// POST /faucet
pub async fn faucet(
    State(state): State<AppState>,
    Json(req): Json<FaucetRequest>,
) -> Result<Json<FaucetResponse>, ApiError> {
    let to = parse_address(&req.to)?;
    let amount = parse_amount(&req.amount)?;
    if amount.is_zero() {
        return Err(ApiError::ValidationError("Amount must be more than zero".to_string()));
    }
    let symbol = state.protocol.asset(&req.asset)?.symbol.clone();

    let balance = state.protocol.faucet(&symbol, to, amount).await?;

    Ok(Json(FaucetResponse {
        asset: symbol,
        to: hex_address(to),
        amount: amount.to_string(),
        balance: balance.to_string(),
    }))
}
