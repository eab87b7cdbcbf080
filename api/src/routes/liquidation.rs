//! Liquidation Endpoints
//!
//! 청산자는 자기 DSC로 대상의 부채를 갚고, 그만큼의 담보 + 10% 보너스를 받는다.
//! 대상의 건전성 비율이 개선되지 않으면 전체가 되돌려진다.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    routes::{run_operation, OperationResponse},
    services::PositionSnapshot,
    types::{parse_address, parse_amount},
    AppState,
};

// ============ Request/Response Types ============

#[derive(Debug, Deserialize)]
pub struct LiquidateRequest {
    pub liquidator: String,
    /// 압류할 담보 (심볼 또는 토큰 주소)
    pub asset: String,
    /// 청산 대상
    pub user: String,
    /// 상환할 DSC (18 decimals)
    pub debt_to_cover: String,
}

#[derive(Debug, Serialize)]
pub struct CandidatesResponse {
    pub positions: Vec<PositionSnapshot>,
}

// ============ Handlers ============

/// POST /liquidate
///
/// 응답의 `position`은 청산자 포지션
pub async fn liquidate(
    State(state): State<AppState>,
    Json(req): Json<LiquidateRequest>,
) -> Result<Json<OperationResponse>, ApiError> {
    let liquidator = parse_address(&req.liquidator)?;
    let user = parse_address(&req.user)?;
    let token = state.protocol.token_address(&req.asset)?;
    let debt_to_cover = parse_amount(&req.debt_to_cover)?;

    run_operation(&state, "liquidate", liquidator, move |engine| {
        engine.liquidate(liquidator, token, user, debt_to_cover)
    })
    .await
}

/// GET /liquidations/candidates
///
/// 건전성 비율 < 1 인 부채 보유 계정
pub async fn candidates(State(state): State<AppState>) -> Json<CandidatesResponse> {
    Json(CandidatesResponse {
        positions: state.protocol.at_risk_positions().await,
    })
}
