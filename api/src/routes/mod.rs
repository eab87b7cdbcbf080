//! API Routes Module
//!
//! 모든 HTTP 엔드포인트 정의
//!
//! # Routes
//! - `/health`, `/protocol` - 상태 / 배포 정보
//! - `/faucet` - 테스트 토큰
//! - `/collateral/*`, `/dsc/*` - 포지션 변경
//! - `/liquidate` - 청산
//! - `/position/*` - 포지션 조회
//! - `/price/*`, `/valuation` - 가격 정보
//! - `/ws` - WebSocket 실시간 데이터

pub mod collateral;
pub mod dsc;
pub mod faucet;
pub mod health;
pub mod liquidation;
pub mod position;
pub mod price;
pub mod protocol;
pub mod ws;

use axum::Json;
use dsc_engine::{Address, EngineResult, PositionManager, Receipt};
use serde::Serialize;

use crate::{error::ApiError, services::PositionSnapshot, types::EventView, AppState};

/// 상태 변경 작업 공통 응답
#[derive(Debug, Serialize)]
pub struct OperationResponse {
    /// 커밋된 이벤트 (발생 순서)
    pub events: Vec<EventView>,
    /// 작업 후 호출자 포지션
    pub position: PositionSnapshot,
}

/// 엔진 작업 실행 → 이벤트 발행 → 호출자 포지션 반환
pub(crate) async fn run_operation<F>(
    state: &AppState,
    operation: &'static str,
    caller: Address,
    run: F,
) -> Result<Json<OperationResponse>, ApiError>
where
    F: FnOnce(&PositionManager) -> EngineResult<Receipt>,
{
    let (receipt, recorded) = state.protocol.execute(operation, run).await?;
    state.publish(&receipt, &recorded).await;

    Ok(Json(OperationResponse {
        events: receipt.events.iter().map(EventView::from).collect(),
        position: state.protocol.snapshot(caller).await?,
    }))
}
