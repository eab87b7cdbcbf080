//! Position Endpoints
//!
//! 포지션은 엔진에서 직접 읽는다 (항상 최신).
//! 히스토리는 DB가 설정돼 있으면 인덱스에서, 아니면 메모리 로그에서 제공.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    services::PositionSnapshot,
    types::{parse_address, EventView},
    AppState,
};

// ============ Request/Response Types ============

/// 히스토리 쿼리 파라미터
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// 페이지 (0부터 시작)
    pub page: Option<u32>,
    /// 페이지 크기 (기본 20, 최대 100)
    pub limit: Option<u32>,
}

/// 히스토리 응답
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub address: String,
    /// database | memory
    pub source: String,
    pub events: Vec<HistoryEvent>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct HistoryEvent {
    pub sequence: u64,
    #[serde(flatten)]
    pub event: EventView,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub has_next: bool,
}

// ============ Handlers ============

/// GET /position/:address
///
/// # Response
///
/// ```json
/// {
///   "address": "0x...",
///   "collateral": [{ "symbol": "WETH", "deposited": "10000000000000000000", ... }],
///   "collateral_value_usd": "2000000",
///   "total_dsc_minted": "10000000000000000000000",
///   "health_factor": "1",
///   "health_factor_bps": "10000",
///   "status": "healthy"
/// }
/// ```
pub async fn get_position(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<PositionSnapshot>, ApiError> {
    let user = parse_address(&address)?;
    Ok(Json(state.protocol.snapshot(user).await?))
}

/// GET /position/:address/history
///
/// 포지션 히스토리 조회 (페이지네이션, 최신순)
pub async fn get_position_history(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let user = parse_address(&address)?;

    let page = query.page.unwrap_or(0);
    let limit = query.limit.unwrap_or(20).clamp(1, 100); // 최대 100개

    let (source, events, total) = match &state.db {
        Some(db) => {
            let (rows, total) = db
                .get_position_history(&address, page, limit)
                .await
                .map_err(|err| ApiError::DatabaseError(err.to_string()))?;
            let events = rows
                .iter()
                .map(|row| HistoryEvent {
                    sequence: row.sequence.max(0) as u64,
                    event: EventView::from(row),
                    timestamp: row.timestamp.to_rfc3339(),
                })
                .collect();
            ("database", events, total.max(0) as u64)
        }
        None => {
            let (recorded, total) = state.protocol.history(user, page, limit);
            let events = recorded
                .iter()
                .map(|entry| HistoryEvent {
                    sequence: entry.sequence,
                    event: EventView::from(&entry.event),
                    timestamp: entry.recorded_at.to_rfc3339(),
                })
                .collect();
            ("memory", events, total)
        }
    };

    let has_next = (page as u64 + 1) * (limit as u64) < total;

    Ok(Json(HistoryResponse {
        address: address.to_lowercase(),
        source: source.to_string(),
        events,
        pagination: Pagination {
            page,
            limit,
            total,
            has_next,
        },
    }))
}
