//! Database Models
//!
//! Indexed copies of committed engine events and the latest position
//! snapshot per account. The engine stays the source of truth; these rows
//! only serve history queries.
//!
//! 금액은 U256이므로 TEXT(10진수)로 저장한다.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// 사용자 포지션 (마지막 스냅샷)
#[derive(Debug, Clone, FromRow)]
pub struct Position {
    /// Ethereum 주소 (lowercase)
    pub address: String,

    /// 담보 가치 (USD, usd_decimals 자리)
    pub collateral_value_usd: String,

    /// 발행된 DSC (18 decimals)
    pub total_dsc_minted: String,

    /// 부채 없으면 NULL
    pub health_factor: Option<String>,

    /// healthy | at_risk
    pub status: String,

    /// 마지막 업데이트 시간
    pub updated_at: DateTime<Utc>,
}

/// 포지션 이벤트 (히스토리)
#[derive(Debug, Clone, FromRow)]
pub struct PositionEvent {
    /// 커밋 순번 (프로세스 단위)
    pub sequence: i64,

    /// 이벤트 타입
    /// - collateral_deposited
    /// - collateral_redeemed
    /// - dsc_minted
    /// - dsc_burned
    /// - liquidated
    pub event_type: String,

    /// 포지션이 변경된 계정
    pub address: String,

    /// 수령자 / 지불자 / 청산자
    pub counterparty: Option<String>,

    pub token: Option<String>,

    /// 토큰 수량 또는 상환 부채
    pub amount: String,

    pub collateral_seized: Option<String>,

    /// 이벤트 커밋 시간
    pub timestamp: DateTime<Utc>,
}
