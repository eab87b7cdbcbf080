//! Row Mapping
//!
//! 서비스 레이어 타입 ↔ DB 모델 변환. 쿼리는 `Database`에 직접 있다.

use crate::services::{PositionSnapshot, RecordedEvent};
use crate::types::EventView;

use super::models::{Position, PositionEvent};

impl From<&RecordedEvent> for PositionEvent {
    fn from(recorded: &RecordedEvent) -> Self {
        let view = EventView::from(&recorded.event);
        PositionEvent {
            sequence: recorded.sequence as i64,
            event_type: view.event_type,
            address: view.account,
            counterparty: view.counterparty,
            token: view.token,
            amount: view.amount,
            collateral_seized: view.collateral_seized,
            timestamp: recorded.recorded_at,
        }
    }
}

impl From<&PositionEvent> for EventView {
    fn from(row: &PositionEvent) -> Self {
        EventView {
            event_type: row.event_type.clone(),
            account: row.address.clone(),
            counterparty: row.counterparty.clone(),
            token: row.token.clone(),
            amount: row.amount.clone(),
            collateral_seized: row.collateral_seized.clone(),
        }
    }
}

impl From<&PositionSnapshot> for Position {
    fn from(snapshot: &PositionSnapshot) -> Self {
        Position {
            address: snapshot.address.to_lowercase(),
            collateral_value_usd: snapshot.collateral_value_usd.clone(),
            total_dsc_minted: snapshot.total_dsc_minted.clone(),
            health_factor: snapshot.health_factor.clone(),
            status: match snapshot.status {
                dsc_engine::AccountStatus::Healthy => "healthy",
                dsc_engine::AccountStatus::AtRisk => "at_risk",
            }
            .to_string(),
            updated_at: chrono::Utc::now(),
        }
    }
}
