//! Services Module
//!
//! 비즈니스 로직을 담당하는 서비스 레이어
//!
//! # Services
//! - `Protocol`: 엔진 배포 + 작업 직렬화 + 이벤트 히스토리
//! - `PriceOracle`: 가격 정보 서비스
//! - `WsHub`: WebSocket 실시간 데이터

pub mod price_oracle;
pub mod protocol;
pub mod websocket;

pub use price_oracle::{PriceData, PriceOracle};
pub use protocol::{
    CollateralBalance, PositionSnapshot, Protocol, ProtocolInfo, RecordedEvent, SimulatedAsset,
};
pub use websocket::{
    liquidation_warning, Channel, ClientMessage, ConnectionInfo, LiquidationWarning, WsHub,
    WsMessage,
};
