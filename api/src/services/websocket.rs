//! WebSocket Service
//!
//! Real-time data streaming via WebSocket.
//!
//! # Features
//! - Committed engine events (모든 계정)
//! - User position change notifications
//! - Price change alerts
//! - Liquidation warnings

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use crate::services::price_oracle::PriceData;
use crate::services::protocol::PositionSnapshot;
use crate::types::EventView;

/// 건전성 비율 1.0 (basis points)
const HEALTHY_BPS: u64 = 10_000;

/// 이 아래는 Critical
const CRITICAL_BPS: u64 = 9_000;

/// WebSocket 메시지 타입
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    /// 커밋된 엔진 이벤트
    EngineEvent(EventUpdate),
    /// 사용자 포지션 업데이트
    PositionUpdate(PositionSnapshot),
    /// 가격 업데이트
    PriceUpdate(PriceData),
    /// 청산 경고
    LiquidationWarning(LiquidationWarning),
    /// 에러
    Error(WsError),
    /// 구독 확인
    Subscribed(SubscriptionConfirm),
    /// Heartbeat
    Pong,
}

/// 엔진 이벤트 + 순번
#[derive(Debug, Clone, Serialize)]
pub struct EventUpdate {
    pub sequence: u64,
    #[serde(flatten)]
    pub event: EventView,
    pub timestamp: u64,
}

/// 청산 경고
#[derive(Debug, Clone, Serialize)]
pub struct LiquidationWarning {
    pub address: String,
    pub health_factor_bps: u64,
    pub message: String,
    pub urgency: LiquidationUrgency,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LiquidationUrgency {
    High,     // 0.9 <= ratio < 1.0
    Critical, // ratio < 0.9
}

/// WebSocket 에러
#[derive(Debug, Clone, Serialize)]
pub struct WsError {
    pub code: i32,
    pub message: String,
}

/// 구독 확인
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionConfirm {
    pub channel: String,
    pub subscribed: bool,
}

/// 구독 채널
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum Channel {
    /// 모든 엔진 이벤트
    Events,
    /// 특정 사용자 포지션
    UserPosition(String),
    /// 가격
    Prices,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Events => write!(f, "events"),
            Channel::UserPosition(addr) => write!(f, "position:{}", addr),
            Channel::Prices => write!(f, "prices"),
        }
    }
}

impl FromStr for Channel {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "events" => Ok(Channel::Events),
            "prices" => Ok(Channel::Prices),
            _ => match raw.strip_prefix("position:") {
                Some(address) if !address.is_empty() => {
                    Ok(Channel::UserPosition(address.to_lowercase()))
                }
                _ => Err(anyhow!("unknown channel: {raw}")),
            },
        }
    }
}

/// 연결 상태
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: String,
    pub connected_at: u64,
    pub subscriptions: Vec<Channel>,
}

/// WebSocket Hub
///
/// 모든 WebSocket 연결과 메시지 브로드캐스팅을 관리
///
/// # Architecture
/// ```text
/// ┌─────────────┐     ┌──────────────┐     ┌──────────────────┐
/// │  Protocol   │────▶│              │────▶│  events          │
/// ├─────────────┤     │   WsHub      │     ├──────────────────┤
/// │  Oracle     │────▶│  (Router)    │────▶│  prices          │
/// └─────────────┘     │              │     ├──────────────────┤
///                     │              │────▶│  position:0x...  │
///                     └──────────────┘     └──────────────────┘
/// ```
pub struct WsHub {
    /// 브로드캐스트 채널 (엔진 이벤트)
    events_tx: broadcast::Sender<WsMessage>,
    /// 브로드캐스트 채널 (가격)
    price_tx: broadcast::Sender<WsMessage>,
    /// 사용자별 개인 채널 (소문자 0x 주소)
    user_channels: Arc<RwLock<HashMap<String, broadcast::Sender<WsMessage>>>>,
    /// 연결 정보
    connections: Arc<RwLock<HashMap<String, ConnectionInfo>>>,
}

impl WsHub {
    /// 새 WsHub 생성
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(1000);
        let (price_tx, _) = broadcast::channel(1000);

        Self {
            events_tx,
            price_tx,
            user_channels: Arc::new(RwLock::new(HashMap::new())),
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 엔진 이벤트 브로드캐스트
    pub fn broadcast_event(&self, sequence: u64, event: EventView, timestamp: u64) {
        let _ = self.events_tx.send(WsMessage::EngineEvent(EventUpdate {
            sequence,
            event,
            timestamp,
        }));
    }

    /// 가격 브로드캐스트
    pub fn broadcast_price(&self, update: PriceData) {
        let _ = self.price_tx.send(WsMessage::PriceUpdate(update));
    }

    /// 특정 사용자에게 포지션 업데이트 전송
    pub async fn send_position_update(&self, snapshot: PositionSnapshot) {
        let channels = self.user_channels.read().await;
        if let Some(tx) = channels.get(&snapshot.address.to_lowercase()) {
            let _ = tx.send(WsMessage::PositionUpdate(snapshot));
        }
    }

    /// 청산 경고 전송 (사용자 채널 + 이벤트 채널)
    pub async fn send_liquidation_warning(&self, warning: LiquidationWarning) {
        {
            let channels = self.user_channels.read().await;
            if let Some(tx) = channels.get(&warning.address.to_lowercase()) {
                let _ = tx.send(WsMessage::LiquidationWarning(warning.clone()));
            }
        }
        let _ = self.events_tx.send(WsMessage::LiquidationWarning(warning));
    }

    /// 이벤트 구독
    pub fn subscribe_events(&self) -> broadcast::Receiver<WsMessage> {
        self.events_tx.subscribe()
    }

    /// 가격 구독
    pub fn subscribe_prices(&self) -> broadcast::Receiver<WsMessage> {
        self.price_tx.subscribe()
    }

    /// 사용자 채널 구독
    ///
    /// 구독자가 모두 떠난 채널은 여기서 함께 정리된다.
    pub async fn subscribe_user(&self, address: &str) -> broadcast::Receiver<WsMessage> {
        let mut channels = self.user_channels.write().await;
        channels.retain(|_, tx| tx.receiver_count() > 0);

        let tx = channels.entry(address.to_lowercase()).or_insert_with(|| {
            let (tx, _) = broadcast::channel(100);
            tx
        });

        tx.subscribe()
    }

    /// 연결 등록
    pub async fn register_connection(&self, id: String, info: ConnectionInfo) {
        let mut conns = self.connections.write().await;
        conns.insert(id, info);
    }

    /// 구독 기록
    pub async fn record_subscription(&self, id: &str, channel: Channel) {
        let mut conns = self.connections.write().await;
        if let Some(info) = conns.get_mut(id) {
            if !info.subscriptions.contains(&channel) {
                info.subscriptions.push(channel);
            }
        }
    }

    /// 연결 해제 + 구독자 없는 사용자 채널 정리
    pub async fn unregister_connection(&self, id: &str) {
        {
            let mut conns = self.connections.write().await;
            conns.remove(id);
        }
        let mut channels = self.user_channels.write().await;
        channels.retain(|_, tx| tx.receiver_count() > 0);
    }

    /// 열려 있는 사용자 채널 수
    pub async fn user_channel_count(&self) -> usize {
        self.user_channels.read().await.len()
    }

    /// 활성 연결 수
    pub async fn active_connections(&self) -> usize {
        let conns = self.connections.read().await;
        conns.len()
    }
}

impl Default for WsHub {
    fn default() -> Self {
        Self::new()
    }
}

/// WebSocket 클라이언트 메시지 (수신)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ClientMessage {
    /// 채널 구독
    Subscribe { channel: String },
    /// 구독 취소
    Unsubscribe { channel: String },
    /// Ping (keepalive)
    Ping,
}

/// 클라이언트 메시지 파싱
pub fn parse_client_message(data: &str) -> Result<ClientMessage> {
    serde_json::from_str(data).map_err(Into::into)
}

/// 서버 메시지 직렬화
pub fn serialize_message(msg: &WsMessage) -> Result<String> {
    serde_json::to_string(msg).map_err(Into::into)
}

/// 청산 긴급도 판단 (건전한 포지션은 None)
pub fn get_liquidation_urgency(health_factor_bps: u64) -> Option<LiquidationUrgency> {
    if health_factor_bps < CRITICAL_BPS {
        Some(LiquidationUrgency::Critical)
    } else if health_factor_bps < HEALTHY_BPS {
        Some(LiquidationUrgency::High)
    } else {
        None
    }
}

/// 청산 가능 포지션에 대한 경고 생성
pub fn liquidation_warning(snapshot: &PositionSnapshot, timestamp: u64) -> Option<LiquidationWarning> {
    let bps: u64 = snapshot.health_factor_bps.as_deref()?.parse().ok()?;
    let urgency = get_liquidation_urgency(bps)?;
    Some(LiquidationWarning {
        address: snapshot.address.clone(),
        health_factor_bps: bps,
        message: format!(
            "Position is liquidatable: collateral ratio {}.{:02} below 1.00",
            bps / 10_000,
            (bps % 10_000) / 100
        ),
        urgency,
        timestamp,
    })
}
