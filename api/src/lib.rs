//! DSC Engine API Library
//!
//! # Overview
//!
//! 이 라이브러리는 DSC 엔진(과담보 스테이블코인) 한 개를 메모리에 배포하고
//! HTTP/WebSocket으로 노출하는 백엔드 API를 제공합니다.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                         API                              │
//! │                                                          │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────┐    │
//! │  │ Routes  │  │Services │  │   DB    │  │  Types  │    │
//! │  └────┬────┘  └────┬────┘  └────┬────┘  └────┬────┘    │
//! │       │            │            │            │          │
//! │       └────────────┴────────────┴────────────┘          │
//! │                         │                                │
//! └─────────────────────────┼────────────────────────────────┘
//!                           │
//!                           ▼
//!                  ┌────────────────┐
//!                  │   dsc-engine   │
//!                  └────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: 환경 설정 관리
//! - `error`: 에러 타입 및 처리
//! - `routes`: HTTP 엔드포인트 핸들러
//! - `services`: 프로토콜 배포, 가격 피드, WebSocket 허브
//! - `db`: 이벤트 인덱싱 (선택)
//! - `types`: 공통 타입 정의
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dsc_api::{create_router, AppState, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let state = AppState::new(config, None)?;
//!     let app = create_router(state);
//!     // ... 서버 시작
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use dsc_engine::Receipt;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod services;
pub mod types;


// Re-exports for convenience
pub use config::Config;
pub use db::Database;
pub use error::ApiError;
pub use services::{PriceOracle, Protocol, WsHub};

use db::{Position, PositionEvent};
use services::{liquidation_warning, PriceData, RecordedEvent};
use types::EventView;

/// 애플리케이션 전역 상태
#[derive(Clone)]
pub struct AppState {
    pub protocol: Arc<Protocol>,
    pub hub: Arc<WsHub>,
    /// 없으면 히스토리는 메모리에서 제공
    pub db: Option<Arc<Database>>,
    pub config: Arc<Config>,
}

impl AppState {
    /// 엔진 배포 + 상태 구성
    pub fn new(config: Config, db: Option<Database>) -> anyhow::Result<Self> {
        let protocol = Protocol::deploy(&config).context("engine deployment failed")?;
        Ok(Self {
            protocol: Arc::new(protocol),
            hub: Arc::new(WsHub::new()),
            db: db.map(Arc::new),
            config: Arc::new(config),
        })
    }

    /// 커밋된 영수증을 구독자와 인덱서에 전달
    ///
    /// 인덱싱 실패는 로그만 남긴다. 엔진 상태는 이미 커밋됐다.
    pub async fn publish(&self, receipt: &Receipt, recorded: &[RecordedEvent]) {
        for entry in recorded {
            self.hub.broadcast_event(
                entry.sequence,
                EventView::from(&entry.event),
                entry.recorded_at.timestamp().max(0) as u64,
            );
        }

        let mut snapshots = Vec::new();
        for account in receipt.accounts() {
            match self.protocol.snapshot(account).await {
                Ok(snapshot) => {
                    self.hub.send_position_update(snapshot.clone()).await;
                    snapshots.push(snapshot);
                }
                Err(err) => {
                    tracing::warn!(account = ?account, error = %err, "position snapshot failed");
                }
            }
        }

        let Some(db) = &self.db else {
            return;
        };
        for entry in recorded {
            if let Err(err) = db.insert_event(&PositionEvent::from(entry)).await {
                tracing::warn!(sequence = entry.sequence, error = %err, "event indexing failed");
            }
        }
        for snapshot in &snapshots {
            if let Err(err) = db.upsert_position(&Position::from(snapshot)).await {
                tracing::warn!(address = %snapshot.address, error = %err, "position indexing failed");
            }
        }
    }

    /// 가격 변경 브로드캐스트 + 청산 가능 포지션 경고
    pub async fn publish_price(&self, price: PriceData) {
        let timestamp = price.updated_at.timestamp().max(0) as u64;
        self.hub.broadcast_price(price);

        for snapshot in self.protocol.at_risk_positions().await {
            if let Some(warning) = liquidation_warning(&snapshot, timestamp) {
                tracing::info!(
                    address = %warning.address,
                    health_factor_bps = warning.health_factor_bps,
                    "liquidation warning"
                );
                self.hub.send_liquidation_warning(warning).await;
            }
        }
    }
}

/// 라우터 생성
///
/// # Route Structure
///
/// ```text
/// GET  /health                         - 서버 상태 확인
/// GET  /protocol                       - 배포 정보, 리스크 파라미터
///
/// POST /faucet                         - 테스트 담보 토큰 지급
///
/// POST /collateral/deposit             - 담보 예치
/// POST /collateral/redeem              - 담보 인출
/// POST /collateral/deposit-and-mint    - 예치 + DSC 발행
/// POST /collateral/redeem-for-dsc      - DSC 상환 + 인출
///
/// POST /dsc/mint                       - DSC 발행
/// POST /dsc/burn                       - DSC 상환
///
/// POST /liquidate                      - 청산
/// GET  /liquidations/candidates        - 청산 가능 포지션
///
/// GET  /position/:address              - 포지션 조회
/// GET  /position/:address/history      - 이벤트 히스토리
///
/// GET  /price                          - 전체 가격
/// GET  /price/:asset                   - 자산 가격
/// POST /price/:asset                   - 가격 갱신 (시뮬레이션)
/// GET  /valuation                      - 토큰 수량 ↔ USD
///
/// GET  /ws                             - WebSocket
/// ```
pub fn create_router(state: AppState) -> Router {
    // CORS 설정
    // 프로덕션에서는 특정 도메인만 허용
    // 개발 환경에서는 localhost 허용
    let cors = if state.config.is_production() {
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        CorsLayer::new()
            .allow_origin([
                HeaderValue::from_static("http://localhost:5173"), // Vite dev server
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:5173"),
            ])
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        // Health check
        .route("/health", get(routes::health::health_check))
        .route("/protocol", get(routes::protocol::get_protocol))

        // Faucet
        .route("/faucet", post(routes::faucet::faucet))

        // Collateral
        .route("/collateral/deposit", post(routes::collateral::deposit))
        .route("/collateral/redeem", post(routes::collateral::redeem))
        .route("/collateral/deposit-and-mint", post(routes::collateral::deposit_and_mint))
        .route("/collateral/redeem-for-dsc", post(routes::collateral::redeem_for_dsc))

        // Debt token
        .route("/dsc/mint", post(routes::dsc::mint))
        .route("/dsc/burn", post(routes::dsc::burn))

        // Liquidation
        .route("/liquidate", post(routes::liquidation::liquidate))
        .route("/liquidations/candidates", get(routes::liquidation::candidates))

        // Position
        .route("/position/:address", get(routes::position::get_position))
        .route("/position/:address/history", get(routes::position::get_position_history))

        // Price
        .route("/price", get(routes::price::get_prices))
        .route(
            "/price/:asset",
            get(routes::price::get_price).post(routes::price::set_price),
        )
        .route("/valuation", get(routes::price::get_valuation))

        // WebSocket
        .route("/ws", get(routes::ws::ws_handler))

        // 미들웨어
        .layer(TraceLayer::new_for_http())
        .layer(cors)

        // 상태 주입
        .with_state(state)
}
