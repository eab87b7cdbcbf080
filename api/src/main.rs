//! DSC Engine API Server
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Client (Frontend)                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum Web Server                         │
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                      Routes Layer                        ││
//! │  │  /collateral/*  /dsc/*  /liquidate  /position/*  /ws    ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Services Layer                        ││
//! │  │  Protocol (engine)    PriceOracle    WsHub               ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Data Layer                            ││
//! │  │  PostgreSQL event index (optional)                       ││
//! │  └─────────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dsc_api::{create_router, AppState, Config, Database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 환경변수 로드
    dotenvy::dotenv().ok();

    // 로깅 초기화
    // RUST_LOG=debug,sqlx=warn 형태로 레벨 제어 가능
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "dsc_api=debug,dsc_engine=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting DSC Engine API Server");

    // 설정 로드
    let config = Config::from_env()?;
    tracing::info!(
        environment = ?config.environment,
        threshold = config.risk.liquidation_threshold,
        bonus = config.risk.liquidation_bonus,
        "Configuration loaded"
    );

    // 데이터베이스 (선택)
    let db = match &config.database_url {
        Some(url) => {
            let db = Database::connect(url).await?;
            tracing::info!("Database connected");

            // 마이그레이션 실행
            db.run_migrations().await?;
            tracing::info!("Migrations completed");
            Some(db)
        }
        None => {
            tracing::info!("DATABASE_URL not set, history served from memory");
            None
        }
    };

    // 엔진 배포 + 앱 상태 구성
    let port = config.port;
    let state = AppState::new(config, db)?;
    tracing::info!(
        engine = ?state.protocol.manager().address(),
        assets = state.protocol.assets().len(),
        "Engine deployed"
    );

    // 라우터 구성
    let app = create_router(state);

    // 서버 시작
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
