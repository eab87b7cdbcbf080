//! Health Check Endpoint
//!
//! 프로세스 상태 + (설정된 경우) DB 연결 상태.
//! DB가 설정됐는데 응답이 없으면 "degraded".

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

/// Health check 응답
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: DatabaseStatus,
    pub ws_connections: usize,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct DatabaseStatus {
    pub configured: bool,
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

/// GET /health
///
/// 서버 및 의존성 상태 확인
pub async fn health_check(
    State(state): State<AppState>,
) -> Json<HealthResponse> {
    let db_status = match &state.db {
        Some(db) => {
            // DB 연결 테스트
            let db_start = std::time::Instant::now();
            match db.health_check().await {
                Ok(_) => DatabaseStatus {
                    configured: true,
                    connected: true,
                    latency_ms: Some(db_start.elapsed().as_millis() as u64),
                },
                Err(err) => {
                    tracing::warn!(error = %err, "database health check failed");
                    DatabaseStatus {
                        configured: true,
                        connected: false,
                        latency_ms: None,
                    }
                }
            }
        }
        None => DatabaseStatus {
            configured: false,
            connected: false,
            latency_ms: None,
        },
    };

    let degraded = db_status.configured && !db_status.connected;

    Json(HealthResponse {
        status: if degraded { "degraded" } else { "healthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_status,
        ws_connections: state.hub.active_connections().await,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
