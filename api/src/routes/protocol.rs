//! Protocol Info Endpoint

use axum::{extract::State, Json};

use crate::{services::ProtocolInfo, AppState};

/// GET /protocol
///
/// 엔진/DSC 주소, 담보 자산 + 피드, 리스크 파라미터
pub async fn get_protocol(State(state): State<AppState>) -> Json<ProtocolInfo> {
    Json(state.protocol.info())
}
