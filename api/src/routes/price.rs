//! Price Oracle Endpoints
//!
//! 피드는 시뮬레이션이다. `POST /price/:asset`로 가격을 바꾸면 엔진은 다음
//! 평가부터 새 가격을 사용하고, 청산 가능해진 포지션에 경고가 나간다.
//!
//! 0/음수 가격도 거부하지 않는다 (엔진이 피드 값을 검증하지 않음).

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    services::PriceData,
    types::{format_units, parse_amount},
    AppState,
};

// ============ Request/Response Types ============

/// 가격 갱신 요청
#[derive(Debug, Deserialize)]
pub struct SetPriceRequest {
    /// 피드 decimals 자리 정수 (부호 있음), 예: "180000000000" = $1800
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct PricesResponse {
    pub prices: Vec<PriceData>,
}

/// 평가 쿼리 (`amount` → USD, `usd` → 토큰 수량)
#[derive(Debug, Deserialize)]
pub struct ValuationQuery {
    pub asset: String,
    pub amount: Option<String>,
    pub usd: Option<String>,
    /// `usd` 값의 decimals (기본: 엔진 USD decimals)
    pub usd_decimals: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct ValuationResponse {
    pub asset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usd_value: Option<UsdAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_amount_from_usd: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UsdAmount {
    pub amount: String,
    pub decimals: u8,
    pub formatted: String,
}

// ============ Handlers ============

/// GET /price
pub async fn get_prices(State(state): State<AppState>) -> Json<PricesResponse> {
    Json(PricesResponse {
        prices: state.protocol.oracle().all(),
    })
}

/// GET /price/:asset
pub async fn get_price(
    State(state): State<AppState>,
    Path(asset): Path<String>,
) -> Result<Json<PriceData>, ApiError> {
    let symbol = &state.protocol.asset(&asset)?.symbol;
    state
        .protocol
        .oracle()
        .latest(symbol)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Price feed for {symbol}")))
}

/// POST /price/:asset
pub async fn set_price(
    State(state): State<AppState>,
    Path(asset): Path<String>,
    Json(req): Json<SetPriceRequest>,
) -> Result<Json<PriceData>, ApiError> {
    let answer: i128 = req.answer.trim().parse().map_err(|_| {
        ApiError::ValidationError(format!("Price answer must be an integer: {:?}", req.answer))
    })?;

    let price = state.protocol.set_price(&asset, answer).await?;
    state.publish_price(price.clone()).await;
    Ok(Json(price))
}

/// GET /valuation?asset=WETH&amount=1000000000000000000
/// GET /valuation?asset=WETH&usd=100000
pub async fn get_valuation(
    State(state): State<AppState>,
    Query(query): Query<ValuationQuery>,
) -> Result<Json<ValuationResponse>, ApiError> {
    if query.amount.is_none() && query.usd.is_none() {
        return Err(ApiError::BadRequest(
            "Either amount or usd must be provided".to_string(),
        ));
    }
    let token = state.protocol.token_address(&query.asset)?;
    let engine = state.protocol.manager();

    let usd_value = match &query.amount {
        Some(raw) => {
            let value = engine.get_usd_value(token, parse_amount(raw)?)?;
            Some(UsdAmount {
                amount: value.amount.to_string(),
                decimals: value.decimals,
                formatted: format!("${}", format_units(value.amount, value.decimals)),
            })
        }
        None => None,
    };

    let token_amount_from_usd = match &query.usd {
        Some(raw) => {
            let usd_decimals = query.usd_decimals.unwrap_or(engine.params().usd_decimals);
            let amount = engine.get_token_amount_from_usd(token, parse_amount(raw)?, usd_decimals)?;
            Some(amount.to_string())
        }
        None => None,
    };

    Ok(Json(ValuationResponse {
        asset: query.asset.clone(),
        amount: query.amount.clone(),
        usd_value,
        token_amount_from_usd,
    }))
}
