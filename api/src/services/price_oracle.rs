//! Price Oracle Service
//!
//! 시뮬레이션 가격 피드 (Chainlink `latestRoundData` 형태) 묶음.
//! 엔진은 같은 `MockPriceFeed` 핸들을 직접 읽으므로, 여기서 갱신한 가격이
//! 다음 평가부터 그대로 반영된다 (캐시 없음).

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use dsc_engine::{Address, MockPriceFeed, PriceFeed, RoundData};
use serde::Serialize;

use crate::types::hex_address;

/// 가격 데이터
#[derive(Debug, Clone, Serialize)]
pub struct PriceData {
    pub symbol: String,
    pub feed: String,
    /// raw answer (`decimals` 자리)
    pub answer: String,
    pub decimals: u8,
    /// 사람이 읽기 쉬운 형태
    pub price_formatted: String,
    pub round_id: u64,
    pub updated_at: DateTime<Utc>,
}

struct FeedEntry {
    symbol: String,
    address: Address,
    feed: Arc<MockPriceFeed>,
}

/// 가격 오라클 서비스
pub struct PriceOracle {
    feeds: Vec<FeedEntry>,
}

impl PriceOracle {
    pub fn new() -> Self {
        Self { feeds: Vec::new() }
    }

    pub fn register(&mut self, symbol: &str, address: Address, feed: Arc<MockPriceFeed>) {
        self.feeds.push(FeedEntry {
            symbol: symbol.to_uppercase(),
            address,
            feed,
        });
    }

    /// 심볼로 최신 가격 조회
    pub fn latest(&self, symbol: &str) -> Option<PriceData> {
        self.entry(symbol).map(price_data)
    }

    /// 새 라운드로 가격 갱신
    ///
    /// 음수/0 가격도 그대로 반영된다. 엔진은 피드 값을 검증하지 않는다.
    pub fn set_price(&self, symbol: &str, answer: i128) -> Option<PriceData> {
        let entry = self.entry(symbol)?;
        let previous = entry.feed.latest_round_data().answer;
        entry.feed.update_answer(answer, Utc::now().timestamp().max(0) as u64);
        tracing::info!(symbol = %entry.symbol, previous, answer, "price updated");
        Some(price_data(entry))
    }

    pub fn all(&self) -> Vec<PriceData> {
        self.feeds.iter().map(price_data).collect()
    }

    fn entry(&self, symbol: &str) -> Option<&FeedEntry> {
        self.feeds
            .iter()
            .find(|entry| entry.symbol.eq_ignore_ascii_case(symbol))
    }
}

impl Default for PriceOracle {
    fn default() -> Self {
        Self::new()
    }
}

fn price_data(entry: &FeedEntry) -> PriceData {
    let RoundData {
        round_id,
        answer,
        updated_at,
    } = entry.feed.latest_round_data();
    let decimals = entry.feed.decimals();

    PriceData {
        symbol: entry.symbol.clone(),
        feed: hex_address(entry.address),
        answer: answer.to_string(),
        decimals,
        price_formatted: format_price(answer, decimals),
        round_id,
        updated_at: Utc
            .timestamp_opt(updated_at as i64, 0)
            .single()
            .unwrap_or_default(),
    }
}

/// `$2000.00` 형태 (소수 둘째 자리 버림)
pub fn format_price(answer: i128, decimals: u8) -> String {
    let scale = 10i128.checked_pow(decimals as u32).unwrap_or(i128::MAX);
    let sign = if answer < 0 { "-" } else { "" };
    let abs = answer.unsigned_abs();
    let scale = scale.unsigned_abs();
    let whole = abs / scale;
    let cents = (abs % scale) * 100 / scale;
    format!("{sign}${whole}.{cents:02}")
}
