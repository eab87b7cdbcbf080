//! Protocol Service
//!
//! 엔진 한 개 배포 + 시뮬레이션 협력자 (WETH/WBTC 인메모리 토큰, 가격 피드).
//!
//! # Concurrency
//!
//! 엔진은 재진입을 즉시 거부하므로, 동시에 들어온 HTTP 요청은 여기서
//! `writer` 뮤텍스로 줄을 세운다. 포지션 조회도 같은 락 아래에서 읽어서
//! 진행 중인 작업의 중간 상태(토큰 잔액만 옮겨진 상태)를 보지 않는다.
//!
//! 메모리 히스토리는 `history_capacity` 개까지만 보관한다.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dsc_engine::{
    AccountStatus, Address, AssetTransfer, DebtToken, Deployed, EngineError, EngineEvent,
    EngineResult, InMemoryToken, MockPriceFeed, PositionManager, PriceFeed, Receipt, U256,
};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;

use crate::config::Config;
use crate::error::ApiError;
use crate::services::price_oracle::{PriceData, PriceOracle};
use crate::types::{format_units, hex_address};

// ============ Deployment addresses ============

const ENGINE: u64 = 0xd5c0_e000;
const DEBT_TOKEN: u64 = 0xd5c0_0001;
const WETH: u64 = 0xd5c0_1001;
const WBTC: u64 = 0xd5c0_1002;
const WETH_USD_FEED: u64 = 0xd5c0_2001;
const WBTC_USD_FEED: u64 = 0xd5c0_2002;

/// 시뮬레이션 담보 자산
pub struct SimulatedAsset {
    pub symbol: String,
    pub address: Address,
    pub feed_address: Address,
    pub token: Arc<InMemoryToken>,
    pub feed: Arc<MockPriceFeed>,
}

/// 커밋된 엔진 이벤트 (메모리 히스토리)
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub sequence: u64,
    pub event: EngineEvent,
    pub recorded_at: DateTime<Utc>,
}

struct EventLog {
    next_sequence: u64,
    entries: VecDeque<RecordedEvent>,
    capacity: usize,
}

impl EventLog {
    fn new(capacity: usize) -> Self {
        Self {
            next_sequence: 0,
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// 꽉 차면 가장 오래된 이벤트부터 삭제
    fn push(&mut self, entry: RecordedEvent) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }
}

/// 자산별 담보 현황
#[derive(Debug, Clone, Serialize)]
pub struct CollateralBalance {
    pub symbol: String,
    pub token: String,
    pub deposited: String,
    pub deposited_formatted: String,
    pub value_usd: String,
    pub wallet_balance: String,
}

/// 계정 포지션 스냅샷
#[derive(Debug, Clone, Serialize)]
pub struct PositionSnapshot {
    pub address: String,
    pub collateral: Vec<CollateralBalance>,
    /// USD_DECIMALS 자리 정수
    pub collateral_value_usd: String,
    pub collateral_value_formatted: String,
    pub total_dsc_minted: String,
    pub dsc_balance: String,
    /// 부채 없으면 None
    pub health_factor: Option<String>,
    /// 건전성 비율 × 10000 (표시용)
    pub health_factor_bps: Option<String>,
    pub status: AccountStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetInfo {
    pub symbol: String,
    pub token: String,
    pub price_feed: String,
    pub decimals: u8,
    pub price: Option<PriceData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Ratio {
    pub numerator: u64,
    pub denominator: u64,
}

/// GET /protocol 응답
#[derive(Debug, Clone, Serialize)]
pub struct ProtocolInfo {
    pub engine: String,
    pub debt_token: String,
    pub debt_token_symbol: String,
    pub debt_token_decimals: u8,
    pub dsc_total_supply: String,
    pub assets: Vec<AssetInfo>,
    pub liquidation_threshold: Ratio,
    pub liquidation_bonus: Ratio,
    pub min_health_factor: String,
    pub usd_decimals: u8,
}

pub struct Protocol {
    manager: Arc<PositionManager>,
    assets: Vec<SimulatedAsset>,
    dsc: Arc<DebtToken>,
    oracle: PriceOracle,
    writer: AsyncMutex<()>,
    log: Mutex<EventLog>,
}

impl Protocol {
    /// WETH(18)/WBTC(8) 담보, 8 decimals USD 피드로 엔진 배포
    pub fn deploy(config: &Config) -> EngineResult<Self> {
        let engine = Address::from_low_u64_be(ENGINE);
        let dsc = Arc::new(DebtToken::new(engine));

        let assets = vec![
            simulated_asset("WETH", 18, WETH, WETH_USD_FEED, "ETH / USD", config.weth_usd_price),
            simulated_asset("WBTC", 8, WBTC, WBTC_USD_FEED, "BTC / USD", config.wbtc_usd_price),
        ];

        let mut oracle = PriceOracle::new();
        let mut tokens = Vec::with_capacity(assets.len());
        let mut feeds = Vec::with_capacity(assets.len());
        for asset in &assets {
            oracle.register(&asset.symbol, asset.feed_address, asset.feed.clone());
            let token: Arc<dyn AssetTransfer> = asset.token.clone();
            let feed: Arc<dyn PriceFeed> = asset.feed.clone();
            tokens.push(Deployed::new(asset.address, token));
            feeds.push(Deployed::new(asset.feed_address, feed));
        }

        let manager = PositionManager::new(
            engine,
            tokens,
            feeds,
            Deployed::new(Address::from_low_u64_be(DEBT_TOKEN), dsc.clone()),
            config.risk,
        )?;

        Ok(Self {
            manager: Arc::new(manager),
            assets,
            dsc,
            oracle,
            writer: AsyncMutex::new(()),
            log: Mutex::new(EventLog::new(config.history_capacity)),
        })
    }

    pub fn manager(&self) -> &PositionManager {
        &self.manager
    }

    pub fn assets(&self) -> &[SimulatedAsset] {
        &self.assets
    }

    pub fn oracle(&self) -> &PriceOracle {
        &self.oracle
    }

    /// 심볼(대소문자 무시) 또는 토큰 주소로 자산 찾기
    pub fn asset(&self, key: &str) -> Result<&SimulatedAsset, ApiError> {
        let key = key.trim();
        let by_address: Option<Address> = key.parse().ok().filter(|_| key.starts_with("0x"));
        self.assets
            .iter()
            .find(|asset| match by_address {
                Some(address) => asset.address == address,
                None => asset.symbol.eq_ignore_ascii_case(key),
            })
            .ok_or_else(|| ApiError::NotFound(format!("Asset {key}")))
    }

    /// 작업 대상 토큰 주소
    ///
    /// 등록되지 않은 주소는 그대로 넘겨서 엔진이 TokenNotAllowed로 거부하게 한다.
    pub fn token_address(&self, key: &str) -> Result<Address, ApiError> {
        match self.asset(key) {
            Ok(asset) => Ok(asset.address),
            Err(not_found) => crate::types::parse_address(key).map_err(|_| not_found),
        }
    }

    /// 변경 작업을 직렬화해서 실행하고, 성공 시 이벤트를 기록
    pub async fn execute<F>(
        &self,
        operation: &'static str,
        run: F,
    ) -> Result<(Receipt, Vec<RecordedEvent>), EngineError>
    where
        F: FnOnce(&PositionManager) -> EngineResult<Receipt>,
    {
        let _writer = self.writer.lock().await;
        let receipt = run(&self.manager)?;

        let now = Utc::now();
        let mut log = self.log.lock();
        let mut recorded = Vec::with_capacity(receipt.events.len());
        for event in &receipt.events {
            let entry = RecordedEvent {
                sequence: log.next_sequence,
                event: event.clone(),
                recorded_at: now,
            };
            log.next_sequence += 1;
            log.push(entry.clone());
            recorded.push(entry);
        }
        tracing::debug!(operation, events = recorded.len(), "receipt recorded");
        Ok((receipt, recorded))
    }

    /// 테스트 토큰 지급
    pub async fn faucet(&self, symbol: &str, to: Address, amount: U256) -> Result<U256, ApiError> {
        let asset = self.asset(symbol)?;
        let _writer = self.writer.lock().await;
        if !asset.token.mint(to, amount) {
            return Err(ApiError::ValidationError(format!(
                "{} supply would overflow",
                asset.symbol
            )));
        }
        tracing::info!(symbol = %asset.symbol, to = ?to, %amount, "faucet");
        Ok(asset.token.balance_of(to))
    }

    /// 가격 갱신 (진행 중인 작업 사이에 끼어들지 않도록 직렬화)
    pub async fn set_price(&self, symbol: &str, answer: i128) -> Result<PriceData, ApiError> {
        let asset = self.asset(symbol)?;
        let _writer = self.writer.lock().await;
        self.oracle
            .set_price(&asset.symbol, answer)
            .ok_or_else(|| ApiError::NotFound(format!("Price feed for {}", asset.symbol)))
    }

    /// 커밋된 상태의 포지션 스냅샷
    pub async fn snapshot(&self, user: Address) -> EngineResult<PositionSnapshot> {
        let _writer = self.writer.lock().await;
        self.committed_snapshot(user)
    }

    fn committed_snapshot(&self, user: Address) -> EngineResult<PositionSnapshot> {
        let manager = &self.manager;
        let info = manager.get_account_information(user)?;
        let usd_decimals = manager.params().usd_decimals;

        let mut collateral = Vec::with_capacity(self.assets.len());
        for asset in &self.assets {
            let deposited = manager.get_collateral_balance_of_user(user, asset.address);
            let value = manager.get_usd_value(asset.address, deposited)?;
            collateral.push(CollateralBalance {
                symbol: asset.symbol.clone(),
                token: hex_address(asset.address),
                deposited: deposited.to_string(),
                deposited_formatted: format_units(deposited, asset.token.decimals()),
                value_usd: value.amount.to_string(),
                wallet_balance: asset.token.balance_of(user).to_string(),
            });
        }

        let raw_health_factor = manager.get_health_factor(user)?;
        let (health_factor, health_factor_bps) = if info.total_dsc_minted.is_zero() {
            (None, None)
        } else {
            let bps = info
                .collateral_value_usd
                .checked_mul(U256::from(10_000u64))
                .and_then(|scaled| {
                    manager
                        .calculate_health_factor(info.total_dsc_minted, scaled)
                        .ok()
                });
            (
                Some(raw_health_factor.to_string()),
                bps.map(|bps| bps.to_string()),
            )
        };

        Ok(PositionSnapshot {
            address: hex_address(user),
            collateral,
            collateral_value_usd: info.collateral_value_usd.to_string(),
            collateral_value_formatted: format!(
                "${}",
                format_units(info.collateral_value_usd, usd_decimals)
            ),
            total_dsc_minted: info.total_dsc_minted.to_string(),
            dsc_balance: self.dsc.balance_of(user).to_string(),
            health_factor,
            health_factor_bps,
            status: AccountStatus::from_health_factor(raw_health_factor),
        })
    }

    /// 청산 가능한 (HF < MIN) 부채 보유 계정
    pub async fn at_risk_positions(&self) -> Vec<PositionSnapshot> {
        let _writer = self.writer.lock().await;
        self.manager
            .accounts_with_debt()
            .into_iter()
            .filter_map(|user| match self.committed_snapshot(user) {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    tracing::warn!(user = ?user, error = %err, "cannot value position");
                    None
                }
            })
            .filter(|snapshot| snapshot.status == AccountStatus::AtRisk)
            .collect()
    }

    /// 계정 관련 이벤트 (최신순, 페이지네이션)
    pub fn history(&self, user: Address, page: u32, limit: u32) -> (Vec<RecordedEvent>, u64) {
        let log = self.log.lock();
        let matching: Vec<&RecordedEvent> = log
            .entries
            .iter()
            .rev()
            .filter(|entry| entry.event.accounts().contains(&user))
            .collect();
        let total = matching.len() as u64;
        let events = matching
            .into_iter()
            .skip(page as usize * limit as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        (events, total)
    }

    pub fn info(&self) -> ProtocolInfo {
        let manager = &self.manager;
        let (numerator, denominator) = manager.get_liquidation_threshold();
        ProtocolInfo {
            engine: hex_address(manager.address()),
            debt_token: hex_address(manager.debt_token_address()),
            debt_token_symbol: self.dsc.symbol(),
            debt_token_decimals: self.dsc.decimals(),
            dsc_total_supply: self.dsc.total_supply().to_string(),
            assets: manager
                .get_collateral_tokens()
                .into_iter()
                .filter_map(|token| self.assets.iter().find(|asset| asset.address == token))
                .map(|asset| AssetInfo {
                    symbol: asset.symbol.clone(),
                    token: hex_address(asset.address),
                    price_feed: manager
                        .get_collateral_token_price_feed(asset.address)
                        .map(hex_address)
                        .unwrap_or_default(),
                    decimals: asset.token.decimals(),
                    price: self.oracle.latest(&asset.symbol),
                })
                .collect(),
            liquidation_threshold: Ratio {
                numerator,
                denominator,
            },
            liquidation_bonus: Ratio {
                numerator: manager.get_liquidation_bonus(),
                denominator: manager.get_liquidation_precision(),
            },
            min_health_factor: manager.get_min_health_factor().to_string(),
            usd_decimals: manager.params().usd_decimals,
        }
    }
}

fn simulated_asset(
    symbol: &str,
    decimals: u8,
    address: u64,
    feed_address: u64,
    description: &str,
    price: i128,
) -> SimulatedAsset {
    SimulatedAsset {
        symbol: symbol.to_string(),
        address: Address::from_low_u64_be(address),
        feed_address: Address::from_low_u64_be(feed_address),
        token: Arc::new(InMemoryToken::new(symbol, decimals)),
        feed: Arc::new(MockPriceFeed::new(description, 8, price)),
    }
}
