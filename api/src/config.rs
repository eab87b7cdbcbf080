//! Configuration Module
//!
//! 환경변수 기반 설정 (12-Factor). 시작 시점에 모두 검증하고, 잘못된 값은
//! 즉시 실패한다 (fail-fast).

use std::env;

use anyhow::{bail, Context, Result};
use dsc_engine::RiskParams;

/// 시뮬레이션 가격 피드 기본값 (8 decimals)
pub const DEFAULT_WETH_USD_PRICE: i128 = 2_000_00000000;
pub const DEFAULT_WBTC_USD_PRICE: i128 = 60_000_00000000;

/// 메모리 이벤트 히스토리 최대 보관 개수
pub const DEFAULT_HISTORY_CAPACITY: usize = 10_000;

/// 애플리케이션 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 서버 포트 (기본값: 3001)
    pub port: u16,

    /// PostgreSQL 연결 문자열
    /// 없으면 이벤트 인덱싱 비활성화 (히스토리는 메모리에서 제공)
    pub database_url: Option<String>,

    /// 환경 (development, staging, production)
    pub environment: Environment,

    /// 프로덕션 CORS 허용 도메인
    pub allowed_origins: Vec<String>,

    /// WETH/USD 초기 가격 (8 decimals)
    pub weth_usd_price: i128,

    /// WBTC/USD 초기 가격 (8 decimals)
    pub wbtc_usd_price: i128,

    /// 청산 임계값 / 보너스 (퍼센트)
    pub risk: RiskParams,

    /// 메모리 히스토리 보관 개수 (초과 시 오래된 이벤트부터 삭제)
    pub history_capacity: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Config {
    /// 환경변수에서 설정 로드
    ///
    /// # Optional Environment Variables
    ///
    /// - `PORT`: 서버 포트 (기본값: 3001)
    /// - `DATABASE_URL`: PostgreSQL 연결 문자열
    /// - `ENVIRONMENT`: development | staging | production
    /// - `ALLOWED_ORIGINS`: 콤마 구분 (production 전용)
    /// - `WETH_USD_PRICE`, `WBTC_USD_PRICE`: 8 decimals 정수
    /// - `LIQUIDATION_THRESHOLD`, `LIQUIDATION_BONUS`: 퍼센트 (기본 50 / 10)
    /// - `HISTORY_CAPACITY`: 메모리 히스토리 보관 개수 (기본 10000)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 임의의 key → value 조회 함수로 설정 구성 (테스트용 주입 지점)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("ENVIRONMENT")
            .unwrap_or_else(|| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" => Environment::Production,
            "staging" => Environment::Staging,
            _ => Environment::Development,
        };

        let port = lookup("PORT")
            .unwrap_or_else(|| "3001".to_string())
            .parse()
            .context("PORT must be a valid number")?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let weth_usd_price = parse_price(&lookup, "WETH_USD_PRICE", DEFAULT_WETH_USD_PRICE)?;
        let wbtc_usd_price = parse_price(&lookup, "WBTC_USD_PRICE", DEFAULT_WBTC_USD_PRICE)?;

        let defaults = RiskParams::default();
        let risk = RiskParams {
            liquidation_threshold: parse_percent(
                &lookup,
                "LIQUIDATION_THRESHOLD",
                defaults.liquidation_threshold,
            )?,
            liquidation_bonus: parse_percent(&lookup, "LIQUIDATION_BONUS", defaults.liquidation_bonus)?,
            ..defaults
        };
        risk.validate().context("invalid liquidation parameters")?;

        let history_capacity = match lookup("HISTORY_CAPACITY") {
            Some(raw) => raw
                .trim()
                .parse()
                .context("HISTORY_CAPACITY must be a valid number")?,
            None => DEFAULT_HISTORY_CAPACITY,
        };
        if history_capacity == 0 {
            bail!("HISTORY_CAPACITY must be at least 1");
        }

        Ok(Config {
            port,
            database_url,
            environment,
            allowed_origins,
            weth_usd_price,
            wbtc_usd_price,
            risk,
            history_capacity,
        })
    }

    /// 프로덕션 환경인지 확인
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn parse_price<F>(lookup: &F, key: &str, default: i128) -> Result<i128>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let price: i128 = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be an integer with 8 decimals"))?;
    if price <= 0 {
        bail!("{key} must be positive, got {price}");
    }
    Ok(price)
}

fn parse_percent<F>(lookup: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a whole percentage")),
        None => Ok(default),
    }
}
