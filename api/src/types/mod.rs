//! Common Types Module
//!
//! 애플리케이션 전반에서 사용되는 공통 타입 정의
//!
//! 금액은 항상 10진수 문자열, 주소는 0x-hex 문자열로 주고받는다.

use dsc_engine::{Address, EngineEvent, U256};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Ethereum 주소 파싱 (0x + 40 hex)
pub fn parse_address(raw: &str) -> Result<Address, ApiError> {
    let raw = raw.trim();
    let valid = raw.starts_with("0x")
        && raw.len() == 42
        && raw[2..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(ApiError::ValidationError(format!(
            "Invalid Ethereum address: {raw}"
        )));
    }
    raw.parse()
        .map_err(|_| ApiError::ValidationError(format!("Invalid Ethereum address: {raw}")))
}

/// 10진수 금액 문자열 파싱
pub fn parse_amount(raw: &str) -> Result<U256, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::ValidationError(format!(
            "Amount must be a decimal integer string: {raw:?}"
        )));
    }
    U256::from_dec_str(raw)
        .map_err(|_| ApiError::ValidationError(format!("Amount out of range: {raw}")))
}

/// 전체 길이 소문자 hex 주소
pub fn hex_address(address: Address) -> String {
    format!("{:#x}", address)
}

/// 사람이 읽기 쉬운 형태로 변환 (정밀도 손실 없음)
///
/// `format_units(1_500_000, 6) == "1.5"`
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }
    let padded = format!("{:0>width$}", digits, width = decimals + 1);
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

/// 엔진 이벤트의 응답/저장용 평탄화 형태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventView {
    /// collateral_deposited, collateral_redeemed, dsc_minted, dsc_burned, liquidated
    pub event_type: String,
    /// 포지션이 변경된 계정
    pub account: String,
    /// 상대 계정 (redeem 수령자, burn 지불자, 청산자)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// 토큰 수량 또는 상환된 부채
    pub amount: String,
    /// 청산 시 압류된 담보
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collateral_seized: Option<String>,
}

impl From<&EngineEvent> for EventView {
    fn from(event: &EngineEvent) -> Self {
        let view = |account: Address, counterparty: Option<Address>, token: Option<Address>, amount: U256| EventView {
            event_type: event.name().to_string(),
            account: hex_address(account),
            counterparty: counterparty.map(hex_address),
            token: token.map(hex_address),
            amount: amount.to_string(),
            collateral_seized: None,
        };

        match event {
            EngineEvent::CollateralDeposited { user, token, amount } => {
                view(*user, None, Some(*token), *amount)
            }
            EngineEvent::CollateralRedeemed {
                from,
                to,
                token,
                amount,
            } => view(*from, Some(*to), Some(*token), *amount),
            EngineEvent::DscMinted { user, amount } => view(*user, None, None, *amount),
            EngineEvent::DscBurned {
                on_behalf_of,
                payer,
                amount,
            } => view(*on_behalf_of, Some(*payer), None, *amount),
            EngineEvent::Liquidated {
                liquidator,
                user,
                token,
                debt_covered,
                collateral_seized,
            } => EventView {
                collateral_seized: Some(collateral_seized.to_string()),
                ..view(*user, Some(*liquidator), Some(*token), *debt_covered)
            },
        }
    }
}
