//! Health factor
//!
//! ```text
//! adjusted = collateral_usd * threshold / precision
//! hf       = adjusted * 10^DEBT_TOKEN_DECIMALS / (debt * 10^usd_decimals)
//! ```
//!
//! Debt is an 18-decimal token amount and collateral is USD at
//! `usd_decimals`, so the scales cancel and `hf` is the solvency ratio
//! truncated to an integer. `hf < MIN_HEALTH_FACTOR` exactly when the ratio
//! is below 1.

use ethers::types::U256;
use serde::{Deserialize, Serialize};

use crate::config::RiskParams;
use crate::constants::{DEBT_TOKEN_DECIMALS, MIN_HEALTH_FACTOR};
use crate::error::EngineResult;
use crate::valuation::{div, mul, pow10};

/// Health factor of a position with `total_debt` debt tokens outstanding
/// against `collateral_value_usd` worth of collateral.
///
/// No debt gives `U256::MAX`.
pub fn calculate_health_factor(
    total_debt: U256,
    collateral_value_usd: U256,
    params: &RiskParams,
) -> EngineResult<U256> {
    if total_debt.is_zero() {
        return Ok(U256::MAX);
    }

    let adjusted = div(
        mul(
            collateral_value_usd,
            U256::from(params.liquidation_threshold),
            "collateral adjusted for threshold",
        )?,
        U256::from(params.liquidation_precision),
    )?;
    let numerator = mul(adjusted, pow10(DEBT_TOKEN_DECIMALS)?, "health factor")?;
    let denominator = mul(total_debt, pow10(params.usd_decimals)?, "health factor")?;
    div(numerator, denominator)
}

pub fn min_health_factor() -> U256 {
    U256::from(MIN_HEALTH_FACTOR)
}

/// Derived solvency state, never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Healthy,
    AtRisk,
}

impl AccountStatus {
    pub fn from_health_factor(health_factor: U256) -> Self {
        if health_factor < min_health_factor() {
            AccountStatus::AtRisk
        } else {
            AccountStatus::Healthy
        }
    }
}
