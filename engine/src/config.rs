//! Risk parameters
//!
//! Immutable once the engine is constructed. Defaults mirror [`crate::constants`].

use serde::{Deserialize, Serialize};

use crate::constants::{
    LIQUIDATION_BONUS, LIQUIDATION_PRECISION, LIQUIDATION_THRESHOLD, USD_DECIMALS,
};
use crate::error::{EngineError, EngineResult};

/// Liquidation and valuation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskParams {
    /// Usable collateral share, numerator over `liquidation_precision`
    pub liquidation_threshold: u64,
    /// Liquidator bonus, numerator over `liquidation_precision`
    pub liquidation_bonus: u64,
    pub liquidation_precision: u64,
    /// Reporting precision of every USD value
    pub usd_decimals: u8,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            liquidation_threshold: LIQUIDATION_THRESHOLD,
            liquidation_bonus: LIQUIDATION_BONUS,
            liquidation_precision: LIQUIDATION_PRECISION,
            usd_decimals: USD_DECIMALS,
        }
    }
}

impl RiskParams {
    /// Reject parameter sets that would break the solvency math.
    pub fn validate(&self) -> EngineResult<()> {
        if self.liquidation_precision == 0 {
            return Err(EngineError::InvalidConfiguration {
                message: "liquidation precision must be non-zero".to_string(),
            });
        }
        if self.liquidation_threshold == 0 || self.liquidation_threshold > self.liquidation_precision {
            return Err(EngineError::InvalidConfiguration {
                message: format!(
                    "liquidation threshold {}/{} must be in (0, 1]",
                    self.liquidation_threshold, self.liquidation_precision
                ),
            });
        }
        if self.liquidation_bonus > self.liquidation_precision {
            return Err(EngineError::InvalidConfiguration {
                message: format!(
                    "liquidation bonus {}/{} exceeds 100%",
                    self.liquidation_bonus, self.liquidation_precision
                ),
            });
        }
        // 10^usd_decimals * 10^18 must stay far below U256::MAX
        if self.usd_decimals > 36 {
            return Err(EngineError::InvalidConfiguration {
                message: format!("usd decimals {} too large", self.usd_decimals),
            });
        }
        Ok(())
    }

    /// Threshold as (numerator, denominator)
    pub fn threshold_ratio(&self) -> (u64, u64) {
        (self.liquidation_threshold, self.liquidation_precision)
    }
}
