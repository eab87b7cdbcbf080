//! Collateral valuation
//!
//! Converts asset amounts to USD at the fixed reporting precision and back.
//!
//! ```text
//! usd    = price * amount * 10^usd_decimals / (10^asset_decimals * 10^oracle_decimals)
//! amount = usd * 10^oracle_decimals * 10^asset_decimals / (price * 10^usd_decimals)
//! ```
//!
//! Integer division truncates toward zero. Prices are used as reported: a
//! negative answer is reinterpreted as its 256-bit two's complement, which
//! overflows for any non-zero amount, and a zero answer values everything at
//! zero.

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::ledger::LedgerView;
use crate::registry::AssetRegistry;

/// A USD amount and the decimals it is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsdValue {
    pub amount: U256,
    pub decimals: u8,
}

/// Oracle answer as an unsigned 256-bit word
pub fn price_to_u256(answer: i128) -> U256 {
    if answer >= 0 {
        U256::from(answer.unsigned_abs())
    } else {
        (!U256::from(answer.unsigned_abs())).overflowing_add(U256::one()).0
    }
}

pub(crate) fn pow10(exponent: u8) -> EngineResult<U256> {
    U256::from(10u64)
        .checked_pow(U256::from(exponent))
        .ok_or(EngineError::overflow("power of ten"))
}

pub(crate) fn mul(a: U256, b: U256, operation: &'static str) -> EngineResult<U256> {
    a.checked_mul(b).ok_or(EngineError::overflow(operation))
}

pub(crate) fn div(a: U256, b: U256) -> EngineResult<U256> {
    a.checked_div(b).ok_or(EngineError::DivisionByZero)
}

pub struct ValuationEngine {
    registry: AssetRegistry,
    usd_decimals: u8,
}

impl ValuationEngine {
    pub fn new(registry: AssetRegistry, usd_decimals: u8) -> Self {
        Self {
            registry,
            usd_decimals,
        }
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    pub fn usd_decimals(&self) -> u8 {
        self.usd_decimals
    }

    /// USD value of `amount` of `token`
    pub fn usd_value(&self, token: Address, amount: U256) -> EngineResult<UsdValue> {
        let asset = self.registry.get(token)?;
        let round = asset.feed.latest_round_data();
        let price = price_to_u256(round.answer);
        let oracle_decimals = asset.feed.decimals();
        let asset_decimals = asset.token.decimals();

        let numerator = mul(
            mul(price, amount, "usd value")?,
            pow10(self.usd_decimals)?,
            "usd value",
        )?;
        let denominator = mul(
            pow10(asset_decimals)?,
            pow10(oracle_decimals)?,
            "usd value scale",
        )?;
        let value = div(numerator, denominator)?;

        tracing::trace!(
            ?token,
            %amount,
            answer = round.answer,
            oracle_decimals,
            asset_decimals,
            %value,
            "valued collateral"
        );

        Ok(UsdValue {
            amount: value,
            decimals: self.usd_decimals,
        })
    }

    /// Amount of `token` worth `usd_amount`, where `usd_amount` carries
    /// `usd_decimals` decimals (the debt token's when it is a debt quantity).
    pub fn token_amount_from_usd(
        &self,
        token: Address,
        usd_amount: U256,
        usd_decimals: u8,
    ) -> EngineResult<U256> {
        let asset = self.registry.get(token)?;
        let price = price_to_u256(asset.feed.latest_round_data().answer);
        let oracle_decimals = asset.feed.decimals();
        let asset_decimals = asset.token.decimals();

        let numerator = mul(
            mul(usd_amount, pow10(oracle_decimals)?, "token amount")?,
            pow10(asset_decimals)?,
            "token amount",
        )?;
        let denominator = mul(price, pow10(usd_decimals)?, "token amount scale")?;
        div(numerator, denominator)
    }

    /// Sum of the USD values of every collateral position of `user`.
    ///
    /// Each asset is priced with its own oracle decimals; the sum is always
    /// at the engine's reporting precision.
    pub fn account_collateral_value<L: LedgerView + ?Sized>(
        &self,
        ledger: &L,
        user: Address,
    ) -> EngineResult<U256> {
        let mut total = U256::zero();
        for token in self.registry.tokens() {
            let amount = ledger.collateral_of(user, *token);
            let value = self.usd_value(*token, amount)?;
            total = total
                .checked_add(value.amount)
                .ok_or(EngineError::overflow("collateral total"))?;
        }
        Ok(total)
    }
}
