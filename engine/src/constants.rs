//! Protocol constants
//!
//! Percentages are expressed against [`LIQUIDATION_PRECISION`].

/// Share of collateral value that may back debt (50 / 100 = 200% overcollateralized)
pub const LIQUIDATION_THRESHOLD: u64 = 50;

/// Extra collateral awarded to a liquidator (10 / 100 = 10%)
pub const LIQUIDATION_BONUS: u64 = 10;

/// Denominator for threshold and bonus
pub const LIQUIDATION_PRECISION: u64 = 100;

/// Fixed reporting precision of every USD value (cents)
pub const USD_DECIMALS: u8 = 2;

/// Debt token precision
pub const DEBT_TOKEN_DECIMALS: u8 = 18;

/// 1.0 in the health-factor scale.
///
/// The debt-token and USD scales cancel in the health-factor formula, so the
/// ratio comes out as a truncated integer and 1.0 is simply `1`.
pub const MIN_HEALTH_FACTOR: u64 = 1;

pub const DEBT_TOKEN_NAME: &str = "Decentralized Stable Coin";
pub const DEBT_TOKEN_SYMBOL: &str = "DSC";
