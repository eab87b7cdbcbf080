//! Overcollateralized Debt-Token Engine
//!
//! Users lock collateral tokens and mint a dollar-pegged debt token (DSC)
//! against them. Every position must stay at least 200% collateralized;
//! positions that fall below are open to liquidation at a 10% bonus.
//!
//! # Components
//! - `ValuationEngine`: asset amount <-> USD through per-asset price feeds
//! - `calculate_health_factor`: solvency ratio of a position
//! - `PositionManager`: collateral and debt ledger, every mutating operation
//! - `DebtToken`: the debt token, mintable only by its engine
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use dsc_engine::{DebtToken, Deployed, InMemoryToken, MockPriceFeed, PositionManager, RiskParams};
//!
//! let engine = Address::from_low_u64_be(0xe);
//! let weth = Arc::new(InMemoryToken::new("WETH", 18));
//! let feed = Arc::new(MockPriceFeed::new("ETH / USD", 8, 2000_00000000));
//! let dsc = Arc::new(DebtToken::new(engine));
//!
//! let manager = PositionManager::new(
//!     engine,
//!     vec![Deployed::new(weth_address, weth)],
//!     vec![Deployed::new(feed_address, feed)],
//!     Deployed::new(dsc_address, dsc),
//!     RiskParams::default(),
//! )?;
//! manager.deposit_collateral_and_mint_dsc(user, weth_address, ten_ether, thousand_dsc)?;
//! ```

pub mod config;
pub mod constants;
pub mod debt_token;
pub mod error;
pub mod events;
pub mod guard;
pub mod health;
pub mod journal;
pub mod ledger;
pub mod manager;
pub mod oracle;
pub mod registry;
pub mod token;
pub mod valuation;

#[cfg(test)]
mod tests;

// Engine
pub use config::RiskParams;
pub use events::{EngineEvent, Receipt};
pub use health::{calculate_health_factor, AccountStatus};
pub use manager::{AccountInformation, PositionManager};
pub use valuation::{UsdValue, ValuationEngine};

// Error handling
pub use error::validation;
pub use error::{DebtTokenError, EngineError, EngineResult, ErrorKind};

// Collaborators
pub use debt_token::DebtToken;
pub use journal::Journaled;
pub use oracle::{MockPriceFeed, PriceFeed, RoundData};
pub use registry::{AssetRegistry, Deployed};
pub use token::{AssetTransfer, InMemoryToken};

// Re-export U256 / Address so callers do not need ethers directly
pub use ethers::types::{Address, U256};
