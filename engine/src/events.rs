//! Engine events
//!
//! Collected while an operation runs and handed back in a [`Receipt`] when it
//! commits. A failed operation's events are dropped with it.

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    CollateralDeposited {
        user: Address,
        token: Address,
        amount: U256,
    },
    CollateralRedeemed {
        from: Address,
        to: Address,
        token: Address,
        amount: U256,
    },
    DscMinted {
        user: Address,
        amount: U256,
    },
    DscBurned {
        on_behalf_of: Address,
        payer: Address,
        amount: U256,
    },
    Liquidated {
        liquidator: Address,
        user: Address,
        token: Address,
        debt_covered: U256,
        collateral_seized: U256,
    },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::CollateralDeposited { .. } => "collateral_deposited",
            EngineEvent::CollateralRedeemed { .. } => "collateral_redeemed",
            EngineEvent::DscMinted { .. } => "dsc_minted",
            EngineEvent::DscBurned { .. } => "dsc_burned",
            EngineEvent::Liquidated { .. } => "liquidated",
        }
    }

    /// Accounts whose position or balance the event touches
    pub fn accounts(&self) -> Vec<Address> {
        match self {
            EngineEvent::CollateralDeposited { user, .. } => vec![*user],
            EngineEvent::CollateralRedeemed { from, to, .. } => vec![*from, *to],
            EngineEvent::DscMinted { user, .. } => vec![*user],
            EngineEvent::DscBurned {
                on_behalf_of,
                payer,
                ..
            } => vec![*on_behalf_of, *payer],
            EngineEvent::Liquidated {
                liquidator, user, ..
            } => vec![*liquidator, *user],
        }
    }
}

/// Events emitted by one committed operation, in order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub events: Vec<EngineEvent>,
}

impl Receipt {
    /// Distinct touched accounts in first-seen order
    pub fn accounts(&self) -> Vec<Address> {
        let mut accounts: Vec<Address> = Vec::new();
        for account in self.events.iter().flat_map(EngineEvent::accounts) {
            if !accounts.contains(&account) {
                accounts.push(account);
            }
        }
        accounts
    }
}
