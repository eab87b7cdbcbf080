//! Position ledger
//!
//! Per-user-per-asset collateral and per-user debt. Only the position manager
//! writes here, and only through a [`PendingLedger`]: writes are staged in an
//! overlay and reach the ledger in one step when the operation succeeds.

use std::collections::HashMap;

use ethers::types::{Address, U256};
use parking_lot::Mutex;

/// Read access to positions
pub trait LedgerView {
    fn collateral_of(&self, user: Address, token: Address) -> U256;
    fn debt_of(&self, user: Address) -> U256;
}

#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
    collateral: HashMap<(Address, Address), U256>,
    debt: HashMap<Address, U256>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Users with outstanding debt, sorted
    pub fn accounts_with_debt(&self) -> Vec<Address> {
        let mut accounts: Vec<Address> = self.debt.keys().copied().collect();
        accounts.sort();
        accounts
    }

    fn write_collateral(&mut self, user: Address, token: Address, amount: U256) {
        if amount.is_zero() {
            self.collateral.remove(&(user, token));
        } else {
            self.collateral.insert((user, token), amount);
        }
    }

    fn write_debt(&mut self, user: Address, amount: U256) {
        if amount.is_zero() {
            self.debt.remove(&user);
        } else {
            self.debt.insert(user, amount);
        }
    }
}

impl LedgerView for PositionLedger {
    fn collateral_of(&self, user: Address, token: Address) -> U256 {
        self.collateral
            .get(&(user, token))
            .copied()
            .unwrap_or_default()
    }

    fn debt_of(&self, user: Address) -> U256 {
        self.debt.get(&user).copied().unwrap_or_default()
    }
}

/// Committed state; each read holds the lock only for that read
impl LedgerView for Mutex<PositionLedger> {
    fn collateral_of(&self, user: Address, token: Address) -> U256 {
        self.lock().collateral_of(user, token)
    }

    fn debt_of(&self, user: Address) -> U256 {
        self.lock().debt_of(user)
    }
}

/// Writes staged on top of the shared ledger
///
/// Reads see staged values first. Dropping without [`PendingLedger::commit`]
/// discards every write.
pub struct PendingLedger<'a> {
    base: &'a Mutex<PositionLedger>,
    collateral: HashMap<(Address, Address), U256>,
    debt: HashMap<Address, U256>,
}

impl<'a> PendingLedger<'a> {
    pub fn new(base: &'a Mutex<PositionLedger>) -> Self {
        Self {
            base,
            collateral: HashMap::new(),
            debt: HashMap::new(),
        }
    }

    pub fn set_collateral(&mut self, user: Address, token: Address, amount: U256) {
        self.collateral.insert((user, token), amount);
    }

    pub fn set_debt(&mut self, user: Address, amount: U256) {
        self.debt.insert(user, amount);
    }

    pub fn is_empty(&self) -> bool {
        self.collateral.is_empty() && self.debt.is_empty()
    }

    pub fn commit(self) {
        let mut ledger = self.base.lock();
        for ((user, token), amount) in self.collateral {
            ledger.write_collateral(user, token, amount);
        }
        for (user, amount) in self.debt {
            ledger.write_debt(user, amount);
        }
    }
}

impl LedgerView for PendingLedger<'_> {
    fn collateral_of(&self, user: Address, token: Address) -> U256 {
        match self.collateral.get(&(user, token)) {
            Some(amount) => *amount,
            None => self.base.collateral_of(user, token),
        }
    }

    fn debt_of(&self, user: Address) -> U256 {
        match self.debt.get(&user) {
            Some(amount) => *amount,
            None => self.base.debt_of(user),
        }
    }
}
