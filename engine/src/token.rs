//! Asset transfer adapters
//!
//! Collateral tokens and the debt token both conform to [`AssetTransfer`].
//! A transfer reports failure by returning `false`; the engine turns that into
//! [`crate::EngineError::TransferFailed`] at the call site.

use std::sync::atomic::{AtomicBool, Ordering};

use ethers::types::{Address, U256};
use parking_lot::Mutex;

use crate::journal::{Journal, Journaled};

/// ERC-20-like movement of balances
///
/// There is no ambient sender, so `transfer` names the account it spends
/// from. `transfer_from` pulls on behalf of the engine; allowances are not
/// modelled.
pub trait AssetTransfer: Journaled + Send + Sync {
    fn transfer_from(&self, from: Address, to: Address, amount: U256) -> bool;
    fn transfer(&self, sender: Address, to: Address, amount: U256) -> bool;
    fn decimals(&self) -> u8;
    fn balance_of(&self, account: Address) -> U256;
    fn symbol(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Account(Address),
    TotalSupply,
}

/// Balance sheet shared by the in-memory tokens
///
/// Checkpoints log only the slots an operation writes, so their cost does not
/// grow with the number of holders.
#[derive(Debug, Clone, Default)]
pub struct Balances {
    slots: Journal<Slot, U256>,
}

impl Balances {
    pub fn balance_of(&self, account: Address) -> U256 {
        self.slots.get(Slot::Account(account))
    }

    pub fn total_supply(&self) -> U256 {
        self.slots.get(Slot::TotalSupply)
    }

    /// Create `amount` for `to`. `false` if the supply would overflow.
    pub fn credit(&mut self, to: Address, amount: U256) -> bool {
        let Some(total_supply) = self.total_supply().checked_add(amount) else {
            return false;
        };
        self.slots.set(Slot::TotalSupply, total_supply);
        // balance <= total_supply, cannot overflow
        let balance = self.balance_of(to);
        self.slots.set(Slot::Account(to), balance + amount);
        true
    }

    /// Destroy `amount` held by `from`. `false` if the balance is short.
    pub fn debit(&mut self, from: Address, amount: U256) -> bool {
        let balance = self.balance_of(from);
        if balance < amount {
            return false;
        }
        self.slots.set(Slot::Account(from), balance - amount);
        let total_supply = self.total_supply();
        self.slots.set(Slot::TotalSupply, total_supply - amount);
        true
    }

    pub fn move_funds(&mut self, from: Address, to: Address, amount: U256) -> bool {
        if to.is_zero() {
            return false;
        }
        let balance = self.balance_of(from);
        if balance < amount {
            return false;
        }
        self.slots.set(Slot::Account(from), balance - amount);
        let received = self.balance_of(to);
        self.slots.set(Slot::Account(to), received + amount);
        true
    }

    pub fn checkpoint(&mut self) {
        self.slots.checkpoint();
    }

    pub fn commit(&mut self) {
        self.slots.commit();
    }

    pub fn revert(&mut self) {
        self.slots.revert();
    }

    /// Slots written since the innermost checkpoint
    pub fn pending_writes(&self) -> usize {
        self.slots.pending_writes()
    }
}

/// In-process collateral token
///
/// Failure switches let callers simulate a token that refuses transfers.
pub struct InMemoryToken {
    symbol: String,
    decimals: u8,
    balances: Mutex<Balances>,
    fail_transfer_from: AtomicBool,
    fail_transfer: AtomicBool,
}

impl InMemoryToken {
    pub fn new(symbol: &str, decimals: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            decimals,
            balances: Mutex::new(Balances::default()),
            fail_transfer_from: AtomicBool::new(false),
            fail_transfer: AtomicBool::new(false),
        }
    }

    /// Faucet
    pub fn mint(&self, to: Address, amount: U256) -> bool {
        self.balances.lock().credit(to, amount)
    }

    pub fn total_supply(&self) -> U256 {
        self.balances.lock().total_supply()
    }

    /// Make every `transfer_from` report failure.
    pub fn set_fail_transfer_from(&self, fail: bool) {
        self.fail_transfer_from.store(fail, Ordering::SeqCst);
    }

    /// Make every `transfer` report failure.
    pub fn set_fail_transfer(&self, fail: bool) {
        self.fail_transfer.store(fail, Ordering::SeqCst);
    }
}

impl Journaled for InMemoryToken {
    fn checkpoint(&self) {
        self.balances.lock().checkpoint();
    }

    fn commit(&self) {
        self.balances.lock().commit();
    }

    fn revert(&self) {
        self.balances.lock().revert();
    }
}

impl AssetTransfer for InMemoryToken {
    fn transfer_from(&self, from: Address, to: Address, amount: U256) -> bool {
        if self.fail_transfer_from.load(Ordering::SeqCst) {
            return false;
        }
        self.balances.lock().move_funds(from, to, amount)
    }

    fn transfer(&self, sender: Address, to: Address, amount: U256) -> bool {
        if self.fail_transfer.load(Ordering::SeqCst) {
            return false;
        }
        self.balances.lock().move_funds(sender, to, amount)
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }

    fn balance_of(&self, account: Address) -> U256 {
        self.balances.lock().balance_of(account)
    }

    fn symbol(&self) -> String {
        self.symbol.clone()
    }
}
