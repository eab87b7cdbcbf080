//! Debt token (DSC)
//!
//! Mint and burn are gated to one authority address fixed at construction:
//! the engine that holds a handle to this token. Ordinary transfers follow
//! [`AssetTransfer`].

use ethers::types::{Address, U256};
use parking_lot::Mutex;

use crate::constants::{DEBT_TOKEN_DECIMALS, DEBT_TOKEN_NAME, DEBT_TOKEN_SYMBOL};
use crate::error::DebtTokenError;
use crate::journal::Journaled;
use crate::token::{AssetTransfer, Balances};

pub struct DebtToken {
    authority: Address,
    balances: Mutex<Balances>,
}

impl DebtToken {
    pub fn new(authority: Address) -> Self {
        Self {
            authority,
            balances: Mutex::new(Balances::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        DEBT_TOKEN_NAME
    }

    pub fn authority(&self) -> Address {
        self.authority
    }

    pub fn total_supply(&self) -> U256 {
        self.balances.lock().total_supply()
    }

    /// Issue `amount` to `to`.
    ///
    /// `Ok(false)` means the supply would overflow and nothing was minted.
    pub fn mint(&self, caller: Address, to: Address, amount: U256) -> Result<bool, DebtTokenError> {
        self.only_authority(caller)?;
        if to.is_zero() {
            return Err(DebtTokenError::ZeroAddressNotAllowed);
        }
        if amount.is_zero() {
            return Err(DebtTokenError::AmountMustBeMoreThanZero);
        }
        Ok(self.balances.lock().credit(to, amount))
    }

    /// Destroy `amount` from the authority's own balance.
    pub fn burn(&self, caller: Address, amount: U256) -> Result<(), DebtTokenError> {
        self.only_authority(caller)?;
        if amount.is_zero() {
            return Err(DebtTokenError::AmountMustBeMoreThanZero);
        }
        let mut balances = self.balances.lock();
        let balance = balances.balance_of(caller);
        if balance < amount {
            return Err(DebtTokenError::BurnAmountExceedsBalance {
                requested: amount,
                balance,
            });
        }
        balances.debit(caller, amount);
        Ok(())
    }

    fn only_authority(&self, caller: Address) -> Result<(), DebtTokenError> {
        if caller != self.authority {
            return Err(DebtTokenError::NotAuthority { caller });
        }
        Ok(())
    }
}

impl Journaled for DebtToken {
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

impl AssetTransfer for DebtToken {
    fn transfer_from(&self, from: Address, to: Address, amount: U256) -> bool {
        self.balances.lock().move_funds(from, to, amount)
    }

    fn transfer(&self, sender: Address, to: Address, amount: U256) -> bool {
        self.balances.lock().move_funds(sender, to, amount)
    }

    fn decimals(&self) -> u8 {
        DEBT_TOKEN_DECIMALS
    }

    fn balance_of(&self, account: Address) -> U256 {
        self.balances.lock().balance_of(account)
    }

    fn symbol(&self) -> String {
        DEBT_TOKEN_SYMBOL.to_string()
    }
}
