//! Position manager
//!
//! The engine proper. Owns the position ledger, values collateral through the
//! registered price feeds and is the only account allowed to mint or burn the
//! debt token.
//!
//! Every mutating operation runs through [`PositionManager::atomically`]:
//! - the re-entrancy guard is taken
//! - every token the operation might touch is checkpointed
//! - ledger writes are staged in a [`PendingLedger`]
//!
//! On success the staged writes and token checkpoints are committed and the
//! collected events returned; on any error both are discarded.

use std::sync::Arc;

use ethers::types::{Address, U256};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::RiskParams;
use crate::constants::DEBT_TOKEN_DECIMALS;
use crate::debt_token::DebtToken;
use crate::error::{validation, EngineError, EngineResult};
use crate::events::{EngineEvent, Receipt};
use crate::guard::ReentrancyGuard;
use crate::health::{self, AccountStatus};
use crate::journal::Journaled;
use crate::ledger::{LedgerView, PendingLedger, PositionLedger};
use crate::oracle::PriceFeed;
use crate::registry::{AssetRegistry, Deployed};
use crate::token::AssetTransfer;
use crate::valuation::{mul, UsdValue, ValuationEngine};

/// Debt and collateral value of one account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInformation {
    pub total_dsc_minted: U256,
    pub collateral_value_usd: U256,
}

pub struct PositionManager {
    address: Address,
    valuation: ValuationEngine,
    debt_token: Deployed<DebtToken>,
    params: RiskParams,
    ledger: Mutex<PositionLedger>,
    guard: ReentrancyGuard,
}

#[derive(Clone, Copy)]
enum JournalStep {
    Checkpoint,
    Commit,
    Revert,
}

impl JournalStep {
    fn apply<J: Journaled + ?Sized>(self, state: &J) {
        match self {
            JournalStep::Checkpoint => state.checkpoint(),
            JournalStep::Commit => state.commit(),
            JournalStep::Revert => state.revert(),
        }
    }
}

impl PositionManager {
    /// Deploy an engine at `address` accepting `tokens` as collateral, each
    /// priced by the feed at the same index of `feeds`.
    pub fn new(
        address: Address,
        tokens: Vec<Deployed<dyn AssetTransfer>>,
        feeds: Vec<Deployed<dyn PriceFeed>>,
        debt_token: Deployed<DebtToken>,
        params: RiskParams,
    ) -> EngineResult<Self> {
        let registry = AssetRegistry::new(tokens, feeds)?;
        validation::non_zero_address(address)?;
        validation::non_zero_address(debt_token.address)?;
        params.validate()?;

        if debt_token.contract.authority() != address {
            tracing::warn!(
                engine = ?address,
                authority = ?debt_token.contract.authority(),
                "debt token authority is not this engine, minting will fail"
            );
        }

        tracing::info!(
            engine = ?address,
            debt_token = ?debt_token.address,
            assets = registry.len(),
            threshold = params.liquidation_threshold,
            bonus = params.liquidation_bonus,
            "position manager deployed"
        );

        Ok(Self {
            address,
            valuation: ValuationEngine::new(registry, params.usd_decimals),
            debt_token,
            params,
            ledger: Mutex::new(PositionLedger::new()),
            guard: ReentrancyGuard::new(),
        })
    }

    // ============ Operations ============

    /// Move `amount` of `token` from `user` into engine custody.
    pub fn deposit_collateral(
        &self,
        user: Address,
        token: Address,
        amount: U256,
    ) -> EngineResult<Receipt> {
        self.atomically("deposit_collateral", |session| {
            session.deposit(user, token, amount)
        })
    }

    /// Issue `amount` debt tokens to `user` against their collateral.
    pub fn mint_dsc(&self, user: Address, amount: U256) -> EngineResult<Receipt> {
        self.atomically("mint_dsc", |session| session.mint(user, amount))
    }

    /// Repay `amount` of `user`'s debt with their own debt tokens.
    pub fn burn_dsc(&self, user: Address, amount: U256) -> EngineResult<Receipt> {
        self.atomically("burn_dsc", |session| {
            let before = session.health_factor(user).ok();
            session.burn(user, user, amount)?;
            let after = session.health_factor(user).ok();
            if let (Some(before), Some(after)) = (before, after) {
                tracing::debug!(user = ?user, %before, %after, "health factor after burn");
                debug_assert!(after >= before, "burning debt lowered the health factor");
            }
            Ok(())
        })
    }

    /// Return `amount` of `token` from custody to `user`.
    pub fn redeem_collateral(
        &self,
        user: Address,
        token: Address,
        amount: U256,
    ) -> EngineResult<Receipt> {
        self.atomically("redeem_collateral", |session| {
            session.redeem(user, user, token, amount)?;
            session.revert_if_health_factor_is_broken(user)
        })
    }

    pub fn deposit_collateral_and_mint_dsc(
        &self,
        user: Address,
        token: Address,
        collateral_amount: U256,
        dsc_amount: U256,
    ) -> EngineResult<Receipt> {
        self.atomically("deposit_collateral_and_mint_dsc", |session| {
            session.deposit(user, token, collateral_amount)?;
            session.mint(user, dsc_amount)
        })
    }

    /// Burn then redeem in one step.
    pub fn redeem_collateral_for_dsc(
        &self,
        user: Address,
        token: Address,
        collateral_amount: U256,
        dsc_amount: U256,
    ) -> EngineResult<Receipt> {
        self.atomically("redeem_collateral_for_dsc", |session| {
            session.burn(user, user, dsc_amount)?;
            session.redeem(user, user, token, collateral_amount)?;
            session.revert_if_health_factor_is_broken(user)
        })
    }

    /// Repay `debt_to_cover` of an unhealthy `user`'s debt with the
    /// liquidator's debt tokens and take the equivalent collateral plus the
    /// liquidation bonus.
    pub fn liquidate(
        &self,
        liquidator: Address,
        token: Address,
        user: Address,
        debt_to_cover: U256,
    ) -> EngineResult<Receipt> {
        self.atomically("liquidate", |session| {
            validation::more_than_zero(debt_to_cover)?;
            self.valuation.registry().get(token)?;

            let starting = session.health_factor(user)?;
            if starting >= health::min_health_factor() {
                return Err(EngineError::HealthFactorIsFine);
            }

            let covered = self.valuation.token_amount_from_usd(
                token,
                debt_to_cover,
                DEBT_TOKEN_DECIMALS,
            )?;
            let bonus = mul(
                covered,
                U256::from(self.params.liquidation_bonus),
                "liquidation bonus",
            )? / U256::from(self.params.liquidation_precision);
            let seized = covered
                .checked_add(bonus)
                .ok_or(EngineError::overflow("collateral seized"))?;

            session.redeem(user, liquidator, token, seized)?;
            session.burn(user, liquidator, debt_to_cover)?;

            let ending = session.health_factor(user)?;
            if ending <= starting {
                return Err(EngineError::HealthFactorNotImproved);
            }
            session.revert_if_health_factor_is_broken(liquidator)?;

            tracing::debug!(
                user = ?user,
                %starting,
                %ending,
                %covered,
                %bonus,
                "liquidation improved health factor"
            );
            session.emit(EngineEvent::Liquidated {
                liquidator,
                user,
                token,
                debt_covered: debt_to_cover,
                collateral_seized: seized,
            });
            Ok(())
        })
    }

    /// Run `operation` as one guarded, all-or-nothing unit.
    fn atomically<F>(&self, operation: &'static str, body: F) -> EngineResult<Receipt>
    where
        F: FnOnce(&mut Session<'_>) -> EngineResult<()>,
    {
        let _entered = self.guard.enter().map_err(|err| {
            tracing::warn!(operation, "re-entrant call rejected");
            err
        })?;

        self.journal(JournalStep::Checkpoint);
        let mut session = Session {
            manager: self,
            pending: PendingLedger::new(&self.ledger),
            events: Vec::new(),
        };

        match body(&mut session) {
            Ok(()) => {
                let Session {
                    pending, events, ..
                } = session;
                pending.commit();
                self.journal(JournalStep::Commit);
                tracing::info!(operation, events = events.len(), "operation committed");
                Ok(Receipt { events })
            }
            Err(err) => {
                drop(session);
                self.journal(JournalStep::Revert);
                tracing::warn!(operation, error = %err, "operation aborted");
                Err(err)
            }
        }
    }

    fn journal(&self, step: JournalStep) {
        for (_, asset) in self.valuation.registry().iter() {
            step.apply(asset.token.as_ref());
        }
        step.apply(self.debt_token.contract.as_ref());
    }

    // ============ Queries ============

    pub fn get_health_factor(&self, user: Address) -> EngineResult<U256> {
        self.health_factor_in(&self.ledger, user)
    }

    pub fn get_account_information(&self, user: Address) -> EngineResult<AccountInformation> {
        Ok(AccountInformation {
            total_dsc_minted: self.ledger.debt_of(user),
            collateral_value_usd: self.get_account_collateral_value(user)?,
        })
    }

    pub fn get_account_collateral_value(&self, user: Address) -> EngineResult<U256> {
        self.valuation.account_collateral_value(&self.ledger, user)
    }

    pub fn get_collateral_balance_of_user(&self, user: Address, token: Address) -> U256 {
        self.ledger.collateral_of(user, token)
    }

    pub fn get_dsc_minted(&self, user: Address) -> U256 {
        self.ledger.debt_of(user)
    }

    pub fn get_usd_value(&self, token: Address, amount: U256) -> EngineResult<UsdValue> {
        self.valuation.usd_value(token, amount)
    }

    pub fn get_token_amount_from_usd(
        &self,
        token: Address,
        usd_amount: U256,
        usd_decimals: u8,
    ) -> EngineResult<U256> {
        self.valuation
            .token_amount_from_usd(token, usd_amount, usd_decimals)
    }

    pub fn calculate_health_factor(
        &self,
        total_dsc_minted: U256,
        collateral_value_usd: U256,
    ) -> EngineResult<U256> {
        health::calculate_health_factor(total_dsc_minted, collateral_value_usd, &self.params)
    }

    /// (numerator, denominator)
    pub fn get_liquidation_threshold(&self) -> (u64, u64) {
        self.params.threshold_ratio()
    }

    pub fn get_liquidation_bonus(&self) -> u64 {
        self.params.liquidation_bonus
    }

    pub fn get_liquidation_precision(&self) -> u64 {
        self.params.liquidation_precision
    }

    pub fn get_min_health_factor(&self) -> U256 {
        health::min_health_factor()
    }

    pub fn get_collateral_tokens(&self) -> Vec<Address> {
        self.valuation.registry().tokens().to_vec()
    }

    pub fn get_collateral_token_price_feed(&self, token: Address) -> Option<Address> {
        self.valuation.registry().price_feed_of(token)
    }

    pub fn account_status(&self, user: Address) -> EngineResult<AccountStatus> {
        self.get_health_factor(user)
            .map(AccountStatus::from_health_factor)
    }

    /// Users with outstanding debt, sorted
    pub fn accounts_with_debt(&self) -> Vec<Address> {
        self.ledger.lock().accounts_with_debt()
    }

    pub fn registry(&self) -> &AssetRegistry {
        self.valuation.registry()
    }

    pub fn params(&self) -> &RiskParams {
        &self.params
    }

    pub fn debt_token(&self) -> &Arc<DebtToken> {
        &self.debt_token.contract
    }

    pub fn debt_token_address(&self) -> Address {
        self.debt_token.address
    }

    pub fn address(&self) -> Address {
        self.address
    }

    fn health_factor_in<L: LedgerView + ?Sized>(
        &self,
        ledger: &L,
        user: Address,
    ) -> EngineResult<U256> {
        // debt-free accounts are solvent whatever their collateral is worth
        let debt = ledger.debt_of(user);
        if debt.is_zero() {
            return Ok(U256::MAX);
        }
        let collateral_value = self.valuation.account_collateral_value(ledger, user)?;
        health::calculate_health_factor(debt, collateral_value, &self.params)
    }
}

/// State of one in-flight operation
struct Session<'a> {
    manager: &'a PositionManager,
    pending: PendingLedger<'a>,
    events: Vec<EngineEvent>,
}

impl Session<'_> {
    fn emit(&mut self, event: EngineEvent) {
        self.events.push(event);
    }

    fn health_factor(&self, user: Address) -> EngineResult<U256> {
        self.manager.health_factor_in(&self.pending, user)
    }

    fn revert_if_health_factor_is_broken(&self, user: Address) -> EngineResult<()> {
        let health_factor = self.health_factor(user)?;
        if health_factor < health::min_health_factor() {
            return Err(EngineError::HealthFactorBelowMinimum(health_factor));
        }
        Ok(())
    }

    fn deposit(&mut self, user: Address, token: Address, amount: U256) -> EngineResult<()> {
        validation::more_than_zero(amount)?;
        let manager = self.manager;
        let asset = manager.valuation.registry().get(token)?;

        let balance = self
            .pending
            .collateral_of(user, token)
            .checked_add(amount)
            .ok_or(EngineError::overflow("collateral deposit"))?;
        self.pending.set_collateral(user, token, balance);
        self.emit(EngineEvent::CollateralDeposited {
            user,
            token,
            amount,
        });

        if !asset.token.transfer_from(user, manager.address, amount) {
            return Err(EngineError::TransferFailed { token });
        }
        tracing::info!(user = ?user, token = ?token, %amount, "collateral deposited");
        Ok(())
    }

    fn redeem(
        &mut self,
        from: Address,
        to: Address,
        token: Address,
        amount: U256,
    ) -> EngineResult<()> {
        validation::more_than_zero(amount)?;
        let manager = self.manager;
        let asset = manager.valuation.registry().get(token)?;

        let remaining =
            validation::debit_collateral(self.pending.collateral_of(from, token), amount)?;
        self.pending.set_collateral(from, token, remaining);
        self.emit(EngineEvent::CollateralRedeemed {
            from,
            to,
            token,
            amount,
        });

        if !asset.token.transfer(manager.address, to, amount) {
            return Err(EngineError::TransferFailed { token });
        }
        tracing::info!(from = ?from, to = ?to, token = ?token, %amount, "collateral redeemed");
        Ok(())
    }

    fn mint(&mut self, user: Address, amount: U256) -> EngineResult<()> {
        validation::more_than_zero(amount)?;

        let debt = self
            .pending
            .debt_of(user)
            .checked_add(amount)
            .ok_or(EngineError::overflow("debt"))?;
        self.pending.set_debt(user, debt);
        self.revert_if_health_factor_is_broken(user)?;

        let manager = self.manager;
        let minted = manager
            .debt_token
            .contract
            .mint(manager.address, user, amount);
        match minted {
            Ok(true) => {}
            Ok(false) => return Err(EngineError::MintFailed),
            Err(err) => {
                tracing::debug!(error = %err, "debt token refused mint");
                return Err(EngineError::MintFailed);
            }
        }
        self.emit(EngineEvent::DscMinted { user, amount });
        tracing::info!(user = ?user, %amount, "dsc minted");
        Ok(())
    }

    /// Pull `amount` debt tokens from `payer`, destroy them and reduce
    /// `on_behalf_of`'s debt.
    fn burn(&mut self, on_behalf_of: Address, payer: Address, amount: U256) -> EngineResult<()> {
        validation::more_than_zero(amount)?;

        let remaining = validation::debit_debt(self.pending.debt_of(on_behalf_of), amount)?;
        self.pending.set_debt(on_behalf_of, remaining);

        let manager = self.manager;
        let engine = manager.address;
        let dsc = &manager.debt_token;
        if !dsc.contract.transfer_from(payer, engine, amount) {
            return Err(EngineError::TransferFailed { token: dsc.address });
        }
        dsc.contract.burn(engine, amount)?;

        self.emit(EngineEvent::DscBurned {
            on_behalf_of,
            payer,
            amount,
        });
        tracing::info!(on_behalf_of = ?on_behalf_of, payer = ?payer, %amount, "dsc burned");
        Ok(())
    }
}
