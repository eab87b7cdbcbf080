//! Engine Integration Tests
//!
//! End-to-end scenarios through `PositionManager`: valuation, minting,
//! liquidation, rollback and re-entrancy.

#[cfg(test)]
mod integration_tests {
    use std::sync::Arc;

    use crate::{
        Address, AssetTransfer, DebtToken, Deployed, EngineError, EngineEvent, InMemoryToken,
        MockPriceFeed, PositionManager, PriceFeed, RiskParams, U256,
    };

    pub(super) const ENGINE: u64 = 0xe;
    pub(super) const DSC: u64 = 0xd;
    pub(super) const WETH: u64 = 0x1;
    pub(super) const WBTC: u64 = 0x2;
    pub(super) const WETH_FEED: u64 = 0x11;
    pub(super) const WBTC_FEED: u64 = 0x12;
    pub(super) const USER: u64 = 0xa11ce;
    pub(super) const LIQUIDATOR: u64 = 0xb0b;

    pub(super) fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    pub(super) fn ether(n: u64) -> U256 {
        U256::from(n) * U256::exp10(18)
    }

    pub(super) fn cents(dollars: u64) -> U256 {
        U256::from(dollars) * U256::from(100u64)
    }

    pub(super) fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    pub(super) struct Fixture {
        pub manager: Arc<PositionManager>,
        pub weth: Arc<InMemoryToken>,
        pub wbtc: Arc<InMemoryToken>,
        pub weth_feed: Arc<MockPriceFeed>,
        pub dsc: Arc<DebtToken>,
    }

    /// WETH: 18 decimals, 8-decimal feed at $2000.
    /// WBTC: 8 decimals, 18-decimal feed at $60000.
    pub(super) fn setup_with_authority(authority: Address) -> Fixture {
        init_tracing();
        let weth = Arc::new(InMemoryToken::new("WETH", 18));
        let wbtc = Arc::new(InMemoryToken::new("WBTC", 8));
        let weth_feed = Arc::new(MockPriceFeed::new("ETH / USD", 8, 2000_00000000));
        let wbtc_feed = Arc::new(MockPriceFeed::new(
            "BTC / USD",
            18,
            60_000 * 1_000_000_000_000_000_000i128,
        ));
        let dsc = Arc::new(DebtToken::new(authority));

        let weth_handle: Arc<dyn AssetTransfer> = weth.clone();
        let wbtc_handle: Arc<dyn AssetTransfer> = wbtc.clone();
        let weth_feed_handle: Arc<dyn PriceFeed> = weth_feed.clone();
        let wbtc_feed_handle: Arc<dyn PriceFeed> = wbtc_feed;

        let manager = PositionManager::new(
            addr(ENGINE),
            vec![
                Deployed::new(addr(WETH), weth_handle),
                Deployed::new(addr(WBTC), wbtc_handle),
            ],
            vec![
                Deployed::new(addr(WETH_FEED), weth_feed_handle),
                Deployed::new(addr(WBTC_FEED), wbtc_feed_handle),
            ],
            Deployed::new(addr(DSC), dsc.clone()),
            RiskParams::default(),
        )
        .unwrap();

        Fixture {
            manager: Arc::new(manager),
            weth,
            wbtc,
            weth_feed,
            dsc,
        }
    }

    pub(super) fn setup() -> Fixture {
        setup_with_authority(addr(ENGINE))
    }

    /// `user` holds and deposits `collateral` WETH, then mints `debt` DSC.
    pub(super) fn open_position(fx: &Fixture, user: u64, collateral: U256, debt: U256) {
        fx.weth.mint(addr(user), collateral);
        fx.manager
            .deposit_collateral_and_mint_dsc(addr(user), addr(WETH), collateral, debt)
            .unwrap();
    }

    // =============================================================
    // Valuation
    // =============================================================

    mod valuation_tests {
        use super::*;

        #[test]
        fn test_usd_value_of_fifteen_ether() {
            let fx = setup();
            let value = fx.manager.get_usd_value(addr(WETH), ether(15)).unwrap();
            assert_eq!(value.amount, cents(30_000));
            assert_eq!(value.decimals, 2);
        }

        #[test]
        fn test_assets_with_different_oracle_decimals_aggregate() {
            let fx = setup();
            fx.weth.mint(addr(USER), ether(1));
            fx.wbtc.mint(addr(USER), U256::from(50_000_000u64));

            fx.manager
                .deposit_collateral(addr(USER), addr(WETH), ether(1))
                .unwrap();
            fx.manager
                .deposit_collateral(addr(USER), addr(WBTC), U256::from(50_000_000u64))
                .unwrap();

            let btc_value = fx
                .manager
                .get_usd_value(addr(WBTC), U256::from(50_000_000u64))
                .unwrap();
            assert_eq!(btc_value.amount, cents(30_000));
            assert_eq!(
                fx.manager.get_account_collateral_value(addr(USER)).unwrap(),
                cents(32_000)
            );
        }

        #[test]
        fn test_token_amount_from_usd_uses_debt_decimals() {
            let fx = setup();
            let amount = fx
                .manager
                .get_token_amount_from_usd(addr(WETH), ether(100), 18)
                .unwrap();
            assert_eq!(amount, U256::from(50_000_000_000_000_000u64));
        }

        #[test]
        fn test_unregistered_asset() {
            let fx = setup();
            assert_eq!(
                fx.manager.get_usd_value(addr(0x99), ether(1)).err(),
                Some(EngineError::TokenNotAllowed(addr(0x99)))
            );
        }
    }

    // =============================================================
    // Minting and solvency
    // =============================================================

    mod minting_tests {
        use super::*;

        #[test]
        fn test_mint_full_collateral_value_reverts_with_zero() {
            let fx = setup();
            fx.weth.mint(addr(USER), ether(1));
            fx.manager
                .deposit_collateral(addr(USER), addr(WETH), ether(1))
                .unwrap();

            let result = fx.manager.mint_dsc(addr(USER), ether(2000));
            assert_eq!(
                result.err(),
                Some(EngineError::HealthFactorBelowMinimum(U256::zero()))
            );
            assert_eq!(fx.manager.get_dsc_minted(addr(USER)), U256::zero());
            assert_eq!(fx.dsc.balance_of(addr(USER)), U256::zero());
        }

        #[test]
        fn test_mint_exactly_half_sits_at_minimum() {
            let fx = setup();
            fx.weth.mint(addr(USER), ether(1));
            fx.manager
                .deposit_collateral(addr(USER), addr(WETH), ether(1))
                .unwrap();

            let receipt = fx.manager.mint_dsc(addr(USER), ether(1000)).unwrap();
            assert_eq!(
                receipt.events,
                vec![EngineEvent::DscMinted {
                    user: addr(USER),
                    amount: ether(1000),
                }]
            );
            assert_eq!(
                fx.manager.get_health_factor(addr(USER)).unwrap(),
                fx.manager.get_min_health_factor()
            );
            assert_eq!(fx.dsc.balance_of(addr(USER)), ether(1000));
        }

        #[test]
        fn test_one_wei_over_half_is_rejected() {
            let fx = setup();
            fx.weth.mint(addr(USER), ether(1));
            let result = fx.manager.deposit_collateral_and_mint_dsc(
                addr(USER),
                addr(WETH),
                ether(1),
                ether(1000) + U256::one(),
            );
            assert!(matches!(
                result,
                Err(EngineError::HealthFactorBelowMinimum(_))
            ));
        }

        #[test]
        fn test_mint_without_authority_fails() {
            let fx = setup_with_authority(addr(0xbad));
            fx.weth.mint(addr(USER), ether(1));
            fx.manager
                .deposit_collateral(addr(USER), addr(WETH), ether(1))
                .unwrap();

            assert_eq!(
                fx.manager.mint_dsc(addr(USER), ether(10)).err(),
                Some(EngineError::MintFailed)
            );
            assert_eq!(fx.manager.get_dsc_minted(addr(USER)), U256::zero());
            assert_eq!(fx.dsc.total_supply(), U256::zero());
        }

        #[test]
        fn test_no_debt_health_factor_is_max() {
            let fx = setup();
            assert_eq!(fx.manager.get_health_factor(addr(USER)).unwrap(), U256::MAX);
        }
    }

    // =============================================================
    // Burning and redeeming
    // =============================================================

    mod repayment_tests {
        use super::*;

        #[test]
        fn test_burn_reduces_debt_and_supply() {
            let fx = setup();
            open_position(&fx, USER, ether(1), ether(1000));

            let receipt = fx.manager.burn_dsc(addr(USER), ether(400)).unwrap();
            assert_eq!(
                receipt.events,
                vec![EngineEvent::DscBurned {
                    on_behalf_of: addr(USER),
                    payer: addr(USER),
                    amount: ether(400),
                }]
            );
            assert_eq!(fx.manager.get_dsc_minted(addr(USER)), ether(600));
            assert_eq!(fx.dsc.balance_of(addr(USER)), ether(600));
            assert_eq!(fx.dsc.balance_of(addr(ENGINE)), U256::zero());
            assert_eq!(fx.dsc.total_supply(), ether(600));
        }

        #[test]
        fn test_burn_more_than_debt() {
            let fx = setup();
            open_position(&fx, USER, ether(1), ether(100));
            assert!(matches!(
                fx.manager.burn_dsc(addr(USER), ether(101)),
                Err(EngineError::BurnAmountExceedsDebt { .. })
            ));
        }

        #[test]
        fn test_burn_without_tokens_fails_transfer() {
            let fx = setup();
            open_position(&fx, USER, ether(1), ether(100));
            // give the tokens away, debt stays
            assert!(fx.dsc.transfer(addr(USER), addr(0x77), ether(100)));

            assert_eq!(
                fx.manager.burn_dsc(addr(USER), ether(100)).err(),
                Some(EngineError::TransferFailed { token: addr(DSC) })
            );
            assert_eq!(fx.manager.get_dsc_minted(addr(USER)), ether(100));
        }

        #[test]
        fn test_redeem_returns_collateral() {
            let fx = setup();
            fx.weth.mint(addr(USER), ether(3));
            fx.manager
                .deposit_collateral(addr(USER), addr(WETH), ether(3))
                .unwrap();

            let receipt = fx
                .manager
                .redeem_collateral(addr(USER), addr(WETH), ether(2))
                .unwrap();
            assert_eq!(
                receipt.events,
                vec![EngineEvent::CollateralRedeemed {
                    from: addr(USER),
                    to: addr(USER),
                    token: addr(WETH),
                    amount: ether(2),
                }]
            );
            assert_eq!(
                fx.manager.get_collateral_balance_of_user(addr(USER), addr(WETH)),
                ether(1)
            );
            assert_eq!(fx.weth.balance_of(addr(USER)), ether(2));
            assert_eq!(fx.weth.balance_of(addr(ENGINE)), ether(1));
        }

        #[test]
        fn test_debt_free_redeem_ignores_broken_price() {
            let fx = setup();
            fx.weth.mint(addr(USER), ether(1));
            fx.manager
                .deposit_collateral(addr(USER), addr(WETH), ether(1))
                .unwrap();
            fx.weth_feed.update_answer(-1, 1);

            assert_eq!(fx.manager.get_health_factor(addr(USER)), Ok(U256::MAX));
            fx.manager
                .redeem_collateral(addr(USER), addr(WETH), ether(1) / 2)
                .unwrap();
            assert_eq!(
                fx.manager.get_collateral_balance_of_user(addr(USER), addr(WETH)),
                ether(1) / 2
            );
            assert_eq!(fx.manager.get_health_factor(addr(USER)), Ok(U256::MAX));
        }

        #[test]
        fn test_redeem_more_than_deposited() {
            let fx = setup();
            fx.weth.mint(addr(USER), ether(1));
            fx.manager
                .deposit_collateral(addr(USER), addr(WETH), ether(1))
                .unwrap();
            assert_eq!(
                fx.manager
                    .redeem_collateral(addr(USER), addr(WETH), ether(2))
                    .err(),
                Some(EngineError::InsufficientCollateral {
                    requested: ether(2),
                    available: ether(1),
                })
            );
        }

        #[test]
        fn test_redeem_that_breaks_health_factor_rolls_back_transfer() {
            let fx = setup();
            open_position(&fx, USER, ether(1), ether(1000));

            let result = fx
                .manager
                .redeem_collateral(addr(USER), addr(WETH), U256::one());
            assert!(matches!(
                result,
                Err(EngineError::HealthFactorBelowMinimum(_))
            ));
            assert_eq!(fx.weth.balance_of(addr(USER)), U256::zero());
            assert_eq!(fx.weth.balance_of(addr(ENGINE)), ether(1));
            assert_eq!(
                fx.manager.get_collateral_balance_of_user(addr(USER), addr(WETH)),
                ether(1)
            );
        }

        #[test]
        fn test_redeem_for_dsc_closes_position() {
            let fx = setup();
            open_position(&fx, USER, ether(1), ether(1000));

            let receipt = fx
                .manager
                .redeem_collateral_for_dsc(addr(USER), addr(WETH), ether(1), ether(1000))
                .unwrap();
            assert_eq!(receipt.events.len(), 2);
            assert_eq!(fx.manager.get_dsc_minted(addr(USER)), U256::zero());
            assert_eq!(fx.weth.balance_of(addr(USER)), ether(1));
            assert_eq!(fx.dsc.total_supply(), U256::zero());
            assert!(fx.manager.accounts_with_debt().is_empty());
        }

        #[test]
        fn test_outbound_transfer_failure_leaves_ledger_unchanged() {
            let fx = setup();
            fx.weth.mint(addr(USER), ether(1));
            fx.manager
                .deposit_collateral(addr(USER), addr(WETH), ether(1))
                .unwrap();

            fx.weth.set_fail_transfer(true);
            assert_eq!(
                fx.manager
                    .redeem_collateral(addr(USER), addr(WETH), ether(1))
                    .err(),
                Some(EngineError::TransferFailed { token: addr(WETH) })
            );
            assert_eq!(
                fx.manager.get_collateral_balance_of_user(addr(USER), addr(WETH)),
                ether(1)
            );
            assert_eq!(fx.weth.balance_of(addr(ENGINE)), ether(1));
        }

        #[test]
        fn test_inbound_transfer_failure() {
            let fx = setup();
            fx.weth.mint(addr(USER), ether(1));
            fx.weth.set_fail_transfer_from(true);
            assert_eq!(
                fx.manager
                    .deposit_collateral(addr(USER), addr(WETH), ether(1))
                    .err(),
                Some(EngineError::TransferFailed { token: addr(WETH) })
            );
            assert_eq!(
                fx.manager.get_collateral_balance_of_user(addr(USER), addr(WETH)),
                U256::zero()
            );
        }
    }

    // =============================================================
    // Input validation
    // =============================================================

    mod validation_tests {
        use super::*;

        #[test]
        fn test_zero_amounts_rejected_without_side_effects() {
            let fx = setup();
            open_position(&fx, USER, ether(2), ether(100));
            let supply = fx.dsc.total_supply();

            let zero = U256::zero();
            let results = [
                fx.manager.deposit_collateral(addr(USER), addr(WETH), zero),
                fx.manager.mint_dsc(addr(USER), zero),
                fx.manager.burn_dsc(addr(USER), zero),
                fx.manager.redeem_collateral(addr(USER), addr(WETH), zero),
                fx.manager.liquidate(addr(LIQUIDATOR), addr(WETH), addr(USER), zero),
            ];
            for result in results {
                assert_eq!(result.err(), Some(EngineError::AmountMustBeMoreThanZero));
            }

            assert_eq!(
                fx.manager.get_collateral_balance_of_user(addr(USER), addr(WETH)),
                ether(2)
            );
            assert_eq!(fx.manager.get_dsc_minted(addr(USER)), ether(100));
            assert_eq!(fx.dsc.total_supply(), supply);
        }

        #[test]
        fn test_unregistered_collateral_rejected() {
            let fx = setup();
            assert_eq!(
                fx.manager
                    .deposit_collateral(addr(USER), addr(0x99), ether(1))
                    .err(),
                Some(EngineError::TokenNotAllowed(addr(0x99)))
            );
        }

        #[test]
        fn test_construction_errors() {
            let token: Arc<dyn AssetTransfer> = Arc::new(InMemoryToken::new("WETH", 18));
            let feed: Arc<dyn PriceFeed> = Arc::new(MockPriceFeed::new("ETH / USD", 8, 1));
            let dsc = Arc::new(DebtToken::new(addr(ENGINE)));

            let mismatch = PositionManager::new(
                addr(ENGINE),
                vec![Deployed::new(addr(WETH), token.clone())],
                vec![],
                Deployed::new(addr(DSC), dsc.clone()),
                RiskParams::default(),
            );
            assert_eq!(
                mismatch.err(),
                Some(EngineError::ConfigLengthMismatch { tokens: 1, feeds: 0 })
            );

            let zero_engine = PositionManager::new(
                Address::zero(),
                vec![Deployed::new(addr(WETH), token.clone())],
                vec![Deployed::new(addr(WETH_FEED), feed.clone())],
                Deployed::new(addr(DSC), dsc.clone()),
                RiskParams::default(),
            );
            assert_eq!(zero_engine.err(), Some(EngineError::ZeroAddressNotAllowed));

            let bad_params = PositionManager::new(
                addr(ENGINE),
                vec![Deployed::new(addr(WETH), token)],
                vec![Deployed::new(addr(WETH_FEED), feed)],
                Deployed::new(addr(DSC), dsc),
                RiskParams {
                    liquidation_precision: 0,
                    ..RiskParams::default()
                },
            );
            assert!(matches!(
                bad_params.err(),
                Some(EngineError::InvalidConfiguration { .. })
            ));
        }

        #[test]
        fn test_protocol_getters() {
            let fx = setup();
            assert_eq!(fx.manager.get_liquidation_threshold(), (50, 100));
            assert_eq!(fx.manager.get_liquidation_bonus(), 10);
            assert_eq!(fx.manager.get_min_health_factor(), U256::one());
            assert_eq!(fx.manager.get_collateral_tokens(), vec![addr(WETH), addr(WBTC)]);
            assert_eq!(
                fx.manager.get_collateral_token_price_feed(addr(WBTC)),
                Some(addr(WBTC_FEED))
            );
            assert_eq!(fx.manager.get_collateral_token_price_feed(addr(0x99)), None);
            assert_eq!(fx.manager.address(), addr(ENGINE));
            assert_eq!(fx.manager.debt_token_address(), addr(DSC));
        }
    }

    // =============================================================
    // Liquidation
    // =============================================================

    mod liquidation_tests {
        use super::*;
        use crate::AccountStatus;

        /// User at exactly 200% and a well-funded liquidator, then ETH drops 10%.
        fn underwater() -> Fixture {
            let fx = setup();
            open_position(&fx, USER, ether(10), ether(10_000));
            open_position(&fx, LIQUIDATOR, ether(40), ether(10_000));
            fx.weth_feed.update_answer(1800_00000000, 1);
            fx
        }

        #[test]
        fn test_full_liquidation_pays_bonus() {
            let fx = underwater();
            assert_eq!(
                fx.manager.account_status(addr(USER)).unwrap(),
                AccountStatus::AtRisk
            );
            let starting = fx.manager.get_health_factor(addr(USER)).unwrap();

            let covered = fx
                .manager
                .get_token_amount_from_usd(addr(WETH), ether(10_000), 18)
                .unwrap();
            let seized = covered + covered * U256::from(10u64) / U256::from(100u64);

            let receipt = fx
                .manager
                .liquidate(addr(LIQUIDATOR), addr(WETH), addr(USER), ether(10_000))
                .unwrap();

            assert_eq!(fx.weth.balance_of(addr(LIQUIDATOR)), seized);
            assert_eq!(fx.manager.get_dsc_minted(addr(USER)), U256::zero());
            assert!(fx.manager.get_health_factor(addr(USER)).unwrap() > starting);
            assert_eq!(
                fx.manager.get_collateral_balance_of_user(addr(USER), addr(WETH)),
                ether(10) - seized
            );
            // the user keeps the minted tokens, the liquidator's are gone
            assert_eq!(fx.dsc.balance_of(addr(USER)), ether(10_000));
            assert_eq!(fx.dsc.balance_of(addr(LIQUIDATOR)), U256::zero());
            assert_eq!(fx.dsc.total_supply(), ether(10_000));
            // liquidator's own debt is untouched
            assert_eq!(fx.manager.get_dsc_minted(addr(LIQUIDATOR)), ether(10_000));

            assert_eq!(receipt.events.len(), 3);
            assert_eq!(
                receipt.events[2],
                EngineEvent::Liquidated {
                    liquidator: addr(LIQUIDATOR),
                    user: addr(USER),
                    token: addr(WETH),
                    debt_covered: ether(10_000),
                    collateral_seized: seized,
                }
            );
        }

        #[test]
        fn test_healthy_position_cannot_be_liquidated() {
            let fx = setup();
            open_position(&fx, USER, ether(10), ether(10_000));
            open_position(&fx, LIQUIDATOR, ether(40), ether(10_000));
            assert_eq!(
                fx.manager
                    .liquidate(addr(LIQUIDATOR), addr(WETH), addr(USER), ether(100))
                    .err(),
                Some(EngineError::HealthFactorIsFine)
            );
        }

        #[test]
        fn test_partial_liquidation_that_stays_underwater_is_rejected() {
            let fx = underwater();
            let liquidator_dsc = fx.dsc.balance_of(addr(LIQUIDATOR));

            assert_eq!(
                fx.manager
                    .liquidate(addr(LIQUIDATOR), addr(WETH), addr(USER), ether(1_000))
                    .err(),
                Some(EngineError::HealthFactorNotImproved)
            );
            assert_eq!(fx.dsc.balance_of(addr(LIQUIDATOR)), liquidator_dsc);
            assert_eq!(fx.weth.balance_of(addr(LIQUIDATOR)), U256::zero());
            assert_eq!(fx.manager.get_dsc_minted(addr(USER)), ether(10_000));
            assert_eq!(
                fx.manager.get_collateral_balance_of_user(addr(USER), addr(WETH)),
                ether(10)
            );
        }

        #[test]
        fn test_liquidator_must_stay_healthy() {
            let fx = setup();
            open_position(&fx, USER, ether(1), ether(1000));
            open_position(&fx, LIQUIDATOR, ether(1), ether(1000));
            fx.weth_feed.update_answer(1800_00000000, 1);

            assert_eq!(
                fx.manager
                    .liquidate(addr(LIQUIDATOR), addr(WETH), addr(USER), ether(1000))
                    .err(),
                Some(EngineError::HealthFactorBelowMinimum(U256::zero()))
            );
            assert_eq!(fx.manager.get_dsc_minted(addr(USER)), ether(1000));
            assert_eq!(fx.dsc.balance_of(addr(LIQUIDATOR)), ether(1000));
        }

        #[test]
        fn test_cover_more_than_debt() {
            let fx = underwater();
            // enough collateral to seize, but only 10000 DSC of debt
            fx.weth_feed.update_answer(1000_00000000, 2);
            fx.weth.mint(addr(LIQUIDATOR), ether(100));
            let result =
                fx.manager
                    .liquidate(addr(LIQUIDATOR), addr(WETH), addr(USER), ether(20_000));
            assert!(matches!(
                result,
                Err(EngineError::InsufficientCollateral { .. })
                    | Err(EngineError::BurnAmountExceedsDebt { .. })
            ));
        }

        #[test]
        fn test_accounts_with_debt_lists_debtors() {
            let fx = underwater();
            let mut expected = vec![addr(USER), addr(LIQUIDATOR)];
            expected.sort();
            assert_eq!(fx.manager.accounts_with_debt(), expected);
        }
    }

    // =============================================================
    // Atomicity
    // =============================================================

    mod atomicity_tests {
        use super::*;

        #[test]
        fn test_failed_mint_undoes_deposit_transfer() {
            let fx = setup();
            fx.weth.mint(addr(USER), ether(1));

            let result = fx.manager.deposit_collateral_and_mint_dsc(
                addr(USER),
                addr(WETH),
                ether(1),
                ether(5000),
            );
            assert!(result.is_err());
            assert_eq!(fx.weth.balance_of(addr(USER)), ether(1));
            assert_eq!(fx.weth.balance_of(addr(ENGINE)), U256::zero());
            assert_eq!(
                fx.manager.get_collateral_balance_of_user(addr(USER), addr(WETH)),
                U256::zero()
            );
            assert_eq!(fx.dsc.total_supply(), U256::zero());
        }

        #[test]
        fn test_failed_redeem_undoes_burn() {
            let fx = setup();
            open_position(&fx, USER, ether(1), ether(1000));
            fx.weth.set_fail_transfer(true);

            let result = fx.manager.redeem_collateral_for_dsc(
                addr(USER),
                addr(WETH),
                ether(1),
                ether(1000),
            );
            assert_eq!(
                result.err(),
                Some(EngineError::TransferFailed { token: addr(WETH) })
            );
            assert_eq!(fx.dsc.balance_of(addr(USER)), ether(1000));
            assert_eq!(fx.dsc.total_supply(), ether(1000));
            assert_eq!(fx.manager.get_dsc_minted(addr(USER)), ether(1000));
            assert_eq!(fx.weth.balance_of(addr(ENGINE)), ether(1));
        }
    }
}

// =============================================================
// Re-entrancy
// =============================================================

#[cfg(test)]
mod reentrancy_tests {
    use std::sync::{Arc, OnceLock, Weak};

    use parking_lot::Mutex;

    use super::integration_tests::{addr, ether, init_tracing, DSC, ENGINE, USER, WETH, WETH_FEED};
    use crate::{
        Address, AssetTransfer, DebtToken, Deployed, EngineError, EngineResult, InMemoryToken,
        Journaled, MockPriceFeed, PositionManager, PriceFeed, Receipt, RiskParams, U256,
    };

    /// Calls back into the engine from `transfer_from`
    struct ReentrantToken {
        address: Address,
        inner: InMemoryToken,
        manager: OnceLock<Weak<PositionManager>>,
        nested: Mutex<Option<EngineResult<Receipt>>>,
    }

    impl Journaled for ReentrantToken {
        fn checkpoint(&self) {
            self.inner.checkpoint();
        }

        fn commit(&self) {
            self.inner.commit();
        }

        fn revert(&self) {
            self.inner.revert();
        }
    }

    impl AssetTransfer for ReentrantToken {
        fn transfer_from(&self, from: Address, to: Address, amount: U256) -> bool {
            if let Some(manager) = self.manager.get().and_then(Weak::upgrade) {
                let result = manager.deposit_collateral(from, self.address, U256::one());
                *self.nested.lock() = Some(result);
            }
            self.inner.transfer_from(from, to, amount)
        }

        fn transfer(&self, sender: Address, to: Address, amount: U256) -> bool {
            self.inner.transfer(sender, to, amount)
        }

        fn decimals(&self) -> u8 {
            self.inner.decimals()
        }

        fn balance_of(&self, account: Address) -> U256 {
            self.inner.balance_of(account)
        }

        fn symbol(&self) -> String {
            self.inner.symbol()
        }
    }

    #[test]
    fn test_callback_into_engine_is_rejected() {
        init_tracing();
        let token = Arc::new(ReentrantToken {
            address: addr(WETH),
            inner: InMemoryToken::new("EVIL", 18),
            manager: OnceLock::new(),
            nested: Mutex::new(None),
        });
        token.inner.mint(addr(USER), ether(5));

        let token_handle: Arc<dyn AssetTransfer> = token.clone();
        let feed: Arc<dyn PriceFeed> = Arc::new(MockPriceFeed::new("EVIL / USD", 8, 1_00000000));
        let manager = Arc::new(
            PositionManager::new(
                addr(ENGINE),
                vec![Deployed::new(addr(WETH), token_handle)],
                vec![Deployed::new(addr(WETH_FEED), feed)],
                Deployed::new(addr(DSC), Arc::new(DebtToken::new(addr(ENGINE)))),
                RiskParams::default(),
            )
            .unwrap(),
        );
        assert!(token.manager.set(Arc::downgrade(&manager)).is_ok());

        let receipt = manager
            .deposit_collateral(addr(USER), addr(WETH), ether(2))
            .unwrap();

        assert_eq!(receipt.events.len(), 1);
        assert_eq!(
            token.nested.lock().clone().map(|result| result.err()),
            Some(Some(EngineError::ReentrantCall))
        );
        assert_eq!(
            manager.get_collateral_balance_of_user(addr(USER), addr(WETH)),
            ether(2)
        );
        assert_eq!(token.balance_of(addr(ENGINE)), ether(2));

        // guard released: a plain second call succeeds
        *token.nested.lock() = None;
        manager
            .deposit_collateral(addr(USER), addr(WETH), ether(1))
            .unwrap();
        assert_eq!(
            manager.get_collateral_balance_of_user(addr(USER), addr(WETH)),
            ether(3)
        );
    }
}

// =============================================================
// Property Tests
// =============================================================

#[cfg(test)]
mod property_tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::integration_tests::{addr, setup, LIQUIDATOR, USER, WETH};
    use crate::{
        AssetRegistry, AssetTransfer, Deployed, InMemoryToken, MockPriceFeed, PriceFeed,
        ValuationEngine, U256,
    };

    fn valuation(decimals: u8, oracle_decimals: u8, answer: i128) -> ValuationEngine {
        let token: Arc<dyn AssetTransfer> = Arc::new(InMemoryToken::new("TKN", decimals));
        let feed: Arc<dyn PriceFeed> =
            Arc::new(MockPriceFeed::new("TKN / USD", oracle_decimals, answer));
        let registry = AssetRegistry::new(
            vec![Deployed::new(addr(WETH), token)],
            vec![Deployed::new(addr(0x11), feed)],
        )
        .unwrap();
        ValuationEngine::new(registry, 2)
    }

    proptest! {
        #[test]
        fn prop_usd_round_trip_within_one_reporting_unit(
            amount in 0u128..=1_000_000_000_000_000_000_000_000u128,
            answer in 1i128..=100_000_000_000_000i128,
            decimals in prop::sample::select(vec![6u8, 8, 18]),
            oracle_decimals in prop::sample::select(vec![8u8, 18]),
        ) {
            let engine = valuation(decimals, oracle_decimals, answer);
            let amount = U256::from(amount);

            let usd = engine.usd_value(addr(WETH), amount).unwrap();
            let back = engine
                .token_amount_from_usd(addr(WETH), usd.amount, usd.decimals)
                .unwrap();

            // token value of one cent, plus truncation
            let one_unit = U256::exp10(decimals as usize + oracle_decimals as usize)
                / (U256::from(answer as u128) * U256::exp10(usd.decimals as usize));
            prop_assert!(back <= amount);
            prop_assert!(amount - back <= one_unit + U256::from(2u64));
        }
    }

    #[derive(Debug, Clone)]
    enum Action {
        Deposit(u64, u64),
        Mint(u64, u64),
        Burn(u64, u64),
        Redeem(u64, u64),
        Liquidate(u64),
        SetPrice(i128),
    }

    fn action() -> impl Strategy<Value = Action> {
        let who = prop::sample::select(vec![USER, LIQUIDATOR]);
        prop_oneof![
            (who.clone(), 1u64..20).prop_map(|(w, n)| Action::Deposit(w, n)),
            (who.clone(), 1u64..30_000).prop_map(|(w, n)| Action::Mint(w, n)),
            (who.clone(), 1u64..30_000).prop_map(|(w, n)| Action::Burn(w, n)),
            (who, 1u64..20).prop_map(|(w, n)| Action::Redeem(w, n)),
            (1u64..30_000).prop_map(Action::Liquidate),
            (500i128..4000).prop_map(Action::SetPrice),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_committed_operations_keep_debtors_solvent(
            actions in prop::collection::vec(action(), 1..40)
        ) {
            let fx = setup();
            fx.weth.mint(addr(USER), U256::from(1_000u64) * U256::exp10(18));
            fx.weth.mint(addr(LIQUIDATOR), U256::from(1_000u64) * U256::exp10(18));
            let unit = U256::exp10(18);
            let mut price_moved = false;

            for action in actions {
                let committed = match action {
                    Action::Deposit(who, n) => fx
                        .manager
                        .deposit_collateral(addr(who), addr(WETH), unit * n)
                        .is_ok(),
                    Action::Mint(who, n) => fx.manager.mint_dsc(addr(who), unit * n).is_ok(),
                    Action::Burn(who, n) => fx.manager.burn_dsc(addr(who), unit * n).is_ok(),
                    Action::Redeem(who, n) => fx
                        .manager
                        .redeem_collateral(addr(who), addr(WETH), unit * n)
                        .is_ok(),
                    Action::Liquidate(n) => {
                        let before = fx.manager.get_health_factor(addr(USER)).unwrap();
                        let ok = fx
                            .manager
                            .liquidate(addr(LIQUIDATOR), addr(WETH), addr(USER), unit * n)
                            .is_ok();
                        if ok {
                            prop_assert!(fx.manager.get_health_factor(addr(USER)).unwrap() > before);
                        }
                        ok
                    }
                    Action::SetPrice(dollars) => {
                        fx.weth_feed.update_answer(dollars * 100_000_000, 0);
                        price_moved = true;
                        false
                    }
                };

                // the engine's own ledger always matches its custody
                let custody = fx.manager.get_collateral_balance_of_user(addr(USER), addr(WETH))
                    + fx.manager.get_collateral_balance_of_user(addr(LIQUIDATOR), addr(WETH));
                prop_assert_eq!(fx.weth.balance_of(addr(0xe)), custody);

                // debt never exceeds the supply backing it
                let debt = fx.manager.get_dsc_minted(addr(USER))
                    + fx.manager.get_dsc_minted(addr(LIQUIDATOR));
                prop_assert_eq!(fx.dsc.total_supply(), debt);

                if committed && !price_moved {
                    for debtor in fx.manager.accounts_with_debt() {
                        prop_assert!(
                            fx.manager.get_health_factor(debtor).unwrap()
                                >= fx.manager.get_min_health_factor()
                        );
                    }
                }
            }
        }
    }
}
