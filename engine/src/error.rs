//! Error types for the debt-token engine
//!
//! Every error aborts the operation that raised it in full. Solvency errors
//! carry the health factor that triggered them.

use ethers::types::{Address, U256};
use thiserror::Error;

/// Broad class of an [`EngineError`], used by callers to pick a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transfer,
    Solvency,
    Issuance,
    Execution,
}

/// Errors raised by [`crate::PositionManager`] operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    // ============ Validation ============
    #[error("Amount must be more than zero")]
    AmountMustBeMoreThanZero,

    #[error("Zero address not allowed")]
    ZeroAddressNotAllowed,

    #[error("Token {0:?} is not allowed as collateral")]
    TokenNotAllowed(Address),

    #[error("Token addresses and price feed addresses must be the same length ({tokens} != {feeds})")]
    ConfigLengthMismatch { tokens: usize, feeds: usize },

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Insufficient collateral: requested {requested}, available {available}")]
    InsufficientCollateral { requested: U256, available: U256 },

    #[error("Burn amount {requested} exceeds outstanding debt {outstanding}")]
    BurnAmountExceedsDebt { requested: U256, outstanding: U256 },

    // ============ Transfer ============
    #[error("Transfer of token {token:?} failed")]
    TransferFailed { token: Address },

    // ============ Solvency ============
    #[error("Health factor {0} is below minimum")]
    HealthFactorBelowMinimum(U256),

    #[error("Health factor is fine, position is not liquidatable")]
    HealthFactorIsFine,

    #[error("Health factor not improved by liquidation")]
    HealthFactorNotImproved,

    // ============ Issuance ============
    #[error("Debt token mint failed")]
    MintFailed,

    #[error(transparent)]
    DebtToken(#[from] DebtTokenError),

    // ============ Execution ============
    #[error("Re-entrant call rejected")]
    ReentrantCall,

    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow { operation: &'static str },

    #[error("Division by zero")]
    DivisionByZero,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::AmountMustBeMoreThanZero
            | EngineError::ZeroAddressNotAllowed
            | EngineError::TokenNotAllowed(_)
            | EngineError::ConfigLengthMismatch { .. }
            | EngineError::InvalidConfiguration { .. }
            | EngineError::InsufficientCollateral { .. }
            | EngineError::BurnAmountExceedsDebt { .. } => ErrorKind::Validation,
            EngineError::TransferFailed { .. } => ErrorKind::Transfer,
            EngineError::HealthFactorBelowMinimum(_)
            | EngineError::HealthFactorIsFine
            | EngineError::HealthFactorNotImproved => ErrorKind::Solvency,
            EngineError::MintFailed | EngineError::DebtToken(_) => ErrorKind::Issuance,
            EngineError::ReentrantCall
            | EngineError::ArithmeticOverflow { .. }
            | EngineError::DivisionByZero => ErrorKind::Execution,
        }
    }

    pub(crate) fn overflow(operation: &'static str) -> Self {
        EngineError::ArithmeticOverflow { operation }
    }
}

/// Errors raised by [`crate::DebtToken`] mint/burn
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DebtTokenError {
    #[error("Caller {caller:?} is not the mint authority")]
    NotAuthority { caller: Address },

    #[error("Zero address not allowed")]
    ZeroAddressNotAllowed,

    #[error("Amount must be more than zero")]
    AmountMustBeMoreThanZero,

    #[error("Burn amount {requested} exceeds balance {balance}")]
    BurnAmountExceedsBalance { requested: U256, balance: U256 },
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Input validation shared by every operation
pub mod validation {
    use super::*;

    pub fn more_than_zero(amount: U256) -> EngineResult<()> {
        if amount.is_zero() {
            return Err(EngineError::AmountMustBeMoreThanZero);
        }
        Ok(())
    }

    pub fn non_zero_address(address: Address) -> EngineResult<()> {
        if address.is_zero() {
            return Err(EngineError::ZeroAddressNotAllowed);
        }
        Ok(())
    }

    /// `available - requested`, failing when the position would go negative
    pub fn debit_collateral(available: U256, requested: U256) -> EngineResult<U256> {
        available
            .checked_sub(requested)
            .ok_or(EngineError::InsufficientCollateral {
                requested,
                available,
            })
    }

    /// `outstanding - requested`, failing when the debt would go negative
    pub fn debit_debt(outstanding: U256, requested: U256) -> EngineResult<U256> {
        outstanding
            .checked_sub(requested)
            .ok_or(EngineError::BurnAmountExceedsDebt {
                requested,
                outstanding,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::validation::*;
    use super::*;

    #[test]
    fn test_more_than_zero() {
        assert!(more_than_zero(U256::one()).is_ok());
        assert_eq!(
            more_than_zero(U256::zero()),
            Err(EngineError::AmountMustBeMoreThanZero)
        );
    }

    #[test]
    fn test_non_zero_address() {
        assert!(non_zero_address(Address::from_low_u64_be(7)).is_ok());
        assert_eq!(
            non_zero_address(Address::zero()),
            Err(EngineError::ZeroAddressNotAllowed)
        );
    }

    #[test]
    fn test_debits() {
        assert_eq!(
            debit_collateral(U256::from(10u64), U256::from(4u64)),
            Ok(U256::from(6u64))
        );
        let err = debit_collateral(U256::from(3u64), U256::from(4u64)).unwrap_err();
        assert!(err.to_string().contains("Insufficient collateral"));

        assert_eq!(
            debit_debt(U256::from(5u64), U256::from(5u64)),
            Ok(U256::zero())
        );
        assert!(matches!(
            debit_debt(U256::from(5u64), U256::from(6u64)),
            Err(EngineError::BurnAmountExceedsDebt { .. })
        ));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(EngineError::AmountMustBeMoreThanZero.kind(), ErrorKind::Validation);
        assert_eq!(
            EngineError::TransferFailed { token: Address::zero() }.kind(),
            ErrorKind::Transfer
        );
        assert_eq!(
            EngineError::HealthFactorBelowMinimum(U256::zero()).kind(),
            ErrorKind::Solvency
        );
        assert_eq!(EngineError::MintFailed.kind(), ErrorKind::Issuance);
        assert_eq!(
            EngineError::from(DebtTokenError::AmountMustBeMoreThanZero).kind(),
            ErrorKind::Issuance
        );
        assert_eq!(EngineError::ReentrantCall.kind(), ErrorKind::Execution);
    }

    #[test]
    fn test_health_factor_payload_in_message() {
        let err = EngineError::HealthFactorBelowMinimum(U256::zero());
        assert_eq!(err.to_string(), "Health factor 0 is below minimum");
    }
}
