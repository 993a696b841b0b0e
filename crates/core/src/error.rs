use thiserror::Error;

use crate::types::Timestamp;

/// Errors returned by ledger operations.
///
/// Every error is reported before any state changes, so a failed call
/// leaves the ledger exactly as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Throttle error: {0}")]
    Throttle(#[from] ThrottleError),

    /// A snapshot handed to `Ledger::restore` breaks an invariant
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("caller is not the owner")]
    NotOwner,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("amount exceeds the transfer cap")]
    ExceedsTransferCap,

    #[error("cannot transfer to self")]
    SelfTransfer,

    #[error("the ledger identity cannot send or receive units")]
    InvalidRecipient,

    #[error("new owner is the null address")]
    InvalidOwner,

    #[error("faucet amount above 10^64")]
    AmountTooLarge,

    #[error("transfer limit below 10^20 - 1")]
    LimitTooLow,

    #[error("transfer limit above 10^72 - 1")]
    LimitTooHigh,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleError {
    #[error("faucet cooldown active until {retry_at}")]
    CooldownActive { retry_at: Timestamp },
}

impl LedgerError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Authorization(AuthorizationError::NotOwner) => "NOT_OWNER",
            LedgerError::Validation(v) => match v {
                ValidationError::InsufficientBalance => "INSUFFICIENT_BALANCE",
                ValidationError::ExceedsTransferCap => "EXCEEDS_TRANSFER_CAP",
                ValidationError::SelfTransfer => "SELF_TRANSFER",
                ValidationError::InvalidRecipient => "INVALID_RECIPIENT",
                ValidationError::InvalidOwner => "INVALID_OWNER",
                ValidationError::AmountTooLarge => "AMOUNT_TOO_LARGE",
                ValidationError::LimitTooLow => "LIMIT_TOO_LOW",
                ValidationError::LimitTooHigh => "LIMIT_TOO_HIGH",
            },
            LedgerError::Throttle(ThrottleError::CooldownActive { .. }) => "COOLDOWN_ACTIVE",
            LedgerError::CorruptSnapshot(_) => "CORRUPT_SNAPSHOT",
        }
    }
}

/// Result type alias for ledger operations
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_messages() {
        let err: LedgerError = AuthorizationError::NotOwner.into();
        assert_eq!(err.code(), "NOT_OWNER");
        assert_eq!(err.to_string(), "Authorization error: caller is not the owner");

        let err: LedgerError = ThrottleError::CooldownActive { retry_at: 90 }.into();
        assert_eq!(err.code(), "COOLDOWN_ACTIVE");
        assert!(err.to_string().contains("90"));

        let err: LedgerError = ValidationError::LimitTooHigh.into();
        assert_eq!(err.code(), "LIMIT_TOO_HIGH");
    }
}
