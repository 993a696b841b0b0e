use num_bigint::BigUint;
use std::sync::OnceLock;
use std::time::Duration;
use tally_common::utils::codec::pow10;

/// Balances, supply, faucet amount and transfer caps are unbounded integers.
pub type Amount = BigUint;

/// Seconds since the Unix epoch.
pub type Timestamp = u64;

/// Smallest accepted transfer cap is `10^20 - 1`.
pub fn min_transfer_limit() -> &'static Amount {
    static VALUE: OnceLock<Amount> = OnceLock::new();
    VALUE.get_or_init(|| pow10(20) - 1u32)
}

/// Largest accepted transfer cap is `10^72 - 1`.
pub fn max_transfer_limit() -> &'static Amount {
    static VALUE: OnceLock<Amount> = OnceLock::new();
    VALUE.get_or_init(|| pow10(72) - 1u32)
}

/// Largest accepted faucet amount is `10^64`.
pub fn max_faucet_amount() -> &'static Amount {
    static VALUE: OnceLock<Amount> = OnceLock::new();
    VALUE.get_or_init(|| pow10(64))
}

/// 1000 units at 18 decimals.
pub fn default_faucet_amount() -> Amount {
    pow10(21)
}

pub fn default_transfer_limit() -> Amount {
    pow10(22)
}

pub const DEFAULT_FAUCET_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);
