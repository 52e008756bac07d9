//! System-wide constants for the OpenRamp escrow ledger.

use rust_decimal::Decimal;

/// Decimal precision of the escrowed asset (6 places, USDC-style).
pub const AMOUNT_PRECISION: u32 = 6;

/// Precision a converted payment is first rounded to, absorbing the
/// last-digit rounding of a stored conversion rate before truncation.
pub const CONVERSION_PRECISION: u32 = 18;

/// Hard ceiling on the sustainability fee rate: 5%.
pub const MAX_SUSTAINABILITY_FEE: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

/// Default minimum deposit (escrow units).
pub const DEFAULT_MIN_DEPOSIT_AMOUNT: Decimal = Decimal::from_parts(20, 0, 0, false, 0);

/// Default maximum amount a single intent may reserve (escrow units).
pub const DEFAULT_MAX_ON_RAMP_AMOUNT: Decimal = Decimal::from_parts(999, 0, 0, false, 0);

/// Default intent lifetime in seconds (one day).
pub const DEFAULT_INTENT_EXPIRATION_SECS: u64 = 86_400;

/// Longest intent lifetime the owner may configure (30 days).
pub const MAX_INTENT_EXPIRATION_SECS: u64 = 30 * 86_400;

/// Default minimum gap between two settlements by one identity (three minutes).
pub const DEFAULT_ON_RAMP_COOLDOWN_SECS: u64 = 180;

/// Longest settlement cooldown the owner may configure (30 days).
pub const MAX_ON_RAMP_COOLDOWN_SECS: u64 = 30 * 86_400;

/// Default sustainability fee rate: 0.1%.
pub const DEFAULT_SUSTAINABILITY_FEE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Maximum number of open deposits per depositor identity.
pub const DEFAULT_MAX_DEPOSITS_PER_ACCOUNT: usize = 5;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "OpenRamp";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_constants_have_expected_values() {
        assert_eq!(MAX_SUSTAINABILITY_FEE, Decimal::new(5, 2));
        assert_eq!(DEFAULT_MIN_DEPOSIT_AMOUNT, Decimal::new(20, 0));
        assert_eq!(DEFAULT_MAX_ON_RAMP_AMOUNT, Decimal::new(999, 0));
        assert_eq!(DEFAULT_SUSTAINABILITY_FEE, Decimal::new(1, 3));
    }
}
