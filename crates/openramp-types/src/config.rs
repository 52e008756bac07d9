//! Configuration for an OpenRamp ledger instance.

use std::path::Path;

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Address, RampError, Result, constants};

/// Tunable parameters of a ramp ledger.
///
/// Every field can also be changed at runtime through the owner-gated
/// administrative surface; both paths enforce the same bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RampConfig {
    /// Address allowed to call administrative operations.
    pub owner: Address,
    /// Smallest deposit accepted, in escrow units.
    pub min_deposit_amount: Decimal,
    /// Largest amount one intent may reserve. `None` disables the ceiling.
    pub max_on_ramp_amount: Option<Decimal>,
    /// Seconds after creation at which an intent becomes prunable.
    pub intent_expiration_secs: u64,
    /// Minimum seconds between two on-ramper settlements by one identity.
    pub on_ramp_cooldown_secs: u64,
    /// Fraction of each settlement withheld as protocol fee (0.01 = 1%).
    pub sustainability_fee: Decimal,
    /// Receiver of the sustainability fee.
    pub fee_recipient: Address,
    /// Open deposits allowed per depositor identity.
    pub max_deposits_per_account: usize,
    /// Refuse deposits from identities without a bound destination tag.
    #[serde(default)]
    pub require_registered_destination: bool,
}

impl RampConfig {
    /// Default parameters with the given owner, who also receives fees.
    #[must_use]
    pub fn with_owner(owner: Address) -> Self {
        Self {
            owner,
            min_deposit_amount: constants::DEFAULT_MIN_DEPOSIT_AMOUNT,
            max_on_ramp_amount: Some(constants::DEFAULT_MAX_ON_RAMP_AMOUNT),
            intent_expiration_secs: constants::DEFAULT_INTENT_EXPIRATION_SECS,
            on_ramp_cooldown_secs: constants::DEFAULT_ON_RAMP_COOLDOWN_SECS,
            sustainability_fee: constants::DEFAULT_SUSTAINABILITY_FEE,
            fee_recipient: owner,
            max_deposits_per_account: constants::DEFAULT_MAX_DEPOSITS_PER_ACCOUNT,
            require_registered_destination: false,
        }
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Intent lifetime as a duration.
    #[must_use]
    pub fn intent_expiration_period(&self) -> Duration {
        secs(self.intent_expiration_secs)
    }

    /// Settlement cooldown as a duration.
    #[must_use]
    pub fn on_ramp_cooldown_period(&self) -> Duration {
        secs(self.on_ramp_cooldown_secs)
    }

    /// Check every parameter against its bounds.
    pub fn validate(&self) -> Result<()> {
        if self.owner.is_zero() {
            return Err(RampError::Configuration(
                "owner cannot be the zero address".into(),
            ));
        }
        check_min_deposit(self.min_deposit_amount)?;
        if let Some(max) = self.max_on_ramp_amount {
            check_max_on_ramp(max)?;
        }
        check_expiration(self.intent_expiration_secs)?;
        check_cooldown(self.on_ramp_cooldown_secs)?;
        check_fee(self.sustainability_fee)?;
        check_fee_recipient(self.fee_recipient)?;
        if self.max_deposits_per_account == 0 {
            return Err(RampError::InvalidParameter {
                reason: "Max deposits per account cannot be zero".into(),
            });
        }
        Ok(())
    }
}

#[allow(clippy::cast_possible_wrap)]
fn secs(value: u64) -> Duration {
    Duration::seconds(value.min(i64::MAX as u64 / 1000) as i64)
}

/// Bound check shared by config validation and the admin setter.
pub fn check_min_deposit(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(RampError::InvalidParameter {
            reason: "Minimum deposit cannot be zero".into(),
        });
    }
    Ok(())
}

/// Bound check shared by config validation and the admin setter.
pub fn check_max_on_ramp(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(RampError::InvalidParameter {
            reason: "Max on ramp amount cannot be zero".into(),
        });
    }
    Ok(())
}

/// Bound check shared by config validation and the admin setter.
pub fn check_expiration(secs: u64) -> Result<()> {
    if secs == 0 {
        return Err(RampError::InvalidParameter {
            reason: "Max intent expiration period cannot be zero".into(),
        });
    }
    if secs > constants::MAX_INTENT_EXPIRATION_SECS {
        return Err(RampError::InvalidParameter {
            reason: format!(
                "Intent expiration period {secs}s exceeds {}s",
                constants::MAX_INTENT_EXPIRATION_SECS
            ),
        });
    }
    Ok(())
}

/// Bound check shared by config validation and the admin setter. Zero
/// disables the cooldown.
pub fn check_cooldown(secs: u64) -> Result<()> {
    if secs > constants::MAX_ON_RAMP_COOLDOWN_SECS {
        return Err(RampError::InvalidParameter {
            reason: format!(
                "On-ramp cooldown period {secs}s exceeds {}s",
                constants::MAX_ON_RAMP_COOLDOWN_SECS
            ),
        });
    }
    Ok(())
}

/// Bound check shared by config validation and the admin setter.
pub fn check_fee(fee: Decimal) -> Result<()> {
    if fee < Decimal::ZERO {
        return Err(RampError::InvalidParameter {
            reason: "Fee cannot be negative".into(),
        });
    }
    if fee > constants::MAX_SUSTAINABILITY_FEE {
        return Err(RampError::FeeAboveMaximum {
            fee,
            maximum: constants::MAX_SUSTAINABILITY_FEE,
        });
    }
    Ok(())
}

/// Bound check shared by config validation and the admin setter.
pub fn check_fee_recipient(recipient: Address) -> Result<()> {
    if recipient.is_zero() {
        return Err(RampError::ZeroAddress {
            field: "fee recipient",
        });
    }
    Ok(())
}
