//! Emergency pause switch.
//!
//! While paused, every mutating ledger entry point fails with
//! [`RampError::Paused`] before any other validation. Reads stay available.

use openramp_types::{RampError, Result};

/// Global on/off switch for ledger mutations.
#[derive(Debug, Clone, Copy, Default)]
pub struct PauseSwitch {
    paused: bool,
}

impl PauseSwitch {
    /// Create a switch in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Returns `false` if the switch was already paused.
    pub fn pause(&mut self) -> bool {
        !std::mem::replace(&mut self.paused, true)
    }

    /// Returns `false` if the switch was already running.
    pub fn unpause(&mut self) -> bool {
        std::mem::replace(&mut self.paused, false)
    }

    /// Guard a mutating call. Returns `Ok(())` while running,
    /// or [`RampError::Paused`] while paused.
    pub fn check(&self) -> Result<()> {
        if self.paused {
            Err(RampError::Paused)
        } else {
            Ok(())
        }
    }
}
