//! Per-depositor access lists.
//!
//! Every depositor identity owns a denylist and an opt-in allowlist of
//! on-ramper identities. Both are consulted only when an intent is signaled
//! against one of the depositor's deposits; existing intents are unaffected
//! by later list changes.
//!
//! Precedence: a denied identity is always refused. If the depositor has
//! enabled its allowlist, only listed identities are accepted.

use std::collections::{HashMap, HashSet};

use openramp_types::{IdentityHash, RampError, Result};

const DENYLIST: &str = "denylist";
const ALLOWLIST: &str = "allowlist";

/// Denylists and allowlists keyed by depositor identity.
#[derive(Debug, Default)]
pub struct DenylistGuard {
    denied: HashMap<IdentityHash, HashSet<IdentityHash>>,
    allowed: HashMap<IdentityHash, HashSet<IdentityHash>>,
    allowlist_enabled: HashSet<IdentityHash>,
}

impl DenylistGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse `identity` on every deposit of `depositor`.
    ///
    /// # Errors
    /// Returns `AlreadyListed` if it is already denied.
    pub fn add_to_denylist(&mut self, depositor: IdentityHash, identity: IdentityHash) -> Result<()> {
        if self.is_denied(&depositor, &identity) {
            return Err(RampError::AlreadyListed(identity, DENYLIST));
        }
        self.denied.entry(depositor).or_default().insert(identity);
        tracing::debug!(%depositor, %identity, "identity denied");
        Ok(())
    }

    /// # Errors
    /// Returns `NotListed` if `identity` is not denied.
    pub fn remove_from_denylist(
        &mut self,
        depositor: IdentityHash,
        identity: IdentityHash,
    ) -> Result<()> {
        let Some(set) = self.denied.get_mut(&depositor) else {
            return Err(RampError::NotListed(identity, DENYLIST));
        };
        if !set.remove(&identity) {
            return Err(RampError::NotListed(identity, DENYLIST));
        }
        if set.is_empty() {
            self.denied.remove(&depositor);
        }
        tracing::debug!(%depositor, %identity, "identity removed from denylist");
        Ok(())
    }

    /// Switch `depositor` to allowlist mode.
    ///
    /// # Errors
    /// Returns `AllowlistAlreadyEnabled` if it is already on.
    pub fn enable_allowlist(&mut self, depositor: IdentityHash) -> Result<()> {
        if !self.allowlist_enabled.insert(depositor) {
            return Err(RampError::AllowlistAlreadyEnabled);
        }
        Ok(())
    }

    /// Add several identities to the allowlist. All or none are added.
    ///
    /// # Errors
    /// Returns `AlreadyListed` for the first identity already present.
    pub fn add_to_allowlist(
        &mut self,
        depositor: IdentityHash,
        identities: &[IdentityHash],
    ) -> Result<()> {
        let current = self.allowed.get(&depositor);
        let mut seen = HashSet::new();
        for identity in identities {
            if current.is_some_and(|set| set.contains(identity)) || !seen.insert(*identity) {
                return Err(RampError::AlreadyListed(*identity, ALLOWLIST));
            }
        }
        if !seen.is_empty() {
            self.allowed.entry(depositor).or_default().extend(seen);
        }
        Ok(())
    }

    /// Remove several identities from the allowlist. All or none are removed.
    ///
    /// # Errors
    /// Returns `NotListed` for the first identity not present.
    pub fn remove_from_allowlist(
        &mut self,
        depositor: IdentityHash,
        identities: &[IdentityHash],
    ) -> Result<()> {
        let Some(set) = self.allowed.get_mut(&depositor) else {
            return match identities.first() {
                Some(identity) => Err(RampError::NotListed(*identity, ALLOWLIST)),
                None => Ok(()),
            };
        };
        let mut seen = HashSet::new();
        for identity in identities {
            if !set.contains(identity) || !seen.insert(*identity) {
                return Err(RampError::NotListed(*identity, ALLOWLIST));
            }
        }
        for identity in identities {
            set.remove(identity);
        }
        if set.is_empty() {
            self.allowed.remove(&depositor);
        }
        Ok(())
    }

    /// Whether `depositor` accepts intents from `identity`.
    #[must_use]
    pub fn is_allowed(&self, depositor: &IdentityHash, identity: &IdentityHash) -> bool {
        if self.is_denied(depositor, identity) {
            return false;
        }
        if self.allowlist_enabled.contains(depositor) {
            return self
                .allowed
                .get(depositor)
                .is_some_and(|set| set.contains(identity));
        }
        true
    }

    /// # Errors
    /// Returns `OnRamperNotAllowed` unless [`is_allowed`](Self::is_allowed).
    pub fn check(&self, depositor: &IdentityHash, identity: &IdentityHash) -> Result<()> {
        if self.is_allowed(depositor, identity) {
            Ok(())
        } else {
            Err(RampError::OnRamperNotAllowed(*identity))
        }
    }

    #[must_use]
    pub fn is_denied(&self, depositor: &IdentityHash, identity: &IdentityHash) -> bool {
        self.denied
            .get(depositor)
            .is_some_and(|set| set.contains(identity))
    }

    #[must_use]
    pub fn is_allowlist_enabled(&self, depositor: &IdentityHash) -> bool {
        self.allowlist_enabled.contains(depositor)
    }

    /// Denied identities of `depositor`, sorted.
    #[must_use]
    pub fn denied_users(&self, depositor: &IdentityHash) -> Vec<IdentityHash> {
        sorted(self.denied.get(depositor))
    }

    /// Allowlisted identities of `depositor`, sorted.
    #[must_use]
    pub fn allowed_users(&self, depositor: &IdentityHash) -> Vec<IdentityHash> {
        sorted(self.allowed.get(depositor))
    }
}

fn sorted(set: Option<&HashSet<IdentityHash>>) -> Vec<IdentityHash> {
    let mut out: Vec<IdentityHash> = set.into_iter().flatten().copied().collect();
    out.sort();
    out
}
