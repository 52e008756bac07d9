//! Account registry: binds caller addresses to off-chain identities.
//!
//! Binding rules:
//! - a caller maps to at most one identity, ever;
//! - an identity may be bound to several callers (a user re-registering
//!   from a new address keeps the same identity);
//! - an identity may additionally bind one destination tag, proving it
//!   owns the payment destination it will list deposits under.

use std::collections::HashMap;

use openramp_types::{
    Address, DestinationTag, IdentityCredential, IdentityHash, IdentityProofVerifier, RampError,
    Result,
};

/// Outcome of a successful [`AccountRegistry::register`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub identity: IdentityHash,
    /// `false` when the caller was already bound to this identity.
    pub newly_bound: bool,
}

/// Caller → identity bindings, verified through an [`IdentityProofVerifier`].
pub struct AccountRegistry {
    verifier: Box<dyn IdentityProofVerifier>,
    accounts: HashMap<Address, IdentityHash>,
    destination_tags: HashMap<IdentityHash, DestinationTag>,
}

impl AccountRegistry {
    #[must_use]
    pub fn new(verifier: Box<dyn IdentityProofVerifier>) -> Self {
        Self {
            verifier,
            accounts: HashMap::new(),
            destination_tags: HashMap::new(),
        }
    }

    /// Swap the identity verifier. Existing bindings are kept.
    pub fn set_verifier(&mut self, verifier: Box<dyn IdentityProofVerifier>) {
        self.verifier = verifier;
    }

    /// Verify `credential` and bind `caller` to the identity it proves.
    ///
    /// # Errors
    /// - `ProofRejected` if the verifier refuses the credential
    /// - `CredentialCallerMismatch` if the credential was issued to another address
    /// - `AlreadyRegistered` if `caller` is bound to a different identity
    pub fn register(
        &mut self,
        caller: Address,
        credential: &IdentityCredential,
    ) -> Result<Registration> {
        let verified = self.verifier.verify(credential)?;
        if verified.caller != caller {
            return Err(RampError::CredentialCallerMismatch);
        }

        match self.accounts.get(&caller) {
            Some(existing) if *existing == verified.identity => Ok(Registration {
                identity: verified.identity,
                newly_bound: false,
            }),
            Some(existing) => Err(RampError::AlreadyRegistered {
                caller,
                existing: *existing,
            }),
            None => {
                self.accounts.insert(caller, verified.identity);
                tracing::info!(%caller, identity = %verified.identity, "account registered");
                Ok(Registration {
                    identity: verified.identity,
                    newly_bound: true,
                })
            }
        }
    }

    /// Bind a destination tag to the caller's identity.
    ///
    /// # Errors
    /// - `NotRegistered` if `caller` has no identity
    /// - `ProofRejected` / `CredentialCallerMismatch` as for [`register`](Self::register)
    /// - `IdentityMismatch` if the credential proves a different identity
    /// - `MissingDestinationTag` if the credential carries no tag
    /// - `DestinationTagAlreadyBound` if the identity already has one
    pub fn register_off_ramper(
        &mut self,
        caller: Address,
        credential: &IdentityCredential,
    ) -> Result<(IdentityHash, DestinationTag)> {
        let identity = self.require_identity(caller)?;
        let verified = self.verifier.verify(credential)?;
        if verified.caller != caller {
            return Err(RampError::CredentialCallerMismatch);
        }
        if verified.identity != identity {
            return Err(RampError::IdentityMismatch);
        }
        let tag = verified
            .destination_tag
            .ok_or(RampError::MissingDestinationTag)?;
        if self.destination_tags.contains_key(&identity) {
            return Err(RampError::DestinationTagAlreadyBound(identity));
        }

        self.destination_tags.insert(identity, tag.clone());
        tracing::info!(%identity, destination_tag = %tag, "off-ramper registered");
        Ok((identity, tag))
    }

    /// The identity bound to `caller`, if any.
    #[must_use]
    pub fn identity_of(&self, caller: Address) -> Option<IdentityHash> {
        self.accounts.get(&caller).copied()
    }

    /// The identity bound to `caller`.
    ///
    /// # Errors
    /// Returns `NotRegistered` if there is none.
    pub fn require_identity(&self, caller: Address) -> Result<IdentityHash> {
        self.identity_of(caller)
            .ok_or(RampError::NotRegistered(caller))
    }

    #[must_use]
    pub fn is_registered(&self, caller: Address) -> bool {
        self.accounts.contains_key(&caller)
    }

    /// The destination tag bound to `identity`, if any.
    #[must_use]
    pub fn destination_tag_of(&self, identity: &IdentityHash) -> Option<&DestinationTag> {
        self.destination_tags.get(identity)
    }

    /// Every caller bound to `identity`, sorted.
    #[must_use]
    pub fn callers_of(&self, identity: &IdentityHash) -> Vec<Address> {
        let mut callers: Vec<Address> = self
            .accounts
            .iter()
            .filter(|(_, id)| *id == identity)
            .map(|(caller, _)| *caller)
            .collect();
        callers.sort();
        callers
    }

    /// Number of bound callers.
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}
