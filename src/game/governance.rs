//! Governance
//!
//! The governor set and the gate that checks it. The engine owns the only
//! gate; question modules borrow it for their privileged calls so there is a
//! single source of truth for who may govern.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::identity::Address;
use crate::game::error::GameError;

/// Addresses allowed to perform privileged operations.
///
/// Never empty: construction rejects an empty set and removal refuses to
/// take out the last member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernorSet {
    members: BTreeSet<Address>,
}

impl GovernorSet {
    /// Create the genesis set.
    pub fn new(initial: impl IntoIterator<Item = Address>) -> Result<Self, GameError> {
        let members: BTreeSet<Address> = initial.into_iter().collect();
        if members.is_empty() {
            return Err(GameError::EmptyGovernorSet);
        }
        Ok(Self { members })
    }

    /// Is the address a governor?
    pub fn contains(&self, address: &Address) -> bool {
        self.members.contains(address)
    }

    /// Number of governors.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate in address order.
    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.members.iter()
    }

    fn insert(&mut self, address: Address) -> bool {
        self.members.insert(address)
    }

    fn remove(&mut self, address: &Address) -> Result<bool, GameError> {
        if !self.members.contains(address) {
            return Ok(false);
        }
        if self.members.len() == 1 {
            return Err(GameError::LastGovernor);
        }
        Ok(self.members.remove(address))
    }
}

/// Authorization gate over a `GovernorSet`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GovernanceGate {
    governors: GovernorSet,
}

impl GovernanceGate {
    /// Wrap a governor set.
    pub fn new(governors: GovernorSet) -> Self {
        Self { governors }
    }

    /// Is the address a governor?
    pub fn is_governor(&self, address: &Address) -> bool {
        self.governors.contains(address)
    }

    /// Fail with `Unauthorized` unless the caller is a governor.
    pub fn require_governor(&self, caller: &Address) -> Result<(), GameError> {
        if self.is_governor(caller) {
            Ok(())
        } else {
            Err(GameError::unauthorized(*caller))
        }
    }

    /// Add a governor. Returns whether the set changed.
    pub fn add_governor(&mut self, caller: &Address, address: Address) -> Result<bool, GameError> {
        self.require_governor(caller)?;
        Ok(self.governors.insert(address))
    }

    /// Remove a governor. Returns whether the set changed.
    pub fn remove_governor(&mut self, caller: &Address, address: &Address) -> Result<bool, GameError> {
        self.require_governor(caller)?;
        self.governors.remove(address)
    }

    /// The guarded set.
    pub fn governors(&self) -> &GovernorSet {
        &self.governors
    }
}
