// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
#![forbid(unsafe_code)]

//! Deterministic, immutable validator address book.
//!
//! The ordering here is the substrate RainTree builds on: every node must
//! independently derive the exact same permutation of the validator set from
//! nothing but the set itself, so the sort key is the raw address bytes.

use std::fmt;

use thiserror::Error;

/// A 32-byte validator identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 32]);

impl Address {
    /// Construct from raw bytes.
    pub const fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", bs58::encode(self.0).into_string())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

/// A validator entry as handed to [`AddressBook::build`].
#[derive(Clone, Debug)]
pub struct ValidatorEntry {
    /// Validator address.
    pub address: Address,
    /// Where the real transport should dial this peer (host:port or similar).
    pub service_url: String,
}

/// An immutable peer record, positioned by [`AddressBook`].
#[derive(Clone, Debug)]
pub struct PeerRecord {
    /// Validator address.
    pub address: Address,
    /// Dial target for the real transport.
    pub service_url: String,
}

/// Address book construction / lookup errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressBookError {
    /// The local node's own address is not present in the validator set.
    #[error("local address not present in validator set")]
    SelfNotPresent,
    /// Two validators share the same address.
    #[error("duplicate validator address")]
    DuplicateAddress,
    /// The validator set was empty.
    #[error("validator set is empty")]
    EmptySet,
}

/// Immutable, deterministically ordered validator list.
///
/// Constructed once at startup from the current validator set; a validator
/// set change means building a new `AddressBook`, not mutating this one.
#[derive(Clone, Debug)]
pub struct AddressBook {
    peers: Vec<PeerRecord>,
    self_index: usize,
}

impl AddressBook {
    /// Sort `validators` ascending by address and locate `self_addr` within it.
    ///
    /// Fails if `self_addr` is absent or any address repeats.
    pub fn build(
        mut validators: Vec<ValidatorEntry>,
        self_addr: Address,
    ) -> Result<Self, AddressBookError> {
        if validators.is_empty() {
            return Err(AddressBookError::EmptySet);
        }

        validators.sort_by(|a, b| a.address.cmp(&b.address));

        for pair in validators.windows(2) {
            if pair[0].address == pair[1].address {
                return Err(AddressBookError::DuplicateAddress);
            }
        }

        let self_index = validators
            .iter()
            .position(|v| v.address == self_addr)
            .ok_or(AddressBookError::SelfNotPresent)?;

        let peers = validators
            .into_iter()
            .map(|v| PeerRecord {
                address: v.address,
                service_url: v.service_url,
            })
            .collect();

        Ok(Self { peers, self_index })
    }

    /// Number of validators, `N >= 1`.
    pub fn size(&self) -> usize {
        self.peers.len()
    }

    /// This node's position in the ordered list.
    pub fn self_index(&self) -> usize {
        self.self_index
    }

    /// This node's own address.
    pub fn self_address(&self) -> Address {
        self.peers[self.self_index].address
    }

    /// Peer at ordinal position `i` (panics if out of range — callers always
    /// derive `i` modulo [`AddressBook::size`]).
    pub fn get(&self, i: usize) -> &PeerRecord {
        &self.peers[i]
    }

    /// Locate a validator's ordinal position by address.
    pub fn index_of(&self, addr: Address) -> Option<usize> {
        // Addresses are sorted, so this could binary-search; linear is fine
        // at validator-set scale and keeps the invariant obvious.
        self.peers.iter().position(|p| p.address == addr)
    }

    /// Iterate all peer records in address order.
    pub fn iter(&self) -> impl Iterator<Item = &PeerRecord> {
        self.peers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        let mut bytes = [0u8; 32];
        bytes[31] = b;
        Address::from_bytes(bytes)
    }

    fn entry(b: u8) -> ValidatorEntry {
        ValidatorEntry {
            address: addr(b),
            service_url: format!("val_{b}"),
        }
    }

    #[test]
    fn sorts_ascending_by_address() {
        let validators = vec![entry(3), entry(1), entry(2)];
        let book = AddressBook::build(validators, addr(2)).unwrap();
        assert_eq!(book.size(), 3);
        assert_eq!(book.get(0).address, addr(1));
        assert_eq!(book.get(1).address, addr(2));
        assert_eq!(book.get(2).address, addr(3));
        assert_eq!(book.self_index(), 1);
    }

    #[test]
    fn rejects_missing_self() {
        let validators = vec![entry(1), entry(2)];
        let err = AddressBook::build(validators, addr(9)).unwrap_err();
        assert_eq!(err, AddressBookError::SelfNotPresent);
    }

    #[test]
    fn rejects_duplicate_addresses() {
        let validators = vec![entry(1), entry(1)];
        let err = AddressBook::build(validators, addr(1)).unwrap_err();
        assert_eq!(err, AddressBookError::DuplicateAddress);
    }

    #[test]
    fn rejects_empty_set() {
        let err = AddressBook::build(vec![], addr(1)).unwrap_err();
        assert_eq!(err, AddressBookError::EmptySet);
    }

    #[test]
    fn index_of_roundtrips() {
        let validators = vec![entry(1), entry(2), entry(3)];
        let book = AddressBook::build(validators, addr(1)).unwrap();
        assert_eq!(book.index_of(addr(2)), Some(1));
        assert_eq!(book.index_of(addr(9)), None);
    }
}
