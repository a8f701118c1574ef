// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A fixed 256-bit set of component type ids.

use super::component::ComponentTypeId;

/// Number of `u64` words backing a [`Signature`]; `4 * 64 == 256` bits, one
/// per possible [`super::component::MAX_COMPONENTS`] slot.
pub const SIG_WORDS: usize = 4;

/// A 256-bit bitset identifying the exact component set of an archetype.
///
/// Unlike `archetype_ecs::bitset::BitSet`, this is fixed-size rather than a
/// growable `Vec<u64>`: the component cap is 256, so four words always
/// suffice and every operation is four constant-time word ops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Signature([u64; SIG_WORDS]);

impl Signature {
    pub const EMPTY: Signature = Signature([0; SIG_WORDS]);

    pub fn clear(&mut self) {
        self.0 = [0; SIG_WORDS];
    }

    pub fn set(&mut self, id: ComponentTypeId) {
        let id = id as usize;
        self.0[id / 64] |= 1u64 << (id % 64);
    }

    pub fn has(&self, id: ComponentTypeId) -> bool {
        let id = id as usize;
        (self.0[id / 64] & (1u64 << (id % 64))) != 0
    }

    /// `self ⊇ other`, i.e. `(self AND other) == other`.
    pub fn contains(&self, other: &Signature) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| (a & b) == *b)
    }

    /// `self ∩ other ≠ ∅`.
    pub fn intersects(&self, other: &Signature) -> bool {
        self.0.iter().zip(other.0.iter()).any(|(a, b)| (a & b) != 0)
    }

    pub fn from_types(types: &[ComponentTypeId]) -> Signature {
        let mut sig = Signature::EMPTY;
        for &t in types {
            sig.set(t);
        }
        sig
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_has_round_trip() {
        let mut sig = Signature::EMPTY;
        sig.set(0);
        sig.set(200);
        assert!(sig.has(0));
        assert!(sig.has(200));
        assert!(!sig.has(1));
    }

    #[test]
    fn contains_matches_union_identity() {
        let a = Signature::from_types(&[0, 1, 2]);
        let b = Signature::from_types(&[1, 2]);
        assert!(a.contains(&b));
        assert!(!b.contains(&a));
    }

    #[test]
    fn intersects_matches_nonempty_and() {
        let a = Signature::from_types(&[0, 5]);
        let b = Signature::from_types(&[5, 9]);
        let c = Signature::from_types(&[1, 2]);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }
}
