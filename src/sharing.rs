//! XOR secret sharing between the three simulated parties.
//!
//! A [`SharedValue`] is either a single plain vector or exactly three shares
//! whose XOR is the represented value.  The enum makes any other share count
//! unrepresentable.

use crate::error::Result;
use crate::gf2::BitVector;
use crate::prng::Entropy;
use zeroize::Zeroize;

/// Number of simulated MPC parties.
pub const PARTY_COUNT: usize = 3;

/// One of the three simulated parties.
///
/// Also used as the per-repetition challenge value: the party named by the
/// challenge is the one that stays hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Party {
    /// Party 0, which also absorbs public constants.
    P0,
    /// Party 1.
    P1,
    /// Party 2.
    P2,
}

impl Party {
    /// All parties in index order.
    pub const ALL: [Party; PARTY_COUNT] = [Party::P0, Party::P1, Party::P2];

    /// Index in `0..3`.
    pub fn index(self) -> usize {
        match self {
            Self::P0 => 0,
            Self::P1 => 1,
            Self::P2 => 2,
        }
    }

    /// Party with the given index, if it is in range.
    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    /// The party this one exchanges AND messages with.
    pub fn next(self) -> Self {
        match self {
            Self::P0 => Self::P1,
            Self::P1 => Self::P2,
            Self::P2 => Self::P0,
        }
    }

    /// When `self` is hidden, the two parties that are opened: the first is
    /// replayed in full, the second supplies the messages the first receives.
    pub fn revealed(self) -> (Party, Party) {
        let first = self.next();
        (first, first.next())
    }
}

/// A vector that is either held in the clear or split into three XOR shares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharedValue {
    /// Plain, unshared value.
    Unshared(BitVector),
    /// Three shares whose XOR is the value.
    Shared([BitVector; PARTY_COUNT]),
}

impl SharedValue {
    /// Wraps a plain vector.
    pub fn from_plain(value: BitVector) -> Self {
        Self::Unshared(value)
    }

    /// Wraps three existing shares.
    pub fn from_shares(shares: [BitVector; PARTY_COUNT]) -> Self {
        Self::Shared(shares)
    }

    /// Splits the value into three shares.
    ///
    /// Shares 1 and 2 are drawn uniformly from `entropy`; share 0 is the value
    /// XOR both.  Any entropy or allocation failure is returned and the value
    /// is left untouched.  An already shared value is returned unchanged.
    pub fn promote_to_shared(self, entropy: &mut Entropy) -> Result<Self> {
        match self {
            Self::Unshared(value) => {
                let s1 = entropy.random_vector(value.len())?;
                let s2 = entropy.random_vector(value.len())?;
                let mut s0 = value;
                s0 ^= &s1;
                s0 ^= &s2;
                Ok(Self::Shared([s0, s1, s2]))
            }
            shared @ Self::Shared(_) => Ok(shared),
        }
    }

    /// Reconstructs the represented value.
    pub fn combine(&self) -> BitVector {
        match self {
            Self::Unshared(value) => value.clone(),
            Self::Shared([s0, s1, s2]) => {
                let mut out = s0 ^ s1;
                out ^= s2;
                out
            }
        }
    }

    /// Width of the represented value.
    pub fn len(&self) -> usize {
        match self {
            Self::Unshared(value) => value.len(),
            Self::Shared(shares) => shares[0].len(),
        }
    }

    /// Returns `true` for a zero-width value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` when the value is split into three shares.
    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Shared(_))
    }

    /// Share held by `party`, if the value is shared.
    pub fn share(&self, party: Party) -> Option<&BitVector> {
        match self {
            Self::Unshared(_) => None,
            Self::Shared(shares) => Some(&shares[party.index()]),
        }
    }

    /// All three shares, if the value is shared.
    pub fn shares(&self) -> Option<&[BitVector; PARTY_COUNT]> {
        match self {
            Self::Unshared(_) => None,
            Self::Shared(shares) => Some(shares),
        }
    }

    /// Zeroizes every owned vector in place, keeping the variant and width.
    pub fn clear(&mut self) {
        match self {
            Self::Unshared(value) => value.zeroize(),
            Self::Shared(shares) => shares.iter_mut().for_each(Zeroize::zeroize),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promote_then_combine_recovers_value() {
        let mut entropy = Entropy::seeded(1);
        let value = BitVector::from_le_bytes(70, &[0xa5; 9]);
        let shared = SharedValue::from_plain(value.clone())
            .promote_to_shared(&mut entropy)
            .unwrap();
        assert!(shared.is_shared());
        assert_eq!(shared.combine(), value);
        assert_ne!(shared.share(Party::P1), Some(&value));
        assert_eq!(shared.len(), 70);
    }

    #[test]
    fn promoting_twice_is_identity() {
        let mut entropy = Entropy::seeded(2);
        let shared = SharedValue::from_plain(BitVector::zero(8))
            .promote_to_shared(&mut entropy)
            .unwrap();
        let again = shared.clone().promote_to_shared(&mut entropy).unwrap();
        assert_eq!(shared, again);
    }

    #[test]
    fn clear_preserves_shape() {
        let mut entropy = Entropy::seeded(3);
        let mut shared = SharedValue::from_plain(BitVector::from_le_bytes(16, &[1, 2]))
            .promote_to_shared(&mut entropy)
            .unwrap();
        shared.clear();
        let shares = shared.shares().unwrap();
        assert!(shares.iter().all(|s| s.is_zero() && s.len() == 16));
        assert!(shared.combine().is_zero());
    }

    #[test]
    fn revealed_parties_exclude_hidden() {
        for hidden in Party::ALL {
            let (first, second) = hidden.revealed();
            assert_ne!(first, hidden);
            assert_ne!(second, hidden);
            assert_ne!(first, second);
            assert_eq!(first.next(), second);
        }
        assert_eq!(Party::from_index(3), None);
    }
}
