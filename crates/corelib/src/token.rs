//! Ring token implementation.
//!
//! A token is a position on the hash ring, computed as a 128-bit digest of
//! either a key or a virtual-node label. Keys and labels go through the
//! same function with the same UTF-8 encoding, so a key's successor walk
//! and a node's placement always agree.

use std::fmt;

use xxhash_rust::xxh3::xxh3_128;

/// Position on the hash ring, a 128-bit digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct RingToken(pub u128);

impl RingToken {
    /// Hashes a byte slice into a ring position.
    pub fn from_bytes(data: &[u8]) -> Self {
        RingToken(xxh3_128(data))
    }

    /// Hashes a string key into a ring position (UTF-8 bytes).
    pub fn from_key(key: &str) -> Self {
        Self::from_bytes(key.as_bytes())
    }

    /// Clockwise distance from `self` to `other`, wrapping at the top of
    /// the token space.
    pub fn distance_to(&self, other: &Self) -> Self {
        RingToken(other.0.wrapping_sub(self.0))
    }
}

impl fmt::Display for RingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_deterministic() {
        assert_eq!(RingToken::from_key("name"), RingToken::from_key("name"));
        assert_ne!(RingToken::from_key("name"), RingToken::from_key("name2"));
    }

    #[test]
    fn test_key_and_bytes_agree() {
        assert_eq!(
            RingToken::from_key("a:1-0"),
            RingToken::from_bytes("a:1-0".as_bytes())
        );
    }

    #[test]
    fn test_distance_wraps() {
        let low = RingToken(10);
        let high = RingToken(u128::MAX - 9);
        assert_eq!(high.distance_to(&low), RingToken(20));
        assert_eq!(low.distance_to(&high), RingToken(u128::MAX - 19));
    }
}
