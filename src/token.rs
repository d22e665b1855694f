//! Ring tokens and routing-key partitioners.
//!
//! A token is the position of a routing key on the cluster ring. The default
//! partitioner is the Murmur3 variant used by Cassandra-compatible servers,
//! including its historic signed-byte behavior, so tokens computed here agree
//! with tokens assigned by the server.

use bytes::Buf;
use derive_more::Constructor;
use std::cmp::min;
use std::num::Wrapping;

const C1: Wrapping<i64> = Wrapping(0x87c3_7b91_1142_53d5_u64 as i64);
const C2: Wrapping<i64> = Wrapping(0x4cf5_ad43_2745_937f_u64 as i64);

/// A token on the ring. Only Murmur3 tokens are supported for now.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Default, Debug, Hash, Constructor)]
pub struct Murmur3Token {
    pub value: i64,
}

impl From<i64> for Murmur3Token {
    fn from(value: i64) -> Self {
        Murmur3Token::new(value)
    }
}

/// Maps routing keys to ring tokens. Queries may carry a custom partitioner
/// when the target table lives on a non-default ring.
pub trait Partitioner {
    /// Hashes given routing key into its ring position.
    fn hash(&self, routing_key: &[u8]) -> Murmur3Token;
}

/// The Cassandra-compatible Murmur3 partitioner.
#[derive(Default, Copy, Clone, Debug)]
pub struct Murmur3Partitioner;

impl Partitioner for Murmur3Partitioner {
    fn hash(&self, routing_key: &[u8]) -> Murmur3Token {
        murmur3_token(routing_key)
    }
}

#[inline]
fn rotl64(v: Wrapping<i64>, n: u32) -> Wrapping<i64> {
    Wrapping((v.0 << n) | (v.0 as u64 >> (64 - n)) as i64)
}

#[inline]
fn fmix(mut k: Wrapping<i64>) -> Wrapping<i64> {
    k ^= Wrapping((k.0 as u64 >> 33) as i64);
    k *= Wrapping(0xff51_afd7_ed55_8ccd_u64 as i64);
    k ^= Wrapping((k.0 as u64 >> 33) as i64);
    k *= Wrapping(0xc4ce_b9fe_1a85_ec53_u64 as i64);
    k ^= Wrapping((k.0 as u64 >> 33) as i64);

    k
}

#[inline]
fn mix_k1(mut k1: Wrapping<i64>) -> Wrapping<i64> {
    k1 *= C1;
    k1 = rotl64(k1, 31);
    k1 * C2
}

#[inline]
fn mix_k2(mut k2: Wrapping<i64>) -> Wrapping<i64> {
    k2 *= C2;
    k2 = rotl64(k2, 33);
    k2 * C1
}

// matches the original, buggy server implementation which sign-extends
// individual key bytes
pub fn murmur3_token(mut routing_key: &[u8]) -> Murmur3Token {
    let length = routing_key.len();

    let mut h1: Wrapping<i64> = Wrapping(0);
    let mut h2: Wrapping<i64> = Wrapping(0);

    while routing_key.len() >= 16 {
        let k1 = Wrapping(routing_key.get_i64_le());
        let k2 = Wrapping(routing_key.get_i64_le());

        h1 ^= mix_k1(k1);
        h1 = rotl64(h1, 27);
        h1 += h2;
        h1 = h1 * Wrapping(5) + Wrapping(0x52dc_e729);

        h2 ^= mix_k2(k2);
        h2 = rotl64(h2, 31);
        h2 += h1;
        h2 = h2 * Wrapping(5) + Wrapping(0x3849_5ab5);
    }

    debug_assert!(routing_key.len() < 16);

    if routing_key.len() > 8 {
        let mut k2 = Wrapping(0_i64);
        for i in (8..routing_key.len()).rev() {
            k2 ^= Wrapping(routing_key[i] as i8 as i64) << ((i - 8) * 8);
        }

        h2 ^= mix_k2(k2);
    }

    if !routing_key.is_empty() {
        let mut k1 = Wrapping(0_i64);
        for i in (0..min(8, routing_key.len())).rev() {
            k1 ^= Wrapping(routing_key[i] as i8 as i64) << (i * 8);
        }

        h1 ^= mix_k1(k1);
    }

    h1 ^= Wrapping(length as i64);
    h2 ^= Wrapping(length as i64);

    h1 += h2;
    h2 += h1;

    h1 = fmix(h1);
    h2 = fmix(h2);

    h1 += h2;

    Murmur3Token::new(h1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_hashes_to_zero() {
        assert_eq!(murmur3_token(b"").value, 0);
    }

    #[test]
    fn hash_is_deterministic() {
        let first = murmur3_token(b"some partition key");
        let second = murmur3_token(b"some partition key");
        assert_eq!(first, second);
    }

    #[test]
    fn distinct_keys_hash_differently() {
        assert_ne!(murmur3_token(b"key-a"), murmur3_token(b"key-b"));
        // exercise all tail lengths around the 8 and 16 byte boundaries
        let key = b"0123456789abcdef0123456789abcdef";
        let tokens: Vec<_> = (1..key.len())
            .map(|len| murmur3_token(&key[..len]))
            .collect();
        for (i, token) in tokens.iter().enumerate() {
            for other in &tokens[i + 1..] {
                assert_ne!(token, other);
            }
        }
    }

    #[test]
    fn partitioner_matches_raw_hash() {
        let key = b"user:42";
        assert_eq!(Murmur3Partitioner.hash(key), murmur3_token(key));
    }

    #[test]
    fn high_bytes_are_sign_extended() {
        // keys differing only in bytes >= 0x80 must still disagree
        assert_ne!(murmur3_token(&[0x80]), murmur3_token(&[0x7f]));
        assert_ne!(murmur3_token(&[0xff, 0x01]), murmur3_token(&[0x7f, 0x01]));
    }
}
