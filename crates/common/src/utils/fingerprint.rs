//! Content fingerprints of logical keys
//!
//! A [`Fingerprint`] is the BLAKE3 digest of a key's encoded bytes. It is used
//! both as the cache store key and as the coalescing key, so two logical keys
//! that encode identically always meet in the same store slot and the same
//! in-flight call.

use std::fmt;

use serde::Serialize;

use super::codec;
use crate::error::CommonResult;

/// Length of a fingerprint in bytes
pub const FINGERPRINT_LEN: usize = 32;

/// Deterministic digest of an encoded logical key
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Fingerprint a serializable logical key.
    ///
    /// # Errors
    /// Returns `CommonError::Serialization` if the key cannot be encoded.
    ///
    /// ```
    /// use scaffold_common::utils::Fingerprint;
    ///
    /// let a = Fingerprint::of(&("user", 42)).unwrap();
    /// let b = Fingerprint::of(&("user", 42)).unwrap();
    /// assert_eq!(a, b);
    /// ```
    pub fn of<K>(key: &K) -> CommonResult<Self>
    where
        K: Serialize + ?Sized,
    {
        let bytes = codec::encode(key)?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Fingerprint raw bytes directly.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Digest bytes
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Leading eight bytes as an integer, used for shard selection.
    #[cfg_attr(not(feature = "runtime"), allow(dead_code))]
    pub(crate) fn prefix_u64(&self) -> u64 {
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&self.0[..8]);
        u64::from_le_bytes(prefix)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 8 bytes is plenty to tell keys apart in logs
        write!(f, "Fingerprint({}…)", hex::encode(&self.0[..8]))
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for utils::fingerprint.
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct Query<'a> {
        table: &'a str,
        page: u32,
    }

    /// Validates that identical keys fingerprint identically and different
    /// keys do not.
    #[test]
    fn test_fingerprint_identity() {
        let a = Fingerprint::of(&Query { table: "orders", page: 1 }).unwrap();
        let b = Fingerprint::of(&Query { table: "orders", page: 1 }).unwrap();
        let c = Fingerprint::of(&Query { table: "orders", page: 2 }).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    /// Validates the hex rendering length and alphabet.
    #[test]
    fn test_fingerprint_hex() {
        let fp = Fingerprint::of("key").unwrap();
        let hex = fp.to_hex();

        assert_eq!(hex.len(), FINGERPRINT_LEN * 2);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(fp.to_string(), hex);
    }

    /// Validates that the fingerprint is the digest of the encoded key.
    #[test]
    fn test_fingerprint_matches_encoded_bytes() {
        let key = ("tenant", 9u8);
        let bytes = codec::encode(&key).unwrap();

        assert_eq!(Fingerprint::of(&key).unwrap(), Fingerprint::from_bytes(&bytes));
    }
}
