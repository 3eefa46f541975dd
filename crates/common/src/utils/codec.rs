//! Binary codec for logical keys and cache payloads
//!
//! Values are encoded as MessagePack with named struct fields. The encoding is
//! deterministic for a given value (map ordering follows the serde output, so
//! keys that contain maps should use `BTreeMap`), and decoding into a struct
//! of a different shape fails instead of silently producing garbage.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CommonResult;

/// Encode a value into its binary form.
///
/// # Errors
/// Returns `CommonError::Serialization` if the value cannot be represented
/// (for example a map with non-string keys inside a custom serializer).
pub fn encode<T>(value: &T) -> CommonResult<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    Ok(rmp_serde::to_vec_named(value)?)
}

/// Decode a value previously produced by [`encode`].
///
/// # Errors
/// Returns `CommonError::Serialization` if the bytes are truncated, corrupt,
/// or describe a different shape than `T`.
pub fn decode<T>(bytes: &[u8]) -> CommonResult<T>
where
    T: DeserializeOwned,
{
    Ok(rmp_serde::from_slice(bytes)?)
}
