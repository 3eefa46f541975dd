//! Shared utility primitives
//!
//! - **[`codec`]**: deterministic binary encoding for keys and cache payloads
//! - **[`fingerprint`]**: content digests of encoded logical keys
//! - **[`serde`]**: serde helpers for configuration types

pub mod codec;
pub mod fingerprint;
pub mod serde;

pub use self::codec::{decode, encode};
pub use self::fingerprint::Fingerprint;
pub use self::serde::duration_millis;
