//! Serde helpers for configuration types

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Serialize a `Duration` as whole milliseconds
///
/// Store windows and intervals are written in config files as plain integers.
///
/// ```rust
/// use std::time::Duration;
///
/// use scaffold_common::duration_millis;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Windows {
///     #[serde(with = "duration_millis")]
///     life_window: Duration,
/// }
/// ```
pub mod duration_millis {
    use super::*;

    /// Serde serialization result type
    type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    /// Serialize a Duration as milliseconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    /// Deserialize milliseconds (u64) into a Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for utils::serde.
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Windows {
        #[serde(with = "duration_millis")]
        life_window: Duration,
        #[serde(with = "duration_millis")]
        clean_window: Duration,
    }

    /// Tests that durations are written as integer milliseconds in JSON.
    #[test]
    fn test_duration_millis_json() {
        let windows = Windows {
            life_window: Duration::from_secs(10),
            clean_window: Duration::from_millis(5000),
        };

        let json = serde_json::to_string(&windows).unwrap();
        assert_eq!(json, r#"{"life_window":10000,"clean_window":5000}"#);

        let back: Windows = serde_json::from_str(&json).unwrap();
        assert_eq!(back, windows);
    }

    /// Tests that TOML integers parse into durations, including zero.
    #[test]
    fn test_duration_millis_toml() {
        let windows: Windows = toml::from_str("life_window = 250\nclean_window = 0\n").unwrap();

        assert_eq!(windows.life_window, Duration::from_millis(250));
        assert_eq!(windows.clean_window, Duration::ZERO);
    }

    /// Tests that non-numeric values are rejected.
    #[test]
    fn test_duration_millis_rejects_strings() {
        let result: Result<Windows, _> =
            serde_json::from_str(r#"{"life_window":"10s","clean_window":0}"#);
        assert!(result.is_err());
    }
}
