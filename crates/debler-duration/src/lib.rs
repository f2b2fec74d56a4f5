//! Duration parsing and serde (de)serializers shared across configuration structs.
//!
//! Durations in configuration files are accepted either as a humantime string
//! (`"60s"`, `"2 min"`) or as a bare integer number of seconds, so existing
//! integer-valued config files keep working.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer, de};

/// Deserialize a [`Duration`] from either a humantime string or an integer
/// number of seconds.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct DurationVisitor;

    impl<'de> de::Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a humantime duration string or an integer number of seconds")
        }

        fn visit_str<E>(self, value: &str) -> Result<Duration, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(value).map_err(de::Error::custom)
        }

        fn visit_u64<E>(self, value: u64) -> Result<Duration, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Duration, E>
        where
            E: de::Error,
        {
            if value < 0 {
                return Err(de::Error::custom("duration seconds must not be negative"));
            }
            Ok(Duration::from_secs(value as u64))
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}

/// Deserialize an `Option<Duration>`, treating an explicit `null` as `None`.
pub fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "deserialize_duration")] Duration);

    Option::<Wrapper>::deserialize(deserializer).map(|w| w.map(|Wrapper(d)| d))
}

/// Serialize a [`Duration`] as a humantime string (`"2m 30s"`).
pub fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&humantime::format_duration(*duration))
}

/// Serialize an `Option<Duration>` as a humantime string, or skip when `None`.
pub fn serialize_duration_opt<S>(
    duration: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match duration {
        Some(d) => serializer.collect_str(&humantime::format_duration(*d)),
        None => serializer.serialize_none(),
    }
}

/// Parse a free-standing duration string used outside of serde contexts
/// (e.g. CLI flags).
pub fn parse_duration(input: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Wrapper {
        #[serde(deserialize_with = "deserialize_duration")]
        value: Duration,
    }

    #[test]
    fn parses_humantime_string() {
        let w: Wrapper = serde_json::from_str(r#"{"value": "60s"}"#).unwrap();
        assert_eq!(w.value, Duration::from_secs(60));
    }

    #[test]
    fn parses_integer_seconds() {
        let w: Wrapper = serde_json::from_str(r#"{"value": 90}"#).unwrap();
        assert_eq!(w.value, Duration::from_secs(90));
    }

    #[test]
    fn rejects_negative_integer() {
        let result: Result<Wrapper, _> = serde_json::from_str(r#"{"value": -5}"#);
        assert!(result.is_err());
    }

    #[test]
    fn parse_duration_free_function() {
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
    }
}
