//! Duration values as written in catalog files.
//!
//! A duration is either an integer number of seconds (`30`) or a sequence of
//! number/unit pairs (`"45s"`, `"1500ms"`, `"1m30s"`, `"0.5h"`).

use std::time::Duration;

use serde::de::{self, Deserializer, Visitor};

use crate::error::{Error, Result};

/// Parses a duration string.
///
/// # Errors
///
/// Returns [`Error::InvalidDuration`] when the text is empty, a number is
/// malformed, or a unit other than `ms`, `s`, `m`, `h` is used.
pub fn parse(text: &str) -> Result<Duration> {
    let trimmed = text.trim();
    let invalid = |reason: &str| Error::InvalidDuration {
        value: text.to_owned(),
        reason: reason.to_owned(),
    };

    if trimmed.is_empty() {
        return Err(invalid("duration cannot be empty"));
    }

    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    let mut total = 0f64;
    let mut rest = trimmed;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| invalid("missing unit"))?;
        if number_len == 0 {
            return Err(invalid("expected a number"));
        }
        let (number, tail) = rest.split_at(number_len);
        let number: f64 = number.parse().map_err(|_| invalid("malformed number"))?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        total += match unit {
            "ms" => number / 1000.0,
            "s" => number,
            "m" => number * 60.0,
            "h" => number * 3600.0,
            _ => return Err(invalid("unit must be one of ms, s, m, h")),
        };
        rest = tail;
    }

    Duration::try_from_secs_f64(total).map_err(|_| invalid("duration out of range"))
}

/// Deserializes an optional duration from an integer or a duration string.
///
/// # Errors
///
/// Propagates [`parse`] failures as deserialization errors.
pub fn deserialize_option<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Option<Duration>;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a number of seconds or a duration string such as \"30s\"")
        }

        fn visit_none<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D2>(self, deserializer: D2) -> std::result::Result<Self::Value, D2::Error>
        where
            D2: Deserializer<'de>,
        {
            deserializer.deserialize_any(self)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Self::Value, E> {
            Ok(Some(Duration::from_secs(value)))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Self::Value, E> {
            u64::try_from(value)
                .map(|secs| Some(Duration::from_secs(secs)))
                .map_err(|_| E::custom("duration cannot be negative"))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Self::Value, E> {
            parse(value).map(Some).map_err(E::custom)
        }
    }

    deserializer.deserialize_option(DurationVisitor)
}
