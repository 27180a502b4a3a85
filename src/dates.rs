//! Wire format for timestamps: `YYYY-MM-DD HH:MM:SS`, local time. Input also
//! accepts the ISO `T` separator and RFC 3339 strings.

use chrono::{DateTime, Local, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Deserializer, Serializer};

pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

pub fn parse(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.with_timezone(&Local).naive_local())
        })
        .map(|dt| dt.trunc_subsecs(0))
}

pub fn serialize_opt<S: Serializer>(
    value: &Option<NaiveDateTime>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(dt) => serializer.serialize_str(&dt.format(FORMAT).to_string()),
        None => serializer.serialize_none(),
    }
}

fn parse_nullable<E: serde::de::Error>(raw: Option<String>) -> Result<Option<NaiveDateTime>, E> {
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse(&s)
            .map(Some)
            .ok_or_else(|| E::custom(format!("invalid date '{s}'"))),
    }
}

pub fn deserialize_opt<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDateTime>, D::Error> {
    parse_nullable(Option::<String>::deserialize(deserializer)?)
}

/// For partial updates: an absent key stays `None` (via `#[serde(default)]`),
/// an explicit `null` or empty string becomes `Some(None)`.
pub fn deserialize_patch<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Option<NaiveDateTime>>, D::Error> {
    parse_nullable(Option::<String>::deserialize(deserializer)?).map(Some)
}
