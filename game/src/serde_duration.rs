//! `Duration` as whole milliseconds. Fractional values written by other
//! tools are rounded down.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let millis = value.as_millis().min(u64::MAX as u128) as u64;
    serializer.serialize_u64(millis)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Millis {
    Whole(u64),
    Fractional(f64),
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = match Millis::deserialize(deserializer)? {
        Millis::Whole(ms) => ms,
        Millis::Fractional(ms) if ms.is_finite() && ms > 0.0 => ms.floor() as u64,
        Millis::Fractional(_) => 0,
    };
    Ok(Duration::from_millis(millis))
}
