//! Serde helper for u64 seeds that must survive JSON consumers which
//! truncate large integers: serialized as a string, accepted as either.

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum U64Input {
        String(String),
        Number(u64),
    }

    match U64Input::deserialize(deserializer)? {
        U64Input::String(raw) => raw.parse::<u64>().map_err(D::Error::custom),
        U64Input::Number(value) => Ok(value),
    }
}
