use serde::{Serializer, Deserializer};
use serde_with::{SerializeAs, DeserializeAs};

use crate::classfile::AccessFlags;

/// `u32` as `"0xCAFEBABE"`.
pub struct Hex32;

impl SerializeAs<u32> for Hex32 {
  fn serialize_as<S: Serializer>(value: &u32, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(format!("0x{:08X}", value).as_str())
  }
}

impl<'de> DeserializeAs<'de, u32> for Hex32 {
  fn deserialize_as<D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let s: String = serde::Deserialize::deserialize(deserializer)?;
    let digits = s.strip_prefix("0x").unwrap_or(&s);
    u32::from_str_radix(digits, 16).map_err(serde::de::Error::custom)
  }
}

/// Access flags as `"0x0021"`.
pub struct Flags;

impl SerializeAs<AccessFlags> for Flags {
  fn serialize_as<S: Serializer>(value: &AccessFlags, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(value.to_string().as_str())
  }
}

impl<'de> DeserializeAs<'de, AccessFlags> for Flags {
  fn deserialize_as<D: Deserializer<'de>>(deserializer: D) -> Result<AccessFlags, D::Error> {
    let s: String = serde::Deserialize::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
  }
}

/// Raw attribute bytes as lower-case hex.
pub struct HexBytes;

impl SerializeAs<Vec<u8>> for HexBytes {
  fn serialize_as<S: Serializer>(value: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(value))
  }
}

impl<'de> DeserializeAs<'de, Vec<u8>> for HexBytes {
  fn deserialize_as<D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let s: String = serde::Deserialize::deserialize(deserializer)?;
    hex::decode(s).map_err(serde::de::Error::custom)
  }
}
