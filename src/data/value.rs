//! Generic MsgPack value with deferred, checked casts.
//!
//! A [`Value`] holds one decoded MsgPack node without committing to a Rust
//! type. Consumers pull typed data out with [`Value::cast`], which fails with
//! [`BridgeError::TypeMismatch`] instead of truncating or reinterpreting.
//!
//! # Example
//!
//! ```
//! use karabo_bridge_client::codec::MsgPackCodec;
//! use karabo_bridge_client::data::{Value, WireType};
//!
//! let bytes = MsgPackCodec::encode(&300u32).unwrap();
//! let value = MsgPackCodec::decode_value(&bytes).unwrap();
//!
//! assert_eq!(value.wire_type(), WireType::UInt);
//! assert_eq!(value.cast::<u16>().unwrap(), 300);
//! assert!(value.cast::<u8>().is_err()); // would truncate
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_bytes::ByteBuf;

use crate::error::{BridgeError, Result};

/// Wire type of a decoded MsgPack value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Nil,
    Boolean,
    /// Non-negative integer.
    UInt,
    /// Negative integer.
    Int,
    Float32,
    Float64,
    Str,
    Array,
    Map,
    Bin,
    Ext,
}

impl WireType {
    /// Short lowercase name used in summaries and error messages.
    pub fn name(self) -> &'static str {
        match self {
            WireType::Nil => "nil",
            WireType::Boolean => "bool",
            WireType::UInt => "uint",
            WireType::Int => "int",
            WireType::Float32 => "float32",
            WireType::Float64 => "float64",
            WireType::Str => "str",
            WireType::Array => "array",
            WireType::Map => "map",
            WireType::Bin => "bin",
            WireType::Ext => "ext",
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One decoded MsgPack node.
///
/// Non-negative integers are always held as [`Value::UInt`], even when the
/// sender used a signed encoding, so [`Value::Int`] only carries negatives.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Boolean(bool),
    UInt(u64),
    Int(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
    Array(Vec<Value>),
    /// Entries in wire order. Keys may be any value.
    Map(Vec<(Value, Value)>),
    /// Extension type tag and raw data.
    Ext(i8, Vec<u8>),
}

impl Value {
    /// Wire type of this value.
    pub fn wire_type(&self) -> WireType {
        match self {
            Value::Nil => WireType::Nil,
            Value::Boolean(_) => WireType::Boolean,
            Value::UInt(_) => WireType::UInt,
            Value::Int(_) => WireType::Int,
            Value::F32(_) => WireType::Float32,
            Value::F64(_) => WireType::Float64,
            Value::Str(_) => WireType::Str,
            Value::Bin(_) => WireType::Bin,
            Value::Array(_) => WireType::Array,
            Value::Map(_) => WireType::Map,
            Value::Ext(..) => WireType::Ext,
        }
    }

    /// Convert to a concrete Rust type.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::TypeMismatch`] if the held value cannot be
    /// represented as `T` without loss.
    pub fn cast<T: FromValue>(&self) -> Result<T> {
        T::from_value(self)
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Borrow the string if this is a `str` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a string key in a map value. Returns `None` for non-maps.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_key() == Some(key))
            .map(|(_, v)| v)
    }

    /// Interpret this value as a map key.
    ///
    /// Accepts `str` and UTF-8 `bin` keys; Python senders may emit either.
    pub(crate) fn as_key(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Bin(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }
}

/// Checked conversion out of a [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch<T>(expected: &str, value: &Value) -> Result<T> {
    Err(BridgeError::type_mismatch(expected, value.wire_type()))
}

macro_rules! impl_from_value_int {
    ($($t:ty),*) => {$(
        impl FromValue for $t {
            fn from_value(value: &Value) -> Result<Self> {
                let converted = match *value {
                    Value::UInt(v) => <$t>::try_from(v).ok(),
                    Value::Int(v) => <$t>::try_from(v).ok(),
                    _ => None,
                };
                match converted {
                    Some(v) => Ok(v),
                    None => mismatch(stringify!($t), value),
                }
            }
        }
    )*};
}

impl_from_value_int!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match *value {
            Value::Boolean(b) => Ok(b),
            _ => mismatch("bool", value),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self> {
        match *value {
            Value::F32(v) => Ok(v),
            _ => mismatch("f32", value),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match *value {
            Value::F32(v) => Ok(f64::from(v)),
            Value::F64(v) => Ok(v),
            _ => mismatch("f64", value),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            _ => mismatch("string", value),
        }
    }
}

impl FromValue for ByteBuf {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bin(b) => Ok(ByteBuf::from(b.clone())),
            _ => mismatch("bin", value),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Nil => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Array(items) => items.iter().map(T::from_value).collect(),
            _ => mismatch("array", value),
        }
    }
}

fn map_entries<'a, T: FromValue>(
    value: &'a Value,
) -> Result<impl Iterator<Item = Result<(String, T)>> + 'a> {
    let entries = match value {
        Value::Map(entries) => entries,
        _ => return mismatch("map", value),
    };
    Ok(entries.iter().map(|(k, v)| {
        let key = k
            .as_key()
            .ok_or_else(|| BridgeError::type_mismatch("string key", k.wire_type()))?;
        Ok((key.to_string(), T::from_value(v)?))
    }))
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: &Value) -> Result<Self> {
        map_entries(value)?.collect()
    }
}

impl<T: FromValue> FromValue for HashMap<String, T> {
    fn from_value(value: &Value) -> Result<Self> {
        map_entries(value)?.collect()
    }
}

// ============================================================================
// Deserialization
// ============================================================================

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any MsgPack value")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Nil)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Nil)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> std::result::Result<Value, D::Error> {
        Value::deserialize(d)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Boolean(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
        Ok(Value::UInt(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
        match u64::try_from(v) {
            Ok(u) => Ok(Value::UInt(u)),
            Err(_) => Ok(Value::Int(v)),
        }
    }

    fn visit_f32<E: de::Error>(self, v: f32) -> std::result::Result<Value, E> {
        Ok(Value::F32(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
        Ok(Value::F64(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::Str(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::Str(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<Value, E> {
        Ok(Value::Bin(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> std::result::Result<Value, E> {
        Ok(Value::Bin(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        // size_hint comes straight off the wire; don't trust it for allocation.
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Value, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0).min(4096));
        while let Some(entry) = map.next_entry()? {
            entries.push(entry);
        }
        Ok(Value::Map(entries))
    }

    // rmp-serde surfaces extension types as a newtype wrapping (tag, data).
    fn visit_newtype_struct<D: Deserializer<'de>>(
        self,
        d: D,
    ) -> std::result::Result<Value, D::Error> {
        d.deserialize_any(ExtVisitor)
    }
}

struct ExtVisitor;

impl<'de> Visitor<'de> for ExtVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a MsgPack extension (tag, data)")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let tag: i8 = seq
            .next_element()?
            .ok_or_else(|| <A::Error as de::Error>::invalid_length(0, &self))?;
        let data: ByteBuf = seq
            .next_element()?
            .ok_or_else(|| <A::Error as de::Error>::invalid_length(1, &self))?;
        Ok(Value::Ext(tag, data.into_vec()))
    }
}
