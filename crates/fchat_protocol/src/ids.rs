#![forbid(unsafe_code)]

//! Identifiers the server sends as either JSON strings or numbers.

use core::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

/// Numeric id that may arrive as `42` or `"42"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FlexId(pub u64);

impl FlexId {
	pub fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for FlexId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl Serialize for FlexId {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u64(self.0)
	}
}

struct FlexIdVisitor;

impl<'de> Visitor<'de> for FlexIdVisitor {
	type Value = FlexId;

	fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str("a non-negative integer or a numeric string")
	}

	fn visit_u64<E: de::Error>(self, v: u64) -> Result<FlexId, E> {
		Ok(FlexId(v))
	}

	fn visit_i64<E: de::Error>(self, v: i64) -> Result<FlexId, E> {
		u64::try_from(v)
			.map(FlexId)
			.map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
	}

	fn visit_f64<E: de::Error>(self, v: f64) -> Result<FlexId, E> {
		if v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 {
			Ok(FlexId(v as u64))
		} else {
			Err(E::invalid_value(de::Unexpected::Float(v), &self))
		}
	}

	fn visit_str<E: de::Error>(self, v: &str) -> Result<FlexId, E> {
		v.trim()
			.parse::<u64>()
			.map(FlexId)
			.map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
	}
}

impl<'de> Deserialize<'de> for FlexId {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		deserializer.deserialize_any(FlexIdVisitor)
	}
}

/// Opaque token that may arrive as a string or a number; kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct FlexString(pub String);

impl FlexString {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for FlexString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

struct FlexStringVisitor;

impl<'de> Visitor<'de> for FlexStringVisitor {
	type Value = FlexString;

	fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str("a string or a number")
	}

	fn visit_u64<E: de::Error>(self, v: u64) -> Result<FlexString, E> {
		Ok(FlexString(v.to_string()))
	}

	fn visit_i64<E: de::Error>(self, v: i64) -> Result<FlexString, E> {
		Ok(FlexString(v.to_string()))
	}

	fn visit_f64<E: de::Error>(self, v: f64) -> Result<FlexString, E> {
		Ok(FlexString(v.to_string()))
	}

	fn visit_str<E: de::Error>(self, v: &str) -> Result<FlexString, E> {
		Ok(FlexString(v.to_string()))
	}

	fn visit_string<E: de::Error>(self, v: String) -> Result<FlexString, E> {
		Ok(FlexString(v))
	}
}

impl<'de> Deserialize<'de> for FlexString {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		deserializer.deserialize_any(FlexStringVisitor)
	}
}
