//! Property values as they arrive from SiteWise.
//!
//! The wire shape is a struct of optional fields (`doubleValue`, `integerValue`,
//! ...) where at most one is set. It is decoded into [`Variant`] so the rest of
//! the crate can match on the populated kind exhaustively.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Nanoseconds since the Unix epoch, UTC.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[derive(Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn from_secs(secs: i64) -> Result<Self, Error> {
        Self::from_parts(secs, 0)
    }

    pub fn from_parts(secs: i64, nanos: i64) -> Result<Self, Error> {
        secs.checked_mul(NANOS_PER_SEC)
            .and_then(|s| s.checked_add(nanos))
            .map(Timestamp)
            .ok_or(Error::InvalidTimestamp {
                seconds: secs,
                nanos,
            })
    }

    pub fn as_nanos(self) -> i64 {
        self.0
    }

    pub fn saturating_sub_minutes(self, minutes: i64) -> Self {
        Timestamp(
            self.0
                .saturating_sub(minutes.saturating_mul(60 * NANOS_PER_SEC)),
        )
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match arrow::temporal_conversions::timestamp_ns_to_datetime(self.0) {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.fZ")),
            None => write!(f, "{}ns", self.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInNanos {
    pub time_in_seconds: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_in_nanos: Option<i64>,
}

impl TimeInNanos {
    pub fn from_secs(time_in_seconds: i64) -> Self {
        TimeInNanos {
            time_in_seconds,
            offset_in_nanos: None,
        }
    }

    pub fn to_timestamp(self) -> Result<Timestamp, Error> {
        Timestamp::from_parts(self.time_in_seconds, self.offset_in_nanos.unwrap_or(0))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Quality {
    Good,
    Bad,
    Uncertain,
}

impl Quality {
    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Good => "GOOD",
            Quality::Bad => "BAD",
            Quality::Uncertain => "UNCERTAIN",
        }
    }
}

/// One populated scalar of a property value.
#[derive(Clone, Debug, PartialEq)]
pub enum Variant {
    Double(f64),
    Integer(i64),
    String(String),
    Boolean(bool),
}

impl Variant {
    pub fn kind(&self) -> &'static str {
        match self {
            Variant::Double(_) => "double",
            Variant::Integer(_) => "integer",
            Variant::String(_) => "string",
            Variant::Boolean(_) => "boolean",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Double(v) => write!(f, "{v}"),
            Variant::Integer(v) => write!(f, "{v}"),
            Variant::String(v) => f.write_str(v),
            Variant::Boolean(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVariant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    double_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    integer_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    string_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    boolean_value: Option<bool>,
}

impl RawVariant {
    fn into_variant(self) -> Option<Variant> {
        let RawVariant {
            double_value,
            integer_value,
            string_value,
            boolean_value,
        } = self;
        double_value
            .map(Variant::Double)
            .or(integer_value.map(Variant::Integer))
            .or(string_value.map(Variant::String))
            .or(boolean_value.map(Variant::Boolean))
    }
}

impl From<&Variant> for RawVariant {
    fn from(value: &Variant) -> Self {
        let mut raw = RawVariant::default();
        match value {
            Variant::Double(v) => raw.double_value = Some(*v),
            Variant::Integer(v) => raw.integer_value = Some(*v),
            Variant::String(v) => raw.string_value = Some(v.clone()),
            Variant::Boolean(v) => raw.boolean_value = Some(*v),
        }
        raw
    }
}

fn deserialize_variant<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Variant>, D::Error> {
    Ok(Option::<RawVariant>::deserialize(d)?.and_then(RawVariant::into_variant))
}

fn serialize_variant<S: Serializer>(value: &Option<Variant>, s: S) -> Result<S::Ok, S::Error> {
    value.as_ref().map(RawVariant::from).serialize(s)
}

/// A single timestamped measurement of one asset property.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyValue {
    pub timestamp: TimeInNanos,
    #[serde(
        default,
        deserialize_with = "deserialize_variant",
        serialize_with = "serialize_variant"
    )]
    pub value: Option<Variant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,
}

impl PropertyValue {
    pub fn new(timestamp: TimeInNanos, value: Option<Variant>) -> Self {
        PropertyValue {
            timestamp,
            value,
            quality: None,
        }
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = Some(quality);
        self
    }
}
