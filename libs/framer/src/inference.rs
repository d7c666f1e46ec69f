use std::sync::Arc;

use arrow::datatypes::{DataType, TimeUnit};
use serde::{Deserialize, Serialize};

use crate::value::Variant;

/// Offset form of UTC, formattable without a timezone database.
pub const TIME_ZONE: &str = "+00:00";

/// Data type declared on an asset property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PropertyDataType {
    Double,
    Integer,
    String,
    Boolean,
    Struct,
}

/// Semantic type of a frame column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Double,
    Integer,
    String,
    Boolean,
    Time,
}

impl ColumnType {
    pub fn data_type(self) -> DataType {
        match self {
            ColumnType::Double => DataType::Float64,
            ColumnType::Integer => DataType::Int64,
            ColumnType::String => DataType::Utf8,
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Time => time_data_type(),
        }
    }

    /// Time columns hold integer nanoseconds. String columns hold any value
    /// as its text form.
    pub fn accepts(self, value: &Variant) -> bool {
        matches!(
            (self, value),
            (ColumnType::Double, Variant::Double(_))
                | (ColumnType::Integer, Variant::Integer(_))
                | (ColumnType::String, _)
                | (ColumnType::Boolean, Variant::Boolean(_))
                | (ColumnType::Time, Variant::Integer(_))
        )
    }
}

pub fn time_data_type() -> DataType {
    DataType::Timestamp(TimeUnit::Nanosecond, Some(Arc::from(TIME_ZONE)))
}

impl From<PropertyDataType> for ColumnType {
    fn from(value: PropertyDataType) -> Self {
        match value {
            PropertyDataType::Double => ColumnType::Double,
            PropertyDataType::Integer => ColumnType::Integer,
            PropertyDataType::Boolean => ColumnType::Boolean,
            PropertyDataType::String | PropertyDataType::Struct => ColumnType::String,
        }
    }
}

impl From<&Variant> for ColumnType {
    fn from(value: &Variant) -> Self {
        match value {
            Variant::Double(_) => ColumnType::Double,
            Variant::Integer(_) => ColumnType::Integer,
            Variant::String(_) => ColumnType::String,
            Variant::Boolean(_) => ColumnType::Boolean,
        }
    }
}

/// Picks the column type for a set of values.
///
/// A declared type wins. Otherwise every populated value is looked at: when
/// they all share a kind that kind is used, and mixed kinds fall back to
/// `String` so each value is kept as text. A column with no populated value at
/// all is also `String`, carried as all-null.
pub fn infer_column_type<'a>(
    declared: Option<PropertyDataType>,
    values: impl IntoIterator<Item = Option<&'a Variant>>,
) -> ColumnType {
    if let Some(declared) = declared {
        return declared.into();
    }
    let mut kinds = values.into_iter().flatten().map(ColumnType::from);
    let Some(first) = kinds.next() else {
        return ColumnType::String;
    };
    if kinds.all(|kind| kind == first) {
        first
    } else {
        ColumnType::String
    }
}
