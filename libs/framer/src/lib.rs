//! Converts AWS IoT SiteWise responses into Arrow time-series frames.
//!
//! A response variant is turned into frames by [`FrameProducer::frames`],
//! which resolves the property's names and declared type through a
//! [`Resolver`], infers the value column type, extracts `(time, value)` rows
//! and assembles them into [`Frame`]s whose first column is always `time`.

pub use error::Error;
pub use frame::{Column, Frame, FrameMeta, Frames, QUALITY_FIELD, TIME_FIELD};
pub use inference::{ColumnType, PropertyDataType, infer_column_type};
pub use producer::{
    AggregateType, AggregatedValue, Aggregates, AssetPropertyAggregates, AssetPropertyValue,
    AssetPropertyValueHistory, BatchAssetPropertyValues, BatchErrorEntry, BatchSuccessEntry,
    FrameProducer, InterpolatedAssetPropertyValues, Response, resolve,
};
pub use resolver::{FramerConfig, PropertyKey, PropertyMetadata, Resolver, StaticResolver};
pub use rows::{Row, extract_row, extract_rows};
pub use value::{PropertyValue, Quality, TimeInNanos, Timestamp, Variant};

pub mod append;
pub mod cache;
mod error;
pub mod frame;
pub mod inference;
pub mod output;
pub mod producer;
pub mod resolver;
pub mod rows;
pub mod trim;
pub mod value;
