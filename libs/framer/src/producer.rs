//! Response variants and the frames they produce.
//!
//! Every variant resolves its property metadata first. Resolution is the only
//! await point; when it fails or the token is cancelled nothing is allocated
//! and the error is returned as is.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::Error;
use crate::frame::{Column, Frame, Frames, QUALITY_FIELD};
use crate::inference::{ColumnType, infer_column_type};
use crate::resolver::{PropertyKey, PropertyMetadata, Resolver};
use crate::rows::{Row, extract_row, extract_rows};
use crate::value::{PropertyValue, Quality, TimeInNanos, Timestamp, Variant};

pub trait FrameProducer {
    fn frames<R: Resolver + Sync>(
        &self,
        resolver: &R,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Frames, Error>> + Send;
}

/// Resolves `key`, giving up as soon as `cancel` fires.
pub async fn resolve<R: Resolver + Sync>(
    resolver: &R,
    key: &PropertyKey,
    cancel: &CancellationToken,
) -> Result<PropertyMetadata, Error> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    debug!(asset_id = %key.asset_id, property_id = %key.property_id, "resolving property");
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        res = resolver.property(key, cancel) => res,
    }
}

fn value_frame(property: &PropertyMetadata, rows: &[Row]) -> Result<Frame, Error> {
    let column_type = infer_column_type(property.data_type, rows.iter().map(|r| r.value.as_ref()));
    Frame::from_rows(&property.asset_name, &property.property_name, column_type, rows)
}

/// `GetAssetPropertyValue`: the latest value of one property.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPropertyValue {
    pub property: PropertyKey,
    #[serde(default)]
    pub property_value: Option<PropertyValue>,
}

impl AssetPropertyValue {
    pub fn rows(&self) -> Result<Vec<Row>, Error> {
        self.property_value.iter().map(extract_row).collect()
    }
}

impl FrameProducer for AssetPropertyValue {
    async fn frames<R: Resolver + Sync>(
        &self,
        resolver: &R,
        cancel: &CancellationToken,
    ) -> Result<Frames, Error> {
        let property = resolve(resolver, &self.property, cancel).await?;
        let rows = self.rows()?;
        Ok(vec![value_frame(&property, &rows)?])
    }
}

/// `GetAssetPropertyValueHistory`: one page of raw values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPropertyValueHistory {
    pub property: PropertyKey,
    #[serde(default)]
    pub asset_property_value_history: Vec<PropertyValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl FrameProducer for AssetPropertyValueHistory {
    async fn frames<R: Resolver + Sync>(
        &self,
        resolver: &R,
        cancel: &CancellationToken,
    ) -> Result<Frames, Error> {
        let property = resolve(resolver, &self.property, cancel).await?;
        let rows = extract_rows(&self.asset_property_value_history)?;
        let column_type =
            infer_column_type(property.data_type, rows.iter().map(|r| r.value.as_ref()));
        let times: Vec<Timestamp> = rows.iter().map(|r| r.time).collect();
        let values = rows.iter().map(|r| r.value.clone()).collect();
        let qualities = rows
            .iter()
            .map(|r| r.quality.map(|q| Variant::String(q.as_str().to_string())))
            .collect();
        let frame = Frame::assemble(
            &property.asset_name,
            &times,
            &[
                Column::new(&property.property_name, column_type, values),
                Column::new(QUALITY_FIELD, ColumnType::String, qualities),
            ],
        )?
        .with_next_token(self.next_token.clone());
        Ok(vec![frame])
    }
}

/// Statistics of one aggregation window. SiteWise reports every statistic as a double.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_deviation: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregateType {
    Average,
    Minimum,
    Maximum,
    Count,
    Sum,
    StandardDeviation,
}

impl AggregateType {
    /// Column order of aggregate frames.
    pub const ALL: [AggregateType; 6] = [
        AggregateType::Average,
        AggregateType::Minimum,
        AggregateType::Maximum,
        AggregateType::Count,
        AggregateType::Sum,
        AggregateType::StandardDeviation,
    ];

    pub fn column_name(self) -> &'static str {
        match self {
            AggregateType::Average => "avg",
            AggregateType::Minimum => "min",
            AggregateType::Maximum => "max",
            AggregateType::Count => "count",
            AggregateType::Sum => "sum",
            AggregateType::StandardDeviation => "stddev",
        }
    }

    pub fn value(self, aggregates: &Aggregates) -> Option<f64> {
        match self {
            AggregateType::Average => aggregates.average,
            AggregateType::Minimum => aggregates.minimum,
            AggregateType::Maximum => aggregates.maximum,
            AggregateType::Count => aggregates.count,
            AggregateType::Sum => aggregates.sum,
            AggregateType::StandardDeviation => aggregates.standard_deviation,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedValue {
    pub timestamp: TimeInNanos,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,
    pub value: Aggregates,
}

/// `GetAssetPropertyAggregates`: one page of aggregation windows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPropertyAggregates {
    pub property: PropertyKey,
    #[serde(default)]
    pub aggregated_values: Vec<AggregatedValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl FrameProducer for AssetPropertyAggregates {
    async fn frames<R: Resolver + Sync>(
        &self,
        resolver: &R,
        cancel: &CancellationToken,
    ) -> Result<Frames, Error> {
        let property = resolve(resolver, &self.property, cancel).await?;
        let times = self
            .aggregated_values
            .iter()
            .map(|v| v.timestamp.to_timestamp())
            .collect::<Result<Vec<_>, _>>()?;
        let columns: Vec<Column> = AggregateType::ALL
            .into_iter()
            .filter(|agg| self.aggregated_values.iter().any(|v| agg.value(&v.value).is_some()))
            .map(|agg| {
                let values = self
                    .aggregated_values
                    .iter()
                    .map(|v| agg.value(&v.value).map(Variant::Double))
                    .collect();
                Column::new(agg.column_name(), ColumnType::Double, values)
            })
            .collect();
        let frame = Frame::assemble(&property.asset_name, &times, &columns)?
            .with_next_token(self.next_token.clone());
        Ok(vec![frame])
    }
}

/// `GetInterpolatedAssetPropertyValues`: values sampled at a fixed interval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpolatedAssetPropertyValues {
    pub property: PropertyKey,
    #[serde(default)]
    pub interpolated_asset_property_values: Vec<PropertyValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl FrameProducer for InterpolatedAssetPropertyValues {
    async fn frames<R: Resolver + Sync>(
        &self,
        resolver: &R,
        cancel: &CancellationToken,
    ) -> Result<Frames, Error> {
        let property = resolve(resolver, &self.property, cancel).await?;
        let rows = extract_rows(&self.interpolated_asset_property_values)?;
        let frame = value_frame(&property, &rows)?.with_next_token(self.next_token.clone());
        Ok(vec![frame])
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSuccessEntry {
    pub entry_id: String,
    pub property: PropertyKey,
    #[serde(default)]
    pub asset_property_value: Option<PropertyValue>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchErrorEntry {
    pub entry_id: String,
    pub error_code: String,
    #[serde(default)]
    pub error_message: String,
}

/// `BatchGetAssetPropertyValue`: latest values of several properties.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAssetPropertyValues {
    #[serde(default)]
    pub success_entries: Vec<BatchSuccessEntry>,
    #[serde(default)]
    pub error_entries: Vec<BatchErrorEntry>,
}

impl FrameProducer for BatchAssetPropertyValues {
    async fn frames<R: Resolver + Sync>(
        &self,
        resolver: &R,
        cancel: &CancellationToken,
    ) -> Result<Frames, Error> {
        for entry in &self.error_entries {
            warn!(entry_id = %entry.entry_id, code = %entry.error_code, "batch entry failed");
        }
        let mut properties = Vec::with_capacity(self.success_entries.len());
        for entry in &self.success_entries {
            properties.push(resolve(resolver, &entry.property, cancel).await?);
        }
        self.success_entries
            .iter()
            .zip(&properties)
            .map(|(entry, property)| {
                let rows = entry
                    .asset_property_value
                    .iter()
                    .map(extract_row)
                    .collect::<Result<Vec<_>, _>>()?;
                value_frame(property, &rows)
            })
            .collect()
    }
}

/// Any response this crate knows how to frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Response {
    PropertyValue(AssetPropertyValue),
    PropertyValueHistory(AssetPropertyValueHistory),
    PropertyAggregate(AssetPropertyAggregates),
    PropertyInterpolated(InterpolatedAssetPropertyValues),
    BatchPropertyValue(BatchAssetPropertyValues),
}

impl FrameProducer for Response {
    async fn frames<R: Resolver + Sync>(
        &self,
        resolver: &R,
        cancel: &CancellationToken,
    ) -> Result<Frames, Error> {
        let frames = match self {
            Response::PropertyValue(r) => r.frames(resolver, cancel).await,
            Response::PropertyValueHistory(r) => r.frames(resolver, cancel).await,
            Response::PropertyAggregate(r) => r.frames(resolver, cancel).await,
            Response::PropertyInterpolated(r) => r.frames(resolver, cancel).await,
            Response::BatchPropertyValue(r) => r.frames(resolver, cancel).await,
        }?;
        debug!(frames = frames.len(), "built frames");
        Ok(frames)
    }
}
