//! Cache for relative ("now-…") time-series requests.
//!
//! A dashboard refreshing `now-6h` re-requests mostly the same data every
//! time. The cache keeps the frames of the previous response and, for the next
//! request with the same queries and the same relative start, hands back the
//! cached frames trimmed to what is still in range together with a narrower
//! paginating request for the data that is new (always at least the last
//! [`DEFAULT_REFRESH_MINUTES`]).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::frame::{Frame, Frames};
use crate::trim::{AbsoluteTimeRange, TimeOrdering, trim_frame, trim_frame_reversed};
use crate::value::Timestamp;

/// Minutes before `to` that are always requested regardless of the cache.
pub const DEFAULT_REFRESH_MINUTES: i64 = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryType {
    PropertyValue,
    PropertyValueHistory,
    PropertyAggregate,
    PropertyInterpolated,
    ListAssetModels,
    ListAssets,
    ListAssociatedAssets,
    ListAssetProperties,
    ListTimeSeries,
    DescribeAsset,
}

impl QueryType {
    pub fn is_time_series(self) -> bool {
        matches!(
            self,
            QueryType::PropertyValue
                | QueryType::PropertyValueHistory
                | QueryType::PropertyAggregate
                | QueryType::PropertyInterpolated
        )
    }
}

/// Data source instance a query is sent to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceRef {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub uid: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitewiseQuery {
    pub ref_id: String,
    pub query_type: QueryType,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub response_format: Option<String>,
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub asset_ids: Option<Vec<String>>,
    #[serde(default)]
    pub property_id: Option<String>,
    #[serde(default)]
    pub property_alias: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub last_observation: Option<bool>,
    #[serde(default)]
    pub flatten_l4e: Option<bool>,
    #[serde(default)]
    pub max_page_aggregations: Option<u32>,
    #[serde(default)]
    pub datasource: Option<DataSourceRef>,
    #[serde(default)]
    pub time_ordering: Option<TimeOrdering>,
    #[serde(default)]
    pub load_all_children: Option<bool>,
    #[serde(default)]
    pub hierarchy_id: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
}

impl SitewiseQuery {
    pub fn new(ref_id: impl ToString, query_type: QueryType) -> Self {
        SitewiseQuery {
            ref_id: ref_id.to_string(),
            query_type,
            region: None,
            response_format: None,
            asset_id: None,
            asset_ids: None,
            property_id: None,
            property_alias: None,
            quality: None,
            resolution: None,
            last_observation: None,
            flatten_l4e: None,
            max_page_aggregations: None,
            datasource: None,
            time_ordering: None,
            load_all_children: None,
            hierarchy_id: None,
            model_id: None,
            filter: None,
        }
    }

    pub fn ordering(&self) -> TimeOrdering {
        self.time_ordering.unwrap_or_default()
    }

    /// Identity of the query for caching. `ref_id` is left out so renaming a
    /// query keeps its cache.
    pub fn cache_id(&self) -> String {
        let datasource = self.datasource.clone().unwrap_or_default();
        json!([
            self.query_type,
            self.region,
            self.response_format,
            self.asset_id,
            self.asset_ids,
            self.property_id,
            self.property_alias,
            self.quality,
            self.resolution,
            self.last_observation,
            self.flatten_l4e,
            self.max_page_aggregations,
            datasource.kind,
            datasource.uid,
            self.time_ordering,
            self.load_all_children,
            self.hierarchy_id,
            self.model_id,
            self.filter,
        ])
        .to_string()
    }
}

/// Identity of a set of queries, independent of their order.
pub fn queries_cache_id(queries: &[SitewiseQuery]) -> String {
    let mut ids: Vec<String> = queries.iter().map(SitewiseQuery::cache_id).collect();
    ids.sort();
    json!(ids).to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTimeRange {
    pub from: String,
    pub to: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: Timestamp,
    pub to: Timestamp,
    pub raw: RawTimeRange,
}

impl TimeRange {
    pub fn is_relative_from_now(&self) -> bool {
        self.raw.from.starts_with("now") && self.raw.to == "now"
    }

    /// Relative to now and reaching further back than the refresh window.
    pub fn is_cacheable(&self) -> bool {
        self.is_relative_from_now()
            && self.from < self.to.saturating_sub_minutes(DEFAULT_REFRESH_MINUTES)
    }

    /// True if `self` starts with `other`, or starts before it and ends after its start.
    pub fn covers_start_of(&self, other: &TimeRange) -> bool {
        other.from == self.from || (self.from < other.from && other.from < self.to)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub request_id: String,
    pub targets: Vec<SitewiseQuery>,
    pub range: TimeRange,
}

impl QueryRequest {
    pub fn cache_id(&self) -> String {
        json!([self.range.raw.from, queries_cache_id(&self.targets)]).to_string()
    }
}

#[derive(Clone, Debug)]
struct CachedQuery {
    query: SitewiseQuery,
    frame: Frame,
}

#[derive(Clone, Debug)]
struct CacheEntry {
    queries: Vec<CachedQuery>,
    range: TimeRange,
}

/// Frames served from the cache plus the request for the rest.
#[derive(Clone, Debug)]
pub struct CachedResponse {
    /// Ascending frames, to show before the paginating response arrives.
    pub start: Frames,
    /// Descending frames, to append after the paginating response.
    pub end: Frames,
    pub paginating_request: QueryRequest,
}

#[derive(Clone, Debug, Default)]
pub struct RelativeRangeCache {
    entries: HashMap<String, CacheEntry>,
}

impl RelativeRangeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stores the frames of a response. Requests that are not cacheable, and
    /// responses with a frame that cannot be matched to a target, are ignored.
    pub fn set(&mut self, request: &QueryRequest, frames: &[Frame]) {
        if !request.range.is_cacheable() {
            return;
        }
        let targets: HashMap<&str, &SitewiseQuery> = request
            .targets
            .iter()
            .map(|q| (q.ref_id.as_str(), q))
            .collect();
        let mut queries = Vec::with_capacity(frames.len());
        for frame in frames {
            let Some(ref_id) = frame.ref_id.as_deref() else {
                warn!(frame = %frame.name, "response frame without a ref id, not caching");
                return;
            };
            let Some(query) = targets.get(ref_id) else {
                warn!(frame = %frame.name, %ref_id, "response frame without a matching target, not caching");
                return;
            };
            queries.push(CachedQuery {
                query: (*query).clone(),
                frame: frame.clone(),
            });
        }
        let id = request.cache_id();
        debug!(request_id = %request.request_id, frames = queries.len(), "caching response");
        self.entries.insert(
            id,
            CacheEntry {
                queries,
                range: request.range.clone(),
            },
        );
    }

    pub fn get(&self, request: &QueryRequest) -> Option<CachedResponse> {
        if !request.range.is_cacheable() {
            return None;
        }
        let entry = self.entries.get(&request.cache_id())?;
        if !entry.range.covers_start_of(&request.range) {
            return None;
        }

        let paginating_range = paginating_range(&request.range, &entry.range);
        let cache_range = AbsoluteTimeRange {
            from: request.range.from,
            to: paginating_range.from,
        };
        debug!(request_id = %request.request_id, from = %cache_range.from, to = %cache_range.to, "serving from cache");

        let start = entry
            .queries
            .iter()
            .map(|cached| {
                let query = &cached.query;
                if query.ordering() == TimeOrdering::Descending
                    || query.query_type == QueryType::PropertyValue
                {
                    cached.frame.emptied()
                } else if query.query_type.is_time_series() {
                    trim_frame(
                        &cached.frame,
                        cache_range,
                        query.last_observation.unwrap_or(false),
                    )
                } else {
                    cached.frame.clone()
                }
            })
            .collect();
        let end = entry
            .queries
            .iter()
            .filter(|cached| cached.query.ordering() == TimeOrdering::Descending)
            .map(|cached| {
                trim_frame_reversed(
                    &cached.frame,
                    cache_range,
                    cached.query.last_observation.unwrap_or(false),
                )
            })
            .collect();

        let paginating_request = QueryRequest {
            request_id: request.request_id.clone(),
            targets: request
                .targets
                .iter()
                .filter(|q| q.query_type.is_time_series())
                .cloned()
                .collect(),
            range: paginating_range,
        };
        Some(CachedResponse {
            start,
            end,
            paginating_request,
        })
    }
}

/// `[min(cached.to, request.to - refresh window), request.to]`.
fn paginating_range(request: &TimeRange, cached: &TimeRange) -> TimeRange {
    let refresh_from = request.to.saturating_sub_minutes(DEFAULT_REFRESH_MINUTES);
    TimeRange {
        from: cached.to.min(refresh_from),
        to: request.to,
        raw: request.raw.clone(),
    }
}
