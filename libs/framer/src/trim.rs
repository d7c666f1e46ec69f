//! Trimming frames to a time window.
//!
//! Windows are `(from, to]`: a row at exactly `from` is dropped, a row at
//! exactly `to` is kept. With `last_observation` the row just before the
//! window is kept too, so a chart can draw the value carried into it.

use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::value::Timestamp;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AbsoluteTimeRange {
    pub from: Timestamp,
    pub to: Timestamp,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeOrdering {
    #[default]
    Ascending,
    Descending,
}

fn window(
    times: impl Iterator<Item = i64> + Clone,
    len: usize,
    range: AbsoluteTimeRange,
    last_observation: bool,
) -> (usize, usize) {
    let from = range.from.as_nanos();
    let to = range.to.as_nanos();
    let start = match times.clone().position(|t| t > from) {
        None => len,
        Some(i) if last_observation => i.saturating_sub(1),
        Some(i) => i,
    };
    let end = times.clone().position(|t| t > to).unwrap_or(len);
    (start, end.max(start))
}

/// Trims a frame whose rows are in ascending time order.
pub fn trim_frame(frame: &Frame, range: AbsoluteTimeRange, last_observation: bool) -> Frame {
    let times = frame.times();
    let len = frame.len();
    let (start, end) = window(times.values().iter().copied(), len, range, last_observation);
    frame.slice(start, end - start)
}

/// Trims a frame whose rows are in descending time order. The result keeps the
/// descending order.
pub fn trim_frame_reversed(
    frame: &Frame,
    range: AbsoluteTimeRange,
    last_observation: bool,
) -> Frame {
    let times = frame.times();
    let len = frame.len();
    let (start, end) = window(
        times.values().iter().rev().copied(),
        len,
        range,
        last_observation,
    );
    frame.slice(len - end, end - start)
}
