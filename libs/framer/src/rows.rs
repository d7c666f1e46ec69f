use tracing::{Level, trace};

use crate::Error;
use crate::value::{PropertyValue, Quality, Timestamp, Variant};

/// A `(time, value)` pair ready to be written into a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub time: Timestamp,
    pub value: Option<Variant>,
    pub quality: Option<Quality>,
}

impl TryFrom<&PropertyValue> for Row {
    type Error = Error;

    fn try_from(value: &PropertyValue) -> Result<Self, Self::Error> {
        Ok(Row {
            time: value.timestamp.to_timestamp()?,
            value: value.value.clone(),
            quality: value.quality,
        })
    }
}

pub fn extract_row(value: &PropertyValue) -> Result<Row, Error> {
    let row = Row::try_from(value)?;
    trace!(time = %row.time, value = ?row.value, "extracted row");
    Ok(row)
}

/// Extracts rows in source order.
pub fn extract_rows<'a>(
    values: impl IntoIterator<Item = &'a PropertyValue>,
) -> Result<Vec<Row>, Error> {
    let rows = values
        .into_iter()
        .map(Row::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    if tracing::enabled!(Level::TRACE) {
        for row in &rows {
            trace!(time = %row.time, value = ?row.value, "extracted row");
        }
    }
    Ok(rows)
}
