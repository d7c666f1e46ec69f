//! Frames: named Arrow record batches whose first column is `time`.

use std::sync::Arc;

use arrow::{
    array::{
        Array, ArrayRef, AsArray, BooleanBuilder, Float64Builder, Int64Builder, RecordBatch,
        StringBuilder, TimestampNanosecondArray, TimestampNanosecondBuilder,
    },
    datatypes::{Field, Schema, SchemaRef, TimestampNanosecondType},
};
use tracing::warn;

use crate::Error;
use crate::inference::{ColumnType, TIME_ZONE, time_data_type};
use crate::rows::Row;
use crate::value::{Timestamp, Variant};

pub const TIME_FIELD: &str = "time";
pub const QUALITY_FIELD: &str = "quality";

pub type Frames = Vec<Frame>;

/// Custom frame metadata passed through to the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameMeta {
    /// Pagination token of the response the frame was built from.
    pub next_token: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub name: String,
    pub ref_id: Option<String>,
    pub meta: FrameMeta,
    batch: RecordBatch,
}

/// A value column waiting to be written into a frame.
#[derive(Clone, Debug)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub values: Vec<Option<Variant>>,
}

impl Column {
    pub fn new(name: impl ToString, column_type: ColumnType, values: Vec<Option<Variant>>) -> Self {
        Column {
            name: name.to_string(),
            column_type,
            values,
        }
    }

    fn as_array(&self, len: usize) -> Result<(Field, ArrayRef), Error> {
        if self.values.len() != len {
            return Err(Error::ColumnLengthMismatch {
                column: self.name.clone(),
                expected: len,
                actual: self.values.len(),
            });
        }
        let array: ArrayRef = match self.column_type {
            ColumnType::Double => {
                let mut builder = Float64Builder::with_capacity(len);
                for value in &self.values {
                    match self.checked(value) {
                        Some(Variant::Double(v)) => builder.append_value(*v),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            ColumnType::Integer => {
                let mut builder = Int64Builder::with_capacity(len);
                for value in &self.values {
                    match self.checked(value) {
                        Some(Variant::Integer(v)) => builder.append_value(*v),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            ColumnType::String => {
                let mut builder = StringBuilder::with_capacity(len, len * 8);
                for value in &self.values {
                    match self.checked(value) {
                        Some(Variant::String(v)) => builder.append_value(v),
                        Some(other) => builder.append_value(other.to_string()),
                        None => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            ColumnType::Boolean => {
                let mut builder = BooleanBuilder::with_capacity(len);
                for value in &self.values {
                    match self.checked(value) {
                        Some(Variant::Boolean(v)) => builder.append_value(*v),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            ColumnType::Time => {
                let mut builder = TimestampNanosecondBuilder::with_capacity(len);
                for value in &self.values {
                    match self.checked(value) {
                        Some(Variant::Integer(v)) => builder.append_value(*v),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish().with_timezone(TIME_ZONE))
            }
        };
        let field = Field::new(self.name.clone(), self.column_type.data_type(), true);
        Ok((field, array))
    }

    fn checked<'a>(&self, value: &'a Option<Variant>) -> Option<&'a Variant> {
        let value = value.as_ref()?;
        if !self.column_type.accepts(value) {
            warn!(
                column = %self.name,
                expected = ?self.column_type,
                found = value.kind(),
                "value does not match column type, storing null"
            );
            return None;
        }
        Some(value)
    }
}

fn time_array(times: &[Timestamp]) -> ArrayRef {
    let mut builder = TimestampNanosecondBuilder::with_capacity(times.len());
    for time in times {
        builder.append_value(time.as_nanos());
    }
    Arc::new(builder.finish().with_timezone(TIME_ZONE))
}

impl Frame {
    /// Builds a frame from a time column and value columns of the same length.
    pub fn assemble(
        name: impl ToString,
        times: &[Timestamp],
        columns: &[Column],
    ) -> Result<Self, Error> {
        let len = times.len();
        let mut fields = Vec::with_capacity(columns.len() + 1);
        let mut arrays = Vec::with_capacity(columns.len() + 1);
        fields.push(Field::new(TIME_FIELD, time_data_type(), false));
        arrays.push(time_array(times));
        for column in columns {
            let (field, array) = column.as_array(len)?;
            fields.push(field);
            arrays.push(array);
        }
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
        Ok(Frame {
            name: name.to_string(),
            ref_id: None,
            meta: FrameMeta::default(),
            batch,
        })
    }

    /// Builds the two column `time` / value frame used by single property responses.
    pub fn from_rows(
        name: impl ToString,
        value_column: impl ToString,
        column_type: ColumnType,
        rows: &[Row],
    ) -> Result<Self, Error> {
        let times: Vec<Timestamp> = rows.iter().map(|r| r.time).collect();
        let values = rows.iter().map(|r| r.value.clone()).collect();
        Self::assemble(name, &times, &[Column::new(value_column, column_type, values)])
    }

    /// Wraps an existing batch. Column 0 must be the nanosecond `time` column.
    pub fn from_batch(name: impl ToString, batch: RecordBatch) -> Result<Self, Error> {
        let schema = batch.schema();
        let time_ok = schema
            .fields()
            .first()
            .is_some_and(|f| f.name() == TIME_FIELD && *f.data_type() == time_data_type());
        if !time_ok {
            return Err(Error::SchemaMismatch(format!(
                "first column must be {TIME_FIELD:?} of type {}",
                time_data_type()
            )));
        }
        Ok(Frame {
            name: name.to_string(),
            ref_id: None,
            meta: FrameMeta::default(),
            batch,
        })
    }

    pub fn with_ref_id(mut self, ref_id: impl ToString) -> Self {
        self.ref_id = Some(ref_id.to_string());
        self
    }

    pub fn with_next_token(mut self, next_token: Option<String>) -> Self {
        self.meta.next_token = next_token;
        self
    }

    pub fn len(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    pub fn times(&self) -> &TimestampNanosecondArray {
        self.batch.column(0).as_primitive::<TimestampNanosecondType>()
    }

    /// Same frame with rows `offset..offset + len`.
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        Frame {
            name: self.name.clone(),
            ref_id: self.ref_id.clone(),
            meta: self.meta.clone(),
            batch: self.batch.slice(offset, len),
        }
    }

    /// Same schema and names, no rows.
    pub fn emptied(&self) -> Self {
        self.slice(0, 0)
    }

    pub(crate) fn with_batch(&self, batch: RecordBatch) -> Self {
        Frame {
            name: self.name.clone(),
            ref_id: self.ref_id.clone(),
            meta: self.meta.clone(),
            batch,
        }
    }

    pub fn null_count(&self, column: &str) -> Option<usize> {
        self.column(column).map(|c| c.null_count())
    }
}

impl From<Frame> for RecordBatch {
    fn from(frame: Frame) -> Self {
        frame.batch
    }
}
