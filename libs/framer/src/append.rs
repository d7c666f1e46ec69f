use std::collections::HashMap;

use arrow::compute::concat_batches;

use crate::Error;
use crate::frame::{Frame, Frames};

/// Key under which frames of consecutive pages are considered the same series.
pub fn schema_key(frame: &Frame) -> String {
    let schema = frame.schema();
    let mut key = format!(
        "{}/{}/{}",
        frame.ref_id.as_deref().unwrap_or_default(),
        schema.fields().len(),
        frame.name
    );
    for field in schema.fields() {
        key.push_str(&format!("|{}:{}", field.name(), field.data_type()));
    }
    key
}

/// Appends the rows of `next` onto the frames of `prev` with the same schema key.
///
/// Empty frames are dropped from both sides. Frames of `next` without a match
/// in `prev` are passed through after the merged ones. A merged frame takes the
/// pagination token of the newer page.
pub fn append_matching_frames(prev: Frames, next: Frames) -> Result<Frames, Error> {
    let mut out: Frames = prev.into_iter().filter(|f| !f.is_empty()).collect();
    let by_key: HashMap<String, usize> = out
        .iter()
        .enumerate()
        .map(|(i, f)| (schema_key(f), i))
        .collect();

    for frame in next.into_iter().filter(|f| !f.is_empty()) {
        let Some(&i) = by_key.get(&schema_key(&frame)) else {
            out.push(frame);
            continue;
        };
        let old = &out[i];
        let batch = concat_batches(&old.schema(), [old.batch(), frame.batch()])
            .map_err(|e| Error::SchemaMismatch(e.to_string()))?;
        let mut merged = old.with_batch(batch);
        merged.meta.next_token = frame.meta.next_token;
        out[i] = merged;
    }
    Ok(out)
}
