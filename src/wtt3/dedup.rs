use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::wtt3::normalizer::extract_external_id;

/// Collapse records echoed across multiple day slices.
///
/// A multi-day reservation appears once per day in the day feed, so records
/// are keyed by raw external identifier before normalization; the last
/// occurrence in fetch order overwrites earlier ones, bounding the upsert
/// engine to one write per identifier per run. Records without a readable
/// identifier pass through untouched (the normalizer reports those).
///
/// Output preserves first-seen order, which keeps runs deterministic when
/// day fetches complete out of order upstream of an ordered merge.
pub fn latest_by_external_id(records: Vec<Value>) -> Vec<Value> {
    let mut ordered: Vec<Value> = Vec::with_capacity(records.len());
    let mut index_by_id: HashMap<String, usize> = HashMap::new();
    let mut overwritten = 0usize;

    for record in records {
        match extract_external_id(&record) {
            Some(id) => {
                if let Some(&slot) = index_by_id.get(&id) {
                    ordered[slot] = record;
                    overwritten += 1;
                } else {
                    index_by_id.insert(id, ordered.len());
                    ordered.push(record);
                }
            }
            None => ordered.push(record),
        }
    }

    if overwritten > 0 {
        debug!(
            "Deduplicated {} duplicate records down to {}",
            overwritten,
            ordered.len()
        );
    }
    ordered
}
