use crate::knowledge::OverrideVariables;
use crate::record::DocumentRecord;
use serde_json::Value;
use tracing::debug;

/// Force-write every override into the record. Returns how many were written.
///
/// Generated values at the same path are replaced unconditionally.
pub fn apply(record: &mut DocumentRecord, overrides: &OverrideVariables) -> usize {
    let mut written = 0;
    for (path, value) in overrides.iter() {
        let previous = record.get_path(path).and_then(Value::as_str);
        if previous != Some(value) {
            debug!(path, previous = ?previous, value, "Applying override");
        }
        record.set_path(path, Value::String(value.to_string()));
        written += 1;
    }
    written
}
