//! The output document: a JSON object keyed by section field name.
//!
//! Fields are addressed with dotted paths. Numeric segments index into
//! arrays, so `key_ambassadors.0.name` is the name of the first ambassador.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The synthesized briefing document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentRecord(Map<String, Value>);

impl DocumentRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up a dotted path.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.0.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Mutable lookup of a dotted path.
    pub fn get_path_mut(&mut self, path: &str) -> Option<&mut Value> {
        let mut segments = path.split('.');
        let mut current = self.0.get_mut(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get_mut(segment)?,
                Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Write `value` at a dotted path, creating intermediate containers.
    ///
    /// A numeric segment creates an array, anything else an object. An
    /// intermediate value of the wrong shape is replaced. Arrays shorter
    /// than the index are padded with empty objects.
    pub fn set_path(&mut self, path: &str, value: Value) {
        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        let Some((first, rest)) = segments.split_first() else {
            return;
        };
        if rest.is_empty() {
            self.0.insert(first.to_string(), value);
            return;
        }
        let slot = self
            .0
            .entry(first.to_string())
            .or_insert_with(|| empty_container_for(rest[0]));
        set_in(slot, rest, value);
    }

    /// Merge a generated section object, keeping only keys the section owns.
    ///
    /// Returns the keys actually merged. Foreign keys are dropped so a
    /// section can never overwrite another section's fields.
    pub fn merge_section(&mut self, owned_keys: &[&str], object: Map<String, Value>) -> Vec<String> {
        let mut merged = Vec::new();
        for (key, value) in object {
            if owned_keys.contains(&key.as_str()) {
                self.0.insert(key.clone(), value);
                merged.push(key);
            }
        }
        merged
    }

    /// Required field paths that are absent or null.
    pub fn missing_required(&self) -> Vec<String> {
        crate::normalize::required::required_paths()
            .filter(|path| self.get_path(path).is_none_or(Value::is_null))
            .collect()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for DocumentRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn empty_container_for(segment: &str) -> Value {
    if segment.parse::<usize>().is_ok() {
        Value::Array(Vec::new())
    } else {
        Value::Object(Map::new())
    }
}

fn set_in(current: &mut Value, segments: &[&str], value: Value) {
    let Some((segment, rest)) = segments.split_first() else {
        *current = value;
        return;
    };

    if let Ok(index) = segment.parse::<usize>() {
        if !current.is_array() {
            *current = Value::Array(Vec::new());
        }
        if let Value::Array(items) = current {
            while items.len() <= index {
                items.push(Value::Object(Map::new()));
            }
            match rest.first() {
                None => items[index] = value,
                Some(next) => {
                    if !is_container_for(&items[index], next) {
                        items[index] = empty_container_for(next);
                    }
                    set_in(&mut items[index], rest, value);
                }
            }
        }
        return;
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        match rest.first() {
            None => {
                map.insert(segment.to_string(), value);
            }
            Some(next) => {
                let slot = map
                    .entry(segment.to_string())
                    .or_insert_with(|| empty_container_for(next));
                if !is_container_for(slot, next) {
                    *slot = empty_container_for(next);
                }
                set_in(slot, rest, value);
            }
        }
    }
}

fn is_container_for(value: &Value, next_segment: &str) -> bool {
    if next_segment.parse::<usize>().is_ok() {
        value.is_array()
    } else {
        value.is_object()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> DocumentRecord {
        match value {
            Value::Object(map) => DocumentRecord::from_map(map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_get_path_nested() {
        let rec = record(json!({
            "embassy": {"ambassador_name": "A"},
            "key_ambassadors": [{"name": "B"}]
        }));
        assert_eq!(rec.get_path("embassy.ambassador_name"), Some(&json!("A")));
        assert_eq!(rec.get_path("key_ambassadors.0.name"), Some(&json!("B")));
        assert_eq!(rec.get_path("key_ambassadors.1.name"), None);
        assert_eq!(rec.get_path("embassy.ambassador_name.x"), None);
    }

    #[test]
    fn test_set_path_creates_containers() {
        let mut rec = DocumentRecord::new();
        rec.set_path("key_ambassadors.0.name", json!("Princess Reema"));
        rec.set_path("embassy.phone", json!("(202) 342-3800"));
        assert_eq!(
            rec.into_value(),
            json!({
                "key_ambassadors": [{"name": "Princess Reema"}],
                "embassy": {"phone": "(202) 342-3800"}
            })
        );
    }

    #[test]
    fn test_set_path_replaces_wrong_shape() {
        let mut rec = record(json!({"embassy": "NOT FOUND", "prayer_times": {}}));
        rec.set_path("embassy.ambassador_name", json!("X"));
        rec.set_path("prayer_times.1.fajr", json!("05:18"));
        assert_eq!(rec.get_path("embassy.ambassador_name"), Some(&json!("X")));
        assert_eq!(
            rec.get("prayer_times"),
            Some(&json!([{}, {"fajr": "05:18"}]))
        );
    }

    #[test]
    fn test_set_path_overwrites_existing_leaf() {
        let mut rec = record(json!({"country_info": {"head_of_state": "Old", "capital": "C"}}));
        rec.set_path("country_info.head_of_state", json!("New"));
        assert_eq!(
            rec.get("country_info"),
            Some(&json!({"head_of_state": "New", "capital": "C"}))
        );
    }

    #[test]
    fn test_merge_section_drops_foreign_keys() {
        let mut rec = DocumentRecord::new();
        let object = json!({"weather": [], "speakers": ["x"]});
        let merged = rec.merge_section(&["weather"], object.as_object().unwrap().clone());
        assert_eq!(merged, vec!["weather".to_string()]);
        assert!(rec.contains_key("weather"));
        assert!(!rec.contains_key("speakers"));
    }

    #[test]
    fn test_missing_required_on_empty_record() {
        let missing = DocumentRecord::new().missing_required();
        assert!(missing.contains(&"executive_summary".to_string()));
        assert!(missing.contains(&"embassy.ambassador_name".to_string()));
    }

    #[test]
    fn test_serde_transparent() {
        let rec = record(json!({"a": 1}));
        assert_eq!(serde_json::to_string(&rec).unwrap(), r#"{"a":1}"#);
    }
}
