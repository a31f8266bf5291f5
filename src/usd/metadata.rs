//! Ordered key/value metadata for prims, layers and dictionaries.
//!
//! Metadata entries are few per node, so they live in a small inline vector
//! and keep insertion order for stable output.

use smallvec::SmallVec;

use super::Value;

/// Metadata storage - ordered key/value pairs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetaData {
    entries: SmallVec<[(String, Value); 4]>,
}

impl MetaData {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing an existing entry in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        for (k, v) in &mut self.entries {
            if *k == key {
                *v = value;
                return;
            }
        }
        self.entries.push((key, value));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Text value of a token/string entry.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overlay `other` on top of this set; `other` wins on conflicts.
    pub fn merge_from(&mut self, other: &MetaData) {
        for (k, v) in other.iter() {
            self.set(k, v.clone());
        }
    }

    // === Common prim metadata keys ===

    pub const KIND: &'static str = "kind";
    pub const DISPLAY_NAME: &'static str = "displayName";
    pub const INSTANCEABLE: &'static str = "instanceable";
    pub const INTERPOLATION: &'static str = "interpolation";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut md = MetaData::new();
        md.set(MetaData::KIND, "component");
        md.set(MetaData::DISPLAY_NAME, Value::string("Body 1"));
        md.set(MetaData::KIND, "assembly");
        assert_eq!(md.len(), 2);
        assert_eq!(md.get_str(MetaData::KIND), Some("assembly"));
        assert_eq!(md.iter().next().unwrap().0, "kind");
    }

    #[test]
    fn test_merge() {
        let mut weak = MetaData::new();
        weak.set("a", 1);
        weak.set("b", 2);
        let mut strong = MetaData::new();
        strong.set("b", 3);
        weak.merge_from(&strong);
        assert_eq!(weak.get("b"), Some(&Value::Int(3)));
        assert!(weak.remove("a").is_some());
        assert!(!weak.contains("a"));
    }
}
