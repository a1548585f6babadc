//! Structured paths into JSON values.
//!
//! A [`JsonPath`] is a sequence of object keys and array indices. Paths are
//! built by walking values, never by parsing strings; the dot/bracket form
//! (`config.servers[0].host`) exists only for display.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JsonPath(Vec<PathSegment>);

impl JsonPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.into()));
        Self(segments)
    }

    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    /// The value at this path, if every segment exists.
    pub fn get<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        self.0.iter().try_fold(value, |current, segment| match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key),
            (PathSegment::Index(idx), Value::Array(items)) => items.get(*idx),
            _ => None,
        })
    }

    /// Write `new_value` at this path, creating containers as needed.
    ///
    /// A segment whose parent has the wrong container type replaces that
    /// parent; arrays are padded with `null`.
    pub fn set(&self, target: &mut Value, new_value: Value) {
        let mut current = target;
        for segment in &self.0 {
            current = match segment {
                PathSegment::Key(key) => {
                    if !current.is_object() {
                        *current = Value::Object(Map::new());
                    }
                    match current {
                        Value::Object(map) => map.entry(key.clone()).or_insert(Value::Null),
                        _ => return,
                    }
                }
                PathSegment::Index(idx) => {
                    if !current.is_array() {
                        *current = Value::Array(Vec::new());
                    }
                    match current {
                        Value::Array(items) => {
                            if items.len() <= *idx {
                                items.resize(*idx + 1, Value::Null);
                            }
                            &mut items[*idx]
                        }
                        _ => return,
                    }
                }
            };
        }
        *current = new_value;
    }

    /// Remove the value at this path. Missing paths are left alone.
    ///
    /// Returns the removed value.
    pub fn remove(&self, target: &mut Value) -> Option<Value> {
        let (last, parents) = self.0.split_last()?;
        let parent = JsonPath(parents.to_vec()).get_mut(target)?;
        match (last, parent) {
            (PathSegment::Key(key), Value::Object(map)) => map.remove(key),
            (PathSegment::Index(idx), Value::Array(items)) if *idx < items.len() => {
                Some(items.remove(*idx))
            }
            _ => None,
        }
    }

    fn get_mut<'v>(&self, value: &'v mut Value) -> Option<&'v mut Value> {
        self.0.iter().try_fold(value, |current, segment| match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map.get_mut(key),
            (PathSegment::Index(idx), Value::Array(items)) => items.get_mut(*idx),
            _ => None,
        })
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("(root)");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{key}")?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

impl Serialize for JsonPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Every leaf path of `value`. Scalars and empty containers are leaves.
pub fn leaf_paths(value: &Value) -> BTreeSet<JsonPath> {
    let mut paths = BTreeSet::new();
    collect_leaves(value, JsonPath::root(), &mut paths);
    paths
}

fn collect_leaves(value: &Value, path: JsonPath, out: &mut BTreeSet<JsonPath>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                collect_leaves(child, path.key(key.as_str()), out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (idx, child) in items.iter().enumerate() {
                collect_leaves(child, path.index(idx), out);
            }
        }
        _ => {
            out.insert(path);
        }
    }
}

/// Whether `value` is an object or array with at least one element.
pub fn is_branch(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => false,
    }
}
