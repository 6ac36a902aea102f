//! Structural JSON diff and the persistence patch algebra.
//!
//! Two consumers share this module: the action runner (before/after difference
//! carried on change events, merged handler patches) and the catalog sync
//! engine (field-level patch between a target and a source document).

use serde_json::{Map, Value};

use serde::{Deserialize, Serialize};

/// Kind of change at one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffOp {
    Add,
    Update,
    Remove,
}

/// One entry of a structural difference, addressed by JSON pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub path: String,
    pub op: DiffOp,
    pub value: Option<Value>,
}

impl DiffEntry {
    fn add(path: String, value: Value) -> Self {
        Self { path, op: DiffOp::Add, value: Some(value) }
    }

    fn update(path: String, value: Value) -> Self {
        Self { path, op: DiffOp::Update, value: Some(value) }
    }

    fn remove(path: String) -> Self {
        Self { path, op: DiffOp::Remove, value: None }
    }
}

/// Compute the structural difference between two JSON documents.
///
/// Objects are compared key by key and recursed into; scalars and arrays are
/// compared wholesale. Paths are JSON pointers (`/name`, `/pricing/currency`).
pub fn diff(before: &Value, after: &Value) -> Vec<DiffEntry> {
    let mut out = Vec::new();
    diff_into("", before, after, &mut out);
    out
}

fn diff_into(path: &str, before: &Value, after: &Value, out: &mut Vec<DiffEntry>) {
    match (before, after) {
        (Value::Object(b), Value::Object(a)) => {
            for (key, b_val) in b {
                let child = format!("{path}/{key}");
                match a.get(key) {
                    Some(a_val) => diff_into(&child, b_val, a_val, out),
                    None => out.push(DiffEntry::remove(child)),
                }
            }
            for (key, a_val) in a {
                if !b.contains_key(key) {
                    out.push(DiffEntry::add(format!("{path}/{key}"), a_val.clone()));
                }
            }
        }
        (b, a) => {
            if b != a {
                out.push(DiffEntry::update(path.to_string(), a.clone()));
            }
        }
    }
}

/// Field-level patch converging `target` onto `source`.
///
/// Fields named in `exclude` are target-local bookkeeping and never copied.
/// Fields present only on the target (outside `exclude`) are nulled so a
/// re-run against the patched target is a no-op.
pub fn sync_patch(target: &Value, source: &Value, exclude: &[&str]) -> Patch {
    let mut patch = Patch::new();
    let (Value::Object(target), Value::Object(source)) = (target, source) else {
        return patch;
    };

    for (key, src_val) in source {
        if exclude.contains(&key.as_str()) {
            continue;
        }
        if target.get(key) != Some(src_val) {
            patch.insert(key.clone(), src_val.clone());
        }
    }
    for key in target.keys() {
        if !exclude.contains(&key.as_str()) && !source.contains_key(key) {
            patch.insert(key.clone(), Value::Null);
        }
    }
    patch
}

/// Partial persistence document: the `$set`-style payload of a conditional
/// update.
///
/// Patches from successive actions are shallow-merged key by key; nested
/// object fields of a later patch are merged into, not replaced over, earlier
/// ones. An explicit null sets the field to null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(Map<String, Value>);

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field assignment.
    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.insert(field.into(), value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Merge `other` into this patch, key by key.
    pub fn merge(&mut self, other: Patch) {
        for (key, value) in other.0 {
            match self.0.get_mut(&key) {
                Some(existing) => merge_value(existing, value),
                None => {
                    self.0.insert(key, value);
                }
            }
        }
    }

    /// Merge the patch into a full document.
    pub fn apply_to(&self, doc: &mut Value) {
        if let Value::Object(map) = doc {
            for (key, value) in &self.0 {
                match map.get_mut(key) {
                    Some(existing) => merge_value(existing, value.clone()),
                    None => {
                        map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
    }

    /// Drop every field not named in `fields`.
    pub fn retain_fields(&mut self, fields: &[String]) {
        self.0.retain(|key, _| fields.iter().any(|f| f == key));
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

fn merge_value(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst), Value::Object(src)) => {
            for (key, value) in src {
                match dst.get_mut(&key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        dst.insert(key, value);
                    }
                }
            }
        }
        (dst, src) => *dst = src,
    }
}
