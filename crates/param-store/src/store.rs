//! The parameter tree and its dotted-key accessors.
//!
//! Parameters are a YAML document whose root is a mapping. Nested mappings
//! are blocks; everything else (scalars and lists of scalars) is a leaf
//! addressed by a dotted key such as `drivetrain.left.gain`.

use std::path::Path;

use serde_yml::{Mapping, Value};
use tracing::debug;

use crate::error::StoreError;

/// Separator between key segments.
pub const KEY_SEPARATOR: char = '.';

/// An in-memory hierarchical key/value tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamStore {
    root: Value,
}

impl ParamStore {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            root: Value::Mapping(Mapping::new()),
        }
    }

    /// Load parameters from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be read, and
    /// [`StoreError::Yaml`] or [`StoreError::RootNotMapping`] if its
    /// content is not a parameter document.
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let contents = std::fs::read_to_string(path)?;
        let store = Self::parse(&contents)?;
        debug!(path = %path.display(), leaves = store.keys().len(), "parameter file parsed");
        Ok(store)
    }

    /// Parse parameters from YAML text.
    ///
    /// An empty document is an empty store.
    pub fn parse(text: &str) -> Result<Self, StoreError> {
        let root: Value = serde_yml::from_str(text)?;
        match root {
            Value::Mapping(_) => Ok(Self { root }),
            Value::Null => Ok(Self::new()),
            other => Err(StoreError::RootNotMapping {
                found: kind_name(&other),
            }),
        }
    }

    /// Serialize the whole tree to its transmissible text form.
    ///
    /// [`ParamStore::parse`] of the result yields a store equal to `self`.
    pub fn serialize(&self) -> Result<String, StoreError> {
        Ok(serde_yml::to_string(&self.root)?)
    }

    /// Look up the node at a dotted key.
    ///
    /// Returns blocks as well as leaves.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut node = &self.root;
        for segment in segments(key)? {
            node = node.get(segment)?;
        }
        Some(node)
    }

    /// Render the leaf at a dotted key as text.
    ///
    /// Returns `None` for missing keys, blocks and lists.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null => Some(String::new()),
            _ => None,
        }
    }

    /// Assign a new value to an existing leaf.
    ///
    /// Booleans, numbers and flow lists of scalars (`[1, 2, 3]`) keep their
    /// YAML type, so a number stays a number; any other text is stored
    /// verbatim as a string. Returns the number of entries changed: `1` on
    /// success, `0` when the key does not exist, names a block, or the new
    /// value's shape does not match the leaf (scalar versus list).
    pub fn set_str(&mut self, key: &str, value: &str) -> usize {
        let Some(target) = self.get_mut(key) else {
            debug!(key, "set rejected: no such key");
            return 0;
        };
        let Some(replacement) = coerce(target, value) else {
            debug!(
                key,
                value,
                "set rejected: value does not fit the existing entry"
            );
            return 0;
        };
        *target = replacement;
        1
    }

    /// Every leaf key in dotted form, in document order.
    pub fn keys(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Value::Mapping(map) = &self.root {
            collect_leaf_keys(map, "", &mut out);
        }
        out
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        let mut node = &mut self.root;
        for segment in segments(key)? {
            node = node.get_mut(segment)?;
        }
        Some(node)
    }
}

impl Default for ParamStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a dotted key, rejecting empty keys and empty segments.
fn segments(key: &str) -> Option<Vec<&str>> {
    let parts: Vec<&str> = key.split(KEY_SEPARATOR).collect();
    if parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(parts)
}

/// Build the replacement for `target` from `text`, or `None` if the shapes
/// disagree.
fn coerce(target: &Value, text: &str) -> Option<Value> {
    let parsed = parse_leaf(text);
    let parsed_is_list = matches!(parsed, Value::Sequence(_));
    match target {
        Value::Mapping(_) | Value::Tagged(_) => None,
        Value::Sequence(_) => parsed_is_list.then_some(parsed),
        _ => (!parsed_is_list).then_some(parsed),
    }
}

/// Read set-request text as a leaf value.
///
/// Only booleans, numbers and flow lists of scalars take their YAML type.
/// Everything else, including text with comments or line breaks, is kept
/// byte for byte as a string.
fn parse_leaf(text: &str) -> Value {
    let verbatim = || Value::String(text.to_owned());
    if text.contains(['#', '\n', '\r']) {
        return verbatim();
    }
    let is_list = text.trim_start().starts_with('[');
    match serde_yml::from_str::<Value>(text) {
        Ok(Value::Sequence(items)) if is_list && items.iter().all(is_scalar) => {
            Value::Sequence(items)
        }
        Ok(v @ (Value::Bool(_) | Value::Number(_))) if !is_list => v,
        _ => verbatim(),
    }
}

const fn is_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
    )
}

const fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

fn collect_leaf_keys(map: &Mapping, prefix: &str, out: &mut Vec<String>) {
    for (k, v) in map {
        let Some(name) = k.as_str() else { continue };
        let full = if prefix.is_empty() {
            name.to_owned()
        } else {
            format!("{prefix}{KEY_SEPARATOR}{name}")
        };
        match v {
            Value::Mapping(child) => collect_leaf_keys(child, &full, out),
            _ => out.push(full),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write as _;

    use super::*;

    const SAMPLE: &str = r"
robot:
  name: atlas
  mass: 42
  wheels: [1, 2, 3, 4]
  drivetrain:
    gain: 0.5
    enabled: true
camera:
  fps: 30
";

    const LED: &str = "led:\n  color: red\n  note: x\n  label: y\n";

    fn sample() -> ParamStore {
        ParamStore::parse(SAMPLE).unwrap()
    }

    #[test]
    fn get_by_dotted_key() {
        let store = sample();
        assert_eq!(store.get_str("robot.name").as_deref(), Some("atlas"));
        assert_eq!(store.get_str("robot.mass").as_deref(), Some("42"));
        let enabled = store.get_str("robot.drivetrain.enabled");
        assert_eq!(enabled.as_deref(), Some("true"));
        assert!(store.get("robot.drivetrain").is_some());
        assert!(store.get_str("robot.drivetrain").is_none());
        assert!(store.get("robot.missing").is_none());
        assert!(store.get("").is_none());
        assert!(store.get("robot..name").is_none());
    }

    #[test]
    fn set_existing_scalar_keeps_type() {
        let mut store = sample();
        assert_eq!(store.set_str("camera.fps", "60"), 1);
        assert_eq!(store.get_str("camera.fps").as_deref(), Some("60"));
        assert!(store.get("camera.fps").is_some_and(Value::is_number));
        assert_eq!(store.set_str("robot.name", "hermes"), 1);
        assert_eq!(store.get_str("robot.name").as_deref(), Some("hermes"));
    }

    #[test]
    fn set_missing_key_changes_nothing() {
        let mut store = sample();
        let before = store.clone();
        assert_eq!(store.set_str("robot.badkey", "x"), 0);
        assert_eq!(store.set_str("nothing.here.at.all", "x"), 0);
        assert_eq!(store, before);
    }

    #[test]
    fn set_on_block_is_rejected() {
        let mut store = sample();
        assert_eq!(store.set_str("robot.drivetrain", "7"), 0);
        assert!(store.get("robot.drivetrain.gain").is_some());
    }

    #[test]
    fn list_leaves_only_accept_lists() {
        let mut store = sample();
        assert_eq!(store.set_str("robot.wheels", "5"), 0);
        assert_eq!(store.set_str("robot.wheels", "[5, 6]"), 1);
        assert_eq!(store.set_str("camera.fps", "[1, 2]"), 0);
        let wheels = store.get("robot.wheels").unwrap();
        assert!(wheels.is_sequence());
        let wheels = wheels.as_sequence().unwrap();
        assert_eq!(wheels.len(), 2);
    }

    #[test]
    fn structured_text_on_scalar_is_stored_verbatim() {
        let mut store = sample();
        assert_eq!(store.set_str("robot.name", "a: b"), 1);
        assert_eq!(store.get_str("robot.name").as_deref(), Some("a: b"));
        assert_eq!(store.set_str("robot.name", ""), 1);
        assert_eq!(store.get_str("robot.name").as_deref(), Some(""));
    }

    #[test]
    fn comments_and_line_breaks_are_kept_verbatim() {
        let mut store = ParamStore::parse(LED).unwrap();
        assert_eq!(store.set_str("led.color", "#ff0000"), 1);
        assert_eq!(store.set_str("led.note", "left # right"), 1);
        assert_eq!(store.set_str("led.label", "two\nlines"), 1);
        assert_eq!(store.get_str("led.color").as_deref(), Some("#ff0000"));
        assert_eq!(store.get_str("led.note").as_deref(), Some("left # right"));
        assert_eq!(store.get_str("led.label").as_deref(), Some("two\nlines"));

        let reloaded = ParamStore::parse(&store.serialize().unwrap()).unwrap();
        assert_eq!(reloaded, store);
    }

    #[test]
    fn only_bools_numbers_and_lists_are_typed() {
        let mut store = sample();
        assert_eq!(store.set_str("robot.name", "null"), 1);
        let name = Value::String("null".to_owned());
        assert_eq!(store.get("robot.name"), Some(&name));
        assert_eq!(store.set_str("robot.name", "~"), 1);
        assert_eq!(store.get_str("robot.name").as_deref(), Some("~"));
        assert_eq!(store.set_str("robot.drivetrain.enabled", "false"), 1);
        let enabled = store.get("robot.drivetrain.enabled");
        assert_eq!(enabled, Some(&Value::Bool(false)));
        assert_eq!(store.set_str("robot.wheels", "[1, #2]"), 0);
    }

    #[test]
    fn serialize_round_trips() {
        let mut store = sample();
        let _ = store.set_str("robot.drivetrain.gain", "0.75");
        let text = store.serialize().unwrap();
        assert_eq!(ParamStore::parse(&text).unwrap(), store);
    }

    #[test]
    fn keys_lists_leaves_in_order() {
        let keys = sample().keys();
        assert_eq!(
            keys,
            [
                "robot.name",
                "robot.mass",
                "robot.wheels",
                "robot.drivetrain.gain",
                "robot.drivetrain.enabled",
                "camera.fps",
            ]
        );
    }

    #[test]
    fn empty_document_is_empty_store() {
        let store = ParamStore::parse("").unwrap();
        assert_eq!(store, ParamStore::new());
        assert!(store.keys().is_empty());
    }

    #[test]
    fn non_mapping_root_is_rejected() {
        let result = ParamStore::parse("- 1\n- 2\n");
        assert!(matches!(
            result,
            Err(StoreError::RootNotMapping { found: "list" })
        ));
    }

    #[test]
    fn malformed_yaml_is_rejected() {
        let result = ParamStore::parse("robot: [unclosed\n");
        assert!(matches!(result, Err(StoreError::Yaml { .. })));
    }

    #[test]
    fn from_file_loads_and_reports_missing_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let store = ParamStore::from_file(file.path()).unwrap();
        assert_eq!(store, sample());

        let missing = ParamStore::from_file(Path::new("/nonexistent/params.yaml"));
        assert!(matches!(missing, Err(StoreError::Io { .. })));
    }
}
