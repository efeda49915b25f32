use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Mapping type used for `Value::Object`.
pub type ValueMap = BTreeMap<String, Value>;

/// Tree of values written to and read from the realtime store.
///
/// Mirrors the JSON data model of the store, plus `Absent`: a marker for
/// "not provided" that is distinct from an explicit `Null`. The store itself
/// cannot represent `Absent`; writes strip it (see `blaze_core::sanitize`) and
/// serialization skips it.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    /// Not provided. Never produced by deserialization.
    #[default]
    Absent,
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(ValueMap),
}

impl Value {
    /// Build an object from key/value pairs.
    pub fn object<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// An object with no entries.
    pub fn empty_object() -> Self {
        Value::Object(ValueMap::new())
    }

    /// Create a Value from a serde_json::Value
    pub fn from_json_value(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    // u64 above i64::MAX and non-integral numbers
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Value::from_json_value).collect())
            }
            serde_json::Value::Object(obj) => Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (k, Value::from_json_value(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to serde_json::Value.
    ///
    /// Returns `None` for `Absent`. Absent entries nested inside objects and
    /// arrays are skipped.
    pub fn into_json_value(self) -> Option<serde_json::Value> {
        match self {
            Value::Absent => None,
            Value::Null => Some(serde_json::Value::Null),
            Value::Boolean(b) => Some(serde_json::Value::Bool(b)),
            Value::Integer(i) => Some(serde_json::Value::Number(i.into())),
            Value::Float(f) => Some(
                serde_json::Number::from_f64(f)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
            ),
            Value::String(s) => Some(serde_json::Value::String(s)),
            Value::Array(arr) => Some(serde_json::Value::Array(
                arr.into_iter().filter_map(Value::into_json_value).collect(),
            )),
            Value::Object(obj) => Some(serde_json::Value::Object(
                obj.into_iter()
                    .filter_map(|(k, v)| v.into_json_value().map(|v| (k, v)))
                    .collect(),
            )),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value is an array or an object.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ValueMap> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut ValueMap> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Look up a key of an object. `None` for non-objects and missing keys.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|obj| obj.get(key))
    }

    /// Child at one path segment: an object key, or a numeric array index.
    pub fn child(&self, segment: &str) -> Option<&Value> {
        match self {
            Value::Object(obj) => obj.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Follow a `/`-separated path through nested objects and arrays.
    ///
    /// Empty segments are ignored, so `"a//b/"` is the same as `"a/b"`.
    pub fn pointer(&self, path: &str) -> Option<&Value> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |current, segment| current.child(segment))
    }

    /// The form the store keeps: `Null`, `Absent` and empty objects or
    /// arrays store nothing and become `None`, recursively.
    pub fn into_stored(self) -> Option<Value> {
        match self {
            Value::Absent | Value::Null => None,
            Value::Object(entries) => {
                let entries: ValueMap = entries
                    .into_iter()
                    .filter_map(|(key, child)| child.into_stored().map(|child| (key, child)))
                    .collect();
                (!entries.is_empty()).then_some(Value::Object(entries))
            }
            Value::Array(items) => (!items.is_empty()).then_some(Value::Array(items)),
            other => Some(other),
        }
    }

    /// Replace the value at a `/`-separated path the way the store does.
    ///
    /// Writing something that stores nothing (see [`into_stored`](Self::into_stored))
    /// deletes the location, and objects left empty are removed up to the
    /// root. A tree with nothing left is `Null`.
    pub fn set_path(&mut self, path: &str, value: Value) {
        let location: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        write_at(self, &location, value.into_stored());
    }

    /// Human-readable name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Absent => "absent",
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

fn write_at(node: &mut Value, location: &[&str], value: Option<Value>) {
    let Some((head, rest)) = location.split_first() else {
        *node = value.unwrap_or(Value::Null);
        return;
    };

    if let Value::Array(items) = node {
        match head.parse::<usize>() {
            Ok(index) if index <= items.len() => {
                write_at_index(items, index, rest, value);
                if items.is_empty() {
                    *node = Value::Null;
                }
                return;
            }
            // Arrays are numeric-keyed objects to the store; any other key
            // turns this one back into an object.
            _ if value.is_some() => {
                let entries = std::mem::take(items)
                    .into_iter()
                    .enumerate()
                    .filter(|(_, item)| !item.is_null())
                    .map(|(i, item)| (i.to_string(), item))
                    .collect();
                *node = Value::Object(entries);
            }
            _ => return,
        }
    }

    if node.as_object().is_none() {
        if value.is_none() {
            return;
        }
        *node = Value::empty_object();
    }

    if let Some(children) = node.as_object_mut() {
        let child = children.entry(head.to_string()).or_insert(Value::Null);
        write_at(child, rest, value);
        if child.is_null() {
            children.remove(*head);
        }
        if children.is_empty() {
            *node = Value::Null;
        }
    }
}

/// Write below `items[index]`, where `index` is at most one past the end.
/// Removed elements leave `Null` in place except at the end, which shrinks.
fn write_at_index(items: &mut Vec<Value>, index: usize, rest: &[&str], value: Option<Value>) {
    if index == items.len() {
        if value.is_none() {
            return;
        }
        items.push(Value::Null);
    }
    write_at(&mut items[index], rest, value);
    while items.last().is_some_and(Value::is_null) {
        items.pop();
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            // A bare absent value has no JSON form; null is the closest.
            Value::Absent | Value::Null => serializer.serialize_unit(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let present = items.iter().filter(|v| !v.is_absent()).count();
                let mut seq = serializer.serialize_seq(Some(present))?;
                for item in items.iter().filter(|v| !v.is_absent()) {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(obj) => {
                let present = obj.values().filter(|v| !v.is_absent()).count();
                let mut map = serializer.serialize_map(Some(present))?;
                for (k, v) in obj.iter().filter(|(_, v)| !v.is_absent()) {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from_json_value)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<u32> for Value {
    fn from(u: u32) -> Self {
        Value::Integer(u as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T> From<Vec<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(|x| x.into()).collect())
    }
}

/// `None` becomes `Absent`, not `Null`: an unset optional field is "not
/// provided". Use `Value::Null` explicitly to clear a location.
impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Absent,
        }
    }
}

impl From<ValueMap> for Value {
    fn from(map: ValueMap) -> Self {
        Value::Object(map)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::from_json_value(v)
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        v.into_json_value().unwrap_or(serde_json::Value::Null)
    }
}
