//! Values recovered from JavaScript literals

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Property name to value mapping of one object literal.
pub type PropertyMap = BTreeMap<String, JsValue>;

/// A JavaScript literal value as far as the shallow parser understands it.
///
/// `null` and `undefined` both become [`JsValue::Null`], which displays as an
/// empty string. Function-valued properties are never captured; they collapse
/// to [`JsValue::Function`].
#[derive(Debug, Clone, PartialEq)]
pub enum JsValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    Object(PropertyMap),
    Array(Vec<JsValue>),
    Function,
}

impl JsValue {
    /// Borrow the value if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Text form used when a property feeds a string field. Objects of the
    /// `{ value: ... }` shape yield their `value` entry.
    pub fn text(&self) -> String {
        match self {
            JsValue::Object(map) => map.get("value").map(JsValue::to_string).unwrap_or_default(),
            other => other.to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            JsValue::Str(s) => Value::String(s.clone()),
            JsValue::Int(n) => Value::from(*n),
            JsValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            JsValue::Bool(b) => Value::Bool(*b),
            JsValue::Null => Value::Null,
            JsValue::Object(map) => Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            JsValue::Array(items) => Value::Array(items.iter().map(JsValue::to_json).collect()),
            JsValue::Function => Value::String("function".to_string()),
        }
    }
}

impl fmt::Display for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Str(s) => f.write_str(s),
            JsValue::Int(n) => write!(f, "{}", n),
            JsValue::Float(x) => write!(f, "{}", x),
            JsValue::Bool(b) => write!(f, "{}", b),
            JsValue::Null => Ok(()),
            JsValue::Function => f.write_str("function"),
            JsValue::Object(_) | JsValue::Array(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl Serialize for JsValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PropertyMap {
        let mut inner = PropertyMap::new();
        inner.insert("value".to_string(), JsValue::Str("latest".to_string()));
        let mut sort = PropertyMap::new();
        sort.insert("sort".to_string(), JsValue::Object(inner));
        let mut root = PropertyMap::new();
        root.insert("filters".to_string(), JsValue::Object(sort));
        root.insert("id".to_string(), JsValue::Str("novel.site".to_string()));
        root
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(JsValue::Null.to_string(), "");
        assert_eq!(JsValue::Function.to_string(), "function");
        assert_eq!(JsValue::Int(42).to_string(), "42");
        assert_eq!(JsValue::Float(4.5).to_string(), "4.5");
        assert_eq!(
            JsValue::Array(vec![JsValue::Int(1), JsValue::Str("a".into())]).to_string(),
            r#"[1,"a"]"#
        );
    }

    #[test]
    fn test_text_form() {
        let mut wrapped = PropertyMap::new();
        wrapped.insert("value".to_string(), JsValue::Str("en".into()));
        assert_eq!(JsValue::Object(wrapped).text(), "en");
        assert_eq!(JsValue::Object(PropertyMap::new()).text(), "");
        assert_eq!(JsValue::Int(3).text(), "3");
    }

    #[test]
    fn test_serializes_as_plain_json() {
        let json = serde_json::to_value(JsValue::Object(sample())).unwrap();
        assert_eq!(json["filters"]["sort"]["value"], "latest");
    }
}
