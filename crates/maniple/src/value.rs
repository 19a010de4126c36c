//! value representation
//!
//! A terraform document is reduced to a tree of the following data types
//! - null
//! - boolean (true/false)
//! - integer (signed, i64)
//! - decimal (f64)
//! - string (utf-8)
//! - array ("list" of values)
//! - object (order-preserving "map"/"dictionary", where the key is of type string)
//!
//! Expressions that terraform would only resolve at plan time (references, function calls, ...) are kept as
//! strings in interpolation form, e.g. `var.key` becomes `"${var.key}"`. Quoted templates keep their literal
//! template text.
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};

/// Order-preserving object
pub type Object = indexmap::IndexMap<String, Value>;

/// All possible value types
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Value>),
    Object(Object),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Object member lookup. `None` for missing keys and non-objects.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|object| object.get(key))
    }

    /// Nested object member lookup
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(self, |current, key| current.get(key))
    }

    /// Text form of a scalar. `None` for null, arrays and objects.
    pub fn to_scalar_string(&self) -> Option<String> {
        match self {
            Value::Boolean(value) => Some(value.to_string()),
            Value::Integer(value) => Some(value.to_string()),
            Value::Decimal(value) => Some(value.to_string()),
            Value::String(value) => Some(value.clone()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Deep merge `other` into `self`
    ///
    /// Objects are merged key by key. Anything else that collides is collected into an array, which is how
    /// repeated blocks (`ebs_block_device {}` twice, ...) end up.
    pub fn merge(&mut self, other: Value) {
        match (self, other) {
            (Value::Object(existing), Value::Object(incoming)) => {
                for (key, value) in incoming {
                    match existing.get_mut(&key) {
                        Some(current) => current.merge(value),
                        None => {
                            existing.insert(key, value);
                        }
                    }
                }
            }
            (Value::Array(existing), incoming) => existing.push(incoming),
            (current, incoming) => {
                let previous = std::mem::replace(current, Value::Null);
                *current = Value::Array(vec![previous, incoming]);
            }
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(value) => write!(f, "{value}"),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Decimal(value) => write!(f, "{value}"),
            Value::String(value) => f.write_str(value),
            compound => {
                let rendered = serde_json::to_string(compound).map_err(|_| std::fmt::Error)?;
                f.write_str(&rendered)
            }
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Self::Object(value)
    }
}

impl From<hcl::Expression> for Value {
    fn from(value: hcl::Expression) -> Self {
        use hcl::Expression;

        match value {
            Expression::Null => Value::Null,
            Expression::Bool(bool) => bool.into(),
            Expression::Number(num) => num.into(),
            Expression::String(s) => s.into(),
            Expression::Array(array) => array.into(),
            Expression::Object(object) => object.into(),
            Expression::TemplateExpr(template) => match *template {
                hcl::TemplateExpr::QuotedString(text) => text.into(),
                hcl::TemplateExpr::Heredoc(heredoc) => heredoc.template.into(),
            },
            other => Value::String(interpolation(&other)),
        }
    }
}

/// Render an unevaluated expression as `${...}`
fn interpolation(expr: &hcl::Expression) -> String {
    match hcl::format::to_string(expr) {
        Ok(rendered) => format!("${{{rendered}}}"),
        Err(err) => {
            tracing::debug!(%err, ?expr, "unable to format expression");
            format!("${{{expr:?}}}")
        }
    }
}

impl From<hcl::Number> for Value {
    fn from(value: hcl::Number) -> Self {
        if let Some(int) = value.as_i64() {
            return Value::Integer(int);
        }

        value.as_f64().map_or(Value::Null, Value::Decimal)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl From<hcl::Object<hcl::ObjectKey, hcl::Expression>> for Value {
    fn from(value: hcl::Object<hcl::ObjectKey, hcl::Expression>) -> Self {
        Value::Object(
            value
                .into_iter()
                .map(|(k, v)| (object_key(k), v.into()))
                .collect(),
        )
    }
}

fn object_key(key: hcl::ObjectKey) -> String {
    match key {
        hcl::ObjectKey::Identifier(ident) => ident.to_string(),
        hcl::ObjectKey::Expression(hcl::Expression::String(s)) => s,
        other => other.to_string(),
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn object(entries: &[(&str, Value)]) -> Value {
        Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn merge_objects() {
        let mut value = object(&[("a", object(&[("one", Value::Integer(1))]))]);
        value.merge(object(&[("a", object(&[("two", Value::Integer(2))])), ("b", true.into())]));

        assert_eq!(value.get_path(&["a", "one"]), Some(&Value::Integer(1)));
        assert_eq!(value.get_path(&["a", "two"]), Some(&Value::Integer(2)));
        assert_eq!(value.get("b"), Some(&Value::Boolean(true)));
    }

    #[test]
    fn merge_scalars_collects_array() {
        let mut value = Value::from("first");
        value.merge("second".into());
        value.merge("third".into());

        assert_eq!(
            value,
            Value::Array(vec!["first".into(), "second".into(), "third".into()])
        );
    }

    #[test]
    fn quoted_template_is_kept_verbatim() {
        let template = hcl::TemplateExpr::QuotedString("maniple/${var.version}/app.zip".to_string());
        let value = Value::from(hcl::Expression::TemplateExpr(Box::new(template)));
        assert_eq!(value, Value::from("maniple/${var.version}/app.zip"));
    }

    #[test]
    fn scalar_strings() {
        assert_eq!(Value::Integer(128).to_scalar_string().as_deref(), Some("128"));
        assert_eq!(Value::from("x").to_scalar_string().as_deref(), Some("x"));
        assert_eq!(Value::Null.to_scalar_string(), None);
    }
}
