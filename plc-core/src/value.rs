//! The tagged scalar carried by every PLC variable.
//!
//! The wire protocol (see `plc-server`) only ever needs four JSON shapes —
//! string, integer, boolean and null — so `Value` is the smallest complete
//! model for them: a tagged union, not an inheritance hierarchy. Equality is
//! derived and therefore variant-sensitive: values of distinct variants are
//! never equal, and `Null` equals only `Null`.

use std::fmt;

/// A PLC variable's value: one of null, string, signed 32-bit integer, or
/// boolean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Str(String),
    Int(i32),
    Bool(bool),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    /// Returns the stored string, or `""` if this value isn't a `Str`.
    /// Callers that care about the distinction should check `is_string`
    /// first — typed getters on a value of the wrong variant never error.
    pub fn get_string(&self) -> &str {
        match self {
            Value::Str(s) => s.as_str(),
            _ => "",
        }
    }

    /// Returns the stored integer, or `0` if this value isn't an `Int`.
    pub fn get_integer(&self) -> i32 {
        match self {
            Value::Int(n) => *n,
            _ => 0,
        }
    }

    /// Returns the stored boolean, or `false` if this value isn't a `Bool`.
    pub fn get_boolean(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            _ => false,
        }
    }

    pub fn set_null(&mut self) {
        *self = Value::Null;
    }

    pub fn set_string(&mut self, value: impl Into<String>) {
        *self = Value::Str(value.into());
    }

    pub fn set_integer(&mut self, value: i32) {
        *self = Value::Int(value);
    }

    pub fn set_boolean(&mut self, value: bool) {
        *self = Value::Bool(value);
    }
}

/// Wire-format conversion to/from a bare JSON scalar: `"x"`, `7`, `true`,
/// `null`. Deliberately not `#[derive(Serialize, Deserialize)]` — a derived
/// enum would serialize as `{"Str": "x"}`, which is not a shape any PLC
/// client should have to know about.
#[cfg(feature = "json")]
mod json_wire {
    use super::Value;

    impl serde::Serialize for Value {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            match self {
                Value::Null => serializer.serialize_none(),
                Value::Str(s) => serializer.serialize_str(s),
                Value::Int(n) => serializer.serialize_i32(*n),
                Value::Bool(b) => serializer.serialize_bool(*b),
            }
        }
    }

    impl<'de> serde::Deserialize<'de> for Value {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            struct ValueVisitor;

            impl<'de> serde::de::Visitor<'de> for ValueVisitor {
                type Value = Value;

                fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str("a string, integer, boolean, or null")
                }

                fn visit_unit<E>(self) -> Result<Value, E> {
                    Ok(Value::Null)
                }

                fn visit_none<E>(self) -> Result<Value, E> {
                    Ok(Value::Null)
                }

                fn visit_str<E>(self, v: &str) -> Result<Value, E> {
                    Ok(Value::Str(v.to_string()))
                }

                fn visit_string<E>(self, v: String) -> Result<Value, E> {
                    Ok(Value::Str(v))
                }

                fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
                    Ok(Value::Bool(v))
                }

                fn visit_i64<E>(self, v: i64) -> Result<Value, E>
                where
                    E: serde::de::Error,
                {
                    i32::try_from(v)
                        .map(Value::Int)
                        .map_err(|_| E::custom(format!("integer {v} out of range for a 32-bit PLC value")))
                }

                fn visit_u64<E>(self, v: u64) -> Result<Value, E>
                where
                    E: serde::de::Error,
                {
                    i32::try_from(v)
                        .map(Value::Int)
                        .map_err(|_| E::custom(format!("integer {v} out of range for a 32-bit PLC value")))
                }

                fn visit_i128<E>(self, _v: i128) -> Result<Value, E> {
                    Ok(Value::Null)
                }

                fn visit_u128<E>(self, _v: u128) -> Result<Value, E> {
                    Ok(Value::Null)
                }

                fn visit_f64<E>(self, _v: f64) -> Result<Value, E> {
                    Ok(Value::Null)
                }

                fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
                where
                    A: serde::de::SeqAccess<'de>,
                {
                    while seq.next_element::<serde::de::IgnoredAny>()?.is_some() {}
                    Ok(Value::Null)
                }

                fn visit_map<A>(self, mut map: A) -> Result<Value, A::Error>
                where
                    A: serde::de::MapAccess<'de>,
                {
                    while map.next_entry::<serde::de::IgnoredAny, serde::de::IgnoredAny>()?.is_some() {}
                    Ok(Value::Null)
                }
            }

            deserializer.deserialize_any(ValueVisitor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_null() {
        assert_eq!(Value::default(), Value::Null);
    }

    #[test]
    fn equality_is_variant_sensitive() {
        assert_ne!(Value::Int(0), Value::Bool(false));
        assert_ne!(Value::Str(String::new()), Value::Null);
        assert_eq!(Value::Null, Value::Null);
        assert_eq!(Value::Int(7), Value::Int(7));
        assert_ne!(Value::Int(7), Value::Int(8));
    }

    #[test]
    fn typed_getters_return_neutral_default_on_mismatch() {
        let v = Value::Bool(true);
        assert_eq!(v.get_string(), "");
        assert_eq!(v.get_integer(), 0);
        assert!(v.get_boolean());
    }

    #[test]
    fn setters_rewrite_variant() {
        let mut v = Value::Int(1);
        v.set_string("hello");
        assert_eq!(v, Value::Str("hello".to_string()));
        v.set_boolean(true);
        assert_eq!(v, Value::Bool(true));
        v.set_null();
        assert_eq!(v, Value::Null);
    }

    #[cfg(feature = "json")]
    #[test]
    fn json_wire_shape_is_a_bare_scalar_not_a_tagged_object() {
        assert_eq!(serde_json::to_string(&Value::Str("hi".into())).unwrap(), "\"hi\"");
        assert_eq!(serde_json::to_string(&Value::Int(42)).unwrap(), "42");
        assert_eq!(serde_json::to_string(&Value::Bool(false)).unwrap(), "false");
        assert_eq!(serde_json::to_string(&Value::Null).unwrap(), "null");
    }

    #[cfg(feature = "json")]
    #[test]
    fn json_wire_rejects_out_of_range_integers() {
        let too_big = serde_json::json!(i64::from(i32::MAX) + 1);
        let result: Result<Value, _> = serde_json::from_value(too_big);
        assert!(result.is_err());
    }

    #[cfg(feature = "json")]
    #[test]
    fn json_wire_deserializes_each_scalar_shape() {
        assert_eq!(serde_json::from_str::<Value>("\"x\"").unwrap(), Value::Str("x".into()));
        assert_eq!(serde_json::from_str::<Value>("7").unwrap(), Value::Int(7));
        assert_eq!(serde_json::from_str::<Value>("true").unwrap(), Value::Bool(true));
        assert_eq!(serde_json::from_str::<Value>("null").unwrap(), Value::Null);
    }
}
