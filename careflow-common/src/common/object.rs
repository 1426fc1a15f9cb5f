use std::collections::HashMap;

use crate::prelude::{fmt_err, CareResult, ErrorCode, InlineStr};

/// A process variable value. Each variant maps to exactly one engine type tag, so a value decoded
/// from the wire encodes back to the same tag.
#[derive(Clone, Debug, PartialEq)]
pub enum Object {
    Int(i32),
    Long(i64),
    Double(f64),
    Boolean(bool),
    String(InlineStr),
    Json(serde_json::Value),
    Null,
}

impl Object {
    pub const TYPE_STRING: &'static str = "String";
    pub const TYPE_INTEGER: &'static str = "Integer";
    pub const TYPE_LONG: &'static str = "Long";
    pub const TYPE_DOUBLE: &'static str = "Double";
    pub const TYPE_BOOLEAN: &'static str = "Boolean";
    pub const TYPE_JSON: &'static str = "Json";
    pub const TYPE_NULL: &'static str = "Null";

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Int(_) => Self::TYPE_INTEGER,
            Object::Long(_) => Self::TYPE_LONG,
            Object::Double(_) => Self::TYPE_DOUBLE,
            Object::Boolean(_) => Self::TYPE_BOOLEAN,
            Object::String(_) => Self::TYPE_STRING,
            Object::Json(_) => Self::TYPE_JSON,
            Object::Null => Self::TYPE_NULL,
        }
    }

    pub fn as_bool(&self) -> CareResult<bool> {
        match self {
            Self::Boolean(v) => Ok(*v),
            _ => fmt_err!(IllegalArgument, "not a bool {:?}", self),
        }
    }

    pub fn as_string(&self) -> CareResult<&InlineStr> {
        match self {
            Self::String(v) => Ok(v),
            _ => fmt_err!(IllegalArgument, "not a string {:?}", self),
        }
    }

    /// Integral view of the value. Doubles qualify only when they carry no fraction, and numeric
    /// strings are accepted because engines often store codes as text.
    pub fn as_i64(&self) -> CareResult<i64> {
        match self {
            Self::Int(v) => Ok(*v as i64),
            Self::Long(v) => Ok(*v),
            Self::Double(v) if v.fract() == 0.0 && v.is_finite() => Ok(*v as i64),
            Self::String(v) => Ok(v.trim().parse::<i64>()?),
            _ => fmt_err!(IllegalArgument, "not an integer {:?}", self),
        }
    }

    pub fn as_f64(&self) -> CareResult<f64> {
        match self {
            Self::Int(v) => Ok(*v as f64),
            Self::Long(v) => Ok(*v as f64),
            Self::Double(v) => Ok(*v),
            Self::String(v) => Ok(v.trim().parse::<f64>()?),
            _ => fmt_err!(IllegalArgument, "not a number {:?}", self),
        }
    }

    /// Structured view of the value; `Json` variables and any other value through `to_json`.
    pub fn as_json(&self) -> serde_json::Value {
        self.to_json()
    }

    pub fn to_string(&self) -> InlineStr {
        match self {
            Object::Int(v) => v.to_string().into(),
            Object::Long(v) => v.to_string().into(),
            Object::Double(v) => v.to_string().into(),
            Object::Boolean(v) => {
                if *v {
                    "true".into()
                } else {
                    "false".into()
                }
            }
            Object::String(v) => v.clone(),
            Object::Json(v) => v.to_string().into(),
            Object::Null => "".into(),
        }
    }
}

/// untyped json <-> object
impl Object {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Object::Int(v) => serde_json::Value::Number((*v).into()),
            Object::Long(v) => serde_json::Value::Number((*v).into()),
            Object::Double(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Object::Boolean(v) => serde_json::Value::Bool(*v),
            Object::String(v) => serde_json::Value::String(v.to_string()),
            Object::Json(v) => v.clone(),
            Object::Null => serde_json::Value::Null,
        }
    }

    /// Infers a variable type from a plain json value.
    pub fn from_json(json: &serde_json::Value) -> Object {
        match json {
            serde_json::Value::Bool(v) => Object::Boolean(*v),
            serde_json::Value::Number(v) => {
                if let Some(v) = v.as_i64() {
                    if v <= i32::MAX as i64 && v >= i32::MIN as i64 {
                        Object::Int(v as i32)
                    } else {
                        Object::Long(v)
                    }
                } else {
                    Object::Double(v.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(v) => v.into(),
            serde_json::Value::Object(_) | serde_json::Value::Array(_) => Object::Json(json.clone()),
            serde_json::Value::Null => Object::Null,
        }
    }

    pub fn convert_jsonmap_to_hashmap(
        jsonmap: &serde_json::Map<String, serde_json::Value>,
    ) -> HashMap<InlineStr, Object> {
        let mut map = HashMap::with_capacity(jsonmap.len());
        for (k, v) in jsonmap {
            map.insert(k.as_str().into(), Self::from_json(v));
        }
        map
    }
}

/// typed json (`{"value": .., "type": ..}`) <-> object
impl Object {
    pub fn to_typed_json(&self) -> serde_json::Value {
        let value = match self {
            // the engine stores json variables as serialized text
            Object::Json(v) => serde_json::Value::String(v.to_string()),
            _ => self.to_json(),
        };
        serde_json::json!({ "value": value, "type": self.type_name() })
    }

    pub fn from_typed_json(typed: &serde_json::Value) -> CareResult<Object> {
        let value = typed.get("value").unwrap_or(&serde_json::Value::Null);
        let type_name = typed
            .get("type")
            .and_then(|x| x.as_str())
            .unwrap_or_default();

        if value.is_null() {
            return Ok(Object::Null);
        }

        let object = match type_name.to_ascii_lowercase().as_str() {
            "string" => match value.as_str() {
                Some(v) => Object::String(v.into()),
                None => return fmt_err!(IllegalArgument, "String variable carries {}", value),
            },
            "integer" | "short" => match value.as_i64() {
                Some(v) if v <= i32::MAX as i64 && v >= i32::MIN as i64 => Object::Int(v as i32),
                _ => return fmt_err!(IllegalArgument, "Integer variable carries {}", value),
            },
            "long" => match value.as_i64() {
                Some(v) => Object::Long(v),
                None => return fmt_err!(IllegalArgument, "Long variable carries {}", value),
            },
            "double" => match value.as_f64() {
                Some(v) => Object::Double(v),
                None => return fmt_err!(IllegalArgument, "Double variable carries {}", value),
            },
            "boolean" => match value.as_bool() {
                Some(v) => Object::Boolean(v),
                None => return fmt_err!(IllegalArgument, "Boolean variable carries {}", value),
            },
            "json" => match value {
                serde_json::Value::String(v) => Object::Json(serde_json::from_str(v)?),
                other => Object::Json(other.clone()),
            },
            "null" => Object::Null,
            // Date, Bytes, Object and untagged values fall back to inference
            _ => Self::from_json(value),
        };
        Ok(object)
    }

    pub fn typed_variables_to_json(
        variables: &HashMap<InlineStr, Object>,
    ) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::with_capacity(variables.len());
        for (k, v) in variables {
            map.insert(k.to_string(), v.to_typed_json());
        }
        map
    }

    pub fn typed_variables_from_json(
        json: &serde_json::Value,
    ) -> CareResult<HashMap<InlineStr, Object>> {
        let mut variables = HashMap::default();
        if json.is_null() {
            return Ok(variables);
        }
        for (k, v) in json
            .as_object()
            .ok_or_else(|| ErrorCode::IllegalArgument("variables must be an object"))?
        {
            variables.insert(k.as_str().into(), Self::from_typed_json(v)?);
        }
        Ok(variables)
    }
}

impl From<i32> for Object {
    fn from(value: i32) -> Self {
        Object::Int(value)
    }
}
impl From<i64> for Object {
    fn from(value: i64) -> Self {
        Object::Long(value)
    }
}
impl From<f64> for Object {
    fn from(value: f64) -> Self {
        Object::Double(value)
    }
}
impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Object::Boolean(value)
    }
}
impl From<InlineStr> for Object {
    fn from(value: InlineStr) -> Self {
        Object::String(value)
    }
}
impl From<&InlineStr> for Object {
    fn from(value: &InlineStr) -> Self {
        Object::String(value.clone())
    }
}
impl From<&str> for Object {
    fn from(value: &str) -> Self {
        Object::String(InlineStr::from(value))
    }
}
impl From<&String> for Object {
    fn from(value: &String) -> Self {
        Object::String(InlineStr::from(value.as_str()))
    }
}
impl From<String> for Object {
    fn from(value: String) -> Self {
        Object::String(InlineStr::from(value))
    }
}
impl From<serde_json::Value> for Object {
    fn from(value: serde_json::Value) -> Self {
        Object::Json(value)
    }
}
impl<T: Into<Object>> From<Option<T>> for Object {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Object::Null)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn typed_values_keep_their_tag() {
        for object in [
            Object::Int(80),
            Object::Long(9_000_000_000),
            Object::Double(0.4),
            Object::Boolean(true),
            Object::from("SUCESSO"),
            Object::Json(json!({"condicoes_preexistentes": ["DIABETES"]})),
            Object::Null,
        ] {
            let wire = object.to_typed_json();
            assert_eq!(wire["type"], object.type_name());
            assert_eq!(Object::from_typed_json(&wire).unwrap(), object);
        }
    }

    #[test]
    fn json_variables_travel_as_text() {
        let wire = Object::Json(json!({"imc": 31.5})).to_typed_json();
        assert_eq!(wire["value"], json!("{\"imc\":31.5}"));
    }

    #[test]
    fn integer_tag_rejects_text() {
        let e = Object::from_typed_json(&json!({"value": "80", "type": "Integer"})).unwrap_err();
        assert_eq!(e.code(), ErrorCode::illegal_argument_code());
    }

    #[test]
    fn untagged_numbers_are_inferred() {
        assert_matches!(Object::from_json(&json!(80)), Object::Int(80));
        assert_matches!(Object::from_json(&json!(95687.0)), Object::Double(v) if v == 95687.0);
        assert_matches!(Object::from_json(&json!(1i64 << 40)), Object::Long(_));
    }

    #[test]
    fn integral_views() {
        assert_eq!(Object::Double(95687.0).as_i64().unwrap(), 95687);
        assert!(Object::Double(1.5).as_i64().is_err());
        assert_eq!(Object::from(" 42 ").as_i64().unwrap(), 42);
        assert_eq!(Object::from(None::<i32>), Object::Null);
    }
}
