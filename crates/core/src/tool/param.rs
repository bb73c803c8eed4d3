use std::fmt::{self, Display};

use schemars::json_schema;
use serde_json::{Map, Number, Value};

/// The semantic type of a tool parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Free text.
    String,
    /// Any finite number, integer or floating-point.
    Number,
    /// A whole number that fits in an `i64`.
    Integer,
    /// `true` or `false`.
    Boolean,
}

impl ParamType {
    /// Returns the JSON schema type name.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
        }
    }

    /// Coerces `value` to this type, or returns `None` if it can't be.
    ///
    /// Models are sloppy about JSON types, so numbers sent as strings (and
    /// the other way around) are accepted when the conversion is lossless.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (ParamType::String, Value::String(_)) => Some(value.clone()),
            (ParamType::String, Value::Number(n)) => {
                Some(Value::String(n.to_string()))
            }
            (ParamType::String, Value::Bool(b)) => {
                Some(Value::String(b.to_string()))
            }
            (ParamType::Number, Value::Number(_)) => Some(value.clone()),
            (ParamType::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            (ParamType::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(integral))
                .map(Value::from),
            (ParamType::Integer, Value::String(s)) => {
                s.trim().parse::<i64>().ok().map(Value::from)
            }
            (ParamType::Boolean, Value::Bool(_)) => Some(value.clone()),
            (ParamType::Boolean, Value::String(s)) => match s.trim() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Display for ParamType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[inline]
fn integral(f: f64) -> Option<i64> {
    const LIMIT: f64 = i64::MAX as f64;
    (f.fract() == 0.0 && f >= -LIMIT && f < LIMIT).then_some(f as i64)
}

/// A declared tool parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Parameter {
    name: String,
    ty: ParamType,
    description: String,
    required: bool,
}

impl Parameter {
    /// Declares a parameter the model must always provide.
    #[inline]
    pub fn required<N: Into<String>, D: Into<String>>(
        name: N,
        ty: ParamType,
        description: D,
    ) -> Self {
        Self {
            name: name.into(),
            ty,
            description: description.into(),
            required: true,
        }
    }

    /// Declares a parameter the model may leave out.
    #[inline]
    pub fn optional<N: Into<String>, D: Into<String>>(
        name: N,
        ty: ParamType,
        description: D,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty, description)
        }
    }

    /// Returns the parameter name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the semantic type.
    #[inline]
    pub fn ty(&self) -> ParamType {
        self.ty
    }

    /// Returns the human-readable description.
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns whether the parameter must be provided.
    #[inline]
    pub fn is_required(&self) -> bool {
        self.required
    }
}

/// Renders the parameters as a JSON schema object.
pub(crate) fn object_schema(parameters: &[Parameter]) -> Value {
    let mut properties = Map::with_capacity(parameters.len());
    let mut required = vec![];
    for param in parameters {
        properties.insert(
            param.name.clone(),
            json_schema!({
                "type": param.ty.as_str(),
                "description": param.description,
            })
            .to_value(),
        );
        if param.required {
            required.push(Value::String(param.name.clone()));
        }
    }

    json_schema!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
    .to_value()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_coerce() {
        assert_eq!(ParamType::Number.coerce(&json!(42)), Some(json!(42)));
        assert_eq!(ParamType::Number.coerce(&json!(" 2.5 ")), Some(json!(2.5)));
        assert_eq!(ParamType::Number.coerce(&json!("abc")), None);
        assert_eq!(ParamType::Number.coerce(&json!("inf")), None);
        assert_eq!(ParamType::Number.coerce(&json!(true)), None);

        assert_eq!(ParamType::String.coerce(&json!("Nick")), Some(json!("Nick")));
        assert_eq!(ParamType::String.coerce(&json!(7)), Some(json!("7")));
        assert_eq!(ParamType::String.coerce(&json!(["a"])), None);

        assert_eq!(ParamType::Integer.coerce(&json!(3.0)), Some(json!(3)));
        assert_eq!(ParamType::Integer.coerce(&json!("-12")), Some(json!(-12)));
        assert_eq!(ParamType::Integer.coerce(&json!(3.5)), None);

        assert_eq!(ParamType::Boolean.coerce(&json!("true")), Some(json!(true)));
        assert_eq!(ParamType::Boolean.coerce(&json!("yes")), None);
    }

    #[test]
    fn test_object_schema() {
        let schema = object_schema(&[
            Parameter::required("topic", ParamType::String, "The topic"),
            Parameter::optional("limit", ParamType::Integer, "At most"),
        ]);
        assert_eq!(
            schema,
            json!({
                "type": "object",
                "properties": {
                    "topic": { "type": "string", "description": "The topic" },
                    "limit": { "type": "integer", "description": "At most" }
                },
                "required": ["topic"],
                "additionalProperties": false
            })
        );
    }
}
