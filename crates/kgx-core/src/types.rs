//! Declared property types and value coercion.

use crate::prefix::{PrefixMap, XSD};
use crate::value::{Properties, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The type a property is declared (or inferred) to have.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PropertyType {
    Bool,
    Int,
    Float,
    UriOrCurie,
    String,
    /// Any other XML Schema datatype, by local name (`xsd:date` -> `date`).
    Xsd(String),
}

impl PropertyType {
    /// The literal datatype IRI for values of this declared type.
    ///
    /// `None` for plain strings and for IRIs, which are not literals.
    pub fn datatype_iri(&self) -> Option<String> {
        let local = match self {
            PropertyType::Bool => "boolean",
            PropertyType::Int => "integer",
            PropertyType::Float => "float",
            PropertyType::Xsd(local) => local.as_str(),
            PropertyType::UriOrCurie | PropertyType::String => return None,
        };
        Some(format!("{XSD}{local}"))
    }

    /// Map a literal datatype IRI back to a property type.
    pub fn from_datatype_iri(iri: &str) -> Self {
        let Some(local) = iri.strip_prefix(XSD) else {
            return PropertyType::String;
        };
        match local {
            "boolean" => PropertyType::Bool,
            "integer" | "int" | "long" | "short" | "byte" | "nonNegativeInteger"
            | "positiveInteger" | "negativeInteger" | "nonPositiveInteger" | "unsignedInt"
            | "unsignedLong" => PropertyType::Int,
            "float" | "double" | "decimal" => PropertyType::Float,
            "string" => PropertyType::String,
            "anyURI" => PropertyType::UriOrCurie,
            other => PropertyType::Xsd(other.to_string()),
        }
    }

    /// Infer a type from a runtime value.
    pub fn infer(value: &Value, prefixes: &PrefixMap) -> Self {
        match value {
            Value::Bool(_) => PropertyType::Bool,
            Value::Int(_) => PropertyType::Int,
            Value::Float(_) => PropertyType::Float,
            Value::String(s) if prefixes.is_identifier(s) => PropertyType::UriOrCurie,
            Value::Array(items) => items
                .first()
                .map(|first| Self::infer(first, prefixes))
                .unwrap_or(PropertyType::String),
            _ => PropertyType::String,
        }
    }

    /// Convert `value` to this type, element-wise for arrays.
    ///
    /// `None` when a scalar cannot be represented as this type.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| self.coerce(item))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Value::Null => Some(Value::Null),
            scalar => self.coerce_scalar(scalar),
        }
    }

    fn coerce_scalar(&self, value: &Value) -> Option<Value> {
        match self {
            PropertyType::Bool => match value {
                Value::Bool(b) => Some(Value::Bool(*b)),
                Value::Int(0) => Some(Value::Bool(false)),
                Value::Int(1) => Some(Value::Bool(true)),
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" => Some(Value::Bool(true)),
                    "false" | "0" => Some(Value::Bool(false)),
                    _ => None,
                },
                _ => None,
            },
            PropertyType::Int => match value {
                Value::Int(n) => Some(Value::Int(*n)),
                Value::Float(f) if f.fract() == 0.0 => Some(Value::Int(*f as i64)),
                Value::String(s) => s.trim().parse().ok().map(Value::Int),
                _ => None,
            },
            PropertyType::Float => match value {
                Value::Float(f) => Some(Value::Float(*f)),
                Value::Int(n) => Some(Value::Float(*n as f64)),
                Value::String(s) => s.trim().parse().ok().map(Value::Float),
                _ => None,
            },
            PropertyType::UriOrCurie | PropertyType::String => value.to_text().map(Value::String),
            PropertyType::Xsd(_) => Some(value.clone()),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::Bool => f.write_str("bool"),
            PropertyType::Int => f.write_str("int"),
            PropertyType::Float => f.write_str("float"),
            PropertyType::UriOrCurie => f.write_str("uriorcurie"),
            PropertyType::String => f.write_str("string"),
            PropertyType::Xsd(local) => write!(f, "xsd:{local}"),
        }
    }
}

impl FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bool" | "boolean" => Ok(PropertyType::Bool),
            "int" | "integer" => Ok(PropertyType::Int),
            "float" | "double" => Ok(PropertyType::Float),
            "uriorcurie" | "uri" | "curie" => Ok(PropertyType::UriOrCurie),
            "string" | "str" => Ok(PropertyType::String),
            other => match other.strip_prefix("xsd:") {
                Some(local) if !local.is_empty() => {
                    Ok(Self::from_datatype_iri(&format!("{XSD}{local}")))
                }
                _ => Err(format!("unknown property type: {other}")),
            },
        }
    }
}

impl TryFrom<String> for PropertyType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PropertyType> for String {
    fn from(ty: PropertyType) -> Self {
        ty.to_string()
    }
}

/// Property name to declared type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyTypeMap {
    types: IndexMap<String, PropertyType>,
}

impl PropertyTypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, ty: PropertyType) -> Self {
        self.types.insert(name.into(), ty);
        self
    }

    pub fn get(&self, name: &str) -> Option<&PropertyType> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Coerce one value to the declared type of `name`, if any.
    ///
    /// A value that does not fit is kept as-is and a warning is logged.
    pub fn coerce(&self, name: &str, value: Value) -> Value {
        let Some(ty) = self.types.get(name) else {
            return value;
        };
        match ty.coerce(&value) {
            Some(coerced) => coerced,
            None => {
                tracing::warn!(
                    property = name,
                    %value,
                    expected = %ty,
                    "type coercion failed, keeping value"
                );
                value
            }
        }
    }

    /// Apply [`coerce`](Self::coerce) to every declared property in the bag.
    pub fn coerce_properties(&self, props: &mut Properties) {
        if self.types.is_empty() {
            return;
        }
        for (name, value) in props.iter_mut() {
            if self.types.contains_key(name) {
                let current = std::mem::replace(value, Value::Null);
                *value = self.coerce(name, current);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_type_names() {
        assert_eq!("float".parse::<PropertyType>(), Ok(PropertyType::Float));
        assert_eq!("uriorcurie".parse::<PropertyType>(), Ok(PropertyType::UriOrCurie));
        assert_eq!("xsd:integer".parse::<PropertyType>(), Ok(PropertyType::Int));
        assert_eq!(
            "xsd:date".parse::<PropertyType>(),
            Ok(PropertyType::Xsd("date".into()))
        );
        assert!("nonsense".parse::<PropertyType>().is_err());
    }

    #[test]
    fn test_declared_float_coerces_integer_literal() {
        let map = PropertyTypeMap::new().with("pos", PropertyType::Float);
        assert_eq!(map.coerce("pos", Value::from("332")), Value::Float(332.0));
    }

    #[test]
    fn test_failed_coercion_keeps_value() {
        let map = PropertyTypeMap::new().with("score", PropertyType::Int);
        assert_eq!(map.coerce("score", Value::from("high")), Value::from("high"));
    }

    #[test]
    fn test_arrays_coerce_elementwise() {
        assert_eq!(
            PropertyType::Int.coerce(&Value::from(vec!["1", "2"])),
            Some(Value::from(vec![1i64, 2]))
        );
    }

    #[test]
    fn test_datatype_iris() {
        assert_eq!(
            PropertyType::Float.datatype_iri().as_deref(),
            Some("http://www.w3.org/2001/XMLSchema#float")
        );
        assert_eq!(PropertyType::String.datatype_iri(), None);
        assert_eq!(
            PropertyType::from_datatype_iri("http://www.w3.org/2001/XMLSchema#double"),
            PropertyType::Float
        );
    }

    #[test]
    fn test_infer() {
        let prefixes = PrefixMap::with_defaults();
        assert_eq!(PropertyType::infer(&Value::from(1.5), &prefixes), PropertyType::Float);
        assert_eq!(
            PropertyType::infer(&Value::from("HP:0000006"), &prefixes),
            PropertyType::UriOrCurie
        );
        assert_eq!(
            PropertyType::infer(&Value::from("a name"), &prefixes),
            PropertyType::String
        );
    }

    #[test]
    fn test_map_deserializes_from_names() {
        let map: PropertyTypeMap =
            serde_json::from_str(r#"{"pos": "float", "negated": "bool"}"#).unwrap();
        assert_eq!(map.get("pos"), Some(&PropertyType::Float));
        assert_eq!(map.get("negated"), Some(&PropertyType::Bool));
    }
}
