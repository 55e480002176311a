//! Parameter values and the XML schema types they are bound to.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Schema type of a parameter, field, header or return value.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlType {
    Boolean,
    Int,
    Long,
    Double,
    String,
    Base64Binary,
    Struct(Arc<StructType>),
    Array(Box<XmlType>),
}

impl XmlType {
    pub fn array_of(item: XmlType) -> Self {
        Self::Array(Box::new(item))
    }

    /// Local name of the type: the `xsd:` name for scalars, the declared name
    /// for structs, `Array` for arrays.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Boolean => "boolean",
            Self::Int => "int",
            Self::Long => "long",
            Self::Double => "double",
            Self::String => "string",
            Self::Base64Binary => "base64Binary",
            Self::Struct(s) => &s.name,
            Self::Array(_) => "Array",
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::Struct(_) | Self::Array(_))
    }
}

/// A complex type with ordered fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    pub name: String,
    pub namespace: String,
    pub fields: Vec<FieldType>,
}

impl StructType {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, ty: XmlType) -> Self {
        self.fields.push(FieldType {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn into_type(self) -> XmlType {
        XmlType::Struct(Arc::new(self))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldType {
    pub name: String,
    pub ty: XmlType,
}

/// A decoded parameter value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Field values in declaration order.
    Struct(Vec<(String, Value)>),
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Long(v) => Some(*v),
            Self::Int(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Field of a struct value by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Short description used in type mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Bytes(_) => "base64Binary",
            Self::Struct(_) => "struct",
            Self::Array(_) => "array",
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

/// Lexical form of a scalar. `None` when the value does not fit the type.
pub fn format_scalar(value: &Value, ty: &XmlType) -> Option<String> {
    let text = match (ty, value) {
        (XmlType::Boolean, Value::Bool(v)) => v.to_string(),
        (XmlType::Int, Value::Int(v)) => v.to_string(),
        (XmlType::Long, Value::Long(v)) => v.to_string(),
        (XmlType::Long, Value::Int(v)) => v.to_string(),
        (XmlType::Double, Value::Double(v)) => format_double(*v),
        (XmlType::String, Value::String(v)) => v.clone(),
        (XmlType::Base64Binary, Value::Bytes(v)) => STANDARD.encode(v),
        _ => return None,
    };
    Some(text)
}

fn format_double(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_owned()
    } else if v == f64::INFINITY {
        "INF".to_owned()
    } else if v == f64::NEG_INFINITY {
        "-INF".to_owned()
    } else {
        v.to_string()
    }
}

/// Parse the lexical form of a scalar type.
pub fn parse_scalar(text: &str, ty: &XmlType) -> Result<Value, String> {
    let trimmed = text.trim();
    match ty {
        XmlType::Boolean => match trimmed {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            other => Err(format!("`{other}` is not a boolean")),
        },
        XmlType::Int => trimmed
            .parse()
            .map(Value::Int)
            .map_err(|e| format!("`{trimmed}` is not an int: {e}")),
        XmlType::Long => trimmed
            .parse()
            .map(Value::Long)
            .map_err(|e| format!("`{trimmed}` is not a long: {e}")),
        XmlType::Double => match trimmed {
            "INF" => Ok(Value::Double(f64::INFINITY)),
            "-INF" => Ok(Value::Double(f64::NEG_INFINITY)),
            "NaN" => Ok(Value::Double(f64::NAN)),
            other => other
                .parse()
                .map(Value::Double)
                .map_err(|e| format!("`{other}` is not a double: {e}")),
        },
        XmlType::String => Ok(Value::String(text.to_owned())),
        XmlType::Base64Binary => {
            let compact: String = trimmed.split_whitespace().collect();
            STANDARD
                .decode(compact.as_bytes())
                .map(Value::Bytes)
                .map_err(|e| format!("invalid base64: {e}"))
        }
        XmlType::Struct(_) | XmlType::Array(_) => {
            Err(format!("`{}` is not a scalar type", ty.type_name()))
        }
    }
}
