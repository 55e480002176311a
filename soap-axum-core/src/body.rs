//! Per-message-shape body codecs.
//!
//! A [`BodyCodec`] is chosen once when a method is bound and then used for
//! every call. It writes parameter values into the `Body` element and reads
//! them back, matching elements by `(namespace, local name)` and ignoring
//! anything it does not model.

use std::collections::HashMap;

use crate::contract::{BindingUse, ParameterStyle};
use crate::error::{DecodeError, EncodeError};
use crate::value::{XmlType, Value, format_scalar, parse_scalar};
use crate::version::SoapVersion;
use crate::xml::{QName, XSD_NAMESPACE, XSI_NAMESPACE, XmlAttribute, XmlElement, XmlWriter};

/// One value slot of a message body.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub element: QName,
    pub ty: XmlType,
}

impl Part {
    pub fn new(element: QName, ty: XmlType) -> Self {
        Self { element, ty }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyCodec {
    /// No body content (one-way responses).
    Empty,
    WrappedLiteral { element: QName, parts: Vec<Part> },
    WrappedEncoded { element: QName, parts: Vec<Part> },
    BareLiteral { parts: Vec<Part> },
    BareEncoded { parts: Vec<Part> },
}

impl BodyCodec {
    pub fn compile(
        style: ParameterStyle,
        binding_use: BindingUse,
        element: QName,
        parts: Vec<Part>,
    ) -> Self {
        match (style, binding_use) {
            (ParameterStyle::Wrapped, BindingUse::Literal) => Self::WrappedLiteral { element, parts },
            (ParameterStyle::Wrapped, BindingUse::Encoded) => Self::WrappedEncoded { element, parts },
            (ParameterStyle::Bare, BindingUse::Literal) => Self::BareLiteral { parts },
            (ParameterStyle::Bare, BindingUse::Encoded) => Self::BareEncoded { parts },
        }
    }

    pub fn parts(&self) -> &[Part] {
        match self {
            Self::Empty => &[],
            Self::WrappedLiteral { parts, .. }
            | Self::WrappedEncoded { parts, .. }
            | Self::BareLiteral { parts }
            | Self::BareEncoded { parts } => parts,
        }
    }

    pub fn binding_use(&self) -> BindingUse {
        match self {
            Self::WrappedEncoded { .. } | Self::BareEncoded { .. } => BindingUse::Encoded,
            _ => BindingUse::Literal,
        }
    }

    /// Name of the first Body child this codec produces.
    pub fn first_element(&self) -> Option<&QName> {
        match self {
            Self::WrappedLiteral { element, .. } | Self::WrappedEncoded { element, .. } => {
                Some(element)
            }
            Self::BareLiteral { parts } | Self::BareEncoded { parts } => {
                parts.first().map(|p| &p.element)
            }
            Self::Empty => None,
        }
    }

    /// Write `values` (one per part, in order) into the open `Body` element.
    pub fn write(
        &self,
        w: &mut XmlWriter,
        version: SoapVersion,
        values: &[Value],
    ) -> Result<(), EncodeError> {
        let parts = self.parts();
        if values.len() != parts.len() {
            return Err(EncodeError::ArgumentCount {
                expected: parts.len(),
                found: values.len(),
            });
        }
        let mode = Mode {
            binding_use: self.binding_use(),
            version,
        };
        let encoding_style = XmlAttribute::new(
            QName::new(version.envelope_namespace(), "encodingStyle"),
            version.encoding_namespace(),
        );

        match self {
            Self::Empty => Ok(()),
            Self::WrappedLiteral { element, .. } => {
                w.start(element, &[(String::new(), element.namespace().to_owned())], &[])?;
                for (part, value) in parts.iter().zip(values) {
                    write_value(w, &part.element, value, &part.ty, mode, &[])?;
                }
                w.end()?;
                Ok(())
            }
            Self::WrappedEncoded { element, .. } => {
                w.start(element, &[], std::slice::from_ref(&encoding_style))?;
                for (part, value) in parts.iter().zip(values) {
                    write_value(w, &part.element, value, &part.ty, mode, &[])?;
                }
                w.end()?;
                Ok(())
            }
            Self::BareLiteral { .. } => {
                for (part, value) in parts.iter().zip(values) {
                    write_value(w, &part.element, value, &part.ty, mode, &[])?;
                }
                Ok(())
            }
            Self::BareEncoded { .. } => {
                for (part, value) in parts.iter().zip(values) {
                    write_value(
                        w,
                        &part.element,
                        value,
                        &part.ty,
                        mode,
                        std::slice::from_ref(&encoding_style),
                    )?;
                }
                Ok(())
            }
        }
    }

    /// Read one value per part from a `Body` element. Missing parts are `Null`.
    pub fn read(&self, body: &XmlElement) -> Result<Vec<Value>, DecodeError> {
        let reader = ValueReader::new(self.binding_use(), body);
        let container = match self {
            Self::Empty => return Ok(Vec::new()),
            Self::WrappedLiteral { element, .. } | Self::WrappedEncoded { element, .. } => {
                let found = body
                    .first_child_element()
                    .ok_or_else(|| DecodeError::MissingElement(element.clone()))?;
                if found.name != *element {
                    return Err(DecodeError::UnexpectedElement {
                        expected: element.clone(),
                        found: found.name.clone(),
                    });
                }
                found
            }
            Self::BareLiteral { .. } | Self::BareEncoded { .. } => body,
        };

        self.parts()
            .iter()
            .map(|part| {
                match container.child(part.element.namespace(), part.element.local_name()) {
                    Some(element) => reader.read(element, &part.ty, part.element.local_name()),
                    None => Ok(Value::Null),
                }
            })
            .collect()
    }
}

#[derive(Clone, Copy)]
pub(crate) struct Mode {
    binding_use: BindingUse,
    version: SoapVersion,
}

impl Mode {
    /// Headers are always written literally.
    pub(crate) fn literal(version: SoapVersion) -> Self {
        Self {
            binding_use: BindingUse::Literal,
            version,
        }
    }

    fn encoded(&self) -> bool {
        self.binding_use == BindingUse::Encoded
    }
}

fn mismatch(name: &QName, ty: &XmlType, value: &Value) -> EncodeError {
    EncodeError::TypeMismatch {
        name: name.local_name().to_owned(),
        expected: ty.type_name().to_owned(),
        found: value.kind(),
    }
}

/// Namespace of the schema type, used for `xsi:type` and `arrayType` values.
fn type_namespace(ty: &XmlType, version: SoapVersion) -> &str {
    match ty {
        XmlType::Struct(s) => &s.namespace,
        XmlType::Array(_) => version.encoding_namespace(),
        _ => XSD_NAMESPACE,
    }
}

fn qualified_value(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_owned()
    } else {
        format!("{prefix}:{local}")
    }
}

/// Write `value` as element `name`.
pub(crate) fn write_value(
    w: &mut XmlWriter,
    name: &QName,
    value: &Value,
    ty: &XmlType,
    mode: Mode,
    extra: &[XmlAttribute],
) -> Result<(), EncodeError> {
    let mut attributes = extra.to_vec();
    let mut declarations = Vec::new();

    if value.is_null() {
        attributes.push(XmlAttribute::new(QName::new(XSI_NAMESPACE, "nil"), "true"));
        w.start(name, &declarations, &attributes)?;
        w.end()?;
        return Ok(());
    }

    if mode.encoded() {
        let (prefix, declaration) = w.prefix_for_value(type_namespace(ty, mode.version));
        declarations.extend(declaration);
        attributes.push(XmlAttribute::new(
            QName::new(XSI_NAMESPACE, "type"),
            qualified_value(&prefix, ty.type_name()),
        ));
    }

    match ty {
        XmlType::Struct(st) => {
            let Value::Struct(fields) = value else {
                return Err(mismatch(name, ty, value));
            };
            w.start(name, &declarations, &attributes)?;
            for field in &st.fields {
                let field_value = fields
                    .iter()
                    .find(|(n, _)| *n == field.name)
                    .map(|(_, v)| v)
                    .unwrap_or(&Value::Null);
                let child = if mode.encoded() {
                    QName::unqualified(field.name.clone())
                } else {
                    QName::new(st.namespace.clone(), field.name.clone())
                };
                write_value(w, &child, field_value, &field.ty, mode, &[])?;
            }
            w.end()?;
        }
        XmlType::Array(item) => {
            let Value::Array(items) = value else {
                return Err(mismatch(name, ty, value));
            };
            if mode.encoded() {
                let item_ns = type_namespace(item, mode.version).to_owned();
                let (prefix, declaration) = w.prefix_for_value(&item_ns);
                if let Some(declaration) = declaration {
                    if !declarations.contains(&declaration) {
                        declarations.push(declaration);
                    }
                }
                attributes.push(XmlAttribute::new(
                    QName::new(mode.version.encoding_namespace(), "arrayType"),
                    format!(
                        "{}[{}]",
                        qualified_value(&prefix, item.type_name()),
                        items.len()
                    ),
                ));
            }
            w.start(name, &declarations, &attributes)?;
            let item_name = if mode.encoded() {
                QName::unqualified("Item")
            } else {
                QName::new(name.namespace().to_owned(), item.type_name().to_owned())
            };
            for v in items {
                write_value(w, &item_name, v, item, mode, &[])?;
            }
            w.end()?;
        }
        _ => {
            let text = format_scalar(value, ty).ok_or_else(|| mismatch(name, ty, value))?;
            w.start(name, &declarations, &attributes)?;
            w.text(&text)?;
            w.end()?;
        }
    }
    Ok(())
}

/// Reads values, resolving `href="#id"` references in encoded bodies.
pub(crate) struct ValueReader<'a> {
    binding_use: BindingUse,
    ids: HashMap<&'a str, &'a XmlElement>,
}

impl<'a> ValueReader<'a> {
    pub(crate) fn new(binding_use: BindingUse, body: &'a XmlElement) -> Self {
        let mut ids = HashMap::new();
        if binding_use == BindingUse::Encoded {
            collect_ids(body, &mut ids);
        }
        Self { binding_use, ids }
    }

    pub(crate) fn literal() -> Self {
        Self {
            binding_use: BindingUse::Literal,
            ids: HashMap::new(),
        }
    }

    fn resolve(&self, element: &'a XmlElement) -> Result<&'a XmlElement, DecodeError> {
        if self.binding_use != BindingUse::Encoded {
            return Ok(element);
        }
        match element.attribute("", "href") {
            Some(href) => {
                let id = href.strip_prefix('#').unwrap_or(href);
                self.ids
                    .get(id)
                    .copied()
                    .ok_or_else(|| DecodeError::MissingId(id.to_owned()))
            }
            None => Ok(element),
        }
    }

    pub(crate) fn read(
        &self,
        element: &'a XmlElement,
        ty: &XmlType,
        name: &str,
    ) -> Result<Value, DecodeError> {
        let element = self.resolve(element)?;
        if element.is_nil() {
            return Ok(Value::Null);
        }
        match ty {
            XmlType::Struct(st) => {
                let field_ns = match self.binding_use {
                    BindingUse::Literal => st.namespace.as_str(),
                    BindingUse::Encoded => "",
                };
                let mut fields = Vec::with_capacity(st.fields.len());
                for field in &st.fields {
                    let value = match element.child(field_ns, &field.name) {
                        Some(child) => self.read(child, &field.ty, &field.name)?,
                        None => Value::Null,
                    };
                    fields.push((field.name.clone(), value));
                }
                Ok(Value::Struct(fields))
            }
            XmlType::Array(item) => element
                .child_elements()
                .map(|child| self.read(child, item, name))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            _ => parse_scalar(&element.text(), ty).map_err(|reason| DecodeError::InvalidValue {
                name: name.to_owned(),
                reason,
            }),
        }
    }
}

fn collect_ids<'a>(element: &'a XmlElement, ids: &mut HashMap<&'a str, &'a XmlElement>) {
    for child in element.child_elements() {
        if let Some(id) = child.attribute("", "id") {
            ids.insert(id, child);
        }
        collect_ids(child, ids);
    }
}
