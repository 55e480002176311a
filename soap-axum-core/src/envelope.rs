//! SOAP envelope framing.
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8"?>
//! <soap:Envelope xmlns:soap="..." xmlns:xsi="..." xmlns:xsd="...">
//!   <soap:Header>...</soap:Header>
//!   <soap:Body>...</soap:Body>
//! </soap:Envelope>
//! ```
//!
//! Writing is a single pass. Reading happens in two steps because the codec
//! for the body depends on which method the request is routed to:
//! [`parse_envelope`] validates the frame and locates `Header` and `Body`,
//! then the caller decodes headers and body with the method's bindings.

use bytes::Bytes;

use crate::body::{BodyCodec, Mode, ValueReader, write_value};
use crate::contract::HeaderBinding;
use crate::error::{DecodeError, EncodeError, EnvelopeError};
use crate::fault::{Fault, is_fault, read_fault, write_fault};
use crate::value::Value;
use crate::version::SoapVersion;
use crate::xml::{
    QName, XSD_NAMESPACE, XSI_NAMESPACE, XmlAttribute, XmlElement, XmlNode, XmlWriter,
    parse_document,
};

#[derive(Debug, Clone, PartialEq)]
pub enum HeaderContent {
    /// Decoded through a typed header binding.
    Typed(Value),
    /// Preserved as received; no binding knew the element.
    Raw(XmlElement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoapHeader {
    pub name: QName,
    pub content: HeaderContent,
    pub must_understand: bool,
    pub actor: Option<String>,
}

impl SoapHeader {
    pub fn typed(name: QName, value: Value) -> Self {
        Self {
            name,
            content: HeaderContent::Typed(value),
            must_understand: false,
            actor: None,
        }
    }

    pub fn raw(element: XmlElement) -> Self {
        Self {
            name: element.name.clone(),
            content: HeaderContent::Raw(element),
            must_understand: false,
            actor: None,
        }
    }

    pub fn with_must_understand(mut self, must_understand: bool) -> Self {
        self.must_understand = must_understand;
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.content {
            HeaderContent::Typed(value) => Some(value),
            HeaderContent::Raw(_) => None,
        }
    }

    pub fn element(&self) -> Option<&XmlElement> {
        match &self.content {
            HeaderContent::Raw(element) => Some(element),
            HeaderContent::Typed(_) => None,
        }
    }
}

fn actor_attribute(version: SoapVersion) -> &'static str {
    match version {
        SoapVersion::Soap11 => "actor",
        SoapVersion::Soap12 => "role",
    }
}

/// Content of the `Body` element.
#[derive(Debug, Clone, Copy)]
pub enum EnvelopeBody<'a> {
    Parameters {
        codec: &'a BodyCodec,
        values: &'a [Value],
    },
    Fault(&'a Fault),
    Empty,
}

fn write_header(
    w: &mut XmlWriter,
    version: SoapVersion,
    header: &SoapHeader,
    bindings: &[HeaderBinding],
) -> Result<(), EncodeError> {
    let env = version.envelope_namespace();
    let mut attributes = Vec::new();
    if header.must_understand {
        let flag = match version {
            SoapVersion::Soap11 => "1",
            SoapVersion::Soap12 => "true",
        };
        attributes.push(XmlAttribute::new(QName::new(env, "mustUnderstand"), flag));
    }
    if let Some(actor) = &header.actor {
        attributes.push(XmlAttribute::new(
            QName::new(env, actor_attribute(version)),
            actor.clone(),
        ));
    }

    match &header.content {
        HeaderContent::Typed(value) => {
            let ty = bindings
                .iter()
                .find(|b| b.name == header.name)
                .and_then(|b| b.ty.as_ref())
                .ok_or_else(|| EncodeError::UnboundHeader(header.name.clone()))?;
            write_value(w, &header.name, value, ty, Mode::literal(version), &attributes)
        }
        HeaderContent::Raw(element) => {
            let mut element = element.clone();
            element.attributes.retain(|a| {
                !(a.name.namespace() == env
                    && matches!(a.name.local_name(), "mustUnderstand" | "actor" | "role"))
            });
            element.attributes.extend(attributes);
            w.element(&element)?;
            Ok(())
        }
    }
}

/// Serialize a complete envelope.
pub fn write_envelope(
    version: SoapVersion,
    headers: &[SoapHeader],
    bindings: &[HeaderBinding],
    body: EnvelopeBody<'_>,
) -> Result<Bytes, EncodeError> {
    let env = version.envelope_namespace();
    let mut w = XmlWriter::new()?;
    w.start(
        &QName::new(env, "Envelope"),
        &[
            (version.prefix().to_owned(), env.to_owned()),
            ("xsi".to_owned(), XSI_NAMESPACE.to_owned()),
            ("xsd".to_owned(), XSD_NAMESPACE.to_owned()),
        ],
        &[],
    )?;

    if !headers.is_empty() {
        w.start(&QName::new(env, "Header"), &[], &[])?;
        for header in headers {
            write_header(&mut w, version, header, bindings)?;
        }
        w.end()?;
    }

    w.start(&QName::new(env, "Body"), &[], &[])?;
    match body {
        EnvelopeBody::Parameters { codec, values } => codec.write(&mut w, version, values)?,
        EnvelopeBody::Fault(fault) => write_fault(&mut w, version, fault)?,
        EnvelopeBody::Empty => {}
    }
    w.end()?;
    w.end()?;
    Ok(Bytes::from(w.into_bytes()))
}

/// A validated envelope whose header and body have not been decoded yet.
#[derive(Debug, Clone)]
pub struct ParsedEnvelope {
    version: SoapVersion,
    /// The envelope element, stripped of its `Header` and `Body` children.
    root: XmlElement,
    header: Option<XmlElement>,
    body: XmlElement,
}

/// Parse and validate the envelope frame.
pub fn parse_envelope(input: &[u8], version: SoapVersion) -> Result<ParsedEnvelope, EnvelopeError> {
    let mut root = parse_document(input)?;
    if root.name.local_name() != "Envelope" {
        return Err(EnvelopeError::NotAnEnvelope(root.name.clone()));
    }
    if root.name.namespace() != version.envelope_namespace() {
        return Err(match SoapVersion::from_envelope_namespace(root.name.namespace()) {
            Some(found) => EnvelopeError::VersionMismatch {
                expected: version,
                found,
            },
            None => EnvelopeError::WrongNamespace(root.name.namespace().to_owned()),
        });
    }

    let env = version.envelope_namespace();
    let mut header = None;
    let mut body = None;
    for node in std::mem::take(&mut root.children) {
        let XmlNode::Element(element) = node else {
            continue;
        };
        if body.is_some() {
            continue;
        }
        if element.name.is(env, "Body") {
            body = Some(element);
        } else if header.is_none() && element.name.is(env, "Header") {
            header = Some(element);
        }
    }

    Ok(ParsedEnvelope {
        version,
        root,
        header,
        body: body.ok_or(EnvelopeError::MissingBody)?,
    })
}

impl ParsedEnvelope {
    pub fn version(&self) -> SoapVersion {
        self.version
    }

    pub fn body(&self) -> &XmlElement {
        &self.body
    }

    pub fn first_body_element(&self) -> Option<&XmlElement> {
        self.body.first_child_element()
    }

    pub fn header_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.header.iter().flat_map(XmlElement::child_elements)
    }

    /// The fault carried by the body, if the first body child is one.
    pub fn fault(&self) -> Option<Result<Fault, EnvelopeError>> {
        let first = self.first_body_element()?;
        if !is_fault(first, self.version) {
            return None;
        }
        Some(read_fault(self.version, first, &[&self.root, &self.body]))
    }

    /// Decode headers. Those matching a typed binding become
    /// [`HeaderContent::Typed`]; all others are kept raw.
    pub fn decode_headers(&self, bindings: &[HeaderBinding]) -> Result<Vec<SoapHeader>, DecodeError> {
        let env = self.version.envelope_namespace();
        let reader = ValueReader::literal();
        self.header_elements()
            .map(|element| -> Result<SoapHeader, DecodeError> {
                let must_understand = matches!(
                    element.attribute(env, "mustUnderstand").map(str::trim),
                    Some("1") | Some("true")
                );
                let actor = element
                    .attribute(env, actor_attribute(self.version))
                    .map(str::to_owned);
                let typed = bindings
                    .iter()
                    .find(|b| b.name == element.name)
                    .and_then(|b| b.ty.as_ref());
                let content = match typed {
                    Some(ty) => HeaderContent::Typed(reader.read(
                        element,
                        ty,
                        element.name.local_name(),
                    )?),
                    None => HeaderContent::Raw(element.clone()),
                };
                Ok(SoapHeader {
                    name: element.name.clone(),
                    content,
                    must_understand,
                    actor,
                })
            })
            .collect()
    }

    /// Decode the body with a method's codec.
    pub fn decode_body(&self, codec: &BodyCodec) -> Result<Vec<Value>, DecodeError> {
        codec.read(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{BindingUse, Direction, ParameterStyle};
    use crate::body::Part;
    use crate::value::XmlType;

    fn add_codec() -> BodyCodec {
        BodyCodec::compile(
            ParameterStyle::Wrapped,
            BindingUse::Literal,
            QName::new("urn:calc/", "Add"),
            vec![
                Part::new(QName::new("urn:calc/", "a"), XmlType::Int),
                Part::new(QName::new("urn:calc/", "b"), XmlType::Int),
            ],
        )
    }

    fn auth_binding() -> HeaderBinding {
        HeaderBinding {
            name: QName::new("urn:calc/", "Auth"),
            member: "auth".into(),
            direction: Direction::In,
            ty: Some(XmlType::String),
            must_understand: false,
        }
    }

    #[test]
    fn test_soap11_envelope_shape() {
        let codec = add_codec();
        let bytes = write_envelope(
            SoapVersion::Soap11,
            &[],
            &[],
            EnvelopeBody::Parameters {
                codec: &codec,
                values: &[Value::Int(2), Value::Int(3)],
            },
        )
        .unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(text.contains(
            "<soap:Envelope xmlns:soap=\"http://schemas.xmlsoap.org/soap/envelope/\" \
             xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
             xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\">"
        ));
        assert!(text.contains("<soap:Body><Add xmlns=\"urn:calc/\"><a>2</a><b>3</b></Add></soap:Body>"));
        assert!(!text.contains("Header"));
    }

    #[test]
    fn test_headers_round_trip_and_unknown_are_preserved() {
        let unknown = XmlElement::new(QName::new("urn:trace", "TraceId")).with_text("abc");
        let headers = vec![
            SoapHeader::typed(QName::new("urn:calc/", "Auth"), "token".into())
                .with_must_understand(true),
            SoapHeader::raw(unknown.clone()).with_actor("urn:next"),
        ];
        let codec = add_codec();
        for version in [SoapVersion::Soap11, SoapVersion::Soap12] {
            let bytes = write_envelope(
                version,
                &headers,
                &[auth_binding()],
                EnvelopeBody::Parameters {
                    codec: &codec,
                    values: &[Value::Int(1), Value::Int(1)],
                },
            )
            .unwrap();
            let parsed = parse_envelope(&bytes, version).unwrap();
            let decoded = parsed.decode_headers(&[auth_binding()]).unwrap();
            assert_eq!(decoded.len(), 2);
            assert_eq!(decoded[0].value(), Some(&Value::String("token".into())));
            assert!(decoded[0].must_understand);
            let raw = decoded[1].element().unwrap();
            assert_eq!(raw.name, unknown.name);
            assert_eq!(raw.text(), "abc");
            assert_eq!(decoded[1].actor.as_deref(), Some("urn:next"));
            assert!(!decoded[1].must_understand);

            assert_eq!(
                parsed.decode_body(&codec).unwrap(),
                vec![Value::Int(1), Value::Int(1)]
            );
        }
    }

    #[test]
    fn test_typed_header_without_binding_fails() {
        let err = write_envelope(
            SoapVersion::Soap11,
            &[SoapHeader::typed(QName::new("urn:x", "H"), Value::Int(1))],
            &[],
            EnvelopeBody::Empty,
        )
        .unwrap_err();
        assert!(matches!(err, EncodeError::UnboundHeader(_)));
    }

    #[test]
    fn test_frame_validation() {
        let not_envelope = br#"<soap:Letter xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"/>"#;
        assert!(matches!(
            parse_envelope(not_envelope, SoapVersion::Soap11),
            Err(EnvelopeError::NotAnEnvelope(_))
        ));

        let soap12 = br#"<e:Envelope xmlns:e="http://www.w3.org/2003/05/soap-envelope"><e:Body/></e:Envelope>"#;
        assert!(matches!(
            parse_envelope(soap12, SoapVersion::Soap11),
            Err(EnvelopeError::VersionMismatch {
                expected: SoapVersion::Soap11,
                found: SoapVersion::Soap12
            })
        ));

        let foreign = br#"<Envelope xmlns="urn:not-soap"><Body/></Envelope>"#;
        let err = parse_envelope(foreign, SoapVersion::Soap11).unwrap_err();
        assert!(err.is_version_mismatch());

        let no_body = br#"<e:Envelope xmlns:e="http://schemas.xmlsoap.org/soap/envelope/"><e:Header/></e:Envelope>"#;
        assert!(matches!(
            parse_envelope(no_body, SoapVersion::Soap11),
            Err(EnvelopeError::MissingBody)
        ));
    }

    #[test]
    fn test_prefixes_are_irrelevant() {
        let doc = br#"<?xml version="1.0"?>
            <S:Envelope xmlns:S="http://schemas.xmlsoap.org/soap/envelope/">
              <S:Ignored/>
              <S:Body>
                <c:Add xmlns:c="urn:calc/"><c:a>4</c:a><c:b>5</c:b></c:Add>
              </S:Body>
              <S:Trailer/>
            </S:Envelope>"#;
        let parsed = parse_envelope(doc, SoapVersion::Soap11).unwrap();
        assert_eq!(
            parsed.decode_body(&add_codec()).unwrap(),
            vec![Value::Int(4), Value::Int(5)]
        );
        assert!(parsed.fault().is_none());
    }

    #[test]
    fn test_fault_body() {
        let fault = Fault::server("bad input");
        let bytes = write_envelope(SoapVersion::Soap11, &[], &[], EnvelopeBody::Fault(&fault)).unwrap();
        let parsed = parse_envelope(&bytes, SoapVersion::Soap11).unwrap();
        assert_eq!(parsed.fault().unwrap().unwrap(), fault);
    }
}
