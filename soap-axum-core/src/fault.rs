//! SOAP faults and their 1.1 / 1.2 wire shapes.
//!
//! [`Fault`] is the single error value that crosses the wire. It is written
//! and read in the shape of the active [`SoapVersion`]; the two shapes are
//! never mixed within one message.
//!
//! SOAP 1.1:
//!
//! ```xml
//! <soap:Fault>
//!   <faultcode>soap:Server</faultcode>
//!   <faultstring>bad input</faultstring>
//!   <faultactor>urn:node</faultactor>
//!   <detail>...</detail>
//! </soap:Fault>
//! ```
//!
//! SOAP 1.2:
//!
//! ```xml
//! <soap12:Fault>
//!   <soap12:Code>
//!     <soap12:Value>soap12:Sender</soap12:Value>
//!     <soap12:Subcode><soap12:Value>rpc:BadArguments</soap12:Value></soap12:Subcode>
//!   </soap12:Code>
//!   <soap12:Reason><soap12:Text xml:lang="en">bad input</soap12:Text></soap12:Reason>
//!   <soap12:Node>urn:node</soap12:Node>
//!   <soap12:Role>urn:role</soap12:Role>
//!   <soap12:Detail>...</soap12:Detail>
//! </soap12:Fault>
//! ```
//!
//! Subcodes and `Node` have no 1.1 representation and are dropped there. The
//! 1.1 `faultactor` and the 1.2 `Role` both map to [`Fault::actor`].

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::error::EnvelopeError;
use crate::version::{SOAP12_ENCODING_NAMESPACE, SoapVersion};
use crate::xml::{
    QName, XML_NAMESPACE, XmlAttribute, XmlElement, XmlError, XmlNode, XmlWriter,
    resolve_qname_text,
};

/// Namespace of the SOAP 1.2 RPC subcodes.
pub const RPC_NAMESPACE: &str = "http://www.w3.org/2003/05/soap-rpc";

pub const BAD_ARGUMENTS: QName = QName::from_static(RPC_NAMESPACE, "BadArguments");
pub const PROCEDURE_NOT_PRESENT: QName = QName::from_static(RPC_NAMESPACE, "ProcedureNotPresent");
pub const MISSING_ID: QName = QName::from_static(SOAP12_ENCODING_NAMESPACE, "MissingID");
pub const UNTYPED_VALUE: QName = QName::from_static(SOAP12_ENCODING_NAMESPACE, "UntypedValue");

/// Language written on 1.2 reason texts that do not carry one.
pub const DEFAULT_REASON_LANG: &str = "en";

/// Top-level fault code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultCode {
    VersionMismatch,
    MustUnderstand,
    DataEncodingUnknown,
    /// `Client` in 1.1, `Sender` in 1.2.
    Client,
    /// `Server` in 1.1, `Receiver` in 1.2.
    Server,
    /// Any other qualified code.
    Other(QName),
}

impl FaultCode {
    /// Local name of a well-known code in the given version.
    pub fn as_str(&self, version: SoapVersion) -> &str {
        match (self, version) {
            (Self::VersionMismatch, _) => "VersionMismatch",
            (Self::MustUnderstand, _) => "MustUnderstand",
            (Self::DataEncodingUnknown, _) => "DataEncodingUnknown",
            (Self::Client, SoapVersion::Soap11) => "Client",
            (Self::Client, SoapVersion::Soap12) => "Sender",
            (Self::Server, SoapVersion::Soap11) => "Server",
            (Self::Server, SoapVersion::Soap12) => "Receiver",
            (Self::Other(name), _) => name.local_name(),
        }
    }

    pub fn qname(&self, version: SoapVersion) -> QName {
        match self {
            Self::Other(name) => name.clone(),
            known => QName::new(version.envelope_namespace(), known.as_str(version)),
        }
    }

    /// Classify a received code. SOAP 1.1 dotted refinements such as
    /// `Client.Authentication` map to their base code; the refinement is not
    /// kept.
    pub fn from_qname(name: &QName, version: SoapVersion) -> Self {
        if name.namespace() != version.envelope_namespace() {
            return Self::Other(name.clone());
        }
        let local = match version {
            SoapVersion::Soap11 => name.local_name().split('.').next().unwrap_or_default(),
            SoapVersion::Soap12 => name.local_name(),
        };
        match local {
            "VersionMismatch" => Self::VersionMismatch,
            "MustUnderstand" => Self::MustUnderstand,
            "DataEncodingUnknown" => Self::DataEncodingUnknown,
            "Client" | "Sender" => Self::Client,
            "Server" | "Receiver" => Self::Server,
            _ => Self::Other(name.clone()),
        }
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(name) => write!(f, "{name}"),
            known => f.write_str(known.as_str(SoapVersion::Soap11)),
        }
    }
}

/// A 1.2 subcode, possibly nesting a more specific one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultSubcode {
    pub value: QName,
    pub subcode: Option<Box<FaultSubcode>>,
}

impl FaultSubcode {
    pub fn new(value: QName) -> Self {
        Self {
            value,
            subcode: None,
        }
    }

    pub fn with_subcode(mut self, subcode: FaultSubcode) -> Self {
        self.subcode = Some(Box::new(subcode));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonText {
    pub text: String,
    pub lang: Option<String>,
}

/// Opaque detail payload: the attributes and content of the detail element.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FaultDetail {
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlNode>,
}

impl FaultDetail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: QName, value: impl Into<String>) -> Self {
        self.attributes.push(XmlAttribute::new(name, value));
        self
    }

    pub fn with_element(mut self, element: XmlElement) -> Self {
        self.children.push(XmlNode::Element(element));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    fn from_element(element: &XmlElement) -> Self {
        Self {
            attributes: element.attributes.clone(),
            children: element.children.clone(),
        }
    }
}

/// A SOAP fault.
///
/// The optional `source` keeps the error that caused a server fault for
/// diagnostics. It is never written to the wire and does not take part in
/// equality.
#[derive(Debug, Clone)]
pub struct Fault {
    code: FaultCode,
    subcode: Option<FaultSubcode>,
    reasons: Vec<ReasonText>,
    actor: Option<String>,
    node: Option<String>,
    detail: Option<FaultDetail>,
    source: Option<Arc<dyn Error + Send + Sync>>,
}

impl PartialEq for Fault {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
            && self.subcode == other.subcode
            && self.reasons == other.reasons
            && self.actor == other.actor
            && self.node == other.node
            && self.detail == other.detail
    }
}

impl Fault {
    pub fn new<S: Into<String>>(code: FaultCode, message: S) -> Self {
        Self {
            code,
            subcode: None,
            reasons: vec![ReasonText {
                text: message.into(),
                lang: None,
            }],
            actor: None,
            node: None,
            detail: None,
            source: None,
        }
    }

    /// The request was at fault.
    pub fn client<S: Into<String>>(message: S) -> Self {
        Self::new(FaultCode::Client, message)
    }

    /// Processing failed after the request was accepted.
    pub fn server<S: Into<String>>(message: S) -> Self {
        Self::new(FaultCode::Server, message)
    }

    pub fn version_mismatch<S: Into<String>>(message: S) -> Self {
        Self::new(FaultCode::VersionMismatch, message)
    }

    pub fn must_understand<S: Into<String>>(message: S) -> Self {
        Self::new(FaultCode::MustUnderstand, message)
    }

    pub fn code(&self) -> &FaultCode {
        &self.code
    }

    pub fn subcode(&self) -> Option<&FaultSubcode> {
        self.subcode.as_ref()
    }

    /// Text of the first reason.
    pub fn message(&self) -> &str {
        self.reasons.first().map(|r| r.text.as_str()).unwrap_or("")
    }

    pub fn reasons(&self) -> &[ReasonText] {
        &self.reasons
    }

    pub fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }

    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    pub fn detail(&self) -> Option<&FaultDetail> {
        self.detail.as_ref()
    }

    pub fn is_client(&self) -> bool {
        self.code == FaultCode::Client
    }

    pub fn is_server(&self) -> bool {
        self.code == FaultCode::Server
    }

    pub fn with_subcode(mut self, subcode: FaultSubcode) -> Self {
        self.subcode = Some(subcode);
        self
    }

    /// Tag the first reason with a language.
    pub fn with_lang<S: Into<String>>(mut self, lang: S) -> Self {
        if let Some(first) = self.reasons.first_mut() {
            first.lang = Some(lang.into());
        }
        self
    }

    /// Add a translated reason (1.2 only keeps all of them).
    pub fn add_reason<S: Into<String>, L: Into<String>>(mut self, lang: L, text: S) -> Self {
        self.reasons.push(ReasonText {
            text: text.into(),
            lang: Some(lang.into()),
        });
        self
    }

    pub fn with_actor<S: Into<String>>(mut self, actor: S) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_node<S: Into<String>>(mut self, node: S) -> Self {
        self.node = Some(node.into());
        self
    }

    pub fn with_detail(mut self, detail: FaultDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn with_source(mut self, source: Arc<dyn Error + Send + Sync>) -> Self {
        self.source = Some(source);
        self
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message())
    }
}

impl Error for Fault {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn Error + 'static))
    }
}

fn qname_text_element(w: &mut XmlWriter, name: &QName, value: &QName) -> Result<(), XmlError> {
    let (prefix, declaration) = w.prefix_for_value(value.namespace());
    w.start(name, declaration.as_slice(), &[])?;
    if prefix.is_empty() {
        w.text(value.local_name())?;
    } else {
        w.text(&format!("{prefix}:{}", value.local_name()))?;
    }
    w.end()
}

fn lang_attribute(lang: &str) -> XmlAttribute {
    XmlAttribute::new(QName::new(XML_NAMESPACE, "lang"), lang)
}

fn write_detail(w: &mut XmlWriter, name: &QName, detail: &FaultDetail) -> Result<(), XmlError> {
    w.start(name, &[], &detail.attributes)?;
    w.nodes(&detail.children)?;
    w.end()
}

/// Write the `Fault` element inside an open `Body`.
pub fn write_fault(w: &mut XmlWriter, version: SoapVersion, fault: &Fault) -> Result<(), XmlError> {
    let env = version.envelope_namespace();
    w.start(&QName::new(env, "Fault"), &[], &[])?;
    match version {
        SoapVersion::Soap11 => {
            qname_text_element(w, &QName::unqualified("faultcode"), &fault.code.qname(version))?;
            let attributes: Vec<_> = fault
                .reasons
                .first()
                .and_then(|r| r.lang.as_deref())
                .map(lang_attribute)
                .into_iter()
                .collect();
            w.text_element(&QName::unqualified("faultstring"), &attributes, fault.message())?;
            if let Some(actor) = &fault.actor {
                w.text_element(&QName::unqualified("faultactor"), &[], actor)?;
            }
            if let Some(detail) = &fault.detail {
                write_detail(w, &QName::unqualified("detail"), detail)?;
            }
        }
        SoapVersion::Soap12 => {
            w.start(&QName::new(env, "Code"), &[], &[])?;
            qname_text_element(w, &QName::new(env, "Value"), &fault.code.qname(version))?;
            let mut open = 0;
            let mut next = fault.subcode.as_ref();
            while let Some(subcode) = next {
                w.start(&QName::new(env, "Subcode"), &[], &[])?;
                qname_text_element(w, &QName::new(env, "Value"), &subcode.value)?;
                open += 1;
                next = subcode.subcode.as_deref();
            }
            for _ in 0..open {
                w.end()?;
            }
            w.end()?;

            w.start(&QName::new(env, "Reason"), &[], &[])?;
            let fallback = [ReasonText {
                text: String::new(),
                lang: None,
            }];
            let reasons = if fault.reasons.is_empty() {
                &fallback[..]
            } else {
                &fault.reasons[..]
            };
            for reason in reasons {
                let lang = reason.lang.as_deref().unwrap_or(DEFAULT_REASON_LANG);
                w.text_element(&QName::new(env, "Text"), &[lang_attribute(lang)], &reason.text)?;
            }
            w.end()?;

            if let Some(node) = &fault.node {
                w.text_element(&QName::new(env, "Node"), &[], node)?;
            }
            if let Some(role) = &fault.actor {
                w.text_element(&QName::new(env, "Role"), &[], role)?;
            }
            if let Some(detail) = &fault.detail {
                write_detail(w, &QName::new(env, "Detail"), detail)?;
            }
        }
    }
    w.end()
}

/// Whether a Body child is a fault of the given version.
pub fn is_fault(element: &XmlElement, version: SoapVersion) -> bool {
    element.name.is(version.envelope_namespace(), "Fault")
}

fn resolve_code(
    element: &XmlElement,
    scopes: &[&XmlElement],
    what: &str,
) -> Result<QName, EnvelopeError> {
    let mut chain = scopes.to_vec();
    chain.push(element);
    let text = element.text();
    resolve_qname_text(&text, &chain)
        .ok_or_else(|| EnvelopeError::MalformedFault(format!("unresolvable {what} `{}`", text.trim())))
}

fn read_subcode(
    element: &XmlElement,
    env: &str,
    scopes: &[&XmlElement],
) -> Result<FaultSubcode, EnvelopeError> {
    let mut chain = scopes.to_vec();
    chain.push(element);
    let value = element
        .child(env, "Value")
        .ok_or_else(|| EnvelopeError::MalformedFault("Subcode without Value".into()))?;
    let mut subcode = FaultSubcode::new(resolve_code(value, &chain, "subcode")?);
    if let Some(nested) = element.child(env, "Subcode") {
        subcode.subcode = Some(Box::new(read_subcode(nested, env, &chain)?));
    }
    Ok(subcode)
}

/// Read a `Fault` element. `scopes` are its ancestors, outermost first, so
/// QName-valued codes can be resolved.
pub fn read_fault(
    version: SoapVersion,
    fault: &XmlElement,
    scopes: &[&XmlElement],
) -> Result<Fault, EnvelopeError> {
    let mut chain = scopes.to_vec();
    chain.push(fault);
    let env = version.envelope_namespace();

    match version {
        SoapVersion::Soap11 => {
            let code_el = fault
                .child("", "faultcode")
                .ok_or_else(|| EnvelopeError::MalformedFault("missing faultcode".into()))?;
            let code = FaultCode::from_qname(&resolve_code(code_el, &chain, "faultcode")?, version);
            let reasons = fault
                .child("", "faultstring")
                .map(|s| ReasonText {
                    text: s.text(),
                    lang: s.attribute(XML_NAMESPACE, "lang").map(str::to_owned),
                })
                .into_iter()
                .collect();
            Ok(Fault {
                code,
                subcode: None,
                reasons,
                actor: fault.child("", "faultactor").map(XmlElement::text),
                node: None,
                detail: fault.child("", "detail").map(FaultDetail::from_element),
                source: None,
            })
        }
        SoapVersion::Soap12 => {
            let code_el = fault
                .child(env, "Code")
                .ok_or_else(|| EnvelopeError::MalformedFault("missing Code".into()))?;
            let mut code_chain = chain.clone();
            code_chain.push(code_el);
            let value = code_el
                .child(env, "Value")
                .ok_or_else(|| EnvelopeError::MalformedFault("Code without Value".into()))?;
            let code = FaultCode::from_qname(&resolve_code(value, &code_chain, "code")?, version);
            let subcode = code_el
                .child(env, "Subcode")
                .map(|s| read_subcode(s, env, &code_chain))
                .transpose()?;
            let reasons = fault
                .child(env, "Reason")
                .map(|reason| {
                    reason
                        .child_elements()
                        .filter(|t| t.name.is(env, "Text"))
                        .map(|t| ReasonText {
                            text: t.text(),
                            lang: t.attribute(XML_NAMESPACE, "lang").map(str::to_owned),
                        })
                        .collect()
                })
                .unwrap_or_default();
            Ok(Fault {
                code,
                subcode,
                reasons,
                actor: fault.child(env, "Role").map(XmlElement::text),
                node: fault.child(env, "Node").map(XmlElement::text),
                detail: fault.child(env, "Detail").map(FaultDetail::from_element),
                source: None,
            })
        }
    }
}
