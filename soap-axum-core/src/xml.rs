//! Namespace-aware XML tree, reader and writer.
//!
//! Everything above this module compares names by `(namespace, local name)`
//! through [`QName`]. Prefixes only exist on the wire: the reader resolves
//! them while parsing, and [`XmlWriter`] picks (or generates) prefixes while
//! writing.

use std::borrow::Cow;
use std::fmt;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::{Namespace, PrefixDeclaration, ResolveResult};
use quick_xml::reader::NsReader;
use quick_xml::writer::Writer;

/// The namespace permanently bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
/// XML Schema instance namespace (`xsi`).
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
/// XML Schema namespace (`xsd`).
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// A namespace-qualified name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    namespace: Cow<'static, str>,
    local: Cow<'static, str>,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: Cow::Owned(namespace.into()),
            local: Cow::Owned(local.into()),
        }
    }

    /// A name usable in `const` items.
    pub const fn from_static(namespace: &'static str, local: &'static str) -> Self {
        Self {
            namespace: Cow::Borrowed(namespace),
            local: Cow::Borrowed(local),
        }
    }

    /// A name in no namespace.
    pub fn unqualified(local: impl Into<String>) -> Self {
        Self::new(String::new(), local)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn local_name(&self) -> &str {
        &self.local
    }

    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.namespace == namespace && self.local == local
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlAttribute {
    pub name: QName,
    pub value: String,
}

impl XmlAttribute {
    pub fn new(name: QName, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An element with resolved names.
///
/// `namespaces` records the `xmlns` declarations made on this element. They
/// are needed to resolve QName-valued text (`faultcode`, `xsi:type`) and are
/// re-declared when the element is written again. They do not take part in
/// equality: two elements are equal when names, attributes and children are.
#[derive(Clone, Debug, Default)]
pub struct XmlElement {
    pub name: QName,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlNode>,
    pub namespaces: Vec<(String, String)>,
}

impl PartialEq for XmlElement {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.attributes == other.attributes
            && self.children == other.children
    }
}

impl XmlElement {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: QName, value: impl Into<String>) -> Self {
        self.attributes.push(XmlAttribute::new(name, value));
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    pub fn first_child_element(&self) -> Option<&XmlElement> {
        self.child_elements().next()
    }

    /// First child element named `(namespace, local)`.
    pub fn child(&self, namespace: &str, local: &str) -> Option<&XmlElement> {
        self.child_elements().find(|e| e.name.is(namespace, local))
    }

    pub fn attribute(&self, namespace: &str, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.is(namespace, local))
            .map(|a| a.value.as_str())
    }

    /// Concatenated text content of the direct children.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let XmlNode::Text(text) = node {
                out.push_str(text);
            }
        }
        out
    }

    /// `xsi:nil="true"`.
    pub fn is_nil(&self) -> bool {
        matches!(
            self.attribute(XSI_NAMESPACE, "nil").map(str::trim),
            Some("true") | Some("1")
        )
    }
}

/// Resolve a `prefix:local` text value against namespace declarations, given
/// the declaring elements from outermost to innermost.
pub fn resolve_qname_text(text: &str, scopes: &[&XmlElement]) -> Option<QName> {
    let text = text.trim();
    let (prefix, local) = match text.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", text),
    };
    if prefix == "xml" {
        return Some(QName::new(XML_NAMESPACE, local));
    }
    for scope in scopes.iter().rev() {
        if let Some((_, ns)) = scope.namespaces.iter().find(|(p, _)| p == prefix) {
            return Some(QName::new(ns.clone(), local));
        }
    }
    if prefix.is_empty() {
        Some(QName::unqualified(local))
    } else {
        None
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum XmlError {
    #[error("malformed XML: {0}")]
    Malformed(String),
    #[error("undeclared namespace prefix `{0}`")]
    UnknownPrefix(String),
    #[error("document has no root element")]
    NoRoot,
    #[error("failed to write XML: {0}")]
    Write(String),
}

fn utf8(bytes: &[u8]) -> Result<&str, XmlError> {
    std::str::from_utf8(bytes).map_err(|e| XmlError::Malformed(e.to_string()))
}

fn namespace_of(resolved: ResolveResult<'_>) -> Result<String, XmlError> {
    match resolved {
        ResolveResult::Bound(Namespace(ns)) => Ok(utf8(ns)?.to_owned()),
        ResolveResult::Unbound => Ok(String::new()),
        ResolveResult::Unknown(prefix) => Err(XmlError::UnknownPrefix(
            String::from_utf8_lossy(&prefix).into_owned(),
        )),
    }
}

fn push_text(stack: &mut [XmlElement], text: &str) {
    let Some(current) = stack.last_mut() else {
        return;
    };
    if let Some(XmlNode::Text(last)) = current.children.last_mut() {
        last.push_str(text);
    } else {
        current.children.push(XmlNode::Text(text.to_owned()));
    }
}

/// Whitespace between child elements is formatting, not content. Mixed
/// content keeps every text node.
fn strip_formatting(element: &mut XmlElement) {
    let has_elements = element
        .children
        .iter()
        .any(|c| matches!(c, XmlNode::Element(_)));
    let has_text = element
        .children
        .iter()
        .any(|c| matches!(c, XmlNode::Text(t) if !t.trim().is_empty()));
    if has_elements && !has_text {
        element
            .children
            .retain(|c| !matches!(c, XmlNode::Text(t) if t.trim().is_empty()));
    }
}

/// Parse a complete document into its root element.
pub fn parse_document(input: &[u8]) -> Result<XmlElement, XmlError> {
    let mut reader = NsReader::from_reader(input);
    reader.config_mut().expand_empty_elements = true;

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root = None;

    loop {
        let (resolved, event) = reader
            .read_resolved_event()
            .map_err(|e| XmlError::Malformed(e.to_string()))?;
        let namespace = namespace_of(resolved);
        match event {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(XmlError::Malformed("content after root element".into()));
                }
                let local = utf8(start.local_name().into_inner())?.to_owned();
                let mut element = XmlElement::new(QName::new(namespace?, local));
                for attr in start.attributes() {
                    let attr = attr.map_err(|e| XmlError::Malformed(e.to_string()))?;
                    let value = attr
                        .decode_and_unescape_value(reader.decoder())
                        .map_err(|e| XmlError::Malformed(e.to_string()))?
                        .into_owned();
                    if let Some(binding) = attr.key.as_namespace_binding() {
                        let prefix = match binding {
                            PrefixDeclaration::Default => String::new(),
                            PrefixDeclaration::Named(prefix) => utf8(prefix)?.to_owned(),
                        };
                        element.namespaces.push((prefix, value));
                        continue;
                    }
                    let (attr_ns, local) = reader.resolve_attribute(attr.key);
                    let name = QName::new(namespace_of(attr_ns)?, utf8(local.into_inner())?);
                    element.attributes.push(XmlAttribute { name, value });
                }
                stack.push(element);
            }
            Event::End(_) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| XmlError::Malformed("unbalanced end tag".into()))?;
                strip_formatting(&mut element);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlNode::Element(element)),
                    None => root = Some(element),
                }
            }
            Event::Text(text) => push_text(&mut stack, utf8(&text)?),
            Event::CData(data) => push_text(&mut stack, utf8(&data)?),
            Event::GeneralRef(reference) => {
                let resolved = match reference
                    .resolve_char_ref()
                    .map_err(|e| XmlError::Malformed(e.to_string()))?
                {
                    Some(ch) => ch.to_string(),
                    None => {
                        let name = utf8(&reference)?;
                        quick_xml::escape::resolve_predefined_entity(name)
                            .ok_or_else(|| {
                                XmlError::Malformed(format!("unknown entity `&{name};`"))
                            })?
                            .to_owned()
                    }
                };
                push_text(&mut stack, &resolved);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(XmlError::Malformed("unexpected end of document".into()));
    }
    root.ok_or(XmlError::NoRoot)
}

/// Streaming writer that keeps track of in-scope namespace bindings.
pub struct XmlWriter {
    writer: Writer<Vec<u8>>,
    scopes: Vec<Vec<(String, String)>>,
    open: Vec<String>,
    generated: usize,
}

impl XmlWriter {
    /// A writer that has already emitted the XML declaration.
    pub fn new() -> Result<Self, XmlError> {
        let mut writer = Self {
            writer: Writer::new(Vec::new()),
            scopes: vec![vec![("xml".to_owned(), XML_NAMESPACE.to_owned())]],
            open: Vec::new(),
            generated: 0,
        };
        writer.emit(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        Ok(writer)
    }

    fn emit(&mut self, event: Event<'_>) -> Result<(), XmlError> {
        self.writer
            .write_event(event)
            .map_err(|e| XmlError::Write(e.to_string()))
    }

    fn resolve_prefix(&self, prefix: &str) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(p, _)| p == prefix)
            .map(|(_, ns)| ns.as_str())
    }

    fn bound_prefix(&self, namespace: &str, allow_default: bool) -> Option<String> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .filter(|(p, ns)| ns == namespace && (allow_default || !p.is_empty()))
            .map(|(p, _)| p)
            .find(|p| self.resolve_prefix(p) == Some(namespace))
            .cloned()
    }

    fn fresh_prefix(&mut self) -> String {
        loop {
            self.generated += 1;
            let candidate = format!("q{}", self.generated);
            if self.resolve_prefix(&candidate).is_none() {
                return candidate;
            }
        }
    }

    /// Prefix to use for a QName-valued attribute or text in the element about
    /// to be started. Returns the prefix and, when the namespace is not yet
    /// bound, the declaration to pass to [`XmlWriter::start`].
    pub fn prefix_for_value(&mut self, namespace: &str) -> (String, Option<(String, String)>) {
        if namespace.is_empty() {
            return (String::new(), None);
        }
        match self.bound_prefix(namespace, false) {
            Some(prefix) => (prefix, None),
            None => {
                let prefix = self.fresh_prefix();
                (prefix.clone(), Some((prefix, namespace.to_owned())))
            }
        }
    }

    /// Start an element. `declarations` are `(prefix, namespace)` pairs to
    /// declare on it; the empty prefix declares the default namespace.
    pub fn start(
        &mut self,
        name: &QName,
        declarations: &[(String, String)],
        attributes: &[XmlAttribute],
    ) -> Result<(), XmlError> {
        self.scopes.push(declarations.to_vec());
        let mut extra: Vec<(String, String)> = Vec::new();

        let element_prefix = if name.namespace().is_empty() {
            if self.resolve_prefix("").is_some_and(|ns| !ns.is_empty()) {
                extra.push((String::new(), String::new()));
            }
            String::new()
        } else if let Some(prefix) = self.bound_prefix(name.namespace(), true) {
            prefix
        } else {
            let prefix = self.fresh_prefix();
            extra.push((prefix.clone(), name.namespace().to_owned()));
            prefix
        };
        if let Some(scope) = self.scopes.last_mut() {
            scope.extend(extra.iter().cloned());
        }

        let mut qualified_attrs = Vec::with_capacity(attributes.len());
        for attr in attributes {
            let ns = attr.name.namespace();
            let key = if ns.is_empty() {
                attr.name.local_name().to_owned()
            } else {
                let prefix = match self.bound_prefix(ns, false) {
                    Some(prefix) => prefix,
                    None => {
                        let prefix = self.fresh_prefix();
                        extra.push((prefix.clone(), ns.to_owned()));
                        if let Some(scope) = self.scopes.last_mut() {
                            scope.push((prefix.clone(), ns.to_owned()));
                        }
                        prefix
                    }
                };
                format!("{prefix}:{}", attr.name.local_name())
            };
            qualified_attrs.push((key, attr.value.as_str()));
        }

        let qualified = if element_prefix.is_empty() {
            name.local_name().to_owned()
        } else {
            format!("{element_prefix}:{}", name.local_name())
        };

        let mut start = BytesStart::new(qualified.clone());
        for (prefix, ns) in declarations.iter().chain(extra.iter()) {
            let key = if prefix.is_empty() {
                "xmlns".to_owned()
            } else {
                format!("xmlns:{prefix}")
            };
            start.push_attribute((key.as_str(), ns.as_str()));
        }
        for (key, value) in &qualified_attrs {
            start.push_attribute((key.as_str(), *value));
        }
        self.emit(Event::Start(start))?;
        self.open.push(qualified);
        Ok(())
    }

    pub fn text(&mut self, text: &str) -> Result<(), XmlError> {
        if text.is_empty() {
            return Ok(());
        }
        self.emit(Event::Text(BytesText::new(text)))
    }

    pub fn end(&mut self) -> Result<(), XmlError> {
        let qualified = self
            .open
            .pop()
            .ok_or_else(|| XmlError::Write("end without matching start".into()))?;
        self.scopes.pop();
        self.emit(Event::End(BytesEnd::new(qualified)))
    }

    /// `<name attrs>text</name>`.
    pub fn text_element(
        &mut self,
        name: &QName,
        attributes: &[XmlAttribute],
        text: &str,
    ) -> Result<(), XmlError> {
        self.start(name, &[], attributes)?;
        self.text(text)?;
        self.end()
    }

    /// Write a whole tree, re-declaring the namespaces it was parsed with.
    pub fn element(&mut self, element: &XmlElement) -> Result<(), XmlError> {
        self.start(&element.name, &element.namespaces, &element.attributes)?;
        self.nodes(&element.children)?;
        self.end()
    }

    pub fn nodes(&mut self, nodes: &[XmlNode]) -> Result<(), XmlError> {
        for node in nodes {
            match node {
                XmlNode::Element(child) => self.element(child)?,
                XmlNode::Text(text) => self.text(text)?,
            }
        }
        Ok(())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolves_namespaces_not_prefixes() {
        let doc = br#"<?xml version="1.0"?>
            <a:root xmlns:a="urn:x" xmlns="urn:default">
                <child b:attr="1" xmlns:b="urn:b">text &amp; more</child>
            </a:root>"#;
        let root = parse_document(doc).unwrap();
        assert!(root.name.is("urn:x", "root"));
        let child = root.child("urn:default", "child").unwrap();
        assert_eq!(child.attribute("urn:b", "attr"), Some("1"));
        assert_eq!(child.text(), "text & more");
        assert_eq!(root.children.len(), 1);
    }

    #[test]
    fn test_mixed_content_keeps_whitespace() {
        let root = parse_document(b"<p>one <b>two</b> <i>three</i> four</p>").unwrap();
        assert_eq!(root.children.len(), 5);
        assert_eq!(root.text(), "one   four");
        assert_eq!(root.children[2], XmlNode::Text(" ".into()));

        // element-only content is still compacted
        let root = parse_document(b"<p>\n  <b/>\n  <i/>\n</p>").unwrap();
        assert_eq!(root.children.len(), 2);
    }

    #[test]
    fn test_parse_rejects_unknown_prefix() {
        let err = parse_document(b"<p:root/>").unwrap_err();
        assert!(matches!(err, XmlError::UnknownPrefix(p) if p == "p"));
    }

    #[test]
    fn test_parse_char_refs() {
        let root = parse_document(b"<r>&#65;&#x42;&lt;</r>").unwrap();
        assert_eq!(root.text(), "AB<");
    }

    #[test]
    fn test_writer_generates_and_reuses_prefixes() {
        let mut w = XmlWriter::new().unwrap();
        let root = QName::new("urn:one", "root");
        w.start(&root, &[("p".into(), "urn:one".into())], &[]).unwrap();
        w.text_element(&QName::new("urn:two", "x"), &[], "1").unwrap();
        w.text_element(&QName::new("urn:one", "y"), &[], "2").unwrap();
        w.text_element(&QName::unqualified("z"), &[], "3").unwrap();
        w.end().unwrap();
        let text = String::from_utf8(w.into_bytes()).unwrap();
        assert!(text.contains("<p:root xmlns:p=\"urn:one\">"));
        assert!(text.contains("<q1:x xmlns:q1=\"urn:two\">1</q1:x>"));
        assert!(text.contains("<p:y>2</p:y>"));
        assert!(text.contains("<z>3</z>"));

        let parsed = parse_document(text.as_bytes()).unwrap();
        assert!(parsed.child("urn:two", "x").is_some());
        assert!(parsed.child("", "z").is_some());
    }

    #[test]
    fn test_unqualified_child_under_default_namespace() {
        let mut w = XmlWriter::new().unwrap();
        w.start(
            &QName::new("urn:d", "root"),
            &[(String::new(), "urn:d".into())],
            &[],
        )
        .unwrap();
        w.text_element(&QName::unqualified("plain"), &[], "v").unwrap();
        w.end().unwrap();
        let parsed = parse_document(&w.into_bytes()).unwrap();
        assert_eq!(parsed.child("", "plain").map(|e| e.text()), Some("v".into()));
    }

    #[test]
    fn test_resolve_qname_text() {
        let root = parse_document(br#"<r xmlns:s="urn:s"><c>s:Client</c></r>"#).unwrap();
        let c = root.first_child_element().unwrap();
        let name = resolve_qname_text(&c.text(), &[&root, c]).unwrap();
        assert!(name.is("urn:s", "Client"));
        assert!(resolve_qname_text("zz:Nope", &[&root]).is_none());
    }
}
