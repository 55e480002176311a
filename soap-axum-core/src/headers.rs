//! Mapping between decoded SOAP headers and named header members.

use std::collections::BTreeMap;

use crate::contract::{Direction, HeaderBinding};
use crate::envelope::SoapHeader;
use crate::fault::Fault;
use crate::value::Value;
use crate::version::SoapVersion;

pub const SOAP11_ACTOR_NEXT: &str = "http://schemas.xmlsoap.org/soap/actor/next";
pub const SOAP12_ROLE_NEXT: &str = "http://www.w3.org/2003/05/soap-envelope/role/next";
pub const SOAP12_ROLE_ULTIMATE_RECEIVER: &str =
    "http://www.w3.org/2003/05/soap-envelope/role/ultimateReceiver";

/// Which message a set of headers travels in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderFlow {
    Request,
    Response,
}

impl HeaderFlow {
    pub fn carries(&self, direction: Direction) -> bool {
        match self {
            Self::Request => direction.is_in(),
            Self::Response => direction.is_out(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberValue {
    Typed(Value),
    /// Headers collected by a custom member.
    Unknown(Vec<SoapHeader>),
}

/// Header values keyed by member name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderMembers {
    members: BTreeMap<String, MemberValue>,
}

impl HeaderMembers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, member: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(member, value);
        self
    }

    pub fn set(&mut self, member: impl Into<String>, value: impl Into<Value>) {
        self.members
            .insert(member.into(), MemberValue::Typed(value.into()));
    }

    pub fn set_unknown(&mut self, member: impl Into<String>, headers: Vec<SoapHeader>) {
        self.members
            .insert(member.into(), MemberValue::Unknown(headers));
    }

    pub fn get(&self, member: &str) -> Option<&Value> {
        match self.members.get(member)? {
            MemberValue::Typed(value) => Some(value),
            MemberValue::Unknown(_) => None,
        }
    }

    /// Headers held by a custom member; empty when unset.
    pub fn unknown(&self, member: &str) -> &[SoapHeader] {
        match self.members.get(member) {
            Some(MemberValue::Unknown(headers)) => headers,
            _ => &[],
        }
    }

    pub fn remove(&mut self, member: &str) -> Option<MemberValue> {
        self.members.remove(member)
    }

    pub fn contains(&self, member: &str) -> bool {
        self.members.contains_key(member)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MemberValue)> {
        self.members.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge `other` into `self`, replacing members present in both.
    pub fn extend(&mut self, other: HeaderMembers) {
        self.members.extend(other.members);
    }
}

/// Build the headers of an outgoing message from the member values whose
/// binding travels in `flow`. Unset and null typed members are skipped.
pub fn collect_headers(
    bindings: &[HeaderBinding],
    members: &HeaderMembers,
    flow: HeaderFlow,
) -> Vec<SoapHeader> {
    let mut headers = Vec::new();
    for binding in bindings.iter().filter(|b| flow.carries(b.direction)) {
        if binding.is_custom() {
            headers.extend(members.unknown(&binding.member).iter().cloned());
            continue;
        }
        match members.get(&binding.member) {
            Some(value) if !value.is_null() => headers.push(
                SoapHeader::typed(binding.name.clone(), value.clone())
                    .with_must_understand(binding.must_understand),
            ),
            _ => {}
        }
    }
    headers
}

/// Assign received headers to members. Headers no typed binding accepts go
/// to the first custom member of `flow`; when there is none they are
/// returned as not understood.
pub fn assign_headers(
    bindings: &[HeaderBinding],
    headers: Vec<SoapHeader>,
    flow: HeaderFlow,
) -> (HeaderMembers, Vec<SoapHeader>) {
    let mut members = HeaderMembers::new();
    let mut leftover = Vec::new();

    for header in headers {
        let typed = bindings
            .iter()
            .filter(|b| !b.is_custom() && flow.carries(b.direction))
            .find(|b| b.name == header.name);
        match (typed, header.value()) {
            (Some(binding), Some(value)) => members.set(binding.member.clone(), value.clone()),
            _ => leftover.push(header),
        }
    }

    let custom = bindings
        .iter()
        .find(|b| b.is_custom() && flow.carries(b.direction));
    if let Some(custom) = custom {
        members.set_unknown(custom.member.clone(), std::mem::take(&mut leftover));
    }
    (members, leftover)
}

/// Whether a header with this actor or role is addressed to the receiving node.
pub fn targets_this_node(version: SoapVersion, actor: Option<&str>) -> bool {
    match (version, actor) {
        (_, None) | (_, Some("")) => true,
        (SoapVersion::Soap11, Some(actor)) => actor == SOAP11_ACTOR_NEXT,
        (SoapVersion::Soap12, Some(role)) => {
            role == SOAP12_ROLE_NEXT || role == SOAP12_ROLE_ULTIMATE_RECEIVER
        }
    }
}

/// Fail with a `MustUnderstand` fault on the first header that was not
/// understood, is marked `mustUnderstand` and targets this node.
pub fn check_must_understand(version: SoapVersion, not_understood: &[SoapHeader]) -> Result<(), Fault> {
    match not_understood
        .iter()
        .find(|h| h.must_understand && targets_this_node(version, h.actor.as_deref()))
    {
        Some(header) => Err(Fault::must_understand(format!(
            "header {} was not understood",
            header.name
        ))),
        None => Ok(()),
    }
}
