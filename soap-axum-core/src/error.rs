//! Error types shared by client and server.
//!
//! - [`ConfigurationError`]: contract metadata rejected while building a binding
//! - [`EnvelopeError`]: the envelope frame itself is malformed
//! - [`EncodeError`] / [`DecodeError`]: body or header values do not fit their types

use crate::version::SoapVersion;
use crate::xml::{QName, XmlError};

/// Malformed contract metadata, detected when a contract is first bound.
///
/// Build failures are cached by the registry, so every caller asking for the
/// same contract sees the same error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("one-way method `{method}` must not return a value")]
    OneWayReturnsValue { method: String },

    #[error("one-way method `{method}` must not declare out parameter `{parameter}`")]
    OneWayOutParameter { method: String, parameter: String },

    #[error("method `{method}` references undeclared binding `{binding}`")]
    UnknownBinding { method: String, binding: String },

    #[error("header on method `{method}` binds to undeclared member `{member}`")]
    UnknownHeaderMember { method: String, member: String },

    #[error("methods `{first}` and `{second}` share the action `{action}`")]
    DuplicateAction {
        action: String,
        first: String,
        second: String,
    },

    #[error("methods `{first}` and `{second}` share the request element `{element}`")]
    DuplicateRequestElement {
        element: String,
        first: String,
        second: String,
    },

    #[error("method `{method}` is declared more than once")]
    DuplicateMethod { method: String },

    #[error("no handler registered for method `{method}`")]
    MissingHandler { method: String },

    #[error("handler registered for unknown method `{method}`")]
    UnknownHandler { method: String },
}

/// The message is not a well-formed envelope for the expected version.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EnvelopeError {
    #[error(transparent)]
    Xml(#[from] XmlError),

    #[error("root element {0} is not an Envelope")]
    NotAnEnvelope(QName),

    #[error("expected a {expected} envelope, received {found}")]
    VersionMismatch {
        expected: SoapVersion,
        found: SoapVersion,
    },

    #[error("Envelope is in unknown namespace `{0}`")]
    WrongNamespace(String),

    #[error("Envelope has no Body")]
    MissingBody,

    #[error("malformed fault: {0}")]
    MalformedFault(String),
}

impl EnvelopeError {
    /// Errors that mean the peer speaks another envelope version or not SOAP at all.
    pub fn is_version_mismatch(&self) -> bool {
        matches!(
            self,
            Self::NotAnEnvelope(_) | Self::VersionMismatch { .. } | Self::WrongNamespace(_)
        )
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EncodeError {
    #[error(transparent)]
    Xml(#[from] XmlError),

    #[error("expected {expected} values, got {found}")]
    ArgumentCount { expected: usize, found: usize },

    #[error("`{name}` expects {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: &'static str,
    },

    #[error("no binding for typed header {0}")]
    UnboundHeader(QName),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DecodeError {
    #[error("expected element {expected}, found {found}")]
    UnexpectedElement { expected: QName, found: QName },

    #[error("Body is empty, expected {0}")]
    MissingElement(QName),

    #[error("invalid value for `{name}`: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("no element with id `{0}`")]
    MissingId(String),
}
