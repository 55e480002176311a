//! Client-side error type.
//!
//! This module provides [`ClientError`], the error type of every client operation.

use std::sync::Arc;
use std::time::Duration;

use soap_axum_core::{ConfigurationError, DecodeError, EncodeError, EnvelopeError, Fault};

/// Client-side error variants.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ClientError {
    /// The server, or an extension, answered with a fault.
    #[error("SOAP fault: {0}")]
    Fault(Fault),

    /// Connection failure or an HTTP status other than 200, 202 and 500.
    #[error("transport error: {0}")]
    Transport(String),

    /// The exchange did not finish within the configured timeout.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The request envelope could not be written.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// The HTTP request could not be built (for example an action that is
    /// not a valid header value).
    #[error("failed to build request: {0}")]
    Request(#[source] Arc<http::Error>),

    /// The response envelope did not match the method's types.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The response is not a well-formed envelope of the expected version.
    #[error("malformed response envelope: {0}")]
    Envelope(#[from] EnvelopeError),

    /// The response broke the HTTP binding: empty body, wrong media type, or
    /// a 500 without a fault.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("invalid endpoint url `{0}`")]
    InvalidUrl(String),

    /// The contract has no method of that name.
    #[error("method `{0}` is not defined on the contract")]
    UnknownMethod(String),

    /// `end_invoke` was already called for this call.
    #[error("the result of this call was already taken")]
    AlreadyCompleted,

    /// The call was aborted before it completed.
    #[error("the call was canceled")]
    Canceled,
}

impl ClientError {
    /// The fault, if the server answered with one.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            ClientError::Fault(fault) => Some(fault),
            _ => None,
        }
    }

    /// Transport failures and timeouts; the server may not have seen the call.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::Timeout(_))
    }
}

impl From<Fault> for ClientError {
    fn from(fault: Fault) -> Self {
        ClientError::Fault(fault)
    }
}

impl From<http::Error> for ClientError {
    fn from(err: http::Error) -> Self {
        ClientError::Request(Arc::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_accessor() {
        let err = ClientError::from(Fault::server("boom"));
        assert_eq!(err.fault().map(Fault::message), Some("boom"));
        assert!(!err.is_transport());
        assert!(ClientError::Timeout(Duration::from_secs(1)).is_transport());
    }

    #[test]
    fn test_typed_sources_are_kept() {
        use std::error::Error;

        let err = ClientError::from(DecodeError::MissingId("ref1".into()));
        assert_eq!(err.to_string(), "decode error: no element with id `ref1`");
        let source = err.source().expect("decode source");
        assert!(matches!(
            source.downcast_ref::<DecodeError>(),
            Some(DecodeError::MissingId(id)) if id == "ref1"
        ));

        let err = ClientError::from(EnvelopeError::MissingBody);
        assert!(err.source().unwrap().downcast_ref::<EnvelopeError>().is_some());

        let invalid = http::HeaderValue::from_str("bad\nvalue").unwrap_err();
        let err = ClientError::from(http::Error::from(invalid));
        assert!(err.source().unwrap().downcast_ref::<http::Error>().is_some());
    }

    #[test]
    fn test_display() {
        let err = ClientError::UnknownMethod("Divide".into());
        assert_eq!(err.to_string(), "method `Divide` is not defined on the contract");
    }
}
