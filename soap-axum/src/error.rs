use std::sync::Arc;

use axum::{
    body::Body,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use soap_axum_core::{
    BAD_ARGUMENTS, DecodeError, EncodeError, EnvelopeError, Fault, FaultSubcode, MISSING_ID,
    PROCEDURE_NOT_PRESENT,
};

/// Error type returned by handlers.
///
/// A [`Fault`] is sent as is. Any other error becomes a Server fault whose
/// source is the original error.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// The server could not produce any SOAP response, not even a fault.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to serialize fault envelope: {0}")]
    FaultSerialization(#[source] EncodeError),
    #[error("failed to build HTTP response: {0}")]
    Http(#[from] http::Error),
}

impl IntoResponse for DispatchError {
    /// Empty 500 that closes the connection.
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "SOAP dispatch failed without a response");
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
            .headers_mut()
            .insert(header::CONNECTION, header::HeaderValue::from_static("close"));
        response
    }
}

pub(crate) fn into_fault(err: HandlerError) -> Fault {
    match err.downcast::<Fault>() {
        Ok(fault) => *fault,
        Err(err) => Fault::server(err.to_string()).with_source(Arc::from(err)),
    }
}

pub(crate) fn envelope_fault(err: EnvelopeError) -> Fault {
    let fault = match &err {
        EnvelopeError::NotAnEnvelope(_) => Fault::client(format!("version mismatch: {err}")),
        e if e.is_version_mismatch() => Fault::version_mismatch(err.to_string()),
        _ => Fault::client(format!("malformed request: {err}")),
    };
    fault.with_source(Arc::new(err))
}

pub(crate) fn decode_fault(err: DecodeError) -> Fault {
    let subcode = match err {
        DecodeError::MissingId(_) => MISSING_ID,
        _ => BAD_ARGUMENTS,
    };
    Fault::client(format!("could not deserialize request: {err}"))
        .with_subcode(FaultSubcode::new(subcode))
        .with_source(Arc::new(err))
}

pub(crate) fn encode_fault(err: EncodeError) -> Fault {
    Fault::server(format!("could not serialize response: {err}")).with_source(Arc::new(err))
}

pub(crate) fn method_not_defined(requested: &str) -> Fault {
    Fault::client(format!("method `{requested}` is not defined"))
        .with_subcode(FaultSubcode::new(PROCEDURE_NOT_PRESENT))
}
