//! SOAP client implementation.
//!
//! This module provides the main [`SoapClient`] type. Every call gets its own
//! [`ClientDispatcher`] with a fresh extension chain and message:
//!
//! ```text
//! BeforeSerialize -> write -> AfterSerialize -> encode -> POST
//!   -> decode -> BeforeDeserialize -> parse/read -> AfterDeserialize
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{HeaderMap, Request, Response, StatusCode, Uri, header};
use soap_axum_core::{
    ContentType, EnvelopeBody, ExtensionChain, ExtensionFactory, Fault, HeaderFlow,
    HeaderMembers, MessageSide, MessageStage, MethodBinding, ServiceContract, SoapHeader,
    SoapMessage, SoapVersion, Value, assign_headers, collect_headers, parse_envelope,
    write_envelope,
};
#[cfg(feature = "tracing")]
use tracing::Instrument;

use crate::ClientError;
use crate::builder::ClientBuilder;
use crate::options::CallOptions;
use crate::pending::PendingCall;
use crate::response::SoapResponse;
use crate::transport::Transport;

/// Check if a header name is set by the client itself.
///
/// Reserved headers are never overwritten by [`CallOptions`] headers.
fn is_reserved_header(name: &header::HeaderName) -> bool {
    name == header::CONTENT_TYPE
        || name == header::CONTENT_LENGTH
        || name.as_str() == soap_axum_core::SOAP_ACTION_HEADER
}

pub(crate) struct ClientInner {
    pub(crate) uri: Uri,
    pub(crate) version: SoapVersion,
    pub(crate) contract: Arc<ServiceContract>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) extensions: Vec<Arc<dyn ExtensionFactory>>,
    pub(crate) members: HeaderMembers,
    pub(crate) default_timeout: Option<Duration>,
}

/// SOAP client bound to one contract, one endpoint and one SOAP version.
///
/// Cheap to clone; clones share the transport and the contract binding.
///
/// # Example
///
/// ```ignore
/// use soap_axum_client::SoapClient;
///
/// let client = SoapClient::builder("http://localhost:3000/calculator")
///     .build::<Calculator>(&registry)?;
///
/// let response = client.invoke("Add", vec![2.into(), 3.into()]).await?;
/// assert_eq!(response.return_value(), Some(&Value::Int(5)));
/// ```
#[derive(Clone)]
pub struct SoapClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for SoapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoapClient")
            .field("uri", &self.inner.uri)
            .field("version", &self.inner.version)
            .field("contract", &self.inner.contract.name())
            .field("default_timeout", &self.inner.default_timeout)
            .finish_non_exhaustive()
    }
}

impl SoapClient {
    /// Equivalent to `ClientBuilder::new(url)`.
    pub fn builder<S: Into<String>>(url: S) -> ClientBuilder {
        ClientBuilder::new(url)
    }

    pub(crate) fn new(inner: ClientInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    pub fn version(&self) -> SoapVersion {
        self.inner.version
    }

    pub fn contract(&self) -> &ServiceContract {
        &self.inner.contract
    }

    /// Call `method` with its In and InOut arguments in declaration order.
    pub async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<SoapResponse, ClientError> {
        self.invoke_with_options(method, args, CallOptions::new()).await
    }

    pub async fn invoke_with_options(
        &self,
        method: &str,
        args: Vec<Value>,
        options: CallOptions,
    ) -> Result<SoapResponse, ClientError> {
        let binding = self
            .inner
            .contract
            .method(method)
            .cloned()
            .ok_or_else(|| ClientError::UnknownMethod(method.to_owned()))?;

        let call = ClientDispatcher::new(&self.inner, binding).call(args, options);

        #[cfg(feature = "tracing")]
        let call = call.instrument(tracing::info_span!(
            "soap.call",
            soap.method = method,
            soap.version = %self.inner.version,
            soap.contract = %self.inner.contract.name(),
            otel.kind = "client",
        ));

        call.await
    }

    /// Start `method` on a background task.
    ///
    /// Must be called within a Tokio runtime.
    pub fn begin_invoke(&self, method: &str, args: Vec<Value>) -> PendingCall {
        self.begin_invoke_with_callback(method, args, CallOptions::new(), || {})
    }

    /// Start `method` on a background task; `callback` runs once the result
    /// can be taken with [`PendingCall::end_invoke`], or once the call is
    /// aborted.
    pub fn begin_invoke_with_callback<F>(
        &self,
        method: &str,
        args: Vec<Value>,
        options: CallOptions,
        callback: F,
    ) -> PendingCall
    where
        F: FnOnce() + Send + 'static,
    {
        let client = self.clone();
        let method = method.to_owned();
        PendingCall::spawn(
            async move { client.invoke_with_options(&method, args, options).await },
            callback,
        )
    }
}

/// State of one call.
pub(crate) struct ClientDispatcher {
    inner: Arc<ClientInner>,
    method: Arc<MethodBinding>,
    chain: ExtensionChain,
    message: SoapMessage,
}

impl ClientDispatcher {
    fn new(inner: &Arc<ClientInner>, method: Arc<MethodBinding>) -> Self {
        Self {
            chain: ExtensionChain::for_method(&inner.extensions, &inner.contract, &method),
            message: SoapMessage::for_method(MessageSide::Client, inner.version, method.clone()),
            inner: inner.clone(),
            method,
        }
    }

    fn run_stage(&mut self, stage: MessageStage) -> Result<(), ClientError> {
        #[cfg(feature = "tracing")]
        tracing::trace!(%stage, extensions = self.chain.len(), "message stage");
        self.chain.run(&mut self.message, stage).map_err(ClientError::Fault)
    }

    async fn call(mut self, args: Vec<Value>, options: CallOptions) -> Result<SoapResponse, ClientError> {
        let version = self.inner.version;

        let mut members = self.inner.members.clone();
        members.extend(options.members);
        let headers = collect_headers(self.method.headers(), &members, HeaderFlow::Request);
        self.message.set_headers(headers);
        self.message.set_parameters(args);
        self.run_stage(MessageStage::BeforeSerialize)?;

        let body = write_envelope(
            version,
            self.message.headers(),
            self.method.headers(),
            EnvelopeBody::Parameters {
                codec: self.method.request_codec(),
                values: self.message.parameters(),
            },
        )?;
        self.message.set_payload(body.clone());
        self.run_stage(MessageStage::AfterSerialize)?;
        let body = self.chain.encode_stream(body)?;

        let request = self.build_request(body, options.headers)?;
        let timeout = options.timeout.or(self.inner.default_timeout);

        #[cfg(feature = "tracing")]
        tracing::debug!(uri = %self.inner.uri, action = %self.message.action(), "sending request");

        let response = exchange(self.inner.transport.send(request), timeout).await?;
        self.read_response(response)
    }

    fn build_request(&self, body: Bytes, extra: HeaderMap) -> Result<Request<Bytes>, ClientError> {
        let mut headers = self
            .inner
            .version
            .request_headers(self.message.action())
            .map_err(http::Error::from)?;
        for (name, value) in extra.iter() {
            if !is_reserved_header(name) {
                headers.append(name.clone(), value.clone());
            }
        }

        let mut request = Request::post(self.inner.uri.clone()).body(body)?;
        *request.headers_mut() = headers;
        Ok(request)
    }

    fn read_response(mut self, response: Response<Bytes>) -> Result<SoapResponse, ClientError> {
        let version = self.inner.version;
        let (parts, body) = response.into_parts();
        let status = parts.status;

        #[cfg(feature = "tracing")]
        tracing::debug!(%status, bytes = body.len(), "received response");

        match status {
            StatusCode::OK | StatusCode::ACCEPTED | StatusCode::INTERNAL_SERVER_ERROR => {}
            other => {
                return Err(ClientError::Transport(format!(
                    "unexpected HTTP status {other}"
                )));
            }
        }
        if body.is_empty() {
            return if status == StatusCode::INTERNAL_SERVER_ERROR {
                Err(ClientError::Transport(
                    "HTTP 500 without a SOAP fault".to_owned(),
                ))
            } else if self.method.is_one_way() || status == StatusCode::ACCEPTED {
                Ok(SoapResponse::accepted(self.method, status, parts.headers))
            } else {
                Err(ClientError::Protocol("empty response body".to_owned()))
            };
        }
        check_content_type(version, status, &parts.headers)?;

        let payload = self.chain.decode_stream(body)?;
        self.message.set_payload(payload.clone());
        self.run_stage(MessageStage::BeforeDeserialize)?;

        match self.read_envelope(&payload, status) {
            Ok(Received::Results { headers, results }) => {
                self.message.set_headers(headers);
                self.message.set_parameters(results);
                self.run_stage(MessageStage::AfterDeserialize)?;
            }
            Ok(Received::Fault(fault)) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(%fault, "call answered with a fault");
                self.message.set_fault(fault);
                self.run_stage(MessageStage::AfterDeserialize)?;
                let fault = self
                    .message
                    .fault()
                    .cloned()
                    .unwrap_or_else(|| Fault::server("fault was cleared by an extension"));
                return Err(ClientError::Fault(fault));
            }
            Err(err) => {
                // The read still finishes for extensions; the read error is reported.
                let _ = self.run_stage(MessageStage::AfterDeserialize);
                return Err(err);
            }
        }

        let (members, not_understood) = assign_headers(
            self.method.headers(),
            self.message.take_headers(),
            HeaderFlow::Response,
        );
        Ok(SoapResponse {
            results: self.message.take_parameters(),
            headers: members,
            not_understood,
            method: self.method,
            status,
            http_headers: parts.headers,
        })
    }

    fn read_envelope(&self, payload: &[u8], status: StatusCode) -> Result<Received, ClientError> {
        let envelope = parse_envelope(payload, self.inner.version)?;
        if let Some(fault) = envelope.fault() {
            return Ok(Received::Fault(fault?));
        }
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            return Err(ClientError::Protocol(
                "HTTP 500 response without a Fault body".to_owned(),
            ));
        }
        let headers = envelope.decode_headers(self.method.headers())?;
        let results = envelope.decode_body(self.method.response_codec())?;
        Ok(Received::Results { headers, results })
    }
}

/// What a response envelope carried.
enum Received {
    Results {
        headers: Vec<SoapHeader>,
        results: Vec<Value>,
    },
    Fault(Fault),
}

/// The transport exchange, bounded by `timeout`.
async fn exchange(
    send: BoxFuture<'static, Result<Response<Bytes>, ClientError>>,
    timeout: Option<Duration>,
) -> Result<Response<Bytes>, ClientError> {
    match timeout {
        Some(duration) => tokio::time::timeout(duration, send)
            .await
            .map_err(|_| ClientError::Timeout(duration))?,
        None => send.await,
    }
}

/// A SOAP body must come with the media type of the request's version.
fn check_content_type(
    version: SoapVersion,
    status: StatusCode,
    headers: &HeaderMap,
) -> Result<(), ClientError> {
    let value = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let content_type = ContentType::parse(value);
    if content_type.media_type.eq_ignore_ascii_case(version.media_type()) {
        return Ok(());
    }
    let message = format!("unexpected content type `{value}` for {version}");
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        Err(ClientError::Transport(format!("HTTP 500: {message}")))
    } else {
        Err(ClientError::Protocol(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_headers() {
        assert!(is_reserved_header(&header::CONTENT_TYPE));
        assert!(is_reserved_header(&header::HeaderName::from_static("soapaction")));
        assert!(!is_reserved_header(&header::AUTHORIZATION));
    }

    #[test]
    fn test_content_type_check() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "text/xml; charset=utf-8".parse().unwrap());
        assert!(check_content_type(SoapVersion::Soap11, StatusCode::OK, &headers).is_ok());
        assert!(matches!(
            check_content_type(SoapVersion::Soap12, StatusCode::OK, &headers),
            Err(ClientError::Protocol(_))
        ));

        headers.insert(header::CONTENT_TYPE, "text/html".parse().unwrap());
        assert!(matches!(
            check_content_type(SoapVersion::Soap11, StatusCode::INTERNAL_SERVER_ERROR, &headers),
            Err(ClientError::Transport(_))
        ));
    }
}
