//! Per-request server pipeline.
//!
//! ```text
//! content type -> decode (outer) -> parse -> route -> decode (inner)
//!   -> BeforeDeserialize -> decode headers/args -> AfterDeserialize
//!   -> handler -> BeforeSerialize -> write -> AfterSerialize -> encode
//! ```
//!
//! Every failure along the way becomes a fault envelope, and stages already
//! begun are completed around it. A [`ServerDispatcher`] is created for one
//! request and dropped with it.

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Request, Response, StatusCode, header};
use soap_axum_core::{
    EnvelopeBody, ExtensionChain, Fault, HeaderFlow, MessageSide, MessageStage, MethodBinding,
    ParsedEnvelope, RequestHeaders, RoutingStyle, ServiceContract, SoapMessage, SoapVersion,
    assign_headers, check_must_understand, collect_headers, parse_envelope, write_envelope,
};
use tracing::Instrument;

use crate::error::{
    DispatchError, decode_fault, encode_fault, envelope_fault, into_fault, method_not_defined,
};
use crate::handler::{SoapCall, SoapReply};
use crate::service::ServiceInner;

/// What a successfully dispatched request answers.
enum Outcome {
    Reply(Bytes),
    Accepted,
}

pub(crate) async fn dispatch(
    service: Arc<ServiceInner>,
    request: Request<Bytes>,
) -> Result<Response<Bytes>, DispatchError> {
    let (parts, body) = request.into_parts();

    let info = match RequestHeaders::from_headers(&parts.headers) {
        Ok(info) => info,
        Err(err) => {
            tracing::debug!(error = %err, "rejecting request with unsupported content type");
            let fault = Fault::client(err.to_string()).with_source(Arc::new(err));
            return plain_fault(SoapVersion::Soap11, StatusCode::UNSUPPORTED_MEDIA_TYPE, &fault);
        }
    };
    let Some(contract) = service.contract(info.version) else {
        tracing::debug!(version = %info.version, "SOAP version is not served");
        let fault = Fault::client(format!("{} is not supported by this endpoint", info.version));
        return plain_fault(SoapVersion::Soap11, StatusCode::UNSUPPORTED_MEDIA_TYPE, &fault);
    };

    let span = tracing::debug_span!(
        "soap.dispatch",
        contract = %contract.name(),
        version = %info.version,
        method = tracing::field::Empty,
    );
    let mut dispatcher = ServerDispatcher {
        chain: ExtensionChain::outer(&service.extensions, &contract),
        message: SoapMessage::new(MessageSide::Server, info.version),
        version: info.version,
        service,
        contract,
    };
    async move {
        match dispatcher.handle(body, info.action, parts.headers).await {
            Ok(Outcome::Reply(bytes)) => xml_response(StatusCode::OK, dispatcher.version, bytes),
            Ok(Outcome::Accepted) => accepted_response(),
            Err(fault) => dispatcher.fault_response(fault),
        }
    }
    .instrument(span)
    .await
}

pub(crate) fn xml_response(
    status: StatusCode,
    version: SoapVersion,
    body: Bytes,
) -> Result<Response<Bytes>, DispatchError> {
    Ok(Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, version.content_type())
        .body(body)?)
}

/// One-way methods answer with an empty 202.
fn accepted_response() -> Result<Response<Bytes>, DispatchError> {
    Ok(Response::builder()
        .status(StatusCode::ACCEPTED)
        .body(Bytes::new())?)
}

/// A fault response written without any extension.
pub(crate) fn plain_fault(
    version: SoapVersion,
    status: StatusCode,
    fault: &Fault,
) -> Result<Response<Bytes>, DispatchError> {
    let bytes = write_envelope(version, &[], &[], EnvelopeBody::Fault(fault))
        .map_err(DispatchError::FaultSerialization)?;
    xml_response(status, version, bytes)
}

pub(crate) struct ServerDispatcher {
    service: Arc<ServiceInner>,
    contract: Arc<ServiceContract>,
    version: SoapVersion,
    chain: ExtensionChain,
    message: SoapMessage,
}

impl ServerDispatcher {
    fn run_stage(&mut self, stage: MessageStage) -> Result<(), Fault> {
        tracing::trace!(%stage, extensions = self.chain.len(), "message stage");
        self.chain.run(&mut self.message, stage)
    }

    /// Applies to the body as received and again after each stream decode.
    fn check_receive_size(&self, len: usize) -> Result<(), Fault> {
        self.service.limits.check_size(len).map_err(Fault::client)
    }

    async fn handle(
        &mut self,
        body: Bytes,
        action: Option<String>,
        http_headers: HeaderMap,
    ) -> Result<Outcome, Fault> {
        self.check_receive_size(body.len())?;
        let payload = self.chain.decode_stream(body)?;
        self.check_receive_size(payload.len())?;
        let envelope = parse_envelope(&payload, self.version).map_err(envelope_fault)?;
        let method = self.route(action.as_deref(), &envelope)?;
        tracing::Span::current().record("method", method.name());
        tracing::debug!(action = ?action, "routed request");
        self.message.set_method(method.clone());

        let mut inner = ExtensionChain::inner(&self.contract, &method);
        let (payload, envelope) = if inner.is_empty() {
            (payload, envelope)
        } else {
            let decoded = inner.decode_stream(payload.clone())?;
            self.check_receive_size(decoded.len())?;
            if decoded == payload {
                (payload, envelope)
            } else {
                let envelope = parse_envelope(&decoded, self.version).map_err(envelope_fault)?;
                (decoded, envelope)
            }
        };
        self.chain.append(inner);
        self.message.set_payload(payload);

        self.run_stage(MessageStage::BeforeDeserialize)?;
        let headers = envelope
            .decode_headers(method.headers())
            .map_err(decode_fault)?;
        let args = envelope
            .decode_body(method.request_codec())
            .map_err(decode_fault)?;
        self.message.set_headers(headers);
        self.message.set_parameters(args);
        self.run_stage(MessageStage::AfterDeserialize)?;

        let (members, not_understood) = assign_headers(
            method.headers(),
            self.message.take_headers(),
            HeaderFlow::Request,
        );
        if self.service.enforce_must_understand {
            check_must_understand(self.version, &not_understood)?;
        }

        let handler = self
            .service
            .handlers
            .get(method.name())
            .cloned()
            .ok_or_else(|| Fault::server(format!("no handler for `{}`", method.name())))?;
        let call = SoapCall {
            method: method.clone(),
            version: self.version,
            args: self.message.take_parameters(),
            headers: members,
            not_understood,
            http_headers,
        };
        let result = handler.call(call).await;

        if method.is_one_way() {
            if let Err(err) = result {
                tracing::warn!(error = %err, "one-way handler failed");
            }
            return Ok(Outcome::Accepted);
        }
        let reply = result.map_err(into_fault)?;
        self.respond(&method, reply).map(Outcome::Reply)
    }

    fn route(
        &self,
        action: Option<&str>,
        envelope: &ParsedEnvelope,
    ) -> Result<Arc<MethodBinding>, Fault> {
        let by_element = || {
            envelope
                .first_body_element()
                .and_then(|e| self.contract.method_by_request_element(&e.name))
        };
        let found = match (self.contract.routing(), action) {
            (RoutingStyle::SoapAction, Some(action)) => {
                self.contract.method_by_action(action).or_else(|| {
                    let name = action.rsplit('/').next().unwrap_or(action);
                    self.contract.method(name)
                })
            }
            _ => by_element(),
        };
        found.cloned().ok_or_else(|| {
            let requested = match (self.contract.routing(), action) {
                (RoutingStyle::SoapAction, Some(action)) => action.to_owned(),
                _ => envelope
                    .first_body_element()
                    .map(|e| e.name.to_string())
                    .unwrap_or_default(),
            };
            tracing::debug!(%requested, "no method matches request");
            method_not_defined(&requested)
        })
    }

    fn respond(&mut self, method: &MethodBinding, reply: SoapReply) -> Result<Bytes, Fault> {
        let headers = collect_headers(method.headers(), &reply.headers, HeaderFlow::Response);
        self.message.set_headers(headers);
        self.message.set_parameters(reply.values);
        self.run_stage(MessageStage::BeforeSerialize)?;

        let bytes = write_envelope(
            self.version,
            self.message.headers(),
            method.headers(),
            EnvelopeBody::Parameters {
                codec: method.response_codec(),
                values: self.message.parameters(),
            },
        )
        .map_err(encode_fault)?;
        self.message.set_payload(bytes.clone());
        self.run_stage(MessageStage::AfterSerialize)?;

        let bytes = self.chain.encode_stream(bytes)?;
        self.service
            .limits
            .check_send_size(bytes.len())
            .map_err(Fault::server)?;
        Ok(bytes)
    }

    fn fault_response(&mut self, fault: Fault) -> Result<Response<Bytes>, DispatchError> {
        if fault.is_server() {
            tracing::warn!(fault = %fault, "request failed");
        } else {
            tracing::debug!(fault = %fault, "request rejected");
        }
        match self.write_fault(fault.clone()) {
            Ok(bytes) => xml_response(StatusCode::INTERNAL_SERVER_ERROR, self.version, bytes),
            Err(secondary) => {
                tracing::warn!(
                    error = %secondary,
                    "extension failed while writing fault, retrying without extensions"
                );
                plain_fault(self.version, StatusCode::INTERNAL_SERVER_ERROR, &fault)
            }
        }
    }

    /// Run the remaining stages around a fault envelope. A request that failed
    /// while being read finishes `AfterDeserialize` with the fault set first.
    fn write_fault(&mut self, fault: Fault) -> Result<Bytes, Fault> {
        self.message.set_fault(fault);
        if self.message.can_enter(MessageStage::AfterDeserialize) {
            self.run_stage(MessageStage::AfterDeserialize)?;
        }
        self.message.set_headers(Vec::new());
        self.message.set_parameters(Vec::new());
        if self.message.can_enter(MessageStage::BeforeSerialize) {
            self.run_stage(MessageStage::BeforeSerialize)?;
        }

        let fault = self
            .message
            .fault()
            .cloned()
            .unwrap_or_else(|| Fault::server("fault was cleared by an extension"));
        let bytes = write_envelope(self.version, &[], &[], EnvelopeBody::Fault(&fault))
            .map_err(encode_fault)?;
        self.message.set_payload(bytes.clone());
        if self.message.can_enter(MessageStage::AfterSerialize) {
            self.run_stage(MessageStage::AfterSerialize)?;
        }
        self.chain.encode_stream(bytes)
    }
}
