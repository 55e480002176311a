//! [`SoapService`]: one contract served over HTTP.
//!
//! ```rust,no_run
//! use soap_axum::{HandlerError, SoapCall, SoapReply, SoapService};
//! use soap_axum_core::{ContractDescription, ContractRegistry, MethodDecl, SoapContract, XmlType};
//!
//! struct Calculator;
//!
//! impl SoapContract for Calculator {
//!     fn describe() -> ContractDescription {
//!         ContractDescription::new("Calculator").namespace("urn:calc/").method(
//!             MethodDecl::new("Add")
//!                 .param("a", XmlType::Int)
//!                 .param("b", XmlType::Int)
//!                 .returns(XmlType::Int),
//!         )
//!     }
//! }
//!
//! async fn add(call: SoapCall) -> Result<SoapReply, HandlerError> {
//!     let a = call.arg("a").and_then(|v| v.as_i32()).unwrap_or_default();
//!     let b = call.arg("b").and_then(|v| v.as_i32()).unwrap_or_default();
//!     Ok(SoapReply::returning(a + b))
//! }
//!
//! # fn main() -> Result<(), soap_axum_core::ConfigurationError> {
//! let registry = ContractRegistry::new();
//! let service = SoapService::builder::<Calculator>()
//!     .handler("Add", add)
//!     .build(&registry)?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::convert::Infallible;
use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::future::BoxFuture;
use http::{Request, StatusCode};
use soap_axum_core::{
    ConfigurationError, ContractRegistry, ExtensionFactory, Fault, RequestHeaders,
    ServiceContract, SoapContract, SoapVersion,
};

use crate::dispatcher::{dispatch, plain_fault};
use crate::error::DispatchError;
use crate::handler::SoapHandler;
use crate::limits::MessageLimits;

pub(crate) struct ServiceInner {
    contracts: Vec<Arc<ServiceContract>>,
    pub(crate) handlers: HashMap<String, Arc<dyn SoapHandler>>,
    pub(crate) extensions: Vec<Arc<dyn ExtensionFactory>>,
    pub(crate) limits: MessageLimits,
    pub(crate) enforce_must_understand: bool,
}

impl ServiceInner {
    pub(crate) fn contract(&self, version: SoapVersion) -> Option<Arc<ServiceContract>> {
        self.contracts
            .iter()
            .find(|c| c.version() == version)
            .cloned()
    }
}

/// A SOAP endpoint for one contract. Cheap to clone.
///
/// Also a [`tower::Service`] over axum requests, so it can be mounted with
/// [`axum::routing::post_service`] or [`crate::SoapRouterBuilder`].
#[derive(Clone)]
pub struct SoapService {
    inner: Arc<ServiceInner>,
}

impl SoapService {
    pub fn builder<C: SoapContract>() -> SoapServiceBuilder<C> {
        SoapServiceBuilder::new()
    }

    /// Dispatch one buffered request.
    ///
    /// Faults are encoded in the returned response. `Err` means not even a
    /// fault could be written; see [`DispatchError`].
    pub async fn process_request(
        &self,
        request: Request<Bytes>,
    ) -> Result<http::Response<Bytes>, DispatchError> {
        dispatch(self.inner.clone(), request).await
    }

    pub fn limits(&self) -> MessageLimits {
        self.inner.limits
    }

    async fn serve(self, request: Request<Body>) -> Response {
        let (parts, body) = request.into_parts();
        let limit = self.inner.limits.receive_max_bytes_or_max();
        let bytes = match axum::body::to_bytes(body, limit).await {
            Ok(bytes) => bytes,
            Err(err) => {
                let version = RequestHeaders::from_headers(&parts.headers)
                    .map(|info| info.version)
                    .unwrap_or_default();
                tracing::debug!(error = %err, "failed to read request body");
                let fault = Fault::client(format!("could not read request body: {err}"));
                return match plain_fault(version, StatusCode::INTERNAL_SERVER_ERROR, &fault) {
                    Ok(response) => response.map(Body::from).into_response(),
                    Err(err) => err.into_response(),
                };
            }
        };
        match self.process_request(Request::from_parts(parts, bytes)).await {
            Ok(response) => response.map(Body::from).into_response(),
            Err(err) => err.into_response(),
        }
    }
}

impl std::fmt::Debug for SoapService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut handlers: Vec<_> = self.inner.handlers.keys().collect();
        handlers.sort();
        f.debug_struct("SoapService")
            .field("handlers", &handlers)
            .field("limits", &self.inner.limits)
            .finish()
    }
}

impl tower::Service<Request<Body>> for SoapService {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.serve(request).await) })
    }
}

/// Builder for [`SoapService`].
pub struct SoapServiceBuilder<C> {
    versions: Vec<SoapVersion>,
    handlers: HashMap<String, Arc<dyn SoapHandler>>,
    extensions: Vec<Arc<dyn ExtensionFactory>>,
    limits: MessageLimits,
    enforce_must_understand: bool,
    _contract: PhantomData<fn() -> C>,
}

impl<C: SoapContract> Default for SoapServiceBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: SoapContract> SoapServiceBuilder<C> {
    /// Serves SOAP 1.1 and 1.2 by default.
    pub fn new() -> Self {
        Self {
            versions: vec![SoapVersion::Soap11, SoapVersion::Soap12],
            handlers: HashMap::new(),
            extensions: Vec::new(),
            limits: MessageLimits::default(),
            enforce_must_understand: false,
            _contract: PhantomData,
        }
    }

    /// Serve only `version`; requests of the other version answer 415.
    pub fn version(mut self, version: SoapVersion) -> Self {
        self.versions = vec![version];
        self
    }

    pub fn handler<H: SoapHandler>(mut self, method: impl Into<String>, handler: H) -> Self {
        self.handlers.insert(method.into(), Arc::new(handler));
        self
    }

    /// Extension applied to every call, nearest the wire.
    pub fn extension<F: ExtensionFactory>(mut self, factory: F) -> Self {
        self.extensions.push(Arc::new(factory));
        self
    }

    pub fn message_limits(mut self, limits: MessageLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Answer a `MustUnderstand` fault for `mustUnderstand` headers addressed
    /// to this node that no member accepted. Off by default: such headers
    /// are skipped.
    pub fn enforce_must_understand(mut self, enforce: bool) -> Self {
        self.enforce_must_understand = enforce;
        self
    }

    pub fn build(self, registry: &ContractRegistry) -> Result<SoapService, ConfigurationError> {
        let contracts = self
            .versions
            .iter()
            .map(|v| registry.get_binding::<C>(*v))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(contract) = contracts.first() {
            for method in contract.methods() {
                if !self.handlers.contains_key(method.name()) {
                    return Err(ConfigurationError::MissingHandler {
                        method: method.name().to_owned(),
                    });
                }
            }
            let mut names: Vec<_> = self.handlers.keys().collect();
            names.sort();
            if let Some(unknown) = names.into_iter().find(|n| contract.method(n).is_none()) {
                return Err(ConfigurationError::UnknownHandler {
                    method: unknown.clone(),
                });
            }
        }

        Ok(SoapService {
            inner: Arc::new(ServiceInner {
                contracts,
                handlers: self.handlers,
                extensions: self.extensions,
                limits: self.limits,
                enforce_must_understand: self.enforce_must_understand,
            }),
        })
    }
}
