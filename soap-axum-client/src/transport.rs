//! HTTP transport layer for the SOAP client.
//!
//! A [`Transport`] sends one buffered request and returns the buffered
//! response. [`HyperTransport`] is the default, using hyper_util's legacy
//! client with connection pooling; tests and embedders can plug in their own.
//!
//! # Feature Flags
//!
//! - `tls` - HTTPS through rustls (ring provider, system root certificates)
//!
//! # Example
//!
//! ```ignore
//! use soap_axum_client::transport::HyperTransportBuilder;
//! use std::time::Duration;
//!
//! let transport = HyperTransportBuilder::new()
//!     .pool_idle_timeout(Duration::from_secs(60))
//!     .build()?;
//! ```

mod connector;
mod hyper;

use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{Request, Response};

use crate::ClientError;

pub use connector::has_tls_support;
#[cfg(feature = "tls")]
pub use connector::default_tls_config;
pub use hyper::{HyperTransport, HyperTransportBuilder};

#[cfg(feature = "tls")]
pub use rustls::ClientConfig as TlsClientConfig;

/// Sends a serialized SOAP request.
///
/// Implementations must not interpret the status code; the client decides
/// which statuses carry a SOAP message.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: Request<Bytes>) -> BoxFuture<'static, Result<Response<Bytes>, ClientError>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: Request<Bytes>) -> BoxFuture<'static, Result<Response<Bytes>, ClientError>> {
        (**self).send(request)
    }
}
