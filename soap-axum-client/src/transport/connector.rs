//! Connector setup for the hyper HTTP client.
//!
//! Without the `tls` feature only `http://` endpoints are reachable. With it,
//! the connector speaks both and verifies servers against the system roots.

use hyper_util::client::legacy::connect::HttpConnector;

#[cfg(feature = "tls")]
use std::sync::Arc;

#[cfg(feature = "tls")]
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
#[cfg(feature = "tls")]
use rustls::ClientConfig;

use crate::ClientError;

#[cfg(feature = "tls")]
pub(crate) type Connector = HttpsConnector<HttpConnector>;
#[cfg(not(feature = "tls"))]
pub(crate) type Connector = HttpConnector;

/// Whether this build can reach `https://` endpoints.
#[inline]
pub const fn has_tls_support() -> bool {
    cfg!(feature = "tls")
}

/// Ring provider, safe protocol versions, system root certificates.
#[cfg(feature = "tls")]
pub fn default_tls_config() -> Result<ClientConfig, ClientError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ClientError::Transport(format!("invalid TLS configuration: {e}")))?;

    let mut roots = rustls::RootCertStore::empty();
    let native_certs = rustls_native_certs::load_native_certs();
    if !native_certs.errors.is_empty() {
        // Some certificates may still have loaded
        #[cfg(feature = "tracing")]
        tracing::debug!("errors loading native certs: {:?}", native_certs.errors);
    }
    roots.add_parsable_certificates(native_certs.certs);

    Ok(builder.with_root_certificates(roots).with_no_client_auth())
}

/// Build an HTTP-only connector.
pub(crate) fn build_http_connector() -> HttpConnector {
    let mut connector = HttpConnector::new();
    connector.enforce_http(false);
    connector
}

#[cfg(feature = "tls")]
pub(crate) fn build_connector(tls_config: Option<ClientConfig>) -> Result<Connector, ClientError> {
    let config = match tls_config {
        Some(config) => config,
        None => default_tls_config()?,
    };
    Ok(HttpsConnectorBuilder::new()
        .with_tls_config(config)
        .https_or_http()
        .enable_http1()
        .wrap_connector(build_http_connector()))
}

#[cfg(not(feature = "tls"))]
pub(crate) fn build_connector() -> Result<Connector, ClientError> {
    Ok(build_http_connector())
}
