//! Client builder.
//!
//! Provides a fluent API for configuring and building a [`SoapClient`].

use std::sync::Arc;
use std::time::Duration;

use http::Uri;
use soap_axum_core::{
    ContractRegistry, ExtensionFactory, HeaderMembers, SoapContract, SoapHeader, SoapVersion, Value,
};

use crate::ClientError;
use crate::client::{ClientInner, SoapClient};
use crate::transport::{HyperTransport, Transport};

/// Builder for creating a [`SoapClient`].
///
/// # Example
///
/// ```ignore
/// use soap_axum_client::ClientBuilder;
/// use soap_axum_core::{ContractRegistry, SoapVersion};
///
/// let registry = ContractRegistry::new();
/// let client = ClientBuilder::new("http://localhost:3000/calculator")
///     .version(SoapVersion::Soap12)
///     .timeout(Duration::from_secs(10))
///     .build::<Calculator>(&registry)?;
/// ```
pub struct ClientBuilder {
    /// Endpoint URL every call is posted to.
    url: String,
    version: SoapVersion,
    /// Default timeout for calls.
    default_timeout: Option<Duration>,
    /// `None` builds a [`HyperTransport`].
    transport: Option<Arc<dyn Transport>>,
    extensions: Vec<Arc<dyn ExtensionFactory>>,
    /// Header members sent with every call.
    members: HeaderMembers,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("url", &self.url)
            .field("version", &self.version)
            .field("default_timeout", &self.default_timeout)
            .field("transport", &self.transport.is_some())
            .field("extension_count", &self.extensions.len())
            .field("members", &self.members)
            .finish()
    }
}

impl ClientBuilder {
    /// The URL must be absolute, e.g. `http://localhost:3000/calculator`.
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            version: SoapVersion::default(),
            default_timeout: None,
            transport: None,
            extensions: Vec::new(),
            members: HeaderMembers::new(),
        }
    }

    /// SOAP version of every request. Default: SOAP 1.1.
    pub fn version(mut self, version: SoapVersion) -> Self {
        self.version = version;
        self
    }

    /// Default timeout for calls.
    ///
    /// Covers sending the request and reading the response. Individual calls
    /// can override it with [`CallOptions::timeout`].
    ///
    /// [`CallOptions::timeout`]: crate::CallOptions::timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Use a custom transport instead of [`HyperTransport`].
    pub fn transport<T: Transport>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Extension applied to every call, nearest the wire.
    ///
    /// Extensions are applied in the order they're added.
    pub fn extension<F: ExtensionFactory>(mut self, factory: F) -> Self {
        self.extensions.push(Arc::new(factory));
        self
    }

    /// Typed header member sent with every call that binds it.
    pub fn header_member(mut self, member: impl Into<String>, value: impl Into<Value>) -> Self {
        self.members.set(member, value);
        self
    }

    /// Headers sent with every call through a custom header member.
    pub fn unknown_headers(mut self, member: impl Into<String>, headers: Vec<SoapHeader>) -> Self {
        self.members.set_unknown(member, headers);
        self
    }

    /// Resolve the contract binding of `C` and build the client.
    pub fn build<C: SoapContract>(self, registry: &ContractRegistry) -> Result<SoapClient, ClientError> {
        let uri: Uri = self
            .url
            .parse()
            .map_err(|_| ClientError::InvalidUrl(self.url.clone()))?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(ClientError::InvalidUrl(self.url));
        }

        let contract = registry.get_binding::<C>(self.version)?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HyperTransport::new()?),
        };

        Ok(SoapClient::new(ClientInner {
            uri,
            version: self.version,
            contract,
            transport,
            extensions: self.extensions,
            members: self.members,
            default_timeout: self.default_timeout,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soap_axum_core::{ContractDescription, MethodDecl};

    struct Echo;

    impl SoapContract for Echo {
        fn describe() -> ContractDescription {
            ContractDescription::new("Echo").method(MethodDecl::new("Ping"))
        }
    }

    struct Broken;

    impl SoapContract for Broken {
        fn describe() -> ContractDescription {
            ContractDescription::new("Broken")
                .method(MethodDecl::new("Ping"))
                .method(MethodDecl::new("Ping"))
        }
    }

    #[tokio::test]
    async fn test_build_defaults() {
        let client = ClientBuilder::new("http://localhost:3000/echo")
            .build::<Echo>(&ContractRegistry::new())
            .unwrap();
        assert_eq!(client.version(), SoapVersion::Soap11);
        assert_eq!(client.uri(), "http://localhost:3000/echo");
    }

    #[test]
    fn test_relative_url_is_rejected() {
        let err = ClientBuilder::new("/echo")
            .build::<Echo>(&ContractRegistry::new())
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl(_)));
    }

    #[test]
    fn test_configuration_error_surfaces() {
        let err = ClientBuilder::new("http://localhost/broken")
            .build::<Broken>(&ContractRegistry::new())
            .unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
    }
}
