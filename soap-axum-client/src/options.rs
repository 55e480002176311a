//! Call options for per-request configuration.
//!
//! This module provides [`CallOptions`] for configuring individual SOAP calls
//! with timeouts, HTTP headers and SOAP header members.

use http::{HeaderMap, HeaderName, HeaderValue};
use soap_axum_core::{HeaderMembers, SoapHeader, Value};
use std::time::Duration;

/// Options for configuring individual SOAP calls.
///
/// # Example
///
/// ```
/// use soap_axum_client::CallOptions;
/// use std::time::Duration;
///
/// let options = CallOptions::new()
///     .timeout(Duration::from_secs(5))
///     .header_member("session", "s-42")
///     .try_header("x-request-id", "abc-123")
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// If set, overrides the client's default timeout.
    pub(crate) timeout: Option<Duration>,
    /// Extra HTTP headers. `Content-Type` and `SOAPAction` are always set by
    /// the client.
    pub(crate) headers: HeaderMap,
    /// Header members for this call, merged over the client's.
    pub(crate) members: HeaderMembers,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timeout covering the HTTP exchange of this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Add an HTTP header for this call.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Try to add an HTTP header for this call.
    ///
    /// Returns `None` if the header name or value is invalid.
    pub fn try_header<K, V>(mut self, name: K, value: V) -> Option<Self>
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
    {
        let name = name.try_into().ok()?;
        let value = value.try_into().ok()?;
        self.headers.insert(name, value);
        Some(self)
    }

    /// Set all HTTP headers for this call, replacing any existing headers.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn get_headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Set a typed SOAP header member for this call.
    pub fn header_member(mut self, member: impl Into<String>, value: impl Into<Value>) -> Self {
        self.members.set(member, value);
        self
    }

    /// Headers sent through a custom (unknown) header member.
    pub fn unknown_headers(mut self, member: impl Into<String>, headers: Vec<SoapHeader>) -> Self {
        self.members.set_unknown(member, headers);
        self
    }

    pub fn get_header_members(&self) -> &HeaderMembers {
        &self.members
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_options_default() {
        let options = CallOptions::new();
        assert!(options.timeout.is_none());
        assert!(options.members.is_empty());
    }

    #[test]
    fn test_call_options_timeout() {
        let options = CallOptions::new().timeout(Duration::from_secs(30));
        assert_eq!(options.get_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_call_options_try_header() {
        let options = CallOptions::new()
            .try_header("authorization", "Bearer token")
            .unwrap()
            .try_header("x-custom", "value")
            .unwrap();

        assert_eq!(options.headers.get("authorization").unwrap(), "Bearer token");
        assert_eq!(options.headers.get("x-custom").unwrap(), "value");
    }

    #[test]
    fn test_call_options_try_header_invalid() {
        let result = CallOptions::new().try_header("invalid\0name", "value");
        assert!(result.is_none());
    }

    #[test]
    fn test_call_options_headers_mut() {
        let mut options = CallOptions::new();
        options
            .headers_mut()
            .insert("x-custom", "value".parse().unwrap());
        assert_eq!(options.get_headers().get("x-custom").unwrap(), "value");
    }

    #[test]
    fn test_header_members() {
        let options = CallOptions::new()
            .header_member("session", "abc")
            .unknown_headers("extra", Vec::new());
        assert_eq!(
            options.get_header_members().get("session"),
            Some(&Value::String("abc".into()))
        );
        assert!(options.get_header_members().contains("extra"));
    }
}
