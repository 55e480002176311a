//! SOAP protocol versions and their HTTP content types.
//!
//! The version of an exchange is detected from the request `Content-Type`
//! and decides the envelope namespace, the fault shape and where the action
//! travels (`SOAPAction` header for 1.1, `action` media-type parameter for
//! 1.2).

use std::fmt;

use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue, InvalidHeaderValue};

pub const SOAP11_ENVELOPE_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP12_ENVELOPE_NAMESPACE: &str = "http://www.w3.org/2003/05/soap-envelope";
pub const SOAP11_ENCODING_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/encoding/";
pub const SOAP12_ENCODING_NAMESPACE: &str = "http://www.w3.org/2003/05/soap-encoding";

/// HTTP header carrying the SOAP 1.1 action URI.
pub const SOAP_ACTION_HEADER: &str = "soapaction";

/// SOAP protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SoapVersion {
    /// SOAP 1.1 (`text/xml`)
    #[default]
    Soap11,
    /// SOAP 1.2 (`application/soap+xml`)
    Soap12,
}

impl SoapVersion {
    pub fn envelope_namespace(&self) -> &'static str {
        match self {
            Self::Soap11 => SOAP11_ENVELOPE_NAMESPACE,
            Self::Soap12 => SOAP12_ENVELOPE_NAMESPACE,
        }
    }

    pub fn encoding_namespace(&self) -> &'static str {
        match self {
            Self::Soap11 => SOAP11_ENCODING_NAMESPACE,
            Self::Soap12 => SOAP12_ENCODING_NAMESPACE,
        }
    }

    /// Prefix bound to the envelope namespace on written messages.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Soap11 => "soap",
            Self::Soap12 => "soap12",
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Soap11 => "text/xml",
            Self::Soap12 => "application/soap+xml",
        }
    }

    /// Full `Content-Type` value for messages without an action parameter.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Soap11 => "text/xml; charset=utf-8",
            Self::Soap12 => "application/soap+xml; charset=utf-8",
        }
    }

    /// `Content-Type` for a request. SOAP 1.2 carries the action in it.
    pub fn request_content_type(&self, action: &str) -> String {
        match self {
            Self::Soap11 => self.content_type().to_owned(),
            Self::Soap12 => format!("{}; action=\"{action}\"", self.content_type()),
        }
    }

    /// Which version an envelope namespace belongs to.
    pub fn from_envelope_namespace(namespace: &str) -> Option<Self> {
        match namespace {
            SOAP11_ENVELOPE_NAMESPACE => Some(Self::Soap11),
            SOAP12_ENVELOPE_NAMESPACE => Some(Self::Soap12),
            _ => None,
        }
    }

    /// Detect the version from a `Content-Type` header value.
    pub fn from_content_type(value: &str) -> Result<(Self, ContentType), ContentTypeError> {
        let content_type = ContentType::parse(value);
        let version = if content_type.media_type.eq_ignore_ascii_case(Self::Soap11.media_type()) {
            Self::Soap11
        } else if content_type
            .media_type
            .eq_ignore_ascii_case(Self::Soap12.media_type())
        {
            Self::Soap12
        } else {
            return Err(ContentTypeError::Unsupported(value.to_owned()));
        };
        match content_type.charset.as_deref() {
            Some(charset) if charset.eq_ignore_ascii_case("utf-8") => {}
            Some(charset) => return Err(ContentTypeError::Charset(charset.to_owned())),
            None if version == Self::Soap11 => return Err(ContentTypeError::MissingCharset),
            None => {}
        }
        Ok((version, content_type))
    }
}

impl SoapVersion {
    /// HTTP headers of an outgoing request for `action`.
    pub fn request_headers(&self, action: &str) -> Result<HeaderMap, InvalidHeaderValue> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&self.request_content_type(action))?,
        );
        if *self == Self::Soap11 {
            headers.insert(
                SOAP_ACTION_HEADER,
                HeaderValue::from_str(&format!("\"{action}\""))?,
            );
        }
        Ok(headers)
    }
}

/// Version and action of an incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeaders {
    pub version: SoapVersion,
    /// `None` when no action was sent or it was empty.
    pub action: Option<String>,
}

impl RequestHeaders {
    /// SOAP 1.1 reads the `SOAPAction` header. SOAP 1.2 reads the `action`
    /// content-type parameter and falls back to `SOAPAction`.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ContentTypeError> {
        let value = headers
            .get(CONTENT_TYPE)
            .ok_or(ContentTypeError::Missing)?
            .to_str()
            .map_err(|_| ContentTypeError::Unsupported("<non-ascii>".into()))?;
        let (version, content_type) = SoapVersion::from_content_type(value)?;
        let header_action = headers
            .get(SOAP_ACTION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| unquote(v).to_owned());
        let action = match version {
            SoapVersion::Soap11 => header_action,
            SoapVersion::Soap12 => content_type.action.or(header_action),
        };
        Ok(Self {
            version,
            action: action.filter(|a| !a.is_empty()),
        })
    }
}

impl fmt::Display for SoapVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Soap11 => f.write_str("SOAP 1.1"),
            Self::Soap12 => f.write_str("SOAP 1.2"),
        }
    }
}

/// A parsed `Content-Type` value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentType {
    pub media_type: String,
    pub charset: Option<String>,
    pub action: Option<String>,
}

impl ContentType {
    /// Parameter names are matched case-sensitively (`charset=`, `action=`).
    pub fn parse(value: &str) -> Self {
        let mut parts = value.split(';');
        let media_type = parts.next().unwrap_or_default().trim().to_owned();
        let mut charset = None;
        let mut action = None;
        for param in parts {
            let param = param.trim();
            if let Some(v) = param.strip_prefix("charset=") {
                charset = Some(unquote(v).to_owned());
            } else if let Some(v) = param.strip_prefix("action=") {
                action = Some(unquote(v).to_owned());
            }
        }
        Self {
            media_type,
            charset,
            action,
        }
    }
}

/// Strip one pair of surrounding double quotes.
pub fn unquote(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentTypeError {
    #[error("missing content type")]
    Missing,
    #[error("unsupported content type `{0}`")]
    Unsupported(String),
    #[error("unsupported charset `{0}`")]
    Charset(String),
    #[error("content type is missing the charset parameter")]
    MissingCharset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_headers_round_trip() {
        let headers = SoapVersion::Soap11.request_headers("urn:calc/Add").unwrap();
        assert_eq!(headers.get(SOAP_ACTION_HEADER).unwrap(), "\"urn:calc/Add\"");
        let parsed = RequestHeaders::from_headers(&headers).unwrap();
        assert_eq!(parsed.version, SoapVersion::Soap11);
        assert_eq!(parsed.action.as_deref(), Some("urn:calc/Add"));

        let headers = SoapVersion::Soap12.request_headers("urn:calc/Add").unwrap();
        assert!(headers.get(SOAP_ACTION_HEADER).is_none());
        let parsed = RequestHeaders::from_headers(&headers).unwrap();
        assert_eq!(parsed.version, SoapVersion::Soap12);
        assert_eq!(parsed.action.as_deref(), Some("urn:calc/Add"));
    }

    #[test]
    fn test_request_headers_empty_action_and_missing_type() {
        let mut headers = HeaderMap::new();
        assert_eq!(
            RequestHeaders::from_headers(&headers),
            Err(ContentTypeError::Missing)
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/xml; charset=utf-8"));
        headers.insert(SOAP_ACTION_HEADER, HeaderValue::from_static("\"\""));
        assert_eq!(RequestHeaders::from_headers(&headers).unwrap().action, None);
    }

    #[test]
    fn test_from_content_type() {
        let (v, _) = SoapVersion::from_content_type("text/xml; charset=utf-8").unwrap();
        assert_eq!(v, SoapVersion::Soap11);
        let (v, _) = SoapVersion::from_content_type("TEXT/XML;charset=\"UTF-8\"").unwrap();
        assert_eq!(v, SoapVersion::Soap11);
        let (v, ct) = SoapVersion::from_content_type(
            "application/soap+xml; charset=utf-8; action=\"urn:calc/Add\"",
        )
        .unwrap();
        assert_eq!(v, SoapVersion::Soap12);
        assert_eq!(ct.action.as_deref(), Some("urn:calc/Add"));
    }

    #[test]
    fn test_from_content_type_rejections() {
        assert_eq!(
            SoapVersion::from_content_type("application/json"),
            Err(ContentTypeError::Unsupported("application/json".into()))
        );
        assert_eq!(
            SoapVersion::from_content_type("text/xml; charset=iso-8859-1"),
            Err(ContentTypeError::Charset("iso-8859-1".into()))
        );
        assert_eq!(
            SoapVersion::from_content_type("text/xml"),
            Err(ContentTypeError::MissingCharset)
        );
        // charset token is case-sensitive
        assert_eq!(
            SoapVersion::from_content_type("text/xml; Charset=utf-8"),
            Err(ContentTypeError::MissingCharset)
        );
        assert!(SoapVersion::from_content_type("application/soap+xml").is_ok());
    }

    #[test]
    fn test_request_content_type() {
        assert_eq!(
            SoapVersion::Soap11.request_content_type("urn:a"),
            "text/xml; charset=utf-8"
        );
        assert_eq!(
            SoapVersion::Soap12.request_content_type("urn:a"),
            "application/soap+xml; charset=utf-8; action=\"urn:a\""
        );
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"urn:x\""), "urn:x");
        assert_eq!(unquote("urn:x"), "urn:x");
        assert_eq!(unquote("\""), "\"");
    }
}
