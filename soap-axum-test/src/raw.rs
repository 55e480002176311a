//! Hand-written requests for cases the client never produces.

use bytes::Bytes;
use http::{Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use soap_axum_core::{Fault, SoapVersion, parse_envelope};

use crate::server::TestServer;

pub struct RawResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Bytes,
}

impl RawResponse {
    /// Decode the fault carried in the body.
    pub fn fault(&self, version: SoapVersion) -> anyhow::Result<Fault> {
        let envelope = parse_envelope(&self.body, version)?;
        match envelope.fault() {
            Some(fault) => Ok(fault?),
            None => anyhow::bail!("expected a fault body, got: {}", String::from_utf8_lossy(&self.body)),
        }
    }
}

/// POST `body` over a fresh HTTP/1.1 connection.
pub async fn post(
    server: &TestServer,
    path: &str,
    headers: &[(&str, &str)],
    body: impl Into<Bytes>,
) -> anyhow::Result<RawResponse> {
    let stream = TcpStream::connect(server.addr()).await?;
    let io = TokioIo::new(stream);

    let (mut sender, conn) = http1::handshake(io).await?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("connection error: {e}");
        }
    });

    let mut req = Request::builder()
        .method("POST")
        .uri(path)
        .header("Host", "localhost");
    for (name, value) in headers {
        req = req.header(*name, *value);
    }
    let req = req.body(Full::new(body.into()))?;

    let resp = sender.send_request(req).await?;
    let status = resp.status();
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_owned();
    let body = resp.into_body().collect().await?.to_bytes();
    Ok(RawResponse {
        status,
        content_type,
        body,
    })
}

pub const SOAP11_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// A SOAP 1.1 envelope around `body`.
pub fn envelope11(body: &str) -> String {
    format!(
        r#"<soap:Envelope xmlns:soap="{}"><soap:Body>{body}</soap:Body></soap:Envelope>"#,
        soap_axum_core::SOAP11_ENVELOPE_NAMESPACE
    )
}
