//! The calculator contract served by every scenario.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use soap_axum::{
    HandlerError, MessageLimits, SoapCall, SoapReply, SoapRouterBuilder, SoapService,
    SoapServiceBuilder,
};
use soap_axum_client::{ClientBuilder, SoapClient};
use soap_axum_core::{
    BoxedCodec, ContractDescription, ContractRegistry, Direction, Fault, GzipCodec, HeaderDecl,
    MethodDecl, SoapContract, SoapVersion, Value, XmlType, compression,
};

use crate::server::TestServer;

pub const NAMESPACE: &str = "urn:calc/";

/// Limit of the strict endpoint.
pub const STRICT_RECEIVE_MAX_BYTES: usize = 2048;

pub struct Calculator;

impl SoapContract for Calculator {
    fn describe() -> ContractDescription {
        ContractDescription::new("Calculator")
            .namespace(NAMESPACE)
            .member("session")
            .method(
                MethodDecl::new("Add")
                    .param("a", XmlType::Int)
                    .param("b", XmlType::Int)
                    .returns(XmlType::Int)
                    .header(
                        HeaderDecl::typed("session", "Session", XmlType::String)
                            .direction(Direction::InOut),
                    ),
            )
            .method(
                MethodDecl::new("Divide")
                    .param("a", XmlType::Int)
                    .param("b", XmlType::Int)
                    .out_param("remainder", XmlType::Int)
                    .returns(XmlType::Int),
            )
            .method(MethodDecl::new("Fail"))
            .method(MethodDecl::new("Ping").one_way())
            .method(
                MethodDecl::new("Echo")
                    .param("text", XmlType::String)
                    .returns(XmlType::String),
            )
            .method(MethodDecl::new("CountHeaders").returns(XmlType::Int))
    }
}

/// What the client knows: an extra tracing header, a mustUnderstand audit
/// header, and `Multiply`, which the server never implemented.
pub struct CalculatorView;

impl SoapContract for CalculatorView {
    fn describe() -> ContractDescription {
        let mut description = Calculator::describe()
            .member("trace")
            .member("audit")
            .method(
                MethodDecl::new("Multiply")
                    .param("a", XmlType::Int)
                    .param("b", XmlType::Int)
                    .returns(XmlType::Int),
            );
        if let Some(method) = description
            .methods
            .iter_mut()
            .find(|m| m.name == "CountHeaders")
        {
            *method = MethodDecl::new("CountHeaders")
                .returns(XmlType::Int)
                .header(HeaderDecl::typed("trace", "Trace", XmlType::String))
                .header(HeaderDecl::typed("audit", "Audit", XmlType::String).must_understand(true));
        }
        description
    }
}

/// Calls observed by the one-way handler.
#[derive(Debug, Default)]
pub struct Stats {
    pings: AtomicUsize,
}

impl Stats {
    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}

async fn add(call: SoapCall) -> Result<SoapReply, HandlerError> {
    let a = call.arg("a").and_then(Value::as_i32).unwrap_or_default();
    let b = call.arg("b").and_then(Value::as_i32).unwrap_or_default();
    let mut reply = SoapReply::returning(a + b);
    if let Some(session) = call.header("session").and_then(Value::as_str) {
        reply = reply.header("session", format!("{session}-echo"));
    }
    Ok(reply)
}

async fn divide(call: SoapCall) -> Result<SoapReply, HandlerError> {
    let a = call.arg("a").and_then(Value::as_i32).unwrap_or_default();
    let b = call.arg("b").and_then(Value::as_i32).unwrap_or_default();
    if b == 0 {
        return Err(Fault::client("division by zero").into());
    }
    Ok(SoapReply::returning(a / b).out(a % b))
}

async fn fail(_call: SoapCall) -> Result<SoapReply, HandlerError> {
    Err("bad input".into())
}

async fn echo(call: SoapCall) -> Result<SoapReply, HandlerError> {
    let text = call.arg("text").and_then(Value::as_str).unwrap_or_default();
    Ok(SoapReply::returning(text))
}

async fn count_headers(call: SoapCall) -> Result<SoapReply, HandlerError> {
    Ok(SoapReply::returning(call.not_understood().len() as i32))
}

fn service(
    registry: &ContractRegistry,
    stats: &Arc<Stats>,
    configure: impl FnOnce(SoapServiceBuilder<Calculator>) -> SoapServiceBuilder<Calculator>,
) -> anyhow::Result<SoapService> {
    let stats = stats.clone();
    let builder = SoapService::builder::<Calculator>()
        .handler("Add", add)
        .handler("Divide", divide)
        .handler("Fail", fail)
        .handler("Echo", echo)
        .handler("CountHeaders", count_headers)
        .handler("Ping", move |_call: SoapCall| {
            let stats = stats.clone();
            async move {
                stats.pings.fetch_add(1, Ordering::SeqCst);
                Ok::<_, HandlerError>(SoapReply::empty())
            }
        });
    Ok(configure(builder).build(registry)?)
}

/// Endpoints:
///
/// - `/calculator`: SOAP 1.1 and 1.2
/// - `/calculator11`: SOAP 1.1 only
/// - `/calculator-gzip`: gzip compression extension
/// - `/calculator-strict`: mustUnderstand enforced, small receive limit
pub fn app(registry: &ContractRegistry, stats: &Arc<Stats>) -> anyhow::Result<Router> {
    let router = SoapRouterBuilder::new()
        .service("/calculator", service(registry, stats, |b| b)?)
        .service(
            "/calculator11",
            service(registry, stats, |b| b.version(SoapVersion::Soap11))?,
        )
        .service(
            "/calculator-gzip",
            service(registry, stats, |b| {
                b.extension(compression(BoxedCodec::new(GzipCodec::default())))
            })?,
        )
        .service(
            "/calculator-strict",
            service(registry, stats, |b| {
                b.enforce_must_understand(true).message_limits(
                    MessageLimits::new().receive_max_bytes(STRICT_RECEIVE_MAX_BYTES),
                )
            })?,
        )
        .build();
    Ok(router)
}

/// Client builder for `path` with a 5s default timeout.
pub fn client_builder(server: &TestServer, path: &str, version: SoapVersion) -> ClientBuilder {
    SoapClient::builder(server.url(path))
        .version(version)
        .timeout(Duration::from_secs(5))
}

pub fn client(
    server: &TestServer,
    registry: &ContractRegistry,
    path: &str,
    version: SoapVersion,
) -> anyhow::Result<SoapClient> {
    Ok(client_builder(server, path, version).build::<CalculatorView>(registry)?)
}
