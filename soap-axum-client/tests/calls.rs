//! Client calls against a `SoapService` running in the same process.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{Request, Response, StatusCode};
use soap_axum::{HandlerError, SoapCall, SoapReply, SoapService};
use soap_axum_client::{CallOptions, ClientError, SoapClient, Transport};
use soap_axum_core::{
    ContractDescription, ContractRegistry, Direction, EnvelopeError, Fault, FaultCode, HeaderDecl,
    MessageStage, MethodDecl, PROCEDURE_NOT_PRESENT, SoapContract, SoapExtension, SoapMessage,
    SoapVersion, Value, XmlType, parse_envelope,
};

const URL: &str = "http://calc.test/calculator";

/// The contract the service implements.
struct Calculator;

impl SoapContract for Calculator {
    fn describe() -> ContractDescription {
        ContractDescription::new("Calculator")
            .namespace("urn:calc/")
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
            .method(MethodDecl::new("Slow").returns(XmlType::Int))
            .method(MethodDecl::new("CountHeaders").returns(XmlType::Int))
    }
}

/// The client's view of the same service: it knows headers and a method the
/// service does not.
struct CalculatorView;

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
        for method in &mut description.methods {
            if method.name == "CountHeaders" {
                *method = MethodDecl::new("CountHeaders")
                    .returns(XmlType::Int)
                    .header(HeaderDecl::typed("trace", "Trace", XmlType::String))
                    .header(HeaderDecl::typed("audit", "Audit", XmlType::String).must_understand(true));
            }
        }
        description
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
        return Err(soap_axum_core::Fault::client("division by zero").into());
    }
    Ok(SoapReply::returning(a / b).out(a % b))
}

async fn fail(_call: SoapCall) -> Result<SoapReply, HandlerError> {
    Err("bad input".into())
}

fn service(pings: Arc<AtomicUsize>, enforce: bool) -> SoapService {
    SoapService::builder::<Calculator>()
        .handler("Add", add)
        .handler("Divide", divide)
        .handler("Fail", fail)
        .handler("Ping", move |_call: SoapCall| {
            let pings = pings.clone();
            async move {
                pings.fetch_add(1, Ordering::SeqCst);
                Ok::<_, HandlerError>(SoapReply::empty())
            }
        })
        .handler("Slow", |_call: SoapCall| async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok::<_, HandlerError>(SoapReply::returning(1))
        })
        .handler("CountHeaders", |call: SoapCall| async move {
            Ok::<_, HandlerError>(SoapReply::returning(call.not_understood().len() as i32))
        })
        .enforce_must_understand(enforce)
        .build(&ContractRegistry::new())
        .unwrap()
}

/// Hands requests straight to a service and keeps the last one.
#[derive(Clone)]
struct InProcess {
    service: SoapService,
    last_request: Arc<Mutex<Option<Request<Bytes>>>>,
}

impl InProcess {
    fn new(service: SoapService) -> Self {
        Self {
            service,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    fn last_request(&self) -> Request<Bytes> {
        self.last_request.lock().unwrap().take().expect("a request was sent")
    }
}

impl Transport for InProcess {
    fn send(&self, request: Request<Bytes>) -> BoxFuture<'static, Result<Response<Bytes>, ClientError>> {
        let service = self.service.clone();
        let last_request = self.last_request.clone();
        Box::pin(async move {
            let mut copy = Request::new(request.body().clone());
            *copy.headers_mut() = request.headers().clone();
            *last_request.lock().unwrap() = Some(copy);
            service
                .process_request(request)
                .await
                .map_err(|e| ClientError::Transport(e.to_string()))
        })
    }
}

fn client_with(transport: InProcess, version: SoapVersion) -> SoapClient {
    SoapClient::builder(URL)
        .version(version)
        .transport(transport)
        .build::<CalculatorView>(&ContractRegistry::new())
        .unwrap()
}

fn client(version: SoapVersion) -> SoapClient {
    client_with(InProcess::new(service(Arc::default(), false)), version)
}

#[tokio::test]
async fn test_add_wrapped_literal() {
    let transport = InProcess::new(service(Arc::default(), false));
    let client = client_with(transport.clone(), SoapVersion::Soap11);

    let response = client.invoke("Add", vec![2.into(), 3.into()]).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.return_value(), Some(&Value::Int(5)));

    let request = transport.last_request();
    assert_eq!(request.headers()["soapaction"], "\"urn:calc/Add\"");
    assert_eq!(request.headers()["content-type"], "text/xml; charset=utf-8");

    let envelope = parse_envelope(request.body(), SoapVersion::Soap11).unwrap();
    let wrapper = envelope.first_body_element().unwrap();
    assert!(wrapper.name.is("urn:calc/", "Add"));
    let parts: Vec<_> = wrapper
        .child_elements()
        .map(|e| (e.name.local_name().to_owned(), e.text()))
        .collect();
    assert_eq!(
        parts,
        vec![("a".to_owned(), "2".to_owned()), ("b".to_owned(), "3".to_owned())]
    );
}

#[tokio::test]
async fn test_out_parameters() {
    let response = client(SoapVersion::Soap11)
        .invoke("Divide", vec![17.into(), 5.into()])
        .await
        .unwrap();
    assert_eq!(response.return_value(), Some(&Value::Int(3)));
    assert_eq!(response.out("remainder"), Some(&Value::Int(2)));
    assert_eq!(response.results().len(), 2);
}

#[tokio::test]
async fn test_handler_error_is_server_fault() {
    let err = client(SoapVersion::Soap11).invoke("Fail", vec![]).await.unwrap_err();
    let fault = err.fault().expect("fault");
    assert_eq!(fault.code(), &FaultCode::Server);
    assert_eq!(fault.message(), "bad input");
    assert!(err.to_string().contains("bad input"));
}

type StageLog = Arc<Mutex<Vec<(MessageStage, Option<String>)>>>;

/// Records each stage with the fault message visible at that point.
struct StageRecorder(StageLog);

impl SoapExtension for StageRecorder {
    fn process_message(&mut self, message: &mut SoapMessage) -> Result<(), Fault> {
        if let Some(stage) = message.stage() {
            let fault = message.fault().map(|f| f.message().to_owned());
            self.0.lock().unwrap().push((stage, fault));
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_fault_response_runs_after_deserialize() {
    use MessageStage::*;

    let log = StageLog::default();
    let recorder = log.clone();
    let client = SoapClient::builder(URL)
        .transport(InProcess::new(service(Arc::default(), false)))
        .extension(move || StageRecorder(recorder.clone()))
        .build::<CalculatorView>(&ContractRegistry::new())
        .unwrap();

    let err = client.invoke("Fail", vec![]).await.unwrap_err();
    assert_eq!(err.fault().map(|f| f.message()), Some("bad input"));
    assert_eq!(
        *log.lock().unwrap(),
        [
            (BeforeSerialize, None),
            (AfterSerialize, None),
            (BeforeDeserialize, None),
            (AfterDeserialize, Some("bad input".to_owned())),
        ]
    );
}

/// Answers every request with the same response.
#[derive(Clone)]
struct Canned {
    status: StatusCode,
    body: &'static str,
}

impl Transport for Canned {
    fn send(&self, _request: Request<Bytes>) -> BoxFuture<'static, Result<Response<Bytes>, ClientError>> {
        let response = Response::builder()
            .status(self.status)
            .header("content-type", "text/xml; charset=utf-8")
            .body(Bytes::from_static(self.body.as_bytes()))
            .unwrap();
        Box::pin(async move { Ok(response) })
    }
}

#[tokio::test]
async fn test_malformed_response_keeps_envelope_error() {
    use std::error::Error;

    let client = SoapClient::builder(URL)
        .transport(Canned {
            status: StatusCode::OK,
            body: "<Letter/>",
        })
        .build::<CalculatorView>(&ContractRegistry::new())
        .unwrap();
    let err = client.invoke("Add", vec![1.into(), 2.into()]).await.unwrap_err();
    assert!(matches!(err, ClientError::Envelope(EnvelopeError::NotAnEnvelope(_))), "{err:?}");
    assert!(err.source().unwrap().downcast_ref::<EnvelopeError>().is_some());
}

#[tokio::test]
async fn test_server_error_without_fault_is_protocol_error() {
    let client = SoapClient::builder(URL)
        .transport(Canned {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body/></s:Envelope>"#,
        })
        .build::<CalculatorView>(&ContractRegistry::new())
        .unwrap();
    let err = client.invoke("Add", vec![1.into(), 2.into()]).await.unwrap_err();
    assert!(matches!(err, ClientError::Protocol(_)), "{err:?}");
}

#[tokio::test]
async fn test_fault_soap12() {
    let client = client(SoapVersion::Soap12);

    let err = client
        .invoke("Divide", vec![1.into(), 0.into()])
        .await
        .unwrap_err();
    let fault = err.fault().expect("fault");
    assert_eq!(fault.code(), &FaultCode::Client);
    assert_eq!(fault.message(), "division by zero");

    let err = client
        .invoke("Multiply", vec![2.into(), 3.into()])
        .await
        .unwrap_err();
    let fault = err.fault().expect("fault");
    assert_eq!(fault.code(), &FaultCode::Client);
    assert_eq!(fault.subcode().map(|s| &s.value), Some(&PROCEDURE_NOT_PRESENT));
}

#[tokio::test]
async fn test_soap12_action_in_content_type() {
    let transport = InProcess::new(service(Arc::default(), false));
    let client = client_with(transport.clone(), SoapVersion::Soap12);

    let response = client.invoke("Add", vec![1.into(), 1.into()]).await.unwrap();
    assert_eq!(response.return_value(), Some(&Value::Int(2)));

    let request = transport.last_request();
    let content_type = request.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("application/soap+xml"));
    assert!(content_type.contains("action=\"urn:calc/Add\""));
    assert!(request.headers().get("soapaction").is_none());
}

#[tokio::test]
async fn test_one_way_is_accepted() {
    let pings = Arc::new(AtomicUsize::new(0));
    let client = client_with(InProcess::new(service(pings.clone(), false)), SoapVersion::Soap11);

    let response = client.invoke("Ping", vec![]).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(response.results().is_empty());
    assert_eq!(pings.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_header_members_round_trip() {
    let client = SoapClient::builder(URL)
        .transport(InProcess::new(service(Arc::default(), false)))
        .header_member("session", "s-1")
        .build::<CalculatorView>(&ContractRegistry::new())
        .unwrap();

    let response = client.invoke("Add", vec![1.into(), 2.into()]).await.unwrap();
    assert_eq!(response.header("session"), Some(&Value::String("s-1-echo".into())));

    // Per-call members win over the client's.
    let options = CallOptions::new().header_member("session", "s-2");
    let response = client
        .invoke_with_options("Add", vec![1.into(), 2.into()], options)
        .await
        .unwrap();
    assert_eq!(response.header("session"), Some(&Value::String("s-2-echo".into())));
}

#[tokio::test]
async fn test_unknown_headers_are_tolerated() {
    let options = CallOptions::new()
        .header_member("trace", "t-1")
        .header_member("audit", "a-1");
    let response = client(SoapVersion::Soap11)
        .invoke_with_options("CountHeaders", vec![], options)
        .await
        .unwrap();
    assert_eq!(response.return_value(), Some(&Value::Int(2)));
}

#[tokio::test]
async fn test_must_understand_enforced() {
    let client = client_with(InProcess::new(service(Arc::default(), true)), SoapVersion::Soap11);

    // Without the mustUnderstand header the call goes through.
    let options = CallOptions::new().header_member("trace", "t-1");
    let response = client
        .invoke_with_options("CountHeaders", vec![], options)
        .await
        .unwrap();
    assert_eq!(response.return_value(), Some(&Value::Int(1)));

    let options = CallOptions::new().header_member("audit", "a-1");
    let err = client
        .invoke_with_options("CountHeaders", vec![], options)
        .await
        .unwrap_err();
    assert_eq!(err.fault().map(|f| f.code()), Some(&FaultCode::MustUnderstand));
}

#[tokio::test]
async fn test_unknown_method_fails_locally() {
    let err = client(SoapVersion::Soap11).invoke("Subtract", vec![]).await.unwrap_err();
    assert!(matches!(err, ClientError::UnknownMethod(name) if name == "Subtract"));
}

#[tokio::test]
async fn test_timeout() {
    let client = SoapClient::builder(URL)
        .transport(InProcess::new(service(Arc::default(), false)))
        .timeout(Duration::from_secs(5))
        .build::<CalculatorView>(&ContractRegistry::new())
        .unwrap();

    let options = CallOptions::new().timeout(Duration::from_millis(20));
    let err = client
        .invoke_with_options("Slow", vec![], options)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Timeout(d) if d == Duration::from_millis(20)));
    assert!(err.is_transport());

    let response = client.invoke("Slow", vec![]).await.unwrap();
    assert_eq!(response.return_value(), Some(&Value::Int(1)));
}

#[tokio::test]
async fn test_begin_end_invoke() {
    let client = client(SoapVersion::Soap11);
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    let (done_tx, done_rx) = tokio::sync::oneshot::channel();

    let mut pending = client.begin_invoke_with_callback(
        "Add",
        vec![20.into(), 22.into()],
        CallOptions::new(),
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = done_tx.send(());
        },
    );
    done_rx.await.unwrap();
    assert!(pending.is_completed());

    let response = pending.end_invoke().await.unwrap();
    assert_eq!(response.return_value(), Some(&Value::Int(42)));
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    let again = pending.end_invoke().await;
    assert!(matches!(again, Err(ClientError::AlreadyCompleted)));
}

#[tokio::test]
async fn test_begin_invoke_fault() {
    let mut pending = client(SoapVersion::Soap11).begin_invoke("Fail", vec![]);
    let err = pending.end_invoke().await.unwrap_err();
    assert_eq!(err.fault().map(|f| f.message()), Some("bad input"));
}

#[tokio::test]
async fn test_abort_pending_call() {
    let mut pending = client(SoapVersion::Soap11).begin_invoke("Slow", vec![]);
    pending.abort();
    assert!(matches!(pending.end_invoke().await, Err(ClientError::Canceled)));
}

#[cfg(feature = "compression-gzip")]
#[tokio::test]
async fn test_gzip_extension_on_both_ends() {
    use soap_axum_core::{BoxedCodec, GzipCodec, compression};

    let service = SoapService::builder::<Calculator>()
        .handler("Add", add)
        .handler("Divide", divide)
        .handler("Fail", fail)
        .handler("Ping", |_call: SoapCall| async { Ok::<_, HandlerError>(SoapReply::empty()) })
        .handler("Slow", |_call: SoapCall| async { Ok::<_, HandlerError>(SoapReply::returning(1)) })
        .handler("CountHeaders", |_call: SoapCall| async { Ok::<_, HandlerError>(SoapReply::returning(0)) })
        .extension(compression(BoxedCodec::new(GzipCodec::default())))
        .build(&ContractRegistry::new())
        .unwrap();
    let transport = InProcess::new(service);
    let client = SoapClient::builder(URL)
        .transport(transport.clone())
        .extension(compression(BoxedCodec::new(GzipCodec::default())))
        .build::<CalculatorView>(&ContractRegistry::new())
        .unwrap();

    let response = client.invoke("Add", vec![4.into(), 5.into()]).await.unwrap();
    assert_eq!(response.return_value(), Some(&Value::Int(9)));

    // gzip magic bytes
    let request = transport.last_request();
    assert_eq!(&request.body()[..2], &[0x1f, 0x8b]);

    let err = client.invoke("Fail", vec![]).await.unwrap_err();
    assert_eq!(err.fault().map(|f| f.message()), Some("bad input"));
}
