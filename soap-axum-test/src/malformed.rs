use http::StatusCode;
use soap_axum_client::ClientError;
use soap_axum_core::{ContractRegistry, FaultCode, SoapVersion};

use crate::calculator::{NAMESPACE, STRICT_RECEIVE_MAX_BYTES, client};
use crate::raw::{self, RawResponse, SOAP11_CONTENT_TYPE};
use crate::report::{CaseResult, case};
use crate::server::TestServer;

struct TestCase {
    name: &'static str,
    path: &'static str,
    content_type: &'static str,
    body: fn() -> String,
    status: StatusCode,
    code: FaultCode,
    message_contains: &'static str,
}

const TEST_CASES: &[TestCase] = &[
    TestCase {
        name: "root element is not Envelope",
        path: "/calculator",
        content_type: SOAP11_CONTENT_TYPE,
        body: || {
            format!(
                r#"<soap:Letter xmlns:soap="{}"><soap:Body/></soap:Letter>"#,
                soap_axum_core::SOAP11_ENVELOPE_NAMESPACE
            )
        },
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: FaultCode::Client,
        message_contains: "version mismatch",
    },
    TestCase {
        name: "Envelope in a foreign namespace",
        path: "/calculator",
        content_type: SOAP11_CONTENT_TYPE,
        body: || r#"<e:Envelope xmlns:e="urn:not-soap"><e:Body/></e:Envelope>"#.to_owned(),
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: FaultCode::VersionMismatch,
        message_contains: "urn:not-soap",
    },
    TestCase {
        name: "unsupported content type",
        path: "/calculator",
        content_type: "application/json",
        body: || "{}".to_owned(),
        status: StatusCode::UNSUPPORTED_MEDIA_TYPE,
        code: FaultCode::Client,
        message_contains: "application/json",
    },
    TestCase {
        name: "SOAP 1.1 without charset",
        path: "/calculator",
        content_type: "text/xml",
        body: || raw::envelope11(""),
        status: StatusCode::UNSUPPORTED_MEDIA_TYPE,
        code: FaultCode::Client,
        message_contains: "charset",
    },
    TestCase {
        name: "body over the receive limit",
        path: "/calculator-strict",
        content_type: SOAP11_CONTENT_TYPE,
        body: || {
            let text = "x".repeat(STRICT_RECEIVE_MAX_BYTES);
            raw::envelope11(&format!(r#"<Echo xmlns="{NAMESPACE}"><text>{text}</text></Echo>"#))
        },
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: FaultCode::Client,
        message_contains: "",
    },
];

pub async fn run(server: &TestServer, registry: &ContractRegistry) -> Vec<CaseResult> {
    let mut results = Vec::new();
    for tc in TEST_CASES {
        results.push(case(tc.name, run_one(server, tc)).await);
    }
    results.push(
        case("client sees oversized request as Client fault", async {
            let client = client(server, registry, "/calculator-strict", SoapVersion::Soap11)?;
            let text = "y".repeat(STRICT_RECEIVE_MAX_BYTES);
            match client.invoke("Echo", vec![text.into()]).await {
                Err(ClientError::Fault(fault)) if fault.is_client() => Ok(()),
                other => anyhow::bail!("expected a Client fault, got {other:?}"),
            }
        })
        .await,
    );
    results
}

async fn run_one(server: &TestServer, tc: &TestCase) -> anyhow::Result<()> {
    let resp = raw::post(
        server,
        tc.path,
        &[("content-type", tc.content_type), ("soapaction", "\"\"")],
        (tc.body)(),
    )
    .await?;
    check(&resp, tc)
}

fn check(resp: &RawResponse, tc: &TestCase) -> anyhow::Result<()> {
    anyhow::ensure!(resp.status == tc.status, "expected {}, got {}", tc.status, resp.status);
    anyhow::ensure!(
        resp.content_type.starts_with("text/xml"),
        "expected a SOAP 1.1 fault, got content-type {}",
        resp.content_type
    );
    let fault = resp.fault(SoapVersion::Soap11)?;
    anyhow::ensure!(fault.code() == &tc.code, "expected {}, got {}", tc.code, fault.code());
    anyhow::ensure!(
        fault.message().contains(tc.message_contains),
        "faultstring {:?} does not mention {:?}",
        fault.message(),
        tc.message_contains
    );
    Ok(())
}
