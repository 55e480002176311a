use http::StatusCode;
use soap_axum_core::{ContractRegistry, SoapVersion, Value, parse_envelope};

use crate::calculator::{NAMESPACE, client};
use crate::raw::{self, SOAP11_CONTENT_TYPE};
use crate::report::{CaseResult, case};
use crate::server::TestServer;

struct TestCase {
    name: &'static str,
    version: SoapVersion,
    method: &'static str,
    args: fn() -> Vec<Value>,
    expected: fn() -> Vec<Value>,
}

const TEST_CASES: &[TestCase] = &[
    TestCase {
        name: "Add over SOAP 1.1",
        version: SoapVersion::Soap11,
        method: "Add",
        args: || vec![2.into(), 3.into()],
        expected: || vec![Value::Int(5)],
    },
    TestCase {
        name: "Add over SOAP 1.2",
        version: SoapVersion::Soap12,
        method: "Add",
        args: || vec![40.into(), 2.into()],
        expected: || vec![Value::Int(42)],
    },
    TestCase {
        name: "Divide returns out parameter",
        version: SoapVersion::Soap11,
        method: "Divide",
        args: || vec![17.into(), 5.into()],
        expected: || vec![Value::Int(3), Value::Int(2)],
    },
    TestCase {
        name: "Echo escapes markup",
        version: SoapVersion::Soap12,
        method: "Echo",
        args: || vec!["<a & b>".into()],
        expected: || vec![Value::String("<a & b>".into())],
    },
];

pub async fn run(server: &TestServer, registry: &ContractRegistry) -> Vec<CaseResult> {
    let mut results = Vec::new();
    for tc in TEST_CASES {
        results.push(case(tc.name, run_one(server, registry, tc)).await);
    }
    results.push(case("wire shape of Add", wire_shape(server)).await);
    results
}

async fn run_one(server: &TestServer, registry: &ContractRegistry, tc: &TestCase) -> anyhow::Result<()> {
    let client = client(server, registry, "/calculator", tc.version)?;
    let response = client.invoke(tc.method, (tc.args)()).await?;
    let expected = (tc.expected)();
    if response.results() != expected.as_slice() {
        anyhow::bail!("expected {:?}, got {:?}", expected, response.results());
    }
    Ok(())
}

/// A hand-written wrapped/literal request answered with `AddResult`.
async fn wire_shape(server: &TestServer) -> anyhow::Result<()> {
    let resp = raw::post(
        server,
        "/calculator",
        &[
            ("content-type", SOAP11_CONTENT_TYPE),
            ("soapaction", "\"urn:calc/Add\""),
        ],
        raw::envelope11(&format!(r#"<Add xmlns="{NAMESPACE}"><a>2</a><b>3</b></Add>"#)),
    )
    .await?;
    anyhow::ensure!(resp.status == StatusCode::OK, "expected 200, got {}", resp.status);
    anyhow::ensure!(
        resp.content_type.starts_with("text/xml"),
        "expected content-type text/xml, got: {}",
        resp.content_type
    );

    let envelope = parse_envelope(&resp.body, SoapVersion::Soap11)?;
    let wrapper = envelope
        .first_body_element()
        .ok_or_else(|| anyhow::anyhow!("empty Body"))?;
    anyhow::ensure!(
        wrapper.name.is(NAMESPACE, "AddResponse"),
        "expected AddResponse, got {}",
        wrapper.name
    );
    let result = wrapper
        .child_elements()
        .find(|e| e.name.local_name() == "AddResult")
        .ok_or_else(|| anyhow::anyhow!("AddResult missing"))?;
    anyhow::ensure!(result.text() == "5", "expected 5, got {:?}", result.text());
    Ok(())
}
