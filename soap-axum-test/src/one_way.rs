use http::StatusCode;
use soap_axum_core::{ContractRegistry, SoapVersion};

use crate::calculator::{NAMESPACE, Stats, client};
use crate::raw::{self, SOAP11_CONTENT_TYPE};
use crate::report::{CaseResult, case};
use crate::server::TestServer;

pub async fn run(server: &TestServer, registry: &ContractRegistry, stats: &Stats) -> Vec<CaseResult> {
    vec![
        case("client call is accepted", async {
            let client = client(server, registry, "/calculator", SoapVersion::Soap11)?;
            let before = stats.pings();
            let response = client.invoke("Ping", vec![]).await?;
            anyhow::ensure!(
                response.status() == StatusCode::ACCEPTED,
                "expected 202, got {}",
                response.status()
            );
            anyhow::ensure!(response.results().is_empty(), "one-way call returned results");
            anyhow::ensure!(stats.pings() == before + 1, "handler did not run");
            Ok(())
        })
        .await,
        case("202 carries no body", async {
            let resp = raw::post(
                server,
                "/calculator",
                &[
                    ("content-type", SOAP11_CONTENT_TYPE),
                    ("soapaction", "\"urn:calc/Ping\""),
                ],
                raw::envelope11(&format!(r#"<Ping xmlns="{NAMESPACE}"/>"#)),
            )
            .await?;
            anyhow::ensure!(resp.status == StatusCode::ACCEPTED, "expected 202, got {}", resp.status);
            anyhow::ensure!(resp.body.is_empty(), "expected empty body, got {} bytes", resp.body.len());
            Ok(())
        })
        .await,
    ]
}
