use soap_axum_client::{CallOptions, ClientError};
use soap_axum_core::{ContractRegistry, FaultCode, SoapVersion, Value};

use crate::calculator::{CalculatorView, client, client_builder};
use crate::report::{CaseResult, case};
use crate::server::TestServer;

pub async fn run(server: &TestServer, registry: &ContractRegistry) -> Vec<CaseResult> {
    vec![
        case("InOut header returns to the client", async {
            for version in [SoapVersion::Soap11, SoapVersion::Soap12] {
                let client = client_builder(server, "/calculator", version)
                    .header_member("session", "s-1")
                    .build::<CalculatorView>(registry)?;
                let response = client.invoke("Add", vec![1.into(), 2.into()]).await?;
                let session = response.header("session");
                anyhow::ensure!(
                    session == Some(&Value::String("s-1-echo".into())),
                    "{version}: unexpected session header {session:?}"
                );
            }
            Ok(())
        })
        .await,
        case("headers the server does not know are tolerated", async {
            let client = client(server, registry, "/calculator", SoapVersion::Soap11)?;
            let options = CallOptions::new()
                .header_member("trace", "t-1")
                .header_member("audit", "a-1");
            let response = client
                .invoke_with_options("CountHeaders", vec![], options)
                .await?;
            anyhow::ensure!(
                response.return_value() == Some(&Value::Int(2)),
                "expected 2 unknown headers, got {:?}",
                response.return_value()
            );
            Ok(())
        })
        .await,
        case("strict endpoint skips optional headers", async {
            let client = client(server, registry, "/calculator-strict", SoapVersion::Soap12)?;
            let options = CallOptions::new().header_member("trace", "t-1");
            let response = client
                .invoke_with_options("CountHeaders", vec![], options)
                .await?;
            anyhow::ensure!(
                response.return_value() == Some(&Value::Int(1)),
                "unexpected result {:?}",
                response.return_value()
            );
            Ok(())
        })
        .await,
        case("strict endpoint enforces mustUnderstand", async {
            let client = client(server, registry, "/calculator-strict", SoapVersion::Soap11)?;
            let options = CallOptions::new().header_member("audit", "a-1");
            match client
                .invoke_with_options("CountHeaders", vec![], options)
                .await
            {
                Err(ClientError::Fault(fault)) if fault.code() == &FaultCode::MustUnderstand => Ok(()),
                other => anyhow::bail!("expected MustUnderstand fault, got {other:?}"),
            }
        })
        .await,
    ]
}
