use soap_axum_client::ClientError;
use soap_axum_core::{ContractRegistry, FaultCode, PROCEDURE_NOT_PRESENT, SoapVersion};

use crate::calculator::client;
use crate::report::{CaseResult, case};
use crate::server::TestServer;

fn expect_fault(result: Result<soap_axum_client::SoapResponse, ClientError>) -> anyhow::Result<soap_axum_core::Fault> {
    match result {
        Err(ClientError::Fault(fault)) => Ok(fault),
        Err(other) => anyhow::bail!("expected a fault, got error: {other}"),
        Ok(response) => anyhow::bail!("expected a fault, got {:?}", response.results()),
    }
}

pub async fn run(server: &TestServer, registry: &ContractRegistry) -> Vec<CaseResult> {
    vec![
        case("handler error becomes Server fault", async {
            let client = client(server, registry, "/calculator", SoapVersion::Soap11)?;
            let fault = expect_fault(client.invoke("Fail", vec![]).await)?;
            anyhow::ensure!(fault.code() == &FaultCode::Server, "expected Server, got {}", fault.code());
            anyhow::ensure!(fault.message() == "bad input", "unexpected faultstring {:?}", fault.message());
            Ok(())
        })
        .await,
        case("handler fault passes through in SOAP 1.2", async {
            let client = client(server, registry, "/calculator", SoapVersion::Soap12)?;
            let fault = expect_fault(client.invoke("Divide", vec![1.into(), 0.into()]).await)?;
            anyhow::ensure!(fault.code() == &FaultCode::Client, "expected Sender, got {}", fault.code());
            anyhow::ensure!(fault.message() == "division by zero", "unexpected reason {:?}", fault.message());
            Ok(())
        })
        .await,
        case("unknown method has ProcedureNotPresent subcode", async {
            let client = client(server, registry, "/calculator", SoapVersion::Soap12)?;
            let fault = expect_fault(client.invoke("Multiply", vec![2.into(), 3.into()]).await)?;
            anyhow::ensure!(fault.code() == &FaultCode::Client, "expected Sender, got {}", fault.code());
            let subcode = fault.subcode().map(|s| &s.value);
            anyhow::ensure!(
                subcode == Some(&PROCEDURE_NOT_PRESENT),
                "unexpected subcode {subcode:?}"
            );
            Ok(())
        })
        .await,
        case("unserved version is a transport error", async {
            let client = client(server, registry, "/calculator11", SoapVersion::Soap12)?;
            match client.invoke("Add", vec![1.into(), 2.into()]).await {
                Err(ClientError::Transport(message)) if message.contains("415") => Ok(()),
                other => anyhow::bail!("expected HTTP 415, got {other:?}"),
            }
        })
        .await,
    ]
}
