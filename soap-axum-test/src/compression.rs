use soap_axum_client::ClientError;
use soap_axum_core::{
    BoxedCodec, ContractRegistry, DeflateCodec, GzipCodec, SoapVersion, Value, compression,
};

use crate::calculator::{CalculatorView, client_builder};
use crate::report::{CaseResult, case};
use crate::server::TestServer;

pub async fn run(server: &TestServer, registry: &ContractRegistry) -> Vec<CaseResult> {
    vec![
        case("gzip on both ends", async {
            for version in [SoapVersion::Soap11, SoapVersion::Soap12] {
                let client = client_builder(server, "/calculator-gzip", version)
                    .extension(compression(BoxedCodec::new(GzipCodec::default())))
                    .build::<CalculatorView>(registry)?;
                let text = "compress me ".repeat(200);
                let response = client.invoke("Echo", vec![text.clone().into()]).await?;
                anyhow::ensure!(
                    response.return_value() == Some(&Value::String(text)),
                    "{version}: echo mismatch"
                );
            }
            Ok(())
        })
        .await,
        case("faults are compressed too", async {
            let client = client_builder(server, "/calculator-gzip", SoapVersion::Soap11)
                .extension(compression(BoxedCodec::new(GzipCodec::default())))
                .build::<CalculatorView>(registry)?;
            match client.invoke("Fail", vec![]).await {
                Err(ClientError::Fault(fault)) if fault.message() == "bad input" => Ok(()),
                other => anyhow::bail!("expected the handler fault, got {other:?}"),
            }
        })
        .await,
        case("mismatched codec is rejected", async {
            let client = client_builder(server, "/calculator-gzip", SoapVersion::Soap11)
                .extension(compression(BoxedCodec::new(DeflateCodec::default())))
                .build::<CalculatorView>(registry)?;
            match client.invoke("Add", vec![1.into(), 2.into()]).await {
                Ok(response) => anyhow::bail!("expected a failure, got {:?}", response.results()),
                Err(_) => Ok(()),
            }
        })
        .await,
    ]
}
