use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use soap_axum_client::{CallOptions, ClientError};
use soap_axum_core::{ContractRegistry, SoapVersion, Value};
use tokio::sync::oneshot;

use crate::calculator::client;
use crate::report::{CaseResult, case};
use crate::server::TestServer;

pub async fn run(server: &TestServer, registry: &ContractRegistry) -> Vec<CaseResult> {
    vec![
        case("callback fires once before end_invoke", async {
            let client = client(server, registry, "/calculator", SoapVersion::Soap12)?;
            let fired = Arc::new(AtomicUsize::new(0));
            let counter = fired.clone();
            let (done_tx, done_rx) = oneshot::channel();

            let mut pending = client.begin_invoke_with_callback(
                "Add",
                vec![20.into(), 22.into()],
                CallOptions::new(),
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let _ = done_tx.send(());
                },
            );
            done_rx.await?;
            anyhow::ensure!(pending.is_completed(), "callback ran before completion");

            let response = pending.end_invoke().await?;
            anyhow::ensure!(
                response.return_value() == Some(&Value::Int(42)),
                "unexpected result {:?}",
                response.return_value()
            );
            anyhow::ensure!(fired.load(Ordering::SeqCst) == 1, "callback count");

            match pending.end_invoke().await {
                Err(ClientError::AlreadyCompleted) => Ok(()),
                other => anyhow::bail!("expected AlreadyCompleted, got {other:?}"),
            }
        })
        .await,
        case("concurrent calls complete independently", async {
            let client = client(server, registry, "/calculator", SoapVersion::Soap11)?;
            let mut pending: Vec<_> = (0..8i32)
                .map(|i| client.begin_invoke("Add", vec![i.into(), 1.into()]))
                .collect();
            for (i, call) in pending.iter_mut().enumerate() {
                let response = call.end_invoke().await?;
                let expected = Value::Int(i as i32 + 1);
                anyhow::ensure!(
                    response.return_value() == Some(&expected),
                    "call {i}: unexpected result {:?}",
                    response.return_value()
                );
            }
            Ok(())
        })
        .await,
    ]
}
