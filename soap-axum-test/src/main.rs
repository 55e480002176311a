use std::sync::Arc;

use soap_axum_core::ContractRegistry;
use tracing_subscriber::EnvFilter;

mod async_invoke;
mod calculator;
mod compression;
mod faults;
mod headers;
mod malformed;
mod one_way;
mod raw;
mod report;
mod server;
mod unary;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    // One registry for the server and every client.
    let registry = ContractRegistry::new();
    let stats = Arc::new(calculator::Stats::default());
    let server = server::TestServer::start(calculator::app(&registry, &stats)?).await?;
    println!("=== SOAP Integration Tests ({}) ===", server.addr());

    let suites = [
        ("One-way", one_way::run(&server, &registry, &stats).await),
        ("Unary", unary::run(&server, &registry).await),
        ("Faults", faults::run(&server, &registry).await),
        ("Headers", headers::run(&server, &registry).await),
        ("Malformed", malformed::run(&server, &registry).await),
        ("Compression", compression::run(&server, &registry).await),
        ("Async", async_invoke::run(&server, &registry).await),
    ];

    let mut total = 0;
    let mut passed = 0;
    for (label, cases) in &suites {
        let (ok, count) = report::print(label, cases);
        passed += ok;
        total += count;
    }

    println!();
    println!("{passed}/{total} passed");
    tracing::info!(entries = registry.len(), "contract bindings cached");

    if passed < total {
        anyhow::bail!("{} test(s) failed", total - passed);
    }
    Ok(())
}
