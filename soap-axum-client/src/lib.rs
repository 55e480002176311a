//! SOAP client for Rust.
//!
//! This crate calls SOAP 1.1 and 1.2 endpoints described by a
//! [`SoapContract`], such as services built with `soap-axum`.
//!
//! ## Features
//!
//! - Calls returning results, Out/InOut parameters and response headers
//! - One-way calls answered with `202 Accepted`
//! - Background calls with a completion callback ([`PendingCall`])
//! - Extensions observing each message stage and rewriting the raw stream
//! - Per-call timeouts, HTTP headers and header members ([`CallOptions`])
//!
//! ## Example
//!
//! ```ignore
//! use soap_axum_client::SoapClient;
//! use soap_axum_core::{ContractRegistry, Value};
//!
//! let registry = ContractRegistry::new();
//! let client = SoapClient::builder("http://localhost:3000/calculator")
//!     .build::<Calculator>(&registry)?;
//!
//! let response = client.invoke("Add", vec![2.into(), 3.into()]).await?;
//! assert_eq!(response.return_value(), Some(&Value::Int(5)));
//! ```
//!
//! ## Faults
//!
//! A fault envelope answered by the server surfaces as
//! [`ClientError::Fault`] carrying the decoded [`Fault`]:
//!
//! ```ignore
//! match client.invoke("Divide", vec![1.into(), 0.into()]).await {
//!     Err(ClientError::Fault(fault)) => println!("{}: {}", fault.code(), fault.message()),
//!     other => println!("{other:?}"),
//! }
//! ```
//!
//! ## Background Calls
//!
//! ```ignore
//! let mut pending = client.begin_invoke_with_callback(
//!     "Add",
//!     vec![2.into(), 3.into()],
//!     CallOptions::new(),
//!     || println!("done"),
//! );
//! let response = pending.end_invoke().await?;
//!
//! // Only the first `end_invoke` gets the result.
//! assert!(matches!(pending.end_invoke().await, Err(ClientError::AlreadyCompleted)));
//! ```
//!
//! ## Feature Flags
//!
//! All features are opt-in.
//!
//! | Feature | Description | Dependencies |
//! |---------|-------------|--------------|
//! | `tls` | HTTPS through rustls with the system root certificates | `hyper-rustls`, `rustls`, `rustls-native-certs` |
//! | `compression-gzip` | Gzip [`compression`] extension | `flate2` |
//! | `compression-deflate` | Deflate [`compression`] extension | `flate2` |
//! | `compression-full` | All compression algorithms | All of above |
//! | `tracing` | Tracing spans for SOAP calls | `tracing` |
//!
//! When `tracing` is enabled, each call runs in a `soap.call` span with:
//! - `soap.method`: method name
//! - `soap.version`: `SOAP 1.1` or `SOAP 1.2`
//! - `soap.contract`: contract name
//! - `otel.kind`: "client"
//!
//! [`compression`]: soap_axum_core::compression

mod builder;
mod client;
mod error;
mod options;
mod pending;
mod response;
pub mod transport;

pub use builder::ClientBuilder;
pub use client::SoapClient;
pub use error::ClientError;
pub use options::CallOptions;
pub use pending::PendingCall;
pub use response::SoapResponse;
pub use transport::{HyperTransport, HyperTransportBuilder, Transport};

// Re-export core types for convenience
pub use soap_axum_core::{
    ConfigurationError, ContractRegistry, Fault, FaultCode, SoapContract, SoapHeader, SoapVersion,
    Value,
};

// Re-export commonly used external types
pub use bytes::Bytes;
pub use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
