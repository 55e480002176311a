//! # soap-axum
//!
//! SOAP 1.1 and 1.2 endpoints on [Axum](https://github.com/tokio-rs/axum).
//!
//! A contract is described once with [`soap_axum_core::SoapContract`]. A
//! [`SoapService`] binds handlers to its methods and answers requests in
//! either SOAP version; every failure becomes a fault envelope.
//!
//! ## Features
//!
//! - **Routing by `SOAPAction` or request element**, as the contract declares.
//! - **Typed and custom headers** bound to named header members.
//! - **Extensions** observing each message stage and rewriting the raw stream.
//! - **Compression extensions** behind the `compression-gzip` and
//!   `compression-deflate` features.
//!
//! Mount services with [`SoapRouterBuilder`] or [`axum::routing::post_service`].

mod dispatcher;
pub mod error;
pub mod handler;
pub mod limits;
pub mod router;
pub mod service;

pub use error::{DispatchError, HandlerError};
pub use handler::{SoapCall, SoapHandler, SoapReply};
pub use limits::{DEFAULT_RECEIVE_MAX_BYTES, MessageLimits};
pub use router::SoapRouterBuilder;
pub use service::{SoapService, SoapServiceBuilder};

// Re-export several crates
pub use futures;
pub use soap_axum_core;

pub mod prelude {
    //! A prelude for `soap-axum` providing the most common types.
    pub use crate::error::HandlerError;
    pub use crate::handler::{SoapCall, SoapReply};
    pub use crate::router::SoapRouterBuilder;
    pub use crate::service::SoapService;
    pub use soap_axum_core::{
        ContractDescription, ContractRegistry, Fault, HeaderDecl, MethodDecl, SoapContract,
        SoapVersion, Value, XmlType,
    };
}
