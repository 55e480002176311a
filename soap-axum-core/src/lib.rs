//! Core SOAP types shared by the server (`soap-axum`) and client
//! (`soap-axum-client`) crates.
//!
//! ## Modules
//!
//! - [`contract`]: contract descriptions and their resolved bindings
//! - [`registry`]: memoized contract bindings per SOAP version
//! - [`envelope`]: envelope framing and header decoding
//! - [`fault`]: fault model and its 1.1 / 1.2 wire shapes
//! - [`extension`]: per-call interceptors and the extension chain
//! - [`codec`]: compression codecs and the compression extension

mod body;
mod codec;
mod contract;
mod envelope;
mod error;
mod extension;
mod fault;
mod headers;
mod message;
mod registry;
mod value;
mod version;
mod xml;

pub use body::*;
pub use codec::*;
pub use contract::*;
pub use envelope::*;
pub use error::*;
pub use extension::*;
pub use fault::*;
pub use headers::*;
pub use message::*;
pub use registry::*;
pub use value::*;
pub use version::*;
pub use xml::*;
