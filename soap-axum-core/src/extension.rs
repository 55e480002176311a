//! Extensions intercepting the serialized stream and message stages.
//!
//! An [`ExtensionChain`] is built fresh for every call from stateless
//! [`ExtensionFactory`] templates, so an extension may keep call-scoped state
//! without locking. Index 0 of the chain is nearest the wire:
//!
//! ```text
//!  wire <-> [caller] [contract outer] [method] [contract inner] <-> handler
//! ```
//!
//! Reading (decode stream, `BeforeDeserialize`, `AfterDeserialize`) runs from
//! the wire inwards; writing (`BeforeSerialize`, `AfterSerialize`, encode
//! stream) runs from the handler outwards.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::contract::{ExtensionPlacement, MethodBinding, ServiceContract};
use crate::fault::Fault;
use crate::message::{MessageStage, SoapMessage};

/// A per-call interceptor. All hooks default to pass-through.
///
/// A returned [`Fault`] aborts the call and reaches the caller unchanged.
pub trait SoapExtension: Send {
    /// Rewrite the serialized envelope on its way to the wire.
    fn encode_stream(&mut self, payload: Bytes) -> Result<Bytes, Fault> {
        Ok(payload)
    }

    /// Rewrite the received bytes before any XML is parsed.
    fn decode_stream(&mut self, payload: Bytes) -> Result<Bytes, Fault> {
        Ok(payload)
    }

    /// Observe the message at each stage.
    fn process_message(&mut self, message: &mut SoapMessage) -> Result<(), Fault> {
        let _ = message;
        Ok(())
    }
}

/// Creates a fresh extension for each call.
pub trait ExtensionFactory: Send + Sync + 'static {
    fn create(&self) -> Box<dyn SoapExtension>;
}

impl<F, E> ExtensionFactory for F
where
    F: Fn() -> E + Send + Sync + 'static,
    E: SoapExtension + 'static,
{
    fn create(&self) -> Box<dyn SoapExtension> {
        Box::new(self())
    }
}

impl fmt::Debug for dyn ExtensionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExtensionFactory")
    }
}

#[derive(Default)]
pub struct ExtensionChain {
    extensions: Vec<Box<dyn SoapExtension>>,
}

impl ExtensionChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_factories<'a>(
        factories: impl IntoIterator<Item = &'a Arc<dyn ExtensionFactory>>,
    ) -> Self {
        Self {
            extensions: factories.into_iter().map(|f| f.create()).collect(),
        }
    }

    /// Caller-level extensions followed by the contract's outer ones.
    /// Available before a request has been routed.
    pub fn outer(extra: &[Arc<dyn ExtensionFactory>], contract: &ServiceContract) -> Self {
        Self::from_factories(
            extra
                .iter()
                .chain(contract.extensions(ExtensionPlacement::Outer)),
        )
    }

    /// Method extensions followed by the contract's inner ones.
    pub fn inner(contract: &ServiceContract, method: &MethodBinding) -> Self {
        Self::from_factories(
            method
                .extensions()
                .iter()
                .chain(contract.extensions(ExtensionPlacement::Inner)),
        )
    }

    /// The complete chain for a routed call.
    pub fn for_method(
        extra: &[Arc<dyn ExtensionFactory>],
        contract: &ServiceContract,
        method: &MethodBinding,
    ) -> Self {
        let mut chain = Self::outer(extra, contract);
        chain.append(Self::inner(contract, method));
        chain
    }

    /// Place `inner` behind the current extensions (further from the wire).
    pub fn append(&mut self, inner: ExtensionChain) {
        self.extensions.extend(inner.extensions);
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Move `message` to `stage` and let every extension observe it.
    pub fn run(&mut self, message: &mut SoapMessage, stage: MessageStage) -> Result<(), Fault> {
        message.enter(stage).map_err(|e| {
            let message = e.to_string();
            Fault::server(message).with_source(Arc::new(e))
        })?;
        if stage.is_serialize() {
            for extension in self.extensions.iter_mut().rev() {
                extension.process_message(message)?;
            }
        } else {
            for extension in self.extensions.iter_mut() {
                extension.process_message(message)?;
            }
        }
        Ok(())
    }

    pub fn encode_stream(&mut self, mut payload: Bytes) -> Result<Bytes, Fault> {
        for extension in self.extensions.iter_mut().rev() {
            payload = extension.encode_stream(payload)?;
        }
        Ok(payload)
    }

    pub fn decode_stream(&mut self, mut payload: Bytes) -> Result<Bytes, Fault> {
        for extension in self.extensions.iter_mut() {
            payload = extension.decode_stream(payload)?;
        }
        Ok(payload)
    }
}

impl fmt::Debug for ExtensionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionChain")
            .field("len", &self.extensions.len())
            .finish()
    }
}
