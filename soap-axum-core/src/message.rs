//! Per-call message state observed by extensions.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::contract::MethodBinding;
use crate::envelope::SoapHeader;
use crate::fault::Fault;
use crate::value::Value;
use crate::version::SoapVersion;

/// Processing stage of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStage {
    BeforeSerialize,
    AfterSerialize,
    BeforeDeserialize,
    AfterDeserialize,
}

impl MessageStage {
    pub fn is_serialize(&self) -> bool {
        matches!(self, Self::BeforeSerialize | Self::AfterSerialize)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeSerialize => "before_serialize",
            Self::AfterSerialize => "after_serialize",
            Self::BeforeDeserialize => "before_deserialize",
            Self::AfterDeserialize => "after_deserialize",
        }
    }
}

impl fmt::Display for MessageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which end of the exchange owns the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSide {
    /// Serializes the request, then deserializes the response.
    Client,
    /// Deserializes the request, then serializes the response.
    Server,
}

impl MessageSide {
    fn sequence(&self) -> [MessageStage; 4] {
        use MessageStage::*;
        match self {
            Self::Client => [BeforeSerialize, AfterSerialize, BeforeDeserialize, AfterDeserialize],
            Self::Server => [BeforeDeserialize, AfterDeserialize, BeforeSerialize, AfterSerialize],
        }
    }

    fn position(&self, stage: MessageStage) -> usize {
        self.sequence()
            .iter()
            .position(|s| *s == stage)
            .unwrap_or_default()
    }
}

/// Attempted to skip, repeat or go back to a stage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{side:?} message cannot move from {from:?} to {to}")]
pub struct StageError {
    pub side: MessageSide,
    pub from: Option<MessageStage>,
    pub to: MessageStage,
}

/// The message of one call.
///
/// Only the extension chain advances the stage; extensions see the message
/// through `&mut` but have no way to change the current stage.
#[derive(Debug)]
pub struct SoapMessage {
    side: MessageSide,
    version: SoapVersion,
    stage: Option<MessageStage>,
    method: Option<Arc<MethodBinding>>,
    action: String,
    headers: Vec<SoapHeader>,
    parameters: Vec<Value>,
    fault: Option<Fault>,
    payload: Option<Bytes>,
}

impl SoapMessage {
    pub fn new(side: MessageSide, version: SoapVersion) -> Self {
        Self {
            side,
            version,
            stage: None,
            method: None,
            action: String::new(),
            headers: Vec::new(),
            parameters: Vec::new(),
            fault: None,
            payload: None,
        }
    }

    /// Message for a resolved method, with its action already set.
    pub fn for_method(side: MessageSide, version: SoapVersion, method: Arc<MethodBinding>) -> Self {
        let mut message = Self::new(side, version);
        message.action = method.action().to_owned();
        message.method = Some(method);
        message
    }

    pub fn side(&self) -> MessageSide {
        self.side
    }

    pub fn version(&self) -> SoapVersion {
        self.version
    }

    pub fn stage(&self) -> Option<MessageStage> {
        self.stage
    }

    /// `None` on the server until the request has been routed.
    pub fn method(&self) -> Option<&Arc<MethodBinding>> {
        self.method.as_ref()
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn headers(&self) -> &[SoapHeader] {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Vec<SoapHeader> {
        &mut self.headers
    }

    /// Request arguments while the request is current, results afterwards.
    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut Vec<Value> {
        &mut self.parameters
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    /// Serialized envelope, available from `AfterSerialize` and `BeforeDeserialize`.
    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    pub fn set_method(&mut self, method: Arc<MethodBinding>) {
        self.action = method.action().to_owned();
        self.method = Some(method);
    }

    pub fn set_action(&mut self, action: impl Into<String>) {
        self.action = action.into();
    }

    pub fn set_headers(&mut self, headers: Vec<SoapHeader>) {
        self.headers = headers;
    }

    pub fn set_parameters(&mut self, parameters: Vec<Value>) {
        self.parameters = parameters;
    }

    pub fn take_headers(&mut self) -> Vec<SoapHeader> {
        std::mem::take(&mut self.headers)
    }

    pub fn take_parameters(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.parameters)
    }

    pub fn set_fault(&mut self, fault: Fault) {
        self.fault = Some(fault);
    }

    pub fn set_payload(&mut self, payload: Bytes) {
        self.payload = Some(payload);
    }

    /// Whether `stage` is the next one.
    ///
    /// A message starts at the beginning of either phase (a server that fails
    /// before reading the request still writes a fault), then advances one
    /// stage at a time.
    pub fn can_enter(&self, stage: MessageStage) -> bool {
        match self.stage {
            None => matches!(
                stage,
                MessageStage::BeforeSerialize | MessageStage::BeforeDeserialize
            ),
            Some(current) => self.side.position(stage) == self.side.position(current) + 1,
        }
    }

    /// Advance to `stage`.
    pub(crate) fn enter(&mut self, stage: MessageStage) -> Result<(), StageError> {
        if !self.can_enter(stage) {
            return Err(StageError {
                side: self.side,
                from: self.stage,
                to: stage,
            });
        }
        self.stage = Some(stage);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_stage_order() {
        let mut message = SoapMessage::new(MessageSide::Client, SoapVersion::Soap11);
        message.enter(MessageStage::BeforeSerialize).unwrap();
        message.enter(MessageStage::AfterSerialize).unwrap();
        assert!(message.enter(MessageStage::BeforeSerialize).is_err());
        message.enter(MessageStage::BeforeDeserialize).unwrap();
        message.enter(MessageStage::AfterDeserialize).unwrap();
        assert!(message.enter(MessageStage::AfterDeserialize).is_err());
    }

    #[test]
    fn test_server_stage_order() {
        let mut message = SoapMessage::new(MessageSide::Server, SoapVersion::Soap12);
        assert!(!message.can_enter(MessageStage::AfterDeserialize));
        message.enter(MessageStage::BeforeDeserialize).unwrap();
        assert!(!message.can_enter(MessageStage::BeforeSerialize));
        let err = message.enter(MessageStage::AfterSerialize).unwrap_err();
        assert_eq!(err.from, Some(MessageStage::BeforeDeserialize));

        message.enter(MessageStage::AfterDeserialize).unwrap();
        message.enter(MessageStage::BeforeSerialize).unwrap();
        message.enter(MessageStage::AfterSerialize).unwrap();
        assert!(message.enter(MessageStage::AfterDeserialize).is_err());
    }

    #[test]
    fn test_rejected_request_starts_at_write() {
        let mut message = SoapMessage::new(MessageSide::Server, SoapVersion::Soap11);
        message.enter(MessageStage::BeforeSerialize).unwrap();
        message.enter(MessageStage::AfterSerialize).unwrap();
    }
}
