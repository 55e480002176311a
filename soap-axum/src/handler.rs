//! Method handlers.
//!
//! A handler is any `Fn(SoapCall) -> impl Future<Output = Result<SoapReply, HandlerError>>`.
//! Every request gets its own [`SoapCall`]; shared state is captured by the
//! closure.
//!
//! ```rust
//! use soap_axum::{HandlerError, SoapCall, SoapReply};
//!
//! async fn add(call: SoapCall) -> Result<SoapReply, HandlerError> {
//!     let a = call.arg("a").and_then(|v| v.as_i32()).unwrap_or_default();
//!     let b = call.arg("b").and_then(|v| v.as_i32()).unwrap_or_default();
//!     Ok(SoapReply::returning(a + b))
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use http::HeaderMap;
use soap_axum_core::{HeaderMembers, MethodBinding, SoapHeader, SoapVersion, Value};

use crate::error::HandlerError;

pub trait SoapHandler: Send + Sync + 'static {
    fn call(&self, call: SoapCall) -> BoxFuture<'static, Result<SoapReply, HandlerError>>;
}

impl<F, Fut> SoapHandler for F
where
    F: Fn(SoapCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<SoapReply, HandlerError>> + Send + 'static,
{
    fn call(&self, call: SoapCall) -> BoxFuture<'static, Result<SoapReply, HandlerError>> {
        Box::pin(self(call))
    }
}

/// A decoded request.
#[derive(Debug)]
pub struct SoapCall {
    pub(crate) method: Arc<MethodBinding>,
    pub(crate) version: SoapVersion,
    pub(crate) args: Vec<Value>,
    pub(crate) headers: HeaderMembers,
    pub(crate) not_understood: Vec<SoapHeader>,
    pub(crate) http_headers: HeaderMap,
}

impl SoapCall {
    pub fn method(&self) -> &MethodBinding {
        &self.method
    }

    pub fn version(&self) -> SoapVersion {
        self.version
    }

    /// In and InOut arguments in declaration order.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn into_args(self) -> Vec<Value> {
        self.args
    }

    /// Argument by parameter name.
    pub fn arg(&self, name: &str) -> Option<&Value> {
        let index = self.method.in_params().position(|p| p.name == name)?;
        self.args.get(index)
    }

    /// Header members bound from the request.
    pub fn headers(&self) -> &HeaderMembers {
        &self.headers
    }

    pub fn header(&self, member: &str) -> Option<&Value> {
        self.headers.get(member)
    }

    /// Headers that neither a typed nor a custom member accepted.
    pub fn not_understood(&self) -> &[SoapHeader] {
        &self.not_understood
    }

    pub fn http_headers(&self) -> &HeaderMap {
        &self.http_headers
    }
}

/// The result of a handler: the return value (if the method has one)
/// followed by Out and InOut parameters, plus header members to send back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoapReply {
    pub(crate) values: Vec<Value>,
    pub(crate) headers: HeaderMembers,
}

impl SoapReply {
    /// Reply of a method without return value or out parameters.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn returning(value: impl Into<Value>) -> Self {
        Self::empty().out(value)
    }

    /// Append the next response part.
    pub fn out(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn header(mut self, member: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.set(member, value);
        self
    }

    pub fn unknown_headers(mut self, member: impl Into<String>, headers: Vec<SoapHeader>) -> Self {
        self.headers.set_unknown(member, headers);
        self
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_parts_keep_order() {
        let reply = SoapReply::returning(7).out("note").header("session", "s-1");
        assert_eq!(reply.values(), &[Value::Int(7), Value::String("note".into())]);
        assert_eq!(reply.headers.get("session"), Some(&Value::String("s-1".into())));
    }

    #[tokio::test]
    async fn test_closure_handler_reads_named_args() {
        use soap_axum_core::{ContractDescription, MethodDecl, ServiceContract, XmlType};

        let contract = ServiceContract::build(
            ContractDescription::new("Calc").namespace("urn:calc/").method(
                MethodDecl::new("Add")
                    .param("a", XmlType::Int)
                    .out_param("note", XmlType::String)
                    .param("b", XmlType::Int)
                    .returns(XmlType::Int),
            ),
            SoapVersion::Soap11,
        )
        .unwrap();
        let call = SoapCall {
            method: contract.method("Add").unwrap().clone(),
            version: SoapVersion::Soap11,
            args: vec![Value::Int(2), Value::Int(3)],
            headers: HeaderMembers::new(),
            not_understood: Vec::new(),
            http_headers: HeaderMap::new(),
        };

        let handler: Arc<dyn SoapHandler> = Arc::new(|call: SoapCall| async move {
            let a = call.arg("a").and_then(Value::as_i32).unwrap_or_default();
            let b = call.arg("b").and_then(Value::as_i32).unwrap_or_default();
            Ok::<_, HandlerError>(SoapReply::returning(a + b).out("added"))
        });
        let reply = handler.call(call).await.unwrap();
        assert_eq!(reply.values(), &[Value::Int(5), Value::String("added".into())]);
    }
}
