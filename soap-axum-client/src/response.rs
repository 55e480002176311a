//! The decoded result of a call.

use std::sync::Arc;

use http::{HeaderMap, StatusCode};
use soap_axum_core::{HeaderMembers, MethodBinding, SoapHeader, Value};

/// Results and headers of a successful call.
///
/// `results` holds the return value (if the method declares one) followed by
/// Out and InOut parameters in declaration order.
#[derive(Debug, Clone)]
pub struct SoapResponse {
    pub(crate) method: Arc<MethodBinding>,
    pub(crate) status: StatusCode,
    pub(crate) results: Vec<Value>,
    pub(crate) headers: HeaderMembers,
    pub(crate) not_understood: Vec<SoapHeader>,
    pub(crate) http_headers: HeaderMap,
}

impl SoapResponse {
    /// Response of a one-way call or an empty `202 Accepted`.
    pub(crate) fn accepted(method: Arc<MethodBinding>, status: StatusCode, http_headers: HeaderMap) -> Self {
        Self {
            method,
            status,
            results: Vec::new(),
            headers: HeaderMembers::new(),
            not_understood: Vec::new(),
            http_headers,
        }
    }

    pub fn method(&self) -> &MethodBinding {
        &self.method
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn results(&self) -> &[Value] {
        &self.results
    }

    pub fn into_results(self) -> Vec<Value> {
        self.results
    }

    /// The return value, if the method declares one.
    pub fn return_value(&self) -> Option<&Value> {
        self.method.returns()?;
        self.results.first()
    }

    /// An Out or InOut parameter by name.
    pub fn out(&self, name: &str) -> Option<&Value> {
        let offset = usize::from(self.method.returns().is_some());
        let index = self.method.out_params().position(|p| p.name == name)?;
        self.results.get(offset + index)
    }

    /// Header members assigned from the response.
    pub fn headers(&self) -> &HeaderMembers {
        &self.headers
    }

    pub fn header(&self, member: &str) -> Option<&Value> {
        self.headers.get(member)
    }

    /// Response headers that no member accepted.
    pub fn not_understood(&self) -> &[SoapHeader] {
        &self.not_understood
    }

    pub fn http_headers(&self) -> &HeaderMap {
        &self.http_headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soap_axum_core::{ContractDescription, MethodDecl, ServiceContract, SoapVersion, XmlType};

    fn method() -> Arc<MethodBinding> {
        let contract = ServiceContract::build(
            ContractDescription::new("Calc").method(
                MethodDecl::new("Divide")
                    .param("a", XmlType::Int)
                    .out_param("remainder", XmlType::Int)
                    .param("b", XmlType::Int)
                    .inout_param("note", XmlType::String)
                    .returns(XmlType::Int),
            ),
            SoapVersion::Soap11,
        )
        .unwrap();
        contract.method("Divide").unwrap().clone()
    }

    #[test]
    fn test_results_by_name() {
        let response = SoapResponse {
            results: vec![Value::Int(3), Value::Int(1), Value::String("ok".into())],
            ..SoapResponse::accepted(method(), StatusCode::OK, HeaderMap::new())
        };
        assert_eq!(response.return_value(), Some(&Value::Int(3)));
        assert_eq!(response.out("remainder"), Some(&Value::Int(1)));
        assert_eq!(response.out("note"), Some(&Value::String("ok".into())));
        assert_eq!(response.out("a"), None);
    }
}
