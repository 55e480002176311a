use std::collections::HashMap;
use std::sync::Arc;

use super::{
    BindingUse, ContractDescription, Direction, ExtensionPlacement, MethodDecl, ParameterStyle,
    RoutingStyle,
};
use crate::body::{BodyCodec, Part};
use crate::error::ConfigurationError;
use crate::extension::ExtensionFactory;
use crate::value::XmlType;
use crate::version::SoapVersion;
use crate::xml::QName;

/// A header resolved against its contract.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderBinding {
    pub name: QName,
    pub member: String,
    pub direction: Direction,
    /// `None` for custom members that collect unknown headers.
    pub ty: Option<XmlType>,
    pub must_understand: bool,
}

impl HeaderBinding {
    pub fn is_custom(&self) -> bool {
        self.ty.is_none()
    }
}

/// A parameter with its position among the declared parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSlot {
    pub name: String,
    pub ty: XmlType,
    pub direction: Direction,
}

/// Resolved metadata for one contract method. Immutable once built.
#[derive(Debug)]
pub struct MethodBinding {
    name: String,
    action: String,
    request: QName,
    response: QName,
    one_way: bool,
    style: ParameterStyle,
    binding_use: BindingUse,
    binding: Option<String>,
    params: Vec<ParamSlot>,
    returns: Option<XmlType>,
    result_element: String,
    headers: Vec<HeaderBinding>,
    request_codec: BodyCodec,
    response_codec: BodyCodec,
    extensions: Vec<Arc<dyn ExtensionFactory>>,
}

impl MethodBinding {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn request_element(&self) -> &QName {
        &self.request
    }

    pub fn response_element(&self) -> &QName {
        &self.response
    }

    pub fn is_one_way(&self) -> bool {
        self.one_way
    }

    pub fn style(&self) -> ParameterStyle {
        self.style
    }

    pub fn binding_use(&self) -> BindingUse {
        self.binding_use
    }

    pub fn binding(&self) -> Option<&str> {
        self.binding.as_deref()
    }

    pub fn params(&self) -> &[ParamSlot] {
        &self.params
    }

    /// Parameters sent with the request, in declaration order.
    pub fn in_params(&self) -> impl Iterator<Item = &ParamSlot> {
        self.params.iter().filter(|p| p.direction.is_in())
    }

    /// Parameters returned with the response, in declaration order.
    pub fn out_params(&self) -> impl Iterator<Item = &ParamSlot> {
        self.params.iter().filter(|p| p.direction.is_out())
    }

    pub fn returns(&self) -> Option<&XmlType> {
        self.returns.as_ref()
    }

    pub fn result_element(&self) -> &str {
        &self.result_element
    }

    pub fn headers(&self) -> &[HeaderBinding] {
        &self.headers
    }

    pub fn request_codec(&self) -> &BodyCodec {
        &self.request_codec
    }

    /// Response values are the return value (if any) then out parameters.
    pub fn response_codec(&self) -> &BodyCodec {
        &self.response_codec
    }

    pub fn extensions(&self) -> &[Arc<dyn ExtensionFactory>] {
        &self.extensions
    }

    /// Key used for request-element routing.
    pub fn request_key(&self) -> QName {
        self.request_codec.first_element().cloned().unwrap_or_default()
    }
}

/// Bound contract for one SOAP version.
#[derive(Debug)]
pub struct ServiceContract {
    name: String,
    namespace: String,
    version: SoapVersion,
    routing: RoutingStyle,
    methods: Vec<Arc<MethodBinding>>,
    by_name: HashMap<String, usize>,
    by_action: HashMap<String, usize>,
    by_request: HashMap<QName, usize>,
    extensions: Vec<(ExtensionPlacement, Arc<dyn ExtensionFactory>)>,
}

impl ServiceContract {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn version(&self) -> SoapVersion {
        self.version
    }

    pub fn routing(&self) -> RoutingStyle {
        self.routing
    }

    pub fn methods(&self) -> &[Arc<MethodBinding>] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&Arc<MethodBinding>> {
        self.by_name.get(name).map(|&i| &self.methods[i])
    }

    pub fn method_by_action(&self, action: &str) -> Option<&Arc<MethodBinding>> {
        self.by_action.get(action).map(|&i| &self.methods[i])
    }

    pub fn method_by_request_element(&self, element: &QName) -> Option<&Arc<MethodBinding>> {
        self.by_request.get(element).map(|&i| &self.methods[i])
    }

    pub fn extensions(
        &self,
        placement: ExtensionPlacement,
    ) -> impl Iterator<Item = &Arc<dyn ExtensionFactory>> {
        self.extensions
            .iter()
            .filter(move |(p, _)| *p == placement)
            .map(|(_, f)| f)
    }

    /// Resolve a description into immutable bindings.
    pub fn build(
        description: ContractDescription,
        version: SoapVersion,
    ) -> Result<Self, ConfigurationError> {
        let mut contract = ServiceContract {
            name: description.name.clone(),
            namespace: description.namespace.clone(),
            version,
            routing: description.routing,
            methods: Vec::new(),
            by_name: HashMap::new(),
            by_action: HashMap::new(),
            by_request: HashMap::new(),
            extensions: description.extensions.clone(),
        };

        for decl in description.methods.iter().filter(|m| m.web_method) {
            let method = bind_method(&description, decl)?;
            let index = contract.methods.len();

            if contract.by_name.insert(method.name.clone(), index).is_some() {
                return Err(ConfigurationError::DuplicateMethod {
                    method: method.name.clone(),
                });
            }
            if let Some(&first) = contract.by_action.get(&method.action) {
                if description.routing == RoutingStyle::SoapAction {
                    return Err(ConfigurationError::DuplicateAction {
                        action: method.action.clone(),
                        first: contract.methods[first].name.clone(),
                        second: method.name.clone(),
                    });
                }
            } else {
                contract.by_action.insert(method.action.clone(), index);
            }
            let key = method.request_key();
            if let Some(&first) = contract.by_request.get(&key) {
                if description.routing == RoutingStyle::RequestElement {
                    return Err(ConfigurationError::DuplicateRequestElement {
                        element: key.to_string(),
                        first: contract.methods[first].name.clone(),
                        second: method.name.clone(),
                    });
                }
            } else {
                contract.by_request.insert(key, index);
            }
            contract.methods.push(Arc::new(method));
        }
        Ok(contract)
    }
}

/// `ns + name`, inserting a `/` when the namespace does not end with one.
pub fn default_action(namespace: &str, method: &str) -> String {
    if namespace.ends_with('/') {
        format!("{namespace}{method}")
    } else {
        format!("{namespace}/{method}")
    }
}

fn or_default(value: &str, default: impl FnOnce() -> String) -> String {
    if value.is_empty() {
        default()
    } else {
        value.to_owned()
    }
}

fn bind_method(
    description: &ContractDescription,
    decl: &MethodDecl,
) -> Result<MethodBinding, ConfigurationError> {
    if decl.one_way {
        if decl.returns.is_some() {
            return Err(ConfigurationError::OneWayReturnsValue {
                method: decl.name.clone(),
            });
        }
        if let Some(param) = decl.params.iter().find(|p| p.direction.is_out()) {
            return Err(ConfigurationError::OneWayOutParameter {
                method: decl.name.clone(),
                parameter: param.name.clone(),
            });
        }
    }

    let namespace = match &decl.binding {
        Some(binding) => description
            .bindings
            .iter()
            .find(|b| b.name == *binding)
            .map(|b| b.namespace.clone())
            .ok_or_else(|| ConfigurationError::UnknownBinding {
                method: decl.name.clone(),
                binding: binding.clone(),
            })?,
        None => description.namespace.clone(),
    };

    let request = QName::new(
        or_default(&decl.request_namespace, || namespace.clone()),
        or_default(&decl.request_element, || decl.name.clone()),
    );
    let response = QName::new(
        or_default(&decl.response_namespace, || namespace.clone()),
        or_default(&decl.response_element, || format!("{}Response", decl.name)),
    );
    let action = or_default(&decl.action, || default_action(&namespace, &decl.name));
    let style = decl.style.unwrap_or(description.default_style);
    let binding_use = decl.binding_use.unwrap_or(description.default_use);

    let mut headers = Vec::with_capacity(decl.headers.len());
    for header in &decl.headers {
        if !description.members.iter().any(|m| *m == header.member) {
            return Err(ConfigurationError::UnknownHeaderMember {
                method: decl.name.clone(),
                member: header.member.clone(),
            });
        }
        headers.push(HeaderBinding {
            name: QName::new(
                or_default(&header.namespace, || description.namespace.clone()),
                or_default(&header.element, || header.member.clone()),
            ),
            member: header.member.clone(),
            direction: header.direction,
            ty: header.ty.clone(),
            must_understand: header.must_understand,
        });
    }

    let params: Vec<ParamSlot> = decl
        .params
        .iter()
        .map(|p| ParamSlot {
            name: p.name.clone(),
            ty: p.ty.clone(),
            direction: p.direction,
        })
        .collect();
    let result_element = format!("{}Result", decl.name);

    let part_namespace = |ns: &str| match (style, binding_use) {
        (ParameterStyle::Wrapped, BindingUse::Encoded) => String::new(),
        _ => ns.to_owned(),
    };
    let request_parts = params
        .iter()
        .filter(|p| p.direction.is_in())
        .map(|p| Part::new(QName::new(part_namespace(request.namespace()), p.name.clone()), p.ty.clone()))
        .collect();
    let mut response_parts = Vec::new();
    if let Some(ty) = &decl.returns {
        response_parts.push(Part::new(
            QName::new(part_namespace(response.namespace()), result_element.clone()),
            ty.clone(),
        ));
    }
    response_parts.extend(params.iter().filter(|p| p.direction.is_out()).map(|p| {
        Part::new(
            QName::new(part_namespace(response.namespace()), p.name.clone()),
            p.ty.clone(),
        )
    }));

    let request_codec = BodyCodec::compile(style, binding_use, request.clone(), request_parts);
    let response_codec = if decl.one_way {
        BodyCodec::Empty
    } else {
        BodyCodec::compile(style, binding_use, response.clone(), response_parts)
    };

    Ok(MethodBinding {
        name: decl.name.clone(),
        action,
        request,
        response,
        one_way: decl.one_way,
        style,
        binding_use,
        binding: decl.binding.clone(),
        params,
        returns: decl.returns.clone(),
        result_element,
        headers,
        request_codec,
        response_codec,
        extensions: decl.extensions.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{HeaderDecl, DEFAULT_NAMESPACE};

    fn build(description: ContractDescription) -> Result<ServiceContract, ConfigurationError> {
        ServiceContract::build(description, SoapVersion::Soap11)
    }

    #[test]
    fn test_default_naming() {
        let contract = build(
            ContractDescription::new("Svc").method(MethodDecl::new("Foo").returns(XmlType::Int)),
        )
        .unwrap();
        let foo = contract.method("Foo").unwrap();
        assert_eq!(foo.request_element(), &QName::new(DEFAULT_NAMESPACE, "Foo"));
        assert_eq!(foo.response_element(), &QName::new(DEFAULT_NAMESPACE, "FooResponse"));
        assert_eq!(foo.action(), "http://tempuri.org/Foo");
        assert_eq!(foo.result_element(), "FooResult");
        assert_eq!(foo.style(), ParameterStyle::Wrapped);
        assert_eq!(foo.binding_use(), BindingUse::Literal);
    }

    #[test]
    fn test_explicit_names_and_action_separator() {
        let contract = build(
            ContractDescription::new("Svc")
                .namespace("urn:svc")
                .default_use(BindingUse::Encoded)
                .method(
                    MethodDecl::new("Foo")
                        .request_element("FooRequest", "urn:other")
                        .style(ParameterStyle::Bare),
                )
                .method(MethodDecl::new("Bar")),
        )
        .unwrap();
        let foo = contract.method("Foo").unwrap();
        assert_eq!(foo.request_element(), &QName::new("urn:other", "FooRequest"));
        assert_eq!(foo.response_element(), &QName::new("urn:svc", "FooResponse"));
        assert_eq!(foo.action(), "urn:svc/Foo");
        assert_eq!(foo.style(), ParameterStyle::Bare);
        assert_eq!(foo.binding_use(), BindingUse::Encoded);
        assert!(contract.method_by_action("urn:svc/Bar").is_some());
    }

    #[test]
    fn test_hidden_methods_are_skipped() {
        let contract = build(
            ContractDescription::new("Svc")
                .method(MethodDecl::new("Visible"))
                .method(MethodDecl::new("Helper").hidden()),
        )
        .unwrap();
        assert_eq!(contract.methods().len(), 1);
        assert!(contract.method("Helper").is_none());
    }

    #[test]
    fn test_one_way_validation() {
        let err = build(
            ContractDescription::new("Svc")
                .method(MethodDecl::new("Ping").one_way().returns(XmlType::Int)),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::OneWayReturnsValue {
                method: "Ping".into()
            }
        );

        let err = build(
            ContractDescription::new("Svc")
                .method(MethodDecl::new("Ping").one_way().inout_param("x", XmlType::Int)),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::OneWayOutParameter { parameter, .. } if parameter == "x"));

        let ok = build(
            ContractDescription::new("Svc").method(MethodDecl::new("Ping").one_way()),
        )
        .unwrap();
        assert_eq!(ok.method("Ping").unwrap().response_codec(), &BodyCodec::Empty);
    }

    #[test]
    fn test_binding_and_header_member_validation() {
        let err = build(
            ContractDescription::new("Svc").method(MethodDecl::new("A").binding("Missing")),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownBinding { .. }));

        let contract = build(
            ContractDescription::new("Svc")
                .binding("CalcBinding", "urn:bound/")
                .method(MethodDecl::new("A").binding("CalcBinding")),
        )
        .unwrap();
        assert_eq!(contract.method("A").unwrap().action(), "urn:bound/A");

        let err = build(
            ContractDescription::new("Svc").method(
                MethodDecl::new("A").header(HeaderDecl::typed("auth", "Auth", XmlType::String)),
            ),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownHeaderMember { member, .. } if member == "auth"));
    }

    #[test]
    fn test_duplicate_routing_keys() {
        let err = build(
            ContractDescription::new("Svc")
                .method(MethodDecl::new("A").action("urn:same"))
                .method(MethodDecl::new("B").action("urn:same")),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateAction { .. }));

        let err = build(
            ContractDescription::new("Svc")
                .routing(RoutingStyle::RequestElement)
                .method(MethodDecl::new("A").request_element("Same", ""))
                .method(MethodDecl::new("B").request_element("Same", "")),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateRequestElement { .. }));

        // Shared actions are fine when routing by element.
        assert!(
            build(
                ContractDescription::new("Svc")
                    .routing(RoutingStyle::RequestElement)
                    .method(MethodDecl::new("A").action("urn:same"))
                    .method(MethodDecl::new("B").action("urn:same")),
            )
            .is_ok()
        );
    }

    #[test]
    fn test_response_parts_order() {
        let contract = build(
            ContractDescription::new("Svc").method(
                MethodDecl::new("Div")
                    .param("a", XmlType::Int)
                    .out_param("remainder", XmlType::Int)
                    .inout_param("scale", XmlType::Int)
                    .returns(XmlType::Int),
            ),
        )
        .unwrap();
        let div = contract.method("Div").unwrap();
        let names: Vec<_> = div
            .response_codec()
            .parts()
            .iter()
            .map(|p| p.element.local_name().to_owned())
            .collect();
        assert_eq!(names, ["DivResult", "remainder", "scale"]);
        let inputs: Vec<_> = div.in_params().map(|p| p.name.as_str()).collect();
        assert_eq!(inputs, ["a", "scale"]);
    }
}
