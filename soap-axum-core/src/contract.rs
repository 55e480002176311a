//! Statically declared contract descriptions.
//!
//! A contract is described once with plain builders and turned into a
//! [`ServiceContract`](crate::ServiceContract) by the
//! [`ContractRegistry`](crate::ContractRegistry). Empty strings in names,
//! namespaces and actions mean "compute the default".
//!
//! ```
//! use soap_axum_core::{ContractDescription, MethodDecl, SoapContract, XmlType};
//!
//! struct Calculator;
//!
//! impl SoapContract for Calculator {
//!     fn describe() -> ContractDescription {
//!         ContractDescription::new("Calculator")
//!             .namespace("urn:calc/")
//!             .method(
//!                 MethodDecl::new("Add")
//!                     .param("a", XmlType::Int)
//!                     .param("b", XmlType::Int)
//!                     .returns(XmlType::Int),
//!             )
//!     }
//! }
//! ```

mod binding;

pub use binding::*;

use std::sync::Arc;

use crate::extension::ExtensionFactory;
use crate::value::XmlType;

/// Namespace used when a contract does not declare one.
pub const DEFAULT_NAMESPACE: &str = "http://tempuri.org/";

/// How parameters are laid out inside the Body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterStyle {
    /// Parameters nested in one element named after the method.
    #[default]
    Wrapped,
    /// Parameters are direct Body children.
    Bare,
}

/// Serialization rules for parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindingUse {
    /// Schema-shaped XML, parameters qualified in the method namespace.
    #[default]
    Literal,
    /// SOAP encoding: unqualified parameters carrying `xsi:type`.
    Encoded,
}

/// How the server picks the method for an incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingStyle {
    #[default]
    SoapAction,
    RequestElement,
}

/// Direction of a parameter or header relative to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    In,
    Out,
    InOut,
}

impl Direction {
    /// Travels with the request.
    pub fn is_in(&self) -> bool {
        matches!(self, Self::In | Self::InOut)
    }

    /// Travels with the response.
    pub fn is_out(&self) -> bool {
        matches!(self, Self::Out | Self::InOut)
    }
}

/// Where a contract-level extension sits relative to method extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionPlacement {
    /// Nearer the wire than method extensions.
    Outer,
    /// Nearer the handler than method extensions.
    Inner,
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: String,
    pub ty: XmlType,
    pub direction: Direction,
}

/// A header bound to a member of the client or server object.
#[derive(Debug, Clone)]
pub struct HeaderDecl {
    pub member: String,
    pub element: String,
    pub namespace: String,
    pub direction: Direction,
    /// `None` marks a custom member collecting headers nothing else binds.
    pub ty: Option<XmlType>,
    pub must_understand: bool,
}

impl HeaderDecl {
    /// A header with a known schema type.
    pub fn typed(member: impl Into<String>, element: impl Into<String>, ty: XmlType) -> Self {
        Self {
            member: member.into(),
            element: element.into(),
            namespace: String::new(),
            direction: Direction::In,
            ty: Some(ty),
            must_understand: false,
        }
    }

    /// A member receiving every header no typed binding claims.
    pub fn unknown(member: impl Into<String>) -> Self {
        Self {
            member: member.into(),
            element: String::new(),
            namespace: String::new(),
            direction: Direction::In,
            ty: None,
            must_understand: false,
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn must_understand(mut self, must_understand: bool) -> Self {
        self.must_understand = must_understand;
        self
    }
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    pub web_method: bool,
    pub action: String,
    pub request_element: String,
    pub request_namespace: String,
    pub response_element: String,
    pub response_namespace: String,
    pub one_way: bool,
    pub style: Option<ParameterStyle>,
    pub binding_use: Option<BindingUse>,
    pub binding: Option<String>,
    pub params: Vec<ParamDecl>,
    pub returns: Option<XmlType>,
    pub headers: Vec<HeaderDecl>,
    pub extensions: Vec<Arc<dyn ExtensionFactory>>,
}

impl MethodDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            web_method: true,
            action: String::new(),
            request_element: String::new(),
            request_namespace: String::new(),
            response_element: String::new(),
            response_namespace: String::new(),
            one_way: false,
            style: None,
            binding_use: None,
            binding: None,
            params: Vec::new(),
            returns: None,
            headers: Vec::new(),
            extensions: Vec::new(),
        }
    }

    /// Keep the method on the type but do not expose it.
    pub fn hidden(mut self) -> Self {
        self.web_method = false;
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    pub fn request_element(mut self, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.request_element = name.into();
        self.request_namespace = namespace.into();
        self
    }

    pub fn response_element(
        mut self,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        self.response_element = name.into();
        self.response_namespace = namespace.into();
        self
    }

    pub fn one_way(mut self) -> Self {
        self.one_way = true;
        self
    }

    pub fn style(mut self, style: ParameterStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn binding_use(mut self, binding_use: BindingUse) -> Self {
        self.binding_use = Some(binding_use);
        self
    }

    pub fn binding(mut self, binding: impl Into<String>) -> Self {
        self.binding = Some(binding.into());
        self
    }

    pub fn param(self, name: impl Into<String>, ty: XmlType) -> Self {
        self.param_with(name, ty, Direction::In)
    }

    pub fn out_param(self, name: impl Into<String>, ty: XmlType) -> Self {
        self.param_with(name, ty, Direction::Out)
    }

    pub fn inout_param(self, name: impl Into<String>, ty: XmlType) -> Self {
        self.param_with(name, ty, Direction::InOut)
    }

    fn param_with(mut self, name: impl Into<String>, ty: XmlType, direction: Direction) -> Self {
        self.params.push(ParamDecl {
            name: name.into(),
            ty,
            direction,
        });
        self
    }

    pub fn returns(mut self, ty: XmlType) -> Self {
        self.returns = Some(ty);
        self
    }

    pub fn header(mut self, header: HeaderDecl) -> Self {
        self.headers.push(header);
        self
    }

    pub fn extension<F: ExtensionFactory>(mut self, factory: F) -> Self {
        self.extensions.push(Arc::new(factory));
        self
    }
}

/// A named binding methods can opt into; it supplies their namespace.
#[derive(Debug, Clone)]
pub struct BindingDecl {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone)]
pub struct ContractDescription {
    pub name: String,
    pub namespace: String,
    pub default_style: ParameterStyle,
    pub default_use: BindingUse,
    pub routing: RoutingStyle,
    pub members: Vec<String>,
    pub bindings: Vec<BindingDecl>,
    pub methods: Vec<MethodDecl>,
    pub extensions: Vec<(ExtensionPlacement, Arc<dyn ExtensionFactory>)>,
}

impl ContractDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: DEFAULT_NAMESPACE.to_owned(),
            default_style: ParameterStyle::default(),
            default_use: BindingUse::default(),
            routing: RoutingStyle::default(),
            members: Vec::new(),
            bindings: Vec::new(),
            methods: Vec::new(),
            extensions: Vec::new(),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn default_style(mut self, style: ParameterStyle) -> Self {
        self.default_style = style;
        self
    }

    pub fn default_use(mut self, binding_use: BindingUse) -> Self {
        self.default_use = binding_use;
        self
    }

    pub fn routing(mut self, routing: RoutingStyle) -> Self {
        self.routing = routing;
        self
    }

    /// Declare a member headers can bind to.
    pub fn member(mut self, member: impl Into<String>) -> Self {
        self.members.push(member.into());
        self
    }

    pub fn binding(mut self, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.bindings.push(BindingDecl {
            name: name.into(),
            namespace: namespace.into(),
        });
        self
    }

    pub fn method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }

    pub fn extension<F: ExtensionFactory>(mut self, placement: ExtensionPlacement, factory: F) -> Self {
        self.extensions.push((placement, Arc::new(factory)));
        self
    }
}

/// A Rust type with a SOAP contract.
pub trait SoapContract: 'static {
    fn describe() -> ContractDescription;
}
