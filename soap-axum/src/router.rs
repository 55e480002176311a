//! Builder for mounting several [`SoapService`]s on one axum [`Router`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use soap_axum::{SoapRouterBuilder, SoapService};
//! # use axum::Router;
//! # fn services() -> (SoapService, SoapService) { unimplemented!() }
//! # let (calculator, inventory) = services();
//! # let health: Router<()> = Router::new();
//!
//! let app = SoapRouterBuilder::new()
//!     .service("/calculator", calculator)
//!     .service("/inventory", inventory)
//!     .add_router(health)
//!     .build();
//! ```
//!
//! Each service only answers `POST`; other methods on its path get `405`.

use axum::Router;
use axum::routing::post_service;

use crate::service::SoapService;

/// Combines SOAP endpoints and plain axum routers into one router.
///
/// # Type Parameters
///
/// - `S`: The state type for the routers (default: `()`)
pub struct SoapRouterBuilder<S = ()> {
    router: Router<S>,
}

impl<S> Default for SoapRouterBuilder<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> SoapRouterBuilder<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            router: Router::new(),
        }
    }

    /// Mount `service` at `path`.
    ///
    /// # Panics
    ///
    /// Like [`Router::route`], panics if `path` is already routed or invalid.
    pub fn service(mut self, path: &str, service: SoapService) -> Self {
        self.router = self.router.route(path, post_service(service));
        self
    }

    /// Merge an existing router, e.g. for health checks next to the endpoints.
    pub fn add_router(mut self, router: Router<S>) -> Self {
        self.router = self.router.merge(router);
        self
    }

    pub fn add_routers(mut self, routers: impl IntoIterator<Item = Router<S>>) -> Self {
        for router in routers {
            self.router = self.router.merge(router);
        }
        self
    }

    pub fn build(self) -> Router<S> {
        self.router
    }
}
