//! API key middleware for Actix Web.
//!
//! Admin routes are wrapped in this middleware. The caller must supply the configured admin key in the `X-API-KEY`
//! header, otherwise the request is rejected with a 401 before it reaches a handler.
//!
//! An empty key means that no admin key has been configured, and every admin request is refused.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use faka_common::Secret;
use futures::future::LocalBoxFuture;
use log::{trace, warn};

use crate::errors::ServerError;

pub const API_KEY_HEADER: &str = "X-API-KEY";

pub struct ApiKeyMiddlewareFactory {
    key: Secret<String>,
}

impl ApiKeyMiddlewareFactory {
    pub fn new(key: Secret<String>) -> Self {
        ApiKeyMiddlewareFactory { key }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = ApiKeyMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiKeyMiddlewareService { key: self.key.clone(), service: Rc::new(service) }))
    }
}

pub struct ApiKeyMiddlewareService<S> {
    key: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ApiKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let authorized = !self.key.is_empty() &&
            req.headers()
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|candidate| self.key.matches(candidate.trim()))
                .unwrap_or(false);
        Box::pin(async move {
            if authorized {
                trace!("🔐️ Admin key check for {} ✅️", req.path());
                service.call(req).await
            } else {
                let peer = req.connection_info().peer_addr().unwrap_or("unknown").to_string();
                warn!("🔐️ Rejected admin request to {} from {peer}. Missing or invalid API key.", req.path());
                Err(ServerError::Unauthorized.into())
            }
        })
    }
}
