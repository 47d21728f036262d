//! Access control list middleware for the course payment server.
//! This middleware can be placed on any route or service.
//!
//! It will check the incoming request for a valid access token and then check the role claim in the token
//! against the roles permitted on the route. If the token is valid and the user's role is one of the
//! permitted ones, the request will be allowed to continue and the verified claims are stored in the request
//! extensions. Otherwise, a 401 or 403 response will be returned.

use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorForbidden, ErrorInternalServerError},
    web,
    Error,
    HttpMessage,
};
use course_payment_engine::db_types::Role;
use futures::{
    future::{ok, Ready},
    Future,
};

use crate::{
    auth::{TokenIssuer, AUTH_HEADER},
    errors::{AuthError, ServerError},
};

pub struct AclMiddlewareFactory {
    permitted_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(permitted_roles: &[Role]) -> Self {
        AclMiddlewareFactory { permitted_roles: permitted_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { permitted_roles: self.permitted_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    permitted_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let permitted_roles = self.permitted_roles.clone();
        Box::pin(async move {
            let issuer = req
                .app_data::<web::Data<TokenIssuer>>()
                .ok_or_else(|| {
                    log::warn!("No token issuer found in app data");
                    ErrorInternalServerError("No token issuer found in app data")
                })?
                .clone();
            let token = req
                .headers()
                .get(AUTH_HEADER)
                .and_then(|v| v.to_str().ok())
                .ok_or(ServerError::CouldNotDeserializeAuthToken)?;
            let claims = issuer
                .validate_token(token)
                .map_err(|e: AuthError| ServerError::AuthenticationError(e))?;
            if permitted_roles.contains(&claims.role) {
                req.extensions_mut().insert(claims);
                service.call(req).await
            } else {
                Err(ErrorForbidden("Insufficient permissions"))
            }
        })
    }
}
