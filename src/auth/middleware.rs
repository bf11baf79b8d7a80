use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, FromRequest, HttpMessage, HttpRequest, ResponseError,
};
use futures::future::LocalBoxFuture;

use crate::{
    auth::{Claims, JwtService, TokenVerification},
    errors::AppError,
};

/// Bearer-token gate. Verifies the access token when one is presented and
/// establishes the principal for the rest of the request.
///
/// A request without a token passes through unauthenticated; handlers that
/// need a principal reject it via the `AuthenticatedUser` extractor. A
/// request that presents an invalid or expired token is rejected with 401
/// immediately. The response never says which of the two it was.
pub struct AuthMiddleware {
    jwt_service: JwtService,
    public_paths: Rc<Vec<String>>,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService, public_paths: Vec<String>) -> Self {
        Self {
            jwt_service,
            public_paths: Rc::new(public_paths),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            jwt_service: self.jwt_service.clone(),
            public_paths: Rc::clone(&self.public_paths),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    jwt_service: JwtService,
    public_paths: Rc<Vec<String>>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        let is_public = self
            .public_paths
            .iter()
            .any(|prefix| req.path().starts_with(prefix.as_str()));

        if !is_public {
            match extract_bearer_token(&req) {
                None => {
                    // No credential presented; downstream authorization
                    // decides whether the route allows anonymous access.
                }
                Some(token) => match self.jwt_service.verify_token(&token) {
                    TokenVerification::Valid(claims) => {
                        req.extensions_mut().insert(claims);
                    }
                    TokenVerification::Expired | TokenVerification::Malformed => {
                        let (request, _) = req.into_parts();
                        let response =
                            AppError::Unauthorized("Invalid or expired token".to_string())
                                .error_response()
                                .map_into_right_body();
                        return Box::pin(async move {
                            Ok(ServiceResponse::new(request, response))
                        });
                    }
                },
            }
        }

        Box::pin(async move {
            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

fn extract_bearer_token(req: &ServiceRequest) -> Option<String> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.trim().strip_prefix("Bearer ")?.trim();

    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Extractor for the authenticated principal. Requesting it on a handler
/// makes the route protected: anonymous requests get 401.
pub struct AuthenticatedUser(pub Claims);

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let claims = req
            .extensions()
            .get::<Claims>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()));

        ready(claims.map(AuthenticatedUser))
    }
}
