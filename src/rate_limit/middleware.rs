use std::{
    future::{ready, Ready},
    rc::Rc,
    sync::Arc,
};

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, ResponseError,
};
use futures::future::LocalBoxFuture;
use log::{error, warn};

use crate::{
    errors::AppError,
    rate_limit::{bucket_key, RateLimitCategory, RateLimitDecision, RateLimitSettings},
    repositories::RateLimitRepository,
};

/// Admission control, evaluated before authentication. Each request
/// consumes one token from the caller's `(client, category)` bucket in
/// the shared store; an empty bucket rejects with 429 and a retry hint.
///
/// The consumed token is not refunded if the client disconnects. An
/// unreachable store fails OPEN: the request is admitted and the failure
/// logged.
pub struct RateLimitMiddleware {
    store: Arc<dyn RateLimitRepository>,
    settings: Rc<RateLimitSettings>,
}

impl RateLimitMiddleware {
    pub fn new(store: Arc<dyn RateLimitRepository>, settings: RateLimitSettings) -> Self {
        Self {
            store,
            settings: Rc::new(settings),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            store: Arc::clone(&self.store),
            settings: Rc::clone(&self.settings),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    store: Arc<dyn RateLimitRepository>,
    settings: Rc<RateLimitSettings>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
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
        let store = Arc::clone(&self.store);
        let settings = Rc::clone(&self.settings);

        Box::pin(async move {
            let path = req.path().to_string();

            if settings.should_skip(&path) {
                let res = service.call(req).await?;
                return Ok(res.map_into_left_body());
            }

            let category = RateLimitCategory::for_path(&path);
            let limits = settings.for_category(category);

            if !limits.enabled {
                let res = service.call(req).await?;
                return Ok(res.map_into_left_body());
            }

            let client_id = client_identity(&req);
            let key = bucket_key(category, &client_id);

            match store.try_consume(&key, limits).await {
                Ok(RateLimitDecision::Allowed) => {
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Ok(RateLimitDecision::Limited) => {
                    warn!("Rate limit exceeded for client {} on path {}", client_id, path);

                    let (request, _) = req.into_parts();
                    let response = AppError::RateLimited {
                        retry_after_seconds: limits.retry_after_seconds(),
                    }
                    .error_response()
                    .map_into_right_body();
                    Ok(ServiceResponse::new(request, response))
                }
                Err(err) => {
                    // Fail open on store outage.
                    error!("Rate limit store unavailable, admitting request: {}", err);

                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
            }
        })
    }
}

/// Client identity for bucket keying: first hop of `X-Forwarded-For`
/// when present (proxy/load-balancer deployments), else the peer address.
fn client_identity(req: &ServiceRequest) -> String {
    req.headers()
        .get("X-Forwarded-For")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| {
            req.peer_addr()
                .map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string())
        })
}
