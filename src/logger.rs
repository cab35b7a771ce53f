//! Request logging middleware.
//! Logs each request's method, path, status, and elapsed time.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use log::info;
use std::rc::Rc;
use std::time::Instant;

pub struct RequestLogMiddleware;

impl<S, B> Transform<S, ServiceRequest> for RequestLogMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLogMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RequestLogMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct RequestLogMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestLogMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let method = req.method().to_string();
        let path = req.path().to_string();

        info!("Request started: {} {}", method, path);

        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let res = service.call(req).await?;

            let elapsed = start_time.elapsed();
            let status = res.status();

            info!(
                "Request completed: {} {} - Status: {} ({}ms)",
                method,
                path,
                status.as_u16(),
                elapsed.as_millis()
            );

            Ok(res)
        })
    }
}
