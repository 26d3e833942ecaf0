use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use log::{error, info, warn};
use std::future::{ready, Future, Ready};
use std::pin::Pin;
use std::rc::Rc;
use std::time::Instant;

// Logs every request/response pair with status and timing.
pub struct RequestLogger;

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RequestLoggerMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggerMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct RequestLoggerMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestLoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let method = req.method().clone();
        let path = req.path().to_owned();
        let peer = req
            .connection_info()
            .realip_remote_addr()
            .map(str::to_string)
            .unwrap_or_else(|| "unknown".to_string());

        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let started = Instant::now();
            let res = service.call(req).await?;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            let status = res.status();

            if status.is_server_error() {
                error!(
                    "{} {} -> {} in {:.1} ms (peer {})",
                    method,
                    path,
                    status.as_u16(),
                    elapsed_ms,
                    peer
                );
            } else if status.is_client_error() {
                warn!(
                    "{} {} -> {} in {:.1} ms (peer {})",
                    method,
                    path,
                    status.as_u16(),
                    elapsed_ms,
                    peer
                );
            } else {
                info!(
                    "{} {} -> {} in {:.1} ms (peer {})",
                    method,
                    path,
                    status.as_u16(),
                    elapsed_ms,
                    peer
                );
            }

            Ok(res)
        })
    }
}
