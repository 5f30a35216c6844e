//! Ends in-flight calls once the shutdown grace period is over.
//!
//! tonic runs every connection on its own task, so dropping the server future
//! does not stop calls that are already being handled. [`HardStopLayer`] races
//! each request against a [`CancellationToken`]; when the token fires, the
//! handler future (and with it the module's future) is dropped and the caller
//! receives `UNAVAILABLE`.

use core::task::{Context, Poll};
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tonic::{Status, codegen::http};
use tower::{Layer, Service};

pub const SHUTTING_DOWN: &str = "server is shutting down";

#[derive(Clone)]
pub struct HardStopLayer {
    token: CancellationToken,
}

impl HardStopLayer {
    pub const fn new(token: CancellationToken) -> Self {
        Self { token }
    }
}

impl<S> Layer<S> for HardStopLayer {
    type Service = HardStop<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HardStop {
            inner,
            token: self.token.clone(),
        }
    }
}

#[derive(Clone)]
pub struct HardStop<S> {
    inner: S,
    token: CancellationToken,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for HardStop<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    S::Future: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let token = self.token.clone();
        let call = self.inner.call(req);
        Box::pin(async move {
            tokio::select! {
                res = call => res,
                () = token.cancelled() => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Abandoning a call still in flight after the grace period");
                    Ok(Status::unavailable(SHUTTING_DOWN).into_http())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use futures::future::{self, Ready};

    /// Answers `OK` immediately, or never when the path is `/stuck`.
    #[derive(Clone)]
    struct Routes;

    impl Service<http::Request<()>> for Routes {
        type Response = http::Response<String>;
        type Error = Infallible;
        type Future = future::Either<
            Ready<Result<Self::Response, Infallible>>,
            future::Pending<Result<Self::Response, Infallible>>,
        >;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: http::Request<()>) -> Self::Future {
            if req.uri().path() == "/stuck" {
                future::Either::Right(future::pending())
            } else {
                future::Either::Left(future::ready(Ok(http::Response::new("OK".into()))))
            }
        }
    }

    fn request(path: &str) -> http::Request<()> {
        http::Request::builder().uri(path).body(()).unwrap()
    }

    fn grpc_status(res: &http::Response<String>) -> Option<&str> {
        res.headers()
            .get("grpc-status")
            .and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn calls_pass_through_until_the_token_fires() {
        let token = CancellationToken::new();
        let mut svc = HardStopLayer::new(token.clone()).layer(Routes);

        let res = svc.call(request("/fast")).await.unwrap();
        assert_eq!(res.body(), "OK");
        assert_eq!(grpc_status(&res), None);
    }

    #[tokio::test]
    async fn stuck_call_becomes_unavailable_on_hard_stop() {
        let token = CancellationToken::new();
        let mut svc = HardStopLayer::new(token.clone()).layer(Routes);

        let stuck = tokio::spawn(svc.call(request("/stuck")));
        tokio::task::yield_now().await;
        assert!(!stuck.is_finished());

        token.cancel();
        let res = stuck.await.unwrap().unwrap();
        let code = tonic::Code::Unavailable as i32;
        assert_eq!(grpc_status(&res), Some(code.to_string().as_str()));
    }

    #[tokio::test]
    async fn calls_after_hard_stop_are_refused() {
        let token = CancellationToken::new();
        token.cancel();
        let mut svc = HardStopLayer::new(token).layer(Routes);

        let res = svc.call(request("/stuck")).await.unwrap();
        assert_eq!(grpc_status(&res), Some("14"));
    }
}
