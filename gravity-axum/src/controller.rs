//! The dispatch state machine.
//!
//! Each request moves through [`Stage`]s in order:
//!
//! ```text
//! Decoding -> Validating -> Handling -> Encoding -> Done
//!     |            |            |           |
//!     +------------+------------+-----------+--> Erroring --> Done
//!                                                   |
//!                                   (no boundary /  v
//!                                    declined)   Faulted --> Done
//! ```
//!
//! A panic anywhere up to and including the error boundary (or the redirect
//! it returns) is caught and enters `Faulted`. A panic in the fault boundary falls back to the
//! last-resort response, so every request gets exactly one response.

use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::extract::Request;
use axum::response::Response;
use axum::routing::{MethodRouter, any_service};
use futures::FutureExt;
use futures::future::BoxFuture;
use http::request::Parts;
use tower::Service;

use crate::boundary::Boundaries;
use crate::builder::ControllerBuilder;
use crate::config::DispatchConfig;
use crate::error::{DispatchError, Fault};
use crate::handler::{Context, Handler, Validate};
use crate::observe::{BoundaryOutcome, Observer};
use crate::request::decode_request;
use crate::response::{encode, last_resort};

/// The stages a request can fail in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Decoding,
    Validating,
    Handling,
    Encoding,
}

enum State<Req, Resp> {
    Decoding(Body),
    Validating(Req),
    Handling(Req),
    Encoding(Resp),
    Erroring(DispatchError),
    Faulted(Fault),
    Done(Response),
}

pub(crate) struct Inner<H: Handler> {
    pub(crate) handler: H,
    pub(crate) boundaries: Boundaries<H>,
    pub(crate) config: DispatchConfig,
    pub(crate) observer: Arc<dyn Observer>,
    pub(crate) name: &'static str,
}

/// A dispatch unit: one handler, its boundaries, configuration and
/// observer.
///
/// Cheap to clone; clones share the same handler.
pub struct Controller<H: Handler> {
    inner: Arc<Inner<H>>,
}

impl<H: Handler> Clone for Controller<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: Handler> std::fmt::Debug for Controller<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("handler", &self.inner.name)
            .field("boundaries", &self.inner.boundaries)
            .field("config", &self.inner.config)
            .finish()
    }
}

impl<H: Handler> Controller<H> {
    /// Controller with default configuration and the tracing observer.
    pub fn new(handler: H) -> Self {
        ControllerBuilder::new(handler).build()
    }

    pub fn builder(handler: H) -> ControllerBuilder<H> {
        ControllerBuilder::new(handler)
    }

    pub(crate) fn from_inner(inner: Inner<H>) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn handler(&self) -> &H {
        &self.inner.handler
    }

    pub fn boundaries(&self) -> &Boundaries<H> {
        &self.inner.boundaries
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.inner.config
    }

    /// Run one request to completion.
    pub async fn dispatch(&self, req: Request) -> Response {
        Arc::clone(&self.inner).serve(req).await
    }

    /// Mount on an axum router for every method.
    ///
    /// ```ignore
    /// let app = Router::new().route("/pets", Controller::new(PetStore).into_method_router());
    /// ```
    pub fn into_method_router<S>(self) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        any_service(self)
    }
}

impl<H: Handler> Inner<H> {
    async fn serve(self: Arc<Self>, req: Request) -> Response {
        let (head, body) = req.into_parts();
        self.observer.request_started(&head, self.name);

        let deadline = self
            .config
            .request_timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));
        let cx = Context::new(&head, deadline);

        let fault = match AssertUnwindSafe(self.run(&cx, body)).catch_unwind().await {
            Ok(Ok(response)) => return response,
            Ok(Err(fault)) => fault,
            Err(payload) => Fault::from_panic(payload),
        };
        self.faulted(&head, fault).await
    }

    /// Drive the stages until a response is produced or a fault is raised.
    async fn run(&self, cx: &Context<'_>, body: Body) -> Result<Response, Fault> {
        let head = cx.head();
        let mut state = State::Decoding(body);
        loop {
            state = match state {
                State::Decoding(body) => {
                    match decode_request::<H::Request>(head, body, self.config.limits).await {
                        Ok(request) => State::Validating(request),
                        Err(err) => self.fail(head, Stage::Decoding, err.into()),
                    }
                }
                State::Validating(request) => match request.validate(cx) {
                    Ok(()) => State::Handling(request),
                    Err(err) => self.fail(head, Stage::Validating, DispatchError::Validation(err)),
                },
                State::Handling(request) => match self.handler.handle(cx, request).await {
                    Ok(response) => State::Encoding(response),
                    Err(err) => self.fail(head, Stage::Handling, DispatchError::Handler(err)),
                },
                State::Encoding(response) => match encode(&head.headers, &response) {
                    Ok(response) => State::Done(response),
                    Err(err) => self.fail(head, Stage::Encoding, err),
                },
                State::Erroring(err) => self.erroring(head, err).await,
                State::Faulted(fault) => return Err(fault),
                State::Done(response) => return Ok(response),
            };
        }
    }

    fn fail(
        &self,
        head: &Parts,
        stage: Stage,
        err: DispatchError,
    ) -> State<H::Request, H::Response> {
        match stage {
            Stage::Decoding => self.observer.decode_failed(head, &err),
            Stage::Validating => self.observer.validation_failed(head, &err),
            Stage::Handling => self.observer.handler_failed(head, &err),
            Stage::Encoding => self.observer.encode_failed(head, &err),
        }
        State::Erroring(err)
    }

    async fn erroring(&self, head: &Parts, err: DispatchError) -> State<H::Request, H::Response> {
        let answered = AssertUnwindSafe(async {
            match self.boundaries.on_error(&self.handler, head, &err) {
                Some(Some(redirect)) => Some(Some(redirect.invoke(head).await)),
                Some(None) => Some(None),
                None => None,
            }
        })
        .catch_unwind()
        .await;

        match answered {
            Ok(Some(Some(response))) => {
                self.observer.error_boundary(head, BoundaryOutcome::Taken);
                State::Done(response)
            }
            Ok(Some(None)) => {
                self.observer.error_boundary(head, BoundaryOutcome::Declined);
                State::Faulted(Fault::unhandled(err))
            }
            Ok(None) => {
                self.observer.error_boundary(head, BoundaryOutcome::Missing);
                State::Faulted(Fault::unhandled(err))
            }
            Err(payload) => {
                self.observer.error_boundary(head, BoundaryOutcome::Panicked);
                State::Faulted(Fault::from_panic(payload))
            }
        }
    }

    async fn faulted(&self, head: &Parts, fault: Fault) -> Response {
        self.observer.fault_captured(head, &fault);

        let recovered = AssertUnwindSafe(async {
            match self.boundaries.on_fault(&self.handler, head, &fault) {
                Some(Some(redirect)) => Some(Some(redirect.invoke(head).await)),
                Some(None) => Some(None),
                None => None,
            }
        })
        .catch_unwind()
        .await;

        match recovered {
            Ok(Some(Some(response))) => {
                self.observer.fault_boundary(head, BoundaryOutcome::Taken);
                return response;
            }
            Ok(Some(None)) => self.observer.fault_boundary(head, BoundaryOutcome::Declined),
            Ok(None) => self.observer.fault_boundary(head, BoundaryOutcome::Missing),
            Err(_) => self.observer.fault_boundary(head, BoundaryOutcome::Panicked),
        }
        last_resort(&head.headers, &fault, self.config.expose_trace)
    }
}

impl<H: Handler> Service<Request<Body>> for Controller<H> {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { Ok(inner.serve(req).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{ErrorBoundary, FaultBoundary, Redirect};
    use crate::error::FaultOrigin;
    use crate::handler::BoxError;
    use crate::BindRequest;
    use axum::Router;
    use http::StatusCode;
    use http::header::{ACCEPT, CONTENT_TYPE};
    use http_body_util::BodyExt;
    use serde::{Deserialize, Serialize};
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Debug, Default, Serialize, Deserialize, BindRequest)]
    struct Echo {
        #[bind(query = "id")]
        ids: Vec<i64>,
        #[bind(query = "tag", explode)]
        tags: Vec<String>,
        name: String,
        #[bind(query = "mode")]
        mode: String,
    }

    impl Validate for Echo {
        fn validate(&self, _cx: &Context<'_>) -> Result<(), BoxError> {
            if self.name == "invalid" {
                return Err("name must not be \"invalid\"".into());
            }
            Ok(())
        }
    }

    #[derive(Debug, Serialize)]
    struct Echoed {
        ids: Vec<i64>,
        tags: Vec<String>,
        name: String,
    }

    #[inline(never)]
    fn trip_wire() -> ! {
        panic!("handler panicked")
    }

    async fn respond(req: Echo) -> Result<Echoed, BoxError> {
        match req.mode.as_str() {
            "fail" => Err("handler failed".into()),
            "panic" => trip_wire(),
            _ => Ok(Echoed {
                ids: req.ids,
                tags: req.tags,
                name: req.name,
            }),
        }
    }

    /// No boundaries at all.
    struct Bare;

    impl Handler for Bare {
        type Request = Echo;
        type Response = Echoed;

        async fn handle(&self, _cx: &Context<'_>, req: Echo) -> Result<Echoed, BoxError> {
            respond(req).await
        }
    }

    /// Error boundary answering with the error's status; fault boundary
    /// answering with 503.
    struct Guarded;

    impl Handler for Guarded {
        type Request = Echo;
        type Response = Echoed;

        async fn handle(&self, _cx: &Context<'_>, req: Echo) -> Result<Echoed, BoxError> {
            respond(req).await
        }

        fn boundaries() -> Boundaries<Self> {
            Boundaries::none()
                .with_error_boundary()
                .with_fault_boundary()
        }
    }

    impl ErrorBoundary for Guarded {
        fn error_boundary(&self, head: &Parts, error: &DispatchError) -> Option<Redirect> {
            // Opt out for one path to exercise escalation.
            if head.uri.path() == "/decline" {
                return None;
            }
            Some(Redirect::to(error.to_response()))
        }
    }

    impl FaultBoundary for Guarded {
        fn fault_boundary(&self, _head: &Parts, fault: &Fault) -> Option<Redirect> {
            let origin = match fault.origin() {
                FaultOrigin::Panic => "panic",
                FaultOrigin::Unhandled(_) => "unhandled",
            };
            let message = fault.message().to_owned();
            Some(Redirect::to((
                StatusCode::SERVICE_UNAVAILABLE,
                axum::Json(json!({ "origin": origin, "message": message })),
            )))
        }
    }

    /// Fault boundary that panics itself.
    struct Fragile;

    impl Handler for Fragile {
        type Request = Echo;
        type Response = Echoed;

        async fn handle(&self, _cx: &Context<'_>, req: Echo) -> Result<Echoed, BoxError> {
            respond(req).await
        }

        fn boundaries() -> Boundaries<Self> {
            Boundaries::none().with_fault_boundary()
        }
    }

    impl FaultBoundary for Fragile {
        fn fault_boundary(&self, _head: &Parts, _fault: &Fault) -> Option<Redirect> {
            panic!("fault boundary panicked")
        }
    }

    /// Error boundary that panics, either directly or from its redirect.
    struct Brittle;

    impl Handler for Brittle {
        type Request = Echo;
        type Response = Echoed;

        async fn handle(&self, _cx: &Context<'_>, req: Echo) -> Result<Echoed, BoxError> {
            respond(req).await
        }

        fn boundaries() -> Boundaries<Self> {
            Boundaries::none()
                .with_error_boundary()
                .with_fault_boundary()
        }
    }

    impl ErrorBoundary for Brittle {
        fn error_boundary(&self, head: &Parts, _error: &DispatchError) -> Option<Redirect> {
            if head.uri.path() == "/late" {
                return Some(Redirect::sync(|_: &Parts| -> Response {
                    panic!("redirect panicked")
                }));
            }
            panic!("error boundary panicked")
        }
    }

    impl FaultBoundary for Brittle {
        fn fault_boundary(&self, head: &Parts, fault: &Fault) -> Option<Redirect> {
            Guarded.fault_boundary(head, fault)
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl Observer for Arc<Recorder> {
        fn request_started(&self, _head: &Parts, _handler: &'static str) {
            self.push("started".into());
        }
        fn handler_failed(&self, _head: &Parts, _error: &DispatchError) {
            self.push("handler_failed".into());
        }
        fn error_boundary(&self, _head: &Parts, outcome: BoundaryOutcome) {
            self.push(format!("error_boundary:{}", outcome.as_str()));
        }
        fn fault_boundary(&self, _head: &Parts, outcome: BoundaryOutcome) {
            self.push(format!("fault_boundary:{}", outcome.as_str()));
        }
        fn fault_captured(&self, _head: &Parts, fault: &Fault) {
            self.push(format!("fault:{}", fault.message()));
        }
    }

    fn get(uri: &str) -> Request {
        Request::builder()
            .uri(uri)
            .header(ACCEPT, "application/json")
            .body(Body::empty())
            .unwrap()
    }

    fn post_json(uri: &str, body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_comma_separated_query() {
        let resp = Controller::new(Bare).oneshot(get("/?id=1,2,3")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(json_body(resp).await["ids"], json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn test_exploded_query() {
        let resp = Controller::new(Bare)
            .oneshot(get("/?tag=a&tag=b"))
            .await
            .unwrap();
        assert_eq!(json_body(resp).await["tags"], json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_json_body() {
        let resp = Controller::new(Bare)
            .oneshot(post_json("/", r#"{"name":"test"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            json_body(resp).await,
            json!({ "ids": [], "tags": [], "name": "test" })
        );
    }

    #[tokio::test]
    async fn test_unhandled_error_reaches_last_resort() {
        let resp = Controller::new(Bare).oneshot(get("/?mode=fail")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(resp).await;
        assert_eq!(body["error"], "handler failed");
        assert!(body["stack_trace"].is_string());
    }

    #[tokio::test]
    async fn test_error_boundary_takes_over() {
        let resp = Controller::new(Guarded).oneshot(get("/?mode=fail")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(resp).await, json!({ "error": "handler failed" }));
    }

    #[tokio::test]
    async fn test_decode_error_through_boundary() {
        let resp = Controller::new(Guarded).oneshot(get("/?id=1,x")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = json_body(resp).await;
        assert!(body["error"].as_str().unwrap().contains("\"id\""));
    }

    #[tokio::test]
    async fn test_validation_error_through_boundary() {
        let resp = Controller::new(Guarded)
            .oneshot(post_json("/", r#"{"name":"invalid"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_not_acceptable_through_boundary() {
        let req = Request::builder()
            .uri("/")
            .header(ACCEPT, "text/plain")
            .body(Body::empty())
            .unwrap();
        let resp = Controller::new(Guarded).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_ACCEPTABLE);
    }

    #[tokio::test]
    async fn test_not_acceptable_without_boundary_is_plain_text_fault() {
        let req = Request::builder()
            .uri("/")
            .header(ACCEPT, "text/plain")
            .body(Body::empty())
            .unwrap();
        let resp = Controller::builder(Bare)
            .expose_trace(false)
            .build()
            .oneshot(req)
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(
            &bytes[..],
            b"mime type \"text/plain\" provided in Accept header is not supported\n"
        );
    }

    #[tokio::test]
    async fn test_unsupported_content_type() {
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "text/plain")
            .body(Body::from("name=test"))
            .unwrap();
        let resp = Controller::new(Guarded).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_panic_goes_to_fault_boundary() {
        let resp = Controller::new(Guarded).oneshot(get("/?mode=panic")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            json_body(resp).await,
            json!({ "origin": "panic", "message": "handler panicked" })
        );
    }

    #[tokio::test]
    async fn test_declined_error_escalates_to_fault_boundary() {
        let resp = Controller::new(Guarded)
            .oneshot(get("/decline?mode=fail"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            json_body(resp).await,
            json!({ "origin": "unhandled", "message": "handler failed" })
        );
    }

    #[tokio::test]
    async fn test_panic_without_fault_boundary() {
        let resp = Controller::new(Bare).oneshot(get("/?mode=panic")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(resp).await["error"], "handler panicked");
    }

    #[tokio::test]
    async fn test_panicking_fault_boundary_falls_back() {
        let resp = Controller::new(Fragile).oneshot(get("/?mode=fail")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(resp).await["error"], "handler failed");
    }

    #[tokio::test]
    async fn test_observer_sees_escalation() {
        let recorder = Arc::new(Recorder::default());
        let controller = Controller::builder(Bare)
            .observer(Arc::clone(&recorder))
            .build();
        controller.dispatch(get("/?mode=fail")).await;

        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "started",
                "handler_failed",
                "error_boundary:missing",
                "fault:handler failed",
                "fault_boundary:missing",
            ]
        );
    }

    #[tokio::test]
    async fn test_observer_sees_taken_boundary() {
        let recorder = Arc::new(Recorder::default());
        let controller = Controller::builder(Guarded)
            .observer(Arc::clone(&recorder))
            .build();
        controller.dispatch(get("/?mode=fail")).await;

        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(events, vec!["started", "handler_failed", "error_boundary:taken"]);
    }

    #[tokio::test]
    async fn test_panicking_error_boundary_enters_fault_path() {
        let recorder = Arc::new(Recorder::default());
        let controller = Controller::builder(Brittle)
            .observer(Arc::clone(&recorder))
            .build();
        let resp = controller.dispatch(get("/?mode=fail")).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            json_body(resp).await,
            json!({ "origin": "panic", "message": "error boundary panicked" })
        );

        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "started",
                "handler_failed",
                "error_boundary:panicked",
                "fault:error boundary panicked",
                "fault_boundary:taken",
            ]
        );
    }

    #[tokio::test]
    async fn test_panicking_redirect_enters_fault_path() {
        let resp = Controller::new(Brittle).oneshot(get("/late?mode=fail")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            json_body(resp).await,
            json!({ "origin": "panic", "message": "redirect panicked" })
        );
    }

    #[tokio::test]
    async fn test_panic_trace_points_at_handler() {
        let resp = Controller::new(Bare).oneshot(get("/?mode=panic")).await.unwrap();
        let body = json_body(resp).await;
        let trace = body["stack_trace"].as_str().unwrap();
        assert!(trace.contains("trip_wire"), "{trace}");
    }

    #[tokio::test]
    async fn test_mounted_on_router() {
        let app = Router::new().route("/pets", Controller::new(Bare).into_method_router());
        let resp = app.oneshot(get("/pets?id=7")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["ids"], json!([7]));
    }

    #[tokio::test]
    async fn test_body_limit() {
        let resp = Controller::builder(Guarded)
            .limits(crate::BodyLimits::new(8))
            .build()
            .oneshot(post_json("/", r#"{"name":"far too long"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_deadline_visible_to_handler() {
        struct Deadline;

        impl Handler for Deadline {
            type Request = Echo;
            type Response = bool;

            async fn handle(&self, cx: &Context<'_>, _req: Echo) -> Result<bool, BoxError> {
                Ok(cx.deadline().is_some())
            }
        }

        let resp = Controller::builder(Deadline)
            .request_timeout(std::time::Duration::from_secs(30))
            .build()
            .oneshot(get("/"))
            .await
            .unwrap();
        assert_eq!(json_body(resp).await, json!(true));
    }
}
