//
// Copyright © 2025 Agora
// This file is part of TEN Framework, an open source project.
// Licensed under the Apache License, Version 2.0, with certain conditions.
// Refer to the "LICENSE" file in the root directory for more information.
//

//! Per-request instrumentation.
//!
//! Every request moves through four stages:
//!
//! 1. entered: the in-flight count goes up and the gauge takes its new value
//! 2. timed: a monotonic start instant is taken
//! 3. dispatched: the rest of the service runs inside the `http_request` span
//! 4. completed: counter, histogram and gauge are updated and the
//!    `X-Process-Time` header is attached
//!
//! Completion is owned by [`InFlightRequest`]. A request whose future is
//! dropped before a response exists (client gone, panic while unwinding) is
//! completed from `Drop`, so the in-flight gauge cannot stay elevated.

use std::time::Instant;

use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    http::{
        header::{HeaderMap, HeaderName, HeaderValue},
        StatusCode,
    },
    middleware::Next,
    web, Error,
};
use opentelemetry::{global, propagation::Extractor};
use tracing::{field, Instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::{
    constants::{PROCESS_TIME_HEADER, TRACEPARENT_HEADER},
    telemetry::{RouteAttributes, TelemetryState},
};

/// Instrument one request.
///
/// Registered with `actix_web::middleware::from_fn`. Requires the shared
/// [`TelemetryState`] as `web::Data` on the app; without it the request is
/// passed through untouched.
pub async fn instrument_request(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let Some(state) = req.app_data::<web::Data<TelemetryState>>().cloned() else {
        tracing::warn!("Telemetry state missing, request not instrumented");
        return next.call(req).await;
    };

    let route = RouteAttributes::from_request(req.request());
    let span = request_span(&route, req.headers());

    let mut request = InFlightRequest::enter(state, route, span.clone());

    match next.call(req).instrument(span).await {
        Ok(mut res) => {
            let elapsed = request.complete(Some(res.status()));
            if let Ok(value) = HeaderValue::from_str(&format!("{elapsed:.2}")) {
                res.headers_mut().insert(HeaderName::from_static(PROCESS_TIME_HEADER), value);
            }
            Ok(res)
        }
        Err(err) => {
            request.complete(Some(err.as_response_error().status_code()));
            Err(err)
        }
    }
}

/// Server span for the request, continuing the caller's trace when a
/// `traceparent` header is present and a propagator is installed.
fn request_span(route: &RouteAttributes, headers: &HeaderMap) -> Span {
    let span = tracing::info_span!(
        "http_request",
        otel.kind = "server",
        otel.name = %format!("{} {}", route.method, route.path),
        otel.status_code = field::Empty,
        method = %route.method,
        path = %route.path,
        http.response.status_code = field::Empty,
    );

    attach_remote_parent(&span, headers);

    span
}

/// Parent `span` on the context carried by the `traceparent` header.
///
/// Returns whether a parent was attached. Without the OpenTelemetry layer
/// (pull mode) the span has nothing to attach to and stays a root.
fn attach_remote_parent(span: &Span, headers: &HeaderMap) -> bool {
    if !headers.contains_key(TRACEPARENT_HEADER) {
        return false;
    }

    let parent = global::get_text_map_propagator(|propagator| {
        propagator.extract(&HeaderExtractor(headers))
    });
    match span.set_parent(parent) {
        Ok(()) => true,
        Err(err) => {
            tracing::trace!(error = %err, "Remote trace context not attached");
            false
        }
    }
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(HeaderName::as_str).collect()
    }
}

/// Bookkeeping for one request between entry and completion.
struct InFlightRequest {
    state: web::Data<TelemetryState>,
    route: RouteAttributes,
    span: Span,
    start: Instant,
    completed: bool,
}

impl InFlightRequest {
    fn enter(state: web::Data<TelemetryState>, route: RouteAttributes, span: Span) -> Self {
        let in_flight = state.enter_request();
        state.instruments().gauge.set(in_flight as f64, &route);

        span.in_scope(|| tracing::debug!(in_flight, "Request received"));

        Self {
            state,
            route,
            span,
            start: Instant::now(),
            completed: false,
        }
    }

    /// Run the completion accounting once and return the elapsed seconds.
    ///
    /// `None` means the request ended without a response.
    fn complete(&mut self, status: Option<StatusCode>) -> f64 {
        let elapsed = self.start.elapsed().as_secs_f64();
        if self.completed {
            return elapsed;
        }
        self.completed = true;

        let instruments = self.state.instruments();
        instruments.counter.increment(1.0, &self.route);
        instruments.histogram.observe(elapsed, &self.route);

        let in_flight = self.state.exit_request();
        instruments.gauge.set(in_flight as f64, &self.route);

        let _entered = self.span.enter();
        match status {
            Some(status) => {
                self.span.record("http.response.status_code", status.as_u16() as i64);
                if status.is_server_error() {
                    self.span.record("otel.status_code", "ERROR");
                }
                tracing::debug!(
                    process_time = %format!("{elapsed:.6}"),
                    status_code = status.as_u16(),
                    "Request processed"
                );
            }
            None => {
                self.span.record("otel.status_code", "ERROR");
                tracing::warn!(
                    process_time = %format!("{elapsed:.6}"),
                    "Request ended before a response was produced"
                );
            }
        }

        elapsed
    }
}

impl Drop for InFlightRequest {
    fn drop(&mut self) {
        if !self.completed {
            self.complete(None);
        }
    }
}
