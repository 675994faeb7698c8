//
// Copyright © 2025 Agora
// This file is part of TEN Framework, an open source project.
// Licensed under the Apache License, Version 2.0, with certain conditions.
// Refer to the "LICENSE" file in the root directory for more information.
//

use actix_web::{web, HttpResponse};
use prometheus::{Encoder, Registry, TextEncoder};

use super::TelemetryState;
use crate::{
    constants::{METRICS, PROMETHEUS_CONTENT_TYPE},
    error::ApiError,
};

/// Configure telemetry HTTP route for Prometheus scraping
///
/// The route is always mounted. In push mode there is no local registry and
/// the handler answers 400.
pub fn configure_metrics_endpoint(cfg: &mut web::ServiceConfig) {
    cfg.route(METRICS, web::get().to(metrics_handler));
}

async fn metrics_handler(state: web::Data<TelemetryState>) -> Result<HttpResponse, ApiError> {
    let registry = state.registry().ok_or(ApiError::ExpositionUnavailable)?;
    let body = encode_registry(registry)?;

    Ok(HttpResponse::Ok().content_type(PROMETHEUS_CONTENT_TYPE).body(body))
}

/// Prometheus text encoding of everything gathered from `registry`.
///
/// Labelled vectors appear only once a label set has been bound, so a
/// scrape before the first completed request lists `active_users` alone.
pub fn encode_registry(registry: &Registry) -> Result<String, ApiError> {
    // Gather all metrics from the registry
    let metric_families = registry.gather();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).map_err(|e| ApiError::Encoding(e.to_string()))?;

    String::from_utf8(buffer).map_err(|e| ApiError::Encoding(e.to_string()))
}
