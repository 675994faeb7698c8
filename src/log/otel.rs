//
// Copyright © 2025 Agora
// This file is part of TEN Framework, an open source project.
// Licensed under the Apache License, Version 2.0, with certain conditions.
// Refer to the "LICENSE" file in the root directory for more information.
//
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_sdk::{logs::SdkLoggerProvider, trace::SdkTracerProvider};
use tracing::Subscriber;
use tracing_subscriber::{filter::filter_fn, registry::LookupSpan, Layer};

use crate::constants::TRACER_NAME;

/// Targets of the exporter stack itself, never forwarded to the collector.
const EXPORTER_TARGETS: [&str; 7] =
    ["opentelemetry", "hyper", "h2", "tonic", "tower", "reqwest", "tracing_opentelemetry"];

fn is_exporter_target(target: &str) -> bool {
    EXPORTER_TARGETS.iter().any(|prefix| target.starts_with(prefix))
}

/// Layer forwarding `tracing` events as OTLP log records.
pub fn create_otlp_log_layer<S>(provider: &SdkLoggerProvider) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    OpenTelemetryTracingBridge::new(provider)
        .with_filter(filter_fn(|meta| !is_exporter_target(meta.target())))
}

/// Layer turning `tracing` spans into OpenTelemetry spans.
pub fn create_otlp_trace_layer<S>(provider: &SdkTracerProvider) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_opentelemetry::layer().with_tracer(provider.tracer(TRACER_NAME))
}
