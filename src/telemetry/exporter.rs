//
// Copyright © 2025 Agora
// This file is part of TEN Framework, an open source project.
// Licensed under the Apache License, Version 2.0, with certain conditions.
// Refer to the "LICENSE" file in the root directory for more information.
//

//! OTLP push pipeline.
//!
//! Spans, log records and metrics are batched by the SDK and shipped to the
//! collector from background threads. Export failures stay inside those
//! threads and are reported through the SDK's own internal logging, so they
//! never reach request handling.

use std::{sync::mpsc, thread};

use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    logs::SdkLoggerProvider, metrics::SdkMeterProvider, trace::SdkTracerProvider, Resource,
};
use opentelemetry_semantic_conventions::resource::SERVICE_VERSION;

use super::config::OtlpProtocol;
use crate::{
    constants::{METRICS_EXPORT_INTERVAL, PUSH_PIPELINE_INIT_TIMEOUT, SERVICE_NAMESPACE},
    error::TelemetryError,
};

/// Create OpenTelemetry Resource with service metadata
pub fn create_resource(service_name: &str) -> Resource {
    Resource::builder()
        .with_service_name(service_name.to_string())
        .with_attributes(vec![
            KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
            KeyValue::new("service.namespace", SERVICE_NAMESPACE),
        ])
        .build()
}

struct Providers {
    tracer: SdkTracerProvider,
    logger: SdkLoggerProvider,
    meter: SdkMeterProvider,
}

/// Tracer, logger and meter providers exporting to one OTLP endpoint.
pub struct PushPipeline {
    tracer_provider: SdkTracerProvider,
    logger_provider: SdkLoggerProvider,
    meter_provider: SdkMeterProvider,

    // Runtime thread for the gRPC exporters (kept alive for the entire
    // lifecycle).
    _runtime_handle: Option<thread::JoinHandle<()>>,
}

impl PushPipeline {
    /// Build the three exporters and their providers.
    ///
    /// Nothing is installed globally here; the caller decides what becomes
    /// the process-wide provider.
    pub fn start(
        endpoint: &str,
        protocol: OtlpProtocol,
        resource: Resource,
    ) -> Result<Self, TelemetryError> {
        match protocol {
            OtlpProtocol::Grpc => Self::start_grpc(endpoint, resource),
            OtlpProtocol::Http => {
                let providers = build_providers(endpoint, protocol, resource)?;
                Ok(Self::from_providers(providers, None))
            }
        }
    }

    /// tonic channels spawn their connection worker on the Tokio runtime that
    /// is current when they are built, so the gRPC exporters get a dedicated
    /// runtime thread that outlives every request.
    fn start_grpc(endpoint: &str, resource: Resource) -> Result<Self, TelemetryError> {
        let endpoint = endpoint.to_string();

        // Channel to signal when initialization is complete
        let (init_tx, init_rx) = mpsc::channel::<Result<Providers, TelemetryError>>();

        let runtime_handle = thread::Builder::new().name("otlp-export".to_string()).spawn(
            move || {
                tracing::debug!("Starting dedicated OTLP runtime thread");

                let rt = match tokio::runtime::Runtime::new() {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = init_tx.send(Err(TelemetryError::Io(e)));
                        return;
                    }
                };

                rt.block_on(async move {
                    let providers = build_providers(&endpoint, OtlpProtocol::Grpc, resource);
                    let failed = providers.is_err();
                    if init_tx.send(providers).is_err() || failed {
                        return;
                    }

                    // Keep the runtime alive; the batch processors and the
                    // periodic reader keep exporting in the background.
                    std::future::pending::<()>().await;
                });
            },
        )?;

        match init_rx.recv_timeout(PUSH_PIPELINE_INIT_TIMEOUT) {
            Ok(Ok(providers)) => Ok(Self::from_providers(providers, Some(runtime_handle))),
            Ok(Err(e)) => Err(e),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                Err(TelemetryError::StartupTimeout(PUSH_PIPELINE_INIT_TIMEOUT))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(TelemetryError::Configuration(
                "OTLP runtime thread exited before the exporters were built".to_string(),
            )),
        }
    }

    fn from_providers(
        providers: Providers,
        runtime_handle: Option<thread::JoinHandle<()>>,
    ) -> Self {
        Self {
            tracer_provider: providers.tracer,
            logger_provider: providers.logger,
            meter_provider: providers.meter,
            _runtime_handle: runtime_handle,
        }
    }

    pub fn tracer_provider(&self) -> &SdkTracerProvider {
        &self.tracer_provider
    }

    pub fn logger_provider(&self) -> &SdkLoggerProvider {
        &self.logger_provider
    }

    pub fn meter_provider(&self) -> &SdkMeterProvider {
        &self.meter_provider
    }

    /// Flush and stop every provider. Failures are logged, not returned: at
    /// this point the collector may simply be gone.
    pub fn shutdown(&self) {
        if let Err(e) = self.meter_provider.shutdown() {
            tracing::warn!("Failed to shutdown meter provider: {e:?}");
        }
        if let Err(e) = self.tracer_provider.shutdown() {
            tracing::warn!("Failed to shutdown tracer provider: {e:?}");
        }
        // Last, so the warnings above still reach the collector.
        if let Err(e) = self.logger_provider.shutdown() {
            eprintln!("[OTLP] Failed to shutdown logger provider: {e:?}");
        }
    }
}

fn exporter_error(signal: &str, endpoint: &str, e: impl std::fmt::Display) -> TelemetryError {
    TelemetryError::Configuration(format!(
        "failed to build OTLP {signal} exporter for `{endpoint}`: {e}"
    ))
}

fn build_providers(
    endpoint: &str,
    protocol: OtlpProtocol,
    resource: Resource,
) -> Result<Providers, TelemetryError> {
    let (span_exporter, log_exporter, metric_exporter) = match protocol {
        OtlpProtocol::Grpc => (
            opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint)
                .build()
                .map_err(|e| exporter_error("span", endpoint, e))?,
            opentelemetry_otlp::LogExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint)
                .build()
                .map_err(|e| exporter_error("log", endpoint, e))?,
            opentelemetry_otlp::MetricExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint)
                .build()
                .map_err(|e| exporter_error("metric", endpoint, e))?,
        ),
        OtlpProtocol::Http => (
            opentelemetry_otlp::SpanExporter::builder()
                .with_http()
                .with_endpoint(signal_url(endpoint, "traces"))
                .build()
                .map_err(|e| exporter_error("span", endpoint, e))?,
            opentelemetry_otlp::LogExporter::builder()
                .with_http()
                .with_endpoint(signal_url(endpoint, "logs"))
                .build()
                .map_err(|e| exporter_error("log", endpoint, e))?,
            opentelemetry_otlp::MetricExporter::builder()
                .with_http()
                .with_endpoint(signal_url(endpoint, "metrics"))
                .build()
                .map_err(|e| exporter_error("metric", endpoint, e))?,
        ),
    };

    let tracer = SdkTracerProvider::builder()
        .with_batch_exporter(span_exporter)
        .with_resource(resource.clone())
        .build();

    let logger = SdkLoggerProvider::builder()
        .with_batch_exporter(log_exporter)
        .with_resource(resource.clone())
        .build();

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(metric_exporter)
        .with_interval(METRICS_EXPORT_INTERVAL)
        .build();
    let meter = SdkMeterProvider::builder().with_reader(reader).with_resource(resource).build();

    Ok(Providers {
        tracer,
        logger,
        meter,
    })
}

/// An explicitly configured HTTP endpoint is used verbatim by the exporter,
/// so the per-signal path has to be appended here.
fn signal_url(endpoint: &str, signal: &str) -> String {
    format!("{}/v1/{signal}", endpoint.trim_end_matches('/'))
}
