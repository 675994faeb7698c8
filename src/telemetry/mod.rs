//
// Copyright © 2025 Agora
// This file is part of TEN Framework, an open source project.
// Licensed under the Apache License, Version 2.0, with certain conditions.
// Refer to the "LICENSE" file in the root directory for more information.
//

//! # Telemetry
//!
//! One-time setup of the tracing, logging and metrics pipelines.
//!
//! ## Architecture
//!
//! ```text
//! setup(config)
//!     │
//!     ├──► Push mode
//!     │      ├──► Traces  ─► batch processor ─► OTLP
//!     │      ├──► Logs    ─► batch processor ─► OTLP   (+ JSON on stdout)
//!     │      └──► Metrics ─► periodic reader ─► OTLP
//!     │
//!     └──► Pull mode
//!            ├──► Traces  (none)
//!            ├──► Logs    ─► JSON on stdout + JSON file
//!            └──► Metrics ─► prometheus::Registry ─► GET /metrics
//! ```
//!
//! ## Modules
//!
//! - `config`: Backend mode resolution and settings
//! - `metrics`: Backend-agnostic request instruments
//! - `exporter`: OTLP push pipeline
//! - `http_endpoint`: HTTP endpoint for Prometheus pull mode

pub mod config;
pub mod exporter;
pub mod http_endpoint;
pub mod metrics;

use std::sync::{
    atomic::{AtomicBool, AtomicI64, Ordering},
    Arc, Mutex,
};

use once_cell::sync::OnceCell;
use opentelemetry::{global, metrics::MeterProvider as _};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use prometheus::Registry;
use tracing_appender::non_blocking::WorkerGuard;

// Re-export commonly used items
pub use config::{BackendMode, OtlpProtocol, TelemetryConfig};
pub use exporter::PushPipeline;
pub use http_endpoint::configure_metrics_endpoint;
pub use metrics::{Instruments, MetricInstrument, RouteAttributes};

use crate::{constants::METER_NAME, error::TelemetryError};

static TELEMETRY: OnceCell<Arc<TelemetryState>> = OnceCell::new();

/// Everything request handling needs from the telemetry pipelines.
pub struct TelemetryState {
    mode: BackendMode,
    instruments: Instruments,

    /// Requests currently being processed by this process.
    in_flight: AtomicI64,

    /// Present in pull mode only.
    registry: Option<Registry>,

    pipeline: Option<PushPipeline>,
    log_guard: Mutex<Option<WorkerGuard>>,
    shut_down: AtomicBool,
}

impl TelemetryState {
    /// State without any exporters attached.
    pub fn new(mode: BackendMode, instruments: Instruments, registry: Option<Registry>) -> Self {
        Self {
            mode,
            instruments,
            in_flight: AtomicI64::new(0),
            registry,
            pipeline: None,
            log_guard: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn mode(&self) -> BackendMode {
        self.mode
    }

    pub fn instruments(&self) -> &Instruments {
        &self.instruments
    }

    pub fn registry(&self) -> Option<&Registry> {
        self.registry.as_ref()
    }

    /// Present in push mode only.
    pub fn pipeline(&self) -> Option<&PushPipeline> {
        self.pipeline.as_ref()
    }

    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Count a request in and return the new in-flight total.
    pub fn enter_request(&self) -> i64 {
        self.in_flight.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Count a request out and return the new in-flight total.
    pub fn exit_request(&self) -> i64 {
        self.in_flight.fetch_sub(1, Ordering::SeqCst) - 1
    }

    /// Flush every pipeline. Only the first call does anything.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::info!("Shutting down telemetry...");

        if let Some(pipeline) = &self.pipeline {
            pipeline.shutdown();
        }

        // Dropping the guard drains the file writer.
        match self.log_guard.lock() {
            Ok(mut guard) => drop(guard.take()),
            Err(poisoned) => drop(poisoned.into_inner().take()),
        }
    }
}

/// Configure application telemetry once per process.
///
/// The first successful call wires the pipelines for the resolved backend
/// mode. Every later call, concurrent or not, returns the same state and
/// ignores its `config`. A failed call leaves nothing published, so it may be
/// retried.
pub fn setup(config: &TelemetryConfig) -> Result<Arc<TelemetryState>, TelemetryError> {
    TELEMETRY.get_or_try_init(|| init_telemetry(config).map(Arc::new)).cloned()
}

fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryState, TelemetryError> {
    config.validate()?;

    let mode = config.backend_mode();
    let state = match mode {
        BackendMode::Push => init_push(config)?,
        BackendMode::Pull => init_pull(config)?,
    };

    tracing::debug!(
        mode = %mode,
        service_name = %config.service_name,
        "configured application telemetry successfully"
    );

    Ok(state)
}

fn init_push(config: &TelemetryConfig) -> Result<TelemetryState, TelemetryError> {
    let resource = exporter::create_resource(&config.service_name);
    let pipeline = PushPipeline::start(&config.endpoint, config.protocol, resource)?;

    if let Err(e) = crate::log::install_subscriber(Some(&pipeline), None) {
        pipeline.shutdown();
        return Err(e);
    }

    global::set_text_map_propagator(TraceContextPropagator::new());
    global::set_tracer_provider(pipeline.tracer_provider().clone());
    global::set_meter_provider(pipeline.meter_provider().clone());

    let instruments = Instruments::push(&pipeline.meter_provider().meter(METER_NAME));

    tracing::info!(
        endpoint = %config.endpoint,
        protocol = ?config.protocol,
        "OTLP push pipeline started"
    );

    Ok(TelemetryState {
        pipeline: Some(pipeline),
        ..TelemetryState::new(BackendMode::Push, instruments, None)
    })
}

fn init_pull(config: &TelemetryConfig) -> Result<TelemetryState, TelemetryError> {
    let registry = Registry::new();
    let instruments = Instruments::pull(&registry)?;

    let (writer, guard) = crate::log::file_writer(&config.log_file)?;
    crate::log::install_subscriber(None, Some(writer))?;

    tracing::info!(log_file = %config.log_file.display(), "Prometheus registry ready");

    Ok(TelemetryState {
        log_guard: Mutex::new(Some(guard)),
        ..TelemetryState::new(BackendMode::Pull, instruments, Some(registry))
    })
}
