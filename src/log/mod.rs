//
// Copyright © 2025 Agora
// This file is part of TEN Framework, an open source project.
// Licensed under the Apache License, Version 2.0, with certain conditions.
// Refer to the "LICENSE" file in the root directory for more information.
//
pub mod enricher;
pub mod otel;

use std::path::Path;

use tracing::Subscriber;
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    fmt::{self, format::JsonFields, MakeWriter},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter,
};

pub use self::enricher::{EnrichedJsonFormat, TraceContext};
use crate::{constants::DEFAULT_LOG_FILTER, error::TelemetryError, telemetry::PushPipeline};

/// Formatting layer writing enriched JSON records to `make_writer`.
pub fn json_layer<S, W>(make_writer: W) -> fmt::Layer<S, JsonFields, EnrichedJsonFormat, W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + 'static,
{
    fmt::layer()
        .fmt_fields(JsonFields::new())
        .event_format(EnrichedJsonFormat)
        .with_writer(make_writer)
}

/// Open `path` for appending through a background writer.
///
/// The returned guard flushes pending records when dropped.
pub fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard), TelemetryError> {
    let file_name = path.file_name().and_then(|name| name.to_str()).ok_or_else(|| {
        TelemetryError::Configuration(format!("log file `{}` does not name a file", path.display()))
    })?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(directory)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(directory)
        .map_err(|e| {
            TelemetryError::Configuration(format!(
                "cannot open log file `{}`: {e}",
                path.display()
            ))
        })?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Install the process-wide subscriber.
///
/// Console JSON output is always on. Push mode adds the span and log bridges
/// to the collector, pull mode adds the file sink. `log` crate records are
/// captured as well.
pub(crate) fn install_subscriber(
    push: Option<&PushPipeline>,
    file: Option<NonBlocking>,
) -> Result<(), TelemetryError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let trace_layer =
        push.map(|pipeline| otel::create_otlp_trace_layer(pipeline.tracer_provider()));
    let log_layer =
        push.map(|pipeline| otel::create_otlp_log_layer(pipeline.logger_provider()));
    let file_layer = file.map(|writer| json_layer(writer));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(trace_layer)
        .with(json_layer(std::io::stdout))
        .with(file_layer)
        .with(log_layer)
        .try_init()?;

    Ok(())
}
