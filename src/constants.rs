//
// Copyright © 2025 Agora
// This file is part of TEN Framework, an open source project.
// Licensed under the Apache License, Version 2.0, with certain conditions.
// Refer to the "LICENSE" file in the root directory for more information.
//
use std::time::Duration;

// Environment variables.
pub const OTEL_BACKEND_ENDPOINT_ENV: &str = "OTEL_BACKEND_ENDPOINT";
pub const OTEL_BACKEND_PROTOCOL_ENV: &str = "OTEL_BACKEND_PROTOCOL";
pub const OBSERVABILITY_BACKEND_ENV: &str = "OBSERVABILITY_BACKEND";
pub const OTEL_SERVICE_NAME_ENV: &str = "OTEL_SERVICE_NAME";
pub const APP_LOG_FILE_ENV: &str = "APP_LOG_FILE";
pub const APP_BIND_ADDRESS_ENV: &str = "APP_BIND_ADDRESS";

pub const DEFAULT_OTEL_BACKEND_ENDPOINT: &str = "http://localhost:4317";

/// The `OBSERVABILITY_BACKEND` value that selects push mode. It is also the
/// value assumed when the variable is not set.
pub const PUSH_BACKEND_SENTINEL: &str = "signoz";

pub const DEFAULT_SERVICE_NAME: &str = "obs_service";
pub const SERVICE_NAMESPACE: &str = "obs-service";
pub const METER_NAME: &str = "obs_service_metrics";
pub const TRACER_NAME: &str = "obs_service";

pub const DEFAULT_LOG_FILE: &str = "logs/obs_service.log";
pub const DEFAULT_LOG_FILTER: &str = "info,obs_service=debug";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";

pub const METRICS_EXPORT_INTERVAL: Duration = Duration::from_secs(10);
pub const PUSH_PIPELINE_INIT_TIMEOUT: Duration = Duration::from_secs(5);

pub const SERVER_BIND_MAX_RETRIES: u32 = 3;
pub const SERVER_BIND_RETRY_INTERVAL_SECS: u64 = 1;

// HTTP surface.
pub const FAST_PATH: &str = "/fast";
pub const SLOW_PATH: &str = "/slow";
pub const ERROR_PATH: &str = "/error";
pub const METRICS: &str = "/metrics";
pub const PROCESS_TIME_HEADER: &str = "x-process-time";
pub const TRACEPARENT_HEADER: &str = "traceparent";
pub const SLOW_RESPONSE_DELAY: Duration = Duration::from_secs(2);
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Name, unit and description of one of the request instruments.
#[derive(Debug, Clone, Copy)]
pub struct MetricDefinition {
    pub name: &'static str,
    pub unit: &'static str,
    pub description: &'static str,
}

pub const HTTP_REQUESTS_TOTAL: MetricDefinition = MetricDefinition {
    name: "http_requests_total",
    unit: "1",
    description: "Total number of HTTP requests",
};

pub const HTTP_REQUEST_DURATION_SECONDS: MetricDefinition = MetricDefinition {
    name: "http_request_duration_seconds",
    unit: "s",
    description: "Duration of HTTP requests",
};

/// Counts in-flight requests, not authenticated sessions.
pub const ACTIVE_USERS: MetricDefinition = MetricDefinition {
    name: "active_users",
    unit: "1",
    description: "Number of active users",
};

pub const ROUTE_LABELS: [&str; 2] = ["method", "path"];
