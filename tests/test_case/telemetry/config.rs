//
// Copyright © 2025 Agora
// This file is part of TEN Framework, an open source project.
// Licensed under the Apache License, Version 2.0, with certain conditions.
// Refer to the "LICENSE" file in the root directory for more information.
//
use std::path::Path;

use obs_service::{
    constants::{
        APP_LOG_FILE_ENV, OBSERVABILITY_BACKEND_ENV, OTEL_BACKEND_ENDPOINT_ENV,
        OTEL_BACKEND_PROTOCOL_ENV, OTEL_SERVICE_NAME_ENV,
    },
    error::TelemetryError,
    telemetry::config::{BackendMode, OtlpProtocol, TelemetryConfig},
};
use serial_test::serial;

const ENV_KEYS: [&str; 5] = [
    OBSERVABILITY_BACKEND_ENV,
    OTEL_BACKEND_ENDPOINT_ENV,
    OTEL_BACKEND_PROTOCOL_ENV,
    OTEL_SERVICE_NAME_ENV,
    APP_LOG_FILE_ENV,
];

fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}

#[test]
fn test_parse_empty_config() {
    let config = TelemetryConfig::from_json(&serde_json::json!({})).unwrap();

    assert_eq!(config.backend, None);
    assert_eq!(config.backend_mode(), BackendMode::Push);
    assert_eq!(config.endpoint, "http://localhost:4317");
    assert_eq!(config.protocol, OtlpProtocol::Grpc);
    assert_eq!(config.service_name, "obs_service");
    assert_eq!(config.log_file, Path::new("logs/obs_service.log"));
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_otlp_config() {
    let json = serde_json::json!({
        "backend": "signoz",
        "endpoint": "http://collector:4318",
        "protocol": "http",
        "service_name": "checkout"
    });

    let config = TelemetryConfig::from_json(&json).unwrap();
    assert_eq!(config.backend_mode(), BackendMode::Push);
    assert_eq!(config.endpoint, "http://collector:4318");
    assert_eq!(config.protocol, OtlpProtocol::Http);
    assert_eq!(config.service_name, "checkout");
}

#[test]
fn test_parse_prometheus_config() {
    let json = serde_json::json!({
        "backend": "prometheus",
        "log_file": "/var/log/obs/app.log"
    });

    let config = TelemetryConfig::from_json(&json).unwrap();
    assert_eq!(config.backend_mode(), BackendMode::Pull);
    assert_eq!(config.log_file, Path::new("/var/log/obs/app.log"));
}

#[test]
fn test_parse_invalid_protocol_fails() {
    let json = serde_json::json!({ "protocol": "udp" });
    assert!(TelemetryConfig::from_json(&json).is_err());
}

#[test]
fn test_validate_rejects_endpoint_without_host() {
    let json = serde_json::json!({ "endpoint": "http://" });
    let config = TelemetryConfig::from_json(&json).unwrap();

    assert!(matches!(config.validate(), Err(TelemetryError::Configuration(_))));
}

#[test]
fn test_validate_rejects_empty_service_name() {
    let json = serde_json::json!({ "backend": "prometheus", "service_name": " " });
    let config = TelemetryConfig::from_json(&json).unwrap();

    assert!(matches!(config.validate(), Err(TelemetryError::Configuration(_))));
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();

    let config = TelemetryConfig::from_env();
    assert_eq!(config.backend, None);
    assert_eq!(config.backend_mode(), BackendMode::Push);
    assert_eq!(config.endpoint, "http://localhost:4317");
    assert_eq!(config.protocol, OtlpProtocol::Grpc);
}

#[test]
#[serial]
fn test_from_env_reads_every_variable() {
    clear_env();
    std::env::set_var(OBSERVABILITY_BACKEND_ENV, "prometheus");
    std::env::set_var(OTEL_BACKEND_ENDPOINT_ENV, "https://otel.example.com:4317");
    std::env::set_var(OTEL_BACKEND_PROTOCOL_ENV, "http/protobuf");
    std::env::set_var(OTEL_SERVICE_NAME_ENV, "checkout");
    std::env::set_var(APP_LOG_FILE_ENV, "/tmp/obs/checkout.log");

    let config = TelemetryConfig::from_env();
    clear_env();

    assert_eq!(config.backend.as_deref(), Some("prometheus"));
    assert_eq!(config.backend_mode(), BackendMode::Pull);
    assert_eq!(config.endpoint, "https://otel.example.com:4317");
    assert_eq!(config.protocol, OtlpProtocol::Http);
    assert_eq!(config.service_name, "checkout");
    assert_eq!(config.log_file, Path::new("/tmp/obs/checkout.log"));
}

#[test]
#[serial]
fn test_from_env_empty_backend_selects_pull() {
    clear_env();
    std::env::set_var(OBSERVABILITY_BACKEND_ENV, "");

    let config = TelemetryConfig::from_env();
    clear_env();

    assert_eq!(config.backend.as_deref(), Some(""));
    assert_eq!(config.backend_mode(), BackendMode::Pull);
}

#[test]
#[serial]
fn test_from_env_unknown_protocol_keeps_grpc() {
    clear_env();
    std::env::set_var(OTEL_BACKEND_PROTOCOL_ENV, "udp");

    let config = TelemetryConfig::from_env();
    clear_env();

    assert_eq!(config.protocol, OtlpProtocol::Grpc);
}
