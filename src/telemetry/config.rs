//
// Copyright © 2025 Agora
// This file is part of TEN Framework, an open source project.
// Licensed under the Apache License, Version 2.0, with certain conditions.
// Refer to the "LICENSE" file in the root directory for more information.
//

//! Telemetry configuration structures
//!
//! The backend mode decides how every signal leaves the process: pushed to an
//! OTLP collector, or kept in a local Prometheus registry that is scraped on
//! demand.

use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    constants::{
        APP_LOG_FILE_ENV, DEFAULT_LOG_FILE, DEFAULT_OTEL_BACKEND_ENDPOINT, DEFAULT_SERVICE_NAME,
        OBSERVABILITY_BACKEND_ENV, OTEL_BACKEND_ENDPOINT_ENV, OTEL_BACKEND_PROTOCOL_ENV,
        OTEL_SERVICE_NAME_ENV, PUSH_BACKEND_SENTINEL,
    },
    error::TelemetryError,
};

/// Where metrics, logs and traces are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    /// Batched export to a remote OTLP collector.
    Push,

    /// Local registry exposed on `/metrics`, logs appended to a file.
    Pull,
}

impl BackendMode {
    /// Resolve the backend mode from the `OBSERVABILITY_BACKEND` value.
    ///
    /// An absent value falls back to the push sentinel. Any present value
    /// other than the sentinel selects pull mode.
    pub fn resolve(backend: Option<&str>) -> Self {
        match backend.unwrap_or(PUSH_BACKEND_SENTINEL) {
            PUSH_BACKEND_SENTINEL => BackendMode::Push,
            _ => BackendMode::Pull,
        }
    }

    pub fn is_push(&self) -> bool {
        matches!(self, BackendMode::Push)
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendMode::Push => write!(f, "push"),
            BackendMode::Pull => write!(f, "pull"),
        }
    }
}

/// OTLP protocol type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OtlpProtocol {
    #[default]
    Grpc,
    Http,
}

impl OtlpProtocol {
    fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "grpc" => Some(OtlpProtocol::Grpc),
            "http" | "http/protobuf" => Some(OtlpProtocol::Http),
            _ => None,
        }
    }
}

/// Top-level telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Raw `OBSERVABILITY_BACKEND` value, `None` when unset.
    #[serde(default)]
    pub backend: Option<String>,

    /// OTLP collector endpoint (push mode only).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub protocol: OtlpProtocol,

    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Append-only log file written in pull mode.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

// Default value functions
fn default_endpoint() -> String {
    DEFAULT_OTEL_BACKEND_ENDPOINT.to_string()
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_FILE)
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            backend: None,
            endpoint: default_endpoint(),
            protocol: OtlpProtocol::default(),
            service_name: default_service_name(),
            log_file: default_log_file(),
        }
    }
}

impl TelemetryConfig {
    /// Parse from JSON value
    pub fn from_json(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }

    /// Read the configuration from the process environment.
    ///
    /// Unknown protocol values keep the gRPC default.
    pub fn from_env() -> Self {
        let env = |key: &str| std::env::var(key).ok();

        let mut config = Self {
            backend: env(OBSERVABILITY_BACKEND_ENV),
            ..Self::default()
        };

        if let Some(endpoint) = env(OTEL_BACKEND_ENDPOINT_ENV) {
            config.endpoint = endpoint;
        }
        if let Some(protocol) = env(OTEL_BACKEND_PROTOCOL_ENV) {
            config.protocol = OtlpProtocol::from_str(&protocol).unwrap_or_default();
        }
        if let Some(service_name) = env(OTEL_SERVICE_NAME_ENV).filter(|s| !s.is_empty()) {
            config.service_name = service_name;
        }
        if let Some(log_file) = env(APP_LOG_FILE_ENV).filter(|s| !s.is_empty()) {
            config.log_file = PathBuf::from(log_file);
        }

        config
    }

    pub fn backend_mode(&self) -> BackendMode {
        BackendMode::resolve(self.backend.as_deref())
    }

    /// Reject settings that can never produce a working pipeline.
    ///
    /// The endpoint is only checked in push mode, where it is used.
    pub fn validate(&self) -> Result<(), TelemetryError> {
        if self.service_name.trim().is_empty() {
            return Err(TelemetryError::Configuration("service name must not be empty".into()));
        }

        if self.backend_mode().is_push() {
            let url = Url::parse(&self.endpoint).map_err(|e| {
                TelemetryError::Configuration(format!(
                    "malformed OTLP endpoint `{}`: {e}",
                    self.endpoint
                ))
            })?;

            if !matches!(url.scheme(), "http" | "https") {
                return Err(TelemetryError::Configuration(format!(
                    "OTLP endpoint `{}` must use http or https",
                    self.endpoint
                )));
            }
            if url.host_str().map_or(true, str::is_empty) {
                return Err(TelemetryError::Configuration(format!(
                    "OTLP endpoint `{}` has no host",
                    self.endpoint
                )));
            }
        } else if self.log_file.file_name().is_none() {
            return Err(TelemetryError::Configuration(format!(
                "log file `{}` does not name a file",
                self.log_file.display()
            )));
        }

        Ok(())
    }
}
