//
// Copyright © 2025 Agora
// This file is part of TEN Framework, an open source project.
// Licensed under the Apache License, Version 2.0, with certain conditions.
// Refer to the "LICENSE" file in the root directory for more information.
//
use anyhow::{Context, Result};
use obs_service::{
    constants::{APP_BIND_ADDRESS_ENV, DEFAULT_BIND_ADDRESS},
    service,
    telemetry::{self, TelemetryConfig},
};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = TelemetryConfig::from_env();
    let state = telemetry::setup(&config).context("failed to set up telemetry")?;

    let bind_address =
        std::env::var(APP_BIND_ADDRESS_ENV).unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());

    tracing::info!(mode = %state.mode(), bind_address = %bind_address, "Starting obs_service");

    let result = actix_rt::System::new().block_on(service::run(&bind_address, state.clone()));

    state.shutdown();

    result.with_context(|| format!("HTTP server on {bind_address} failed"))
}
