//
// Copyright © 2025 Agora
// This file is part of TEN Framework, an open source project.
// Licensed under the Apache License, Version 2.0, with certain conditions.
// Refer to the "LICENSE" file in the root directory for more information.
//
mod api;
pub mod middleware;

use std::{sync::Arc, time::Duration};

use actix_web::{
    body::MessageBody,
    dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse},
    middleware::from_fn,
    web, App, HttpServer,
};

use crate::{
    constants::{SERVER_BIND_MAX_RETRIES, SERVER_BIND_RETRY_INTERVAL_SECS},
    telemetry::{configure_metrics_endpoint, TelemetryState},
};

/// Build the application: demo routes, `/metrics`, and the request
/// instrumentation around all of them.
pub fn create_app(
    state: web::Data<TelemetryState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(state)
        .wrap(from_fn(middleware::instrument_request))
        .configure(api::configure_api_route)
        .configure(configure_metrics_endpoint)
}

/// Bind the HTTP server, retrying a few times if the address is busy.
fn create_server_with_retry(
    bind_address: &str,
    state: web::Data<TelemetryState>,
) -> std::io::Result<Server> {
    let mut attempt = 1;
    loop {
        let app_state = state.clone();
        let server = HttpServer::new(move || create_app(app_state.clone())).backlog(1024);

        match server.bind(bind_address) {
            Ok(server) => {
                tracing::info!("Successfully bound to endpoint: {bind_address}");
                return Ok(server.run());
            }
            Err(e) if attempt < SERVER_BIND_MAX_RETRIES => {
                tracing::error!(
                    "Failed to bind to {bind_address}: {e}. Attempt {attempt} of \
                     {SERVER_BIND_MAX_RETRIES}. Retrying in {SERVER_BIND_RETRY_INTERVAL_SECS} \
                     second{}...",
                    if SERVER_BIND_RETRY_INTERVAL_SECS == 1 { "" } else { "s" }
                );
                std::thread::sleep(Duration::from_secs(SERVER_BIND_RETRY_INTERVAL_SECS));
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    "Error binding to {bind_address} after {attempt} attempts: {e}. Check if \
                     another process is using this port or if you have permission to bind to \
                     this address."
                );
                return Err(e);
            }
        }
    }
}

/// Serve until the process receives a stop signal.
///
/// Must be called inside an actix system.
pub async fn run(bind_address: &str, state: Arc<TelemetryState>) -> std::io::Result<()> {
    let server = create_server_with_retry(bind_address, web::Data::from(state))?;

    match server.await {
        Ok(()) => {
            tracing::info!("Endpoint server shut down.");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Endpoint server error: {e}");
            Err(e)
        }
    }
}
