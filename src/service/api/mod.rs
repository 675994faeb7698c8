//
// Copyright © 2025 Agora
// This file is part of TEN Framework, an open source project.
// Licensed under the Apache License, Version 2.0, with certain conditions.
// Refer to the "LICENSE" file in the root directory for more information.
//
use actix_web::{web, HttpResponse};

use crate::{
    constants::{ERROR_PATH, FAST_PATH, SLOW_PATH, SLOW_RESPONSE_DELAY},
    error::ApiError,
};

pub fn configure_api_route(cfg: &mut web::ServiceConfig) {
    cfg.route(FAST_PATH, web::get().to(fast))
        .route(SLOW_PATH, web::get().to(slow))
        .route(ERROR_PATH, web::get().to(error));
}

async fn fast() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "message": "fast_response"
    }))
}

async fn slow() -> HttpResponse {
    actix_web::rt::time::sleep(SLOW_RESPONSE_DELAY).await;
    HttpResponse::Ok().json(serde_json::json!({
        "message": "slow_response"
    }))
}

async fn error() -> Result<HttpResponse, ApiError> {
    tracing::error!("Mocking an application error");
    Err(ApiError::Handler("error_response".to_string()))
}
