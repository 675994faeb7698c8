//
// Copyright © 2025 Agora
// This file is part of TEN Framework, an open source project.
// Licensed under the Apache License, Version 2.0, with certain conditions.
// Refer to the "LICENSE" file in the root directory for more information.
//
use actix_web::{http::StatusCode, test};
use obs_service::service::create_app;
use tracing_subscriber::layer::SubscriberExt;

use crate::test_case::common::{process_time, pull_state, Captured};

#[actix_web::test]
async fn test_fast_route() {
    let app = test::init_service(create_app(pull_state())).await;

    let res = test::call_service(&app, test::TestRequest::get().uri("/fast").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(process_time(res.headers()) < 2.0);

    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body, serde_json::json!({"message": "fast_response"}));
}

#[actix_web::test]
async fn test_slow_route_takes_at_least_two_seconds() {
    let app = test::init_service(create_app(pull_state())).await;

    let res = test::call_service(&app, test::TestRequest::get().uri("/slow").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(process_time(res.headers()) >= 2.0);

    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body, serde_json::json!({"message": "slow_response"}));
}

#[actix_web::test]
async fn test_error_route_fails_and_logs() {
    let captured = Captured::default();
    let subscriber =
        tracing_subscriber::registry().with(obs_service::log::json_layer(captured.clone()));
    let _default = tracing::subscriber::set_default(subscriber);

    let app = test::init_service(create_app(pull_state())).await;

    let res = test::call_service(&app, test::TestRequest::get().uri("/error").to_request()).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    process_time(res.headers());

    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body, serde_json::json!({"detail": "error_response"}));

    let records = captured.records();
    let error = records
        .iter()
        .find(|record| record["message"] == "Mocking an application error")
        .unwrap();
    assert_eq!(error["level"], "ERROR");
    assert_eq!(error["method"], "GET");
    assert_eq!(error["path"], "/error");

    let processed =
        records.iter().find(|record| record["message"] == "Request processed").unwrap();
    assert_eq!(processed["status_code"], 500);
    assert!(processed.get("http.response.status_code").is_none());
}

#[actix_web::test]
async fn test_unknown_route_is_still_timed() {
    let app = test::init_service(create_app(pull_state())).await;

    let res =
        test::call_service(&app, test::TestRequest::get().uri("/missing").to_request()).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    process_time(res.headers());
}
