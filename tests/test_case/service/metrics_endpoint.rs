//
// Copyright © 2025 Agora
// This file is part of TEN Framework, an open source project.
// Licensed under the Apache License, Version 2.0, with certain conditions.
// Refer to the "LICENSE" file in the root directory for more information.
//
use actix_web::{http::StatusCode, test};
use obs_service::{constants::PROMETHEUS_CONTENT_TYPE, service::create_app};

use crate::test_case::common::{process_time, pull_state, push_state, sample_value};

#[actix_web::test]
async fn test_metrics_endpoint_in_pull_mode() {
    let app = test::init_service(create_app(pull_state())).await;

    let res = test::call_service(&app, test::TestRequest::get().uri("/fast").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res =
        test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers().get("content-type").unwrap(), PROMETHEUS_CONTENT_TYPE);
    process_time(res.headers());

    let body = test::read_body(res).await;
    let text = std::str::from_utf8(&body).unwrap();
    assert!(text.contains("http_requests_total"));
    assert!(text.contains("http_request_duration_seconds"));
    assert!(text.contains("active_users"));
    assert!(text.contains("# HELP http_requests_total Total number of HTTP requests"));
}

#[actix_web::test]
async fn test_first_scrape_lists_only_in_flight_gauge() {
    let app = test::init_service(create_app(pull_state())).await;

    let res =
        test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);

    // The scrape itself is in flight while the registry is gathered.
    let body = test::read_body(res).await;
    let text = std::str::from_utf8(&body).unwrap();
    assert_eq!(sample_value(text, r#"active_users{method="GET",path="/metrics"}"#), Some(1.0));
    assert!(!text.contains("http_requests_total"));
    assert!(!text.contains("http_request_duration_seconds"));

    let res =
        test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
    let body = test::read_body(res).await;
    let text = std::str::from_utf8(&body).unwrap();
    assert_eq!(
        sample_value(text, r#"http_requests_total{method="GET",path="/metrics"}"#),
        Some(1.0)
    );
}

#[actix_web::test]
async fn test_metrics_endpoint_in_push_mode() {
    let (state, provider) = push_state();
    let app = test::init_service(create_app(state)).await;

    let res =
        test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    process_time(res.headers());

    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(
        body,
        serde_json::json!({"detail": "Prometheus observability platform not configured"})
    );

    provider.shutdown().ok();
}
