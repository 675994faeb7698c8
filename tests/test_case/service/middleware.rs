//
// Copyright © 2025 Agora
// This file is part of TEN Framework, an open source project.
// Licensed under the Apache License, Version 2.0, with certain conditions.
// Refer to the "LICENSE" file in the root directory for more information.
//
use std::time::Duration;

use actix_web::{http::StatusCode, rt::time::timeout, test};
use obs_service::service::create_app;

use crate::test_case::common::{exposition, pull_state, push_state, sample_value};

const FAST_COUNT: &str = r#"http_requests_total{method="GET",path="/fast"}"#;
const FAST_OBSERVATIONS: &str = r#"http_request_duration_seconds_count{method="GET",path="/fast"}"#;
const SLOW_COUNT: &str = r#"http_requests_total{method="GET",path="/slow"}"#;
const SLOW_IN_FLIGHT: &str = r#"active_users{method="GET",path="/slow"}"#;

#[actix_web::test]
async fn test_counter_and_histogram_grow_once_per_request() {
    let state = pull_state();
    let app = test::init_service(create_app(state.clone())).await;

    for expected in 1..=3 {
        let res =
            test::call_service(&app, test::TestRequest::get().uri("/fast").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);

        let text = exposition(&state);
        assert_eq!(sample_value(&text, FAST_COUNT), Some(expected as f64));
        assert_eq!(sample_value(&text, FAST_OBSERVATIONS), Some(expected as f64));
    }

    let res = test::call_service(&app, test::TestRequest::get().uri("/error").to_request()).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let text = exposition(&state);
    assert_eq!(
        sample_value(&text, r#"http_requests_total{method="GET",path="/error"}"#),
        Some(1.0)
    );
    assert_eq!(sample_value(&text, FAST_COUNT), Some(3.0));
}

#[actix_web::test]
async fn test_in_flight_gauge_returns_to_zero_after_concurrent_requests() {
    let state = pull_state();
    let app = test::init_service(create_app(state.clone())).await;

    let requests = (0..10).map(|i| {
        let uri = if i % 5 == 0 { "/slow" } else { "/fast" };
        test::call_service(&app, test::TestRequest::get().uri(uri).to_request())
    });
    let responses = futures::future::join_all(requests).await;

    assert!(responses.iter().all(|res| res.status() == StatusCode::OK));
    assert_eq!(state.in_flight(), 0);

    let text = exposition(&state);
    assert_eq!(sample_value(&text, FAST_COUNT), Some(8.0));
    assert_eq!(sample_value(&text, SLOW_COUNT), Some(2.0));
    // The slow requests finish last, so their series holds the final count.
    assert_eq!(sample_value(&text, SLOW_IN_FLIGHT), Some(0.0));
}

#[actix_web::test]
async fn test_dropped_request_releases_in_flight_slot() {
    let state = pull_state();
    let app = test::init_service(create_app(state.clone())).await;

    let pending = test::call_service(&app, test::TestRequest::get().uri("/slow").to_request());
    assert!(timeout(Duration::from_millis(100), pending).await.is_err());

    assert_eq!(state.in_flight(), 0);

    let text = exposition(&state);
    assert_eq!(sample_value(&text, SLOW_IN_FLIGHT), Some(0.0));
    assert_eq!(sample_value(&text, SLOW_COUNT), Some(1.0));
}

#[actix_web::test]
async fn test_push_mode_requests_are_instrumented() {
    let (state, provider) = push_state();
    let app = test::init_service(create_app(state.clone())).await;

    let res = test::call_service(&app, test::TestRequest::get().uri("/fast").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(state.in_flight(), 0);

    provider.shutdown().ok();
}
