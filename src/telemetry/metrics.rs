//
// Copyright © 2025 Agora
// This file is part of TEN Framework, an open source project.
// Licensed under the Apache License, Version 2.0, with certain conditions.
// Refer to the "LICENSE" file in the root directory for more information.
//

//! Backend-agnostic request instruments.
//!
//! Both backends expose the same three instruments through
//! [`MetricInstrument`]. The push flavour hands the attributes to the
//! OpenTelemetry instrument on every call, the pull flavour binds a labelled
//! child in the Prometheus vector and mutates that.

use actix_web::HttpRequest;
use opentelemetry::{
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};
use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry};

use crate::{
    constants::{
        MetricDefinition, ACTIVE_USERS, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS,
        ROUTE_LABELS,
    },
    error::TelemetryError,
};

/// Label set attached to every emission for a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteAttributes {
    pub method: String,
    pub path: String,
}

impl RouteAttributes {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }

    pub fn from_request(req: &HttpRequest) -> Self {
        Self::new(req.method().as_str(), req.path())
    }

    fn key_values(&self) -> [KeyValue; 2] {
        [
            KeyValue::new(ROUTE_LABELS[0], self.method.clone()),
            KeyValue::new(ROUTE_LABELS[1], self.path.clone()),
        ]
    }

    fn label_values(&self) -> [&str; 2] {
        [self.method.as_str(), self.path.as_str()]
    }
}

/// One request instrument, bound to a single backend at construction.
pub trait MetricInstrument: Send + Sync {
    /// Add `amount` to a counter.
    fn increment(&self, amount: f64, labels: &RouteAttributes);

    /// Record one observation in a histogram.
    fn observe(&self, value: f64, labels: &RouteAttributes);

    /// Replace the value of a gauge.
    fn set(&self, value: f64, labels: &RouteAttributes);
}

fn unsupported(kind: &'static str, operation: &'static str) {
    tracing::warn!(instrument = kind, operation, "Operation not supported by instrument, ignored");
}

/// OpenTelemetry instrument feeding a periodic OTLP reader.
pub enum PushInstrument {
    Counter(Counter<f64>),
    Histogram(Histogram<f64>),
    Gauge(Gauge<f64>),
}

impl PushInstrument {
    pub fn counter(meter: &Meter, def: MetricDefinition) -> Self {
        PushInstrument::Counter(
            meter
                .f64_counter(def.name)
                .with_unit(def.unit)
                .with_description(def.description)
                .build(),
        )
    }

    pub fn histogram(meter: &Meter, def: MetricDefinition) -> Self {
        PushInstrument::Histogram(
            meter
                .f64_histogram(def.name)
                .with_unit(def.unit)
                .with_description(def.description)
                .build(),
        )
    }

    pub fn gauge(meter: &Meter, def: MetricDefinition) -> Self {
        PushInstrument::Gauge(
            meter.f64_gauge(def.name).with_unit(def.unit).with_description(def.description).build(),
        )
    }

    fn kind(&self) -> &'static str {
        match self {
            PushInstrument::Counter(_) => "counter",
            PushInstrument::Histogram(_) => "histogram",
            PushInstrument::Gauge(_) => "gauge",
        }
    }
}

impl MetricInstrument for PushInstrument {
    fn increment(&self, amount: f64, labels: &RouteAttributes) {
        match self {
            PushInstrument::Counter(counter) => counter.add(amount, &labels.key_values()),
            _ => unsupported(self.kind(), "increment"),
        }
    }

    fn observe(&self, value: f64, labels: &RouteAttributes) {
        match self {
            PushInstrument::Histogram(histogram) => histogram.record(value, &labels.key_values()),
            _ => unsupported(self.kind(), "observe"),
        }
    }

    fn set(&self, value: f64, labels: &RouteAttributes) {
        match self {
            PushInstrument::Gauge(gauge) => gauge.record(value, &labels.key_values()),
            _ => unsupported(self.kind(), "set"),
        }
    }
}

/// Prometheus vector registered in a local registry.
#[derive(Clone)]
pub enum PullInstrument {
    Counter(CounterVec),
    Histogram(HistogramVec),
    Gauge(GaugeVec),
}

impl PullInstrument {
    pub fn counter(registry: &Registry, def: MetricDefinition) -> Result<Self, TelemetryError> {
        let vec = CounterVec::new(Opts::new(def.name, def.description), &ROUTE_LABELS)
            .map_err(|source| registry_error(def, source))?;
        registry.register(Box::new(vec.clone())).map_err(|source| registry_error(def, source))?;
        Ok(PullInstrument::Counter(vec))
    }

    pub fn histogram(registry: &Registry, def: MetricDefinition) -> Result<Self, TelemetryError> {
        let vec = HistogramVec::new(HistogramOpts::new(def.name, def.description), &ROUTE_LABELS)
            .map_err(|source| registry_error(def, source))?;
        registry.register(Box::new(vec.clone())).map_err(|source| registry_error(def, source))?;
        Ok(PullInstrument::Histogram(vec))
    }

    pub fn gauge(registry: &Registry, def: MetricDefinition) -> Result<Self, TelemetryError> {
        let vec = GaugeVec::new(Opts::new(def.name, def.description), &ROUTE_LABELS)
            .map_err(|source| registry_error(def, source))?;
        registry.register(Box::new(vec.clone())).map_err(|source| registry_error(def, source))?;
        Ok(PullInstrument::Gauge(vec))
    }

    fn kind(&self) -> &'static str {
        match self {
            PullInstrument::Counter(_) => "counter",
            PullInstrument::Histogram(_) => "histogram",
            PullInstrument::Gauge(_) => "gauge",
        }
    }
}

fn registry_error(def: MetricDefinition, source: prometheus::Error) -> TelemetryError {
    TelemetryError::Registry {
        name: def.name,
        source,
    }
}

impl MetricInstrument for PullInstrument {
    fn increment(&self, amount: f64, labels: &RouteAttributes) {
        match self {
            PullInstrument::Counter(vec) => {
                // Prometheus counters are monotonic and reject negative
                // increments.
                if amount < 0.0 {
                    tracing::warn!(amount, "Negative counter increment ignored");
                    return;
                }
                vec.with_label_values(&labels.label_values()).inc_by(amount);
            }
            _ => unsupported(self.kind(), "increment"),
        }
    }

    fn observe(&self, value: f64, labels: &RouteAttributes) {
        match self {
            PullInstrument::Histogram(vec) => {
                vec.with_label_values(&labels.label_values()).observe(value)
            }
            _ => unsupported(self.kind(), "observe"),
        }
    }

    fn set(&self, value: f64, labels: &RouteAttributes) {
        match self {
            PullInstrument::Gauge(vec) => vec.with_label_values(&labels.label_values()).set(value),
            _ => unsupported(self.kind(), "set"),
        }
    }
}

/// The counter, histogram and gauge driven by the request middleware.
pub struct Instruments {
    pub counter: Box<dyn MetricInstrument>,
    pub histogram: Box<dyn MetricInstrument>,
    pub gauge: Box<dyn MetricInstrument>,
}

impl Instruments {
    /// Instruments obtained from an OpenTelemetry meter (push mode).
    pub fn push(meter: &Meter) -> Self {
        Self {
            counter: Box::new(PushInstrument::counter(meter, HTTP_REQUESTS_TOTAL)),
            histogram: Box::new(PushInstrument::histogram(meter, HTTP_REQUEST_DURATION_SECONDS)),
            gauge: Box::new(PushInstrument::gauge(meter, ACTIVE_USERS)),
        }
    }

    /// Instruments registered in a local Prometheus registry (pull mode).
    pub fn pull(registry: &Registry) -> Result<Self, TelemetryError> {
        Ok(Self {
            counter: Box::new(PullInstrument::counter(registry, HTTP_REQUESTS_TOTAL)?),
            histogram: Box::new(PullInstrument::histogram(
                registry,
                HTTP_REQUEST_DURATION_SECONDS,
            )?),
            gauge: Box::new(PullInstrument::gauge(registry, ACTIVE_USERS)?),
        })
    }
}
