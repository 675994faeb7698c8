//
// Copyright © 2025 Agora
// This file is part of TEN Framework, an open source project.
// Licensed under the Apache License, Version 2.0, with certain conditions.
// Refer to the "LICENSE" file in the root directory for more information.
//

//! JSON log records stamped with the active trace context.
//!
//! Every record is one JSON object per line:
//!
//! ```json
//! {"timestamp":"2025-01-01T00:00:00.000000Z","level":"DEBUG",
//!  "logger":"obs_service::service::middleware","message":"Request received",
//!  "method":"GET","path":"/fast",
//!  "trace_id":"4bf92f3577b34da6a3ce929d0e0e4736","span_id":"00f067aa0ba902b7"}
//! ```
//!
//! `trace_id` and `span_id` are only present while a recording span is
//! active. The span is resolved from the formatter's own span scope, so the
//! ids are found under a scoped dispatcher as well as a global one.

use std::fmt;

use chrono::{SecondsFormat, Utc};
use opentelemetry::trace::{SpanId, TraceContextExt, TraceId};
use serde_json::{Map, Value};
use tracing::{
    field::{Field, Visit},
    Event, Subscriber,
};
use tracing_opentelemetry::OtelData;
use tracing_subscriber::{
    fmt::{
        format::{JsonFields, Writer},
        FmtContext, FormatEvent, FormattedFields,
    },
    registry::{LookupSpan, SpanRef},
};

/// Snapshot of the OpenTelemetry span context active on the current thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub is_recording: bool,
}

impl TraceContext {
    /// Context of an entered `tracing` span bridged to OpenTelemetry.
    ///
    /// `None` when no tracer layer is installed, or when the span has not
    /// been entered on this thread.
    pub fn from_span<'a, R>(span: &SpanRef<'a, R>) -> Option<Self>
    where
        R: LookupSpan<'a>,
    {
        let span_id = span.extensions().get::<OtelData>()?.span_id()?;

        // Entering the span attaches its context to the thread.
        let trace = Self::from_context(&opentelemetry::Context::current())?;
        (trace.span_id == span_id).then_some(trace)
    }

    pub fn from_context(cx: &opentelemetry::Context) -> Option<Self> {
        let span = cx.span();
        let span_context = span.span_context();
        if !span_context.is_valid() {
            return None;
        }

        // The bridge hands out a pre-sampled snapshot of the span, so the
        // sampled flag is what tells a recording span from a dropped one.
        Some(Self {
            trace_id: span_context.trace_id(),
            span_id: span_context.span_id(),
            is_recording: span.is_recording() || span_context.is_sampled(),
        })
    }

    /// 32 lowercase hex characters.
    pub fn trace_id_hex(&self) -> String {
        format!("{:032x}", u128::from_be_bytes(self.trace_id.to_bytes()))
    }

    /// 16 lowercase hex characters.
    pub fn span_id_hex(&self) -> String {
        format!("{:016x}", u64::from_be_bytes(self.span_id.to_bytes()))
    }
}

/// Event formatter producing the JSON records described in the module docs.
///
/// Must be paired with [`JsonFields`] so span fields can be merged into the
/// record as bound context.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnrichedJsonFormat;

impl<S> FormatEvent<S, JsonFields> for EnrichedJsonFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, JsonFields>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();

        let mut record = Map::new();
        record.insert(
            "timestamp".to_string(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        record.insert("level".to_string(), Value::from(meta.level().as_str()));
        record.insert("logger".to_string(), Value::from(meta.target()));

        // Bound context, outermost span first so inner spans win.
        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                let extensions = span.extensions();
                let Some(fields) = extensions.get::<FormattedFields<JsonFields>>() else {
                    continue;
                };
                if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(fields) {
                    merge_fields(&mut record, fields);
                }
            }
        }

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        merge_fields(&mut record, visitor.fields);

        let trace = ctx
            .event_scope()
            .and_then(|mut scope| scope.next())
            .and_then(|leaf| TraceContext::from_span(&leaf))
            .filter(|trace| trace.is_recording);
        if let Some(trace) = trace {
            record.insert("trace_id".to_string(), Value::from(trace.trace_id_hex()));
            record.insert("span_id".to_string(), Value::from(trace.span_id_hex()));
        }

        let line = serde_json::to_string(&record).map_err(|_| fmt::Error)?;
        writeln!(writer, "{line}")
    }
}

/// Span fields reserved for the OpenTelemetry bridge, semantic-convention
/// span attributes and fields injected by the `log` compatibility layer are
/// not part of the record.
fn is_internal_field(name: &str) -> bool {
    ["otel.", "http.", "log."].iter().any(|prefix| name.starts_with(prefix))
}

fn merge_fields(record: &mut Map<String, Value>, fields: Map<String, Value>) {
    for (name, value) in fields {
        if !is_internal_field(&name) {
            record.insert(name, value);
        }
    }
}

#[derive(Default)]
struct JsonVisitor {
    fields: Map<String, Value>,
}

impl Visit for JsonVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.fields.insert(field.name().to_string(), Value::from(format!("{value:?}")));
    }
}
