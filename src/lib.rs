//
// Copyright © 2025 Agora
// This file is part of TEN Framework, an open source project.
// Licensed under the Apache License, Version 2.0, with certain conditions.
// Refer to the "LICENSE" file in the root directory for more information.
//

//! An HTTP service whose requests produce a request counter, a duration
//! histogram, an in-flight gauge and trace-stamped JSON logs.
//!
//! The backend is chosen once at startup: push mode exports everything over
//! OTLP, pull mode keeps metrics in a local Prometheus registry served on
//! `/metrics` and writes logs to a file.

pub mod constants;
pub mod error;
pub mod log;
pub mod service;
pub mod telemetry;
