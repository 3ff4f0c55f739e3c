// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for form abuse simulation.
//!
//! This module provides utilities for replaying abusive submission traffic
//! through the rate limiter and the ingest pipeline.

pub mod attacks;
pub mod generators;
pub mod metrics;
