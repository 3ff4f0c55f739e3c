// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Form Intake
//!
//! Accepts public form submissions and runs each one through a fixed
//! pipeline:
//!
//! - Per-IP rate limiting (public, auth and API quotas)
//! - Access policy (open, keyed, authenticated endpoints)
//! - Server-side metadata collection
//! - Heuristic spam scoring
//! - Storage, then email and signed webhook notifications off the request path

pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod limiter;
pub mod metadata;
pub mod metrics;
pub mod models;
pub mod notify;
pub mod policy;
pub mod server;
pub mod spam;
pub mod store;
pub mod webhook;

pub use config::Config;
pub use error::IngestError;
pub use handlers::AppState;
pub use ingest::{IngestService, SubmissionOutcome, SubmissionRequest};
pub use limiter::{RateLimitResult, RateLimiter, RateLimiters};
pub use models::{AccessMode, EndpointPolicy, SubmissionRecord};
pub use server::create_router;
pub use spam::{SpamScore, SpamScorer};
pub use store::MemoryStore;
