// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Access policy evaluation.
//!
//! Decides whether a submission is admitted under its endpoint's
//! [`AccessMode`]. On admission the evaluator also strips the fields that
//! carried the credential, so neither the shared key nor the subject marker
//! ever reaches storage.

use crate::models::{AccessMode, EndpointPolicy, FieldMap};
use serde_json::Value;
use thiserror::Error;

/// Hidden form field carrying the shared secret for keyed endpoints.
pub const SUBMISSION_KEY_FIELD: &str = "_submission_key";

/// Internal metadata key carrying the authenticated subject id.
pub const AUTH_SUBJECT_MARKER: &str = "_auth_user_id";

/// Why a submission was refused.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PolicyRejection {
    #[error("Invalid or missing submission key")]
    InvalidKey,

    #[error("Authentication required for this form")]
    AuthRequired,
}

/// Evaluate `policy` against one submission.
///
/// `subject` is the caller identity resolved upstream; `None` or an empty
/// string means anonymous. The subject marker is removed from `client_meta`
/// in every mode so a submitter cannot plant it.
pub fn evaluate(
    policy: &EndpointPolicy,
    data: &mut FieldMap,
    client_meta: &mut FieldMap,
    subject: Option<&str>,
) -> Result<(), PolicyRejection> {
    client_meta.remove(AUTH_SUBJECT_MARKER);

    match policy.access_mode {
        AccessMode::Open => Ok(()),
        AccessMode::Keyed => {
            let supplied = match data.get(SUBMISSION_KEY_FIELD) {
                Some(Value::String(key)) => key.as_str(),
                _ => "",
            };
            let admitted = match policy.submission_key() {
                Some(expected) => !supplied.is_empty() && timing_safe_eq(supplied, expected),
                None => false,
            };
            if !admitted {
                return Err(PolicyRejection::InvalidKey);
            }
            data.remove(SUBMISSION_KEY_FIELD);
            Ok(())
        }
        AccessMode::Authenticated => match subject {
            Some(id) if !id.is_empty() => Ok(()),
            _ => Err(PolicyRejection::AuthRequired),
        },
    }
}

/// Constant-time string comparison.
fn timing_safe_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
