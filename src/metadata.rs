// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Server-observed request metadata.
//!
//! Everything here is read from request headers or the connection itself,
//! never from the submitted body, so a submitter cannot forge it by editing
//! the form. Collection performs no I/O and never fails: absent headers
//! simply leave fields empty.

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// CDN-injected client address.
pub const CDN_CONNECTING_IP: &str = "cf-connecting-ip";
/// CDN true-client address (enterprise plans).
pub const TRUE_CLIENT_IP: &str = "true-client-ip";
/// Reverse-proxy real address.
pub const X_REAL_IP: &str = "x-real-ip";
/// Proxy chain, client first.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
/// CDN geo hint (ISO 3166-1 alpha-2).
pub const CDN_COUNTRY: &str = "cf-ipcountry";

/// Trusted metadata collected from one inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMetadata {
    pub ip: String,
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub user_agent: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub is_mobile: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub platform: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_hint: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub referer: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub origin: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub country: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub estimated_tz: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cf_ray: String,
    #[serde(default, rename = "dnt", skip_serializing_if = "String::is_empty")]
    pub do_not_track: String,
}

impl ServerMetadata {
    /// Collect metadata from request headers and the raw peer address
    /// (`host:port`, IPv6 hosts bracketed).
    pub fn collect(headers: &HeaderMap, remote_addr: Option<&str>) -> Self {
        let country = header_str(headers, CDN_COUNTRY).to_string();
        let estimated_tz = timezone_for_country(&country).unwrap_or_default().to_string();

        Self {
            ip: client_ip(headers, remote_addr),
            request_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            user_agent: header_str(headers, "user-agent").to_string(),
            language: header_str(headers, "accept-language").to_string(),
            is_mobile: header_str(headers, "sec-ch-ua-mobile").to_string(),
            platform: header_str(headers, "sec-ch-ua-platform").to_string(),
            client_hint: header_str(headers, "sec-ch-ua").to_string(),
            referer: header_str(headers, "referer").to_string(),
            origin: header_str(headers, "origin").to_string(),
            content_type: header_str(headers, "content-type").to_string(),
            protocol: protocol(headers).to_string(),
            country,
            estimated_tz,
            cf_ray: header_str(headers, "cf-ray").to_string(),
            do_not_track: header_str(headers, "dnt").to_string(),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or("")
}

/// Resolve the originating client address.
///
/// First non-empty wins: CDN connecting IP, true-client IP, proxy real IP,
/// first hop of `X-Forwarded-For`, then the connection address without its port.
pub fn client_ip(headers: &HeaderMap, remote_addr: Option<&str>) -> String {
    for name in [CDN_CONNECTING_IP, TRUE_CLIENT_IP, X_REAL_IP] {
        let value = header_str(headers, name);
        if !value.is_empty() {
            return value.to_string();
        }
    }

    let forwarded = header_str(headers, X_FORWARDED_FOR);
    if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
        return first.to_string();
    }

    remote_addr.map(strip_port).unwrap_or_default()
}

/// Strip the port from a `host:port` peer address.
///
/// `[::1]:8080` becomes `::1`; a bare IPv6 address is returned unchanged.
pub fn strip_port(addr: &str) -> String {
    if let Some(rest) = addr.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            return rest[..end].to_string();
        }
        return addr.to_string();
    }

    match addr.rfind(':') {
        // Exactly one colon means IPv4 with port.
        Some(idx) if addr.matches(':').count() == 1 => addr[..idx].to_string(),
        _ => addr.to_string(),
    }
}

/// `https` or `http` as seen by the outermost proxy.
fn protocol(headers: &HeaderMap) -> &str {
    let visitor = header_str(headers, "cf-visitor");
    if !visitor.is_empty() {
        return if visitor.contains("https") { "https" } else { "http" };
    }

    let forwarded = header_str(headers, "x-forwarded-proto");
    if !forwarded.is_empty() {
        return forwarded;
    }

    "http"
}

/// Country code to a representative timezone. Multi-zone countries map to
/// the capital's zone.
const COUNTRY_TIMEZONES: &[(&str, &str)] = &[
    // Southeast Asia
    ("ID", "Asia/Jakarta"),
    ("MY", "Asia/Kuala_Lumpur"),
    ("SG", "Asia/Singapore"),
    ("TH", "Asia/Bangkok"),
    ("VN", "Asia/Ho_Chi_Minh"),
    ("PH", "Asia/Manila"),
    // East Asia
    ("JP", "Asia/Tokyo"),
    ("KR", "Asia/Seoul"),
    ("CN", "Asia/Shanghai"),
    ("TW", "Asia/Taipei"),
    ("HK", "Asia/Hong_Kong"),
    // South Asia
    ("IN", "Asia/Kolkata"),
    ("PK", "Asia/Karachi"),
    ("BD", "Asia/Dhaka"),
    // Middle East
    ("AE", "Asia/Dubai"),
    ("SA", "Asia/Riyadh"),
    ("TR", "Europe/Istanbul"),
    // Europe
    ("GB", "Europe/London"),
    ("DE", "Europe/Berlin"),
    ("FR", "Europe/Paris"),
    ("NL", "Europe/Amsterdam"),
    ("IT", "Europe/Rome"),
    ("ES", "Europe/Madrid"),
    ("RU", "Europe/Moscow"),
    // Americas
    ("US", "America/New_York"),
    ("CA", "America/Toronto"),
    ("MX", "America/Mexico_City"),
    ("BR", "America/Sao_Paulo"),
    ("AR", "America/Buenos_Aires"),
    // Oceania
    ("AU", "Australia/Sydney"),
    ("NZ", "Pacific/Auckland"),
];

/// Look up the estimated timezone for a country code.
pub fn timezone_for_country(country: &str) -> Option<&'static str> {
    COUNTRY_TIMEZONES
        .iter()
        .find(|(code, _)| *code == country)
        .map(|(_, tz)| *tz)
}
