// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test data generators for abuse simulation.

use form_intake::models::FieldMap;
use serde_json::{json, Value};

pub const BROWSER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/126.0 Safari/537.36";

/// Generate a pool of client addresses for testing.
pub fn generate_ips(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = (i >> 16) & 0xFF;
            let b = (i >> 8) & 0xFF;
            let c = i & 0xFF;
            format!("10.{a}.{b}.{c}")
        })
        .collect()
}

/// User agents sent by scripts and crawlers.
pub fn generate_bot_agents() -> Vec<&'static str> {
    vec![
        "curl/8.5.0",
        "python-requests/2.31",
        "Wget/1.21.4",
        "Scrapy/2.11 (+https://scrapy.org)",
        "Mozilla/5.0 (compatible; Googlebot/2.1)",
        "Mozilla/5.0 HeadlessChrome/120.0",
    ]
}

fn object(value: Value) -> FieldMap {
    match value {
        Value::Object(map) => map,
        _ => FieldMap::new(),
    }
}

/// An ordinary contact form submission.
pub fn human_fields(i: usize) -> FieldMap {
    object(json!({
        "name": format!("Visitor {i}"),
        "email": format!("visitor{i}@example.com"),
        "message": "Hello, I would like to know more about your service.",
    }))
}

/// A submission that fills one of the default honeypot fields.
pub fn honeypot_fields(i: usize) -> FieldMap {
    let traps = ["_honeypot", "_hp", "website", "url", "fax"];
    let mut fields = human_fields(i);
    fields.insert(
        traps[i % traps.len()].to_string(),
        Value::String("http://cheap-pills.example".to_string()),
    );
    fields
}

/// A message stuffed with links.
pub fn link_spam_fields(i: usize) -> FieldMap {
    let mut fields = human_fields(i);
    fields.insert(
        "message".to_string(),
        Value::String(
            "http://a.example http://b.example http://c.example http://d.example".to_string(),
        ),
    );
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ips() {
        let ips = generate_ips(256);
        assert_eq!(ips.len(), 256);
        // All should be unique
        let unique: std::collections::HashSet<_> = ips.iter().collect();
        assert_eq!(unique.len(), 256);
    }

    #[test]
    fn test_honeypot_rotation() {
        assert!(honeypot_fields(0).contains_key("_honeypot"));
        assert!(honeypot_fields(2).contains_key("website"));
    }
}
