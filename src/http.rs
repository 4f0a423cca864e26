//! Shared plumbing for the outbound HTTP clients.

use tracing::warn;

/// Maximum characters of an upstream error body kept for logs and errors.
const ERROR_BODY_LIMIT: usize = 256;

/// Pass a successful response through; otherwise read the body and return
/// the status with a sanitized excerpt for the caller's error type.
pub async fn require_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, (reqwest::StatusCode, String)> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = %status, "upstream returned error status");
    Err((status, sanitize_error_body(&body)))
}

/// Scrub credential-looking fields from an error body and cap its length.
///
/// Error bodies end up in logs and error messages, and some proxies echo
/// request headers back.
pub fn sanitize_error_body(body: &str) -> String {
    static SECRET_FIELD: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let pattern = SECRET_FIELD.get_or_init(|| {
        regex::Regex::new(r#"(?i)("?(?:x-)?(?:goog-)?api[-_]?key"?\s*[:=]\s*)"?[^"\s,}]+"?"#)
            .expect("static pattern compiles")
    });
    let scrubbed = pattern.replace_all(body, "${1}[redacted]");
    let mut excerpt: String = scrubbed.chars().take(ERROR_BODY_LIMIT).collect();
    if scrubbed.chars().count() > ERROR_BODY_LIMIT {
        excerpt.push_str("...");
    }
    excerpt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_scrubs_api_key_fields() {
        let body = r#"{"error":"forbidden","x-api-key":"dev-secret-demo"}"#;
        let sanitized = sanitize_error_body(body);
        assert!(!sanitized.contains("dev-secret-demo"));
        assert!(sanitized.contains("[redacted]"));
    }

    #[test]
    fn test_sanitize_scrubs_goog_header_echo() {
        let body = "x-goog-api-key: AIzaSyFakeKey123";
        let sanitized = sanitize_error_body(body);
        assert!(!sanitized.contains("AIzaSyFakeKey123"));
    }

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(1_000);
        let sanitized = sanitize_error_body(&body);
        assert!(sanitized.chars().count() <= 300);
        assert!(sanitized.ends_with("..."));
    }

    #[test]
    fn test_sanitize_leaves_short_plain_bodies_alone() {
        assert_eq!(sanitize_error_body("upstream timeout"), "upstream timeout");
    }
}
