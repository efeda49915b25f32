use std::time::Duration;

use reqwest::StatusCode;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_BODY_IN_ERROR: usize = 500;

/// HTTP client shared by the REST collaborators.
pub(crate) fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// HTTP client for long-lived event streams: no overall timeout.
pub(crate) fn build_streaming_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Readable description of a transport failure. The error's own URL is
/// dropped since it carries the API key or auth token in its query.
pub(crate) fn describe_error(e: reqwest::Error, url: &str, operation: &str) -> String {
    let e = e.without_url();
    if e.is_timeout() {
        format!(
            "Failed to {} for {}: timeout - request took too long",
            operation, url
        )
    } else if e.is_connect() {
        format!(
            "Failed to {} for {}: connection error - check network connectivity. Error: {}",
            operation, url, e
        )
    } else if e.is_decode() {
        format!(
            "Failed to {} for {}: decode error - unexpected response format. Error: {}",
            operation, url, e
        )
    } else {
        format!("Failed to {} for {}: {}", operation, url, e)
    }
}

/// Body text shortened for inclusion in error messages.
pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() > MAX_BODY_IN_ERROR {
        let mut end = MAX_BODY_IN_ERROR;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    }
}

pub(crate) fn status_summary(status: StatusCode, url: &str, body: &str) -> String {
    format!("HTTP {} error from {}: {}", status.as_u16(), url, truncate_body(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let long = "é".repeat(400);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("... (truncated)"));
        assert!(truncated.len() < long.len());

        assert_eq!(truncate_body("short"), "short");
    }
}
