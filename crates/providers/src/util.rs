//! Small helpers shared by the vendor adapters: transport error mapping,
//! HTTP status classification, and the secret-masking helper used whenever
//! a provider-derived string might carry a raw API key.

use ae_domain::error::Error;

/// Map a `reqwest::Error` (connect/timeout/body) onto our error taxonomy.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::ProviderTimeout(e.to_string())
    } else {
        Error::ProviderTransport(e.to_string())
    }
}

/// Map a non-2xx HTTP response from a vendor into a specific error variant,
/// so the executor's retry logic can tell a transient failure from a
/// permanent one.
pub(crate) fn classify_http_error(
    provider_id: &str,
    status: reqwest::StatusCode,
    body: &str,
) -> Error {
    let masked = mask_secrets(body);
    let message = format!("{provider_id}: HTTP {} - {masked}", status.as_u16());
    match status.as_u16() {
        401 | 403 => Error::ProviderAuth(message),
        429 => Error::ProviderRateLimit(message),
        408 | 504 => Error::ProviderTimeout(message),
        500..=599 => Error::ProviderTransport(message),
        _ => Error::ProviderBadResponse(message),
    }
}

/// Mask substrings that look like API keys or bearer tokens. Prevents raw
/// secrets from leaking into logs or error messages attached to a run.
pub fn mask_secrets(msg: &str) -> String {
    let mut result = msg.to_string();
    for word in msg.split(|c: char| c.is_whitespace() || c == '\'' || c == '"' || c == ',') {
        let trimmed = word.trim();
        if trimmed.len() >= 20
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            let masked = if trimmed.len() > 8 {
                format!("{}...{}", &trimmed[..4], &trimmed[trimmed.len() - 4..])
            } else {
                "***masked***".to_string()
            };
            result = result.replace(trimmed, &masked);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_long_token_like_strings() {
        let msg = "auth failed for key sk-ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
        let masked = mask_secrets(msg);
        assert!(!masked.contains("ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789"));
        assert!(masked.contains("sk-A"));
    }

    #[test]
    fn leaves_short_words_alone() {
        let msg = "bad request: model not found";
        assert_eq!(mask_secrets(msg), msg);
    }
}
