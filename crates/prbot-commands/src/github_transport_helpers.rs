use std::time::Duration;

const RETRY_DELAY_MAX_MS: u64 = 30_000;
const RETRY_DELAY_MAX_EXPONENT: u32 = 10;

/// Read a `retry-after` header expressed in whole seconds.
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Delay before retry `attempt` (1-based): the server hint when present, else capped doubling.
pub fn retry_delay(base_delay_ms: u64, attempt: usize, retry_after: Option<Duration>) -> Duration {
    if let Some(delay) = retry_after {
        return delay.max(Duration::from_millis(base_delay_ms));
    }
    let exponent = u32::try_from(attempt.saturating_sub(1))
        .unwrap_or(RETRY_DELAY_MAX_EXPONENT)
        .min(RETRY_DELAY_MAX_EXPONENT);
    let scaled = base_delay_ms.saturating_mul(2_u64.saturating_pow(exponent));
    Duration::from_millis(scaled.min(RETRY_DELAY_MAX_MS))
}

pub fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

pub fn is_retryable_github_status(status: u16) -> bool {
    status == 429 || status >= 500
}

pub fn truncate_for_error(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}...", &text[..cut]),
    }
}
