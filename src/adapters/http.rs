use crate::utils::error::SourceError;
use reqwest::{Client, RequestBuilder};
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder().timeout(timeout).build()
}

/// Host part of a URL, or the input unchanged when it does not parse.
pub fn host_of(endpoint: &str) -> String {
    url::Url::parse(endpoint)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| endpoint.to_string())
}

/// Sends the request and decodes a JSON body. Non-2xx answers are
/// `SourceUnavailable`; a body that is not JSON is `SchemaMismatch`.
pub async fn get_json(
    request: RequestBuilder,
    source: &str,
) -> Result<serde_json::Value, SourceError> {
    let response = request.send().await?;
    let status = response.status();
    tracing::debug!(source, "API response status: {}", status);

    if !status.is_success() {
        return Err(SourceError::unavailable(format!(
            "{} answered HTTP {}",
            source, status
        )));
    }

    Ok(response.json::<serde_json::Value>().await?)
}

/// Reads a JSON field that some APIs send as a string and others as a number.
pub fn string_or_number(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads a price field sent as an integer, a float, or a numeric string.
pub fn price_value(value: Option<&serde_json::Value>) -> Option<u64> {
    match value? {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.round() as u64)),
        serde_json::Value::String(s) => crate::utils::text::parse_price(s),
        _ => None,
    }
}
