//! Shared utility functions for provider adapters.

use sc_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// POST `body` as JSON and return the decoded JSON reply, mapping non-2xx
/// statuses to [`Error::Provider`].
pub(crate) async fn post_json(
    request: reqwest::RequestBuilder,
    provider: &str,
    body: &serde_json::Value,
) -> Result<serde_json::Value> {
    let resp = request.json(body).send().await.map_err(from_reqwest)?;
    let status = resp.status();
    let text = resp.text().await.map_err(from_reqwest)?;

    if !status.is_success() {
        return Err(Error::Provider {
            provider: provider.into(),
            message: format!("HTTP {} - {}", status.as_u16(), text),
        });
    }

    Ok(serde_json::from_str(&text)?)
}
