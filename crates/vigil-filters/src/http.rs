use vigil_core::FirewallError;

/// Fetches `url` as text under `ctx`'s deadline, mapping any transport or
/// status failure to `FEED_FETCH`. Used by every line-oriented feed filter
/// (subnet, domain, ASN, JA3).
pub async fn fetch_text(
    client: &reqwest::Client,
    url: &str,
    timeout: std::time::Duration,
) -> Result<String, FirewallError> {
    let resp = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|err| FirewallError::FeedFetch {
            source: url.to_string(),
            cause: Box::new(err),
        })?
        .error_for_status()
        .map_err(|err| FirewallError::FeedFetch {
            source: url.to_string(),
            cause: Box::new(err),
        })?;

    resp.text().await.map_err(|err| FirewallError::FeedFetch {
        source: url.to_string(),
        cause: Box::new(err),
    })
}

/// Fetches `url` as raw bytes, for archive-backed feeds (the geo zip).
pub async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
    timeout: std::time::Duration,
) -> Result<Vec<u8>, FirewallError> {
    let resp = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|err| FirewallError::FeedFetch {
            source: url.to_string(),
            cause: Box::new(err),
        })?
        .error_for_status()
        .map_err(|err| FirewallError::FeedFetch {
            source: url.to_string(),
            cause: Box::new(err),
        })?;

    resp.bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|err| FirewallError::FeedFetch {
            source: url.to_string(),
            cause: Box::new(err),
        })
}
