// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;
use crate::models::ProxyEndpoint;

/// Create an asynchronous HTTP client, optionally routed through a proxy.
pub fn create_async_client(
    user_agent: &str,
    timeout: Duration,
    proxy: Option<&ProxyEndpoint>,
) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout);

    if let Some(proxy) = proxy {
        let mut route = reqwest::Proxy::all(proxy.server_url())?;
        if let Some((login, password)) = proxy.credentials() {
            route = route.basic_auth(login, password);
        }
        builder = builder.proxy(route);
    }

    Ok(builder.build()?)
}

/// Download a body as bytes, failing on non-success status codes.
pub async fn fetch_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}
