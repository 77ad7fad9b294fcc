use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::{Lazy, OnceCell};
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::logging::Logger;

pub mod user_agent;

/// A singleton instance of the reqwest client.
static CLIENT: OnceCell<Client> = OnceCell::new();

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("http"));

/// Returns the reqwest client singleton instance or creates one if it doesn't exist.
fn get_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        // 已安裝過 provider 時會回傳 Err，可忽略
        let _ = rustls::crypto::ring::default_provider().install_default();

        Client::builder()
            // ===== 壓縮 =====
            .brotli(true)
            .gzip(true)
            .zstd(true)
            // ===== 超時設置 =====
            .connect_timeout(Duration::from_secs(8))
            .timeout(Duration::from_secs(15))
            .tcp_nodelay(true)
            .pool_idle_timeout(Duration::from_secs(90))
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(user_agent::gen_random_ua())
            .build()
            .map_err(|e| anyhow!("Failed to create reqwest client: {:?}", e))
    })
}

/// Performs an HTTP GET request and deserializes the JSON response into the specified type.
///
/// 回應的 content-type 不一定是 application/json，因此一律先取文字再解析。
pub async fn get_json<RES: DeserializeOwned>(url: &str) -> Result<RES> {
    get_json_with_headers(url, None).await
}

/// Same as [`get_json`] with additional request headers (e.g. an `Authorization` bearer token).
pub async fn get_json_with_headers<RES: DeserializeOwned>(
    url: &str,
    headers: Option<header::HeaderMap>,
) -> Result<RES> {
    let response = send(Method::GET, url, headers, None::<fn(RequestBuilder) -> RequestBuilder>).await?;
    parse_json(url, response).await
}

/// Performs an HTTP POST request with form data and deserializes the JSON response.
///
/// # Arguments
///
/// * `url`: The URL to send the POST request to.
/// * `headers`: An optional set of headers to include with the request.
/// * `params`: Form data key-value pairs.
pub async fn post_form_json<RES: DeserializeOwned>(
    url: &str,
    headers: Option<header::HeaderMap>,
    params: HashMap<&str, &str>,
) -> Result<RES> {
    let response = send(
        Method::POST,
        url,
        headers,
        Some(move |rb: RequestBuilder| rb.form(&params)),
    )
    .await?;
    parse_json(url, response).await
}

async fn parse_json<RES: DeserializeOwned>(url: &str, response: Response) -> Result<RES> {
    let body = response
        .text()
        .await
        .with_context(|| format!("Error reading response body from {}", url))?;

    serde_json::from_str(&body).map_err(|e| {
        let preview: String = body.chars().take(256).collect();
        anyhow!("Error parsing response JSON({}): {:?}", preview, e)
    })
}

/// Sends an HTTP request once and fails on a non-2xx status.
///
/// There is no retry; the caller decides whether to try again.
async fn send(
    method: Method,
    url: &str,
    headers: Option<header::HeaderMap>,
    body: Option<impl FnOnce(RequestBuilder) -> RequestBuilder>,
) -> Result<Response> {
    let visit_log = format!("{method}:{url}");
    let client = get_client()?;
    let mut rb = client.request(method, url);

    if let Some(h) = headers {
        rb = rb.headers(h);
    }

    if let Some(body_fn) = body {
        rb = body_fn(rb);
    }

    let start = Instant::now();
    let res = rb.send().await;
    let elapsed = start.elapsed().as_millis();

    match res {
        Ok(response) => {
            let status = response.status();
            LOGGER.info(format!("{} {} {} ms", visit_log, status, elapsed));
            if !status.is_success() {
                return Err(anyhow!("{} responded with status {}", visit_log, status));
            }

            Ok(response)
        }
        Err(why) => {
            LOGGER.error(format!("{} failed because {:?}. {} ms", visit_log, why, elapsed));
            Err(anyhow!("Failed to send request to {}: {:?}", url, why))
        }
    }
}
