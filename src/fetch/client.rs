//! Async HTTP client wrapping reqwest.
//!
//! Not a browser — just GET requests with redirects, timeouts, a single
//! jittered retry on transport errors, and backoff on 429. Server errors
//! are returned as-is; relay rotation is the caller's recovery path.

use rand::Rng;
use std::time::Duration;

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Original requested URL.
    pub url: String,
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client the fetch pipeline talks through.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    /// HTTP/1.1-only fallback client for relays that reject HTTP/2.
    h1_client: reqwest::Client,
    timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client with a standard Chrome user-agent.
    pub fn new(timeout_secs: u64) -> Self {
        let ua = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                  AppleWebKit/537.36 (KHTML, like Gecko) \
                  Chrome/131.0.0.0 Safari/537.36";
        let timeout = Duration::from_secs(timeout_secs);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(ua)
            .build()
            .unwrap_or_default();

        let h1_client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(ua)
            .http1_only()
            .build()
            .unwrap_or_default();

        Self {
            client,
            h1_client,
            timeout,
        }
    }

    /// Perform a GET request. Transport failures get one jittered retry;
    /// 429 waits out Retry-After (capped) once. Any received response,
    /// including 4xx/5xx, is returned for the caller to judge.
    ///
    /// Falls back to HTTP/1.1 on protocol errors (some CDNs reject HTTP/2).
    pub async fn get_text(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        match self.get_inner(&self.client, url).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                let err_str = format!("{e}");
                if err_str.contains("http2")
                    || err_str.contains("protocol")
                    || err_str.contains("connection closed")
                {
                    tracing::debug!("retrying {url} over HTTP/1.1");
                    self.get_inner(&self.h1_client, url).await
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn get_inner(
        &self,
        client: &reqwest::Client,
        url: &str,
    ) -> Result<HttpResponse, reqwest::Error> {
        let mut retried = false;

        loop {
            let resp = client.get(url).timeout(self.timeout).send().await;

            match resp {
                Ok(r) => {
                    let status = r.status().as_u16();

                    if status == 429 && !retried {
                        retried = true;
                        let retry_after = r
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(2);
                        let delay = Duration::from_secs(retry_after.min(10));
                        tracing::debug!("429 from {url}, backing off {delay:?}");
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    let final_url = r.url().to_string();
                    let body = r.text().await.unwrap_or_default();

                    return Ok(HttpResponse {
                        url: url.to_string(),
                        final_url,
                        status,
                        body,
                    });
                }
                Err(e) => {
                    if !retried {
                        retried = true;
                        let jitter = rand::thread_rng().gen_range(0..250);
                        tokio::time::sleep(Duration::from_millis(500 + jitter)).await;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }
}
