//! reqwest-backed page fetcher.

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::COOKIE;
use tracing::debug;
use url::Url;

use super::{FetchedPage, Method, PageFetch, PageRequest};
use crate::config::PortalConfig;
use crate::error::FetchError;

/// Fetches portal pages with a browser-like identity and fixed timeouts.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &PortalConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self { client })
    }

    fn build(&self, request: &PageRequest, url: &Url) -> RequestBuilder {
        let mut builder = match request.method {
            Method::Get => self.client.get(url.as_str()).query(&request.form),
            Method::Post => self.client.post(url.as_str()).form(&request.form),
        };
        if let Some(cookie) = request.cookie_header() {
            builder = builder.header(COOKIE, cookie);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }
}

impl PageFetch for HttpFetcher {
    fn fetch(&self, request: &PageRequest) -> Result<FetchedPage, FetchError> {
        let url = Url::parse(&request.url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        debug!(url = %url, method = ?request.method, "fetching portal page");

        let response = self.build(request, &url).send().map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let final_url = response.url().to_string();
        let cookies: Vec<(String, String)> = response
            .cookies()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();

        let html = response
            .text()
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        Ok(FetchedPage {
            url: final_url,
            html,
            cookies,
        })
    }
}

fn transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(e.to_string())
    } else {
        FetchError::Network(e.to_string())
    }
}
