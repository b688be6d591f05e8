//! Page fetching.
//!
//! The engine talks to the portal through [`PageFetch`]; the reqwest-backed
//! [`HttpFetcher`] is gated behind the "fetch" feature flag.

#[cfg(feature = "fetch")]
mod http;

#[cfg(feature = "fetch")]
pub use http::HttpFetcher;

use std::time::Duration;

use crate::error::FetchError;

/// HTTP method of a page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One request against the portal.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub url: String,
    pub method: Method,
    /// Query fields for GET, form body for POST.
    pub form: Vec<(String, String)>,
    /// Cookies to echo back in a `Cookie` header.
    pub cookies: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// Overrides the client-wide timeout for this request.
    pub timeout: Option<Duration>,
}

impl PageRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(url.into(), Method::Get)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(url.into(), Method::Post)
    }

    fn new(url: String, method: Method) -> Self {
        Self {
            url,
            method,
            form: Vec::new(),
            cookies: Vec::new(),
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.form.push((name.to_string(), value.into()));
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn cookies(mut self, cookies: &[(String, String)]) -> Self {
        self.cookies.extend(cookies.iter().cloned());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Value of the first form field called `name`.
    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Render `cookies` as a `Cookie` header value.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// A fetched document plus the cookies the server set while serving it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
    pub cookies: Vec<(String, String)>,
}

/// Something that can execute a [`PageRequest`].
///
/// Implementations never retry: a single failure is returned immediately.
pub trait PageFetch {
    fn fetch(&self, request: &PageRequest) -> Result<FetchedPage, FetchError>;
}

impl<T: PageFetch + ?Sized> PageFetch for &T {
    fn fetch(&self, request: &PageRequest) -> Result<FetchedPage, FetchError> {
        (**self).fetch(request)
    }
}
