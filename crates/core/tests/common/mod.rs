//! A scripted stand-in for the portal.

use std::cell::RefCell;
use std::collections::HashMap;

use govcat_core::fetch::{FetchedPage, Method, PageFetch, PageRequest};
use govcat_core::FetchError;

/// Serves canned pages: GET requests by URL, POST requests by the
/// `oprtinSeqNo` form field. Anything unknown is a 404.
#[derive(Default)]
pub struct StubPortal {
    pages: HashMap<String, Result<String, u16>>,
    functions: HashMap<String, Result<String, u16>>,
    cookies: Vec<(String, String)>,
    pub requests: RefCell<Vec<PageRequest>>,
}

#[allow(dead_code)]
impl StubPortal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(html.to_string()));
        self
    }

    pub fn failing_page(mut self, url: &str, status: u16) -> Self {
        self.pages.insert(url.to_string(), Err(status));
        self
    }

    pub fn function(mut self, seq: &str, html: &str) -> Self {
        self.functions.insert(seq.to_string(), Ok(html.to_string()));
        self
    }

    pub fn failing_function(mut self, seq: &str, status: u16) -> Self {
        self.functions.insert(seq.to_string(), Err(status));
        self
    }

    pub fn set_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push((name.to_string(), value.to_string()));
        self
    }

    pub fn posts(&self) -> Vec<PageRequest> {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.method == Method::Post)
            .cloned()
            .collect()
    }
}

impl PageFetch for StubPortal {
    fn fetch(&self, request: &PageRequest) -> Result<FetchedPage, FetchError> {
        self.requests.borrow_mut().push(request.clone());

        let entry = match request.method {
            Method::Get => self.pages.get(&request.url),
            Method::Post => request
                .form_value("oprtinSeqNo")
                .and_then(|seq| self.functions.get(seq)),
        };
        match entry {
            Some(Ok(html)) => Ok(FetchedPage {
                url: request.url.clone(),
                html: html.clone(),
                cookies: self.cookies.clone(),
            }),
            Some(Err(status)) => Err(FetchError::Status(*status)),
            None => Err(FetchError::Status(404)),
        }
    }
}
