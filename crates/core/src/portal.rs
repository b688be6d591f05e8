//! Engine facade: the two calls the rest of the system makes.

use tracing::{debug, info, warn};

use crate::config::PortalConfig;
use crate::error::FetchError;
use crate::fetch::{PageFetch, PageRequest};
use crate::legacy;
use crate::listing;
use crate::meta::Page;
use crate::model::{DetailResult, SearchResultPage};
use crate::swagger::{self, SpecMiss};

/// Which extractor produced a detail result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailPath {
    Specification,
    Legacy,
}

/// Search and detail extraction against one portal.
///
/// Holds no state between calls beyond the fetcher and configuration; two
/// calls with the same inputs against the same upstream content return equal
/// results.
pub struct CatalogClient<F> {
    fetcher: F,
    config: PortalConfig,
}

#[cfg(feature = "fetch")]
impl CatalogClient<crate::fetch::HttpFetcher> {
    /// A client that talks to the live portal over HTTP.
    pub fn new(config: PortalConfig) -> Result<Self, FetchError> {
        let fetcher = crate::fetch::HttpFetcher::new(&config)?;
        Ok(Self::with_fetcher(fetcher, config))
    }
}

impl<F: PageFetch> CatalogClient<F> {
    pub fn with_fetcher(fetcher: F, config: PortalConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// Fetch and extract one page of search results.
    pub fn search_listing(
        &self,
        page_number: u32,
        page_size: u32,
        keyword: &str,
        category: Option<&str>,
    ) -> Result<SearchResultPage, FetchError> {
        let request =
            listing::listing_request(&self.config, page_number, page_size, keyword, category);
        let page = self.fetcher.fetch(&request)?;
        let result = listing::parse_listing(&page.html, page_number, page_size);

        info!(
            page = page_number,
            items = result.items.len(),
            total = result.total_count,
            "search listing extracted"
        );
        Ok(result)
    }

    /// Fetch and extract one catalog entry's detail page.
    pub fn fetch_detail(&self, catalog_id: &str) -> Result<DetailResult, FetchError> {
        self.fetch_detail_traced(catalog_id).map(|(result, _)| result)
    }

    /// As [`fetch_detail`](Self::fetch_detail), also reporting which extractor ran.
    pub fn fetch_detail_traced(
        &self,
        catalog_id: &str,
    ) -> Result<(DetailResult, DetailPath), FetchError> {
        let request = PageRequest::get(self.config.detail_url(catalog_id));
        let detail = self.fetcher.fetch(&request)?;

        let page = Page::parse(&detail.html);
        match swagger::extract(&page, catalog_id) {
            Ok(result) => {
                info!(
                    catalog_id,
                    operations = result.operations.len(),
                    "detail extracted from embedded specification"
                );
                return Ok((result, DetailPath::Specification));
            }
            Err(miss @ SpecMiss::InvalidJson(_)) => {
                warn!(catalog_id, reason = %miss, "embedded specification unusable, falling back");
            }
            Err(miss) => debug!(catalog_id, reason = %miss, "no specification, using page markup"),
        }

        let result = legacy::extract(
            &self.fetcher,
            &self.config,
            page,
            &detail.cookies,
            catalog_id,
        );
        info!(
            catalog_id,
            operations = result.operations.len(),
            "detail extracted from page markup"
        );
        Ok((result, DetailPath::Legacy))
    }
}
