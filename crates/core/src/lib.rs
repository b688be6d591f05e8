pub mod catalog;
pub mod config;
pub mod dom;
pub mod error;
pub mod fetch;
pub mod legacy;
pub mod listing;
pub mod meta;
pub mod model;
pub mod portal;
pub mod schema;
pub mod select;
pub mod swagger;

pub use catalog::{
    CatalogError, CatalogRecord, CatalogService, CatalogStore, LocalFilter, MemoryCatalogStore,
};
pub use config::PortalConfig;
pub use error::{ConfigError, FetchError, SchemaError};
pub use model::{CatalogSummary, DetailResult, OperationInfo, ParameterInfo, SearchResultPage};
pub use portal::{CatalogClient, DetailPath};

/// Extract a search-results page from markup already in hand.
/// This is the offline entry point for listing pages.
pub fn parse_listing(html: &str, page_number: u32, page_size: u32) -> SearchResultPage {
    listing::parse_listing(html, page_number, page_size)
}

/// Extract a detail page from markup already in hand, without follow-up
/// calls: the embedded specification when it is usable, else the page markup.
pub fn parse_detail(html: &str, catalog_id: &str, config: &PortalConfig) -> DetailResult {
    let page = meta::Page::parse(html);
    match swagger::extract(&page, catalog_id) {
        Ok(result) => result,
        Err(_) => legacy::parse_page(page, catalog_id, config.api_host().as_deref()),
    }
}
