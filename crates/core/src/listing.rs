//! Search-results page extraction.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::config::PortalConfig;
use crate::dom::DomNode;
use crate::fetch::PageRequest;
use crate::meta::{self, Page, LABEL_CATEGORY, LABEL_DESCRIPTION, LABEL_PROVIDER};
use crate::model::{CatalogSummary, SearchResultPage, SERVICE_TYPE_REST};

/// Result-list containers, most specific first. The first that yields any
/// `li` wins.
const ITEM_SELECTORS: &[&str] = &[
    ".result-list li",
    ".dataset-list li",
    ".data-list li",
    "#apiDataList li",
    ".resultList li",
];

const COUNT_SELECTOR: &str = ".result-count, .search-result-count, .result_num";
const TAB_SELECTOR: &str = ".tab, .tabmenu a, [data-dtype]";
const LINK_SELECTOR: &str = "a[href*=openapi.do], a[href*=publicDataPk]";
const TITLE_SELECTOR: &str = "h3, h4, .title, .data-title";
const DESCRIPTION_SELECTOR: &str = ".publicDataDesc, .desc, .data-desc, p";
const ORG_SELECTOR: &str = ".org, .agency";
const CATEGORY_SELECTOR: &str = ".brm, .category";

type CountStrategy = fn(&Page<'_>) -> Option<u64>;

/// Total-count strategies in priority order. Only a positive count is a hit.
const COUNT_STRATEGIES: &[(&str, CountStrategy)] = &[
    ("count element", count_from_element),
    ("api tab", count_from_tab),
    ("largest count in text", count_from_text),
];

/// Build the search request for one results page.
pub fn listing_request(
    config: &PortalConfig,
    page_number: u32,
    page_size: u32,
    keyword: &str,
    category: Option<&str>,
) -> PageRequest {
    let mut request = PageRequest::get(config.search_url())
        .field("type", "API")
        .field("serviceType", SERVICE_TYPE_REST)
        .field("keyword", keyword)
        .field("currentPage", page_number.to_string())
        .field("perPage", page_size.to_string())
        .field("sort", "updtDt");
    if let Some(category) = category.map(str::trim).filter(|c| !c.is_empty()) {
        request = request.field("brm", category);
    }
    request
}

/// Extract a results page. Never fails: a page with no recognizable
/// structure yields no items and a zero total.
pub fn parse_listing(html: &str, page_number: u32, page_size: u32) -> SearchResultPage {
    let page = Page::parse(html);

    let total_count = match meta::first_match(&page, COUNT_STRATEGIES) {
        Some((strategy, count)) => {
            debug!(strategy, count, "total count found");
            count
        }
        None => 0,
    };

    let items: Vec<CatalogSummary> = result_items(&page.dom)
        .into_iter()
        .filter_map(summary_from_item)
        .collect();

    SearchResultPage {
        items,
        total_count,
        page_number,
        page_size,
    }
}

fn count_from_element(page: &Page<'_>) -> Option<u64> {
    page.dom
        .select_first(COUNT_SELECTOR)
        .and_then(|el| meta::digits_only(&el.text_content()))
        .filter(|n| *n > 0)
}

fn count_from_tab(page: &Page<'_>) -> Option<u64> {
    page.dom
        .select(TAB_SELECTOR)
        .into_iter()
        .map(DomNode::text_content)
        .filter(|text| text.contains("API"))
        .find_map(|text| meta::digits_only(&text))
        .filter(|n| *n > 0)
}

/// Largest `<number>건` anywhere in the page. This can pick up an unrelated
/// figure; it is only consulted when nothing more specific matched.
fn count_from_text(page: &Page<'_>) -> Option<u64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(\d[\d,]*)\s*건").expect("count regex is valid"));

    re.captures_iter(&page.text)
        .filter_map(|c| c.get(1))
        .filter_map(|m| m.as_str().replace(',', "").parse::<u64>().ok())
        .max()
        .filter(|n| *n > 0)
}

fn result_items(dom: &DomNode) -> Vec<&DomNode> {
    for selector in ITEM_SELECTORS {
        let items = dom.select(selector);
        if !items.is_empty() {
            debug!(selector, count = items.len(), "result list matched");
            return items;
        }
    }

    let fallback: Vec<&DomNode> = dom
        .select("li")
        .into_iter()
        .filter(|li| li.select_first("a[href*=openapi.do]").is_some())
        .collect();
    debug!(count = fallback.len(), "no result list container, using linked items");
    fallback
}

fn summary_from_item(item: &DomNode) -> Option<CatalogSummary> {
    let link = item.select_first(LINK_SELECTOR)?;
    let id = catalog_id_from_href(link.get_attr("href")?)?;

    let name = link.text_opt().or_else(|| first_text(item, TITLE_SELECTOR));
    let item_text = item.text_content();

    Some(CatalogSummary {
        id,
        name,
        description: first_text(item, DESCRIPTION_SELECTOR)
            .or_else(|| meta::scan_field_label(&item_text, LABEL_DESCRIPTION)),
        provider_org: first_text(item, ORG_SELECTOR)
            .or_else(|| meta::scan_field_label(&item_text, LABEL_PROVIDER)),
        category: first_text(item, CATEGORY_SELECTOR)
            .or_else(|| meta::scan_field_label(&item_text, LABEL_CATEGORY)),
        data_format: meta::format_tag(&item_text, ","),
        service_type: SERVICE_TYPE_REST.to_string(),
        endpoint_url: None,
    })
}

/// The numeric id in a `/data/<digits>/openapi.do` link.
pub fn catalog_id_from_href(href: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"/data/(\d+)/openapi\.do").expect("id regex is valid"));

    re.captures(href)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn first_text(scope: &DomNode, selector: &str) -> Option<String> {
    scope.select_first(selector).and_then(DomNode::text_opt)
}
