//! Extraction from detail pages that carry no embedded specification document.
//!
//! Metadata and request parameters come from the page itself (markup and
//! inline scripts). Response fields only exist behind a per-operation AJAX
//! endpoint, queried once per operation that has a sequence token.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::PortalConfig;
use crate::dom::{self, DomNode};
use crate::fetch::{PageFetch, PageRequest};
use crate::meta::{
    self, Page, LABEL_API_TYPE, LABEL_CATEGORY, LABEL_DATA_FORMAT, LABEL_PROVIDER,
};
use crate::model::{non_blank, DetailResult, OperationInfo, ParameterInfo, SERVICE_TYPE_REST};

const HEADING_SELECTOR: &str = "h3.tit, .tit, h2";
const OPERATION_OPTION_SELECTOR: &str = "#open_api_detail_select option, select[name*=oprtin] option";
const URL_INPUT_SELECTOR: &str = "input[name=serviceUrl], input[name=endpointUrl]";
const DEFAULT_OPERATION_NAME: &str = "Default Operation";

/// Words that mark a table in the function detail fragment as describing the
/// response rather than the request.
const RESPONSE_MARKERS: &[&str] = &["출력", "응답", "Response", "결과"];

/// A legacy detail page plus the API host its absolute URLs are matched against.
struct DetailPage<'a> {
    page: Page<'a>,
    api_host: Option<String>,
}

type UrlStrategy = fn(&DetailPage<'_>) -> Option<String>;

const SERVICE_URL_STRATEGIES: &[(&str, UrlStrategy)] = &[
    ("script operation url", url_from_script),
    ("labelled url in text", url_from_label),
    ("url input", url_from_input),
    ("api host url in markup", url_under_api_host),
];

/// Fetch the response fields for every operation and return the finished
/// result. `cookies` are the ones the detail page set. Follow-up failures are
/// logged and leave that operation as it was.
pub fn extract<F: PageFetch>(
    fetcher: &F,
    config: &PortalConfig,
    page: Page<'_>,
    cookies: &[(String, String)],
    catalog_id: &str,
) -> DetailResult {
    let api_host = config.api_host();
    let mut result = parse_page(page, catalog_id, api_host.as_deref());
    fetch_function_details(fetcher, config, catalog_id, cookies, &mut result.operations);
    result
}

/// Everything recoverable from the detail page alone, without follow-up calls.
pub fn parse_detail_page(html: &str, catalog_id: &str, api_host: Option<&str>) -> DetailResult {
    parse_page(Page::parse(html), catalog_id, api_host)
}

/// As [`parse_detail_page`], over a page that is already parsed.
pub fn parse_page(page: Page<'_>, catalog_id: &str, api_host: Option<&str>) -> DetailResult {
    let html = page.html;
    let detail = DetailPage {
        page,
        api_host: api_host.map(str::to_string),
    };
    let dom = &detail.page.dom;
    let text = &detail.page.text;

    let heading = dom.select_first(HEADING_SELECTOR).and_then(DomNode::text_opt);
    let name = heading
        .as_deref()
        .and_then(|h| non_blank(meta::cut_at(h, '|')))
        .or_else(|| {
            dom.title()
                .and_then(|t| non_blank(meta::cut_at(meta::cut_at(&t, '|'), '-')))
        });

    let pairs = meta::label_pairs(dom);
    let provider_org = meta::label_value(&pairs, LABEL_PROVIDER)
        .or_else(|| meta::scan_field_label(text, LABEL_PROVIDER));
    let category = meta::label_value(&pairs, LABEL_CATEGORY);
    let api_type = meta::label_value(&pairs, LABEL_API_TYPE)
        .unwrap_or_else(|| SERVICE_TYPE_REST.to_string());
    let data_format =
        meta::label_value(&pairs, LABEL_DATA_FORMAT).or_else(|| meta::format_tag(text, "+"));

    let description = dom
        .select_first("meta[name=description]")
        .and_then(|m| m.get_attr("content"))
        .and_then(non_blank);

    let service_url = SERVICE_URL_STRATEGIES
        .iter()
        .find_map(|(strategy, find)| {
            find(&detail).map(|url| {
                debug!(strategy, url = %url, "service url found");
                url
            })
        });

    let mut operations = operations_from_selector(dom, service_url.as_deref());
    if operations.is_empty() {
        let op_name = heading
            .or_else(|| name.clone())
            .unwrap_or_else(|| DEFAULT_OPERATION_NAME.to_string());
        operations.push(OperationInfo {
            endpoint_url: service_url.clone(),
            seq_token: script_variable(html, script_seq_regex()),
            ..OperationInfo::new(op_name)
        });
    }

    let script_params = script_parameters(html);
    debug!(count = script_params.len(), "request parameters from page script");
    if let Some(first) = operations.first_mut() {
        first.request_params.extend(script_params);
    }

    DetailResult {
        id: catalog_id.to_string(),
        name,
        provider_org,
        category,
        api_type: Some(api_type),
        data_format,
        description,
        service_url,
        operations,
    }
}

fn operations_from_selector(dom: &DomNode, service_url: Option<&str>) -> Vec<OperationInfo> {
    dom.select(OPERATION_OPTION_SELECTOR)
        .into_iter()
        .filter_map(|option| {
            let seq = option.get_attr("value").and_then(non_blank)?;
            Some(OperationInfo {
                endpoint_url: service_url.map(str::to_string),
                seq_token: Some(seq),
                ..OperationInfo::new(option.text_content())
            })
        })
        .collect()
}

fn url_from_script(detail: &DetailPage<'_>) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"oprtinUrl\s*=\s*"([^"]+)""#).expect("operation url regex is valid")
    });
    script_variable(detail.page.html, re)
}

fn url_from_label(detail: &DetailPage<'_>) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"(?:서비스URL|요청주소|EndPoint)[\s:]*?(https?://[^\s"'<>]+)"#)
            .expect("labelled url regex is valid")
    });
    re.captures(&detail.page.text)
        .and_then(|c| c.get(1))
        .and_then(|m| non_blank(m.as_str()))
}

fn url_from_input(detail: &DetailPage<'_>) -> Option<String> {
    detail
        .page
        .dom
        .select_first(URL_INPUT_SELECTOR)
        .and_then(|input| input.get_attr("value"))
        .and_then(non_blank)
}

fn url_under_api_host(detail: &DetailPage<'_>) -> Option<String> {
    let host = detail.api_host.as_deref()?;
    let re = Regex::new(&format!(r#"(https?://{}[^\s"'<>]+)"#, regex::escape(host))).ok()?;
    re.captures(detail.page.html)
        .and_then(|c| c.get(1))
        .and_then(|m| non_blank(m.as_str()))
}

fn script_seq_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"oprtinSeqNo\s*=\s*"(\d+)""#).expect("sequence regex is valid")
    })
}

fn script_variable(html: &str, re: &Regex) -> Option<String> {
    re.captures(html)
        .and_then(|c| c.get(1))
        .and_then(|m| non_blank(m.as_str()))
}

/// Parameters declared as `var paramObj = {}; paramObj.x = "..."; ...
/// paramList.push(paramObj);` blocks in the page scripts.
pub fn script_parameters(html: &str) -> Vec<ParameterInfo> {
    static BLOCK: OnceLock<Regex> = OnceLock::new();
    static PROP: OnceLock<Regex> = OnceLock::new();
    let block_re = BLOCK.get_or_init(|| {
        Regex::new(r"(?s)var\s+paramObj\s*=\s*\{\}\s*;(.*?)paramList\.push\(paramObj\)\s*;")
            .expect("parameter block regex is valid")
    });
    let prop_re = PROP.get_or_init(|| {
        Regex::new(r#"paramObj\.(\w+)\s*=\s*"([^"]*)""#).expect("parameter property regex is valid")
    });

    block_re
        .captures_iter(html)
        .filter_map(|block| {
            let body = block.get(1)?.as_str();
            let props: HashMap<&str, &str> = prop_re
                .captures_iter(body)
                .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
                .collect();
            if props.is_empty() {
                return None;
            }
            let prop = |key: &str| props.get(key).copied().and_then(non_blank);
            Some(ParameterInfo {
                name_kor: prop("paramtrKorNm"),
                name_eng: prop("paramtrNm"),
                size: prop("paramtrSize"),
                division: prop("paramtrDivision"),
                sample: prop("paramtrBassValue"),
                description: prop("paramtrDc"),
            })
        })
        .filter(|p| !p.is_nameless())
        .collect()
}

/// The AJAX request that returns one operation's parameter tables.
pub fn function_detail_request(
    config: &PortalConfig,
    catalog_id: &str,
    seq_token: &str,
    cookies: &[(String, String)],
) -> PageRequest {
    PageRequest::post(config.detail_function_url())
        .field("oprtinSeqNo", seq_token)
        .field("publicDataPk", catalog_id)
        .field("publicDataDetailPk", catalog_id)
        .cookies(cookies)
        .header("X-Requested-With", "XMLHttpRequest")
        .header("Referer", config.detail_url(catalog_id))
        .timeout(config.read_timeout())
}

/// Run the follow-up call for every operation that has a sequence token, in
/// order. A failed call is logged and skipped.
pub fn fetch_function_details<F: PageFetch>(
    fetcher: &F,
    config: &PortalConfig,
    catalog_id: &str,
    cookies: &[(String, String)],
    operations: &mut [OperationInfo],
) {
    for op in operations.iter_mut() {
        let Some(seq) = op.seq_token.clone() else {
            continue;
        };
        let request = function_detail_request(config, catalog_id, &seq, cookies);
        match fetcher.fetch(&request) {
            Ok(page) => {
                parse_function_tables(&page.html, op);
                debug!(
                    seq = %seq,
                    request = op.request_params.len(),
                    response = op.response_fields.len(),
                    "function detail parsed"
                );
            }
            Err(e) => warn!(seq = %seq, catalog_id, error = %e, "function detail fetch failed, skipping"),
        }
    }
}

/// Merge the parameter tables of a function detail fragment into `op`.
///
/// A table describes the response when the text just before it (its previous
/// sibling, else its parent's previous sibling, else its caption) mentions a
/// response marker. Request rows whose English name is already present are
/// dropped.
pub fn parse_function_tables(html: &str, op: &mut OperationInfo) {
    let dom = dom::parse_html(html);

    let mut tables: Vec<(&DomNode, bool)> = Vec::new();
    dom.walk(&mut |ctx| {
        if ctx.node.tag != "table" {
            return;
        }
        let context = ctx
            .prev_sibling
            .and_then(DomNode::text_opt)
            .or_else(|| ctx.parent_prev_sibling.and_then(DomNode::text_opt))
            .or_else(|| ctx.node.select_first("caption").and_then(DomNode::text_opt))
            .unwrap_or_default();
        let is_response = RESPONSE_MARKERS.iter().any(|m| context.contains(m));
        tables.push((ctx.node, is_response));
    });

    for (table, is_response) in tables {
        for row in table.select("tr") {
            let Some(param) = row_parameter(row) else {
                continue;
            };
            if is_response {
                op.response_fields.push(param);
            } else {
                let duplicate = param.name_eng.is_some()
                    && op.request_params.iter().any(|p| p.name_eng == param.name_eng);
                if !duplicate {
                    op.request_params.push(param);
                }
            }
        }
    }
}

/// Cells map positionally to Korean name, English name, size, division,
/// sample and description.
fn row_parameter(row: &DomNode) -> Option<ParameterInfo> {
    let cells: Vec<&DomNode> = row.element_children().filter(|c| c.tag == "td").collect();
    if cells.len() < 2 {
        return None;
    }
    let cell = |i: usize| cells.get(i).and_then(|c| c.text_opt());
    let param = ParameterInfo {
        name_kor: cell(0),
        name_eng: cell(1),
        size: cell(2),
        division: cell(3),
        sample: cell(4),
        description: cell(5),
    };
    if param.is_nameless() {
        None
    } else {
        Some(param)
    }
}
