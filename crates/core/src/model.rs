//! Normalized catalog model produced by the extractors.

use serde::{Deserialize, Serialize};

/// Service type reported for every listing entry; the search only asks for REST APIs.
pub const SERVICE_TYPE_REST: &str = "REST";

/// Division label for a required parameter.
pub const DIVISION_REQUIRED: &str = "필수";
/// Division label for an optional parameter.
pub const DIVISION_OPTIONAL: &str = "옵션";

/// One entry of a search-results page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSummary {
    /// Portal primary key, a numeric string.
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub provider_org: Option<String>,
    pub category: Option<String>,
    /// `JSON`, `XML`, `JSON,XML`, or absent.
    pub data_format: Option<String>,
    pub service_type: String,
    pub endpoint_url: Option<String>,
}

/// A page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultPage {
    pub items: Vec<CatalogSummary>,
    /// Best-effort total; `0` means the page did not report one.
    pub total_count: u64,
    pub page_number: u32,
    pub page_size: u32,
}

/// Everything recovered about one catalog entry from its detail page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetailResult {
    /// Always the identifier the detail fetch was asked for.
    pub id: String,
    pub name: Option<String>,
    pub provider_org: Option<String>,
    pub category: Option<String>,
    pub api_type: Option<String>,
    pub data_format: Option<String>,
    pub description: Option<String>,
    pub service_url: Option<String>,
    pub operations: Vec<OperationInfo>,
}

impl DetailResult {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// One invocable endpoint of a catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationInfo {
    pub name: String,
    pub http_method: String,
    pub endpoint_url: Option<String>,
    /// Portal-internal operation sequence number, used only to address the
    /// legacy follow-up call.
    pub seq_token: Option<String>,
    pub request_params: Vec<ParameterInfo>,
    pub response_fields: Vec<ParameterInfo>,
}

impl OperationInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            http_method: "GET".to_string(),
            endpoint_url: None,
            seq_token: None,
            request_params: Vec::new(),
            response_fields: Vec::new(),
        }
    }
}

/// A request parameter or response field.
///
/// Response fields recovered from nested schemas carry their dot-qualified
/// path (`items.item.name`) in `name_eng`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name_kor: Option<String>,
    pub name_eng: Option<String>,
    /// Declared size or type label.
    pub size: Option<String>,
    /// Free-text required/optional marker, usually `필수`/`옵션`.
    pub division: Option<String>,
    pub sample: Option<String>,
    pub description: Option<String>,
}

impl ParameterInfo {
    /// True when neither name carries any text; such parameters are never emitted.
    pub fn is_nameless(&self) -> bool {
        is_blank(&self.name_kor) && is_blank(&self.name_eng)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Trim `value`, mapping blank input to `None`.
pub fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
