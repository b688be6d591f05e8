//! Extraction from a specification document embedded in the detail page.
//!
//! Newer detail pages assign the whole API description to a script variable
//! (`var swaggerJson = '...'`). Two shapes are understood: the portal's own
//! enriched form carrying `swaggerOprtinVOs`, and a plain Swagger 2.0 document
//! whose response schemas need `$ref` resolution.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::meta::{self, Page, LABEL_CATEGORY, LABEL_PROVIDER};
use crate::model::{
    DetailResult, OperationInfo, ParameterInfo, DIVISION_OPTIONAL, DIVISION_REQUIRED,
    SERVICE_TYPE_REST,
};
use crate::schema::{self, text_of, Definitions, SchemaNode};

/// Why no specification document could be used. Not an error: every variant
/// sends the caller to the legacy extractor.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SpecMiss {
    #[error("no embedded specification document")]
    Absent,

    #[error("embedded specification document is empty")]
    Empty,

    #[error("embedded specification document is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("embedded specification document is not a JSON object")]
    NotAnObject,
}

/// Extract a detail result from the embedded document and fill in the
/// organizational metadata the document rarely carries from the page itself.
pub fn extract(page: &Page<'_>, catalog_id: &str) -> Result<DetailResult, SpecMiss> {
    let root = find_document(page.html)?;
    let result = parse_document(&root, catalog_id);
    Ok(enrich_from_page_meta(result, page))
}

/// Locate and parse the embedded document.
pub fn find_document(html: &str) -> Result<Value, SpecMiss> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"var\s+swaggerJson\s*=\s*[`']([^`']+)[`']").expect("swagger regex is valid")
    });

    let captured = re
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or(SpecMiss::Absent)?
        .as_str()
        .trim();
    if captured.is_empty() {
        return Err(SpecMiss::Empty);
    }

    let root: Value =
        serde_json::from_str(captured).map_err(|e| SpecMiss::InvalidJson(e.to_string()))?;
    if !root.is_object() {
        return Err(SpecMiss::NotAnObject);
    }
    Ok(root)
}

/// Build a detail result from a parsed document, preferring the portal's
/// enriched operation list over the standard `paths` section.
pub fn parse_document(root: &Value, catalog_id: &str) -> DetailResult {
    let info = root.get("info").unwrap_or(&Value::Null);
    let result = DetailResult {
        name: text_of(info, "title"),
        description: text_of(info, "description"),
        api_type: Some(SERVICE_TYPE_REST.to_string()),
        ..DetailResult::new(catalog_id)
    };

    match root.get("swaggerOprtinVOs").and_then(Value::as_array) {
        Some(vos) if !vos.is_empty() => {
            debug!(operations = vos.len(), "parsing portal operation descriptors");
            from_operation_descriptors(root, vos, result)
        }
        _ => {
            debug!("no portal operation descriptors, reading standard paths");
            from_standard_paths(root, result)
        }
    }
}

fn from_operation_descriptors(root: &Value, vos: &[Value], result: DetailResult) -> DetailResult {
    let path_ops = path_operations(root);

    let mut methods: HashMap<String, String> = HashMap::new();
    for op in &path_ops {
        if let Some(op_id) = text_of(op.node, "operationId") {
            methods.insert(op_id, op.method.clone());
        }
    }
    let data_format = produces_tag(path_ops.iter().map(|op| op.node));

    let operations: Vec<OperationInfo> = vos
        .iter()
        .map(|vo| {
            let operation_id = text_of(vo, "operationId");
            let http_method = operation_id
                .as_ref()
                .and_then(|id| methods.get(id))
                .cloned()
                .unwrap_or_else(|| "GET".to_string());
            let name = text_of(vo, "oprtinNm")
                .or_else(|| operation_id.clone())
                .unwrap_or_default();

            let request_params = array_of(vo, "reqList")
                .iter()
                .map(descriptor_request_param)
                .filter(|p| !p.is_nameless())
                .collect();

            let mut response_fields = Vec::new();
            schema::flatten_sub_params(array_of(vo, "resList"), "", &mut response_fields);

            OperationInfo {
                http_method,
                endpoint_url: text_of(vo, "oprtinUrl"),
                request_params,
                response_fields,
                ..OperationInfo::new(name)
            }
        })
        .collect();

    DetailResult {
        service_url: operations.first().and_then(|op| op.endpoint_url.clone()),
        data_format: data_format.or(result.data_format),
        operations,
        ..result
    }
}

fn descriptor_request_param(req: &Value) -> ParameterInfo {
    ParameterInfo {
        name_kor: text_of(req, "paramtrKorNm"),
        name_eng: text_of(req, "paramtrNm"),
        size: text_of(req, "paramtrTy"),
        division: text_of(req, "paramtrDivision"),
        sample: text_of(req, "paramtrBassValue").filter(|v| v != "-"),
        description: text_of(req, "paramtrDc"),
    }
}

fn from_standard_paths(root: &Value, result: DetailResult) -> DetailResult {
    let base_url = text_of(root, "host").map(|host| {
        let scheme = root
            .get("schemes")
            .and_then(Value::as_array)
            .and_then(|s| s.first())
            .and_then(Value::as_str)
            .unwrap_or("https");
        let base_path = text_of(root, "basePath").unwrap_or_default();
        format!("{scheme}://{host}{base_path}")
    });
    let definitions = Definitions::from_value(root.get("definitions"));

    let path_ops = path_operations(root);
    let mut operations = Vec::with_capacity(path_ops.len());
    for op in &path_ops {
        let name = text_of(op.node, "summary")
            .or_else(|| text_of(op.node, "operationId"))
            .unwrap_or_else(|| op.path.clone());
        let endpoint_url = match &base_url {
            Some(base) => format!("{base}{}", op.path),
            None => op.path.clone(),
        };

        let request_params = op
            .path_params
            .iter()
            .chain(array_of(op.node, "parameters"))
            .map(|p| standard_param(p, &definitions))
            .filter(|p| !p.is_nameless())
            .collect();

        // An unexpandable schema costs only this operation its response fields.
        let response_fields = match op.node.pointer("/responses/200/schema") {
            Some(schema_value) => {
                let node = SchemaNode::from_value(schema_value);
                schema::flatten(definitions.resolve(&node), &definitions).unwrap_or_else(|e| {
                    warn!(path = %op.path, method = %op.method, error = %e, "response schema skipped");
                    Vec::new()
                })
            }
            None => Vec::new(),
        };

        operations.push(OperationInfo {
            http_method: op.method.clone(),
            endpoint_url: Some(endpoint_url),
            request_params,
            response_fields,
            ..OperationInfo::new(name)
        });
    }

    let data_format = produces_tag(path_ops.iter().map(|op| op.node));
    DetailResult {
        service_url: base_url,
        data_format: data_format.or(result.data_format),
        operations,
        ..result
    }
}

fn standard_param(p: &Value, definitions: &Definitions) -> ParameterInfo {
    let size = text_of(p, "type").or_else(|| {
        p.get("schema").and_then(|s| {
            let node = SchemaNode::from_value(s);
            match definitions.resolve(&node) {
                SchemaNode::Scalar { type_name, .. } => type_name.clone(),
                SchemaNode::Object { .. } => Some("object".to_string()),
                SchemaNode::Array { .. } => Some("array".to_string()),
                SchemaNode::Reference(_) => None,
            }
        })
    });
    let required = match p.get("required") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    };

    ParameterInfo {
        name_kor: None,
        name_eng: text_of(p, "name"),
        size,
        division: Some(if required { DIVISION_REQUIRED } else { DIVISION_OPTIONAL }.to_string()),
        sample: text_of(p, "example").or_else(|| text_of(p, "default")),
        description: text_of(p, "description"),
    }
}

/// One method entry under `paths`, with the path-level default parameters.
struct PathOperation<'a> {
    path: String,
    method: String,
    node: &'a Value,
    path_params: &'a [Value],
}

fn path_operations(root: &Value) -> Vec<PathOperation<'_>> {
    let Some(paths) = root.get("paths").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut ops = Vec::new();
    for (path, path_node) in paths {
        let Some(methods) = path_node.as_object() else {
            continue;
        };
        let path_params = array_of(path_node, "parameters");
        for (method, node) in methods {
            if method.eq_ignore_ascii_case("parameters") || !node.is_object() {
                continue;
            }
            ops.push(PathOperation {
                path: path.clone(),
                method: method.to_uppercase(),
                node,
                path_params,
            });
        }
    }
    ops
}

/// `JSON`, `XML` or `JSON+XML` from the media types the operations produce.
fn produces_tag<'a>(ops: impl Iterator<Item = &'a Value>) -> Option<String> {
    let mut json = false;
    let mut xml = false;
    for op in ops {
        for media in array_of(op, "produces").iter().filter_map(Value::as_str) {
            json |= media.contains("json");
            xml |= media.contains("xml");
        }
    }
    match (json, xml) {
        (true, true) => Some("JSON+XML".to_string()),
        (true, false) => Some("JSON".to_string()),
        (false, true) => Some("XML".to_string()),
        (false, false) => None,
    }
}

fn array_of<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Fill provider organization and category from the page when the document
/// did not report them: `<dt>/<th>` label pairs first, then a label scan over
/// the page text.
pub fn enrich_from_page_meta(result: DetailResult, page: &Page<'_>) -> DetailResult {
    if result.provider_org.is_some() && result.category.is_some() {
        return result;
    }
    let pairs = meta::label_pairs(&page.dom);
    let lookup = |label: &str| {
        meta::label_value(&pairs, label).or_else(|| meta::scan_field_label(&page.text, label))
    };

    DetailResult {
        provider_org: result.provider_org.clone().or_else(|| lookup(LABEL_PROVIDER)),
        category: result.category.clone().or_else(|| lookup(LABEL_CATEGORY)),
        ..result
    }
}
