//! Tests for extraction from an embedded specification document.

use govcat_core::meta::Page;
use govcat_core::swagger::{self, SpecMiss};
use govcat_core::{DetailResult, ParameterInfo};
use pretty_assertions::assert_eq;

fn extract(html: &str, catalog_id: &str) -> Result<DetailResult, SpecMiss> {
    swagger::extract(&Page::parse(html), catalog_id)
}

fn page_with(document: &str, body: &str) -> String {
    format!(
        "<html><head><script>var swaggerJson = '{document}';</script></head><body>{body}</body></html>"
    )
}

const STANDARD: &str = r##"{
  "swagger": "2.0",
  "info": { "title": "대기오염정보", "description": "측정소별 실시간 측정정보" },
  "host": "apis.data.go.kr",
  "basePath": "/B552584/ArpltnInforInqireSvc",
  "schemes": ["http", "https"],
  "paths": {
    "/getMsrstnAcctoRltmMesureDnsty": {
      "parameters": [
        { "name": "serviceKey", "in": "query", "required": true, "type": "string", "description": "인증키" }
      ],
      "get": {
        "summary": "측정소별 실시간 측정정보 조회",
        "operationId": "getMsrstn",
        "produces": ["application/json", "application/xml"],
        "parameters": [
          { "name": "numOfRows", "in": "query", "required": false, "type": "integer", "default": 10 },
          { "name": "body", "in": "body", "schema": { "$ref": "#/definitions/Query" } }
        ],
        "responses": {
          "200": { "schema": { "$ref": "#/definitions/Result" } }
        }
      }
    },
    "/getCtprvnRltmMesureDnsty": {
      "post": {
        "operationId": "getCtprvn",
        "produces": ["application/json"]
      }
    }
  },
  "definitions": {
    "Query": { "type": "object", "properties": { "q": { "type": "string" } } },
    "Result": {
      "properties": {
        "items": { "type": "array", "items": { "$ref": "#/definitions/Item" } }
      }
    },
    "Item": { "properties": { "pm10Value": { "type": "string", "description": "미세먼지 농도" } } }
  }
}"##;

#[test]
fn standard_document_yields_operations_in_order() {
    let html = page_with(STANDARD, "");
    let result = extract(&html, "15073861").unwrap();

    assert_eq!(result.id, "15073861");
    assert_eq!(result.name.as_deref(), Some("대기오염정보"));
    assert_eq!(result.description.as_deref(), Some("측정소별 실시간 측정정보"));
    assert_eq!(result.api_type.as_deref(), Some("REST"));
    assert_eq!(result.data_format.as_deref(), Some("JSON+XML"));
    assert_eq!(
        result.service_url.as_deref(),
        Some("http://apis.data.go.kr/B552584/ArpltnInforInqireSvc")
    );

    let names: Vec<&str> = result.operations.iter().map(|op| op.name.as_str()).collect();
    assert_eq!(names, vec!["측정소별 실시간 측정정보 조회", "getCtprvn"]);

    let first = &result.operations[0];
    assert_eq!(first.http_method, "GET");
    assert_eq!(
        first.endpoint_url.as_deref(),
        Some("http://apis.data.go.kr/B552584/ArpltnInforInqireSvc/getMsrstnAcctoRltmMesureDnsty")
    );
    assert_eq!(
        first.request_params,
        vec![
            ParameterInfo {
                name_eng: Some("serviceKey".into()),
                size: Some("string".into()),
                division: Some("필수".into()),
                description: Some("인증키".into()),
                ..Default::default()
            },
            ParameterInfo {
                name_eng: Some("numOfRows".into()),
                size: Some("integer".into()),
                division: Some("옵션".into()),
                sample: Some("10".into()),
                ..Default::default()
            },
            ParameterInfo {
                name_eng: Some("body".into()),
                size: Some("object".into()),
                division: Some("옵션".into()),
                ..Default::default()
            },
        ]
    );
    assert_eq!(
        first.response_fields,
        vec![
            ParameterInfo {
                name_eng: Some("items".into()),
                size: Some("array".into()),
                ..Default::default()
            },
            ParameterInfo {
                name_eng: Some("items.pm10Value".into()),
                size: Some("string".into()),
                description: Some("미세먼지 농도".into()),
                ..Default::default()
            },
        ]
    );

    assert_eq!(result.operations[1].http_method, "POST");
    assert!(result.operations[1].response_fields.is_empty());
}

#[test]
fn operation_name_falls_back_to_path() {
    let doc = r#"{ "info": {}, "paths": { "/ping": { "get": {} } } }"#;
    let html = page_with(doc, "");
    let result = extract(&html, "1").unwrap();
    assert_eq!(result.service_url, None);
    assert_eq!(result.operations[0].name, "/ping");
    assert_eq!(result.operations[0].endpoint_url.as_deref(), Some("/ping"));
}

const PROPRIETARY: &str = r#"{
  "info": { "title": "버스도착정보" },
  "paths": {
    "/getArrInfo": { "post": { "operationId": "op1", "produces": ["application/xml"] } }
  },
  "swaggerOprtinVOs": [
    {
      "oprtinNm": "도착정보조회",
      "operationId": "op1",
      "oprtinUrl": "http://apis.data.go.kr/1613000/ArvlInfoInqireService/getArrInfo",
      "reqList": [
        { "paramtrNm": "cityCode", "paramtrKorNm": "도시코드", "paramtrTy": "string",
          "paramtrDivision": "필수", "paramtrBassValue": "25", "paramtrDc": "도시코드" },
        { "paramtrNm": "_type", "paramtrBassValue": "-" },
        { "paramtrDc": "no name at all" }
      ],
      "resList": [
        { "paramtrNm": "item", "paramtrTy": "object", "subParam": [
          { "paramtrNm": "arrtime", "paramtrTy": "int", "paramtrDc": "도착예정시간" }
        ]}
      ]
    },
    { "operationId": "unmatched", "oprtinUrl": "http://apis.data.go.kr/x" }
  ]
}"#;

#[test]
fn proprietary_descriptors_take_precedence_over_paths() {
    let html = page_with(PROPRIETARY, "");
    let result = extract(&html, "15098530").unwrap();

    assert_eq!(result.name.as_deref(), Some("버스도착정보"));
    assert_eq!(result.data_format.as_deref(), Some("XML"));
    assert_eq!(
        result.service_url.as_deref(),
        Some("http://apis.data.go.kr/1613000/ArvlInfoInqireService/getArrInfo")
    );
    assert_eq!(result.operations.len(), 2);

    let op = &result.operations[0];
    assert_eq!(op.name, "도착정보조회");
    assert_eq!(op.http_method, "POST");
    assert_eq!(
        op.request_params,
        vec![
            ParameterInfo {
                name_kor: Some("도시코드".into()),
                name_eng: Some("cityCode".into()),
                size: Some("string".into()),
                division: Some("필수".into()),
                sample: Some("25".into()),
                description: Some("도시코드".into()),
            },
            ParameterInfo {
                name_eng: Some("_type".into()),
                ..Default::default()
            },
        ]
    );
    let response: Vec<&str> = op
        .response_fields
        .iter()
        .filter_map(|f| f.name_eng.as_deref())
        .collect();
    assert_eq!(response, vec!["item", "item.arrtime"]);

    assert_eq!(result.operations[1].name, "unmatched");
    assert_eq!(result.operations[1].http_method, "GET");
}

#[test]
fn page_metadata_fills_missing_provider_and_category() {
    let body = r#"
      <table><tr><th>제공기관</th><td>한국환경공단</td></tr></table>
      <div>분류체계 환경기상 · 수정일 2024</div>
    "#;
    let html = page_with(STANDARD, body);
    let result = extract(&html, "15073861").unwrap();
    assert_eq!(result.provider_org.as_deref(), Some("한국환경공단"));
    assert_eq!(result.category.as_deref(), Some("환경기상"));
}

#[test]
fn enrichment_keeps_values_already_present() {
    let page = Page::parse("<dl><dt>제공기관</dt><dd>다른기관</dd></dl>");
    let result = DetailResult {
        provider_org: Some("기상청".into()),
        ..DetailResult::new("1")
    };
    let enriched = swagger::enrich_from_page_meta(result, &page);
    assert_eq!(enriched.provider_org.as_deref(), Some("기상청"));
    assert_eq!(enriched.category, None);
}

#[test]
fn misses_are_classified() {
    let plain = "<html><body>no script</body></html>";
    assert_eq!(swagger::find_document(plain), Err(SpecMiss::Absent));

    let empty = page_with("   ", "");
    assert_eq!(swagger::find_document(&empty), Err(SpecMiss::Empty));

    let broken = page_with("{ not json", "");
    assert!(matches!(
        swagger::find_document(&broken),
        Err(SpecMiss::InvalidJson(_))
    ));

    let array = page_with("[1, 2]", "");
    assert_eq!(swagger::find_document(&array), Err(SpecMiss::NotAnObject));
}

#[test]
fn cyclic_response_schema_only_empties_its_operation() {
    let doc = r##"{
      "host": "apis.data.go.kr",
      "basePath": "/B1",
      "paths": {
        "/a": { "get": {
          "produces": ["application/json"],
          "responses": { "200": { "schema": { "properties": { "code": { "type": "string" } } } } }
        } },
        "/b": { "post": {
          "parameters": [ { "name": "id", "in": "query", "type": "string" } ],
          "responses": { "200": { "schema": { "$ref": "#/definitions/Node" } } }
        } }
      },
      "definitions": { "Node": { "properties": { "child": { "$ref": "#/definitions/Node" } } } }
    }"##;
    let html = page_with(doc, "<h2>heading</h2>");
    let result = extract(&html, "1").unwrap();

    assert_eq!(result.service_url.as_deref(), Some("https://apis.data.go.kr/B1"));
    assert_eq!(result.data_format.as_deref(), Some("JSON"));
    let ops: Vec<(&str, &str)> = result
        .operations
        .iter()
        .map(|op| (op.name.as_str(), op.http_method.as_str()))
        .collect();
    assert_eq!(ops, vec![("/a", "GET"), ("/b", "POST")]);

    assert_eq!(
        result.operations[0].response_fields[0].name_eng.as_deref(),
        Some("code")
    );
    assert!(result.operations[1].response_fields.is_empty());
    assert_eq!(
        result.operations[1].request_params[0].name_eng.as_deref(),
        Some("id")
    );
}
