//! Tests for the cache/merge orchestrator.

use std::cell::{Cell, RefCell};
use std::time::Duration;

use govcat_core::catalog::{
    CatalogSource, CatalogStore, Direction, LocalFilter, MemoryCatalogStore, ParameterRecord,
    SyncReport,
};
use govcat_core::{
    CatalogError, CatalogRecord, CatalogService, CatalogSummary, DetailResult, FetchError,
    OperationInfo, ParameterInfo, SearchResultPage,
};
use pretty_assertions::assert_eq;

/// Hands out scripted detail results and listing pages, counting calls.
#[derive(Default)]
struct ScriptedSource {
    details: RefCell<Vec<DetailResult>>,
    pages: Vec<Vec<CatalogSummary>>,
    fail_page: Option<u32>,
    detail_calls: Cell<usize>,
    listing_calls: Cell<usize>,
}

impl CatalogSource for ScriptedSource {
    fn search_listing(
        &self,
        page_number: u32,
        page_size: u32,
        _keyword: &str,
        _category: Option<&str>,
    ) -> Result<SearchResultPage, FetchError> {
        self.listing_calls.set(self.listing_calls.get() + 1);
        if self.fail_page == Some(page_number) {
            return Err(FetchError::Network("connection reset".into()));
        }
        let items = self
            .pages
            .get(page_number as usize - 1)
            .cloned()
            .unwrap_or_default();
        Ok(SearchResultPage {
            items,
            total_count: 1234,
            page_number,
            page_size,
        })
    }

    fn fetch_detail(&self, catalog_id: &str) -> Result<DetailResult, FetchError> {
        self.detail_calls.set(self.detail_calls.get() + 1);
        let mut details = self.details.borrow_mut();
        if details.is_empty() {
            return Err(FetchError::Status(404));
        }
        let mut detail = details.remove(0);
        detail.id = catalog_id.to_string();
        Ok(detail)
    }
}

fn summary(id: &str, name: Option<&str>, org: Option<&str>) -> CatalogSummary {
    CatalogSummary {
        id: id.into(),
        name: name.map(Into::into),
        description: None,
        provider_org: org.map(Into::into),
        category: None,
        data_format: Some("JSON".into()),
        service_type: "REST".into(),
        endpoint_url: None,
    }
}

fn detail_with_params(name: Option<&str>) -> DetailResult {
    let mut op = OperationInfo::new("getList");
    op.request_params.push(ParameterInfo {
        name_kor: Some("서비스키".into()),
        name_eng: Some("serviceKey".into()),
        division: Some("필".into()),
        description: Some("발급받은 인증키".into()),
        ..Default::default()
    });
    op.response_fields.push(ParameterInfo {
        name_kor: Some("결과코드".into()),
        name_eng: None,
        size: Some("2".into()),
        division: Some("필수".into()),
        description: Some("결과코드".into()),
        ..Default::default()
    });
    DetailResult {
        name: name.map(Into::into),
        operations: vec![op],
        ..DetailResult::new("")
    }
}

fn service(source: ScriptedSource) -> CatalogService<ScriptedSource, MemoryCatalogStore> {
    CatalogService::new(source, MemoryCatalogStore::new()).with_sync_delay(Duration::ZERO)
}

#[test]
fn parameters_are_mapped_into_records() {
    let source = ScriptedSource {
        details: RefCell::new(vec![detail_with_params(Some("주차장"))]),
        ..Default::default()
    };
    let service = service(source);

    let record = service.detail("100").unwrap();
    assert_eq!(record.id, "100");
    assert_eq!(record.name.as_deref(), Some("주차장"));
    assert_eq!(
        record.operations[0].parameters,
        vec![
            ParameterRecord {
                name: Some("serviceKey".into()),
                param_type: None,
                required: true,
                description: Some("서비스키 - 발급받은 인증키".into()),
                default_value: None,
                direction: Direction::Request,
            },
            ParameterRecord {
                name: Some("결과코드".into()),
                param_type: Some("2".into()),
                required: false,
                description: Some("결과코드".into()),
                default_value: None,
                direction: Direction::Response,
            },
        ]
    );
}

#[test]
fn cached_detail_is_served_without_extraction() {
    let source = ScriptedSource {
        details: RefCell::new(vec![detail_with_params(None)]),
        ..Default::default()
    };
    let service = service(source);

    let first = service.detail("100").unwrap();
    let second = service.detail("100").unwrap();
    assert_eq!(first, second);
    assert_eq!(service.source().detail_calls.get(), 1);
}

#[test]
fn record_without_parameters_is_extracted_again() {
    let empty = DetailResult {
        operations: vec![OperationInfo::new("noParams")],
        ..DetailResult::new("")
    };
    let source = ScriptedSource {
        details: RefCell::new(vec![empty, detail_with_params(Some("두번째"))]),
        ..Default::default()
    };
    let service = service(source);

    let first = service.detail("7").unwrap();
    assert!(!first.has_cached_detail());

    let second = service.detail("7").unwrap();
    assert_eq!(second.name.as_deref(), Some("두번째"));
    assert!(second.has_cached_detail());
    assert_eq!(service.source().detail_calls.get(), 2);
}

#[test]
fn refresh_ignores_cache_and_keeps_known_scalars() {
    let source = ScriptedSource {
        details: RefCell::new(vec![detail_with_params(Some("원래 이름")), detail_with_params(None)]),
        ..Default::default()
    };
    let service = service(source);

    service.detail("5").unwrap();
    let refreshed = service.refresh("5").unwrap();

    assert_eq!(refreshed.name.as_deref(), Some("원래 이름"));
    assert_eq!(refreshed.operations.len(), 1);
}

#[test]
fn failed_refresh_leaves_operations_cleared() {
    let source = ScriptedSource {
        details: RefCell::new(vec![detail_with_params(None)]),
        ..Default::default()
    };
    let service = service(source);

    service.detail("5").unwrap();
    assert!(matches!(
        service.refresh("5"),
        Err(CatalogError::Fetch(FetchError::Status(404)))
    ));
    let stored = service.store().get("5").unwrap().unwrap();
    assert!(stored.operations.is_empty());
}

#[test]
fn sync_upserts_until_an_empty_page() {
    let source = ScriptedSource {
        pages: vec![
            vec![summary("1", Some("하나"), Some("기관A")), summary("2", None, None)],
            vec![summary("1", None, Some("기관B"))],
        ],
        ..Default::default()
    };
    let service = service(source);

    let report = service.sync(10, 2).unwrap();
    assert_eq!(
        report,
        SyncReport {
            synced: 3,
            created: 2,
            updated: 1,
            portal_total: 1234,
        }
    );

    let first = service.store().get("1").unwrap().unwrap();
    assert_eq!(first.name.as_deref(), Some("하나"));
    assert_eq!(first.provider_org.as_deref(), Some("기관B"));
    assert_eq!(first.service_type, "REST");
    assert!(first.last_synced_at.is_some());

    let ids: Vec<String> = service
        .store()
        .list()
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["1".to_string(), "2".to_string()]);
}

#[test]
fn sync_respects_page_limit() {
    let source = ScriptedSource {
        pages: vec![vec![summary("1", None, None)], vec![summary("2", None, None)]],
        ..Default::default()
    };
    let service = service(source);

    let report = service.sync(1, 10).unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(service.source().listing_calls.get(), 1);
}

#[test]
fn sync_failure_on_first_page_is_an_error() {
    let source = ScriptedSource {
        fail_page: Some(1),
        ..Default::default()
    };
    assert!(matches!(
        service(source).sync(5, 10),
        Err(CatalogError::Fetch(FetchError::Network(_)))
    ));
}

#[test]
fn sync_failure_later_keeps_earlier_pages() {
    let source = ScriptedSource {
        pages: vec![vec![summary("1", None, None)], vec![summary("2", None, None)]],
        fail_page: Some(2),
        ..Default::default()
    };
    let service = service(source);

    let report = service.sync(5, 10).unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(service.store().list().unwrap().len(), 1);
}

#[test]
fn merge_detail_never_blanks_stored_values() {
    let mut record = CatalogRecord::new("9");
    record.merge_summary(&summary("9", Some("이름"), Some("기관")));
    record.merge_detail(&DetailResult::new("9"));

    assert_eq!(record.name.as_deref(), Some("이름"));
    assert_eq!(record.provider_org.as_deref(), Some("기관"));
    assert!(record.operations.is_empty());
}

fn stored(id: &str, name: &str, org: &str, category: &str, synced_at: u64) -> CatalogRecord {
    CatalogRecord {
        name: Some(name.into()),
        provider_org: Some(org.into()),
        category: Some(category.into()),
        last_synced_at: Some(synced_at),
        ..CatalogRecord::new(id)
    }
}

fn stocked(source: ScriptedSource) -> CatalogService<ScriptedSource, MemoryCatalogStore> {
    let service = service(source);
    let store = service.store();
    store.put(stored("1", "대기오염정보", "한국환경공단", "환경", 100)).unwrap();
    store.put(stored("2", "버스도착정보", "국토교통부", "교통", 300)).unwrap();
    store
        .put(CatalogRecord {
            description: Some("Air Quality forecast".into()),
            ..stored("3", "예보", "한국환경공단", "환경", 200)
        })
        .unwrap();
    store
        .put(CatalogRecord {
            service_type: "SOAP".into(),
            ..stored("4", "버스노선", "서울시", "교통", 400)
        })
        .unwrap();
    service
}

fn ids(page: &SearchResultPage) -> Vec<&str> {
    page.items.iter().map(|item| item.id.as_str()).collect()
}

fn filter(keyword: Option<&str>, category: Option<&str>, org: Option<&str>) -> LocalFilter {
    LocalFilter {
        keyword: keyword.map(Into::into),
        category: category.map(Into::into),
        org: org.map(Into::into),
    }
}

#[test]
fn local_search_filters_stored_rest_records() {
    let service = stocked(ScriptedSource::default());

    let all = service.search_local(&LocalFilter::default(), 1, 10).unwrap();
    assert_eq!(ids(&all), vec!["2", "3", "1"]);
    assert_eq!(all.total_count, 3);

    let by_description = service.search_local(&filter(Some("air"), None, None), 1, 10).unwrap();
    assert_eq!(ids(&by_description), vec!["3"]);

    let by_org_text = service
        .search_local(&filter(Some("환경공단"), None, None), 1, 10)
        .unwrap();
    assert_eq!(ids(&by_org_text), vec!["3", "1"]);

    let by_category = service.search_local(&filter(None, Some("교통"), None), 1, 10).unwrap();
    assert_eq!(ids(&by_category), vec!["2"]);

    let blank = service.search_local(&filter(Some("  "), Some(""), None), 1, 10).unwrap();
    assert_eq!(blank.total_count, 3);
}

#[test]
fn local_search_pages_through_matches() {
    let service = stocked(ScriptedSource::default());
    let second = service
        .search_local(&filter(None, None, Some("한국환경공단")), 2, 1)
        .unwrap();
    assert_eq!(ids(&second), vec!["1"]);
    assert_eq!(second.total_count, 2);
    assert_eq!(second.page_number, 2);
}

#[test]
fn categories_and_orgs_are_distinct_and_sorted() {
    let service = stocked(ScriptedSource::default());
    assert_eq!(service.categories().unwrap(), vec!["교통", "환경"]);
    assert_eq!(service.orgs().unwrap(), vec!["국토교통부", "한국환경공단"]);
}

#[test]
fn portal_failure_falls_back_to_stored_records() {
    let service = stocked(ScriptedSource {
        fail_page: Some(1),
        ..Default::default()
    });
    let page = service
        .search_with_fallback(&filter(Some("버스"), None, None), 1, 10)
        .unwrap();
    assert_eq!(ids(&page), vec!["2"]);
    assert_eq!(page.total_count, 1);
}

#[test]
fn live_search_is_preferred_when_the_portal_answers() {
    let service = stocked(ScriptedSource {
        pages: vec![vec![summary("99", Some("포털"), None)]],
        ..Default::default()
    });
    let page = service
        .search_with_fallback(&filter(Some("버스"), None, None), 1, 10)
        .unwrap();
    assert_eq!(ids(&page), vec!["99"]);
    assert_eq!(page.total_count, 1234);
}
