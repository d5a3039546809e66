//! Filter, sort and pagination over a user store

use acc_server_manager::core::error::{ManagerError, QueryError};
use acc_server_manager::core::query::{
    CompiledQuery, FilterOperator, FilterRequest, QueryEngine, SortDirection,
};
use acc_server_manager::core::service::ResourceService;
use acc_server_manager::core::store::RecordStore;
use acc_server_manager::entities::User;
use acc_server_manager::storage::InMemoryStore;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Store wrapper that counts reads
struct CountingStore {
    inner: InMemoryStore<User>,
    reads: AtomicUsize,
}

#[async_trait]
impl RecordStore<User> for CountingStore {
    async fn get(&self, id: i64) -> Result<Option<User>> {
        self.inner.get(id).await
    }

    async fn insert(&self, record: User) -> Result<User> {
        self.inner.insert(record).await
    }

    async fn save(&self, record: User) -> Result<Option<User>> {
        self.inner.save(record).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        self.inner.delete(id).await
    }

    async fn count(&self, query: &CompiledQuery) -> Result<u64> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.count(query).await
    }

    async fn fetch(&self, query: &CompiledQuery) -> Result<Vec<User>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(query).await
    }
}

fn user(mail: &str, minutes: i64, enabled: bool) -> User {
    User {
        id: 0,
        mail: mail.to_string(),
        password_hash: String::new(),
        is_enabled: enabled,
        created: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes),
        last_login: None,
        scopes: "user".to_string(),
    }
}

/// 3 users with mail a@b.c and 5 others, inserted out of creation order
async fn seeded() -> (ResourceService<User>, Arc<CountingStore>) {
    let store = Arc::new(CountingStore {
        inner: InMemoryStore::new(),
        reads: AtomicUsize::new(0),
    });
    let rows = [
        user("a@b.c", 20, true),
        user("x@y.z", 5, true),
        user("a@b.c", 40, false),
        user("driver1@league.net", 1, true),
        user("driver2@league.net", 2, true),
        user("a@b.c", 30, true),
        user("steward@league.net", 50, false),
        user("marshal@league.net", 60, true),
    ];
    for row in rows {
        store.insert(row).await.unwrap();
    }
    let service = ResourceService::new(
        store.clone() as Arc<dyn RecordStore<User>>,
        QueryEngine::default(),
    );
    (service, store)
}

// =============================================================================
// Filtering
// =============================================================================

#[tokio::test]
async fn test_mail_match_sorted_by_created_desc() {
    let (service, _) = seeded().await;
    let request = FilterRequest::new()
        .filter("mail", FilterOperator::Eq, json!("a@b.c"))
        .sort_by("created", SortDirection::Desc)
        .page(0, 10);

    let page = service.filter(&request).await.unwrap();

    assert_eq!(page.total_count, 3);
    assert_eq!(page.items.len(), 3);
    let ids: Vec<i64> = page.items.iter().map(|u| u.id).collect();
    assert_eq!(ids, vec![3, 6, 1]);
    assert!(page.items.windows(2).all(|w| w[0].created >= w[1].created));
}

#[tokio::test]
async fn test_terms_are_conjoined() {
    let (service, _) = seeded().await;
    let request = FilterRequest::new()
        .filter("mail", FilterOperator::Eq, json!("a@b.c"))
        .filter("is_enabled", FilterOperator::Eq, json!(true));

    let page = service.filter(&request).await.unwrap();
    assert_eq!(page.total_count, 2);
    assert!(page.items.iter().all(|u| u.is_enabled && u.mail == "a@b.c"));
}

#[tokio::test]
async fn test_contains_is_case_insensitive() {
    let (service, _) = seeded().await;
    let request = FilterRequest::new().filter("mail", FilterOperator::Contains, json!("LEAGUE"));

    let page = service.filter(&request).await.unwrap();
    assert_eq!(page.total_count, 4);
}

#[tokio::test]
async fn test_datetime_range() {
    let (service, _) = seeded().await;
    let request = FilterRequest::new()
        .filter("created", FilterOperator::Gte, json!("2024-03-01T12:30:00Z"))
        .filter("created", FilterOperator::Lt, json!("2024-03-01T13:00:00Z"))
        .sort_by("created", SortDirection::Asc);

    let page = service.filter(&request).await.unwrap();
    let minutes: Vec<i64> = page
        .items
        .iter()
        .map(|u| (u.created - Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()).num_minutes())
        .collect();
    assert_eq!(minutes, vec![30, 40, 50]);
}

#[tokio::test]
async fn test_null_matches_absent_values() {
    let (service, _) = seeded().await;
    let never = FilterRequest::new().filter("last_login", FilterOperator::Eq, json!(null));
    assert_eq!(service.filter(&never).await.unwrap().total_count, 8);

    let ever = FilterRequest::new().filter("last_login", FilterOperator::Neq, json!(null));
    assert_eq!(service.filter(&ever).await.unwrap().total_count, 0);
}

// =============================================================================
// Pagination and ordering
// =============================================================================

#[tokio::test]
async fn test_pages_cover_the_sorted_set() {
    let (service, _) = seeded().await;
    let full = service
        .filter(
            &FilterRequest::new()
                .sort_by("is_enabled", SortDirection::Desc)
                .sort_by("mail", SortDirection::Asc)
                .page(0, 100),
        )
        .await
        .unwrap();

    let mut collected = Vec::new();
    for page in 0..3 {
        let window = service
            .filter(
                &FilterRequest::new()
                    .sort_by("is_enabled", SortDirection::Desc)
                    .sort_by("mail", SortDirection::Asc)
                    .page(page, 3),
            )
            .await
            .unwrap();
        assert_eq!(window.total_count, 8);
        collected.extend(window.items.into_iter().map(|u| u.id));
    }

    let expected: Vec<i64> = full.items.iter().map(|u| u.id).collect();
    assert_eq!(collected, expected);
}

#[tokio::test]
async fn test_page_past_the_end_is_empty() {
    let (service, _) = seeded().await;
    let page = service
        .filter(&FilterRequest::new().page(5, 10))
        .await
        .unwrap();
    assert_eq!(page.total_count, 8);
    assert!(page.items.is_empty());
}

#[tokio::test]
async fn test_repeated_requests_are_identical() {
    let (service, _) = seeded().await;
    let request = FilterRequest::new().sort_by("is_enabled", SortDirection::Asc);

    let first: Vec<i64> = service.filter(&request).await.unwrap().items.iter().map(|u| u.id).collect();
    let second: Vec<i64> = service.filter(&request).await.unwrap().items.iter().map(|u| u.id).collect();
    assert_eq!(first, second);
    // Ties on is_enabled fall back to id ascending
    assert_eq!(first, vec![3, 7, 1, 2, 4, 5, 6, 8]);
}

// =============================================================================
// Caller errors never reach the store
// =============================================================================

#[tokio::test]
async fn test_invalid_requests_do_not_touch_the_store() {
    let (service, store) = seeded().await;

    let cases = [
        FilterRequest::new().filter("password_hash", FilterOperator::Eq, json!("x")),
        FilterRequest::new().filter("id", FilterOperator::Contains, json!("1")),
        FilterRequest::new().filter("is_enabled", FilterOperator::Eq, json!("yes")),
        FilterRequest::new().sort_by("nickname", SortDirection::Asc),
        FilterRequest::new().page(-1, 10),
        FilterRequest::new().page(0, 0),
        FilterRequest::new().page(0, 1000),
    ];

    for request in &cases {
        let err = service.filter(request).await.unwrap_err();
        assert!(matches!(err, ManagerError::Query(_)), "{:?}", request);
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
    assert_eq!(store.reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_contains_on_numeric_field_is_unsupported() {
    let (service, _) = seeded().await;
    let err = service
        .filter(&FilterRequest::new().filter("id", FilterOperator::Contains, json!(1)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ManagerError::Query(QueryError::UnsupportedOperator { ref field, .. }) if field == "id"
    ));
}
