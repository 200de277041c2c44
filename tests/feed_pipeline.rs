//! End-to-end feed pipeline over a scripted fetcher and in-memory storage:
//! composition, sponsored insertion, favorites, config-driven page size, and
//! write-path invalidation.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use campanile::application::favorites::FavoriteStore;
use campanile::application::feed::{FeedPage, FeedRequest, FeedService};
use campanile::cache::{CacheKey, CacheLoader, CacheStore, CacheTrigger, EventQueue};
use campanile::config::Settings;
use campanile::domain::types::{ContentKind, TenantCode, UserId};
use campanile::infra::fetch::{ContentFetcher, FetchError};
use campanile::infra::kv::MemoryKvStore;
use campanile_api_types::{ItemDto, PlacementDto};

#[derive(Default)]
struct ScriptedFetcher {
    items: Mutex<Vec<ItemDto>>,
    placements: Mutex<Vec<PlacementDto>>,
    config: Mutex<HashMap<String, Value>>,
    list_calls: AtomicUsize,
    failing: AtomicBool,
}

impl ScriptedFetcher {
    fn with_items(items: Vec<ItemDto>) -> Arc<Self> {
        let fetcher = Self::default();
        *fetcher.items.lock().unwrap() = items;
        Arc::new(fetcher)
    }

    fn fail_next(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_up(&self) -> Result<(), FetchError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::Status { status: 503 });
        }
        Ok(())
    }
}

#[async_trait]
impl ContentFetcher for ScriptedFetcher {
    async fn list_items(
        &self,
        _kind: ContentKind,
        _tenant: &TenantCode,
    ) -> Result<Vec<ItemDto>, FetchError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_up()?;
        Ok(self.items.lock().unwrap().clone())
    }

    async fn fetch_item(
        &self,
        _kind: ContentKind,
        id: i64,
        _tenant: &TenantCode,
    ) -> Result<ItemDto, FetchError> {
        self.check_up()?;
        self.items
            .lock()
            .unwrap()
            .iter()
            .find(|dto| dto.id == id)
            .cloned()
            .ok_or(FetchError::Status { status: 404 })
    }

    async fn list_placements(
        &self,
        _kind: ContentKind,
        _tenant: &TenantCode,
    ) -> Result<Vec<PlacementDto>, FetchError> {
        self.check_up()?;
        Ok(self.placements.lock().unwrap().clone())
    }

    async fn fetch_config(
        &self,
        _tenant: Option<&TenantCode>,
    ) -> Result<HashMap<String, Value>, FetchError> {
        self.check_up()?;
        Ok(self.config.lock().unwrap().clone())
    }

    async fn resolve_asset_url(&self, file: &str) -> Result<String, FetchError> {
        self.check_up()?;
        Ok(format!("https://cdn.example.edu/{file}"))
    }
}

fn service(fetcher: &Arc<ScriptedFetcher>) -> (FeedService, Arc<CacheStore>) {
    let kv = Arc::new(MemoryKvStore::default());
    let store = Arc::new(CacheStore::new(kv.clone(), NonZeroUsize::new(64).unwrap()));
    let loader = CacheLoader::new(store.clone());
    let favorites = FavoriteStore::new(kv);
    let service = FeedService::new(
        loader,
        Arc::clone(fetcher) as Arc<dyn ContentFetcher>,
        favorites,
        &Settings::default(),
    );
    (service, store)
}

fn tenant() -> TenantCode {
    TenantCode::new("miuhub")
}

fn request(kind: ContentKind) -> FeedRequest {
    FeedRequest::new(kind, tenant())
}

/// `createdAt` grows with the id, so recency sorting puts the highest id
/// first and the order stays deterministic.
fn dto(id: i64) -> ItemDto {
    ItemDto {
        id,
        title: format!("item {id}"),
        category: None,
        region: None,
        keywords: None,
        event_date: None,
        created_at: Some(format!("2025-06-01T00:00:{id:02}Z")),
        is_closed: false,
        views: 0,
        comment_count: 0,
        content: None,
    }
}

/// A placement whose window is always active.
fn placement(content_id: i64, position: u32) -> PlacementDto {
    PlacementDto {
        id: 100 + content_id,
        content_id,
        content_type: "circle".into(),
        category: None,
        category_page: None,
        category_position: None,
        all_page: Some(1),
        all_position: Some(position),
        start_date: "2000-01-01".into(),
        end_date: "2099-12-31".into(),
    }
}

fn ids(page: &FeedPage) -> Vec<i64> {
    page.entries.iter().map(|entry| entry.item.id).collect()
}

#[tokio::test]
async fn page_load_composes_and_splices_featured() {
    let fetcher = ScriptedFetcher::with_items((1..=8).map(dto).collect());
    *fetcher.placements.lock().unwrap() = vec![placement(3, 2)];
    let (service, _store) = service(&fetcher);

    let page = service.load_page(&request(ContentKind::Circle)).await;

    // Recency puts [8..1]; #3 leaves the pool before the six-item slice and
    // comes back sponsored at slot 2.
    assert_eq!(ids(&page), [8, 3, 7, 6, 5, 4, 2]);
    assert!(page.entries[1].sponsored);
    assert!(!page.is_stale);
    assert_eq!(page.total_items, 7);
    assert_eq!(page.total_pages, 2);

    // The second read is a cache hit.
    let again = service.load_page(&request(ContentKind::Circle)).await;
    assert_eq!(ids(&again), ids(&page));
    assert_eq!(fetcher.list_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn upsert_invalidation_forces_the_next_read_to_refetch() {
    let fetcher = ScriptedFetcher::with_items((1..=3).map(dto).collect());
    let (service, store) = service(&fetcher);
    let trigger = CacheTrigger::new(Arc::new(EventQueue::new()), store);

    let first = service.load_page(&request(ContentKind::Notice)).await;
    assert_eq!(ids(&first), [3, 2, 1]);

    // New content lands upstream; the cached list keeps serving until the
    // write path announces the change.
    fetcher.items.lock().unwrap().push(dto(9));
    let cached = service.load_page(&request(ContentKind::Notice)).await;
    assert_eq!(ids(&cached), [3, 2, 1]);
    assert_eq!(fetcher.list_calls.load(Ordering::SeqCst), 1);

    trigger.item_upserted(ContentKind::Notice, 9, &tenant()).await;

    let refreshed = service.load_page(&request(ContentKind::Notice)).await;
    assert_eq!(ids(&refreshed), [9, 3, 2, 1]);
    assert_eq!(fetcher.list_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn favorites_filter_follows_toggles_without_refetching() {
    let fetcher = ScriptedFetcher::with_items((1..=4).map(dto).collect());
    let (service, _store) = service(&fetcher);
    let user = UserId::new("u-204");

    let added = service
        .toggle_favorite(ContentKind::Circle, &tenant(), &user, 2)
        .await
        .unwrap();
    assert!(added);

    let mut req = request(ContentKind::Circle);
    req.user = Some(user.clone());
    req.filters.favorites_only = true;

    let page = service.load_page(&req).await;
    assert_eq!(ids(&page), [2]);

    let removed = service
        .toggle_favorite(ContentKind::Circle, &tenant(), &user, 2)
        .await
        .unwrap();
    assert!(!removed);

    let empty = service.load_page(&req).await;
    assert!(empty.entries.is_empty());
    // Both reads worked off the same cached list.
    assert_eq!(fetcher.list_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn remote_config_overrides_the_page_size() {
    let fetcher = ScriptedFetcher::with_items((1..=8).map(dto).collect());
    *fetcher.config.lock().unwrap() =
        HashMap::from([("circles_items_per_page".to_string(), json!("3"))]);
    let (service, _store) = service(&fetcher);

    let first = service.load_page(&request(ContentKind::Circle)).await;
    assert_eq!(ids(&first), [8, 7, 6]);
    assert_eq!(first.total_pages, 3);

    let mut req = request(ContentKind::Circle);
    req.page = 2;
    let second = service.load_page(&req).await;
    assert_eq!(ids(&second), [5, 4, 3]);
}

#[tokio::test]
async fn board_lists_merge_live_counters_on_a_fresh_hit() {
    let mut newer = dto(2);
    newer.views = 5;
    newer.comment_count = 1;
    let fetcher = ScriptedFetcher::with_items(vec![dto(1), newer]);
    let (service, _store) = service(&fetcher);

    let first = service.load_page(&request(ContentKind::BoardPost)).await;
    assert_eq!(ids(&first), [2, 1]);
    assert_eq!(first.entries[0].item.views, 5);

    // Counters move upstream; titles move too, but a counter merge must not
    // pick those up.
    {
        let mut items = fetcher.items.lock().unwrap();
        items[1].views = 50;
        items[1].title = "renamed upstream".into();
    }

    let mut updates = service.subscribe_updates();
    let hit = service.load_page(&request(ContentKind::BoardPost)).await;
    assert_eq!(hit.entries[0].item.views, 5);

    // The fresh hit dispatched a counter merge; wait for it to settle.
    let list_key = CacheKey::List {
        kind: ContentKind::BoardPost,
        tenant: tenant(),
    };
    loop {
        if updates.recv().await.unwrap() == list_key {
            break;
        }
    }

    let merged = service.load_page(&request(ContentKind::BoardPost)).await;
    assert_eq!(merged.entries[0].item.views, 50);
    assert_eq!(merged.entries[0].item.title, "item 2");
}

#[tokio::test]
async fn failed_first_fetch_degrades_to_an_empty_stale_page() {
    let fetcher = ScriptedFetcher::with_items((1..=3).map(dto).collect());
    fetcher.fail_next(true);
    let (service, _store) = service(&fetcher);

    let page = service.load_page(&request(ContentKind::LifeEvent)).await;
    assert!(page.entries.is_empty());
    assert!(page.is_stale);
    assert_eq!(page.total_items, 0);

    // Nothing was cached for the failure, so recovery is a plain refetch.
    fetcher.fail_next(false);
    let recovered = service.load_page(&request(ContentKind::LifeEvent)).await;
    assert_eq!(ids(&recovered), [3, 2, 1]);
    assert!(!recovered.is_stale);
}

#[tokio::test]
async fn detail_record_body_and_asset_urls_are_served_and_cached() {
    let mut detailed = dto(7);
    detailed.content = Some("full announcement body".into());
    let fetcher = ScriptedFetcher::with_items(vec![detailed]);
    let (service, _store) = service(&fetcher);

    let record = service.item(ContentKind::Notice, 7, &tenant()).await;
    assert_eq!(record.data.as_ref().map(|item| item.id), Some(7));

    let body = service.item_body(ContentKind::Notice, 7, &tenant()).await;
    assert_eq!(body.data.as_deref(), Some("full announcement body"));

    let url = service.asset_url("banner.png").await;
    assert_eq!(url.data, "https://cdn.example.edu/banner.png");

    // Cached reads survive the backend going away.
    fetcher.fail_next(true);
    let again = service.asset_url("banner.png").await;
    assert_eq!(again.data, "https://cdn.example.edu/banner.png");
    assert!(!again.is_stale);
}
