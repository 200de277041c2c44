//! Feed orchestration.
//!
//! `FeedService` is the one parametrized read path every list and detail
//! screen shares: screens hand it a content kind, tenant, filters, sort mode
//! and page, and get back a composed page view-model. All remote traffic
//! goes through the stale-while-revalidate loader; nothing here ever fails
//! toward the UI, it only degrades to cached or empty data.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use time::OffsetDateTime;

use crate::application::compose::{FeedFilters, compose};
use crate::application::favorites::{FavoriteError, FavoriteStore};
use crate::application::placements::{FeedEntry, paginate_with_featured};
use crate::cache::{CacheKey, CacheLoader, Loaded, MergeFn, RefreshSubscription, replace_payload};
use crate::config::{CacheSettings, FeedSettings, Settings};
use crate::domain::config::AppConfig;
use crate::domain::items::FeedItem;
use crate::domain::placements::FeaturedPlacement;
use crate::domain::types::{ContentKind, SortMode, TenantCode, UserId};
use crate::infra::fetch::{ContentFetcher, FetchError};
use crate::util::timezone;

/// Everything a screen specifies about the feed it wants.
#[derive(Debug, Clone)]
pub struct FeedRequest {
    pub kind: ContentKind,
    pub tenant: TenantCode,
    /// Needed only when the favorites filter is on.
    pub user: Option<UserId>,
    pub filters: FeedFilters,
    pub sort: SortMode,
    /// 1-based.
    pub page: u32,
}

impl FeedRequest {
    pub fn new(kind: ContentKind, tenant: TenantCode) -> Self {
        Self {
            kind,
            tenant,
            user: None,
            filters: FeedFilters::default(),
            sort: SortMode::default(),
            page: 1,
        }
    }
}

/// One rendered page, ready for the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage {
    pub entries: Vec<FeedEntry>,
    pub page: u32,
    pub total_pages: u32,
    /// Pool size after filtering and featured exclusion, before slicing.
    pub total_items: usize,
    /// True when the item list predates its TTL; a background refresh will
    /// announce itself through [`FeedService::subscribe_updates`].
    pub is_stale: bool,
}

#[derive(Clone)]
pub struct FeedService {
    loader: CacheLoader,
    fetcher: Arc<dyn ContentFetcher>,
    favorites: FavoriteStore,
    cache: CacheSettings,
    feed: FeedSettings,
}

impl FeedService {
    pub fn new(
        loader: CacheLoader,
        fetcher: Arc<dyn ContentFetcher>,
        favorites: FavoriteStore,
        settings: &Settings,
    ) -> Self {
        Self {
            loader,
            fetcher,
            favorites,
            cache: settings.cache.clone(),
            feed: settings.feed.clone(),
        }
    }

    /// Loads, composes and paginates one feed page.
    pub async fn load_page(&self, request: &FeedRequest) -> FeedPage {
        let list_key = CacheKey::List {
            kind: request.kind,
            tenant: request.tenant.clone(),
        };
        let items: Loaded<Vec<FeedItem>> = self
            .loader
            .load(
                &list_key,
                self.cache.list_ttl(),
                self.list_fetch(request.kind, &request.tenant),
            )
            .await;

        // Board lists keep their view and comment counters live even on a
        // fresh hit; the merged payload is announced like any refresh.
        if request.kind == ContentKind::BoardPost && items.from_cache && !items.is_stale {
            self.loader.revalidate_with(
                list_key,
                self.list_fetch(request.kind, &request.tenant),
                merge_counters(),
            );
        }

        let placements: Loaded<Vec<FeaturedPlacement>> = self
            .loader
            .load(
                &CacheKey::Placements {
                    kind: request.kind,
                    tenant: request.tenant.clone(),
                },
                self.cache.list_ttl(),
                self.placements_fetch(request.kind, &request.tenant),
            )
            .await;

        let config = self.app_config(None).await;

        let favorites = match (&request.user, request.filters.favorites_only) {
            (Some(user), true) => {
                self.favorites
                    .load(request.kind, &request.tenant, user)
                    .await
            }
            _ => HashSet::new(),
        };

        let now = OffsetDateTime::now_utc();
        let composed = compose(
            &items.data,
            &request.filters,
            &favorites,
            request.sort,
            now,
        );

        let default_page_size = self.feed.page_size_non_zero();
        let page_size =
            NonZeroUsize::new(config.data.items_per_page(request.kind, default_page_size.get()))
                .unwrap_or(default_page_size);
        let page = request.page.max(1);
        let paged = paginate_with_featured(
            &composed,
            &items.data,
            &placements.data,
            &request.filters.tab,
            page,
            page_size,
            timezone::localized_date(now, self.feed.tz()),
        );

        FeedPage {
            entries: paged.entries,
            page,
            total_pages: paged.total_pages,
            total_items: paged.total_items,
            is_stale: items.is_stale,
        }
    }

    /// Single content record for a detail screen.
    pub async fn item(
        &self,
        kind: ContentKind,
        id: i64,
        tenant: &TenantCode,
    ) -> Loaded<Option<FeedItem>> {
        let key = CacheKey::Item {
            kind,
            id,
            tenant: tenant.clone(),
        };
        let fetcher = Arc::clone(&self.fetcher);
        let tenant = tenant.clone();
        self.loader
            .load(&key, self.cache.item_ttl(), move || async move {
                fetcher
                    .fetch_item(kind, id, &tenant)
                    .await
                    .map(|dto| Some(FeedItem::from_dto(dto)))
            })
            .await
    }

    /// Detail body, cached apart from the record so list payloads stay small.
    pub async fn item_body(
        &self,
        kind: ContentKind,
        id: i64,
        tenant: &TenantCode,
    ) -> Loaded<Option<String>> {
        let key = CacheKey::ItemBody {
            kind,
            id,
            tenant: tenant.clone(),
        };
        let fetcher = Arc::clone(&self.fetcher);
        let tenant = tenant.clone();
        self.loader
            .load(&key, self.cache.item_ttl(), move || async move {
                fetcher
                    .fetch_item(kind, id, &tenant)
                    .await
                    .map(|dto| dto.content)
            })
            .await
    }

    /// Public URL for a stored asset file name, cached for a day.
    pub async fn asset_url(&self, file: &str) -> Loaded<String> {
        let key = CacheKey::AssetUrl { file: file.into() };
        let fetcher = Arc::clone(&self.fetcher);
        let file = file.to_string();
        self.loader
            .load(&key, self.cache.asset_url_ttl(), move || async move {
                fetcher.resolve_asset_url(&file).await
            })
            .await
    }

    /// Remote config map through the normal SWR path.
    pub async fn app_config(&self, tenant: Option<&TenantCode>) -> Loaded<AppConfig> {
        self.loader
            .load(
                &CacheKey::AppConfig {
                    tenant: tenant.cloned(),
                },
                self.cache.config_ttl(),
                self.config_fetch(tenant),
            )
            .await
    }

    /// Forced config refresh for cold start and returns-to-foreground, when
    /// the server side may have changed under us. Freshness is not consulted;
    /// a failed fetch degrades to the cached map of any age.
    pub async fn refresh_app_config(&self, tenant: Option<&TenantCode>) -> Loaded<AppConfig> {
        self.loader
            .refresh(
                &CacheKey::AppConfig {
                    tenant: tenant.cloned(),
                },
                self.config_fetch(tenant),
            )
            .await
    }

    /// Keeps a visible feed warm: revalidates its list on a fixed cadence
    /// until the returned subscription is stopped or dropped. Board lists
    /// merge counters instead of replacing wholesale.
    pub fn subscribe_list(&self, kind: ContentKind, tenant: &TenantCode) -> RefreshSubscription {
        let key = CacheKey::List {
            kind,
            tenant: tenant.clone(),
        };
        let fetcher = Arc::clone(&self.fetcher);
        let tenant = tenant.clone();
        let make_fetch = move || {
            let fetcher = Arc::clone(&fetcher);
            let tenant = tenant.clone();
            async move { fetcher.list_items(kind, &tenant).await.map(FeedItem::ingest) }
        };
        let merge = if kind == ContentKind::BoardPost {
            merge_counters()
        } else {
            replace_payload()
        };
        RefreshSubscription::start_with(
            self.loader.clone(),
            key,
            self.cache.refresh_interval(),
            make_fetch,
            merge,
        )
    }

    /// Key notifications for settled fetches, so an active view can re-read
    /// after a background refresh lands.
    pub fn subscribe_updates(&self) -> tokio::sync::broadcast::Receiver<CacheKey> {
        self.loader.subscribe()
    }

    pub async fn toggle_favorite(
        &self,
        kind: ContentKind,
        tenant: &TenantCode,
        user: &UserId,
        id: i64,
    ) -> Result<bool, FavoriteError> {
        self.favorites.toggle(kind, tenant, user, id).await
    }

    fn list_fetch(&self, kind: ContentKind, tenant: &TenantCode) -> ListFetch<Vec<FeedItem>> {
        let fetcher = Arc::clone(&self.fetcher);
        let tenant = tenant.clone();
        Box::new(move || {
            async move { fetcher.list_items(kind, &tenant).await.map(FeedItem::ingest) }.boxed()
        })
    }

    fn placements_fetch(
        &self,
        kind: ContentKind,
        tenant: &TenantCode,
    ) -> ListFetch<Vec<FeaturedPlacement>> {
        let fetcher = Arc::clone(&self.fetcher);
        let tenant = tenant.clone();
        Box::new(move || {
            async move {
                fetcher
                    .list_placements(kind, &tenant)
                    .await
                    .map(FeaturedPlacement::ingest)
            }
            .boxed()
        })
    }

    fn config_fetch(&self, tenant: Option<&TenantCode>) -> ListFetch<AppConfig> {
        let fetcher = Arc::clone(&self.fetcher);
        let tenant = tenant.cloned();
        Box::new(move || {
            async move {
                fetcher
                    .fetch_config(tenant.as_ref())
                    .await
                    .map(AppConfig::new)
            }
            .boxed()
        })
    }
}

/// Fetch closure shape handed to the loader.
type ListFetch<T> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T, FetchError>> + Send>;

/// Counter merge for board lists: keeps the cached rows and overlays the
/// live `views` and `comment_count` by id. Rows the fresh payload no longer
/// carries stay as cached; rows it added wait for the next full replace.
fn merge_counters() -> MergeFn {
    Arc::new(|previous, fresh| {
        let Some(Value::Array(cached)) = previous else {
            return fresh;
        };
        let empty = Vec::new();
        let fresh_rows = fresh.as_array().unwrap_or(&empty);
        let merged = cached
            .iter()
            .map(|row| {
                let mut row = row.clone();
                let id = row.get("id").cloned();
                if let (Some(id), Some(fields)) = (id, row.as_object_mut())
                    && let Some(latest) = fresh_rows.iter().find(|candidate| {
                        candidate.get("id") == Some(&id)
                    })
                {
                    for counter in ["views", "comment_count"] {
                        if let Some(value) = latest.get(counter) {
                            fields.insert(counter.to_string(), value.clone());
                        }
                    }
                }
                row
            })
            .collect();
        Value::Array(merged)
    })
}
