//! Periodic revalidation tied to an active view.
//!
//! A screen that stays on a feed keeps its cache warm by starting a
//! subscription; leaving the screen stops it. Stopping is graceful: a tick
//! already fetching finishes and lands in the cache, it is only the timer
//! that dies.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::infra::fetch::FetchError;

use super::keys::CacheKey;
use super::loader::{CacheLoader, MergeFn, erase, replace_payload};

pub struct RefreshSubscription {
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl RefreshSubscription {
    /// Revalidates `key` every `period`, starting one period from now. The
    /// loop joins any flight already running on the key instead of stacking
    /// a second fetch on top of it.
    pub fn start<T, F, Fut>(loader: CacheLoader, key: CacheKey, period: Duration, make_fetch: F) -> Self
    where
        T: Serialize + Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        Self::start_with(loader, key, period, make_fetch, replace_payload())
    }

    pub fn start_with<T, F, Fut>(
        loader: CacheLoader,
        key: CacheKey,
        period: Duration,
        make_fetch: F,
        merge: MergeFn,
    ) -> Self
    where
        T: Serialize + Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // Skip the first immediate tick
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let fut = make_fetch();
                        loader
                            .revalidate_now(key.clone(), erase(move || fut), merge.clone())
                            .await;
                    }
                    _ = &mut stop_rx => {
                        debug!(%key, "periodic refresh stopped");
                        break;
                    }
                }
            }
        });
        Self {
            stop: Some(stop_tx),
            handle,
        }
    }

    /// No further ticks fire after this returns. A revalidation already in
    /// flight still completes and updates the cache.
    pub fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for RefreshSubscription {
    fn drop(&mut self) {
        // Closing the channel wakes the loop the same way stop() does.
        self.stop.take();
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::Value;
    use time::OffsetDateTime;

    use crate::cache::entry::StoredEnvelope;
    use crate::cache::store::CacheStore;
    use crate::infra::kv::{KvStore, MemoryKvStore};

    use super::*;

    fn loader() -> (Arc<MemoryKvStore>, CacheLoader) {
        let kv = Arc::new(MemoryKvStore::default());
        let store = Arc::new(CacheStore::new(kv.clone(), NonZeroUsize::new(16).unwrap()));
        (kv, CacheLoader::new(store))
    }

    fn key() -> CacheKey {
        CacheKey::AssetUrl {
            file: "banner.png".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_refresh_fires_one_period_in() {
        let (_kv, loader) = loader();
        let calls = Arc::new(AtomicUsize::new(0));
        let task_calls = calls.clone();

        let subscription = RefreshSubscription::start(
            loader.clone(),
            key(),
            Duration::from_secs(120),
            move || {
                task_calls.fetch_add(1, Ordering::SeqCst);
                futures::future::ready(Ok::<_, FetchError>("tick".to_string()))
            },
        );

        tokio::time::advance(Duration::from_secs(119)).await;
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(120)).await;
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        subscription.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_result_lands_in_store() {
        let (kv, loader) = loader();
        let envelope = StoredEnvelope::new(
            serde_json::json!("stale"),
            OffsetDateTime::now_utc() - time::Duration::hours(1),
        );
        kv.set(&key().storage_key(), serde_json::to_string(&envelope).unwrap())
            .await
            .unwrap();

        let _subscription = RefreshSubscription::start(
            loader.clone(),
            key(),
            Duration::from_secs(120),
            || futures::future::ready(Ok::<_, FetchError>("refreshed".to_string())),
        );

        tokio::time::advance(Duration::from_secs(120)).await;
        tokio::task::yield_now().await;

        let entry = loader.store().get::<Value>(&key()).await.unwrap();
        assert_eq!(entry.payload, serde_json::json!("refreshed"));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_future_ticks() {
        let (_kv, loader) = loader();
        let calls = Arc::new(AtomicUsize::new(0));
        let task_calls = calls.clone();

        let subscription = RefreshSubscription::start(
            loader,
            key(),
            Duration::from_secs(120),
            move || {
                task_calls.fetch_add(1, Ordering::SeqCst);
                futures::future::ready(Ok::<_, FetchError>("tick".to_string()))
            },
        );

        tokio::time::advance(Duration::from_secs(120)).await;
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        subscription.stop();
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(600)).await;
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_subscription_stops_the_loop() {
        let (_kv, loader) = loader();
        let calls = Arc::new(AtomicUsize::new(0));
        let task_calls = calls.clone();

        let subscription = RefreshSubscription::start(
            loader,
            key(),
            Duration::from_secs(120),
            move || {
                task_calls.fetch_add(1, Ordering::SeqCst);
                futures::future::ready(Ok::<_, FetchError>("tick".to_string()))
            },
        );
        assert!(subscription.is_active());
        drop(subscription);
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(600)).await;
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
