//! Default `ContentFetcher` over the community content HTTP API.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::histogram;
use serde::de::DeserializeOwned;
use tracing::debug;

use campanile_api_types::{
    AssetUrlEnvelope, ConfigEnvelope, FeaturedEnvelope, ItemDto, ItemEnvelope, ItemListEnvelope,
    PlacementDto,
};

use crate::config::HttpSettings;
use crate::domain::types::{ContentKind, TenantCode};

use super::fetch::{ContentFetcher, FetchError};

pub(crate) const METRIC_FETCH_MS: &str = "campanile_fetch_ms";

pub struct HttpContentFetcher {
    base_url: String,
    client: reqwest::Client,
}

impl HttpContentFetcher {
    pub fn new(settings: &HttpSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs_non_zero().get()))
            .build()
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "content api request");
        let started_at = Instant::now();
        let result = self.request(&url, query).await;
        let outcome = if result.is_ok() { "ok" } else { "error" };
        histogram!(METRIC_FETCH_MS, "outcome" => outcome)
            .record(started_at.elapsed().as_secs_f64() * 1000.0);
        result
    }

    async fn request<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|err| FetchError::Decode(err.to_string()))
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn list_items(
        &self,
        kind: ContentKind,
        tenant: &TenantCode,
    ) -> Result<Vec<ItemDto>, FetchError> {
        let envelope: ItemListEnvelope = self
            .get_json(
                &format!("/api/{}", kind.api_path()),
                &[("university", tenant.as_str())],
            )
            .await?;
        if !envelope.success {
            return Err(FetchError::Rejected);
        }
        Ok(envelope.items)
    }

    async fn fetch_item(
        &self,
        kind: ContentKind,
        id: i64,
        tenant: &TenantCode,
    ) -> Result<ItemDto, FetchError> {
        let envelope: ItemEnvelope = self
            .get_json(
                &format!("/api/{}/{id}", kind.api_path()),
                &[("university", tenant.as_str())],
            )
            .await?;
        if !envelope.success {
            return Err(FetchError::Rejected);
        }
        Ok(envelope.item)
    }

    async fn list_placements(
        &self,
        kind: ContentKind,
        tenant: &TenantCode,
    ) -> Result<Vec<PlacementDto>, FetchError> {
        let envelope: FeaturedEnvelope = self
            .get_json(
                "/api/featured",
                &[("university", tenant.as_str()), ("type", kind.as_str())],
            )
            .await?;
        if !envelope.success {
            return Err(FetchError::Rejected);
        }
        Ok(envelope.featured)
    }

    async fn fetch_config(
        &self,
        tenant: Option<&TenantCode>,
    ) -> Result<HashMap<String, serde_json::Value>, FetchError> {
        let envelope: ConfigEnvelope = match tenant {
            Some(tenant) => {
                self.get_json("/api/config", &[("university", tenant.as_str())])
                    .await?
            }
            None => self.get_json("/api/config", &[]).await?,
        };
        if !envelope.success {
            return Err(FetchError::Rejected);
        }
        Ok(envelope.config)
    }

    async fn resolve_asset_url(&self, file: &str) -> Result<String, FetchError> {
        let envelope: AssetUrlEnvelope = self
            .get_json("/api/asset-url", &[("filename", file)])
            .await?;
        if !envelope.success {
            return Err(FetchError::Rejected);
        }
        Ok(envelope.url)
    }
}
