use async_trait::async_trait;
use std::fmt;
use tracing::{debug, error, info};

use crate::config::CmsConfig;
use crate::normalize::{normalize_collection, normalize_single};
use crate::provider::{CmsError, CmsResult, ContentProvider};
use crate::query::{Filter, Populate, Query, RequestDescriptor};
use crate::transport::{resolve_media_url, HttpTransport, Transport};
use crate::types::{CollectionResult, Entity};

/// Live CMS client. Each instance owns its transport and configuration;
/// nothing is shared between instances.
pub struct CmsClient<T: Transport = HttpTransport> {
    transport: T,
}

impl CmsClient<HttpTransport> {
    pub fn new(config: CmsConfig) -> CmsResult<Self> {
        Ok(Self::with_transport(HttpTransport::new(&config)?))
    }

    pub fn with_default_config() -> CmsResult<Self> {
        Self::new(CmsConfig::default())
    }
}

impl<T: Transport> CmsClient<T> {
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// Absolute URL for a media path returned by the backend.
    pub fn media_url(&self, url: &str) -> String {
        resolve_media_url(self.transport.base_url(), url)
    }

    /// Collection defaults (populate + sort) for `E`.
    pub fn default_query<E: Entity>() -> Query {
        let mut query = Query::new().with_sort(E::DEFAULT_SORT.iter().copied());
        if !E::DEFAULT_POPULATE.is_empty() {
            query = query.with_populate(Populate::list(E::DEFAULT_POPULATE.iter().copied()));
        }
        query
    }

    async fn send(&self, request: &RequestDescriptor) -> CmsResult<String> {
        let raw = self.transport.execute(request).await;
        match CmsError::check(raw) {
            Ok((_, body)) => Ok(body),
            Err(e) => {
                error!("{} {} failed: {}", request.method, request.path, e);
                Err(e)
            }
        }
    }

    fn resolve<E: Entity>(&self, entity: E) -> E {
        let base = self.transport.base_url();
        entity.map_media(&|url: &str| resolve_media_url(base, url))
    }

    /// Lists `E` with `query` sent as given (no collection defaults).
    pub async fn find<E: Entity>(&self, query: &Query) -> CmsResult<CollectionResult<E>> {
        debug!("Finding {}", E::COLLECTION);
        let body = self
            .send(&RequestDescriptor::find(E::COLLECTION, query))
            .await?;
        let result = normalize_collection::<E>(&body)?.map(|entity| self.resolve(entity));
        info!("Fetched {} {}", result.len(), E::COLLECTION);
        Ok(result)
    }

    /// Single record by id. A `data: null` body reads as `None`.
    pub async fn find_one<E: Entity>(
        &self,
        id: impl fmt::Display,
        query: &Query,
    ) -> CmsResult<Option<E>> {
        let body = self
            .send(&RequestDescriptor::find_one(E::COLLECTION, id, query))
            .await?;
        Ok(normalize_single::<E>(&body)?.map(|entity| self.resolve(entity)))
    }

    pub async fn get_by_id<E: Entity>(&self, id: impl fmt::Display) -> CmsResult<Option<E>> {
        let mut query = Query::new();
        if !E::DEFAULT_POPULATE.is_empty() {
            query = query.with_populate(Populate::list(E::DEFAULT_POPULATE.iter().copied()));
        }
        self.find_one::<E>(id, &query).await
    }

    /// Lists `E`, filling unset query parts from the collection defaults.
    pub async fn list<E: Entity>(&self, query: Query) -> CmsResult<CollectionResult<E>> {
        let query = query.merge_defaults(Self::default_query::<E>());
        self.find::<E>(&query).await
    }

    pub async fn create<E: Entity>(&self, fields: serde_json::Value) -> CmsResult<Option<E>> {
        let body = self
            .send(&RequestDescriptor::create(E::COLLECTION, fields))
            .await?;
        info!("Created {} record", E::COLLECTION);
        Ok(normalize_single::<E>(&body)?.map(|entity| self.resolve(entity)))
    }

    pub async fn update<E: Entity>(
        &self,
        id: impl fmt::Display,
        fields: serde_json::Value,
    ) -> CmsResult<Option<E>> {
        let body = self
            .send(&RequestDescriptor::update(E::COLLECTION, id, fields))
            .await?;
        info!("Updated {} record", E::COLLECTION);
        Ok(normalize_single::<E>(&body)?.map(|entity| self.resolve(entity)))
    }

    pub async fn delete<E: Entity>(&self, id: impl fmt::Display) -> CmsResult<()> {
        self.send(&RequestDescriptor::delete(E::COLLECTION, id))
            .await?;
        info!("Deleted {} record", E::COLLECTION);
        Ok(())
    }

    pub async fn health_check(&self) -> CmsResult<()> {
        debug!("Performing health check");
        self.send(&RequestDescriptor::health()).await?;
        info!("Health check passed");
        Ok(())
    }
}

#[async_trait]
impl<T: Transport, E: Entity> ContentProvider<E> for CmsClient<T> {
    async fn get_all(&self) -> CmsResult<CollectionResult<E>> {
        self.list::<E>(Query::new()).await
    }

    async fn get_featured(&self, limit: u32) -> CmsResult<CollectionResult<E>> {
        let query = Query::new()
            .with_filter(Filter::eq("featured", true))
            .limit(limit);
        self.list::<E>(query).await
    }

    async fn get_by_slug(&self, slug: &str) -> CmsResult<Option<E>> {
        if !E::HAS_SLUG {
            return Ok(None);
        }

        let query = Query::new().with_filter(Filter::eq("slug", slug));
        let found = self.list::<E>(query).await?;
        Ok(found.into_first())
    }

    fn provider_name(&self) -> &'static str {
        "live"
    }
}
