//! Page-level orchestration: fetch collections concurrently from the live
//! provider and decide, per collection, whether to substitute fallback data.

use serde::Serialize;
use std::future::Future;
use tracing::{error, info, warn};

use crate::fallback::FallbackProvider;
use crate::provider::{CmsError, CmsResult, ContentProvider};
use crate::types::{Article, Card, CollectionResult, Entity, Organization, Page};

/// Which failures switch a collection over to fallback data.
///
/// Network failures always fall back. Malformed responses never do: they
/// surface as an unavailable, empty collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackPolicy {
    pub on_http_error: bool,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            on_http_error: true,
        }
    }
}

impl FallbackPolicy {
    pub fn network_only() -> Self {
        Self {
            on_http_error: false,
        }
    }

    pub fn should_fall_back(&self, err: &CmsError) -> bool {
        match err {
            CmsError::Network { .. } => true,
            CmsError::Http { .. } => self.on_http_error,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    Live,
    Fallback { reason: String },
    Unavailable { reason: String },
}

impl DataSource {
    pub fn status_message(&self) -> String {
        match self {
            DataSource::Live => "live data".to_string(),
            DataSource::Fallback { reason } => format!("fallback data, reason: {}", reason),
            DataSource::Unavailable { reason } => format!("no data, reason: {}", reason),
        }
    }
}

/// One collection as handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct Section<E> {
    pub collection: &'static str,
    pub data: CollectionResult<E>,
    pub source: DataSource,
}

impl<E> Section<E> {
    pub fn is_live(&self) -> bool {
        self.source == DataSource::Live
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, DataSource::Fallback { .. })
    }
}

/// Result of a single-record lookup together with where it came from.
#[derive(Debug, Clone)]
pub struct Lookup<E> {
    pub item: Option<E>,
    pub source: DataSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageLoad {
    pub articles: Section<Article>,
    pub organizations: Section<Organization>,
    pub pages: Section<Page>,
}

impl PageLoad {
    pub fn all_live(&self) -> bool {
        self.articles.is_live() && self.organizations.is_live() && self.pages.is_live()
    }

    pub fn sources(&self) -> [(&'static str, &DataSource); 3] {
        [
            (self.articles.collection, &self.articles.source),
            (self.organizations.collection, &self.organizations.source),
            (self.pages.collection, &self.pages.source),
        ]
    }

    /// "live data" when every collection is live, otherwise one entry per
    /// collection.
    pub fn status_message(&self) -> String {
        if self.all_live() {
            return DataSource::Live.status_message();
        }

        self.sources()
            .iter()
            .map(|(collection, source)| format!("{}: {}", collection, source.status_message()))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub struct Gateway<P, F = FallbackProvider> {
    live: P,
    fallback: F,
    policy: FallbackPolicy,
}

impl<P> Gateway<P, FallbackProvider> {
    pub fn new(live: P) -> Self {
        Self::with_fallback(live, FallbackProvider::new())
    }
}

impl<P, F> Gateway<P, F> {
    pub fn with_fallback(live: P, fallback: F) -> Self {
        Self {
            live,
            fallback,
            policy: FallbackPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    pub fn live(&self) -> &P {
        &self.live
    }

    async fn settle<E, Fut>(
        &self,
        result: CmsResult<CollectionResult<E>>,
        fallback: impl FnOnce() -> Fut,
    ) -> Section<E>
    where
        E: Entity,
        Fut: Future<Output = CmsResult<CollectionResult<E>>>,
    {
        let (data, source) = match result {
            Ok(data) => (data, DataSource::Live),
            Err(err) if self.policy.should_fall_back(&err) => {
                let reason = err.to_string();
                warn!("Using fallback {}: {}", E::COLLECTION, reason);
                match fallback().await {
                    Ok(data) => (data, DataSource::Fallback { reason }),
                    Err(fallback_err) => {
                        error!("Fallback {} failed: {}", E::COLLECTION, fallback_err);
                        (
                            CollectionResult::empty(),
                            DataSource::Unavailable {
                                reason: format!("{}; fallback failed: {}", reason, fallback_err),
                            },
                        )
                    }
                }
            }
            Err(err) => {
                error!("Cannot load {}: {}", E::COLLECTION, err);
                (
                    CollectionResult::empty(),
                    DataSource::Unavailable {
                        reason: err.to_string(),
                    },
                )
            }
        };

        Section {
            collection: E::COLLECTION,
            data,
            source,
        }
    }

    /// Every record of `E`, live or substituted.
    pub async fn load_collection<E>(&self) -> Section<E>
    where
        E: Entity,
        P: ContentProvider<E>,
        F: ContentProvider<E>,
    {
        let result = self.live.get_all().await;
        self.settle(result, || self.fallback.get_all()).await
    }

    pub async fn load_featured<E>(&self, limit: u32) -> Section<E>
    where
        E: Entity,
        P: ContentProvider<E>,
        F: ContentProvider<E>,
    {
        let result = self.live.get_featured(limit).await;
        self.settle(result, || self.fallback.get_featured(limit))
            .await
    }

    pub async fn find_by_slug<E>(&self, slug: &str) -> Lookup<E>
    where
        E: Entity,
        P: ContentProvider<E>,
        F: ContentProvider<E>,
    {
        match self.live.get_by_slug(slug).await {
            Ok(item) => Lookup {
                item,
                source: DataSource::Live,
            },
            Err(err) if self.policy.should_fall_back(&err) => {
                let reason = err.to_string();
                warn!("Looking up {} '{}' in fallback: {}", E::COLLECTION, slug, reason);
                match self.fallback.get_by_slug(slug).await {
                    Ok(item) => Lookup {
                        item,
                        source: DataSource::Fallback { reason },
                    },
                    Err(fallback_err) => Lookup {
                        item: None,
                        source: DataSource::Unavailable {
                            reason: format!("{}; fallback failed: {}", reason, fallback_err),
                        },
                    },
                }
            }
            Err(err) => Lookup {
                item: None,
                source: DataSource::Unavailable {
                    reason: err.to_string(),
                },
            },
        }
    }

    pub async fn load_cards(&self) -> Section<Card>
    where
        P: ContentProvider<Card>,
        F: ContentProvider<Card>,
    {
        self.load_collection::<Card>().await
    }

    /// Fetches articles, organizations and pages concurrently. A slow or
    /// failed collection never holds back the others' outcome.
    pub async fn load_page(&self) -> PageLoad
    where
        P: ContentProvider<Article> + ContentProvider<Organization> + ContentProvider<Page>,
        F: ContentProvider<Article> + ContentProvider<Organization> + ContentProvider<Page>,
    {
        let (articles, organizations, pages) = tokio::join!(
            self.load_collection::<Article>(),
            self.load_collection::<Organization>(),
            self.load_collection::<Page>(),
        );

        let load = PageLoad {
            articles,
            organizations,
            pages,
        };
        info!("Page loaded: {}", load.status_message());
        load
    }
}
