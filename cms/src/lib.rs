pub mod client;
pub mod config;
pub mod fallback;
pub mod gateway;
pub mod normalize;
pub mod provider;
pub mod query;
pub mod transport;
pub mod types;

pub use client::CmsClient;
pub use config::CmsConfig;
pub use fallback::{FallbackEntity, FallbackProvider, FALLBACK_PAGE_SIZE};
pub use gateway::{DataSource, FallbackPolicy, Gateway, Lookup, PageLoad, Section};
pub use normalize::{normalize_collection, normalize_single, FromWire, WireRecord};
pub use provider::{CmsError, CmsResult, ContentProvider};
pub use query::{Filter, Method, Populate, PublicationState, Query, RequestDescriptor};
pub use transport::{resolve_media_url, HttpTransport, RawResult, Transport};
pub use types::{
    Article, Block, Card, CollectionResult, ContentOrigin, Entity, EntityMeta, Leaf, Media,
    MediaFormat, Organization, Page, Pagination, RichText,
};

pub mod prelude {
    pub use crate::client::*;
    pub use crate::config::*;
    pub use crate::gateway::*;
    pub use crate::provider::*;
    pub use crate::query::*;
    pub use crate::types::*;
}
