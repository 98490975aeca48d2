use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::normalize::FromWire;

/// Canonical content type shared by the live client and the fallback
/// dataset. Downstream code only ever sees values of these types.
pub trait Entity: FromWire + Clone + fmt::Debug + Send + Sync + 'static {
    /// Collection name as it appears in `/api/{collection}`.
    const COLLECTION: &'static str;
    /// Relations requested by default when listing the collection.
    const DEFAULT_POPULATE: &'static [&'static str];
    /// Sort tokens requested by default when listing the collection.
    const DEFAULT_SORT: &'static [&'static str];
    /// Whether records carry a unique `slug` that can be filtered on.
    const HAS_SLUG: bool;

    fn id(&self) -> i64;

    fn slug(&self) -> Option<&str> {
        None
    }

    fn is_featured(&self) -> bool;

    /// Ordering matching [`Entity::DEFAULT_SORT`], used where the data is
    /// sorted in-process instead of by the backend.
    fn default_order(&self, other: &Self) -> Ordering;

    /// Returns the same entity with every media URL resolved by `resolve`.
    fn map_media<F>(self, resolve: &F) -> Self
    where
        F: Fn(&str) -> String;
}

/// Timestamps and identity shared by articles, organizations and pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub id: i64,
    /// Only present in the flat schema.
    pub document_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// `None` marks an unpublished draft.
    pub published_at: Option<DateTime<Utc>>,
}

impl EntityMeta {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            document_id: None,
            created_at: None,
            updated_at: None,
            published_at: None,
        }
    }

    pub fn is_draft(&self) -> bool {
        self.published_at.is_none()
    }
}

/// Rich-text field value: either a plain string or a block document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RichText {
    PlainText(String),
    BlockDocument(Vec<Block>),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub children: Vec<Leaf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaf {
    pub text: String,
}

impl Default for RichText {
    fn default() -> Self {
        Self::PlainText(String::new())
    }
}

impl RichText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::PlainText(text.into())
    }

    /// A block document with one paragraph per entry.
    pub fn paragraphs<I, S>(paragraphs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::BlockDocument(paragraphs.into_iter().map(Block::text).collect())
    }

    /// Flattens the value to plain text. Leaf texts within a block are
    /// concatenated as is; blocks are joined with a single space.
    pub fn extract_text(&self) -> String {
        match self {
            Self::PlainText(text) => text.clone(),
            Self::BlockDocument(blocks) => blocks
                .iter()
                .map(Block::extract_text)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl Block {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            children: vec![Leaf { text: text.into() }],
        }
    }

    pub fn extract_text(&self) -> String {
        self.children.iter().map(|leaf| leaf.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFormat {
    pub name: String,
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub mime: Option<String>,
    /// Kilobytes, as reported by the backend.
    pub size: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub id: i64,
    pub name: String,
    pub alternative_text: Option<String>,
    pub caption: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub mime: Option<String>,
    pub size: Option<f64>,
    /// May be relative to the backend base URL until resolved.
    pub url: String,
    /// Smaller renditions keyed by tier (`thumbnail`, `small`, ...).
    pub formats: BTreeMap<String, MediaFormat>,
}

impl Media {
    pub fn map_urls<F>(mut self, resolve: &F) -> Self
    where
        F: Fn(&str) -> String,
    {
        self.url = resolve(&self.url);
        for format in self.formats.values_mut() {
            format.url = resolve(&format.url);
        }
        self
    }
}

/// Where an article's content comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ContentOrigin {
    #[default]
    Internal,
    External,
    Other(String),
}

impl ContentOrigin {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "Internal" => Self::Internal,
            "External" => Self::External,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Internal => "Internal",
            Self::External => "External",
            Self::Other(tag) => tag,
        }
    }
}

impl fmt::Display for ContentOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ContentOrigin {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ContentOrigin {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::parse(&tag))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub meta: EntityMeta,
    pub title: String,
    pub content: RichText,
    pub excerpt: Option<String>,
    pub slug: String,
    pub author: String,
    pub featured: bool,
    pub provider: ContentOrigin,
    /// Always set when `provider` is [`ContentOrigin::External`].
    pub external_link: Option<String>,
    pub featured_image: Option<Media>,
}

impl Article {
    /// The excerpt, or the full flattened content when there is none.
    /// Truncation for previews is left to the caller.
    pub fn summary(&self) -> String {
        match &self.excerpt {
            Some(excerpt) if !excerpt.is_empty() => excerpt.clone(),
            _ => self.content.extract_text(),
        }
    }

    pub fn is_external(&self) -> bool {
        self.provider == ContentOrigin::External
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub meta: EntityMeta,
    pub name: String,
    pub description: RichText,
    pub website: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub logo: Option<Media>,
    pub featured: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub meta: EntityMeta,
    pub title: String,
    pub slug: String,
    pub content: RichText,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub featured_image: Option<Media>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub title: String,
    pub content: RichText,
    pub icon: Option<String>,
    pub bg_color: Option<String>,
    pub text_color: Option<String>,
    pub button_text: Option<String>,
    pub button_link: Option<String>,
    pub featured: bool,
}

impl Card {
    /// Button label and target, only when both are present.
    pub fn button(&self) -> Option<(&str, &str)> {
        match (&self.button_text, &self.button_link) {
            (Some(text), Some(link)) => Some((text.as_str(), link.as_str())),
            _ => None,
        }
    }
}

impl Entity for Article {
    const COLLECTION: &'static str = "articles";
    const DEFAULT_POPULATE: &'static [&'static str] = &["featuredImage"];
    const DEFAULT_SORT: &'static [&'static str] = &["publishedAt:desc"];
    const HAS_SLUG: bool = true;

    fn id(&self) -> i64 {
        self.meta.id
    }

    fn slug(&self) -> Option<&str> {
        Some(&self.slug)
    }

    fn is_featured(&self) -> bool {
        self.featured
    }

    fn default_order(&self, other: &Self) -> Ordering {
        // Newest first; drafts sink to the end.
        match (self.meta.published_at, other.meta.published_at) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| self.meta.id.cmp(&other.meta.id))
    }

    fn map_media<F>(mut self, resolve: &F) -> Self
    where
        F: Fn(&str) -> String,
    {
        self.featured_image = self.featured_image.map(|media| media.map_urls(resolve));
        self
    }
}

impl Entity for Organization {
    const COLLECTION: &'static str = "organizations";
    const DEFAULT_POPULATE: &'static [&'static str] = &["logo"];
    const DEFAULT_SORT: &'static [&'static str] = &["name:asc"];
    const HAS_SLUG: bool = false;

    fn id(&self) -> i64 {
        self.meta.id
    }

    fn is_featured(&self) -> bool {
        self.featured
    }

    fn default_order(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.meta.id.cmp(&other.meta.id))
    }

    fn map_media<F>(mut self, resolve: &F) -> Self
    where
        F: Fn(&str) -> String,
    {
        self.logo = self.logo.map(|media| media.map_urls(resolve));
        self
    }
}

impl Entity for Page {
    const COLLECTION: &'static str = "pages";
    const DEFAULT_POPULATE: &'static [&'static str] = &["featuredImage"];
    const DEFAULT_SORT: &'static [&'static str] = &[];
    const HAS_SLUG: bool = true;

    fn id(&self) -> i64 {
        self.meta.id
    }

    fn slug(&self) -> Option<&str> {
        Some(&self.slug)
    }

    fn is_featured(&self) -> bool {
        false
    }

    fn default_order(&self, other: &Self) -> Ordering {
        self.meta.id.cmp(&other.meta.id)
    }

    fn map_media<F>(mut self, resolve: &F) -> Self
    where
        F: Fn(&str) -> String,
    {
        self.featured_image = self.featured_image.map(|media| media.map_urls(resolve));
        self
    }
}

impl Entity for Card {
    const COLLECTION: &'static str = "cards";
    const DEFAULT_POPULATE: &'static [&'static str] = &[];
    const DEFAULT_SORT: &'static [&'static str] = &[];
    const HAS_SLUG: bool = false;

    fn id(&self) -> i64 {
        self.id
    }

    fn is_featured(&self) -> bool {
        self.featured
    }

    fn default_order(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }

    fn map_media<F>(self, _resolve: &F) -> Self
    where
        F: Fn(&str) -> String,
    {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub page_count: u32,
    pub total: u32,
}

impl Pagination {
    /// Builds pagination metadata with `page_count = ceil(total / page_size)`.
    pub fn new(page: u32, page_size: u32, total: u32) -> Self {
        let page_count = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size)
        };

        Self {
            page,
            page_size,
            page_count,
            total,
        }
    }

    /// Everything on one page.
    pub fn single_page(len: usize) -> Self {
        let len = u32::try_from(len).unwrap_or(u32::MAX);
        Self::new(1, len, len)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionResult<E> {
    pub data: Vec<E>,
    pub pagination: Pagination,
}

impl<E> CollectionResult<E> {
    pub fn new(data: Vec<E>, pagination: Pagination) -> Self {
        Self { data, pagination }
    }

    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            pagination: Pagination::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_first(self) -> Option<E> {
        self.data.into_iter().next()
    }

    pub fn map<T, F>(self, f: F) -> CollectionResult<T>
    where
        F: FnMut(E) -> T,
    {
        CollectionResult {
            data: self.data.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}
