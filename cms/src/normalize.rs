//! Maps raw CMS response bodies onto the canonical entity types.
//!
//! Records arrive in one of two shapes and both stay supported:
//!
//! * nested: `{ "id": 1, "attributes": { ...fields } }`
//! * flat: `{ "id": 1, "documentId": "...", ...fields }`
//!
//! The presence of an `attributes` key picks the nested mapping. Each record
//! is detected on its own, so a response mixing both shapes still parses.
//! Any record that cannot be mapped fails the whole response.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::provider::{CmsError, CmsResult};
use crate::types::{
    Article, Block, Card, CollectionResult, ContentOrigin, Entity, EntityMeta, Leaf, Media,
    MediaFormat, Organization, Page, Pagination, RichText,
};

/// One raw record after shape detection.
#[derive(Debug, Clone, Copy)]
pub enum WireRecord<'a> {
    Nested {
        id: i64,
        attributes: &'a Map<String, Value>,
    },
    Flat {
        id: i64,
        document_id: Option<&'a str>,
        fields: &'a Map<String, Value>,
    },
}

impl<'a> WireRecord<'a> {
    pub fn detect(value: &'a Value) -> Result<Self, String> {
        let object = value
            .as_object()
            .ok_or_else(|| "record is not an object".to_string())?;

        let id = object
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| "record has no integer id".to_string())?;

        match object.get("attributes") {
            Some(Value::Object(attributes)) => Ok(WireRecord::Nested { id, attributes }),
            Some(_) => Err(format!("record {} has non-object attributes", id)),
            None => Ok(WireRecord::Flat {
                id,
                document_id: object.get("documentId").and_then(Value::as_str),
                fields: object,
            }),
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            WireRecord::Nested { id, .. } | WireRecord::Flat { id, .. } => *id,
        }
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, WireRecord::Nested { .. })
    }

    pub fn fields(&self) -> Fields<'a> {
        match self {
            WireRecord::Nested { attributes, .. } => Fields(*attributes),
            WireRecord::Flat { fields, .. } => Fields(*fields),
        }
    }

    pub fn meta(&self) -> Result<EntityMeta, String> {
        let fields = self.fields();
        let document_id = match self {
            WireRecord::Nested { .. } => None,
            WireRecord::Flat { document_id, .. } => document_id.map(str::to_string),
        };

        Ok(EntityMeta {
            id: self.id(),
            document_id,
            created_at: fields.timestamp("createdAt")?,
            updated_at: fields.timestamp("updatedAt")?,
            published_at: fields.timestamp("publishedAt")?,
        })
    }
}

/// Builds a canonical value from a shape-detected record.
pub trait FromWire: Sized {
    fn from_wire(record: &WireRecord<'_>) -> Result<Self, String>;
}

/// Typed accessors over a record's field map. `null` reads as absent.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a>(&'a Map<String, Value>);

impl<'a> Fields<'a> {
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    pub fn opt_str(&self, key: &str) -> Result<Option<String>, String> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(format!("field {} should be a string, got {}", key, other)),
        }
    }

    pub fn required_str(&self, key: &str) -> Result<String, String> {
        self.opt_str(key)?
            .ok_or_else(|| format!("missing required field {}", key))
    }

    pub fn non_empty_str(&self, key: &str) -> Result<String, String> {
        let value = self.required_str(key)?;
        if value.trim().is_empty() {
            return Err(format!("field {} must not be empty", key));
        }
        Ok(value)
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, String> {
        match self.get(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(format!("field {} should be a boolean, got {}", key, other)),
        }
    }

    pub fn opt_u32(&self, key: &str) -> Result<Option<u32>, String> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| format!("field {} should be a non-negative integer", key)),
        }
    }

    pub fn opt_f64(&self, key: &str) -> Result<Option<f64>, String> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| format!("field {} should be a number", key)),
        }
    }

    pub fn timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>, String> {
        match self.opt_str(key)? {
            None => Ok(None),
            Some(raw) => DateTime::parse_from_rfc3339(&raw)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| format!("field {} is not an RFC 3339 timestamp: {}", key, e)),
        }
    }

    pub fn rich_text(&self, key: &str) -> RichText {
        self.get(key).map(rich_text).unwrap_or_default()
    }

    pub fn media(&self, key: &str) -> Result<Option<Media>, String> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => media_relation(value).map_err(|e| format!("{}: {}", key, e)),
        }
    }
}

/// Interprets an arbitrary rich-text value. Strings stay plain, arrays are
/// read as block documents, everything else is empty text.
pub fn rich_text(value: &Value) -> RichText {
    match value {
        Value::String(text) => RichText::PlainText(text.clone()),
        Value::Array(nodes) => RichText::BlockDocument(nodes.iter().map(block).collect()),
        _ => RichText::default(),
    }
}

/// Flattens any rich-text value to plain text.
pub fn extract_text(value: &Value) -> String {
    rich_text(value).extract_text()
}

fn block(node: &Value) -> Block {
    let mut children = Vec::new();
    if let Some(nodes) = node.get("children").and_then(Value::as_array) {
        collect_leaves(nodes, &mut children);
    }
    Block { children }
}

/// Depth-first so inline wrappers (links, list items) keep document order.
fn collect_leaves(nodes: &[Value], out: &mut Vec<Leaf>) {
    for node in nodes {
        if let Some(text) = node.get("text").and_then(Value::as_str) {
            out.push(Leaf {
                text: text.to_string(),
            });
        } else if let Some(children) = node.get("children").and_then(Value::as_array) {
            collect_leaves(children, out);
        }
    }
}

/// Accepts `{ "data": record | [record] | null }` as well as a bare record.
fn media_relation(value: &Value) -> Result<Option<Media>, String> {
    let record = match value.get("data") {
        Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => match items.first() {
            Some(first) => first,
            None => return Ok(None),
        },
        Some(inner) => inner,
        None => value,
    };

    let wire = WireRecord::detect(record)?;
    Media::from_wire(&wire).map(Some)
}

impl FromWire for Media {
    fn from_wire(record: &WireRecord<'_>) -> Result<Self, String> {
        let fields = record.fields();

        let mut formats = BTreeMap::new();
        if let Some(raw) = fields.get("formats") {
            let tiers = raw
                .as_object()
                .ok_or_else(|| "formats should be an object".to_string())?;
            for (tier, format) in tiers {
                let format = format
                    .as_object()
                    .map(Fields)
                    .ok_or_else(|| format!("format {} should be an object", tier))?;
                formats.insert(
                    tier.clone(),
                    MediaFormat {
                        name: format.opt_str("name")?.unwrap_or_default(),
                        url: format.required_str("url")?,
                        width: format.opt_u32("width")?,
                        height: format.opt_u32("height")?,
                        mime: format.opt_str("mime")?,
                        size: format.opt_f64("size")?,
                    },
                );
            }
        }

        Ok(Media {
            id: record.id(),
            name: fields.opt_str("name")?.unwrap_or_default(),
            alternative_text: fields.opt_str("alternativeText")?,
            caption: fields.opt_str("caption")?,
            width: fields.opt_u32("width")?,
            height: fields.opt_u32("height")?,
            mime: fields.opt_str("mime")?,
            size: fields.opt_f64("size")?,
            url: fields.required_str("url")?,
            formats,
        })
    }
}

impl FromWire for Article {
    fn from_wire(record: &WireRecord<'_>) -> Result<Self, String> {
        let fields = record.fields();
        let provider = fields
            .opt_str("provider")?
            .map(|tag| ContentOrigin::parse(&tag))
            .unwrap_or_default();
        let external_link = fields.opt_str("externalLink")?;

        if provider == ContentOrigin::External && external_link.is_none() {
            return Err(format!(
                "article {} is external but has no externalLink",
                record.id()
            ));
        }

        Ok(Article {
            meta: record.meta()?,
            title: fields.non_empty_str("title")?,
            content: fields.rich_text("content"),
            excerpt: fields.opt_str("excerpt")?,
            slug: fields.non_empty_str("slug")?,
            author: fields.opt_str("author")?.unwrap_or_default(),
            featured: fields.bool_or("featured", false)?,
            provider,
            external_link,
            featured_image: fields.media("featuredImage")?,
        })
    }
}

impl FromWire for Organization {
    fn from_wire(record: &WireRecord<'_>) -> Result<Self, String> {
        let fields = record.fields();
        Ok(Organization {
            meta: record.meta()?,
            name: fields.non_empty_str("name")?,
            description: fields.rich_text("description"),
            website: fields.opt_str("website")?.unwrap_or_default(),
            email: fields.opt_str("email")?,
            phone: fields.opt_str("phone")?,
            logo: fields.media("logo")?,
            featured: fields.bool_or("featured", false)?,
        })
    }
}

impl FromWire for Page {
    fn from_wire(record: &WireRecord<'_>) -> Result<Self, String> {
        let fields = record.fields();
        Ok(Page {
            meta: record.meta()?,
            title: fields.non_empty_str("title")?,
            slug: fields.non_empty_str("slug")?,
            content: fields.rich_text("content"),
            meta_title: fields.opt_str("metaTitle")?,
            meta_description: fields.opt_str("metaDescription")?,
            featured_image: fields.media("featuredImage")?,
        })
    }
}

impl FromWire for Card {
    fn from_wire(record: &WireRecord<'_>) -> Result<Self, String> {
        let fields = record.fields();
        Ok(Card {
            id: record.id(),
            title: fields.non_empty_str("title")?,
            content: fields.rich_text("content"),
            icon: fields.opt_str("icon")?,
            bg_color: fields.opt_str("bgColor")?,
            text_color: fields.opt_str("textColor")?,
            button_text: fields.opt_str("buttonText")?,
            button_link: fields.opt_str("buttonLink")?,
            featured: fields.bool_or("featured", false)?,
        })
    }
}

fn parse_body(body: &str) -> CmsResult<Value> {
    serde_json::from_str(body)
        .map_err(|e| CmsError::malformed(format!("response is not valid JSON: {}", e)))
}

fn map_record<E: Entity>(index: usize, value: &Value) -> CmsResult<E> {
    WireRecord::detect(value)
        .and_then(|record| E::from_wire(&record))
        .map_err(|e| CmsError::malformed(format!("{} record {}: {}", E::COLLECTION, index, e)))
}

/// Parses a collection response (`{ "data": [...], "meta": {...} }`).
pub fn normalize_collection<E: Entity>(body: &str) -> CmsResult<CollectionResult<E>> {
    normalize_collection_value(&parse_body(body)?)
}

pub fn normalize_collection_value<E: Entity>(value: &Value) -> CmsResult<CollectionResult<E>> {
    let data = value
        .get("data")
        .ok_or_else(|| CmsError::malformed(format!("{} response has no data key", E::COLLECTION)))?;
    let records = data.as_array().ok_or_else(|| {
        CmsError::malformed(format!("{} response data is not an array", E::COLLECTION))
    })?;

    let entities = records
        .iter()
        .enumerate()
        .map(|(index, record)| map_record::<E>(index, record))
        .collect::<CmsResult<Vec<E>>>()?;

    let pagination = pagination_from_meta(value.get("meta"), entities.len())
        .map_err(|e| CmsError::malformed(format!("{} pagination: {}", E::COLLECTION, e)))?;

    if entities.len() > pagination.page_size as usize {
        return Err(CmsError::malformed(format!(
            "{} response holds {} records but pageSize is {}",
            E::COLLECTION,
            entities.len(),
            pagination.page_size
        )));
    }

    Ok(CollectionResult::new(entities, pagination))
}

/// Parses a single-record response (`{ "data": {...} | null }`).
pub fn normalize_single<E: Entity>(body: &str) -> CmsResult<Option<E>> {
    let value = parse_body(body)?;
    let data = value
        .get("data")
        .ok_or_else(|| CmsError::malformed(format!("{} response has no data key", E::COLLECTION)))?;

    if data.is_null() {
        return Ok(None);
    }

    map_record::<E>(0, data).map(Some)
}

/// Page-based meta is kept, offset-based meta (`start`/`limit`) is converted,
/// and a missing block means everything arrived on one page. The page count
/// is always recomputed from `total` and the page size.
fn pagination_from_meta(meta: Option<&Value>, len: usize) -> Result<Pagination, String> {
    let Some(raw) = meta.and_then(|m| m.get("pagination")).filter(|p| !p.is_null()) else {
        return Ok(Pagination::single_page(len));
    };

    let fields = raw
        .as_object()
        .map(Fields)
        .ok_or_else(|| "pagination should be an object".to_string())?;
    let total = fields
        .opt_u32("total")?
        .unwrap_or_else(|| u32::try_from(len).unwrap_or(u32::MAX));

    if let Some(page_size) = fields.opt_u32("pageSize")? {
        let page = fields.opt_u32("page")?.unwrap_or(1);
        return Ok(Pagination::new(page, page_size, total));
    }

    if let Some(limit) = fields.opt_u32("limit")? {
        let start = fields.opt_u32("start")?.unwrap_or(0);
        let page = if limit == 0 { 1 } else { start / limit + 1 };
        return Ok(Pagination::new(page, limit, total));
    }

    Err("neither pageSize nor limit present".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn article_fields() -> Value {
        json!({
            "title": "Understanding Childhood Cancer",
            "content": [
                { "type": "paragraph", "children": [
                    { "type": "text", "text": "A guide " },
                    { "type": "link", "url": "https://x", "children": [
                        { "type": "text", "text": "with links" }
                    ]}
                ]},
                { "type": "paragraph", "children": [{ "type": "text", "text": "and more." }] }
            ],
            "slug": "understanding-childhood-cancer",
            "author": "Dr. Sarah Johnson",
            "featured": true,
            "provider": "Internal",
            "publishedAt": "2024-12-01T00:00:00.000Z",
            "createdAt": "2024-12-01T00:00:00.000Z",
            "updatedAt": "2024-12-02T10:30:00.000Z",
            "featuredImage": {
                "data": {
                    "id": 4,
                    "attributes": {
                        "name": "hero.jpg",
                        "url": "/uploads/hero.jpg",
                        "width": 1200,
                        "height": 800,
                        "mime": "image/jpeg",
                        "size": 98.4,
                        "formats": {
                            "thumbnail": {
                                "name": "thumbnail_hero.jpg",
                                "url": "/uploads/thumbnail_hero.jpg",
                                "width": 234,
                                "height": 156,
                                "mime": "image/jpeg",
                                "size": 7.1
                            }
                        }
                    }
                }
            }
        })
    }

    fn nested(id: i64, fields: Value) -> Value {
        json!({ "id": id, "attributes": fields })
    }

    fn flat(id: i64, fields: Value) -> Value {
        let mut record = fields;
        record["id"] = json!(id);
        record
    }

    #[test]
    fn test_shape_detection() {
        let n = nested(1, json!({ "title": "x" }));
        let f = flat(1, json!({ "title": "x", "documentId": "abc" }));

        assert!(WireRecord::detect(&n).unwrap().is_nested());
        let flat_record = WireRecord::detect(&f).unwrap();
        assert!(!flat_record.is_nested());
        assert_eq!(flat_record.meta().unwrap().document_id.as_deref(), Some("abc"));

        assert!(WireRecord::detect(&json!("nope")).is_err());
        assert!(WireRecord::detect(&json!({ "title": "no id" })).is_err());
        assert!(WireRecord::detect(&json!({ "id": 1, "attributes": [] })).is_err());
    }

    #[test]
    fn test_nested_and_flat_produce_identical_articles() {
        let from_nested = Article::from_wire(
            &WireRecord::detect(&nested(1, article_fields())).unwrap(),
        )
        .unwrap();

        // Current schema: flat record, flat media relation.
        let mut fields = article_fields();
        fields["featuredImage"] = json!({
            "id": 4,
            "name": "hero.jpg",
            "url": "/uploads/hero.jpg",
            "width": 1200,
            "height": 800,
            "mime": "image/jpeg",
            "size": 98.4,
            "formats": {
                "thumbnail": {
                    "name": "thumbnail_hero.jpg",
                    "url": "/uploads/thumbnail_hero.jpg",
                    "width": 234,
                    "height": 156,
                    "mime": "image/jpeg",
                    "size": 7.1
                }
            }
        });
        let from_flat =
            Article::from_wire(&WireRecord::detect(&flat(1, fields)).unwrap()).unwrap();

        assert_eq!(from_nested, from_flat);
        assert_eq!(from_flat.content.extract_text(), "A guide with links and more.");
        let image = from_flat.featured_image.unwrap();
        assert_eq!(image.url, "/uploads/hero.jpg");
        assert_eq!(image.formats["thumbnail"].width, Some(234));
    }

    #[test]
    fn test_extract_text_from_values() {
        assert_eq!(extract_text(&json!("<p>plain</p>")), "<p>plain</p>");
        assert_eq!(extract_text(&Value::Null), "");
        assert_eq!(extract_text(&json!([])), "");
        assert_eq!(extract_text(&json!({ "unknown": true })), "");
        assert_eq!(extract_text(&json!(42)), "");
        assert_eq!(
            extract_text(&json!([
                { "children": [{ "text": "Hello" }, { "text": ", world" }] },
                { "children": [] },
                { "children": [{ "text": "Bye" }] }
            ])),
            "Hello, world  Bye"
        );
    }

    #[test]
    fn test_extract_text_idempotent_on_own_output() {
        let doc = json!([
            { "children": [{ "text": "one" }, { "bold": true, "text": "two" }] },
            { "children": [{ "children": [{ "text": "three" }] }] }
        ]);
        let once = extract_text(&doc);
        let rewrapped = json!([{ "children": [{ "text": once }] }]);
        assert_eq!(extract_text(&rewrapped), once);
        assert_eq!(once, "onetwo three");
    }

    #[test]
    fn test_external_article_requires_link() {
        let mut fields = article_fields();
        fields["provider"] = json!("External");
        let record = nested(2, fields.clone());
        assert!(Article::from_wire(&WireRecord::detect(&record).unwrap()).is_err());

        fields["externalLink"] = json!("https://example.com/research");
        let record = nested(2, fields);
        let article = Article::from_wire(&WireRecord::detect(&record).unwrap()).unwrap();
        assert!(article.is_external());
    }

    #[test]
    fn test_draft_and_defaults() {
        let record = flat(
            3,
            json!({ "title": "Draft", "slug": "draft", "publishedAt": null }),
        );
        let article = Article::from_wire(&WireRecord::detect(&record).unwrap()).unwrap();
        assert!(article.meta.is_draft());
        assert!(!article.featured);
        assert_eq!(article.provider, ContentOrigin::Internal);
        assert_eq!(article.content, RichText::default());
        assert!(article.featured_image.is_none());
    }

    #[test]
    fn test_media_relation_variants() {
        let empty = nested(1, json!({ "name": "Org", "logo": { "data": null } }));
        let org = Organization::from_wire(&WireRecord::detect(&empty).unwrap()).unwrap();
        assert!(org.logo.is_none());

        let list = nested(
            1,
            json!({ "name": "Org", "logo": { "data": [{ "id": 8, "url": "/a.png" }] } }),
        );
        let org = Organization::from_wire(&WireRecord::detect(&list).unwrap()).unwrap();
        assert_eq!(org.logo.unwrap().id, 8);

        let broken = nested(1, json!({ "name": "Org", "logo": { "id": 8 } }));
        assert!(Organization::from_wire(&WireRecord::detect(&broken).unwrap()).is_err());
    }

    #[test]
    fn test_normalize_collection_page_meta() {
        let body = json!({
            "data": [nested(1, article_fields())],
            "meta": { "pagination": { "page": 1, "pageSize": 25, "pageCount": 7, "total": 1 } }
        })
        .to_string();

        let result = normalize_collection::<Article>(&body).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.pagination, Pagination::new(1, 25, 1));
        assert_eq!(result.pagination.page_count, 1);
    }

    #[test]
    fn test_normalize_collection_offset_meta_and_missing_meta() {
        let offset = json!({
            "data": [],
            "meta": { "pagination": { "start": 6, "limit": 3, "total": 10 } }
        });
        let result = normalize_collection_value::<Card>(&offset).unwrap();
        assert_eq!(result.pagination, Pagination::new(3, 3, 10));
        assert_eq!(result.pagination.page_count, 4);

        let bare = json!({ "data": [flat(1, json!({ "title": "Card" }))] });
        let result = normalize_collection_value::<Card>(&bare).unwrap();
        assert_eq!(result.pagination, Pagination::single_page(1));
    }

    #[test]
    fn test_mixed_shapes_in_one_response() {
        let body = json!({
            "data": [
                nested(1, json!({ "title": "A" })),
                flat(2, json!({ "title": "B", "documentId": "d2" }))
            ]
        });
        let result = normalize_collection_value::<Card>(&body).unwrap();
        assert_eq!(result.data.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_malformed_responses() {
        let cases = vec![
            "not json".to_string(),
            json!({ "items": [] }).to_string(),
            json!({ "data": {} }).to_string(),
            json!({ "data": [{ "id": 1, "attributes": { "title": "" } }] }).to_string(),
            json!({ "data": [nested(1, json!({ "title": "A" })), json!({ "title": "no id" })] })
                .to_string(),
            json!({
                "data": [nested(1, json!({ "title": "A" })), nested(2, json!({ "title": "B" }))],
                "meta": { "pagination": { "page": 1, "pageSize": 1, "total": 2 } }
            })
            .to_string(),
            json!({ "data": [], "meta": { "pagination": { "page": 1 } } }).to_string(),
        ];

        for body in cases {
            let err = normalize_collection::<Card>(&body).unwrap_err();
            assert!(
                matches!(err, CmsError::MalformedResponse { .. }),
                "{}: {:?}",
                body,
                err
            );
        }
    }

    #[test]
    fn test_normalize_single() {
        let body = json!({ "data": nested(5, json!({ "title": "About", "slug": "about" })) });
        let page = normalize_single::<Page>(&body.to_string()).unwrap().unwrap();
        assert_eq!(page.meta.id, 5);
        assert_eq!(page.slug, "about");

        let none = normalize_single::<Page>(&json!({ "data": null }).to_string()).unwrap();
        assert!(none.is_none());

        assert!(normalize_single::<Page>("{}").is_err());
    }

    #[test]
    fn test_bad_timestamp_is_rejected() {
        let record = nested(1, json!({ "title": "x", "slug": "x", "createdAt": "yesterday" }));
        assert!(Page::from_wire(&WireRecord::detect(&record).unwrap()).is_err());
    }
}
