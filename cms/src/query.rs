//! Structured query descriptions and their translation into CMS REST
//! requests.
//!
//! Parameter grammar:
//!
//! ```text
//! populate=name[,name...] | populate=<json>
//! filters[field][operator]=value
//! sort=field:dir[,field:dir...]
//! pagination[page|pageSize|start|limit]=n
//! fields=f1,f2,...
//! locale=xx
//! publicationState=live|preview
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `filters[field][operator]=value` condition. Operators are passed
/// through unchecked so newer backend operators keep working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: String,
    pub value: String,
}

impl Filter {
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl fmt::Display,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.to_string(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl fmt::Display) -> Self {
        Self::new(field, "$eq", value)
    }

    fn param_name(&self) -> String {
        format!("filters[{}][{}]", self.field, self.operator)
    }
}

/// Relations to populate. A list and a nested structure are never mixed
/// in one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Populate {
    Single(String),
    List(Vec<String>),
    Nested(serde_json::Value),
}

impl Populate {
    pub fn list<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(names.into_iter().map(Into::into).collect())
    }

    fn encode(&self) -> String {
        match self {
            Populate::Single(name) => name.clone(),
            Populate::List(names) => names.join(","),
            Populate::Nested(serde_json::Value::String(name)) => name.clone(),
            Populate::Nested(value) => value.to_string(),
        }
    }

    /// A nested populate that is only a string (`"*"`) is a single name.
    fn canonical(self) -> Self {
        match self {
            Populate::Nested(serde_json::Value::String(name)) => Populate::Single(name),
            other => other,
        }
    }

    fn decode(raw: &str) -> Self {
        let trimmed = raw.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(value) = serde_json::from_str(raw) {
                return Populate::Nested(value);
            }
        }

        if raw.contains(',') {
            Populate::list(raw.split(','))
        } else {
            Populate::Single(raw.to_string())
        }
    }
}

/// Page-based and offset-based pagination, forwarded exactly as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub start: Option<u32>,
    pub limit: Option<u32>,
}

impl PaginationParams {
    pub fn is_empty(&self) -> bool {
        self.page.is_none()
            && self.page_size.is_none()
            && self.start.is_none()
            && self.limit.is_none()
    }

    fn entries(&self) -> impl Iterator<Item = (&'static str, u32)> {
        [
            ("page", self.page),
            ("pageSize", self.page_size),
            ("start", self.start),
            ("limit", self.limit),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationState {
    Live,
    Preview,
}

impl PublicationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationState::Live => "live",
            PublicationState::Preview => "preview",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub sort: Vec<String>,
    pub populate: Option<Populate>,
    pub pagination: PaginationParams,
    pub fields: Vec<String>,
    pub locale: Option<String>,
    pub publication_state: Option<PublicationState>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(
        mut self,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl fmt::Display,
    ) -> Self {
        self.filters.push(Filter::new(field, operator, value));
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Appends one `field:direction` token after any existing ones.
    pub fn sort(mut self, token: impl Into<String>) -> Self {
        self.sort.push(token.into());
        self
    }

    /// Replaces the sort with an ordered token list, primary first.
    pub fn with_sort<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sort = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_populate(mut self, populate: Populate) -> Self {
        self.populate = Some(populate.canonical());
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.pagination.page = Some(page);
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.pagination.page_size = Some(page_size);
        self
    }

    pub fn start(mut self, start: u32) -> Self {
        self.pagination.start = Some(start);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.pagination.limit = Some(limit);
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_publication_state(mut self, state: PublicationState) -> Self {
        self.publication_state = Some(state);
        self
    }

    /// Fills every part the caller left unset from `defaults`. Parts the
    /// caller did set replace the default wholesale.
    pub fn merge_defaults(mut self, defaults: Query) -> Self {
        if self.filters.is_empty() {
            self.filters = defaults.filters;
        }
        if self.sort.is_empty() {
            self.sort = defaults.sort;
        }
        if self.populate.is_none() {
            self.populate = defaults.populate;
        }
        if self.pagination.is_empty() {
            self.pagination = defaults.pagination;
        }
        if self.fields.is_empty() {
            self.fields = defaults.fields;
        }
        if self.locale.is_none() {
            self.locale = defaults.locale;
        }
        if self.publication_state.is_none() {
            self.publication_state = defaults.publication_state;
        }
        self
    }

    /// Ordered query-parameter list for this query.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if let Some(populate) = &self.populate {
            params.push(("populate".to_string(), populate.encode()));
        }

        for filter in &self.filters {
            params.push((filter.param_name(), filter.value.clone()));
        }

        if !self.sort.is_empty() {
            params.push(("sort".to_string(), self.sort.join(",")));
        }

        for (key, value) in self.pagination.entries() {
            params.push((format!("pagination[{}]", key), value.to_string()));
        }

        if !self.fields.is_empty() {
            params.push(("fields".to_string(), self.fields.join(",")));
        }

        if let Some(locale) = &self.locale {
            params.push(("locale".to_string(), locale.clone()));
        }

        if let Some(state) = &self.publication_state {
            params.push(("publicationState".to_string(), state.as_str().to_string()));
        }

        params
    }

    /// Rebuilds a query from a parameter list produced by [`Query::to_params`].
    ///
    /// A one-element populate list comes back as [`Populate::Single`]; both
    /// encode to the same parameter.
    pub fn from_params(params: &[(String, String)]) -> Result<Self, String> {
        let mut query = Query::new();

        for (key, value) in params {
            match key.as_str() {
                "populate" => query.populate = Some(Populate::decode(value)),
                "sort" => query.sort = split_list(value),
                "fields" => query.fields = split_list(value),
                "locale" => query.locale = Some(value.clone()),
                "publicationState" => {
                    query.publication_state = Some(match value.as_str() {
                        "live" => PublicationState::Live,
                        "preview" => PublicationState::Preview,
                        other => return Err(format!("Unknown publication state: {}", other)),
                    })
                }
                _ => {
                    if let Some(inner) = bracketed(key, "filters") {
                        let (field, operator) = inner
                            .rsplit_once("][")
                            .ok_or_else(|| format!("Filter without operator: {}", key))?;
                        query.filters.push(Filter::new(field, operator, value));
                    } else if let Some(inner) = bracketed(key, "pagination") {
                        let number: u32 = value
                            .parse()
                            .map_err(|_| format!("Pagination value is not a number: {}", value))?;
                        match inner {
                            "page" => query.pagination.page = Some(number),
                            "pageSize" => query.pagination.page_size = Some(number),
                            "start" => query.pagination.start = Some(number),
                            "limit" => query.pagination.limit = Some(number),
                            other => return Err(format!("Unknown pagination key: {}", other)),
                        }
                    } else {
                        return Err(format!("Unknown query parameter: {}", key));
                    }
                }
            }
        }

        Ok(query)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// `prefix[inner]` → `inner`.
fn bracketed<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)?
        .strip_prefix('[')?
        .strip_suffix(']')
}

/// A fully resolved request: method, path below the base URL, ordered
/// parameters, extra headers and optional JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl RequestDescriptor {
    fn new(method: Method, path: String) -> Self {
        Self {
            method,
            path,
            params: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn find(collection: &str, query: &Query) -> Self {
        let mut descriptor = Self::new(Method::Get, format!("/api/{}", collection));
        descriptor.params = query.to_params();
        descriptor
    }

    pub fn find_one(collection: &str, id: impl fmt::Display, query: &Query) -> Self {
        let mut descriptor = Self::new(Method::Get, format!("/api/{}/{}", collection, id));
        descriptor.params = query.to_params();
        descriptor
    }

    /// `POST /api/{collection}` with `{"data": fields}`.
    pub fn create(collection: &str, fields: serde_json::Value) -> Self {
        let mut descriptor = Self::new(Method::Post, format!("/api/{}", collection));
        descriptor.body = Some(serde_json::json!({ "data": fields }));
        descriptor
    }

    /// `PUT /api/{collection}/{id}` with `{"data": fields}`.
    pub fn update(collection: &str, id: impl fmt::Display, fields: serde_json::Value) -> Self {
        let mut descriptor = Self::new(Method::Put, format!("/api/{}/{}", collection, id));
        descriptor.body = Some(serde_json::json!({ "data": fields }));
        descriptor
    }

    pub fn delete(collection: &str, id: impl fmt::Display) -> Self {
        Self::new(Method::Delete, format!("/api/{}/{}", collection, id))
    }

    pub fn health() -> Self {
        Self::new(Method::Get, "/_health".to_string())
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pairs(params: &[(&str, &str)]) -> Vec<(String, String)> {
        params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_featured_articles_params() {
        let query = Query::new()
            .filter("featured", "$eq", true)
            .with_populate(Populate::list(["featuredImage"]))
            .sort("publishedAt:desc")
            .limit(3);

        assert_eq!(
            query.to_params(),
            pairs(&[
                ("populate", "featuredImage"),
                ("filters[featured][$eq]", "true"),
                ("sort", "publishedAt:desc"),
                ("pagination[limit]", "3"),
            ])
        );
    }

    #[test]
    fn test_multiple_filters_repeat_and_keep_order() {
        let query = Query::new()
            .filter("author", "$eq", "Research Team")
            .filter("publishedAt", "$gte", "2024-11-01")
            .filter("title", "$futureOperator", "x");

        let params = query.to_params();
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].0, "filters[author][$eq]");
        assert_eq!(params[1], ("filters[publishedAt][$gte]".to_string(), "2024-11-01".to_string()));
        assert_eq!(params[2].0, "filters[title][$futureOperator]");
    }

    #[test]
    fn test_sort_tokens_are_comma_joined_in_order() {
        let single = Query::new().sort("name:asc");
        assert_eq!(single.to_params(), pairs(&[("sort", "name:asc")]));

        let multi = Query::new().with_sort(["featured:desc", "publishedAt:desc", "id:asc"]);
        assert_eq!(
            multi.to_params(),
            pairs(&[("sort", "featured:desc,publishedAt:desc,id:asc")])
        );
    }

    #[test]
    fn test_populate_encodings() {
        let single = Query::new().with_populate(Populate::Single("logo".to_string()));
        assert_eq!(single.to_params(), pairs(&[("populate", "logo")]));

        let list = Query::new().with_populate(Populate::list(["logo", "featuredImage"]));
        assert_eq!(list.to_params(), pairs(&[("populate", "logo,featuredImage")]));

        let nested = Query::new().with_populate(Populate::Nested(json!({
            "featuredImage": { "fields": ["url"] }
        })));
        assert_eq!(
            nested.to_params(),
            pairs(&[("populate", r#"{"featuredImage":{"fields":["url"]}}"#)])
        );
    }

    #[test]
    fn test_pagination_styles_forwarded_verbatim() {
        let paged = Query::new().page(2).page_size(10);
        assert_eq!(
            paged.to_params(),
            pairs(&[("pagination[page]", "2"), ("pagination[pageSize]", "10")])
        );

        let offset = Query::new().start(20).limit(5);
        assert_eq!(
            offset.to_params(),
            pairs(&[("pagination[start]", "20"), ("pagination[limit]", "5")])
        );
    }

    #[test]
    fn test_fields_locale_and_publication_state() {
        let query = Query::new()
            .with_fields(["title", "slug"])
            .with_locale("en")
            .with_publication_state(PublicationState::Preview);

        assert_eq!(
            query.to_params(),
            pairs(&[
                ("fields", "title,slug"),
                ("locale", "en"),
                ("publicationState", "preview"),
            ])
        );
        assert!(Query::new().to_params().is_empty());
    }

    #[test]
    fn test_params_round_trip() {
        let queries = vec![
            Query::new(),
            Query::new()
                .filter("slug", "$eq", "about")
                .filter("featured", "$ne", false)
                .with_sort(["publishedAt:desc", "title:asc"])
                .with_populate(Populate::list(["featuredImage", "logo"]))
                .page(1)
                .page_size(25)
                .with_fields(["title"]),
            Query::new()
                .filter("author][name", "$containsi", "sarah")
                .with_populate(Populate::Nested(json!({ "logo": true })))
                .start(0)
                .limit(3)
                .with_locale("fr")
                .with_publication_state(PublicationState::Live),
        ];

        for query in queries {
            let params = query.to_params();
            let parsed = Query::from_params(&params).unwrap();
            assert_eq!(parsed.filters, query.filters);
            assert_eq!(parsed.sort, query.sort);
            assert_eq!(parsed.populate, query.populate);
            assert_eq!(parsed.pagination, query.pagination);
            assert_eq!(parsed.fields, query.fields);
            assert_eq!(parsed.to_params(), params);
        }
    }

    #[test]
    fn test_wildcard_populate_is_sent_unquoted() {
        let query = Query::new().with_populate(Populate::Nested(json!("*")));
        assert_eq!(query.populate, Some(Populate::Single("*".to_string())));
        assert_eq!(query.to_params(), pairs(&[("populate", "*")]));

        let parsed = Query::from_params(&query.to_params()).unwrap();
        assert_eq!(parsed.populate, query.populate);
        assert_eq!(parsed.to_params(), query.to_params());

        let mut raw = Query::new();
        raw.populate = Some(Populate::Nested(json!("*")));
        assert_eq!(raw.to_params(), pairs(&[("populate", "*")]));
    }

    #[test]
    fn test_single_element_list_decodes_as_single() {
        let query = Query::new().with_populate(Populate::list(["logo"]));
        let parsed = Query::from_params(&query.to_params()).unwrap();
        assert_eq!(parsed.populate, Some(Populate::Single("logo".to_string())));
        assert_eq!(parsed.to_params(), query.to_params());
    }

    #[test]
    fn test_from_params_rejects_garbage() {
        assert!(Query::from_params(&pairs(&[("pagination[limit]", "many")])).is_err());
        assert!(Query::from_params(&pairs(&[("pagination[offset]", "1")])).is_err());
        assert!(Query::from_params(&pairs(&[("filters[slug]", "x")])).is_err());
        assert!(Query::from_params(&pairs(&[("publicationState", "draft")])).is_err());
        assert!(Query::from_params(&pairs(&[("bogus", "1")])).is_err());
    }

    #[test]
    fn test_merge_defaults_keeps_caller_parts() {
        let defaults = Query::new()
            .with_populate(Populate::list(["featuredImage"]))
            .sort("publishedAt:desc");

        let merged = Query::new().sort("title:asc").limit(2).merge_defaults(defaults);
        assert_eq!(merged.sort, vec!["title:asc".to_string()]);
        assert_eq!(merged.populate, Some(Populate::list(["featuredImage"])));
        assert_eq!(merged.pagination.limit, Some(2));
    }

    #[test]
    fn test_request_descriptors() {
        let find = RequestDescriptor::find("articles", &Query::new().limit(1));
        assert_eq!(find.method, Method::Get);
        assert_eq!(find.path, "/api/articles");
        assert_eq!(find.param("pagination[limit]"), Some("1"));

        let one = RequestDescriptor::find_one("pages", 7, &Query::new());
        assert_eq!(one.path, "/api/pages/7");
        assert!(one.params.is_empty());

        let create = RequestDescriptor::create("cards", json!({ "title": "New" }));
        assert_eq!(create.method, Method::Post);
        assert_eq!(create.body, Some(json!({ "data": { "title": "New" } })));

        let update = RequestDescriptor::update("cards", 3, json!({ "title": "Renamed" }));
        assert_eq!(update.method, Method::Put);
        assert_eq!(update.path, "/api/cards/3");
        assert_eq!(update.body, Some(json!({ "data": { "title": "Renamed" } })));

        let delete = RequestDescriptor::delete("cards", 3).with_header("X-Trace", "abc");
        assert_eq!(delete.method, Method::Delete);
        assert!(delete.body.is_none());
        assert_eq!(delete.headers, pairs(&[("X-Trace", "abc")]));
    }
}
